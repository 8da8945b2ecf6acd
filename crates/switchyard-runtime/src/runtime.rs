//! Runtime: configuration, logging and the HTTP server around one
//! application.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! let runtime = SwitchyardRuntime::builder()
//!     .config_file("config/switchyard.toml")
//!     .build()?;
//!
//! let mut app = runtime.application()?;
//! app.get("/", hello)?;
//! runtime.run(app).await?;
//! ```

use std::future::Future;
use std::path::Path;

use tokio::signal;
use tracing::{info, warn};

use crate::config::{ConfigLoader, SwitchyardConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use switchyard_framework::Application;
use switchyard_transport::{HttpServer, ListenerHandle};

/// Owns the loaded configuration and serves applications with it.
pub struct SwitchyardRuntime {
    config: SwitchyardConfig,
}

impl SwitchyardRuntime {
    /// Creates a runtime from `switchyard.toml` in the current directory
    /// and the environment, falling back to defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                SwitchyardConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration and
    /// initializes logging from it.
    pub fn from_config(config: &SwitchyardConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            env = config.app.env.as_str(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    /// Builds an application from the `app` section, including its named
    /// middleware.
    pub fn application(&self) -> RuntimeResult<Application> {
        Ok(Application::from_settings(self.config.app.clone())?)
    }

    /// Starts serving `app` in the background.
    pub async fn serve(&self, app: Application) -> RuntimeResult<ListenerHandle> {
        let server = HttpServer::new(self.config.server.to_http_config(), app);
        let handle = server.listen().await?;
        info!(addr = %handle.local_addr(), "Switchyard is serving");
        Ok(handle)
    }

    /// Serves `app` until Ctrl+C (or SIGTERM on Unix), then shuts down
    /// gracefully.
    pub async fn run(&self, app: Application) -> RuntimeResult<()> {
        let handle = self.serve(app).await?;
        info!("Press Ctrl+C to stop");

        let signalled = wait_for_shutdown().await;
        handle.shutdown().await;
        info!("Runtime stopped");

        signalled
    }

    /// Serves `app` until `shutdown` completes.
    pub async fn run_until<F>(&self, app: Application, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let handle = self.serve(app).await?;
        shutdown.await;
        handle.shutdown().await;
        info!("Runtime stopped");
        Ok(())
    }
}

impl Default for SwitchyardRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder loading and validating the configuration before creating the
/// runtime.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.loader = self.loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Overrides the loaded configuration.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Overrides a single dotted key.
    pub fn set<V: serde::Serialize>(mut self, key: &str, value: V) -> Self {
        self.loader = self.loader.set(key, value);
        self
    }

    pub fn build(self) -> RuntimeResult<SwitchyardRuntime> {
        let config = self.loader.load()?;
        if let Err(e) = validate_config(&config) {
            warn!(error = %e, "Rejected configuration");
            return Err(e.into());
        }
        Ok(SwitchyardRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
