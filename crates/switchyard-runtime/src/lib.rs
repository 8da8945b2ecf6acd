//! Everything around an [`Application`](switchyard_framework::Application)
//! that is not request dispatch: where settings come from ([`config`]), where
//! log lines go ([`logging`]) and how long the server lives ([`runtime`]).
//!
//! ```ignore
//! let runtime = RuntimeBuilder::new()
//!     .search_path("/etc/switchyard")
//!     .profile("production")
//!     .build()?;
//! let mut app = runtime.application()?;
//! app.get("/", hello)?;
//! runtime.run(app).await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, SwitchyardConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, SwitchyardRuntime};

pub use tracing;
pub use tracing_subscriber;

/// `tracing` macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
