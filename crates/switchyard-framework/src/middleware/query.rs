//! Query string parsing.

use std::sync::Arc;

use async_trait::async_trait;
use switchyard_core::{HandlerError, Params, QueryParserMode};
use url::form_urlencoded;

use crate::context::RequestContext;
use crate::extension::ContextExtension;
use crate::handler::{BoxedHandler, Next};

/// Parsed query string, stored in the request state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(pub Params);

impl Query {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// Keys and values are form-decoded; for repeated keys the last value
    /// wins.
    pub fn parse(raw: &str) -> Self {
        let mut params = Params::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            params.insert(key, value);
        }
        Self(params)
    }

    /// Unwraps the params.
    pub fn into_params(self) -> Params {
        self.0
    }
}

fn parse_into(ctx: &RequestContext) {
    if !ctx.has_state::<Query>() {
        ctx.set_state(Query::parse(ctx.uri().query().unwrap_or_default()));
    }
}

/// Parses the query string of every request, according to the
/// `query parser` setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser;

#[async_trait]
impl ContextExtension for QueryParser {
    fn name(&self) -> &str {
        "query"
    }

    async fn extend(&self, ctx: &RequestContext) -> Result<(), HandlerError> {
        if ctx.settings().query_parser == QueryParserMode::Simple {
            parse_into(ctx);
        }
        Ok(())
    }
}

/// Middleware that parses the query string unless it already was.
pub fn query() -> BoxedHandler {
    Arc::new(|ctx: Arc<RequestContext>, next: Next| async move {
        parse_into(&ctx);
        next.pass()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use switchyard_core::Settings;

    fn ctx(uri: &str, settings: Settings) -> RequestContext {
        let request = http::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        RequestContext::new(request, Arc::new(settings))
    }

    #[test]
    fn test_parse() {
        let query = Query::parse("a=1&b=two+words&c=%2F&a=3");
        assert_eq!(query.0.get("a"), Some("3"));
        assert_eq!(query.0.get("b"), Some("two words"));
        assert_eq!(query.0.get("c"), Some("/"));
    }

    #[tokio::test]
    async fn test_extension_respects_setting() {
        let ctx1 = ctx("/?page=2", Settings::default());
        QueryParser.extend(&ctx1).await.unwrap();
        assert_eq!(ctx1.query_param("page").as_deref(), Some("2"));

        let mut settings = Settings::default();
        settings.set("query parser", "disabled").unwrap();
        let ctx2 = ctx("/?page=2", settings);
        QueryParser.extend(&ctx2).await.unwrap();
        assert!(ctx2.query().is_empty());
    }
}
