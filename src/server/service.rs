use std::sync::Arc;
use std::time::Instant;

use http::Method;
use tokio::io::AsyncWrite;
use tracing::{debug, error, info, warn};

use super::request::HttpRequest;
use super::response::{is_valid_status, ConnectionState, HttpResponse, Outcome, ResponseWriter};
use crate::config::DispatchConfig;
use crate::dispatcher::{ConnectionInfo, Dispatcher, Handler, RequestContext};
use crate::error::{ConfigError, DispatchError};
use crate::ids::{RequestId, REQUEST_ID_HEADER};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::problem::ErrorTranslator;
use crate::router::{RouteTable, RouteTableBuilder};
use crate::security::{
    rule_key, AnonymousPrincipal, PrincipalProvider, SecurityPolicy, SecurityRuleSet,
};

/// The assembled request pipeline: route table, middleware chain, security
/// gate, error translator and response writer.
///
/// Cheap to clone; every clone shares the same immutable tables.
#[derive(Debug, Clone)]
pub struct AppService {
    routes: Arc<RouteTable>,
    chain: MiddlewareChain,
    translator: ErrorTranslator,
    writer: ResponseWriter,
}

impl AppService {
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    #[must_use]
    pub fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    #[must_use]
    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    /// Turn one request into one response.
    ///
    /// Never fails: every failure is translated into a problem response.
    /// Unmatched requests get a 404 without running any middleware.
    pub async fn handle(&self, req: HttpRequest) -> HttpResponse {
        let start = Instant::now();
        let request_id = RequestId::for_request(&req);
        let keep_alive = req.keep_alive();
        let path = req.path().to_string();

        debug!(
            request_id = %request_id,
            method = %req.method,
            path = %path,
            header_count = req.headers.len(),
            body_len = req.body.len(),
            "Request parsed"
        );

        let outcome = match self.routes.resolve(&req.method, &req.target) {
            None => {
                let err = DispatchError::NotFound {
                    method: req.method.clone(),
                    path: path.clone(),
                };
                Outcome::Problem(self.translator.translate(&err, &path, request_id))
            }
            Some(matched) => {
                let query = req.query_params();
                let ctx = RequestContext::builder(req.method.clone(), path.clone())
                    .request_id(request_id)
                    .connection(ConnectionInfo {
                        peer_addr: req.peer,
                        keep_alive,
                    })
                    .query(query)
                    .headers(req.headers)
                    .body(req.body)
                    .route_match(matched)
                    .build();

                match self.chain.execute(ctx).await {
                    Ok(resp) => Outcome::Success(resp),
                    Err(err) => {
                        self.log_failure(&err, &req.method, &path, request_id);
                        Outcome::Problem(self.translator.translate(&err, &path, request_id))
                    }
                }
            }
        };

        let outcome = if is_valid_status(outcome.status()) {
            outcome
        } else {
            let err = DispatchError::Internal(anyhow::anyhow!(
                "handler produced invalid status {}",
                outcome.status()
            ));
            self.log_failure(&err, &req.method, &path, request_id);
            Outcome::Problem(self.translator.translate(&err, &path, request_id))
        };

        let mut response = self.writer.render(outcome, keep_alive);
        response.set_header(REQUEST_ID_HEADER, request_id.to_string());

        info!(
            request_id = %request_id,
            method = %req.method,
            path = %path,
            status = response.status,
            duration_us = start.elapsed().as_micros() as u64,
            "Request handled"
        );
        response
    }

    /// Handle a request and write the response to `io`.
    ///
    /// The returned state tells the transport whether to read another request
    /// from the same connection.
    pub async fn serve<W>(&self, req: HttpRequest, io: &mut W) -> ConnectionState
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let response = self.handle(req).await;
        self.writer.write(io, &response).await
    }

    fn log_failure(&self, err: &DispatchError, method: &Method, path: &str, id: RequestId) {
        match err {
            DispatchError::Internal(_) | DispatchError::Panicked(_) => error!(
                request_id = %id,
                method = %method,
                path = %path,
                error_kind = err.kind(),
                error = %err,
                "Request failed with an internal error"
            ),
            _ => warn!(
                request_id = %id,
                method = %method,
                path = %path,
                status = err.status(),
                error_kind = err.kind(),
                error = %err,
                "Request rejected"
            ),
        }
    }
}

/// Collects routes, security policies and middleware, then freezes them into
/// an [`AppService`].
///
/// ```rust
/// use std::sync::Arc;
/// use dispatchkit::dispatcher::{DispatchResult, HandlerResponse, RequestContext};
/// use dispatchkit::middleware::TracingMiddleware;
/// use dispatchkit::security::SecurityPolicy;
/// use dispatchkit::server::AppService;
/// use http::Method;
///
/// async fn health(_ctx: RequestContext) -> DispatchResult {
///     Ok(HandlerResponse::text(200, "ok"))
/// }
///
/// let mut builder = AppService::builder();
/// builder.middleware(Arc::new(TracingMiddleware));
/// builder
///     .register(Method::GET, "/health", SecurityPolicy::PermitAll, health)
///     .unwrap();
/// let service = builder.build().unwrap();
/// assert_eq!(service.routes().len(), 1);
/// ```
pub struct ServiceBuilder {
    routes: RouteTableBuilder,
    rules: SecurityRuleSet,
    middleware: Vec<Arc<dyn Middleware>>,
    principals: Arc<dyn PrincipalProvider>,
    config: DispatchConfig,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: RouteTable::builder(),
            rules: SecurityRuleSet::new(),
            middleware: Vec::new(),
            principals: Arc::new(AnonymousPrincipal),
            config: DispatchConfig::default(),
        }
    }

    pub fn config(&mut self, config: DispatchConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Append a middleware; links run in the order they are added.
    pub fn middleware(&mut self, mw: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(mw);
        self
    }

    /// Source of caller identities for the security gate.
    pub fn principal_provider(&mut self, provider: Arc<dyn PrincipalProvider>) -> &mut Self {
        self.principals = provider;
        self
    }

    /// Register an endpoint and its security policy in one step.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidTemplate`] - the template cannot be parsed
    /// * [`ConfigError::DuplicateRoute`] - `method template` is already registered
    /// * [`ConfigError::DuplicateSecurityRule`] - the normalized template collides with another rule
    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        template: &str,
        policy: SecurityPolicy,
        handler: H,
    ) -> Result<&mut Self, ConfigError> {
        self.register_arc(method, template, policy, Arc::new(handler))
    }

    /// [`register`](Self::register) for an already shared handler.
    ///
    /// A rejected registration leaves both the route table and the rule set
    /// untouched.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_arc(
        &mut self,
        method: Method,
        template: &str,
        policy: SecurityPolicy,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, ConfigError> {
        if self.routes.contains(&method, template) {
            return Err(ConfigError::DuplicateRoute {
                method,
                template: template.to_string(),
            });
        }
        // `/status` and `/status/` are distinct routes but share one rule key.
        if self.rules.contains(&method, template) {
            return Err(ConfigError::DuplicateSecurityRule {
                key: rule_key(&method, template),
            });
        }
        self.routes
            .register(method.clone(), template, policy.clone(), handler)?;
        self.rules.insert_policy(&method, template, &policy)?;
        Ok(self)
    }

    /// Freeze everything into a service.
    ///
    /// # Errors
    ///
    /// Propagates chain construction failures.
    pub fn build(self) -> Result<AppService, ConfigError> {
        let dispatcher = Dispatcher::new(Arc::new(self.rules), self.principals);
        let chain = MiddlewareChain::builder()
            .add_all(self.middleware)
            .terminal(Arc::new(dispatcher))
            .build()?;

        info!(
            routes = self.routes.len(),
            middleware = ?chain.names(),
            keep_alive = self.config.http.keep_alive,
            problem_type_base = %self.config.problems.type_base,
            "Service assembled"
        );

        Ok(AppService {
            routes: Arc::new(self.routes.build()),
            chain,
            translator: ErrorTranslator::new(self.config.problems.types()),
            writer: ResponseWriter::new(self.config.http),
        })
    }
}
