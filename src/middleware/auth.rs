use futures::future::BoxFuture;

use super::{Middleware, Next};
use crate::dispatcher::{DispatchResult, RequestContext};
use crate::problem::Problem;

/// Short-circuits with a 401 problem unless the `authorization` header
/// carries the configured token.
///
/// This is a shared-secret check for internal endpoints; it does not attach a
/// principal. Role and permission checks stay with the security gate.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    token: String,
}

impl AuthMiddleware {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Middleware for AuthMiddleware {
    fn handle(&self, ctx: RequestContext, next: Next) -> BoxFuture<'_, DispatchResult> {
        let authorized = ctx.get_header("authorization") == Some(self.token.as_str());
        if authorized {
            return next.run(ctx);
        }
        let problem = Problem::new(401)
            .with_detail("missing or invalid credentials")
            .with_instance(ctx.path());
        Box::pin(futures::future::ready(Err(problem.into())))
    }

    fn name(&self) -> &'static str {
        "auth"
    }
}
