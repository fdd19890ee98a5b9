use crate::error::DispatchError;
use crate::ids::RequestId;

use super::{Problem, ProblemDetails, ProblemTypes};

/// Safe, fixed detail for unexpected failures. The real cause only goes to the log.
pub const INTERNAL_ERROR_DETAIL: &str =
    "An unexpected error occurred while processing the request.";

const NOT_FOUND_DETAIL: &str = "No resource matches the requested method and path.";
const FORBIDDEN_DETAIL: &str = "The caller is not permitted to access this resource.";

/// Maps every [`DispatchError`] onto exactly one [`ProblemDetails`].
///
/// The mapping is total and deterministic: translating the same failure for the
/// same request twice yields equal payloads.
#[derive(Debug, Clone, Default)]
pub struct ErrorTranslator {
    types: ProblemTypes,
}

impl ErrorTranslator {
    #[must_use]
    pub fn new(types: ProblemTypes) -> Self {
        Self { types }
    }

    #[must_use]
    pub fn types(&self) -> &ProblemTypes {
        &self.types
    }

    /// Translate `err` raised while serving `instance` (the request path).
    #[must_use]
    pub fn translate(
        &self,
        err: &DispatchError,
        instance: &str,
        request_id: RequestId,
    ) -> ProblemDetails {
        match err {
            DispatchError::Problem(details) => details.clone(),
            DispatchError::NotFound { .. } => Problem::new(404)
                .with_type(&self.types.not_found)
                .with_detail(NOT_FOUND_DETAIL)
                .with_instance(instance)
                .into(),
            DispatchError::Forbidden { .. } => Problem::new(403)
                .with_type(&self.types.forbidden)
                .with_detail(FORBIDDEN_DETAIL)
                .with_instance(instance)
                .into(),
            DispatchError::Internal(_) | DispatchError::Panicked(_) => Problem::new(500)
                .with_type(&self.types.internal)
                .with_title("Internal Server Error")
                .with_detail(INTERNAL_ERROR_DETAIL)
                .with_instance(instance)
                .with_extension("errorKind", err.kind())
                .with_extension("traceId", request_id.to_string())
                .into(),
        }
    }

    /// Problem for a request that matched no route.
    #[must_use]
    pub fn not_found(&self, instance: &str) -> ProblemDetails {
        Problem::new(404)
            .with_type(&self.types.not_found)
            .with_detail(NOT_FOUND_DETAIL)
            .with_instance(instance)
            .into()
    }
}
