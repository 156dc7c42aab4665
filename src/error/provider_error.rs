use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

/// An internal engine failure.
///
/// Wraps the causing error chain; the `ResponseError` impl turns it into a
/// 500 so an embedder can bubble it straight out of a handler with `?`.
#[derive(Debug)]
pub struct ProviderError {
    inner: anyhow::Error,
}

/// Result type of the engine's public entry points.
pub type ProviderResult<T, E = ProviderError> = std::result::Result<T, E>;

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> ProviderError {
        err_trace!("ProviderError::From<anyhow::Error>");
        ProviderError { inner: err }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl std::error::Error for ProviderError {}

impl ResponseError for ProviderError {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        err_trace!("ProviderError::error_response");
        log::error!("internal provider error: {:#}", self.inner);
        HttpResponse::build(self.status_code())
            .content_type("text/plain")
            .body(format!("{:#}", self.inner))
    }
}

#[cfg(test)]
mod test {
    use anyhow::Context;

    use super::*;

    #[test]
    fn keeps_the_error_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("store is gone")).context("put failed");
        let err = ProviderError::from(err.unwrap_err());

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "put failed");
    }
}
