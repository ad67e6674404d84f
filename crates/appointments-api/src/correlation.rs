//! `X-Correlation-ID` propagation.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderValue;
use axum::http::request::Parts;
use axum::response::{IntoResponseParts, ResponseParts};
use uuid::Uuid;

/// Header carrying the correlation identifier.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Correlation identifier of the current request.
///
/// Taken from `X-Correlation-ID` when it holds a UUID, otherwise generated.
/// Echoed back on the response when used as a response part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    /// Parses a header value, falling back to a fresh UUID.
    #[must_use]
    pub fn from_header(value: Option<&HeaderValue>) -> Self {
        let parsed = value
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok());
        Self(parsed.unwrap_or_else(Uuid::new_v4))
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_header(parts.headers.get(CORRELATION_ID_HEADER)))
    }
}

impl IntoResponseParts for CorrelationId {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            res.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        Ok(res)
    }
}
