use thiserror::Error;

/// Failures surfaced by the remote API. The pipeline converts these into
/// reason tags at the failing check; they never abort a whole run.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-404 HTTP status. 404 is "absent" and never reaches this type.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Connection, DNS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A GraphQL response carrying an `errors` field.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Response body that would not parse or decode.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => ApiError::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}
