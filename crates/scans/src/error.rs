/// Errors from the assessment-scan API layer.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Scan API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The session could not be established.
    #[error("Authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// The server answered with JSON of an unexpected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A scan definition is missing a required field.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
