use thiserror::Error;

/// Top-level error type for the `glocal-api` crate.
///
/// Covers every failure mode at the external service boundary:
/// the login exchange, the credential (OAuth) exchange, and the
/// Home Foyer graph service. `glocal-core` translates these into
/// logged diagnostics and absent results.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication exchanges ────────────────────────────────────
    /// The exchange endpoint rejected the request outright.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Username or password exceeded the exchange's input limit.
    ///
    /// The upstream login handshake cannot sign overlong input, so this
    /// is detected before any request is sent.
    #[error("Exchange input too long")]
    InputTooLong,

    // ── Graph service ───────────────────────────────────────────────
    /// The graph service rejected the bearer credential.
    ///
    /// Semantically significant: the caller may re-authenticate and
    /// retry. All other service faults are opaque.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// Any other non-success status from the graph service.
    #[error("Service error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// Response body did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this fault means the bearer credential was
    /// rejected and a fresh one might succeed.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }
}
