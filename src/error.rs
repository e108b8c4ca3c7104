use thiserror::Error;

/// Unified error type for the core engine. Each variant maps to one of the
/// error kinds named by the component contracts (§7): `not_found`,
/// `invalid_input`, `unavailable_dependency`, `quota_exceeded`,
/// `malformed_response`, `conflict`, `internal`.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("dependency unavailable: {dependency}: {reason}")]
    UnavailableDependency { dependency: String, reason: String },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("malformed response from {source}: {reason}")]
    MalformedResponse { source: String, reason: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConduitError {
    /// Maps an error to the HTTP status code a transport layer built on top
    /// of this core would surface it as. The mapping itself lives here so a
    /// transport doesn't need to re-derive error-kind semantics.
    pub fn status_hint(&self) -> u16 {
        match self {
            ConduitError::NotFound(_) => 404,
            ConduitError::InvalidInput(_) => 400,
            ConduitError::Conflict(_) => 409,
            ConduitError::UnavailableDependency { .. } => 503,
            ConduitError::QuotaExceeded(_) => 400,
            ConduitError::MalformedResponse { .. } => 502,
            ConduitError::Io(_) | ConduitError::Sql(_) | ConduitError::Other(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConduitError::NotFound(_) => "not_found",
            ConduitError::InvalidInput(_) => "invalid_input",
            ConduitError::UnavailableDependency { .. } => "unavailable_dependency",
            ConduitError::QuotaExceeded(_) => "quota_exceeded",
            ConduitError::MalformedResponse { .. } => "malformed_response",
            ConduitError::Conflict(_) => "conflict",
            ConduitError::Io(_) | ConduitError::Sql(_) | ConduitError::Other(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConduitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_hints_follow_http_conventions() {
        assert_eq!(ConduitError::NotFound("x".into()).status_hint(), 404);
        assert_eq!(ConduitError::InvalidInput("x".into()).status_hint(), 400);
        assert_eq!(ConduitError::Conflict("x".into()).status_hint(), 409);
        assert_eq!(
            ConduitError::UnavailableDependency {
                dependency: "qdrant".into(),
                reason: "down".into()
            }
            .status_hint(),
            503
        );
    }
}
