//! Error taxonomy for the router and LOB streaming engine (§7).

use thiserror::Error;

/// Locator parsing failures (§4.1), nested under [`OjpError::InvalidLocator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("locator does not match the proxy-tag pattern")]
    MalformedPattern,

    #[error("endpoint list is empty")]
    EmptyEndpointList,

    #[error("no ':' in endpoint entry '{0}'")]
    MissingColon(String),

    #[error("non-numeric port in endpoint entry '{0}'")]
    NonNumericPort(String),

    #[error("port out of range in endpoint entry '{0}'")]
    PortOutOfRange(String),
}

/// Which phase of a LOB write's close sequence failed — surfaced so
/// callers can tell a transport failure from a validation failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobClosePhase {
    #[error("send")]
    Send,
    #[error("validate")]
    Validate,
    #[error("refresh-session")]
    RefreshSession,
}

/// The closed set of error kinds raised by the router and LOB engine.
///
/// Mirrors the table in §7 of the specification.
#[derive(Error, Debug, Clone)]
pub enum OjpError {
    #[error("invalid locator: {0}")]
    InvalidLocator(#[from] LocatorError),

    #[error("no healthy endpoints available")]
    NoHealthyEndpoints,

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("transport deadline exceeded: {0}")]
    TransportDeadline(String),

    #[error("outbound message too large: {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("remote failure ({code}): {message}")]
    RemoteFailure { code: String, message: String },

    #[error("LOB reference missing a non-empty identifier")]
    LobReferenceMissing,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("LOB write close failed during {phase}: {source}")]
    LobCloseFailed {
        phase: LobClosePhase,
        #[source]
        source: Box<OjpError>,
    },
}

impl OjpError {
    /// Whether the dispatcher should retry this error on another endpoint
    /// (§4.4: "transport-unavailable and transport-deadline are
    /// retryable; any mapped database-level error is terminal").
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OjpError::TransportUnavailable(_) | OjpError::TransportDeadline(_)
        )
    }
}

/// Translates a transport-level gRPC status into the error taxonomy
/// (§4.7). Unknown statuses map to [`OjpError::RemoteFailure`] carrying
/// the original status text and code.
pub fn map_status(status: tonic::Status) -> OjpError {
    use tonic::Code;

    match status.code() {
        Code::Unavailable | Code::Aborted => {
            OjpError::TransportUnavailable(status.message().to_string())
        }
        Code::DeadlineExceeded => OjpError::TransportDeadline(status.message().to_string()),
        Code::Cancelled => OjpError::Cancelled,
        Code::ResourceExhausted if is_message_size_violation(&status) => OjpError::MessageTooLarge {
            size: 0,
            limit: 0,
        },
        other => OjpError::RemoteFailure {
            code: format!("{:?}", other),
            message: status.message().to_string(),
        },
    }
}

fn is_message_size_violation(status: &tonic::Status) -> bool {
    status.message().contains("message length too large")
        || status.message().contains("message too large")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(OjpError::TransportUnavailable("x".into()).is_retryable());
        assert!(OjpError::TransportDeadline("x".into()).is_retryable());
    }

    #[test]
    fn database_errors_are_terminal() {
        assert!(!OjpError::RemoteFailure {
            code: "X".into(),
            message: "y".into()
        }
        .is_retryable());
        assert!(!OjpError::MessageTooLarge { size: 1, limit: 1 }.is_retryable());
    }

    #[test]
    fn maps_unavailable_status() {
        let status = tonic::Status::unavailable("down");
        assert!(matches!(
            map_status(status),
            OjpError::TransportUnavailable(_)
        ));
    }

    #[test]
    fn maps_deadline_status() {
        let status = tonic::Status::deadline_exceeded("slow");
        assert!(matches!(map_status(status), OjpError::TransportDeadline(_)));
    }

    #[test]
    fn maps_unknown_status_to_remote_failure() {
        let status = tonic::Status::invalid_argument("bad sql");
        match map_status(status) {
            OjpError::RemoteFailure { message, .. } => assert_eq!(message, "bad sql"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
