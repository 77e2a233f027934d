//! Error conditions carried in the condition field of an error

use crate::primitives::Symbol;
use crate::value::Value;

/// Shared error conditions (amqp:*)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmqpError {
    /// An internal error occurred
    InternalError,

    /// A peer attempted to work with a remote entity that does not exist
    NotFound,

    /// A peer attempted to work with a remote entity to which it has no access
    UnauthorizedAccess,

    /// Data could not be decoded
    DecodeError,

    /// A peer exceeded its resource allocation
    ResourceLimitExceeded,

    /// The peer tried to use a frame in a manner that is inconsistent with
    /// the semantics defined in the specification
    NotAllowed,

    /// An invalid field was passed in a frame body
    InvalidField,

    /// The peer tried to use functionality that is not implemented
    NotImplemented,

    /// The client attempted to work with a server entity to which it has
    /// access because another client is working with it
    ResourceLocked,

    /// The client made a request that was not allowed because some
    /// precondition failed
    PreconditionFailed,

    /// A server entity the client is working with has been deleted
    ResourceDeleted,

    /// The peer sent a frame that is not permitted in the current state
    IllegalState,

    /// The peer cannot send a frame because the smallest encoding of the
    /// performative with the currently valid values would be too large
    FrameSizeTooSmall,
}

impl AmqpError {
    /// The wire symbol of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            AmqpError::InternalError => "amqp:internal-error",
            AmqpError::NotFound => "amqp:not-found",
            AmqpError::UnauthorizedAccess => "amqp:unauthorized-access",
            AmqpError::DecodeError => "amqp:decode-error",
            AmqpError::ResourceLimitExceeded => "amqp:resource-limit-exceeded",
            AmqpError::NotAllowed => "amqp:not-allowed",
            AmqpError::InvalidField => "amqp:invalid-field",
            AmqpError::NotImplemented => "amqp:not-implemented",
            AmqpError::ResourceLocked => "amqp:resource-locked",
            AmqpError::PreconditionFailed => "amqp:precondition-failed",
            AmqpError::ResourceDeleted => "amqp:resource-deleted",
            AmqpError::IllegalState => "amqp:illegal-state",
            AmqpError::FrameSizeTooSmall => "amqp:frame-size-too-small",
        }
    }
}

/// Connection-level error conditions (amqp:connection:*)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// The operator intervened to close the connection for some reason
    ConnectionForced,

    /// A valid frame header cannot be formed from the incoming byte stream
    FramingError,

    /// The container is no longer available on the current connection
    Redirect,
}

impl ConnectionError {
    /// The wire symbol of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionError::ConnectionForced => "amqp:connection:forced",
            ConnectionError::FramingError => "amqp:connection:framing-error",
            ConnectionError::Redirect => "amqp:connection:redirect",
        }
    }
}

/// Session-level error conditions (amqp:session:*)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The peer violated incoming window for the session
    WindowViolation,

    /// Input was received for a link that was detached with an error
    ErrantLink,

    /// An attach was received using a handle that is already in use for an
    /// attached link
    HandleInUse,

    /// A frame (other than attach) was received referencing a handle which
    /// is not currently in use of an attached link
    UnattachedHandle,
}

impl SessionError {
    /// The wire symbol of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionError::WindowViolation => "amqp:session:window-violation",
            SessionError::ErrantLink => "amqp:session:errant-link",
            SessionError::HandleInUse => "amqp:session:handle-in-use",
            SessionError::UnattachedHandle => "amqp:session:unattached-handle",
        }
    }
}

/// Link-level error conditions (amqp:link:*)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// An operator intervened to detach for some reason
    DetachForced,

    /// The peer sent a larger message than is supported on the link
    MessageSizeExceeded,

    /// The address provided cannot be resolved to a terminus at the current
    /// container
    Redirect,

    /// The link has been attached elsewhere, causing the existing
    /// attachment to be forcibly closed
    Stolen,

    /// The peer sent more message transfers than currently allowed on the
    /// link
    TransferLimitExceeded,
}

impl LinkError {
    /// The wire symbol of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkError::DetachForced => "amqp:link:detach-forced",
            LinkError::MessageSizeExceeded => "amqp:link:message-size-exceeded",
            LinkError::Redirect => "amqp:link:redirect",
            LinkError::Stolen => "amqp:link:stolen",
            LinkError::TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
        }
    }
}

/// Service-dialect error conditions used by Service Bus and Event Hubs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// The server is busy; the operation should be retried later
    ServerBusy,

    /// The operation timed out on the service side
    Timeout,

    /// An argument was rejected by the service
    ArgumentError,

    /// An argument was outside the range accepted by the service
    ArgumentOutOfRange,

    /// The messaging entity is disabled
    EntityDisabled,

    /// The named entity already exists
    EntityAlreadyExists,

    /// The partition is not owned by the requesting client
    PartitionNotOwned,

    /// The lock on the message was lost
    MessageLockLost,

    /// The lock on the session was lost
    SessionLockLost,

    /// The epoch-based publisher was revoked by a newer publisher
    PublisherRevoked,

    /// The store lock was lost
    StoreLockLost,

    /// The operation was cancelled on the service side
    OperationCancelled,
}

impl ServiceError {
    /// The wire symbol of the condition
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceError::ServerBusy => "com.microsoft:server-busy",
            ServiceError::Timeout => "com.microsoft:timeout",
            ServiceError::ArgumentError => "com.microsoft:argument-error",
            ServiceError::ArgumentOutOfRange => "com.microsoft:argument-out-of-range",
            ServiceError::EntityDisabled => "com.microsoft:entity-disabled",
            ServiceError::EntityAlreadyExists => "com.microsoft:entity-already-exists",
            ServiceError::PartitionNotOwned => "com.microsoft:partition-not-owned",
            ServiceError::MessageLockLost => "com.microsoft:message-lock-lost",
            ServiceError::SessionLockLost => "com.microsoft:session-lock-lost",
            ServiceError::PublisherRevoked => "com.microsoft:publisher-revoked",
            ServiceError::StoreLockLost => "com.microsoft:store-lock-lost",
            ServiceError::OperationCancelled => "com.microsoft:operation-cancelled",
        }
    }
}

/// The extensible set of error conditions.
///
/// Standard conditions decode to their named variants; any other symbol
/// received on the wire is preserved in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCondition {
    /// Shared condition
    Amqp(AmqpError),

    /// Connection-level condition
    Connection(ConnectionError),

    /// Session-level condition
    Session(SessionError),

    /// Link-level condition
    Link(LinkError),

    /// Service-dialect condition
    Service(ServiceError),

    /// Any condition not defined above
    Custom(Symbol),
}

impl ErrorCondition {
    /// The wire symbol of the condition
    pub fn symbol(&self) -> Symbol {
        match self {
            ErrorCondition::Amqp(err) => Symbol::from(err.as_str()),
            ErrorCondition::Connection(err) => Symbol::from(err.as_str()),
            ErrorCondition::Session(err) => Symbol::from(err.as_str()),
            ErrorCondition::Link(err) => Symbol::from(err.as_str()),
            ErrorCondition::Service(err) => Symbol::from(err.as_str()),
            ErrorCondition::Custom(symbol) => symbol.clone(),
        }
    }
}

impl From<AmqpError> for ErrorCondition {
    fn from(err: AmqpError) -> Self {
        ErrorCondition::Amqp(err)
    }
}

impl From<ConnectionError> for ErrorCondition {
    fn from(err: ConnectionError) -> Self {
        ErrorCondition::Connection(err)
    }
}

impl From<SessionError> for ErrorCondition {
    fn from(err: SessionError) -> Self {
        ErrorCondition::Session(err)
    }
}

impl From<LinkError> for ErrorCondition {
    fn from(err: LinkError) -> Self {
        ErrorCondition::Link(err)
    }
}

impl From<ServiceError> for ErrorCondition {
    fn from(err: ServiceError) -> Self {
        ErrorCondition::Service(err)
    }
}

impl From<Symbol> for ErrorCondition {
    fn from(symbol: Symbol) -> Self {
        let all_amqp = [
            AmqpError::InternalError,
            AmqpError::NotFound,
            AmqpError::UnauthorizedAccess,
            AmqpError::DecodeError,
            AmqpError::ResourceLimitExceeded,
            AmqpError::NotAllowed,
            AmqpError::InvalidField,
            AmqpError::NotImplemented,
            AmqpError::ResourceLocked,
            AmqpError::PreconditionFailed,
            AmqpError::ResourceDeleted,
            AmqpError::IllegalState,
            AmqpError::FrameSizeTooSmall,
        ];
        if let Some(err) = all_amqp.iter().find(|e| symbol == e.as_str()) {
            return ErrorCondition::Amqp(*err);
        }

        let all_connection = [
            ConnectionError::ConnectionForced,
            ConnectionError::FramingError,
            ConnectionError::Redirect,
        ];
        if let Some(err) = all_connection.iter().find(|e| symbol == e.as_str()) {
            return ErrorCondition::Connection(*err);
        }

        let all_session = [
            SessionError::WindowViolation,
            SessionError::ErrantLink,
            SessionError::HandleInUse,
            SessionError::UnattachedHandle,
        ];
        if let Some(err) = all_session.iter().find(|e| symbol == e.as_str()) {
            return ErrorCondition::Session(*err);
        }

        let all_link = [
            LinkError::DetachForced,
            LinkError::MessageSizeExceeded,
            LinkError::Redirect,
            LinkError::Stolen,
            LinkError::TransferLimitExceeded,
        ];
        if let Some(err) = all_link.iter().find(|e| symbol == e.as_str()) {
            return ErrorCondition::Link(*err);
        }

        let all_service = [
            ServiceError::ServerBusy,
            ServiceError::Timeout,
            ServiceError::ArgumentError,
            ServiceError::ArgumentOutOfRange,
            ServiceError::EntityDisabled,
            ServiceError::EntityAlreadyExists,
            ServiceError::PartitionNotOwned,
            ServiceError::MessageLockLost,
            ServiceError::SessionLockLost,
            ServiceError::PublisherRevoked,
            ServiceError::StoreLockLost,
            ServiceError::OperationCancelled,
        ];
        if let Some(err) = all_service.iter().find(|e| symbol == e.as_str()) {
            return ErrorCondition::Service(*err);
        }

        ErrorCondition::Custom(symbol)
    }
}

impl From<ErrorCondition> for Value {
    fn from(condition: ErrorCondition) -> Self {
        Value::Symbol(condition.symbol())
    }
}

impl TryFrom<Value> for ErrorCondition {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Symbol(symbol) => Ok(ErrorCondition::from(symbol)),
            Value::String(string) => Ok(ErrorCondition::from(Symbol::from(string))),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_map_to_named_variants() {
        let cond = ErrorCondition::from(Symbol::from("amqp:link:stolen"));
        assert_eq!(cond, ErrorCondition::Link(LinkError::Stolen));

        let cond = ErrorCondition::from(Symbol::from("com.microsoft:server-busy"));
        assert_eq!(cond, ErrorCondition::Service(ServiceError::ServerBusy));
    }

    #[test]
    fn unknown_symbols_are_preserved() {
        let cond = ErrorCondition::from(Symbol::from("vendor:weird"));
        assert_eq!(cond, ErrorCondition::Custom(Symbol::from("vendor:weird")));
        assert_eq!(cond.symbol(), Symbol::from("vendor:weird"));
    }
}
