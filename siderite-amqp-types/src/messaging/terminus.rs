//! Terminus durability, expiry and distribution-mode domains

use crate::primitives::Symbol;
use crate::value::Value;

/// Durability policy of a terminus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminusDurability {
    /// No terminus state is retained durably
    #[default]
    None,

    /// Only the existence and configuration of the terminus is retained
    Configuration,

    /// The existence, configuration and unsettled state are retained
    UnsettledState,
}

impl From<TerminusDurability> for Value {
    fn from(durability: TerminusDurability) -> Self {
        Value::UInt(match durability {
            TerminusDurability::None => 0,
            TerminusDurability::Configuration => 1,
            TerminusDurability::UnsettledState => 2,
        })
    }
}

impl TryFrom<Value> for TerminusDurability {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::UInt(0) => Ok(TerminusDurability::None),
            Value::UInt(1) => Ok(TerminusDurability::Configuration),
            Value::UInt(2) => Ok(TerminusDurability::UnsettledState),
            _ => Err(value),
        }
    }
}

/// Expiry policy of a terminus
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminusExpiryPolicy {
    /// The expiry timer starts when the terminus is detached
    LinkDetach,

    /// The expiry timer starts when the most recently associated session is
    /// ended
    #[default]
    SessionEnd,

    /// The expiry timer starts when the most recently associated connection
    /// is closed
    ConnectionClose,

    /// The terminus never expires
    Never,
}

impl TerminusExpiryPolicy {
    fn as_str(&self) -> &'static str {
        match self {
            TerminusExpiryPolicy::LinkDetach => "link-detach",
            TerminusExpiryPolicy::SessionEnd => "session-end",
            TerminusExpiryPolicy::ConnectionClose => "connection-close",
            TerminusExpiryPolicy::Never => "never",
        }
    }
}

impl From<TerminusExpiryPolicy> for Value {
    fn from(policy: TerminusExpiryPolicy) -> Self {
        Value::Symbol(Symbol::from(policy.as_str()))
    }
}

impl TryFrom<Value> for TerminusExpiryPolicy {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let symbol = match &value {
            Value::Symbol(symbol) => symbol,
            _ => return Err(value),
        };
        match symbol.as_str() {
            "link-detach" => Ok(TerminusExpiryPolicy::LinkDetach),
            "session-end" => Ok(TerminusExpiryPolicy::SessionEnd),
            "connection-close" => Ok(TerminusExpiryPolicy::ConnectionClose),
            "never" => Ok(TerminusExpiryPolicy::Never),
            _ => Err(value),
        }
    }
}

/// Link distribution policy of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionMode {
    /// The link is the sole receiver of messages from the source
    Move,

    /// The link receives a copy of each message from the source
    Copy,
}

impl From<DistributionMode> for Value {
    fn from(mode: DistributionMode) -> Self {
        Value::Symbol(Symbol::from(match mode {
            DistributionMode::Move => "move",
            DistributionMode::Copy => "copy",
        }))
    }
}

impl TryFrom<Value> for DistributionMode {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let symbol = match &value {
            Value::Symbol(symbol) => symbol,
            _ => return Err(value),
        };
        match symbol.as_str() {
            "move" => Ok(DistributionMode::Move),
            "copy" => Ok(DistributionMode::Copy),
            _ => Err(value),
        }
    }
}
