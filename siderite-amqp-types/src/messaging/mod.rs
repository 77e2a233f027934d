//! The messaging layer: message sections, termini and delivery states

mod annotations;
mod app_properties;
mod body;
mod delivery_state;
mod header;
mod message;
mod message_id;
mod properties;
mod source;
mod target;
mod terminus;

pub use annotations::{Annotations, DeliveryAnnotations, Footer, MessageAnnotations};
pub use app_properties::ApplicationProperties;
pub use body::{AmqpSequence, AmqpValue, Body, Data};
pub use delivery_state::{Accepted, DeliveryState, Modified, Outcome, Received, Rejected, Released};
pub use header::{Header, Priority};
pub use message::{Message, MESSAGE_FORMAT};
pub use message_id::MessageId;
pub use properties::Properties;
pub use source::{Builder as SourceBuilder, FilterSet, Source};
pub use target::{Builder as TargetBuilder, Target};
pub use terminus::{DistributionMode, TerminusDurability, TerminusExpiryPolicy};

/// The address of a node
pub type Address = String;
