//! The target terminus of a link

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, Seconds};
use crate::primitives::{Array, Symbol};
use crate::value::Value;

use super::terminus::{TerminusDurability, TerminusExpiryPolicy};
use super::Address;

/// The target to which messages are sent on a link.
/// <type name="target" class="composite" source="list" provides="target">
///     <descriptor name="amqp:target:list" code="0x00000000:0x00000029"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    /// <field name="address" type="*" requires="address"/>
    pub address: Option<Address>,

    /// <field name="durable" type="terminus-durability" default="none"/>
    pub durable: TerminusDurability,

    /// <field name="expiry-policy" type="terminus-expiry-policy" default="session-end"/>
    pub expiry_policy: TerminusExpiryPolicy,

    /// <field name="timeout" type="seconds" default="0"/>
    pub timeout: Seconds,

    /// <field name="dynamic" type="boolean" default="false"/>
    pub dynamic: bool,

    /// <field name="dynamic-node-properties" type="node-properties"/>
    pub dynamic_node_properties: Option<Fields>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Target {
    /// Creates a builder for [`Target`]
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl From<&str> for Target {
    fn from(address: &str) -> Self {
        Self {
            address: Some(address.to_string()),
            ..Default::default()
        }
    }
}

impl From<String> for Target {
    fn from(address: String) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }
}

impl Composite for Target {
    const CODE: u64 = 0x0000_0000_0000_0029;
    const NAME: &'static str = "amqp:target:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.address.clone().into(),
            self.durable.into(),
            self.expiry_policy.into(),
            Value::UInt(self.timeout),
            Value::Bool(self.dynamic),
            definitions::fields_to_value(self.dynamic_node_properties.as_ref()),
            definitions::symbol_array_to_value(self.capabilities.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            address: reader.optional()?,
            durable: reader.default_or(TerminusDurability::None)?,
            expiry_policy: reader.default_or(TerminusExpiryPolicy::SessionEnd)?,
            timeout: reader.default_or(0)?,
            dynamic: reader.default_or(false)?,
            dynamic_node_properties: reader.optional()?,
            capabilities: reader.optional()?,
        })
    }
}

/// Builder for [`Target`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    target: Target,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address
    pub fn address(mut self, address: impl Into<Address>) -> Self {
        self.target.address = Some(address.into());
        self
    }

    /// Sets the durability policy
    pub fn durable(mut self, durable: TerminusDurability) -> Self {
        self.target.durable = durable;
        self
    }

    /// Sets the expiry policy
    pub fn expiry_policy(mut self, policy: TerminusExpiryPolicy) -> Self {
        self.target.expiry_policy = policy;
        self
    }

    /// Sets the timeout
    pub fn timeout(mut self, timeout: Seconds) -> Self {
        self.target.timeout = timeout;
        self
    }

    /// Requests a dynamically created node
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.target.dynamic = dynamic;
        self
    }

    /// Sets the dynamic node properties
    pub fn dynamic_node_properties(mut self, properties: Fields) -> Self {
        self.target.dynamic_node_properties = Some(properties);
        self
    }

    /// Sets the capabilities
    pub fn capabilities(mut self, capabilities: impl Into<Array<Symbol>>) -> Self {
        self.target.capabilities = Some(capabilities.into());
        self
    }

    /// Builds the target
    pub fn build(self) -> Target {
        self.target
    }
}
