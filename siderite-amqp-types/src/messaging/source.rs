//! The source terminus of a link

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::definitions::{self, Fields, Seconds};
use crate::primitives::{Array, Symbol};
use crate::value::Value;

use super::delivery_state::Outcome;
use super::terminus::{DistributionMode, TerminusDurability, TerminusExpiryPolicy};
use super::Address;

/// A mapping from filter name to filter descriptor
pub type FilterSet = Fields;

/// The source from which messages originate on a link.
/// <type name="source" class="composite" source="list" provides="source">
///     <descriptor name="amqp:source:list" code="0x00000000:0x00000028"/>
/// </type>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
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

    /// <field name="distribution-mode" type="symbol" requires="distribution-mode"/>
    pub distribution_mode: Option<DistributionMode>,

    /// <field name="filter" type="filter-set"/>
    pub filter: Option<FilterSet>,

    /// <field name="default-outcome" type="*" requires="outcome"/>
    pub default_outcome: Option<Outcome>,

    /// <field name="outcomes" type="symbol" multiple="true"/>
    pub outcomes: Option<Array<Symbol>>,

    /// <field name="capabilities" type="symbol" multiple="true"/>
    pub capabilities: Option<Array<Symbol>>,
}

impl Source {
    /// Creates a builder for [`Source`]
    pub fn builder() -> Builder {
        Builder::new()
    }
}

impl From<&str> for Source {
    fn from(address: &str) -> Self {
        Self {
            address: Some(address.to_string()),
            ..Default::default()
        }
    }
}

impl From<String> for Source {
    fn from(address: String) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }
}

impl Composite for Source {
    const CODE: u64 = 0x0000_0000_0000_0028;
    const NAME: &'static str = "amqp:source:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            self.address.clone().into(),
            self.durable.into(),
            self.expiry_policy.into(),
            Value::UInt(self.timeout),
            Value::Bool(self.dynamic),
            definitions::fields_to_value(self.dynamic_node_properties.as_ref()),
            self.distribution_mode.into(),
            definitions::fields_to_value(self.filter.as_ref()),
            match &self.default_outcome {
                Some(outcome) => outcome.to_value(),
                None => Value::Null,
            },
            definitions::symbol_array_to_value(self.outcomes.as_ref()),
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
            distribution_mode: reader.optional()?,
            filter: reader.optional()?,
            default_outcome: match reader.next_value() {
                Value::Null => None,
                value => Some(Outcome::try_from_value(value)?),
            },
            outcomes: reader.optional()?,
            capabilities: reader.optional()?,
        })
    }
}

/// Builder for [`Source`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    source: Source,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address
    pub fn address(mut self, address: impl Into<Address>) -> Self {
        self.source.address = Some(address.into());
        self
    }

    /// Sets the durability policy
    pub fn durable(mut self, durable: TerminusDurability) -> Self {
        self.source.durable = durable;
        self
    }

    /// Sets the expiry policy
    pub fn expiry_policy(mut self, policy: TerminusExpiryPolicy) -> Self {
        self.source.expiry_policy = policy;
        self
    }

    /// Sets the timeout
    pub fn timeout(mut self, timeout: Seconds) -> Self {
        self.source.timeout = timeout;
        self
    }

    /// Requests a dynamically created node
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.source.dynamic = dynamic;
        self
    }

    /// Sets the distribution mode
    pub fn distribution_mode(mut self, mode: DistributionMode) -> Self {
        self.source.distribution_mode = Some(mode);
        self
    }

    /// Sets the filter set
    pub fn filter(mut self, filter: FilterSet) -> Self {
        self.source.filter = Some(filter);
        self
    }

    /// Sets the default outcome
    pub fn default_outcome(mut self, outcome: Outcome) -> Self {
        self.source.default_outcome = Some(outcome);
        self
    }

    /// Sets the supported outcomes
    pub fn outcomes(mut self, outcomes: impl Into<Array<Symbol>>) -> Self {
        self.source.outcomes = Some(outcomes.into());
        self
    }

    /// Sets the capabilities
    pub fn capabilities(mut self, capabilities: impl Into<Array<Symbol>>) -> Self {
        self.source.capabilities = Some(capabilities.into());
        self
    }

    /// Builds the source
    pub fn build(self) -> Source {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trip() {
        let source = Source::builder()
            .address("q1")
            .durable(TerminusDurability::Configuration)
            .dynamic(false)
            .capabilities(vec![Symbol::from("topic")])
            .build();
        let decoded = Source::try_from_value(source.to_value()).unwrap();
        assert_eq!(source, decoded);
    }

    #[test]
    fn short_field_list_applies_defaults() {
        // only the address field present
        let source = Source::from_fields(vec![Value::from("q1")]).unwrap();
        assert_eq!(source.address.as_deref(), Some("q1"));
        assert_eq!(source.expiry_policy, TerminusExpiryPolicy::SessionEnd);
        assert_eq!(source.durable, TerminusDurability::None);
    }
}
