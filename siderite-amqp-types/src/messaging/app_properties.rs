//! The application-properties section of a message

use crate::codec::Error as CodecError;
use crate::primitives::{OrderedMap, SimpleValue};
use crate::value::{Described, Descriptor, Value};

/// Structured application data keyed by string.
/// <descriptor name="amqp:application-properties:map" code="0x00000000:0x00000074"/>
///
/// Values are restricted to simple scalar types; list, map, array and
/// described values are rejected on both construction and decode.
///
/// Encoding always produces the described form. Decoding also accepts a
/// bare map, which some implementations emit for the request and response
/// messages of the management and claims-based-security protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationProperties(pub OrderedMap<String, SimpleValue>);

impl ApplicationProperties {
    /// Numeric descriptor code
    pub const CODE: u64 = 0x0000_0000_0000_0074;

    /// Symbolic descriptor name
    pub const NAME: &'static str = "amqp:application-properties:map";

    /// Creates an empty section
    pub fn new() -> Self {
        Self(OrderedMap::new())
    }

    /// Creates a builder for [`ApplicationProperties`]
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Inserts a property
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SimpleValue>) -> Option<SimpleValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up a property
    pub fn get(&self, key: &str) -> Option<&SimpleValue> {
        self.0.get(key)
    }

    /// Removes a property
    pub fn remove(&mut self, key: &str) -> Option<SimpleValue> {
        self.0.remove(key)
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the section holds no properties
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a mutable reference to the inner map
    pub fn as_inner_mut(&mut self) -> &mut OrderedMap<String, SimpleValue> {
        &mut self.0
    }

    /// The described-map value of this section
    pub fn to_value(&self) -> Value {
        let map: OrderedMap<Value, Value> = self
            .0
            .iter()
            .map(|(key, val)| (Value::String(key.clone()), Value::from(val.clone())))
            .collect();
        Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Self::CODE),
            value: Value::Map(map),
        }))
    }

    /// Parses the section out of a described-map or bare-map value
    pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
        let map_value = match value {
            Value::Described(described) => {
                if !described.descriptor.matches(Self::CODE, Self::NAME) {
                    return Err(CodecError::UnexpectedDescriptor(
                        described.descriptor.to_string(),
                    ));
                }
                described.value
            }
            // tolerate the undescribed encoding
            value @ Value::Map(_) => value,
            other => {
                return Err(CodecError::TypeMismatch {
                    expecting: Self::NAME,
                    found: other.type_name(),
                })
            }
        };

        let map = match map_value {
            Value::Map(map) => map,
            other => {
                return Err(CodecError::TypeMismatch {
                    expecting: "map",
                    found: other.type_name(),
                })
            }
        };

        let mut properties = OrderedMap::new();
        for (key, val) in map.into_iter() {
            let key = match key {
                Value::String(key) => key,
                Value::Symbol(key) => key.into_inner(),
                other => {
                    return Err(CodecError::TypeMismatch {
                        expecting: "string key",
                        found: other.type_name(),
                    })
                }
            };
            let found = val.type_name();
            let val = SimpleValue::try_from(val).map_err(|_| CodecError::TypeMismatch {
                expecting: "simple value",
                found,
            })?;
            properties.insert(key, val);
        }
        Ok(Self(properties))
    }
}

impl From<OrderedMap<String, SimpleValue>> for ApplicationProperties {
    fn from(map: OrderedMap<String, SimpleValue>) -> Self {
        Self(map)
    }
}

/// Builder for [`ApplicationProperties`]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    properties: ApplicationProperties,
}

impl Builder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a property
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<SimpleValue>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Builds the section
    pub fn build(self) -> ApplicationProperties {
        self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn described_and_bare_encodings_both_decode() {
        let properties = ApplicationProperties::builder()
            .insert("statusCode", 202u32)
            .insert("statusDescription", "Accepted")
            .build();

        // described form
        let decoded = ApplicationProperties::try_from_value(properties.to_value()).unwrap();
        assert_eq!(properties, decoded);

        // bare form
        let bare = match properties.to_value() {
            Value::Described(described) => described.value,
            _ => unreachable!(),
        };
        let decoded = ApplicationProperties::try_from_value(bare).unwrap();
        assert_eq!(properties, decoded);
    }

    #[test]
    fn compound_values_are_rejected() {
        let mut map: OrderedMap<Value, Value> = OrderedMap::new();
        map.insert(Value::from("key"), Value::List(vec![]));
        let result = ApplicationProperties::try_from_value(Value::Map(map));
        assert!(result.is_err());
    }
}
