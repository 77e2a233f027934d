//! Annotation sections keyed by symbol
//!
//! Unlike performatives these sections are described *maps*, so they do not
//! go through the described-list [`Composite`](crate::codec::Composite)
//! machinery.

use crate::codec::Error as CodecError;
use crate::definitions::Fields;
use crate::primitives::{OrderedMap, Symbol};
use crate::value::{Described, Descriptor, Value};

/// An annotation map keyed by symbol
pub type Annotations = Fields;

macro_rules! annotation_section {
    ($(#[$attr:meta])* $name:ident, $code:literal, $descriptor:literal) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name(pub Annotations);

        impl $name {
            /// Numeric descriptor code
            pub const CODE: u64 = $code;

            /// Symbolic descriptor name
            pub const NAME: &'static str = $descriptor;

            /// Creates an empty section
            pub fn new() -> Self {
                Self(Annotations::new())
            }

            /// Inserts an annotation
            pub fn insert(&mut self, key: impl Into<Symbol>, value: impl Into<Value>) -> Option<Value> {
                self.0.insert(key.into(), value.into())
            }

            /// Looks up an annotation
            pub fn get(&self, key: &str) -> Option<&Value> {
                self.0.get(&Symbol::from(key))
            }

            /// Number of annotations
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// Whether the section holds no annotations
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the section and returns the annotation map
            pub fn into_inner(self) -> Annotations {
                self.0
            }

            /// The described-map value of this section
            pub fn to_value(&self) -> Value {
                Value::Described(Box::new(Described {
                    descriptor: Descriptor::Code(Self::CODE),
                    value: Value::from(self.0.clone()),
                }))
            }

            /// Parses the section out of a described-map value
            pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
                let described = match value {
                    Value::Described(described) => *described,
                    other => {
                        return Err(CodecError::TypeMismatch {
                            expecting: Self::NAME,
                            found: other.type_name(),
                        })
                    }
                };
                if !described.descriptor.matches(Self::CODE, Self::NAME) {
                    return Err(CodecError::UnexpectedDescriptor(
                        described.descriptor.to_string(),
                    ));
                }
                let found = described.value.type_name();
                let map: OrderedMap<Symbol, Value> = described
                    .value
                    .try_into()
                    .map_err(|_| CodecError::TypeMismatch {
                        expecting: "map keyed by symbol",
                        found,
                    })?;
                Ok(Self(map))
            }
        }

        impl From<Annotations> for $name {
            fn from(annotations: Annotations) -> Self {
                Self(annotations)
            }
        }
    };
}

annotation_section!(
    /// Delivery attributes to be consumed by intermediaries on the path.
    /// <descriptor name="amqp:delivery-annotations:map" code="0x00000000:0x00000071"/>
    DeliveryAnnotations,
    0x0000_0000_0000_0071,
    "amqp:delivery-annotations:map"
);

annotation_section!(
    /// Message attributes propagated across every delivery step.
    /// <descriptor name="amqp:message-annotations:map" code="0x00000000:0x00000072"/>
    MessageAnnotations,
    0x0000_0000_0000_0072,
    "amqp:message-annotations:map"
);

annotation_section!(
    /// Details about the message that can only be calculated or evaluated
    /// after the whole bare message has been constructed.
    /// <descriptor name="amqp:footer:map" code="0x00000000:0x00000078"/>
    Footer,
    0x0000_0000_0000_0078,
    "amqp:footer:map"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotations_round_trip() {
        let mut annotations = MessageAnnotations::new();
        annotations.insert("x-opt-partition-key", "p0");
        let decoded = MessageAnnotations::try_from_value(annotations.to_value()).unwrap();
        assert_eq!(annotations, decoded);
    }

    #[test]
    fn wrong_descriptor_is_rejected() {
        let annotations = MessageAnnotations::new();
        let result = Footer::try_from_value(annotations.to_value());
        assert!(result.is_err());
    }
}
