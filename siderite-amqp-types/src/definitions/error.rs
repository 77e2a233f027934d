//! The error composite carried in detach, end and close frames

use crate::codec::{Composite, Error as CodecError, FieldReader};
use crate::value::Value;

use super::{ErrorCondition, Fields};

/// Details of an error.
/// <type name="error" class="composite" source="list">
///     <descriptor name="amqp:error:list" code="0x00000000:0x0000001d"/>
///     <field name="condition" type="symbol" requires="error-condition" mandatory="true"/>
///     <field name="description" type="string"/>
///     <field name="info" type="fields"/>
/// </type>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// A symbolic value indicating the error condition
    pub condition: ErrorCondition,

    /// Descriptive text about the error condition
    pub description: Option<String>,

    /// Map carrying information about the error condition
    pub info: Option<Fields>,
}

impl Error {
    /// Creates a new error
    pub fn new(
        condition: impl Into<ErrorCondition>,
        description: impl Into<Option<String>>,
        info: impl Into<Option<Fields>>,
    ) -> Self {
        Self {
            condition: condition.into(),
            description: description.into(),
            info: info.into(),
        }
    }
}

macro_rules! impl_from_condition {
    ($ty:ty) => {
        impl From<$ty> for Error {
            fn from(condition: $ty) -> Self {
                Self {
                    condition: condition.into(),
                    description: None,
                    info: None,
                }
            }
        }
    };
}

impl_from_condition!(ErrorCondition);
impl_from_condition!(super::AmqpError);
impl_from_condition!(super::ConnectionError);
impl_from_condition!(super::SessionError);
impl_from_condition!(super::LinkError);
impl_from_condition!(super::ServiceError);

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.condition)?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

impl Composite for Error {
    const CODE: u64 = 0x0000_0000_0000_001d;
    const NAME: &'static str = "amqp:error:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::from(self.condition.clone()),
            self.description.clone().into(),
            super::fields_to_value(self.info.as_ref()),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            condition: reader.required("condition")?,
            description: reader.optional()?,
            info: reader.optional()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::AmqpError;

    #[test]
    fn error_round_trip() {
        let error = Error::new(
            AmqpError::DecodeError,
            Some("bad input".to_string()),
            None,
        );
        let value = error.to_value();
        let decoded = Error::try_from_value(value).unwrap();
        assert_eq!(error, decoded);
    }

    #[test]
    fn condition_is_mandatory() {
        let result = Error::from_fields(vec![Value::Null]);
        assert!(result.is_err());
    }
}
