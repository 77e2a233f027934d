//! SASL frame bodies for the security layer

use crate::codec::{Composite, Error as CodecError, FieldReader, Reader};
use crate::primitives::{Array, Binary, Symbol};
use crate::value::Value;

/// Outcome code of the SASL negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslCode {
    /// Connection authentication succeeded
    Ok,

    /// Connection authentication failed due to an unspecified problem with
    /// the supplied credentials
    Auth,

    /// Connection authentication failed due to a system error
    Sys,

    /// Connection authentication failed due to a system error that is
    /// unlikely to be corrected without intervention
    SysPerm,

    /// Connection authentication failed due to a transient system error
    SysTemp,
}

impl From<SaslCode> for Value {
    fn from(code: SaslCode) -> Self {
        Value::UByte(match code {
            SaslCode::Ok => 0,
            SaslCode::Auth => 1,
            SaslCode::Sys => 2,
            SaslCode::SysPerm => 3,
            SaslCode::SysTemp => 4,
        })
    }
}

impl TryFrom<Value> for SaslCode {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::UByte(0) => Ok(SaslCode::Ok),
            Value::UByte(1) => Ok(SaslCode::Auth),
            Value::UByte(2) => Ok(SaslCode::Sys),
            Value::UByte(3) => Ok(SaslCode::SysPerm),
            Value::UByte(4) => Ok(SaslCode::SysTemp),
            _ => Err(value),
        }
    }
}

/// Advertise available sasl mechanisms.
/// <descriptor name="amqp:sasl-mechanisms:list" code="0x00000000:0x00000040"/>
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaslMechanisms {
    /// <field name="sasl-server-mechanisms" type="symbol" multiple="true" mandatory="true"/>
    pub sasl_server_mechanisms: Array<Symbol>,
}

impl Composite for SaslMechanisms {
    const CODE: u64 = 0x0000_0000_0000_0040;
    const NAME: &'static str = "amqp:sasl-mechanisms:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![Value::from(self.sasl_server_mechanisms.clone())]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            sasl_server_mechanisms: reader.required("sasl-server-mechanisms")?,
        })
    }
}

/// Initiate sasl exchange.
/// <descriptor name="amqp:sasl-init:list" code="0x00000000:0x00000041"/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslInit {
    /// <field name="mechanism" type="symbol" mandatory="true"/>
    pub mechanism: Symbol,

    /// <field name="initial-response" type="binary"/>
    pub initial_response: Option<Binary>,

    /// <field name="hostname" type="string"/>
    pub hostname: Option<String>,
}

impl Composite for SaslInit {
    const CODE: u64 = 0x0000_0000_0000_0041;
    const NAME: &'static str = "amqp:sasl-init:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![
            Value::Symbol(self.mechanism.clone()),
            self.initial_response.clone().into(),
            self.hostname.clone().into(),
        ]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            mechanism: reader.required("mechanism")?,
            initial_response: reader.optional()?,
            hostname: reader.optional()?,
        })
    }
}

/// Security mechanism challenge.
/// <descriptor name="amqp:sasl-challenge:list" code="0x00000000:0x00000042"/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslChallenge {
    /// <field name="challenge" type="binary" mandatory="true"/>
    pub challenge: Binary,
}

impl Composite for SaslChallenge {
    const CODE: u64 = 0x0000_0000_0000_0042;
    const NAME: &'static str = "amqp:sasl-challenge:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![Value::Binary(self.challenge.clone())]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            challenge: reader.required("challenge")?,
        })
    }
}

/// Security mechanism response.
/// <descriptor name="amqp:sasl-response:list" code="0x00000000:0x00000043"/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslResponse {
    /// <field name="response" type="binary" mandatory="true"/>
    pub response: Binary,
}

impl Composite for SaslResponse {
    const CODE: u64 = 0x0000_0000_0000_0043;
    const NAME: &'static str = "amqp:sasl-response:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![Value::Binary(self.response.clone())]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            response: reader.required("response")?,
        })
    }
}

/// Indicates the outcome of the sasl dialog.
/// <descriptor name="amqp:sasl-outcome:list" code="0x00000000:0x00000044"/>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslOutcome {
    /// <field name="code" type="sasl-code" mandatory="true"/>
    pub code: SaslCode,

    /// <field name="additional-data" type="binary"/>
    pub additional_data: Option<Binary>,
}

impl Composite for SaslOutcome {
    const CODE: u64 = 0x0000_0000_0000_0044;
    const NAME: &'static str = "amqp:sasl-outcome:list";

    fn to_fields(&self) -> Vec<Value> {
        vec![self.code.into(), self.additional_data.clone().into()]
    }

    fn from_fields(fields: Vec<Value>) -> Result<Self, CodecError> {
        let mut reader = FieldReader::new(fields);
        Ok(Self {
            code: reader.required("code")?,
            additional_data: reader.optional()?,
        })
    }
}

/// A SASL frame body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslFrameBody {
    /// amqp:sasl-mechanisms:list
    Mechanisms(SaslMechanisms),

    /// amqp:sasl-init:list
    Init(SaslInit),

    /// amqp:sasl-challenge:list
    Challenge(SaslChallenge),

    /// amqp:sasl-response:list
    Response(SaslResponse),

    /// amqp:sasl-outcome:list
    Outcome(SaslOutcome),
}

impl SaslFrameBody {
    /// The described-list value of the body
    pub fn to_value(&self) -> Value {
        match self {
            SaslFrameBody::Mechanisms(body) => body.to_value(),
            SaslFrameBody::Init(body) => body.to_value(),
            SaslFrameBody::Challenge(body) => body.to_value(),
            SaslFrameBody::Response(body) => body.to_value(),
            SaslFrameBody::Outcome(body) => body.to_value(),
        }
    }

    /// Decodes a SASL frame body from the reader
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Self::try_from_value(Value::decode(reader)?)
    }

    /// Parses a SASL frame body out of a described-list value
    pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
        let described = match &value {
            Value::Described(described) => described,
            other => {
                return Err(CodecError::TypeMismatch {
                    expecting: "sasl frame body",
                    found: other.type_name(),
                })
            }
        };

        let descriptor = &described.descriptor;
        if descriptor.matches(SaslMechanisms::CODE, SaslMechanisms::NAME) {
            SaslMechanisms::try_from_value(value).map(SaslFrameBody::Mechanisms)
        } else if descriptor.matches(SaslInit::CODE, SaslInit::NAME) {
            SaslInit::try_from_value(value).map(SaslFrameBody::Init)
        } else if descriptor.matches(SaslChallenge::CODE, SaslChallenge::NAME) {
            SaslChallenge::try_from_value(value).map(SaslFrameBody::Challenge)
        } else if descriptor.matches(SaslResponse::CODE, SaslResponse::NAME) {
            SaslResponse::try_from_value(value).map(SaslFrameBody::Response)
        } else if descriptor.matches(SaslOutcome::CODE, SaslOutcome::NAME) {
            SaslOutcome::try_from_value(value).map(SaslFrameBody::Outcome)
        } else {
            Err(CodecError::UnexpectedDescriptor(descriptor.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sasl_mechanisms_round_trip() {
        let mechanisms = SaslMechanisms {
            sasl_server_mechanisms: Array::from(vec![
                Symbol::from("PLAIN"),
                Symbol::from("ANONYMOUS"),
            ]),
        };
        let decoded = SaslFrameBody::try_from_value(mechanisms.to_value()).unwrap();
        assert_eq!(decoded, SaslFrameBody::Mechanisms(mechanisms));
    }

    #[test]
    fn sasl_outcome_code_domain() {
        let outcome = SaslOutcome {
            code: SaslCode::Auth,
            additional_data: None,
        };
        let decoded = SaslOutcome::try_from_value(outcome.to_value()).unwrap();
        assert_eq!(outcome, decoded);
    }
}
