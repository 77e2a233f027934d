//! The transport performatives of part 2.7 of the specification

mod attach;
mod begin;
mod close;
mod detach;
mod disposition;
mod end;
mod flow;
mod open;
mod transfer;

pub use attach::Attach;
pub use begin::Begin;
pub use close::Close;
pub use detach::Detach;
pub use disposition::Disposition;
pub use end::End;
pub use flow::Flow;
pub use open::{ChannelMax, MaxFrameSize, Open};
pub use transfer::Transfer;

use crate::codec::{Composite, Error as CodecError, Reader};
use crate::value::{Descriptor, Value};

/// A performative: the body of an AMQP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Performative {
    /// amqp:open:list
    Open(Open),

    /// amqp:begin:list
    Begin(Begin),

    /// amqp:attach:list
    Attach(Attach),

    /// amqp:flow:list
    Flow(Flow),

    /// amqp:transfer:list
    Transfer(Transfer),

    /// amqp:disposition:list
    Disposition(Disposition),

    /// amqp:detach:list
    Detach(Detach),

    /// amqp:end:list
    End(End),

    /// amqp:close:list
    Close(Close),
}

impl Performative {
    /// The described-list value of the performative
    pub fn to_value(&self) -> Value {
        match self {
            Performative::Open(p) => p.to_value(),
            Performative::Begin(p) => p.to_value(),
            Performative::Attach(p) => p.to_value(),
            Performative::Flow(p) => p.to_value(),
            Performative::Transfer(p) => p.to_value(),
            Performative::Disposition(p) => p.to_value(),
            Performative::Detach(p) => p.to_value(),
            Performative::End(p) => p.to_value(),
            Performative::Close(p) => p.to_value(),
        }
    }

    /// Decodes a performative from the reader, dispatching on the
    /// descriptor of the described-list value
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        Self::try_from_value(Value::decode(reader)?)
    }

    /// Parses a performative out of a described-list value
    pub fn try_from_value(value: Value) -> Result<Self, CodecError> {
        let described = match &value {
            Value::Described(described) => described,
            other => {
                return Err(CodecError::TypeMismatch {
                    expecting: "performative",
                    found: other.type_name(),
                })
            }
        };

        let code = match &described.descriptor {
            Descriptor::Code(code) => *code,
            Descriptor::Name(name) => match name.as_str() {
                Open::NAME => Open::CODE,
                Begin::NAME => Begin::CODE,
                Attach::NAME => Attach::CODE,
                Flow::NAME => Flow::CODE,
                Transfer::NAME => Transfer::CODE,
                Disposition::NAME => Disposition::CODE,
                Detach::NAME => Detach::CODE,
                End::NAME => End::CODE,
                Close::NAME => Close::CODE,
                _ => {
                    return Err(CodecError::UnexpectedDescriptor(
                        described.descriptor.to_string(),
                    ))
                }
            },
        };

        match code {
            Open::CODE => Open::try_from_value(value).map(Performative::Open),
            Begin::CODE => Begin::try_from_value(value).map(Performative::Begin),
            Attach::CODE => Attach::try_from_value(value).map(Performative::Attach),
            Flow::CODE => Flow::try_from_value(value).map(Performative::Flow),
            Transfer::CODE => Transfer::try_from_value(value).map(Performative::Transfer),
            Disposition::CODE => {
                Disposition::try_from_value(value).map(Performative::Disposition)
            }
            Detach::CODE => Detach::try_from_value(value).map(Performative::Detach),
            End::CODE => End::try_from_value(value).map(Performative::End),
            Close::CODE => Close::try_from_value(value).map(Performative::Close),
            _ => Err(CodecError::UnexpectedDescriptor(format!("{:#x}", code))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn performative_dispatch_by_code() {
        let open = Open {
            container_id: "c1".to_string(),
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        open.encode(&mut buf).unwrap();

        let mut reader = Reader::new(&buf);
        let performative = Performative::decode(&mut reader).unwrap();
        assert_eq!(performative, Performative::Open(open));
    }

    #[test]
    fn performative_dispatch_by_name() {
        use crate::primitives::Symbol;
        use crate::value::Described;

        let value = Value::Described(Box::new(Described::new(
            Descriptor::Name(Symbol::from("amqp:end:list")),
            Value::List(vec![]),
        )));
        let performative = Performative::try_from_value(value).unwrap();
        assert_eq!(performative, Performative::End(End { error: None }));
    }
}
