//! Response status codes

use std::num::NonZeroU16;

use siderite_amqp_types::primitives::SimpleValue;

/// An HTTP-style status code carried in the application-properties of a
/// management response
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct StatusCode(pub NonZeroU16);

impl StatusCode {
    /// The numeric code
    pub fn get(&self) -> u16 {
        self.0.get()
    }

    /// Whether the code signals success (2xx)
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.0.get())
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Services encode the status code with whichever integer width their
/// stack prefers; all of them are accepted.
impl TryFrom<&SimpleValue> for StatusCode {
    type Error = ();

    fn try_from(value: &SimpleValue) -> Result<Self, Self::Error> {
        let code = match value {
            SimpleValue::UShort(val) => NonZeroU16::new(*val),
            SimpleValue::UInt(val) => u16::try_from(*val).ok().and_then(NonZeroU16::new),
            SimpleValue::ULong(val) => u16::try_from(*val).ok().and_then(NonZeroU16::new),
            SimpleValue::Short(val) => u16::try_from(*val).ok().and_then(NonZeroU16::new),
            SimpleValue::Int(val) => u16::try_from(*val).ok().and_then(NonZeroU16::new),
            SimpleValue::Long(val) => u16::try_from(*val).ok().and_then(NonZeroU16::new),
            _ => return Err(()),
        };
        code.map(StatusCode).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_widths_are_accepted() {
        assert_eq!(
            StatusCode::try_from(&SimpleValue::Int(202)).unwrap().get(),
            202
        );
        assert_eq!(
            StatusCode::try_from(&SimpleValue::ULong(500)).unwrap().get(),
            500
        );
        assert!(StatusCode::try_from(&SimpleValue::String("200".into())).is_err());
    }

    #[test]
    fn success_range() {
        let ok = StatusCode(NonZeroU16::new(299).unwrap());
        let bad = StatusCode(NonZeroU16::new(300).unwrap());
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
