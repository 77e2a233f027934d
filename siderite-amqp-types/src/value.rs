//! Untyped AMQP 1.0 values

use ordered_float::OrderedFloat;

use crate::codec::Error;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};

/// A descriptor identifying a described type.
///
/// The specification allows any value as a descriptor; in practice every
/// descriptor on the wire is either the 64-bit numeric code or the symbolic
/// name from the type definition, and only those two are representable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Descriptor {
    /// Numeric descriptor code (`<domain-id> << 32 | <descriptor-id>`)
    Code(u64),

    /// Symbolic descriptor name (e.g. `amqp:open:list`)
    Name(Symbol),
}

impl Descriptor {
    /// Whether this descriptor identifies the type with the given
    /// numeric code or symbolic name
    pub fn matches(&self, code: u64, name: &str) -> bool {
        match self {
            Descriptor::Code(c) => *c == code,
            Descriptor::Name(n) => n.as_str() == name,
        }
    }
}

impl From<u64> for Descriptor {
    fn from(code: u64) -> Self {
        Descriptor::Code(code)
    }
}

impl From<Symbol> for Descriptor {
    fn from(name: Symbol) -> Self {
        Descriptor::Name(name)
    }
}

impl std::fmt::Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Descriptor::Code(code) => write!(f, "{:#x}", code),
            Descriptor::Name(name) => write!(f, "{}", name),
        }
    }
}

/// A described value: a descriptor and the value it describes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Described {
    /// The descriptor
    pub descriptor: Descriptor,

    /// The described value
    pub value: Value,
}

impl Described {
    /// Creates a new described value
    pub fn new(descriptor: impl Into<Descriptor>, value: impl Into<Value>) -> Self {
        Self {
            descriptor: descriptor.into(),
            value: value.into(),
        }
    }
}

/// An AMQP 1.0 value of any primitive or described type.
///
/// The derived [`Ord`] follows the variant order below (type ordinal first,
/// then the type-specific order), which keeps serialization of sorted
/// collections stable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Described type.
    ///
    /// Boxed to keep the size of `Value` small.
    Described(Box<Described>),

    /// Indicates an empty value
    Null,

    /// Represents a true or false value
    Bool(bool),

    /// Integer in the range 0 to 2^8-1 inclusive
    UByte(u8),

    /// Integer in the range 0 to 2^16-1 inclusive, network byte order
    UShort(u16),

    /// Integer in the range 0 to 2^32-1 inclusive.
    ///
    /// Encoded as uint0 / smalluint / uint, whichever is smallest.
    UInt(u32),

    /// Integer in the range 0 to 2^64-1 inclusive.
    ///
    /// Encoded as ulong0 / smallulong / ulong, whichever is smallest.
    ULong(u64),

    /// Integer in the range -(2^7) to 2^7-1 inclusive
    Byte(i8),

    /// Integer in the range -(2^15) to 2^15-1 inclusive
    Short(i16),

    /// Integer in the range -(2^31) to 2^31-1 inclusive
    Int(i32),

    /// Integer in the range -(2^63) to 2^63-1 inclusive
    Long(i64),

    /// IEEE 754-2008 binary32
    Float(OrderedFloat<f32>),

    /// IEEE 754-2008 binary64
    Double(OrderedFloat<f64>),

    /// A single Unicode code point (utf32be)
    Char(char),

    /// Milliseconds since the unix epoch (ms64)
    Timestamp(Timestamp),

    /// UUID as defined in section 4.1.2 of RFC-4122
    Uuid(Uuid),

    /// A sequence of octets (vbin8 / vbin32)
    Binary(Binary),

    /// A sequence of Unicode characters (str8-utf8 / str32-utf8)
    String(String),

    /// Symbolic values from a constrained domain (sym8 / sym32)
    Symbol(Symbol),

    /// A sequence of polymorphic values (list0 / list8 / list32)
    List(Vec<Value>),

    /// A polymorphic mapping from distinct keys to values (map8 / map32).
    ///
    /// Maps MUST be considered ordered; insertion order is preserved.
    Map(OrderedMap<Value, Value>),

    /// A sequence of values of a single type (array8 / array32)
    Array(Array<Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// A short name of the type held by this value, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Described(_) => "described",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::UByte(_) => "ubyte",
            Value::UShort(_) => "ushort",
            Value::UInt(_) => "uint",
            Value::ULong(_) => "ulong",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Binary(_) => "binary",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
        }
    }

    /// Whether the value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value and `other` hold the same type.
    ///
    /// A `Described` value is its own type; the descriptor identity is not
    /// inspected.
    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Constructs an array value, rejecting mixed element types
    pub fn array(items: Vec<Value>) -> Result<Value, Error> {
        if let Some(first) = items.first() {
            if !items.iter().all(|item| first.same_type(item)) {
                return Err(Error::ArrayNonHomogeneous);
            }
        }
        Ok(Value::Array(Array(items)))
    }

    /// The string slice if the value is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The symbol if the value is a `Symbol`
    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Typed extraction; fails with [`Error::TypeMismatch`] on any other type
    pub fn try_get<T>(self) -> Result<T, Error>
    where
        T: TryFrom<Value, Error = Value>,
    {
        let found = self.type_name();
        T::try_from(self).map_err(|_| Error::TypeMismatch {
            expecting: std::any::type_name::<T>(),
            found,
        })
    }
}

/* -------------------------- From<T> for Value -------------------------- */

macro_rules! impl_from {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value.into())
            }
        }
    };
}

impl_from!(Bool, bool);
impl_from!(UByte, u8);
impl_from!(UShort, u16);
impl_from!(UInt, u32);
impl_from!(ULong, u64);
impl_from!(Byte, i8);
impl_from!(Short, i16);
impl_from!(Int, i32);
impl_from!(Long, i64);
impl_from!(Float, f32);
impl_from!(Double, f64);
impl_from!(Char, char);
impl_from!(Timestamp, Timestamp);
impl_from!(Uuid, Uuid);
impl_from!(Binary, Binary);
impl_from!(String, String);
impl_from!(Symbol, Symbol);
impl_from!(List, Vec<Value>);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<OrderedMap<Value, Value>> for Value {
    fn from(map: OrderedMap<Value, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Array<Value>> for Value {
    fn from(array: Array<Value>) -> Self {
        Value::Array(array)
    }
}

impl From<Described> for Value {
    fn from(described: Described) -> Self {
        Value::Described(Box::new(described))
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

/* ------------------------ TryFrom<Value> for T ------------------------- */

macro_rules! impl_try_from {
    ($variant:ident, $ty:ty) => {
        impl TryFrom<Value> for $ty {
            type Error = Value;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    Value::$variant(inner) => Ok(inner.into()),
                    _ => Err(value),
                }
            }
        }
    };
}

impl_try_from!(Bool, bool);
impl_try_from!(UByte, u8);
impl_try_from!(UShort, u16);
impl_try_from!(UInt, u32);
impl_try_from!(ULong, u64);
impl_try_from!(Byte, i8);
impl_try_from!(Short, i16);
impl_try_from!(Int, i32);
impl_try_from!(Long, i64);
impl_try_from!(Char, char);
impl_try_from!(Timestamp, Timestamp);
impl_try_from!(Uuid, Uuid);
impl_try_from!(Binary, Binary);
impl_try_from!(String, String);
impl_try_from!(Symbol, Symbol);
impl_try_from!(List, Vec<Value>);

impl TryFrom<Value> for f32 {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(OrderedFloat(inner)) => Ok(inner),
            _ => Err(value),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Double(OrderedFloat(inner)) => Ok(inner),
            _ => Err(value),
        }
    }
}

impl TryFrom<Value> for OrderedMap<Value, Value> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(map) => Ok(map),
            _ => Err(value),
        }
    }
}

impl TryFrom<Value> for Array<Value> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(array) => Ok(array),
            _ => Err(value),
        }
    }
}

impl TryFrom<Value> for Described {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Described(described) => Ok(*described),
            _ => Err(value),
        }
    }
}

/// Fields keyed by symbol (the `fields` restricted map of the specification).
///
/// Peers are known to send string keys where symbols are required; both are
/// accepted on conversion.
impl TryFrom<Value> for OrderedMap<Symbol, Value> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Map(map) => map,
            _ => return Err(value),
        };

        let mut fields = OrderedMap::new();
        for (key, val) in map.into_iter() {
            let key = match key {
                Value::Symbol(symbol) => symbol,
                Value::String(string) => Symbol::from(string),
                other => return Err(Value::Map(OrderedMap::from_iter([(other, val)]))),
            };
            fields.insert(key, val);
        }
        Ok(fields)
    }
}

/// A field declared `multiple="true"` may arrive either as an array or as a
/// single value of the element type.
impl TryFrom<Value> for Array<Symbol> {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Symbol(symbol) => Ok(Array(vec![symbol])),
            Value::String(string) => Ok(Array(vec![Symbol::from(string)])),
            Value::Array(array) => array
                .into_inner()
                .into_iter()
                .map(|item| match item {
                    Value::Symbol(symbol) => Ok(symbol),
                    Value::String(string) => Ok(Symbol::from(string)),
                    other => Err(other),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Array),
            _ => Err(value),
        }
    }
}

impl From<Array<Symbol>> for Value {
    fn from(array: Array<Symbol>) -> Self {
        Value::Array(Array(array.into_inner().into_iter().map(Value::Symbol).collect()))
    }
}

impl From<OrderedMap<Symbol, Value>> for Value {
    fn from(fields: OrderedMap<Symbol, Value>) -> Self {
        Value::Map(
            fields
                .into_iter()
                .map(|(key, val)| (Value::Symbol(key), val))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_construction_rejects_mixed_types() {
        let result = Value::array(vec![Value::UInt(1), Value::String("a".to_string())]);
        assert!(matches!(result, Err(Error::ArrayNonHomogeneous)));

        let result = Value::array(vec![Value::UInt(1), Value::UInt(2)]);
        assert!(result.is_ok());
    }

    #[test]
    fn type_ordinal_orders_before_value() {
        // Null sorts before any boolean, booleans before any uint
        assert!(Value::Null < Value::Bool(false));
        assert!(Value::Bool(true) < Value::UInt(0));
        assert!(Value::UInt(5) < Value::UInt(6));
    }

    #[test]
    fn typed_extraction_mismatch() {
        let value = Value::String("abc".to_string());
        let result = value.try_get::<u32>();
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn map_equality_is_order_sensitive() {
        let a: OrderedMap<Value, Value> =
            OrderedMap::from_iter([(Value::from("k1"), Value::from(1u32)), (Value::from("k2"), Value::from(2u32))]);
        let b: OrderedMap<Value, Value> =
            OrderedMap::from_iter([(Value::from("k2"), Value::from(2u32)), (Value::from("k1"), Value::from(1u32))]);
        assert_ne!(Value::Map(a), Value::Map(b));
    }
}
