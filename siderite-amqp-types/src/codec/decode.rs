//! Value decoder
//!
//! Decoding is strict about the announced sizes: a compound value whose
//! items do not consume exactly the announced byte count is malformed, and
//! any size that runs past the available input is reported as truncated.

use bytes::Bytes;

use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp, Uuid};
use crate::value::{Described, Descriptor, Value};

use super::error::Error;
use super::format_code::FormatCode;

/// A borrowing cursor over encoded bytes
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Creates a reader over the given bytes
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Number of unread bytes
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Whether all bytes have been consumed
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(Error::Truncated);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn split_front(&mut self, n: usize) -> Result<Reader<'a>, Error> {
        self.read_bytes(n).map(Reader::new)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }
}

impl Value {
    /// Decodes a single value, requiring that the input holds nothing else
    pub fn from_slice(bytes: &[u8]) -> Result<Value, Error> {
        let mut reader = Reader::new(bytes);
        let value = decode_value(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::Malformed);
        }
        Ok(value)
    }

    /// Decodes the next value from the reader
    pub fn decode(reader: &mut Reader<'_>) -> Result<Value, Error> {
        decode_value(reader)
    }
}

pub(crate) fn decode_value(reader: &mut Reader<'_>) -> Result<Value, Error> {
    let code = reader.read_u8()?;
    decode_with_code(code, reader)
}

fn decode_with_code(code: u8, reader: &mut Reader<'_>) -> Result<Value, Error> {
    let value = match FormatCode::try_from(code)? {
        FormatCode::Described => {
            let descriptor = decode_descriptor(reader)?;
            let value = decode_value(reader)?;
            Value::Described(Box::new(Described { descriptor, value }))
        }
        FormatCode::Null => Value::Null,
        FormatCode::Boolean => match reader.read_u8()? {
            0x00 => Value::Bool(false),
            0x01 => Value::Bool(true),
            _ => return Err(Error::Malformed),
        },
        FormatCode::BooleanTrue => Value::Bool(true),
        FormatCode::BooleanFalse => Value::Bool(false),
        FormatCode::UByte => Value::UByte(reader.read_u8()?),
        FormatCode::UShort => Value::UShort(reader.read_u16()?),
        FormatCode::UInt => Value::UInt(reader.read_u32()?),
        FormatCode::SmallUInt => Value::UInt(reader.read_u8()? as u32),
        FormatCode::UInt0 => Value::UInt(0),
        FormatCode::ULong => Value::ULong(reader.read_u64()?),
        FormatCode::SmallULong => Value::ULong(reader.read_u8()? as u64),
        FormatCode::ULong0 => Value::ULong(0),
        FormatCode::Byte => Value::Byte(reader.read_i8()?),
        FormatCode::Short => Value::Short(reader.read_i16()?),
        FormatCode::Int => Value::Int(reader.read_i32()?),
        FormatCode::SmallInt => Value::Int(reader.read_i8()? as i32),
        FormatCode::Long => Value::Long(reader.read_i64()?),
        FormatCode::SmallLong => Value::Long(reader.read_i8()? as i64),
        FormatCode::Float => Value::Float(reader.read_f32()?.into()),
        FormatCode::Double => Value::Double(reader.read_f64()?.into()),
        FormatCode::Decimal32 | FormatCode::Decimal64 | FormatCode::Decimal128 => {
            return Err(Error::NotImplemented("decimal types"))
        }
        FormatCode::Char => {
            let code_point = reader.read_u32()?;
            Value::Char(char::from_u32(code_point).ok_or(Error::Malformed)?)
        }
        FormatCode::Timestamp => Value::Timestamp(Timestamp::from_milliseconds(reader.read_i64()?)),
        FormatCode::Uuid => {
            let bytes: [u8; 16] = reader.read_bytes(16)?.try_into().unwrap();
            Value::Uuid(Uuid::from(bytes))
        }
        FormatCode::VBin8 => {
            let len = reader.read_u8()? as usize;
            Value::Binary(Binary::from(Bytes::copy_from_slice(reader.read_bytes(len)?)))
        }
        FormatCode::VBin32 => {
            let len = reader.read_u32()? as usize;
            Value::Binary(Binary::from(Bytes::copy_from_slice(reader.read_bytes(len)?)))
        }
        FormatCode::Str8 => {
            let len = reader.read_u8()? as usize;
            Value::String(decode_utf8(reader.read_bytes(len)?)?)
        }
        FormatCode::Str32 => {
            let len = reader.read_u32()? as usize;
            Value::String(decode_utf8(reader.read_bytes(len)?)?)
        }
        FormatCode::Sym8 => {
            let len = reader.read_u8()? as usize;
            Value::Symbol(Symbol::from(decode_utf8(reader.read_bytes(len)?)?))
        }
        FormatCode::Sym32 => {
            let len = reader.read_u32()? as usize;
            Value::Symbol(Symbol::from(decode_utf8(reader.read_bytes(len)?)?))
        }
        FormatCode::List0 => Value::List(Vec::new()),
        FormatCode::List8 => {
            let size = reader.read_u8()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u8()? as usize;
            decode_list(count, &mut body)?
        }
        FormatCode::List32 => {
            let size = reader.read_u32()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u32()? as usize;
            decode_list(count, &mut body)?
        }
        FormatCode::Map8 => {
            let size = reader.read_u8()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u8()? as usize;
            decode_map(count, &mut body)?
        }
        FormatCode::Map32 => {
            let size = reader.read_u32()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u32()? as usize;
            decode_map(count, &mut body)?
        }
        FormatCode::Array8 => {
            let size = reader.read_u8()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u8()? as usize;
            decode_array(count, &mut body)?
        }
        FormatCode::Array32 => {
            let size = reader.read_u32()? as usize;
            let mut body = reader.split_front(size)?;
            let count = body.read_u32()? as usize;
            decode_array(count, &mut body)?
        }
    };

    Ok(value)
}

fn decode_utf8(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Malformed)
}

fn decode_descriptor(reader: &mut Reader<'_>) -> Result<Descriptor, Error> {
    match decode_value(reader)? {
        Value::ULong(code) => Ok(Descriptor::Code(code)),
        Value::Symbol(name) => Ok(Descriptor::Name(name)),
        _ => Err(Error::Malformed),
    }
}

fn decode_list(count: usize, body: &mut Reader<'_>) -> Result<Value, Error> {
    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        items.push(decode_value(body)?);
    }
    if !body.is_empty() {
        return Err(Error::Malformed);
    }
    Ok(Value::List(items))
}

fn decode_map(count: usize, body: &mut Reader<'_>) -> Result<Value, Error> {
    // an equal number of keys and values
    if count % 2 != 0 {
        return Err(Error::Malformed);
    }
    let mut map = OrderedMap::new();
    for _ in 0..count / 2 {
        let key = decode_value(body)?;
        let val = decode_value(body)?;
        if map.insert(key, val).is_some() {
            // two identical key values is invalid
            return Err(Error::Malformed);
        }
    }
    if !body.is_empty() {
        return Err(Error::Malformed);
    }
    Ok(Value::Map(map))
}

fn decode_array(count: usize, body: &mut Reader<'_>) -> Result<Value, Error> {
    let code = body.read_u8()?;

    let (descriptor, element_code) = if code == FormatCode::Described as u8 {
        let descriptor = decode_descriptor(body)?;
        (Some(descriptor), body.read_u8()?)
    } else {
        (None, code)
    };

    let mut items = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let element = decode_with_code(element_code, body)?;
        match &descriptor {
            Some(descriptor) => items.push(Value::Described(Box::new(Described {
                descriptor: descriptor.clone(),
                value: element,
            }))),
            None => items.push(element),
        }
    }
    if !body.is_empty() {
        return Err(Error::Malformed);
    }
    Ok(Value::Array(Array(items)))
}

#[cfg(test)]
mod tests {
    use ordered_float::OrderedFloat;

    use crate::primitives::{Binary, OrderedMap, Symbol, Timestamp, Uuid};
    use crate::value::{Described, Descriptor, Value};

    fn round_trip(value: Value) {
        let bytes = value.to_bytes().unwrap();
        let decoded = Value::from_slice(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn round_trip_every_variant() {
        round_trip(Value::Null);
        round_trip(Value::Bool(true));
        round_trip(Value::Bool(false));
        round_trip(Value::UByte(0x7f));
        round_trip(Value::UShort(0xbeef));
        round_trip(Value::UInt(0));
        round_trip(Value::UInt(88));
        round_trip(Value::UInt(0xdead_beef));
        round_trip(Value::ULong(0));
        round_trip(Value::ULong(255));
        round_trip(Value::ULong(u64::MAX));
        round_trip(Value::Byte(-3));
        round_trip(Value::Short(-1024));
        round_trip(Value::Int(-1));
        round_trip(Value::Int(65_536));
        round_trip(Value::Long(-1));
        round_trip(Value::Long(i64::MIN));
        round_trip(Value::Float(OrderedFloat(1.25)));
        round_trip(Value::Double(OrderedFloat(-2.5e300)));
        round_trip(Value::Char('中'));
        round_trip(Value::Timestamp(Timestamp::from_milliseconds(1_311_704_463_521)));
        round_trip(Value::Uuid(Uuid::from([7u8; 16])));
        round_trip(Value::Binary(Binary::from(vec![0u8; 300])));
        round_trip(Value::String("hello AMQP".repeat(40)));
        round_trip(Value::Symbol(Symbol::from("amqp:link:stolen")));
        round_trip(Value::List(vec![
            Value::UInt(1),
            Value::String("two".into()),
            Value::List(vec![Value::Null]),
        ]));
        round_trip(Value::Map(OrderedMap::from_iter([
            (Value::from("key"), Value::from(13u32)),
            (Value::from(Symbol::from("sym")), Value::Null),
        ])));
        round_trip(Value::array(vec![Value::from(Symbol::from("a")), Value::from(Symbol::from("bc"))]).unwrap());
        round_trip(Value::Described(Box::new(Described::new(
            0x73u64,
            Value::List(vec![Value::from("id-1")]),
        ))));
    }

    #[test]
    fn decode_symbol_seed_vector() {
        let value = Value::from_slice(&[0xa3, 0x03, 0x61, 0x62, 0x63]).unwrap();
        assert_eq!(value, Value::Symbol(Symbol::from("abc")));
    }

    #[test]
    fn truncated_input_is_rejected() {
        // str8 announcing 5 bytes with only 3 available
        let err = Value::from_slice(&[0xa1, 0x05, b'a', b'b', b'c']).unwrap_err();
        assert_eq!(err, super::Error::Truncated);
    }

    #[test]
    fn malformed_compound_size_is_rejected() {
        // list8 with size that leaves unread bytes after the announced count
        let err = Value::from_slice(&[0xc0, 0x03, 0x01, 0x44, 0x44]).unwrap_err();
        assert_eq!(err, super::Error::Malformed);
    }

    #[test]
    fn duplicate_map_keys_are_rejected() {
        // map8 {null: null, null: null}
        let err = Value::from_slice(&[0xc1, 0x05, 0x04, 0x40, 0x40, 0x40, 0x40]).unwrap_err();
        assert_eq!(err, super::Error::Malformed);
    }

    #[test]
    fn array_elements_share_constructor() {
        let value = Value::from_slice(&[0xe0, 0x0a, 0x02, 0x70, 0, 0, 0, 1, 0, 0, 1, 44]).unwrap();
        assert_eq!(
            value,
            Value::array(vec![Value::UInt(1), Value::UInt(300)]).unwrap()
        );
    }

    #[test]
    fn described_round_trip_preserves_descriptor() {
        let value = Value::Described(Box::new(Described::new(
            Descriptor::Name(Symbol::from("amqp:error:list")),
            Value::List(vec![Value::Symbol(Symbol::from("amqp:internal-error"))]),
        )));
        round_trip(value);
    }

    #[test]
    fn boolean_widened_form_is_accepted() {
        assert_eq!(Value::from_slice(&[0x56, 0x01]).unwrap(), Value::Bool(true));
        assert_eq!(Value::from_slice(&[0x56, 0x00]).unwrap(), Value::Bool(false));
        assert!(Value::from_slice(&[0x56, 0x02]).is_err());
    }
}
