//! Value encoder
//!
//! Encoding follows part 1.6 of the specification. Integers always take the
//! smallest defined width (uint0/smalluint/uint and so on); array elements
//! share a single constructor and therefore use the full-width forms.

use bytes::{BufMut, Bytes, BytesMut};

use crate::value::{Descriptor, Value};

use super::error::Error;
use super::format_code::FormatCode;

impl Value {
    /// Encodes the value into the buffer
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), Error> {
        encode_value(self, buf)
    }

    /// Encodes the value into a freshly allocated buffer
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

pub(crate) fn encode_value(value: &Value, buf: &mut BytesMut) -> Result<(), Error> {
    match value {
        Value::Described(described) => {
            buf.put_u8(FormatCode::Described as u8);
            encode_descriptor(&described.descriptor, buf);
            encode_value(&described.value, buf)?;
        }
        Value::Null => buf.put_u8(FormatCode::Null as u8),
        Value::Bool(true) => buf.put_u8(FormatCode::BooleanTrue as u8),
        Value::Bool(false) => buf.put_u8(FormatCode::BooleanFalse as u8),
        Value::UByte(v) => {
            buf.put_u8(FormatCode::UByte as u8);
            buf.put_u8(*v);
        }
        Value::UShort(v) => {
            buf.put_u8(FormatCode::UShort as u8);
            buf.put_u16(*v);
        }
        Value::UInt(v) => match v {
            0 => buf.put_u8(FormatCode::UInt0 as u8),
            1..=255 => {
                buf.put_u8(FormatCode::SmallUInt as u8);
                buf.put_u8(*v as u8);
            }
            _ => {
                buf.put_u8(FormatCode::UInt as u8);
                buf.put_u32(*v);
            }
        },
        Value::ULong(v) => match v {
            0 => buf.put_u8(FormatCode::ULong0 as u8),
            1..=255 => {
                buf.put_u8(FormatCode::SmallULong as u8);
                buf.put_u8(*v as u8);
            }
            _ => {
                buf.put_u8(FormatCode::ULong as u8);
                buf.put_u64(*v);
            }
        },
        Value::Byte(v) => {
            buf.put_u8(FormatCode::Byte as u8);
            buf.put_i8(*v);
        }
        Value::Short(v) => {
            buf.put_u8(FormatCode::Short as u8);
            buf.put_i16(*v);
        }
        Value::Int(v) => {
            if (-128..=127).contains(v) {
                buf.put_u8(FormatCode::SmallInt as u8);
                buf.put_i8(*v as i8);
            } else {
                buf.put_u8(FormatCode::Int as u8);
                buf.put_i32(*v);
            }
        }
        Value::Long(v) => {
            if (-128..=127).contains(v) {
                buf.put_u8(FormatCode::SmallLong as u8);
                buf.put_i8(*v as i8);
            } else {
                buf.put_u8(FormatCode::Long as u8);
                buf.put_i64(*v);
            }
        }
        Value::Float(v) => {
            buf.put_u8(FormatCode::Float as u8);
            buf.put_f32(v.0);
        }
        Value::Double(v) => {
            buf.put_u8(FormatCode::Double as u8);
            buf.put_f64(v.0);
        }
        Value::Char(v) => {
            buf.put_u8(FormatCode::Char as u8);
            buf.put_u32(*v as u32);
        }
        Value::Timestamp(v) => {
            buf.put_u8(FormatCode::Timestamp as u8);
            buf.put_i64(v.milliseconds());
        }
        Value::Uuid(v) => {
            buf.put_u8(FormatCode::Uuid as u8);
            buf.put_slice(v.as_bytes());
        }
        Value::Binary(v) => encode_variable(FormatCode::VBin8, FormatCode::VBin32, v, buf),
        Value::String(v) => encode_variable(FormatCode::Str8, FormatCode::Str32, v.as_bytes(), buf),
        Value::Symbol(v) => encode_variable(FormatCode::Sym8, FormatCode::Sym32, v.as_str().as_bytes(), buf),
        Value::List(items) => {
            if items.is_empty() {
                buf.put_u8(FormatCode::List0 as u8);
            } else {
                let mut body = BytesMut::new();
                for item in items {
                    encode_value(item, &mut body)?;
                }
                encode_compound(FormatCode::List8, FormatCode::List32, items.len(), &body, buf);
            }
        }
        Value::Map(map) => {
            let mut body = BytesMut::new();
            for (key, val) in map.iter() {
                encode_value(key, &mut body)?;
                encode_value(val, &mut body)?;
            }
            encode_compound(FormatCode::Map8, FormatCode::Map32, map.len() * 2, &body, buf);
        }
        Value::Array(array) => encode_array(&array.0, buf)?,
    }

    Ok(())
}

pub(crate) fn encode_descriptor(descriptor: &Descriptor, buf: &mut BytesMut) {
    // Descriptors are ulong or symbol values; neither encoding can fail
    let value = match descriptor {
        Descriptor::Code(code) => Value::ULong(*code),
        Descriptor::Name(name) => Value::Symbol(name.clone()),
    };
    let _ = encode_value(&value, buf);
}

fn encode_variable(small: FormatCode, large: FormatCode, bytes: &[u8], buf: &mut BytesMut) {
    if bytes.len() <= u8::MAX as usize {
        buf.put_u8(small as u8);
        buf.put_u8(bytes.len() as u8);
    } else {
        buf.put_u8(large as u8);
        buf.put_u32(bytes.len() as u32);
    }
    buf.put_slice(bytes);
}

/// Writes a list/map header followed by the already-encoded item bytes. The
/// size field counts the bytes that follow it, including the count field.
fn encode_compound(small: FormatCode, large: FormatCode, count: usize, body: &[u8], buf: &mut BytesMut) {
    if body.len() + 1 <= u8::MAX as usize && count <= u8::MAX as usize {
        buf.put_u8(small as u8);
        buf.put_u8((body.len() + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(large as u8);
        buf.put_u32((body.len() + 4) as u32);
        buf.put_u32(count as u32);
    }
    buf.put_slice(body);
}

fn encode_array(items: &[Value], buf: &mut BytesMut) -> Result<(), Error> {
    let first = match items.first() {
        Some(first) => first,
        None => {
            // an empty array still carries an element constructor
            buf.put_u8(FormatCode::Array8 as u8);
            buf.put_u8(2); // count + constructor
            buf.put_u8(0);
            buf.put_u8(FormatCode::Null as u8);
            return Ok(());
        }
    };

    if !items.iter().all(|item| first.same_type(item)) {
        return Err(Error::ArrayNonHomogeneous);
    }

    let mut constructor = BytesMut::new();
    element_constructor(first, &mut constructor)?;

    let mut body = BytesMut::new();
    for item in items {
        // all elements of a described array must share the descriptor
        if let (Value::Described(a), Value::Described(b)) = (first, item) {
            if a.descriptor != b.descriptor || !a.value.same_type(&b.value) {
                return Err(Error::ArrayNonHomogeneous);
            }
        }
        encode_element_body(item, &mut body)?;
    }

    let payload_len = constructor.len() + body.len();
    if payload_len + 1 <= u8::MAX as usize && items.len() <= u8::MAX as usize {
        buf.put_u8(FormatCode::Array8 as u8);
        buf.put_u8((payload_len + 1) as u8);
        buf.put_u8(items.len() as u8);
    } else {
        buf.put_u8(FormatCode::Array32 as u8);
        buf.put_u32((payload_len + 4) as u32);
        buf.put_u32(items.len() as u32);
    }
    buf.put_slice(&constructor);
    buf.put_slice(&body);
    Ok(())
}

/// The shared constructor of an array element. Full-width forms only, since
/// one constructor must fit every element.
fn element_constructor(element: &Value, buf: &mut BytesMut) -> Result<(), Error> {
    let code = match element {
        Value::Described(described) => {
            buf.put_u8(FormatCode::Described as u8);
            encode_descriptor(&described.descriptor, buf);
            return element_constructor(&described.value, buf);
        }
        Value::Null => return Err(Error::NotImplemented("array of null")),
        Value::Bool(_) => FormatCode::Boolean,
        Value::UByte(_) => FormatCode::UByte,
        Value::UShort(_) => FormatCode::UShort,
        Value::UInt(_) => FormatCode::UInt,
        Value::ULong(_) => FormatCode::ULong,
        Value::Byte(_) => FormatCode::Byte,
        Value::Short(_) => FormatCode::Short,
        Value::Int(_) => FormatCode::Int,
        Value::Long(_) => FormatCode::Long,
        Value::Float(_) => FormatCode::Float,
        Value::Double(_) => FormatCode::Double,
        Value::Char(_) => FormatCode::Char,
        Value::Timestamp(_) => FormatCode::Timestamp,
        Value::Uuid(_) => FormatCode::Uuid,
        Value::Binary(_) => FormatCode::VBin32,
        Value::String(_) => FormatCode::Str32,
        Value::Symbol(_) => FormatCode::Sym32,
        Value::List(_) => FormatCode::List32,
        Value::Map(_) => FormatCode::Map32,
        Value::Array(_) => FormatCode::Array32,
    };
    buf.put_u8(code as u8);
    Ok(())
}

/// Encodes an array element body without its constructor, matching the
/// full-width forms chosen by [`element_constructor`]
fn encode_element_body(element: &Value, buf: &mut BytesMut) -> Result<(), Error> {
    match element {
        Value::Described(described) => encode_element_body(&described.value, buf)?,
        Value::Null => return Err(Error::NotImplemented("array of null")),
        Value::Bool(v) => buf.put_u8(*v as u8),
        Value::UByte(v) => buf.put_u8(*v),
        Value::UShort(v) => buf.put_u16(*v),
        Value::UInt(v) => buf.put_u32(*v),
        Value::ULong(v) => buf.put_u64(*v),
        Value::Byte(v) => buf.put_i8(*v),
        Value::Short(v) => buf.put_i16(*v),
        Value::Int(v) => buf.put_i32(*v),
        Value::Long(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_f32(v.0),
        Value::Double(v) => buf.put_f64(v.0),
        Value::Char(v) => buf.put_u32(*v as u32),
        Value::Timestamp(v) => buf.put_i64(v.milliseconds()),
        Value::Uuid(v) => buf.put_slice(v.as_bytes()),
        Value::Binary(v) => {
            buf.put_u32(v.len() as u32);
            buf.put_slice(v);
        }
        Value::String(v) => {
            buf.put_u32(v.len() as u32);
            buf.put_slice(v.as_bytes());
        }
        Value::Symbol(v) => {
            buf.put_u32(v.as_str().len() as u32);
            buf.put_slice(v.as_str().as_bytes());
        }
        Value::List(items) => {
            let mut body = BytesMut::new();
            for item in items {
                encode_value(item, &mut body)?;
            }
            buf.put_u32((body.len() + 4) as u32);
            buf.put_u32(items.len() as u32);
            buf.put_slice(&body);
        }
        Value::Map(map) => {
            let mut body = BytesMut::new();
            for (key, val) in map.iter() {
                encode_value(key, &mut body)?;
                encode_value(val, &mut body)?;
            }
            buf.put_u32((body.len() + 4) as u32);
            buf.put_u32((map.len() * 2) as u32);
            buf.put_slice(&body);
        }
        Value::Array(inner) => {
            let mut nested = BytesMut::new();
            encode_array(&inner.0, &mut nested)?;
            // strip the outer constructor octet; keep the array32 body
            match nested.first() {
                Some(code) if *code == FormatCode::Array32 as u8 => {
                    buf.put_slice(&nested[1..]);
                }
                _ => {
                    // re-encode the small form as array32
                    let mut ctor = BytesMut::new();
                    let mut body = BytesMut::new();
                    if let Some(first) = inner.0.first() {
                        element_constructor(first, &mut ctor)?;
                        for item in &inner.0 {
                            encode_element_body(item, &mut body)?;
                        }
                    } else {
                        ctor.put_u8(FormatCode::Null as u8);
                    }
                    buf.put_u32((4 + ctor.len() + body.len()) as u32);
                    buf.put_u32(inner.0.len() as u32);
                    buf.put_slice(&ctor);
                    buf.put_slice(&body);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::primitives::Symbol;
    use crate::value::Value;

    #[test]
    fn encode_symbol_abc() {
        // seed vector from the wire examples in part 1.6
        let value = Value::Symbol(Symbol::from("abc"));
        let bytes = value.to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0xa3, 0x03, 0x61, 0x62, 0x63]);
    }

    #[test]
    fn encode_ulong_zero_is_one_octet() {
        let bytes = Value::ULong(0).to_bytes().unwrap();
        assert_eq!(&bytes[..], &[0x44]);
    }

    #[test]
    fn encode_smallest_uint_forms() {
        assert_eq!(&Value::UInt(0).to_bytes().unwrap()[..], &[0x43]);
        assert_eq!(&Value::UInt(255).to_bytes().unwrap()[..], &[0x52, 0xff]);
        assert_eq!(
            &Value::UInt(256).to_bytes().unwrap()[..],
            &[0x70, 0x00, 0x00, 0x01, 0x00]
        );
    }

    #[test]
    fn encode_empty_list_is_list0() {
        assert_eq!(&Value::List(vec![]).to_bytes().unwrap()[..], &[0x45]);
    }

    #[test]
    fn encode_list8_size_includes_count() {
        let value = Value::List(vec![Value::ULong(0)]);
        let bytes = value.to_bytes().unwrap();
        // list8, size = count octet + one ulong0 octet, count = 1
        assert_eq!(&bytes[..], &[0xc0, 0x02, 0x01, 0x44]);
    }

    #[test]
    fn encode_array_shares_one_constructor() {
        let value = Value::array(vec![Value::UInt(1), Value::UInt(300)]).unwrap();
        let bytes = value.to_bytes().unwrap();
        // array8, size = 1 (count) + 1 (ctor) + 8 (two uints), count 2, ctor 0x70
        assert_eq!(
            &bytes[..],
            &[0xe0, 0x0a, 0x02, 0x70, 0, 0, 0, 1, 0, 0, 1, 44]
        );
    }
}
