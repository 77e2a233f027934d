//! The 8-octet protocol header exchanged before any frame

use bytes::{Buf, BufMut, BytesMut};
use siderite_amqp_types::definitions::{MAJOR, MINOR, REVISION};
use tokio_util::codec::{Decoder, Encoder};

use super::error::NegotiationError;

/// The protocol id in the fifth octet of the protocol header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    /// AMQP without a security layer (0x00)
    Amqp,

    /// AMQP over TLS (0x02)
    Tls,

    /// AMQP with a SASL security layer (0x03)
    Sasl,
}

impl From<ProtocolId> for u8 {
    fn from(id: ProtocolId) -> Self {
        match id {
            ProtocolId::Amqp => 0x00,
            ProtocolId::Tls => 0x02,
            ProtocolId::Sasl => 0x03,
        }
    }
}

impl TryFrom<u8> for ProtocolId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ProtocolId::Amqp),
            0x02 => Ok(ProtocolId::Tls),
            0x03 => Ok(ProtocolId::Sasl),
            other => Err(other),
        }
    }
}

/// The protocol header: the ASCII letters "AMQP" followed by the protocol
/// id and the protocol version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolHeader {
    /// Protocol id
    pub id: ProtocolId,

    /// Major protocol version
    pub major: u8,

    /// Minor protocol version
    pub minor: u8,

    /// Protocol revision
    pub revision: u8,
}

impl ProtocolHeader {
    /// Creates a header with the given id and the implemented version
    pub fn new(id: ProtocolId) -> Self {
        Self {
            id,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }

    /// The plain AMQP header `"AMQP" 0x00 0x01 0x00 0x00`
    pub fn amqp() -> Self {
        Self::new(ProtocolId::Amqp)
    }

    /// The TLS header `"AMQP" 0x02 0x01 0x00 0x00`
    pub fn tls() -> Self {
        Self::new(ProtocolId::Tls)
    }

    /// The SASL header `"AMQP" 0x03 0x01 0x00 0x00`
    pub fn sasl() -> Self {
        Self::new(ProtocolId::Sasl)
    }

    /// Whether this is a SASL header
    pub fn is_sasl(&self) -> bool {
        matches!(self.id, ProtocolId::Sasl)
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(header: ProtocolHeader) -> Self {
        [
            b'A',
            b'M',
            b'Q',
            b'P',
            header.id.into(),
            header.major,
            header.minor,
            header.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = [u8; 8];

    fn try_from(buf: [u8; 8]) -> Result<Self, Self::Error> {
        if &buf[..4] != b"AMQP" {
            return Err(buf);
        }
        let id = ProtocolId::try_from(buf[4]).map_err(|_| buf)?;
        Ok(Self {
            id,
            major: buf[5],
            minor: buf[6],
            revision: buf[7],
        })
    }
}

/// Encoder and decoder for the protocol header.
///
/// Used only during negotiation; the codec is then swapped for a frame
/// codec with `Framed::map_codec`, preserving any already-buffered bytes.
#[derive(Debug, Default)]
pub struct ProtocolHeaderCodec {}

impl Encoder<ProtocolHeader> for ProtocolHeaderCodec {
    type Error = NegotiationError;

    fn encode(&mut self, item: ProtocolHeader, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let buf: [u8; 8] = item.into();
        dst.put_slice(&buf);
        Ok(())
    }
}

impl Decoder for ProtocolHeaderCodec {
    type Item = ProtocolHeader;
    type Error = NegotiationError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 8 {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        src.copy_to_slice(&mut buf);
        ProtocolHeader::try_from(buf).map(Some).map_err(NegotiationError::InvalidProtocolHeader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_header_magic() {
        let buf: [u8; 8] = ProtocolHeader::amqp().into();
        assert_eq!(&buf, &[0x41, 0x4d, 0x51, 0x50, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn sasl_header_magic() {
        let buf: [u8; 8] = ProtocolHeader::sasl().into();
        assert_eq!(&buf, &[0x41, 0x4d, 0x51, 0x50, 0x03, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn garbage_header_is_rejected() {
        let result = ProtocolHeader::try_from(*b"HTTP/1.1");
        assert!(result.is_err());
    }
}
