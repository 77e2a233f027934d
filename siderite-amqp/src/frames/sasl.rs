//! SASL frame type and the corresponding encoder and decoder
//!
//! SASL frames always fit in the pre-negotiation frame size of 512 octets
//! and are always sent on channel 0.

use bytes::{Buf, BufMut, BytesMut};
use siderite_amqp_types::codec::Reader;
use siderite_amqp_types::definitions::MIN_MAX_FRAME_SIZE;
use siderite_amqp_types::sasl::SaslFrameBody;
use tokio_util::codec::{Decoder, Encoder};

use super::{Error, FRAME_HEADER_SIZE, FRAME_TYPE_SASL};

/// A SASL frame
#[derive(Debug)]
pub struct Frame {
    /// The frame body
    pub body: SaslFrameBody,
}

impl Frame {
    /// Creates a new SASL frame
    pub fn new(body: SaslFrameBody) -> Self {
        Self { body }
    }
}

/// Encoder and decoder of SASL frames
#[derive(Debug, Default)]
pub struct FrameCodec {}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        item.body.to_value().encode(&mut body)?;

        let size = FRAME_HEADER_SIZE + body.len();
        dst.reserve(size);
        dst.put_u32(size as u32);
        dst.put_u8(2);
        dst.put_u8(FRAME_TYPE_SASL);
        dst.put_u16(0);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if size < FRAME_HEADER_SIZE {
            return Err(Error::MalformedFrame);
        }
        if size > MIN_MAX_FRAME_SIZE {
            return Err(Error::FrameSizeExceedsMaxFrameSize);
        }
        if src.len() < size {
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(4);
        let doff = frame.get_u8() as usize;
        let ftype = frame.get_u8();
        let _channel = frame.get_u16();

        if ftype != FRAME_TYPE_SASL {
            return Err(Error::NotImplemented(ftype));
        }
        if doff < 2 || doff * 4 > size {
            return Err(Error::MalformedFrame);
        }
        frame.advance(doff * 4 - FRAME_HEADER_SIZE);

        let bytes = frame.freeze();
        let mut reader = Reader::new(&bytes);
        let body = SaslFrameBody::decode(&mut reader)?;
        Ok(Some(Frame::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use siderite_amqp_types::primitives::Symbol;
    use siderite_amqp_types::sasl::{SaslInit, SaslFrameBody};

    use super::*;

    #[test]
    fn sasl_init_round_trip() {
        let init = SaslInit {
            mechanism: Symbol::from("ANONYMOUS"),
            initial_response: None,
            hostname: None,
        };

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(SaslFrameBody::Init(init.clone())), &mut buf)
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.body, SaslFrameBody::Init(init));
    }
}
