//! AMQP frame type and the corresponding encoder and decoder
//!
//! An AMQP frame is a 4-octet size, a data offset in 4-octet words, the
//! type octet 0x00, a 2-octet channel, an extended header (ignored), the
//! performative and an optional payload.

use bytes::{Buf, BufMut, BytesMut};
use siderite_amqp_types::codec::{Composite, Reader};
use siderite_amqp_types::definitions::MIN_MAX_FRAME_SIZE;
use siderite_amqp_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};
use tokio_util::codec::{Decoder, Encoder};

use crate::Payload;

use super::{Error, FRAME_HEADER_SIZE, FRAME_TYPE_AMQP};

/// An AMQP frame
#[derive(Debug)]
pub struct Frame {
    /// The channel the frame is sent on
    pub channel: u16,

    /// The frame body
    pub body: FrameBody,
}

impl Frame {
    /// Creates a new frame
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// Creates an empty frame; empty frames only reset the peer's idle
    /// timeout
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// The body of an AMQP frame
#[derive(Debug)]
pub enum FrameBody {
    /// Open performative
    Open(Open),

    /// Begin performative
    Begin(Begin),

    /// Attach performative
    Attach(Attach),

    /// Flow performative
    Flow(Flow),

    /// Transfer performative and message payload
    Transfer {
        /// The performative
        performative: Transfer,

        /// The binary payload following the performative
        payload: Payload,
    },

    /// Disposition performative
    Disposition(Disposition),

    /// Detach performative
    Detach(Detach),

    /// End performative
    End(End),

    /// Close performative
    Close(Close),

    /// A frame with no body
    Empty,
}

/// Encoder and decoder of AMQP frames.
///
/// The encoder rejects frames that would exceed the negotiated
/// max-frame-size; the decoder rejects announced sizes above it.
#[derive(Debug)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MIN_MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    /// Creates a codec with the given max-frame-size
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.max(MIN_MAX_FRAME_SIZE),
        }
    }

    /// The current max-frame-size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Updates the max-frame-size after negotiation
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size.max(MIN_MAX_FRAME_SIZE);
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        match item.body {
            FrameBody::Open(p) => p.encode(&mut body)?,
            FrameBody::Begin(p) => p.encode(&mut body)?,
            FrameBody::Attach(p) => p.encode(&mut body)?,
            FrameBody::Flow(p) => p.encode(&mut body)?,
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                performative.encode(&mut body)?;
                body.put(payload);
            }
            FrameBody::Disposition(p) => p.encode(&mut body)?,
            FrameBody::Detach(p) => p.encode(&mut body)?,
            FrameBody::End(p) => p.encode(&mut body)?,
            FrameBody::Close(p) => p.encode(&mut body)?,
            FrameBody::Empty => {}
        }

        let size = FRAME_HEADER_SIZE + body.len();
        if size > self.max_frame_size {
            return Err(Error::FrameSizeExceedsMaxFrameSize);
        }

        dst.reserve(size);
        dst.put_u32(size as u32);
        dst.put_u8(2); // no extended header, doff is always 2
        dst.put_u8(FRAME_TYPE_AMQP);
        dst.put_u16(item.channel);
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
        if size > self.max_frame_size {
            return Err(Error::FrameSizeExceedsMaxFrameSize);
        }
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(4);
        let doff = frame.get_u8() as usize;
        let ftype = frame.get_u8();
        let channel = frame.get_u16();

        if ftype != FRAME_TYPE_AMQP {
            return Err(Error::NotImplemented(ftype));
        }
        if doff < 2 || doff * 4 > size {
            return Err(Error::MalformedFrame);
        }
        // the extended header is opaque and skipped
        frame.advance(doff * 4 - FRAME_HEADER_SIZE);

        if frame.is_empty() {
            return Ok(Some(Frame::new(channel, FrameBody::Empty)));
        }

        let bytes = frame.freeze();
        let mut reader = Reader::new(&bytes);
        let performative = Performative::decode(&mut reader)?;
        let payload = bytes.slice(bytes.len() - reader.remaining()..);

        let body = match performative {
            Performative::Open(p) => FrameBody::Open(p),
            Performative::Begin(p) => FrameBody::Begin(p),
            Performative::Attach(p) => FrameBody::Attach(p),
            Performative::Flow(p) => FrameBody::Flow(p),
            Performative::Transfer(performative) => FrameBody::Transfer {
                performative,
                payload,
            },
            Performative::Disposition(p) => FrameBody::Disposition(p),
            Performative::Detach(p) => FrameBody::Detach(p),
            Performative::End(p) => FrameBody::End(p),
            Performative::Close(p) => FrameBody::Close(p),
        };

        Ok(Some(Frame::new(channel, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_is_eight_octets() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec.encode(Frame::empty(), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0, 0, 0, 8, 2, 0, 0, 0]);
    }

    #[test]
    fn empty_frame_round_trip() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[0u8, 0, 0, 8, 2, 0, 0, 0][..]);
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert!(matches!(frame.body, FrameBody::Empty));
    }

    #[test]
    fn open_frame_round_trip() {
        let open = Open {
            container_id: "c1".to_string(),
            hostname: Some("127.0.0.1".to_string()),
            max_frame_size: 4096.into(),
            channel_max: 9.into(),
            idle_time_out: Some(10_000),
            ..Default::default()
        };

        let mut codec = FrameCodec::new(4096);
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(0, FrameBody::Open(open.clone())), &mut buf)
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.channel, 0);
        match frame.body {
            FrameBody::Open(decoded) => assert_eq!(decoded, open),
            other => panic!("expecting an open frame, got {:?}", other),
        }
    }

    #[test]
    fn transfer_payload_is_split_off() {
        let transfer = Transfer {
            handle: 0,
            delivery_id: Some(0),
            delivery_tag: Some(vec![0u8; 4].into()),
            message_format: Some(0),
            ..Default::default()
        };
        let payload = Payload::from_static(b"payload-bytes");

        let mut codec = FrameCodec::new(4096);
        let mut buf = BytesMut::new();
        codec
            .encode(
                Frame::new(
                    1,
                    FrameBody::Transfer {
                        performative: transfer.clone(),
                        payload: payload.clone(),
                    },
                ),
                &mut buf,
            )
            .unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        match frame.body {
            FrameBody::Transfer {
                performative,
                payload: decoded,
            } => {
                assert_eq!(performative, transfer);
                assert_eq!(decoded, payload);
            }
            other => panic!("expecting a transfer frame, got {:?}", other),
        }
    }

    #[test]
    fn undersized_frame_is_rejected() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[0u8, 0, 0, 7, 2, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(Error::MalformedFrame)
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = FrameCodec::new(512);
        let mut src = BytesMut::from(&[0u8, 0, 4, 0, 2, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(Error::FrameSizeExceedsMaxFrameSize)
        ));
    }

    #[test]
    fn doff_past_frame_end_is_rejected() {
        // size 8 but doff 3 (12 octets of header)
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[0u8, 0, 0, 8, 3, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(Error::MalformedFrame)
        ));
    }
}
