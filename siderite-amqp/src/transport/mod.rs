//! Binds an ordered byte stream to a stream and sink of frames
//!
//! The transport is the only component that touches the IO object. It
//! performs the protocol-header and SASL negotiations, enforces the local
//! idle timeout on the read side, and swaps codecs in place with
//! `Framed::map_codec` so that bytes buffered across a negotiation phase
//! are never lost.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::trace;

use siderite_amqp_types::definitions::{MAJOR, MINOR, MIN_MAX_FRAME_SIZE, REVISION};
use siderite_amqp_types::states::ConnectionState;

use crate::frames::{amqp, sasl};
use crate::sasl_profile::{Negotiation, SaslProfile};
use crate::util::IdleTimeout;

mod error;
pub mod protocol_header;

pub use error::{Error, NegotiationError};
pub use protocol_header::{ProtocolHeader, ProtocolHeaderCodec, ProtocolId};

/// A frame-level transport over any ordered byte stream
#[derive(Debug)]
pub struct Transport<Io> {
    framed: Framed<Io, amqp::FrameCodec>,
    idle_timeout: Option<IdleTimeout>,
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Performs the AMQP header exchange and binds the frame codec.
    ///
    /// The codec starts at MIN-MAX-FRAME-SIZE; the connection engine
    /// raises it once the open frames have been exchanged.
    pub async fn negotiate_amqp_header(
        mut framed: Framed<Io, ProtocolHeaderCodec>,
        local_state: &mut ConnectionState,
        idle_timeout: Option<Duration>,
    ) -> Result<Self, NegotiationError> {
        let proto_header = ProtocolHeader::amqp();
        trace!(?proto_header, "SEND");
        match local_state {
            ConnectionState::Start => {
                framed.send(proto_header.clone()).await?;
                *local_state = ConnectionState::HeaderSent;
            }
            ConnectionState::HeaderReceived => {
                framed.send(proto_header.clone()).await?;
                *local_state = ConnectionState::HeaderExchange;
            }
            _ => return Err(NegotiationError::IllegalState),
        }

        let incoming = framed
            .next()
            .await
            .ok_or(NegotiationError::UnexpectedEof)??;
        trace!(proto_header = ?incoming, "RECV");
        if incoming != proto_header {
            *local_state = ConnectionState::End;
            return Err(NegotiationError::ProtocolHeaderMismatch(incoming.into()));
        }
        match local_state {
            ConnectionState::HeaderSent => *local_state = ConnectionState::HeaderExchange,
            ConnectionState::Start => *local_state = ConnectionState::HeaderReceived,
            _ => {}
        }

        let framed = framed.map_codec(|_| amqp::FrameCodec::new(MIN_MAX_FRAME_SIZE));
        Ok(Self {
            framed,
            idle_timeout: idle_timeout
                .filter(|duration| !duration.is_zero())
                .map(IdleTimeout::new),
        })
    }

    /// Runs the SASL security layer to its outcome and returns the framed
    /// IO positioned for the subsequent AMQP header exchange
    pub async fn negotiate_sasl(
        mut framed: Framed<Io, ProtocolHeaderCodec>,
        hostname: Option<&str>,
        mut profile: SaslProfile,
    ) -> Result<Framed<Io, ProtocolHeaderCodec>, NegotiationError> {
        let proto_header = ProtocolHeader::sasl();
        trace!(?proto_header, "SEND");
        framed.send(proto_header).await?;

        let incoming = framed
            .next()
            .await
            .ok_or(NegotiationError::UnexpectedEof)??;
        trace!(proto_header = ?incoming, "RECV");
        if !incoming.is_sasl()
            || incoming.major != MAJOR
            || incoming.minor != MINOR
            || incoming.revision != REVISION
        {
            return Err(NegotiationError::ProtocolHeaderMismatch(incoming.into()));
        }

        let mut framed = framed.map_codec(|_| sasl::FrameCodec::default());
        loop {
            let frame = framed
                .next()
                .await
                .ok_or(NegotiationError::UnexpectedEof)??;
            trace!(frame = ?frame.body, "RECV");
            match profile.on_frame(frame, hostname)? {
                Negotiation::Init(init) => {
                    let frame = sasl::Frame::new(
                        siderite_amqp_types::sasl::SaslFrameBody::Init(init),
                    );
                    trace!(frame = ?frame.body, "SEND");
                    framed.send(frame).await?;
                }
                Negotiation::Outcome(outcome) => {
                    use siderite_amqp_types::sasl::SaslCode;
                    match outcome.code {
                        SaslCode::Ok => break,
                        code => return Err(NegotiationError::SaslOutcome(code)),
                    }
                }
            }
        }

        Ok(framed.map_codec(|_| ProtocolHeaderCodec::default()))
    }

    /// The negotiated max-frame-size currently enforced
    pub fn max_frame_size(&self) -> usize {
        self.framed.codec().max_frame_size()
    }

    /// Updates the enforced max-frame-size after open negotiation
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.framed.codec_mut().set_max_frame_size(max_frame_size);
        self
    }

    /// Sets the local idle timeout enforced on the read side
    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<amqp::Frame, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.framed.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                // any traffic, including empty frames, resets the timer
                if let Some(idle_timeout) = &mut this.idle_timeout {
                    idle_timeout.reset();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err.into()))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => {
                if let Some(idle_timeout) = &mut this.idle_timeout {
                    if Pin::new(idle_timeout).poll(cx).is_ready() {
                        // disarm so that the teardown exchange that follows
                        // is not interrupted again
                        this.idle_timeout = None;
                        return Poll::Ready(Some(Err(Error::IdleTimeoutElapsed)));
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl<Io> Sink<amqp::Frame> for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut()
            .framed
            .poll_ready_unpin(cx)
            .map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: amqp::Frame) -> Result<(), Self::Error> {
        self.get_mut().framed.start_send_unpin(item).map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut()
            .framed
            .poll_flush_unpin(cx)
            .map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.get_mut()
            .framed
            .poll_close_unpin(cx)
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::codec::Framed;

    use siderite_amqp_types::states::ConnectionState;

    use super::protocol_header::ProtocolHeaderCodec;
    use super::Transport;

    #[tokio::test]
    async fn amqp_header_exchange() {
        let io = tokio_test::io::Builder::new()
            .write(&[0x41, 0x4d, 0x51, 0x50, 0x00, 0x01, 0x00, 0x00])
            .read(&[0x41, 0x4d, 0x51, 0x50, 0x00, 0x01, 0x00, 0x00])
            .build();

        let framed = Framed::new(io, ProtocolHeaderCodec::default());
        let mut state = ConnectionState::Start;
        let transport = Transport::negotiate_amqp_header(framed, &mut state, None)
            .await
            .unwrap();
        assert_eq!(state, ConnectionState::HeaderExchange);
        assert_eq!(transport.max_frame_size(), 512);
    }

    #[tokio::test]
    async fn mismatched_header_ends_negotiation() {
        let io = tokio_test::io::Builder::new()
            .write(&[0x41, 0x4d, 0x51, 0x50, 0x00, 0x01, 0x00, 0x00])
            .read(&[0x41, 0x4d, 0x51, 0x50, 0x03, 0x01, 0x00, 0x00])
            .build();

        let framed = Framed::new(io, ProtocolHeaderCodec::default());
        let mut state = ConnectionState::Start;
        let result = Transport::negotiate_amqp_header(framed, &mut state, None).await;
        assert!(result.is_err());
        assert_eq!(state, ConnectionState::End);
    }
}
