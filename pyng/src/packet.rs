//! Packet framing for the status exchange.
//!
//! Every packet on the wire is `<length: VarInt><id: VarInt><payload>`, where
//! the length counts the id and the payload but not itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Error,
    varint::{
        closed_on_eof, read_string, read_varint, read_varint_from, varint_len, write_string,
        write_varint,
    },
};

/// Largest length a packet may declare: the biggest value a 3-byte VarInt holds.
pub const MAX_PACKET_LEN: usize = 2_097_151;

pub const HANDSHAKE_ID: i32 = 0x00;
pub const STATUS_ID: i32 = 0x00;
pub const PING_ID: i32 = 0x01;

/// `nextState` value announcing a status (rather than login) connection.
pub const NEXT_STATE_STATUS: i32 = 1;

/// A framed packet before its payload has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub payload: Vec<u8>,
}

/// Write one packet in a single `write_all`, then flush.
///
/// # Errors
/// Any I/O error from the underlying stream.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    id: i32,
    payload: &[u8],
) -> Result<(), Error> {
    let body_len = varint_len(id) + payload.len();
    if body_len > MAX_PACKET_LEN {
        return Err(Error::OversizedPacket(body_len));
    }
    let mut frame = Vec::with_capacity(3 + body_len);
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    write_varint(&mut frame, body_len as i32);
    write_varint(&mut frame, id);
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one packet.
///
/// # Errors
/// [`Error::ConnectionClosed`] if the stream ends before the declared length
/// has arrived, [`Error::OversizedPacket`] for lengths above
/// [`MAX_PACKET_LEN`], [`Error::InvalidLength`] for zero or negative lengths.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<RawPacket, Error> {
    let declared = read_varint_from(reader).await?;
    let len = usize::try_from(declared).map_err(|_| Error::InvalidLength(declared))?;
    if len == 0 {
        return Err(Error::InvalidLength(declared));
    }
    if len > MAX_PACKET_LEN {
        return Err(Error::OversizedPacket(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(closed_on_eof)?;

    let mut cursor = body.as_slice();
    let id = read_varint(&mut cursor)?;
    let consumed = len - cursor.len();
    body.drain(..consumed);
    Ok(RawPacket { id, payload: body })
}

impl RawPacket {
    /// The JSON document of a status response.
    ///
    /// # Errors
    /// [`Error::UnexpectedPacket`] for any other id, or a string decoding error.
    pub fn status_document(&self) -> Result<String, Error> {
        expect_id(self, STATUS_ID)?;
        read_string(&mut self.payload.as_slice())
    }

    /// The token carried by a ping or pong.
    ///
    /// # Errors
    /// [`Error::UnexpectedPacket`] for any other id, [`Error::TruncatedRead`]
    /// if fewer than 8 payload bytes arrived.
    pub fn ping_token(&self) -> Result<i64, Error> {
        expect_id(self, PING_ID)?;
        let bytes: [u8; 8] = self
            .payload
            .get(..8)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(Error::TruncatedRead)?;
        Ok(i64::from_be_bytes(bytes))
    }
}

/// The packets of the status state, serverbound and clientbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake {
        version: i32,
        host: String,
        port: u16,
        next_state: i32,
    },
    Request,
    Response {
        response: String,
    },
    Ping {
        payload: i64,
    },
    Pong {
        payload: i64,
    },
}

impl Packet {
    #[must_use]
    pub const fn id(&self) -> i32 {
        match self {
            Self::Handshake { .. } => HANDSHAKE_ID,
            Self::Request | Self::Response { .. } => STATUS_ID,
            Self::Ping { .. } | Self::Pong { .. } => PING_ID,
        }
    }

    /// Serialize the payload (everything after the packet id).
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::Handshake {
                version,
                host,
                port,
                next_state,
            } => {
                write_varint(&mut buf, *version);
                write_string(&mut buf, host);
                buf.extend_from_slice(&port.to_be_bytes());
                write_varint(&mut buf, *next_state);
            }
            Self::Request => {}
            Self::Response { response } => write_string(&mut buf, response),
            Self::Ping { payload } | Self::Pong { payload } => {
                buf.extend_from_slice(&payload.to_be_bytes());
            }
        }
        buf
    }

    /// Frame and send this packet.
    ///
    /// # Errors
    /// Any I/O error from the underlying stream.
    pub async fn send<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), Error> {
        write_packet(writer, self.id(), &self.payload()).await
    }
}

fn expect_id(raw: &RawPacket, expected: i32) -> Result<(), Error> {
    if raw.id == expected {
        Ok(())
    } else {
        Err(Error::UnexpectedPacket {
            expected,
            got: raw.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn frames_round_trip_over_a_pipe() {
        let (mut client, mut server) = duplex(64 * 1024);
        let big = vec![0xab; 40_000];
        let cases: [(i32, &[u8]); 4] = [(0x00, &[]), (0x01, &[1, 2, 3, 4, 5, 6, 7, 8]), (0x7f, b"x"), (0x80, &big)];
        for (id, payload) in cases {
            write_packet(&mut client, id, payload).await.unwrap();
            let packet = read_packet(&mut server).await.unwrap();
            assert_eq!(packet.id, id);
            assert_eq!(packet.payload, payload);
        }
    }

    #[tokio::test]
    async fn handshake_layout_matches_the_wire_format() {
        let mut out = Vec::new();
        Packet::Handshake {
            version: 578,
            host: "localhost".into(),
            port: 25565,
            next_state: NEXT_STATE_STATUS,
        }
        .send(&mut out)
        .await
        .unwrap();

        let mut expected = vec![0x00];
        expected.extend_from_slice(&[0xc2, 0x04]);
        expected.push(9);
        expected.extend_from_slice(b"localhost");
        expected.extend_from_slice(&[0x63, 0xdd]);
        expected.push(0x01);
        #[allow(clippy::cast_possible_truncation)]
        let len = expected.len() as u8;
        expected.insert(0, len);
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn status_request_is_an_empty_body() {
        let mut out = Vec::new();
        Packet::Request.send(&mut out).await.unwrap();
        assert_eq!(out, [0x01, 0x00]);
    }

    #[tokio::test]
    async fn truncated_body_reports_closed_connection() {
        let mut reader: &[u8] = &[0x0a, 0x00, 0x01, 0x02];
        assert!(matches!(
            read_packet(&mut reader).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn server_hanging_up_mid_packet_does_not_hang() {
        let (mut client, mut server) = duplex(1024);
        tokio::spawn(async move {
            server.write_all(&[0x20, 0x00, 0x05, b'a']).await.unwrap();
            drop(server);
        });
        assert!(matches!(
            read_packet(&mut client).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn oversized_length_is_rejected_before_allocating() {
        let mut frame = Vec::new();
        write_varint(&mut frame, 0x0fff_ffff);
        let mut reader = frame.as_slice();
        assert!(matches!(
            read_packet(&mut reader).await,
            Err(Error::OversizedPacket(0x0fff_ffff))
        ));
    }

    #[tokio::test]
    async fn negative_or_empty_length_is_invalid() {
        let mut frame = Vec::new();
        write_varint(&mut frame, -3);
        assert!(matches!(
            read_packet(&mut frame.as_slice()).await,
            Err(Error::InvalidLength(-3))
        ));
        assert!(matches!(
            read_packet(&mut [0x00u8].as_slice()).await,
            Err(Error::InvalidLength(0))
        ));
    }

    #[test]
    fn pong_needs_eight_bytes_and_the_right_id() {
        let short = RawPacket {
            id: PING_ID,
            payload: vec![0; 4],
        };
        assert!(matches!(short.ping_token(), Err(Error::TruncatedRead)));

        let wrong = RawPacket {
            id: 0x02,
            payload: 7i64.to_be_bytes().to_vec(),
        };
        assert!(matches!(
            wrong.ping_token(),
            Err(Error::UnexpectedPacket { expected: PING_ID, got: 0x02 })
        ));

        let good = RawPacket {
            id: PING_ID,
            payload: (-42i64).to_be_bytes().to_vec(),
        };
        assert_eq!(good.ping_token().unwrap(), -42);
    }

    #[test]
    fn response_carries_one_string() {
        let packet = Packet::Response {
            response: r#"{"a":1}"#.into(),
        };
        let raw = RawPacket {
            id: packet.id(),
            payload: packet.payload(),
        };
        assert_eq!(raw.status_document().unwrap(), r#"{"a":1}"#);
    }
}
