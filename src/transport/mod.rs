//! Diameter Protocol Transport

use crate::dictionary::Dictionary;

use crate::diameter::DiameterMessage;
use crate::error::{Error, Result};
use std::io::Cursor;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Which byte-stream transport a peer connection runs over (RFC 6733 §2.1).
/// SCTP is modeled as a second variant behind the same framing `Codec`, but
/// this crate carries no OS-level libsctp bindings: `connect`/`listen`
/// always fail it with `Error::TransportError`, feature-gated so a build
/// can at least express the intent to support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Tcp,
    Sctp,
}

fn sctp_unsupported() -> Error {
    #[cfg(feature = "sctp")]
    {
        Error::TransportError("SCTP requires OS-level libsctp support, not available here".into())
    }
    #[cfg(not(feature = "sctp"))]
    {
        Error::TransportError("SCTP support not compiled in (enable the \"sctp\" feature)".into())
    }
}

/// Opens an outbound connection of the given kind.
pub async fn connect(kind: TransportKind, addr: IpAddr, port: u16) -> Result<TcpStream> {
    match kind {
        TransportKind::Tcp => Ok(TcpStream::connect((addr, port)).await?),
        TransportKind::Sctp => Err(sctp_unsupported()),
    }
}

/// Binds a listener of the given kind. SCTP may be multi-homed across
/// several local `addresses`; TCP binds the first one.
pub async fn listen(kind: TransportKind, addresses: &[IpAddr], port: u16) -> Result<TcpListener> {
    match kind {
        TransportKind::Tcp => {
            let addr = addresses.first().copied().unwrap_or(IpAddr::from([0, 0, 0, 0]));
            Ok(TcpListener::bind((addr, port)).await?)
        }
        TransportKind::Sctp => Err(sctp_unsupported()),
    }
}

/// Codec provides encoding and decoding functionality for Diameter messages
/// over the TCP transport layer.
pub struct Codec {}

impl Codec {
    /// Asynchronously decodes a DiameterMessage from a reader.
    ///
    /// Reads from `reader`, decodes according to Diameter protocol standards, and returns a DiameterMessage.
    ///
    /// # Arguments
    /// * `reader` - A mutable reference to an object implementing `AsyncReadExt` and `Unpin`.
    pub async fn decode<R>(reader: &mut R, dict: Arc<Dictionary>) -> Result<DiameterMessage>
    where
        R: AsyncReadExt + Unpin,
    {
        let mut b = [0; 4];
        reader.read_exact(&mut b).await?;
        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]);

        // Limit to 1MB
        if length as usize > 1024 * 1024 {
            return Err(Error::ClientError("Message too large to read".into()));
        }

        // Read the rest of the message
        let mut buffer = Vec::with_capacity(length as usize);
        buffer.extend_from_slice(&b);
        buffer.resize(length as usize, 0);
        reader.read_exact(&mut buffer[4..]).await?;

        // Decode Response
        let mut cursor = Cursor::new(buffer);
        DiameterMessage::decode_from(&mut cursor, dict)
    }

    /// Asynchronously encodes a DiameterMessage and writes it to a writer.
    ///
    /// Encodes DiameterMessage into a byte stream and writes to `writer`.
    ///
    /// # Arguments
    /// * `writer` - A mutable reference to an object implementing `AsyncWriteExt` and `Unpin`.
    /// * `msg` - A reference to the `DiameterMessage` to encode.
    pub async fn encode<W>(writer: &mut W, msg: &DiameterMessage) -> Result<()>
    where
        W: AsyncWriteExt + Unpin,
    {
        // Encode and send the response
        let mut b = Vec::new();
        msg.encode_to(&mut b)?;

        // Send the response
        writer.write_all(&b).await?;

        Ok(())
    }
}
