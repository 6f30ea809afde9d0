use std::net::ToSocketAddrs;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::protocol::error::{DuorpcError, Result};
use crate::protocol::Message;
use crate::transport::codec::JsonCodec;

/// Maximum frame size (1 MB). Frames above this are a decode error and tear
/// the connection down.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Connects to a remote endpoint.
///
/// The address may resolve to several socket addresses; each is tried until
/// one succeeds.
pub async fn connect(addr: &str) -> Result<TcpStream> {
    let socket_addrs = addr
        .to_socket_addrs()
        .map_err(|e| DuorpcError::Connection(format!("Invalid address '{}': {}", addr, e)))?;

    let mut last_err = None;
    for socket_addr in socket_addrs {
        match TcpStream::connect(&socket_addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(DuorpcError::Connection(format!(
        "Failed to connect to {}: {}",
        addr,
        last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses resolved".to_string())
    )))
}

/// Splits a connected stream into its two framed halves.
pub fn split(stream: TcpStream) -> (MessageStream<OwnedReadHalf>, MessageSink<OwnedWriteHalf>) {
    let (read_half, write_half) = stream.into_split();
    (MessageStream::new(read_half), MessageSink::new(write_half))
}

/// The receive side of a connection: a blocking sequence of messages.
///
/// There must be exactly one reader per connection. The wire format is a
/// 4-byte big-endian length prefix followed by the JSON-encoded [`Message`].
pub struct MessageStream<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> MessageStream<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Receives the next message.
    ///
    /// Returns `Ok(None)` when the peer closes the connection cleanly (EOF
    /// on a frame boundary). EOF in the middle of a frame, I/O failures, and
    /// undecodable frames are errors; the caller is expected to tear the
    /// connection down.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => {
                return Err(DuorpcError::Connection(format!(
                    "Failed to read length prefix: {}",
                    e
                )))
            }
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(DuorpcError::FrameTooLarge {
                len,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = vec![0u8; len];
        self.reader
            .read_exact(&mut buf)
            .await
            .map_err(|e| DuorpcError::Connection(format!("Failed to read frame: {}", e)))?;

        Ok(Some(JsonCodec::decode(&buf)?))
    }
}

/// The send side of a connection.
///
/// Cloning shares the underlying write half; the per-connection write lock
/// is held across the whole frame (length prefix, body, flush), so
/// concurrent senders never interleave partial writes.
pub struct MessageSink<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for MessageSink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W: AsyncWrite + Unpin> MessageSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Sends one message as a single frame.
    pub async fn send(&self, message: &Message) -> Result<()> {
        let encoded = JsonCodec::encode(message)?;
        if encoded.len() > MAX_FRAME_SIZE {
            return Err(DuorpcError::FrameTooLarge {
                len: encoded.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let len = encoded.len() as u32;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| DuorpcError::Connection(format!("Failed to write length prefix: {}", e)))?;
        writer
            .write_all(&encoded)
            .await
            .map_err(|e| DuorpcError::Connection(format!("Failed to write frame: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| DuorpcError::Connection(format!("Failed to flush stream: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn frame_round_trip() {
        let (client, server) = duplex(4096);
        let sink = MessageSink::new(client);
        let mut stream = MessageStream::new(server);

        let msg = Message::request(1, "increment 42");
        sink.send(&msg).await.unwrap();

        let received = stream.recv().await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (client, server) = duplex(64);
        drop(client);
        let mut stream = MessageStream::new(server);
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_an_error() {
        let (mut client, server) = duplex(64);
        // Length prefix promising 100 bytes, then hang up.
        client.write_all(&100u32.to_be_bytes()).await.unwrap();
        client.write_all(b"short").await.unwrap();
        drop(client);

        let mut stream = MessageStream::new(server);
        assert!(stream.recv().await.is_err());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut client, server) = duplex(64);
        let bogus_len = (MAX_FRAME_SIZE + 1) as u32;
        client.write_all(&bogus_len.to_be_bytes()).await.unwrap();

        let mut stream = MessageStream::new(server);
        match stream.recv().await {
            Err(DuorpcError::FrameTooLarge { len, .. }) => {
                assert_eq!(len, MAX_FRAME_SIZE + 1)
            }
            other => panic!("expected FrameTooLarge, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn undecodable_frame_is_an_error() {
        let (mut client, server) = duplex(64);
        let garbage = b"{\"nope\":";
        client
            .write_all(&(garbage.len() as u32).to_be_bytes())
            .await
            .unwrap();
        client.write_all(garbage).await.unwrap();

        let mut stream = MessageStream::new(server);
        assert!(matches!(stream.recv().await, Err(DuorpcError::Codec(_))));
    }

    #[tokio::test]
    async fn concurrent_senders_do_not_interleave_frames() {
        let (client, server) = duplex(64 * 1024);
        let sink = MessageSink::new(client);
        let mut stream = MessageStream::new(server);

        let mut handles = Vec::new();
        for i in 0..100u64 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.send(&Message::reply(i, i, format!("payload {}", i)))
                    .await
                    .unwrap();
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            let msg = stream.recv().await.unwrap().expect("stream ended early");
            assert_eq!(msg.payload, format!("payload {}", msg.id));
            assert!(seen.insert(msg.id), "duplicate frame for id {}", msg.id);
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }
}
