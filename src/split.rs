use crate::close::CloseReason;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::OpCode;
use crate::message::Message;
use crate::write::Writer;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

/// The user-facing writing half of a connection.
///
/// Wraps the shared `Writer` and adds the message-level conveniences:
/// fragmentation per the configured threshold, typed send helpers and the
/// close entry point. The lock is held per frame, never per message, so
/// control replies from the read path can slot in between fragments.
pub struct WSWriter<S> {
    writer: Arc<Mutex<Writer<S>>>,
    config: WebSocketConfig,
}

impl<S: AsyncRead + AsyncWrite + Unpin> WSWriter<S> {
    pub(crate) fn new(writer: Arc<Mutex<Writer<S>>>, config: WebSocketConfig) -> Self {
        Self { writer, config }
    }

    /// Writes a single frame. `fin` on a data frame marks the end of the
    /// message; until then the stream keeps forcing continuation opcodes.
    pub async fn write_frame(
        &mut self,
        fin: bool,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        self.writer.lock().await.write_frame(fin, opcode, payload).await
    }

    /// Writes a whole data message, fragmenting it per `fragment_size`.
    /// Exactly one emitted frame carries fin, the last one.
    pub async fn write(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
        match self.config.fragment_size {
            Some(fragment_size) if fragment_size > 0 && payload.len() > fragment_size => {
                let chunks = payload.chunks(fragment_size);
                let total_chunks = chunks.len();
                for (i, chunk) in chunks.enumerate() {
                    let is_final = i == total_chunks - 1;
                    self.write_frame(is_final, opcode, chunk).await?;
                }
                Ok(())
            }
            _ => self.write_frame(true, opcode, payload).await,
        }
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        if let Some(max) = self.config.max_message_size {
            if message.as_binary().len() > max {
                return Err(Error::MaxMessageSize);
            }
        }
        let opcode = message.opcode();
        self.write(opcode, &message.into_payload()).await
    }

    // By default raw byte sends go out as a text message, mirroring what
    // most chat-style callers expect
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Text(String::from_utf8(data)?)).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.send_message(Message::Text(data)).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.send_message(Message::Binary(data)).await
    }

    /// Sends a ping. The payload rides along unchanged in the peer's pong.
    pub async fn ping(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.writer.lock().await.ping(payload).await
    }

    pub async fn send_ping(&mut self) -> Result<(), Error> {
        self.ping(&[]).await
    }

    /// Starts the closing handshake. At most one close frame ever goes out,
    /// later calls are absorbed. The peer's reciprocal close is observed by
    /// whoever is reading.
    pub async fn close(&mut self, reason: Option<CloseReason>) -> Result<(), Error> {
        self.writer.lock().await.close(reason).await
    }

    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.close(None).await
    }
}
