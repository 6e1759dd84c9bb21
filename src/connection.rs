use crate::close::CloseReason;
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{FrameInfo, OpCode};
use crate::message::Message;
use crate::read::{PongCallback, ReadStream};
use crate::split::WSWriter;
use crate::write::{Role, Writer};
use bytes::BytesMut;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex;

/// An open websocket connection over an arbitrary byte stream.
///
/// Produced by the handshake entry points in [`crate::handshake`], never
/// constructed around a transport that has not completed the upgrade. The
/// same type serves both roles; only the masking direction differs.
///
/// Reads and writes touch disjoint state, so the connection can be
/// [`split`](WSConnection::split) into halves driven by separate tasks.
pub struct WSConnection<S> {
    reader: ReadStream<S>,
    writer: WSWriter<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> WSConnection<S> {
    /// Wraps a transport whose handshake already completed. `pending` holds
    /// any bytes read past the end of the handshake messages; they are the
    /// first frame bytes.
    pub(crate) fn after_handshake(
        stream: S,
        role: Role,
        pending: BytesMut,
        config: WebSocketConfig,
    ) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let writer = Arc::new(Mutex::new(Writer::new(
            write_half,
            role,
            config.mask_buf_size,
        )));
        let reader = ReadStream::new(
            BufReader::new(read_half),
            pending,
            writer.clone(),
            role,
            config.clone(),
        );
        Self {
            reader,
            writer: WSWriter::new(writer, config),
        }
    }

    /// Splits the connection so reads and writes can run concurrently from
    /// different tasks. The reading half keeps its handle on the shared
    /// writer for control replies.
    pub fn split(self) -> (ReadStream<S>, WSWriter<S>) {
        (self.reader, self.writer)
    }

    /// See [`ReadStream::read_frame`].
    pub async fn read_frame(&mut self, dst: &mut BytesMut) -> Result<FrameInfo, Error> {
        self.reader.read_frame(dst).await
    }

    /// See [`ReadStream::read`].
    pub async fn read(&mut self, dst: &mut BytesMut) -> Result<OpCode, Error> {
        self.reader.read(dst).await
    }

    pub async fn read_message(&mut self) -> Result<Message, Error> {
        self.reader.read_message().await
    }

    pub async fn write_frame(
        &mut self,
        fin: bool,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        self.writer.write_frame(fin, opcode, payload).await
    }

    pub async fn write(&mut self, opcode: OpCode, payload: &[u8]) -> Result<(), Error> {
        self.writer.write(opcode, payload).await
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        self.writer.send_message(message).await
    }

    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send(data).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.writer.send_as_text(data).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send_as_binary(data).await
    }

    pub async fn ping(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.writer.ping(payload).await
    }

    pub async fn close(&mut self, reason: Option<CloseReason>) -> Result<(), Error> {
        self.writer.close(reason).await
    }

    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.writer.close_connection().await
    }

    pub fn set_pong_callback(&mut self, callback: PongCallback) {
        self.reader.set_pong_callback(callback);
    }

    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.reader.close_reason()
    }
}
