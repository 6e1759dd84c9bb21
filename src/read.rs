use crate::close::{CloseCode, CloseReason};
use crate::config::WebSocketConfig;
use crate::error::Error;
use crate::frame::{FrameHeader, FrameInfo, OpCode};
use crate::mask::MaskKey;
use crate::message::Message;
use crate::utf8::Utf8Validator;
use crate::write::{Role, Writer};
use bytes::BytesMut;
use log::debug;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader, ReadHalf};
use tokio::sync::Mutex;

// Payloads stream through a bounded scratch chunk so a large frame never
// forces one contiguous wire read, and text gets validated as it arrives
const READ_CHUNK: usize = 8 * 1024;

pub type PongCallback = Box<dyn FnMut(&[u8]) + Send>;

/// The reading half of a websocket connection.
///
/// Owns every piece of inbound protocol state: continuation tracking, the
/// cumulative message size, the streaming UTF-8 validator, and the captured
/// peer close reason. It shares the `Writer` with the user-facing write
/// half, since pings and closes have to be answered from inside the read
/// loop.
pub struct ReadStream<S> {
    buf_reader: BufReader<ReadHalf<S>>,
    // bytes that arrived together with the handshake but belong to framing
    pending: BytesMut,
    writer: Arc<Mutex<Writer<S>>>,
    role: Role,
    config: WebSocketConfig,
    // a data message is in progress, only Continue or control may follow
    rd_cont: bool,
    // opcode of the in-progress message, always Text or Binary
    rd_opcode: OpCode,
    // cumulative payload bytes of the in-progress message
    rd_size: u64,
    utf8: Utf8Validator,
    close_reason: Option<CloseReason>,
    closed: bool,
    failed: bool,
    pong_callback: Option<PongCallback>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ReadStream<S> {
    pub(crate) fn new(
        buf_reader: BufReader<ReadHalf<S>>,
        pending: BytesMut,
        writer: Arc<Mutex<Writer<S>>>,
        role: Role,
        config: WebSocketConfig,
    ) -> Self {
        Self {
            buf_reader,
            pending,
            writer,
            role,
            config,
            rd_cont: false,
            rd_opcode: OpCode::Binary,
            rd_size: 0,
            utf8: Utf8Validator::new(),
            close_reason: None,
            closed: false,
            failed: false,
            pong_callback: None,
        }
    }

    /// Registers a callback invoked with the payload of every inbound pong.
    ///
    /// The callback runs inline on the read path, so it should only inspect
    /// the payload and must not call back into the stream.
    pub fn set_pong_callback(&mut self, callback: PongCallback) {
        self.pong_callback = Some(callback);
    }

    /// The close reason the peer sent, once the closing handshake has been
    /// observed by a read.
    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// Reads one data frame, appending its payload to `dst`.
    ///
    /// Control frames never surface here: pings are answered, pongs are
    /// handed to the callback, and a close runs the closing handshake and
    /// returns `Error::Closed`. Continuation frames report the opcode of
    /// the message they extend, so the returned opcode is always `Text` or
    /// `Binary`, with `fin` marking the last fragment.
    pub async fn read_frame(&mut self, dst: &mut BytesMut) -> Result<FrameInfo, Error> {
        if self.failed {
            return Err(Error::Failed);
        }
        if self.closed {
            // reading past the closing handshake is distinguishable from
            // a transport error
            return Err(Error::Closed);
        }

        loop {
            let header = match self.next_header().await {
                Ok(header) => header,
                Err(err @ Error::IOError { .. }) => return Err(self.fail_io(err).await),
                Err(_) => return Err(self.fail(CloseCode::Protocol).await),
            };

            // Masking discipline is fixed by role: clients mask, servers don't
            let mask_ok = match self.role {
                Role::Server => header.mask.is_some(),
                Role::Client => header.mask.is_none(),
            };
            if !mask_ok {
                return Err(self.fail(CloseCode::Protocol).await);
            }

            if header.opcode.is_control() {
                // pings and pongs are absorbed here, a close never returns
                self.handle_control(&header).await?;
                continue;
            }

            // Continuation discipline for data frames
            if header.opcode == OpCode::Continue {
                if !self.rd_cont {
                    return Err(self.fail(CloseCode::Protocol).await);
                }
                self.rd_size = self.rd_size.saturating_add(header.length);
            } else {
                if self.rd_cont {
                    return Err(self.fail(CloseCode::Protocol).await);
                }
                self.rd_opcode = header.opcode;
                self.rd_size = header.length;
                if header.opcode == OpCode::Text {
                    self.utf8.reset();
                }
            }

            if let Some(max) = self.config.max_message_size {
                if self.rd_size > max as u64 {
                    return Err(self.fail(CloseCode::TooBig).await);
                }
            }

            self.rd_cont = !header.fin;

            if header.length == 0 && !header.fin {
                // an empty fragment is legal, keep going
                continue;
            }

            return self.read_payload(&header, dst).await;
        }
    }

    /// Reads a whole message: frames are accumulated into `dst` until the
    /// final fragment, and the message opcode is returned.
    pub async fn read(&mut self, dst: &mut BytesMut) -> Result<OpCode, Error> {
        loop {
            let fi = self.read_frame(dst).await?;
            if fi.fin {
                return Ok(fi.opcode);
            }
        }
    }

    /// Reads a whole message and converts it, validating nothing new: the
    /// frame layer already guaranteed UTF-8 for text.
    pub async fn read_message(&mut self) -> Result<Message, Error> {
        let mut payload = BytesMut::new();
        let opcode = self.read(&mut payload).await?;
        Message::from_payload(opcode, payload.to_vec())
    }

    async fn next_header(&mut self) -> Result<FrameHeader, Error> {
        let mut prefix_bytes = [0u8; 2];
        self.fill_exact(&mut prefix_bytes).await?;
        let prefix = FrameHeader::parse_prefix(prefix_bytes)?;

        let mut tail = [0u8; 12];
        let tail_len = prefix.tail_len();
        self.fill_exact(&mut tail[..tail_len]).await?;
        prefix.complete(&tail[..tail_len])
    }

    async fn handle_control(&mut self, header: &FrameHeader) -> Result<(), Error> {
        // control payloads are at most 125 bytes, enforced by the codec
        let mut storage = [0u8; 125];
        let payload = &mut storage[..header.length as usize];
        if let Err(err) = self.fill_exact(payload).await {
            return Err(self.fail_io(err).await);
        }
        if let Some(key) = header.mask {
            MaskKey::new(key).apply(payload);
        }

        if header.opcode == OpCode::Ping {
            // answer before any further data payload reaches the caller
            let mut writer = self.writer.lock().await;
            match writer.pong(payload).await {
                Ok(()) => {}
                // no pongs once our close is out, the RFC says drop them
                Err(Error::Closed) => {}
                Err(err) => {
                    writer.abort().await;
                    drop(writer);
                    self.failed = true;
                    return Err(err);
                }
            }
            return Ok(());
        }

        if header.opcode == OpCode::Pong {
            if let Some(callback) = self.pong_callback.as_mut() {
                callback(payload);
            }
            return Ok(());
        }

        // Close. A bad payload (lone length-1, disallowed code, non-UTF-8
        // reason) fails the connection instead of closing it cleanly.
        let reason = match CloseReason::decode(payload) {
            Ok(reason) => reason,
            Err(_) => return Err(self.fail(CloseCode::Protocol).await),
        };
        let reply_code = reason
            .as_ref()
            .map(|reason| reason.code)
            .unwrap_or(CloseCode::Normal);
        debug!("peer sent close, echoing code {}", reply_code);
        self.close_reason = reason;

        let mut writer = self.writer.lock().await;
        let replied = writer.reply_close(reply_code).await;
        writer.teardown().await;
        drop(writer);
        self.closed = true;

        match replied {
            Ok(()) => Err(Error::Closed),
            Err(err) => {
                self.failed = true;
                Err(err)
            }
        }
    }

    async fn read_payload(
        &mut self,
        header: &FrameHeader,
        dst: &mut BytesMut,
    ) -> Result<FrameInfo, Error> {
        let mut remaining = header.length as usize;
        let mut key = header.mask.map(MaskKey::new);
        let mut scratch = vec![0u8; remaining.min(READ_CHUNK)];

        while remaining > 0 {
            let n = remaining.min(READ_CHUNK);
            let chunk = &mut scratch[..n];
            if let Err(err) = self.fill_exact(chunk).await {
                return Err(self.fail_io(err).await);
            }
            if let Some(key) = key.as_mut() {
                key.apply(chunk);
            }
            if self.rd_opcode == OpCode::Text && !self.utf8.write(chunk) {
                return Err(self.fail(CloseCode::BadPayload).await);
            }
            dst.extend_from_slice(chunk);
            remaining -= n;
        }

        // a text message may not end in the middle of a codepoint
        if header.fin && self.rd_opcode == OpCode::Text && !self.utf8.finish() {
            return Err(self.fail(CloseCode::BadPayload).await);
        }

        Ok(FrameInfo {
            opcode: self.rd_opcode,
            fin: header.fin,
        })
    }

    /// Reads exactly `out.len()` bytes, draining handshake leftovers first.
    async fn fill_exact(&mut self, out: &mut [u8]) -> Result<(), Error> {
        let from_pending = self.pending.len().min(out.len());
        if from_pending > 0 {
            let bytes = self.pending.split_to(from_pending);
            out[..from_pending].copy_from_slice(&bytes);
        }
        if from_pending < out.len() {
            self.buf_reader.read_exact(&mut out[from_pending..]).await?;
        }
        Ok(())
    }

    /// Protocol failure: best-effort close frame, teardown, latch.
    async fn fail(&mut self, code: CloseCode) -> Error {
        debug!("failing websocket connection with close code {}", code);
        self.failed = true;
        let mut writer = self.writer.lock().await;
        writer.fail(code).await
    }

    /// Transport failure: nothing left to say on the wire, latch and tear
    /// down, surface the IO error verbatim.
    async fn fail_io(&mut self, err: Error) -> Error {
        self.failed = true;
        let mut writer = self.writer.lock().await;
        writer.abort().await;
        err
    }
}
