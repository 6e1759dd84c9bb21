use crate::close::{CloseCode, CloseReason};
use crate::error::Error;
use crate::frame::{FrameHeader, OpCode};
use crate::mask::MaskKey;
use bytes::BytesMut;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, WriteHalf};

/// Which side of the connection this endpoint plays. The role decides the
/// masking direction: a client masks everything it sends and rejects masked
/// inbound frames, a server does the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The owning write half of a connection.
///
/// Shared behind a mutex between the user-facing writer and the read path,
/// because a read may have to emit a pong or a close reply of its own. The
/// lock is the interlock: a user write holds it for one frame at a time, so
/// a control reply slots in between frames of a fragmented message.
pub struct Writer<S> {
    write_half: WriteHalf<S>,
    role: Role,
    // per-stream masking key generator, seeded at construction
    mask_gen: StdRng,
    mask_buf_size: usize,
    // a data message is mid-flight, the next data frame must be Continue
    wr_cont: bool,
    wr_close: bool,
    failed: bool,
    torn_down: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Writer<S> {
    pub fn new(write_half: WriteHalf<S>, role: Role, mask_buf_size: usize) -> Self {
        Self {
            write_half,
            role,
            mask_gen: StdRng::from_rng(&mut rand::rng()),
            mask_buf_size,
            wr_cont: false,
            wr_close: false,
            failed: false,
            torn_down: false,
        }
    }

    /// Writes a single frame. Data frames participate in continuation
    /// tracking: while a message is unfinished the opcode is forced to
    /// `Continue`, and `fin` hands the sequence back.
    pub async fn write_frame(
        &mut self,
        fin: bool,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        if self.failed {
            return Err(Error::Failed);
        }

        let opcode = if opcode.is_control() {
            if !fin {
                return Err(Error::ControlFramesFragmented);
            }
            if payload.len() > 125 {
                return Err(Error::ControlFramePayloadSize);
            }
            if self.wr_close {
                // at most one close per lifetime; later close calls are
                // absorbed, anything else is a write past the handshake
                if opcode == OpCode::Close {
                    return Ok(());
                }
                return Err(Error::Closed);
            }
            opcode
        } else {
            if self.wr_close {
                return Err(Error::Closed);
            }
            if opcode == OpCode::Continue && !self.wr_cont {
                return Err(Error::InvalidContinuationFrame);
            }
            let resolved = if self.wr_cont { OpCode::Continue } else { opcode };
            self.wr_cont = !fin;
            resolved
        };

        if opcode == OpCode::Close {
            self.wr_close = true;
        }

        let result = self.write_frame_bytes(fin, opcode, payload).await;
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    pub async fn ping(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_frame(true, OpCode::Ping, payload).await
    }

    pub async fn pong(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_frame(true, OpCode::Pong, payload).await
    }

    /// Starts the closing handshake. The peer's reciprocal close is observed
    /// by a later read, this call only emits our half and latches it.
    pub async fn close(&mut self, reason: Option<CloseReason>) -> Result<(), Error> {
        if self.failed {
            return Err(Error::Failed);
        }
        if self.wr_close {
            return Ok(());
        }
        let payload = match &reason {
            Some(reason) => reason.encode()?,
            None => Vec::new(),
        };
        self.write_frame(true, OpCode::Close, &payload).await
    }

    /// Echoes the peer's close during the closing handshake: same code,
    /// empty reason. Skipped when our close already went out.
    pub(crate) async fn reply_close(&mut self, code: CloseCode) -> Result<(), Error> {
        if self.wr_close || self.failed {
            return Ok(());
        }
        self.wr_close = true;
        let payload = CloseReason::new(code, "").encode()?;
        let result = self.write_frame_bytes(true, OpCode::Close, &payload).await;
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Fails the connection: a best-effort close frame carrying `code`,
    /// transport teardown, and the latch that stops any further operation.
    pub(crate) async fn fail(&mut self, code: CloseCode) -> Error {
        if !self.failed && !self.wr_close {
            self.wr_close = true;
            if let Ok(payload) = CloseReason::new(code, "").encode() {
                let _ = self.write_frame_bytes(true, OpCode::Close, &payload).await;
            }
        }
        self.failed = true;
        self.teardown().await;
        Error::Failed
    }

    /// Latches failure without attempting a close frame, for when the
    /// transport itself already broke.
    pub(crate) async fn abort(&mut self) {
        self.failed = true;
        self.teardown().await;
    }

    /// Graceful transport teardown, invoked exactly once per stream.
    pub(crate) async fn teardown(&mut self) {
        if !self.torn_down {
            self.torn_down = true;
            let _ = self.write_half.shutdown().await;
        }
    }

    async fn write_frame_bytes(
        &mut self,
        fin: bool,
        opcode: OpCode,
        payload: &[u8],
    ) -> Result<(), Error> {
        let mask = match self.role {
            Role::Client => Some(self.mask_gen.random::<[u8; 4]>()),
            Role::Server => None,
        };

        let header = FrameHeader {
            fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode,
            length: payload.len() as u64,
            mask,
        };
        let mut head = BytesMut::with_capacity(14);
        header.encode(&mut head);
        self.write_half.write_all(&head).await?;

        match mask {
            None => self.write_half.write_all(payload).await?,
            Some(key) => {
                // The caller keeps ownership of its buffers, so masking goes
                // through a bounded scratch buffer chunk by chunk
                let mut prepared = MaskKey::new(key);
                let chunk_len = payload.len().min(self.mask_buf_size).max(1);
                let mut scratch = vec![0u8; chunk_len];
                for chunk in payload.chunks(chunk_len) {
                    let dst = &mut scratch[..chunk.len()];
                    dst.copy_from_slice(chunk);
                    prepared.apply(dst);
                    self.write_half.write_all(dst).await?;
                }
            }
        }

        Ok(())
    }
}
