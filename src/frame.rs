use crate::error::Error;
use bytes::{BufMut, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Continue,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x0 => Ok(OpCode::Continue),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            // 0x3-0x7 and 0xB-0xF are reserved by the RFC
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            OpCode::Continue => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// Opcode and fin bit of the data frame a read call delivered.
///
/// Continuation frames report the opcode of the message they belong to,
/// so `opcode` is always `Text` or `Binary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub opcode: OpCode,
    pub fin: bool,
}

/// A decoded RFC 6455 frame header, the 2 to 14 bytes in front of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub length: u64,
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Serializes the header into `dst`.
    ///
    /// Layout per the RFC: the first byte packs fin/rsv/opcode, the second the
    /// mask bit plus a 7-bit length which escapes to 2 or 8 big-endian bytes
    /// for larger payloads, followed by the 4-byte masking key when present.
    pub fn encode(&self, dst: &mut BytesMut) {
        let first_byte = (self.fin as u8) << 7
            | (self.rsv1 as u8) << 6
            | (self.rsv2 as u8) << 5
            | (self.rsv3 as u8) << 4
            | self.opcode.as_u8();
        dst.put_u8(first_byte);

        let mask_bit = if self.mask.is_some() { 0b1000_0000 } else { 0 };
        if self.length <= 125 {
            dst.put_u8(mask_bit | self.length as u8);
        } else if self.length <= 65535 {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(self.length as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(self.length);
        }

        if let Some(key) = self.mask {
            dst.put_slice(&key);
        }
    }

    /// Parses the two fixed header bytes, validating everything that can be
    /// validated before the extended length and masking key have arrived.
    pub fn parse_prefix(prefix: [u8; 2]) -> Result<HeaderPrefix, Error> {
        let fin = (prefix[0] & 0b1000_0000) != 0;
        let rsv1 = (prefix[0] & 0b0100_0000) != 0;
        let rsv2 = (prefix[0] & 0b0010_0000) != 0;
        let rsv3 = (prefix[0] & 0b0001_0000) != 0;

        // Without a negotiated extension the reserved bits must be zero,
        // and the connection fails immediately when they are not
        if rsv1 || rsv2 || rsv3 {
            return Err(Error::RSVNotZero);
        }

        let opcode = OpCode::from(prefix[0] & 0b0000_1111)?;
        let masked = (prefix[1] & 0b1000_0000) != 0;
        let len7 = prefix[1] & 0b0111_1111;

        if opcode.is_control() {
            // Control frames can't be fragmented and carry at most 125 bytes
            if !fin {
                return Err(Error::ControlFramesFragmented);
            }
            if len7 > 125 {
                return Err(Error::ControlFramePayloadSize);
            }
        }

        Ok(HeaderPrefix {
            fin,
            opcode,
            masked,
            len7,
        })
    }
}

/// The fixed part of a header, parsed but still waiting for its tail bytes.
#[derive(Debug, Clone, Copy)]
pub struct HeaderPrefix {
    pub fin: bool,
    pub opcode: OpCode,
    pub masked: bool,
    len7: u8,
}

impl HeaderPrefix {
    /// How many more bytes the wire owes us: 0, 2 or 8 for the extended
    /// length, plus 4 for the masking key when the mask bit is set.
    pub fn tail_len(&self) -> usize {
        let extended = match self.len7 {
            126 => 2,
            127 => 8,
            _ => 0,
        };
        extended + if self.masked { 4 } else { 0 }
    }

    /// Completes the header from its tail bytes. `tail` must be exactly
    /// `tail_len()` bytes long.
    pub fn complete(self, tail: &[u8]) -> Result<FrameHeader, Error> {
        let (length, key_offset) = match self.len7 {
            126 => (u16::from_be_bytes([tail[0], tail[1]]) as u64, 2),
            127 => {
                let mut be_bytes = [0u8; 8];
                be_bytes.copy_from_slice(&tail[..8]);
                let len = u64::from_be_bytes(be_bytes);
                // The RFC requires the most significant bit of the 8-byte
                // form to be zero
                if len & (1 << 63) != 0 {
                    return Err(Error::InvalidPayloadLength);
                }
                (len, 8)
            }
            n => (n as u64, 0),
        };

        let mask = if self.masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&tail[key_offset..key_offset + 4]);
            Some(key)
        } else {
            None
        };

        Ok(FrameHeader {
            fin: self.fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: self.opcode,
            length,
            mask,
        })
    }
}

/// Decodes a header from the front of `src`.
///
/// Returns `Ok(None)` when `src` does not yet hold a complete header, and the
/// header plus its encoded size once it does. Used by the tests and the fuzz
/// target; the read path feeds the prefix and tail in separately as they
/// arrive from the transport.
pub fn decode_header(src: &[u8]) -> Result<Option<(FrameHeader, usize)>, Error> {
    if src.len() < 2 {
        return Ok(None);
    }
    let prefix = FrameHeader::parse_prefix([src[0], src[1]])?;
    let tail_len = prefix.tail_len();
    if src.len() < 2 + tail_len {
        return Ok(None);
    }
    let header = prefix.complete(&src[2..2 + tail_len])?;
    Ok(Some((header, 2 + tail_len)))
}
