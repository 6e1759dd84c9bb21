use crate::error::Error;
use std::fmt;

/// Close status codes defined by RFC 6455, plus the registered ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000, the close every healthy connection ends with
    Normal,
    /// 1001, endpoint is going away
    GoingAway,
    /// 1002, peer violated the protocol
    Protocol,
    /// 1003, endpoint cannot accept this data type
    Unsupported,
    /// 1007, payload was inconsistent with the message type (bad UTF-8)
    BadPayload,
    /// 1008, message violated endpoint policy
    Policy,
    /// 1009, message too big to process
    TooBig,
    /// 1010, client expected an extension the server refused
    MissingExtension,
    /// 1011, server hit an unexpected condition
    InternalError,
    /// anything else, including the 3000-4999 registered/private ranges
    Other(u16),
}

impl CloseCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::GoingAway,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1007 => CloseCode::BadPayload,
            1008 => CloseCode::Policy,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MissingExtension,
            1011 => CloseCode::InternalError,
            other => CloseCode::Other(other),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::BadPayload => 1007,
            CloseCode::Policy => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MissingExtension => 1010,
            CloseCode::InternalError => 1011,
            CloseCode::Other(code) => *code,
        }
    }

    /// Whether the code may appear on the wire. 1005, 1006 and their
    /// neighbors are reserved for local signalling only.
    pub fn is_allowed_on_wire(&self) -> bool {
        matches!(self.as_u16(), 1000..=1003 | 1007..=1011 | 3000..=4999)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// The payload of a close frame: a status code and a short UTF-8 reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: CloseCode,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: CloseCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Serializes to the wire form: 2-byte big-endian code followed by the
    /// reason bytes. A control frame caps the payload at 125 bytes, so the
    /// reason may hold at most 123.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        if self.reason.len() > 123 {
            return Err(Error::ControlFramePayloadSize);
        }
        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.as_u16().to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        Ok(payload)
    }

    /// Parses a close frame payload. An empty payload is legal and means
    /// "no reason given"; a 1-byte payload, a code outside the wire-legal
    /// ranges and a reason that is not UTF-8 are all protocol violations.
    pub fn decode(payload: &[u8]) -> Result<Option<CloseReason>, Error> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::InvalidCloseFrame),
            _ => {
                let code = CloseCode::from_u16(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_allowed_on_wire() {
                    return Err(Error::InvalidCloseCode(code.as_u16()));
                }
                let reason = std::str::from_utf8(&payload[2..])
                    .map_err(|_| Error::InvalidCloseFrame)?
                    .to_owned();
                Ok(Some(CloseReason { code, reason }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_roundtrip() {
        let reason = CloseReason::new(CloseCode::Normal, "bye");
        let payload = reason.encode().unwrap();
        assert_eq!(&payload[..2], &[0x03, 0xE8]);
        assert_eq!(CloseReason::decode(&payload).unwrap().unwrap(), reason);
    }

    #[test]
    fn test_empty_payload_means_no_reason() {
        assert_eq!(CloseReason::decode(&[]).unwrap(), None);
    }

    #[test]
    fn test_one_byte_payload_rejected() {
        assert!(matches!(
            CloseReason::decode(&[0x03]),
            Err(Error::InvalidCloseFrame)
        ));
    }

    #[test]
    fn test_wire_code_ranges() {
        for code in [1000u16, 1001, 1002, 1003, 1007, 1011, 3000, 4999] {
            assert!(CloseCode::from_u16(code).is_allowed_on_wire(), "{}", code);
        }
        for code in [0u16, 999, 1004, 1005, 1006, 1012, 2999, 5000, 65535] {
            assert!(!CloseCode::from_u16(code).is_allowed_on_wire(), "{}", code);
        }
    }

    #[test]
    fn test_disallowed_code_rejected_on_decode() {
        let payload = 1005u16.to_be_bytes().to_vec();
        assert!(matches!(
            CloseReason::decode(&payload),
            Err(Error::InvalidCloseCode(1005))
        ));
    }

    #[test]
    fn test_non_utf8_reason_rejected() {
        let mut payload = 1000u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xFF, 0xFE]);
        assert!(matches!(
            CloseReason::decode(&payload),
            Err(Error::InvalidCloseFrame)
        ));
    }

    #[test]
    fn test_reason_too_long_to_encode() {
        let reason = CloseReason::new(CloseCode::Normal, "x".repeat(124));
        assert!(reason.encode().is_err());
    }
}
