use crate::error::Error;
use crate::frame::OpCode;

/// A complete data message, the unit most applications want to deal in.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

impl Message {
    /// Builds a message from a finished frame sequence. Only data opcodes
    /// make sense here; control frames never reach the message layer.
    pub fn from_payload(opcode: OpCode, payload: Vec<u8>) -> Result<Self, Error> {
        match opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(payload)?)),
            OpCode::Binary => Ok(Message::Binary(payload)),
            _ => Err(Error::InvalidOpcode),
        }
    }

    pub fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
        }
    }

    pub fn as_binary(&self) -> &[u8] {
        match self {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => data,
        }
    }

    pub fn as_text(&self) -> Result<String, Error> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            Message::Binary(data) => Ok(String::from_utf8(data.clone())?),
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload() {
        let message = Message::from_payload(OpCode::Text, b"hi".to_vec()).unwrap();
        assert_eq!(message, Message::Text("hi".into()));
        assert_eq!(message.opcode(), OpCode::Text);

        let message = Message::from_payload(OpCode::Binary, vec![0, 159]).unwrap();
        assert_eq!(message.as_binary(), &[0, 159]);

        assert!(Message::from_payload(OpCode::Ping, Vec::new()).is_err());
    }

    #[test]
    fn test_text_accessors() {
        let message = Message::Binary(b"still utf8".to_vec());
        assert_eq!(message.as_text().unwrap(), "still utf8");
    }
}
