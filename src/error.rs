use httparse::Error as HttpParseError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;
use url::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    // General Errors
    #[error("IO Error happened: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Handshake Errors
    #[error("HTTP version 1.1 required")]
    WrongHttpVersion,

    #[error("Wrong method, the handshake must be a GET request")]
    WrongHttpMethod,

    #[error("Expected Upgrade request")]
    ExpectedUpgradeRequest,

    #[error("Host header missing in the request")]
    NoHostHeaderPresent,

    #[error("Couldn't find Sec-WebSocket-Key header in the request")]
    NoSecWebsocketKey,

    #[error("Couldn't find Sec-WebSocket-Version header in the request")]
    NoSecWebsocketVersion,

    #[error("Unsupported Sec-WebSocket-Version: `{0}`, only version 13 is spoken here")]
    UnsupportedWebsocketVersion(String),

    #[error("Server refused the upgrade with status {0}")]
    HandshakeFailed(u16),

    #[error("Server sent an invalid 101 response: {0}")]
    ResponseFailed(&'static str),

    // Framing Errors
    #[error("RSV not zero")]
    RSVNotZero,

    #[error("Invalid Opcode")]
    InvalidOpcode,

    #[error("Control frames must not be fragmented")]
    ControlFramesFragmented,

    #[error("Control frame payload can't be greater than 125 bytes")]
    ControlFramePayloadSize,

    #[error("Payload length has the most significant bit set")]
    InvalidPayloadLength,

    #[error("Invalid close frame payload")]
    InvalidCloseFrame,

    #[error("Close code `{0}` is not allowed on the wire")]
    InvalidCloseCode(u16),

    #[error("Invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("Max message size reached")]
    MaxMessageSize,

    // Lifecycle Errors
    #[error("websocket closed by the peer")]
    Closed,

    #[error("websocket connection failed after a protocol violation")]
    Failed,

    // HTTP Errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("Invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },

    #[error("Incomplete HTTP request")]
    IncompleteHTTPRequest,
}
