//! Async WebSocket endpoint library for the Tokio stack.
//!
//! This library implements the [WebSocket Protocol RFC](https://datatracker.ietf.org/doc/html/rfc6455)
//! over any ordered, reliable byte stream: it performs the opening handshake
//! on either side, speaks the binary framing protocol with strict masking
//! discipline, validates text payloads as streaming UTF-8, interleaves
//! control frames with fragmented messages, and orchestrates the closing
//! handshake.
//!
//! The same symmetric stream type serves clients and servers. Use
//! [`handshake::accept_async`] to upgrade an inbound connection,
//! [`handshake::connect_async`] or [`handshake::client_handshake`] to open
//! an outbound one, then read and write frames or whole messages on the
//! resulting [`WSConnection`]. For quick servers, [`server::start_server`]
//! turns a port into a stream of connection events.

pub mod close;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod message;
mod read;
pub mod request;
pub mod server;
mod split;
mod utf8;
mod write;


pub use close::{CloseCode, CloseReason};
pub use config::WebSocketConfig;
pub use connection::WSConnection;
pub use error::Error;
pub use frame::{FrameInfo, OpCode};
pub use message::Message;
pub use read::{PongCallback, ReadStream};
pub use split::WSWriter;
pub use utf8::Utf8Validator;
pub use write::Role;
