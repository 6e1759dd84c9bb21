#![no_main]

use base64::prelude::{Engine, BASE64_STANDARD};
use frame_flow::frame::decode_header;
use frame_flow::handshake::accept_async;
use libfuzzer_sys::fuzz_target;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Runtime;

fuzz_target!(|data: &[u8]| {
    // The header codec must never panic, whatever the bytes
    let _ = decode_header(data);

    let runtime = Runtime::new().unwrap();
    let data_vec = Vec::from(data);
    runtime.block_on(async move {
        let (mut raw_client, server_io) = tokio::io::duplex(64 * 1024);

        // Feed a mutated handshake request to the server side
        tokio::spawn(async move {
            let handshake = build_fuzzed_handshake(&data_vec);
            let _ = raw_client.write_all(&handshake).await;
            let _ = raw_client.shutdown().await;
        });

        let _ = accept_async(server_io).await;
    });
});

// Helper function to build a fuzzed WebSocket handshake request
fn build_fuzzed_handshake(data: &[u8]) -> Vec<u8> {
    // Start with a basic WebSocket handshake template
    let mut handshake = b"GET / HTTP/1.1\r\n\
                          Host: 127.0.0.1\r\n\
                          Upgrade: websocket\r\n\
                          Connection: Upgrade\r\n"
        .to_vec();

    // Append a fuzzed Sec-WebSocket-Key
    let key = BASE64_STANDARD.encode(data);
    handshake.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", key).as_bytes());

    handshake.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");

    // Occasionally poison a mandatory header
    if data.len() % 2 == 0 {
        handshake.extend_from_slice(b"Connection: Fuzzed-Value\r\n");
    }

    // End the headers with the necessary blank line
    handshake.extend_from_slice(b"\r\n");

    // And whatever is left of the input as raw frame bytes
    handshake.extend_from_slice(data);

    handshake
}
