#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Cap on the cumulative size of a data message across all its
    /// fragments. `None` means unlimited. A peer that crosses the cap gets
    /// a 1009 close.
    pub max_message_size: Option<usize>,
    /// Outbound fragmentation threshold for whole-message writes. `None`
    /// sends every message as a single frame.
    pub fragment_size: Option<usize>,
    /// Size of the scratch buffer used to mask outbound payloads on the
    /// client side. User buffers are never mutated, so masking happens in
    /// chunks of at most this many bytes.
    pub mask_buf_size: usize,
    /// Whether a 4xx handshake refusal honors HTTP keep-alive from the
    /// request instead of tearing the transport down.
    pub keep_alive: bool,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_message_size: Some(64 << 20),
            fragment_size: None,
            mask_buf_size: 4096,
            keep_alive: false,
        }
    }
}
