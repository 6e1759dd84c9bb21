/// A masking key prepared for streaming use: the 4 raw key bytes plus the
/// position reached so far, so a payload can be masked or unmasked across
/// arbitrary chunk boundaries.
///
/// Masking is a rotating XOR, which makes it its own inverse: applying a key
/// twice from the same starting offset yields the original bytes.
#[derive(Debug, Clone, Copy)]
pub struct MaskKey {
    key: [u8; 4],
    offset: usize,
}

impl MaskKey {
    pub fn new(key: [u8; 4]) -> Self {
        Self { key, offset: 0 }
    }

    /// XORs `buf` in place with the key, continuing from the offset reached
    /// by previous chunks.
    pub fn apply(&mut self, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte ^= self.key[(self.offset + i) % 4];
        }
        self.offset = (self.offset + buf.len()) % 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_roundtrip() {
        let payload: Vec<u8> = (0..=255).collect();
        let mut masked = payload.clone();

        let mut key = MaskKey::new([0xA3, 0x17, 0x5C, 0xE9]);
        key.apply(&mut masked);
        assert_ne!(masked, payload);

        let mut key = MaskKey::new([0xA3, 0x17, 0x5C, 0xE9]);
        key.apply(&mut masked);
        assert_eq!(masked, payload);
    }

    #[test]
    fn test_chunked_equals_whole() {
        let payload: Vec<u8> = (0..100).map(|i| i as u8 ^ 0x55).collect();

        let mut whole = payload.clone();
        MaskKey::new([1, 2, 3, 4]).apply(&mut whole);

        // Chunk sizes deliberately not multiples of 4 so the offset carries
        for chunk_size in [1, 3, 5, 7, 33] {
            let mut chunked = payload.clone();
            let mut key = MaskKey::new([1, 2, 3, 4]);
            for chunk in chunked.chunks_mut(chunk_size) {
                key.apply(chunk);
            }
            assert_eq!(chunked, whole, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_zero_key_is_noop() {
        let payload = b"masked with nothing".to_vec();
        let mut buf = payload.clone();
        MaskKey::new([0, 0, 0, 0]).apply(&mut buf);
        assert_eq!(buf, payload);
    }
}
