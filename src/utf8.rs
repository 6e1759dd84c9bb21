/// Incremental UTF-8 validator for text messages that arrive in fragments.
///
/// Payload chunks are fed in as they are read off the wire, so a multi-byte
/// codepoint may be split across frames or across reads within one frame.
/// The validator keeps just enough state to resume: how many continuation
/// bytes are still owed and the legal range for the next one, which is what
/// catches overlong encodings, surrogates and out-of-range codepoints at the
/// earliest possible byte.
#[derive(Debug, Clone)]
pub struct Utf8Validator {
    // continuation bytes still expected for the current codepoint
    need: u8,
    // inclusive bounds for the next continuation byte
    lower: u8,
    upper: u8,
}

impl Default for Utf8Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8Validator {
    pub fn new() -> Self {
        Self {
            need: 0,
            lower: 0x80,
            upper: 0xBF,
        }
    }

    /// Discards any partially consumed codepoint. Called at the start of
    /// every new text message.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Consumes a chunk, returning false as soon as the sequence can no
    /// longer be a prefix of valid UTF-8.
    pub fn write(&mut self, data: &[u8]) -> bool {
        for &byte in data {
            if self.need > 0 {
                if byte < self.lower || byte > self.upper {
                    return false;
                }
                self.need -= 1;
                // Only the first continuation byte has narrowed bounds
                self.lower = 0x80;
                self.upper = 0xBF;
                continue;
            }

            match byte {
                0x00..=0x7F => {}
                0xC2..=0xDF => {
                    self.need = 1;
                }
                0xE0 => {
                    // excludes overlong 3-byte encodings
                    self.need = 2;
                    self.lower = 0xA0;
                }
                0xE1..=0xEC | 0xEE..=0xEF => {
                    self.need = 2;
                }
                0xED => {
                    // excludes the surrogate range U+D800..U+DFFF
                    self.need = 2;
                    self.upper = 0x9F;
                }
                0xF0 => {
                    // excludes overlong 4-byte encodings
                    self.need = 3;
                    self.lower = 0x90;
                }
                0xF1..=0xF3 => {
                    self.need = 3;
                }
                0xF4 => {
                    // excludes codepoints above U+10FFFF
                    self.need = 3;
                    self.upper = 0x8F;
                }
                _ => return false,
            }
        }
        true
    }

    /// Returns false iff a codepoint is still partially buffered, which means
    /// the message ended mid-character.
    pub fn finish(&self) -> bool {
        self.need == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_chunked(data: &[u8], chunk_size: usize) -> bool {
        let mut v = Utf8Validator::new();
        for chunk in data.chunks(chunk_size.max(1)) {
            if !v.write(chunk) {
                return false;
            }
        }
        v.finish()
    }

    #[test]
    fn test_agrees_with_batch_validation() {
        let samples: &[&[u8]] = &[
            b"plain ascii",
            "κόσμε".as_bytes(),
            "日本語テキスト".as_bytes(),
            "🦀🦀🦀".as_bytes(),
            &[0xC0, 0xAF],             // overlong '/'
            &[0xE0, 0x80, 0x80],       // overlong NUL
            &[0xED, 0xA0, 0x80],       // surrogate U+D800
            &[0xF4, 0x90, 0x80, 0x80], // above U+10FFFF
            &[0xF5],                   // never a legal first byte
            &[0x80],                   // bare continuation byte
            &[0xC3],                   // truncated 2-byte sequence
            "héllo".as_bytes(),
        ];

        for sample in samples {
            let expected = std::str::from_utf8(sample).is_ok();
            for chunk_size in 1..=sample.len().max(1) {
                assert_eq!(
                    validate_chunked(sample, chunk_size),
                    expected,
                    "sample {:?} chunked by {}",
                    sample,
                    chunk_size
                );
            }
        }
    }

    #[test]
    fn test_codepoint_split_across_chunks() {
        let mut v = Utf8Validator::new();
        let emoji = "🦀".as_bytes();
        assert!(v.write(&emoji[..2]));
        assert!(!v.finish(), "half a codepoint must not finish cleanly");
        assert!(v.write(&emoji[2..]));
        assert!(v.finish());
    }

    #[test]
    fn test_reset_clears_partial_state() {
        let mut v = Utf8Validator::new();
        assert!(v.write(&[0xE2]));
        v.reset();
        assert!(v.write(b"fresh message"));
        assert!(v.finish());
    }

    #[test]
    fn test_invalid_rejected_at_first_bad_byte() {
        let mut v = Utf8Validator::new();
        assert!(v.write(b"ok so far"));
        assert!(!v.write(&[0xED, 0xA0]));
    }
}
