//! Bit-packed record of chunk indices a remote has already accepted.
//!
//! On the wire the bitmap is a list of decimal strings, each a 16-bit word.
//! Index `i` lives in word `i / 16` at bit `i % 16`. Inside the engine the
//! bitmap is always handled as a set of indices; this module is the only
//! place that knows about the packing.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::BITMAP_WORD_BITS;

/// Resume bitmap in its wire representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeBitmap {
    #[serde(default)]
    pub words: Vec<String>,
}

impl ResumeBitmap {
    /// Decodes the set of accepted chunk indices.
    pub fn decode(&self) -> Result<BTreeSet<u64>, ProtocolError> {
        let mut indices = BTreeSet::new();
        for (word_index, raw) in self.words.iter().enumerate() {
            let word: u16 = raw
                .trim()
                .parse()
                .map_err(|_| ProtocolError::InvalidBitmapWord {
                    index: word_index,
                    value: raw.clone(),
                })?;
            for bit in 0..BITMAP_WORD_BITS {
                if (word >> bit) & 1 == 1 {
                    indices.insert(word_index as u64 * BITMAP_WORD_BITS + bit);
                }
            }
        }
        Ok(indices)
    }

    /// Encodes a set of accepted indices.
    pub fn encode<'a>(indices: impl IntoIterator<Item = &'a u64>) -> Self {
        let mut words: Vec<u16> = Vec::new();
        for &index in indices {
            let word_index = (index / BITMAP_WORD_BITS) as usize;
            if word_index >= words.len() {
                words.resize(word_index + 1, 0);
            }
            words[word_index] |= 1 << (index % BITMAP_WORD_BITS);
        }
        Self {
            words: words.iter().map(u16::to_string).collect(),
        }
    }

    /// Returns `true` if `index` is marked, without decoding everything.
    ///
    /// Malformed or missing words read as "not uploaded".
    pub fn contains(&self, index: u64) -> bool {
        let word_index = (index / BITMAP_WORD_BITS) as usize;
        self.words
            .get(word_index)
            .and_then(|w| w.trim().parse::<u16>().ok())
            .is_some_and(|w| (w >> (index % BITMAP_WORD_BITS)) & 1 == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(words: &[&str]) -> ResumeBitmap {
        ResumeBitmap {
            words: words.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn decode_empty() {
        assert!(ResumeBitmap::default().decode().unwrap().is_empty());
    }

    #[test]
    fn decode_spans_words() {
        // Word 0: bits 0 and 15. Word 1: bit 1 -> index 17.
        let decoded = bitmap(&["32769", "2"]).decode().unwrap();
        assert_eq!(decoded.into_iter().collect::<Vec<_>>(), vec![0, 15, 17]);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = bitmap(&["1", "x"]).decode().unwrap_err();
        match err {
            ProtocolError::InvalidBitmapWord { index, value } => {
                assert_eq!(index, 1);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_word_overflow() {
        assert!(bitmap(&["65536"]).decode().is_err());
    }

    #[test]
    fn encode_matches_decode() {
        let indices: BTreeSet<u64> = [1, 3, 16, 40].into_iter().collect();
        let encoded = ResumeBitmap::encode(&indices);
        assert_eq!(encoded.words.len(), 3);
        assert_eq!(encoded.words[0], "10");
        assert_eq!(encoded.decode().unwrap(), indices);
    }

    #[test]
    fn contains_checks_single_bit() {
        let b = bitmap(&["4"]);
        assert!(b.contains(2));
        assert!(!b.contains(0));
        assert!(!b.contains(100));
    }

    #[test]
    fn contains_treats_malformed_word_as_unset() {
        assert!(!bitmap(&["oops"]).contains(0));
    }
}
