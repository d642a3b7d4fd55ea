//! First-fit allocation bitmap.
//!
//! Bit `i` lives in word `i / 64` at position `i % 64`; a set bit means the
//! item is in use. The same packing is used on disk, words little-endian.

use crate::error::{FsError, Result};

const WORD_BITS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    words: Vec<u64>,
    len: usize,
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        let mut bitmap = Self {
            words: vec![0; (len + WORD_BITS - 1) / WORD_BITS],
            len,
        };
        bitmap.seal_tail();
        bitmap
    }

    /// Number of items tracked.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_set(&self, id: usize) -> bool {
        id < self.len && self.words[id / WORD_BITS] & (1u64 << (id % WORD_BITS)) != 0
    }

    pub fn set(&mut self, id: usize) {
        assert!(id < self.len, "bit {} out of range {}", id, self.len);
        self.words[id / WORD_BITS] |= 1u64 << (id % WORD_BITS);
    }

    /// Take the lowest clear bit and mark it used.
    pub fn alloc(&mut self) -> Option<usize> {
        for (word_pos, word) in self.words.iter_mut().enumerate() {
            if *word != u64::MAX {
                let inner_pos = word.trailing_ones() as usize;
                *word |= 1u64 << inner_pos;
                return Some(word_pos * WORD_BITS + inner_pos);
            }
        }
        None
    }

    /// Lowest clear bit, without marking it.
    pub fn first_free(&self) -> Option<usize> {
        self.words
            .iter()
            .enumerate()
            .find(|(_, word)| **word != u64::MAX)
            .map(|(word_pos, word)| word_pos * WORD_BITS + word.trailing_ones() as usize)
    }

    /// Clear bit `id`. Clearing a clear bit does nothing.
    pub fn dealloc(&mut self, id: usize) {
        if id < self.len {
            self.words[id / WORD_BITS] &= !(1u64 << (id % WORD_BITS));
        }
    }

    pub fn count_free(&self) -> usize {
        self.words.iter().map(|word| word.count_zeros() as usize).sum()
    }

    pub fn encoded_len(&self) -> usize {
        self.words.len() * core::mem::size_of::<u64>()
    }

    pub fn encode(&self, buf: &mut [u8]) {
        for (word, chunk) in self.words.iter().zip(buf.chunks_exact_mut(8)) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    pub fn decode(len: usize, buf: &[u8]) -> Result<Self> {
        let mut bitmap = Self::new(len);
        if buf.len() < bitmap.encoded_len() {
            return Err(FsError::CorruptImage(format!(
                "bitmap of {} items needs {} bytes, got {}",
                len,
                bitmap.encoded_len(),
                buf.len()
            )));
        }
        for (word, chunk) in bitmap.words.iter_mut().zip(buf.chunks_exact(8)) {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        bitmap.seal_tail();
        Ok(bitmap)
    }

    /// Bits past `len` in the last word are kept set so alloc never hands them out.
    fn seal_tail(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last |= u64::MAX << tail;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_first_fit() {
        let mut bitmap = Bitmap::new(130);
        for expect in 0..70 {
            assert_eq!(bitmap.alloc(), Some(expect));
        }
        bitmap.dealloc(3);
        bitmap.dealloc(65);
        assert_eq!(bitmap.first_free(), Some(3));
        assert_eq!(bitmap.alloc(), Some(3));
        assert_eq!(bitmap.alloc(), Some(65));
        assert_eq!(bitmap.alloc(), Some(70));
    }

    #[test]
    fn never_allocates_past_len() {
        let mut bitmap = Bitmap::new(5);
        for _ in 0..5 {
            assert!(bitmap.alloc().is_some());
        }
        assert_eq!(bitmap.alloc(), None);
        assert_eq!(bitmap.first_free(), None);
        assert_eq!(bitmap.count_free(), 0);
    }

    #[test]
    fn dealloc_is_idempotent() {
        let mut bitmap = Bitmap::new(10);
        bitmap.set(4);
        bitmap.dealloc(4);
        bitmap.dealloc(4);
        bitmap.dealloc(42);
        assert_eq!(bitmap.count_free(), 10);
        assert!(!bitmap.is_set(4));
    }

    #[test]
    fn encode_decode_keeps_bits() {
        let mut bitmap = Bitmap::new(200);
        for id in [0, 1, 63, 64, 127, 199] {
            bitmap.set(id);
        }
        let mut buf = vec![0u8; bitmap.encoded_len()];
        bitmap.encode(&mut buf);
        let decoded = Bitmap::decode(200, &buf).unwrap();
        assert_eq!(decoded, bitmap);
        assert_eq!(decoded.count_free(), 194);
    }

    #[test]
    fn decode_rejects_short_buffer() {
        assert!(matches!(
            Bitmap::decode(200, &[0u8; 8]),
            Err(FsError::CorruptImage(_))
        ));
    }
}
