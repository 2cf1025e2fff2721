//! Fixed-capacity ring buffer of normalized feature vectors

use crate::{Feature, FEATURE_DIM, SEQ_LEN};

/// Sliding window over the most recent `N` feature vectors
///
/// Slots that were never written stay zero until the window wraps for the
/// first time, after which `is_full` stays true.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow<const N: usize = SEQ_LEN> {
    buf: [Feature; N],
    cursor: usize,
    full: bool,
}

impl<const N: usize> SlidingWindow<N> {
    pub fn new() -> Self {
        Self {
            buf: [[0.0; FEATURE_DIM]; N],
            cursor: 0,
            full: false,
        }
    }

    pub fn push(&mut self, sample: Feature) {
        self.buf[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % N;
        if self.cursor == 0 {
            self.full = true;
        }
    }

    /// Window contents ordered oldest to newest
    pub fn export(&self) -> [Feature; N] {
        let mut seq = [[0.0; FEATURE_DIM]; N];
        for (t, slot) in seq.iter_mut().enumerate() {
            *slot = self.buf[(self.cursor + t) % N];
        }
        seq
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for SlidingWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}
