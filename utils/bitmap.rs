//! Register-word bit helpers
//!
//! Guest register writes carry 32-bit masks where every set bit is a
//! separate request (enable, disable, send, clear). These helpers walk
//! such masks the way the rest of the emulator consumes them.

/// Iterator over the set bits of a 32-bit register word, lowest first
#[derive(Debug, Clone, Copy)]
pub struct SetBits {
    /// Bits not yet yielded
    remaining: u32,
}

impl SetBits {
    /// Create an iterator over the set bits of `word`
    pub const fn new(word: u32) -> Self {
        Self { remaining: word }
    }
}

impl Iterator for SetBits {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let bit = self.remaining.trailing_zeros();
        // Clear the lowest set bit
        self.remaining &= self.remaining - 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.count_ones() as usize;
        (count, Some(count))
    }
}

impl ExactSizeIterator for SetBits {}

/// Iterate over the set bits of `word`
pub fn for_each_set_bit(word: u32) -> SetBits {
    SetBits::new(word)
}

/// Index of the lowest set bit, or `None` for an empty word
pub fn lowest_set_bit(word: u32) -> Option<u32> {
    if word == 0 {
        None
    } else {
        Some(word.trailing_zeros())
    }
}

/// Single-bit mask for `bit`
#[inline]
pub const fn bit(bit: u32) -> u32 {
    1 << bit
}
