//! # Bitmap
//!
//! Growable bitset used for entity existence, component presence,
//! dirty tracking, and query resolution.
//!
//! ## Design
//!
//! - 64 slots per `u64` word
//! - `set` out of range grows to the next power of two
//! - Set-bit iteration uses `trailing_zeros`, so it costs O(popcount)
//!   rather than O(capacity)

const WORD_BITS: usize = 64;

#[inline]
const fn words_for(capacity: usize) -> usize {
    (capacity + WORD_BITS - 1) / WORD_BITS
}

/// Growable fixed-width-word bitset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitmap {
    /// Backing words. Bit `i` lives in `words[i / 64]`.
    words: Vec<u64>,
    /// Addressable bits.
    capacity: usize,
}

impl Bitmap {
    /// Creates an empty bitmap able to hold `capacity` bits without growing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0u64; words_for(capacity)],
            capacity,
        }
    }

    /// Returns the number of addressable bits.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the bitmap so that `capacity` bits are addressable.
    ///
    /// The new capacity is the next power of two that is at least
    /// `max(capacity, current + 1)`. Existing bits are preserved. Never shrinks.
    pub fn grow(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        let target = capacity.max(self.capacity + 1).next_power_of_two();
        self.words.resize(words_for(target), 0);
        self.capacity = target;
    }

    /// Sets bit `index`, growing if it is out of range.
    #[inline]
    pub fn set(&mut self, index: usize) {
        if index >= self.capacity {
            self.grow(index + 1);
        }
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    /// Clears bit `index`. Out of range is a no-op.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1u64 << (index % WORD_BITS));
        }
    }

    /// Returns `true` if bit `index` is set. Out of range is `false`.
    #[inline]
    #[must_use]
    pub fn has(&self, index: usize) -> bool {
        if index >= self.capacity {
            return false;
        }
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Clears every bit, keeping the capacity.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Returns the number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Writes `a & b` into `out`.
    ///
    /// Words past the end of the shorter operand are treated as zero.
    pub fn and_into(a: &Self, b: &Self, out: &mut Self) {
        out.grow(a.capacity.max(b.capacity));
        out.clear_all();
        for (i, (x, y)) in a.words.iter().zip(&b.words).enumerate() {
            out.words[i] = x & y;
        }
    }

    /// Writes `a | b` into `out`.
    ///
    /// Words past the end of the shorter operand are copied from the longer one.
    pub fn or_into(a: &Self, b: &Self, out: &mut Self) {
        out.grow(a.capacity.max(b.capacity));
        out.clear_all();
        for (i, slot) in out.words.iter_mut().enumerate() {
            let x = a.words.get(i).copied().unwrap_or(0);
            let y = b.words.get(i).copied().unwrap_or(0);
            *slot = x | y;
        }
    }

    /// Writes `a & !b` into `out`.
    ///
    /// Words of `a` past the end of `b` are copied through.
    pub fn not_into(a: &Self, b: &Self, out: &mut Self) {
        out.grow(a.capacity.max(b.capacity));
        out.clear_all();
        for (i, x) in a.words.iter().enumerate() {
            let y = b.words.get(i).copied().unwrap_or(0);
            out.words[i] = x & !y;
        }
    }

    /// In-place `self &= other`.
    pub fn and_assign(&mut self, other: &Self) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// In-place `self |= other`, growing to fit `other`.
    pub fn or_assign(&mut self, other: &Self) {
        self.grow(other.capacity);
        for (i, word) in other.words.iter().enumerate() {
            self.words[i] |= word;
        }
    }

    /// In-place `self &= !other`.
    pub fn not_assign(&mut self, other: &Self) {
        for (word, mask) in self.words.iter_mut().zip(&other.words) {
            *word &= !mask;
        }
    }

    /// Iterates over set bit indices in ascending order.
    #[must_use]
    pub fn iter(&self) -> Bits<'_> {
        Bits {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    /// Calls `f` for every set bit index in ascending order.
    pub fn each<F: FnMut(usize)>(&self, mut f: F) {
        for index in self.iter() {
            f(index);
        }
    }

    /// Collects set bit indices in ascending order.
    #[must_use]
    pub fn collect(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a Bitmap {
    type Item = usize;
    type IntoIter = Bits<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over set bit indices.
pub struct Bits<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl Iterator for Bits<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * WORD_BITS + bit);
            }

            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_grows_and_preserves_lower_bits() {
        let mut bm = Bitmap::new(64);
        bm.set(3);
        bm.set(63);

        bm.set(130);

        assert!(bm.has(130));
        assert!(bm.has(3));
        assert!(bm.has(63));
        assert!(bm.capacity() >= 131);
        assert!(bm.capacity().is_power_of_two());
        assert_eq!(bm.count(), 3);
    }

    #[test]
    fn test_grow_doubles_at_minimum() {
        let mut bm = Bitmap::new(64);
        bm.grow(65);
        assert_eq!(bm.capacity(), 128);
        bm.grow(100);
        assert_eq!(bm.capacity(), 128);
    }

    #[test]
    fn test_out_of_range_reads_are_false() {
        let mut bm = Bitmap::new(8);
        assert!(!bm.has(1_000));
        bm.clear(1_000);
        assert_eq!(bm.capacity(), 8);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let mut bm = Bitmap::new(128);
        bm.set(5);
        bm.set(70);
        bm.clear(5);
        assert!(!bm.has(5));
        assert!(bm.has(70));

        bm.clear_all();
        assert!(bm.is_empty());
        assert_eq!(bm.capacity(), 128);
    }

    #[test]
    fn test_iteration_is_ascending() {
        let mut bm = Bitmap::new(256);
        for i in [200, 0, 64, 65, 127] {
            bm.set(i);
        }
        assert_eq!(bm.collect(), vec![0, 64, 65, 127, 200]);

        let mut seen = Vec::new();
        bm.each(|i| seen.push(i));
        assert_eq!(seen, bm.collect());
    }

    #[test]
    fn test_and_treats_missing_words_as_zero() {
        let mut a = Bitmap::new(64);
        let mut b = Bitmap::new(256);
        a.set(1);
        a.set(2);
        b.set(2);
        b.set(200);

        let mut out = Bitmap::new(0);
        Bitmap::and_into(&a, &b, &mut out);
        assert_eq!(out.collect(), vec![2]);
        assert!(out.capacity() >= 256);
    }

    #[test]
    fn test_or_copies_through_longer_tail() {
        let mut a = Bitmap::new(64);
        let mut b = Bitmap::new(256);
        a.set(1);
        b.set(200);

        let mut out = Bitmap::new(0);
        Bitmap::or_into(&a, &b, &mut out);
        assert_eq!(out.collect(), vec![1, 200]);

        Bitmap::or_into(&b, &a, &mut out);
        assert_eq!(out.collect(), vec![1, 200]);
    }

    #[test]
    fn test_not_keeps_tail_of_first() {
        let mut a = Bitmap::new(256);
        let mut b = Bitmap::new(64);
        a.set(1);
        a.set(2);
        a.set(199);
        b.set(2);

        let mut out = Bitmap::new(0);
        Bitmap::not_into(&a, &b, &mut out);
        assert_eq!(out.collect(), vec![1, 199]);
    }

    #[test]
    fn test_into_overwrites_previous_destination() {
        let mut a = Bitmap::new(64);
        let b = Bitmap::new(64);
        a.set(9);
        let mut out = Bitmap::new(64);
        out.set(40);

        Bitmap::and_into(&a, &b, &mut out);
        assert!(out.is_empty());
    }
}
