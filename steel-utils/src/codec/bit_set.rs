/// A fixed-size bit set backed by `u64` words, laid out like Java's `BitSet::toLongArray`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSet(pub Box<[u64]>);

impl BitSet {
    /// Creates a bit set able to hold `bits` bits, all cleared.
    #[must_use]
    pub fn new(bits: usize) -> Self {
        Self(vec![0; bits.div_ceil(64)].into_boxed_slice())
    }

    /// Sets the bit at the given index. Indices past the end are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        let u64_index = index / 64;
        let bit_index = index % 64;

        let Some(word) = self.0.get_mut(u64_index) else {
            return;
        };

        if value {
            *word |= 1 << bit_index;
        } else {
            *word &= !(1 << bit_index);
        }
    }

    /// Returns the bit at the given index, `false` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.0
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    /// True when no bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.0.iter().map(|word| word.count_ones()).sum()
    }

    /// The words with trailing zero words trimmed, which is how the client expects them.
    #[must_use]
    pub fn to_trimmed_longs(&self) -> &[u64] {
        let mut trimmed_len = self.0.len();
        while trimmed_len > 0 && self.0[trimmed_len - 1] == 0 {
            trimmed_len -= 1;
        }
        &self.0[..trimmed_len]
    }
}
