use std::fmt::Debug;

use super::peer_table::PeerBaseline;

/// Fixed-width bitset type backing a chunk class's change masks. Its width is
/// the maximum number of DataSets the class may declare.
pub trait ChangeMask: Copy + Eq + Default + Debug + Send + Sync + 'static {
    const CAPACITY: u8;

    fn to_bits(self) -> u128;

    /// Truncates bits beyond `CAPACITY`
    fn from_bits(bits: u128) -> Self;

    fn empty() -> Self {
        Self::from_bits(0)
    }

    fn single(index: u8) -> Self {
        Self::from_bits(1u128 << index)
    }

    /// Mask with the lowest `count` bits set
    fn first(count: u8) -> Self {
        if count >= 128 {
            Self::from_bits(u128::MAX)
        } else {
            Self::from_bits((1u128 << count) - 1)
        }
    }

    fn is_clear(self) -> bool {
        self.to_bits() == 0
    }

    fn contains(self, index: u8) -> bool {
        index < Self::CAPACITY && self.to_bits() & (1u128 << index) != 0
    }

    fn with(self, index: u8) -> Self {
        Self::from_bits(self.to_bits() | (1u128 << index))
    }

    fn without(self, index: u8) -> Self {
        Self::from_bits(self.to_bits() & !(1u128 << index))
    }

    fn union(self, other: Self) -> Self {
        Self::from_bits(self.to_bits() | other.to_bits())
    }

    fn intersect(self, other: Self) -> Self {
        Self::from_bits(self.to_bits() & other.to_bits())
    }

    fn difference(self, other: Self) -> Self {
        Self::from_bits(self.to_bits() & !other.to_bits())
    }

    fn count(self) -> u32 {
        self.to_bits().count_ones()
    }

    /// Set indices, lowest first
    fn indices(self) -> MaskIndices {
        MaskIndices {
            bits: self.to_bits(),
        }
    }
}

macro_rules! impl_change_mask {
    ($($mask:ty),*) => {$(
        impl ChangeMask for $mask {
            const CAPACITY: u8 = <$mask>::BITS as u8;

            fn to_bits(self) -> u128 {
                self as u128
            }

            fn from_bits(bits: u128) -> Self {
                bits as $mask
            }
        }
    )*};
}

impl_change_mask!(u8, u16, u32, u64);

impl ChangeMask for u128 {
    const CAPACITY: u8 = 128;

    fn to_bits(self) -> u128 {
        self
    }

    fn from_bits(bits: u128) -> Self {
        bits
    }
}

pub struct MaskIndices {
    bits: u128,
}

impl Iterator for MaskIndices {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.bits == 0 {
            return None;
        }
        let index = self.bits.trailing_zeros() as u8;
        self.bits &= self.bits - 1;
        Some(index)
    }
}

/// The three per-chunk change masks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeBits<M: ChangeMask> {
    reliable_dirty: M,
    unreliable_dirty: M,
    ever_non_default: M,
}

impl<M: ChangeMask> ChangeBits<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reliable_dirty(&self) -> M {
        self.reliable_dirty
    }

    pub fn unreliable_dirty(&self) -> M {
        self.unreliable_dirty
    }

    pub fn ever_non_default(&self) -> M {
        self.ever_non_default
    }

    /// Records a local change of the field at `index`. A change always moves
    /// the value away from something, so the field has been non-default.
    pub(crate) fn mark_changed(&mut self, index: u8) {
        self.reliable_dirty = self.reliable_dirty.with(index);
        self.unreliable_dirty = self.unreliable_dirty.with(index);
        self.ever_non_default = self.ever_non_default.with(index);
    }

    pub(crate) fn mark_non_default(&mut self, index: u8) {
        self.ever_non_default = self.ever_non_default.with(index);
    }

    /// Fields a peer must be sent. Without a baseline the peer has never
    /// received this chunk, so every field that ever left its default is due.
    pub fn calculate_dirty_mask(&self, baseline: Option<&PeerBaseline<M>>) -> M {
        match baseline {
            None => self.ever_non_default.union(self.reliable_dirty),
            Some(baseline) => baseline.due(),
        }
    }

    /// Keeps reliable bits only for changes still pending or in flight somewhere
    pub(crate) fn retain_reliable(&mut self, outstanding: M) {
        self.reliable_dirty = self.reliable_dirty.intersect(outstanding);
    }

    /// Keeps unreliable bits only for changes some peer has not been sent
    pub(crate) fn retain_unreliable(&mut self, pending: M) {
        self.unreliable_dirty = self.unreliable_dirty.intersect(pending);
    }

    /// Drops dirty state but keeps the catch-up mask
    pub(crate) fn clear_dirty(&mut self) {
        self.reliable_dirty = M::empty();
        self.unreliable_dirty = M::empty();
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        self.reliable_dirty.is_clear()
            && self.unreliable_dirty.is_clear()
            && self.ever_non_default.is_clear()
    }
}
