/// Marshal priority of a chunk. Higher values are marshalled first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPriority(pub u16);

impl ChunkPriority {
    pub const LOWEST: Self = Self(0);
    pub const LOW: Self = Self(0x4000);
    pub const NORMAL: Self = Self(0x8000);
    pub const HIGH: Self = Self(0xC000);
    pub const HIGHEST: Self = Self(0xFFFE);
    /// Marshalled ahead of everything else
    pub const REAL_TIME: Self = Self(0xFFFF);
}

impl Default for ChunkPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkFlags(u8);

impl ChunkFlags {
    /// Set by a local change, cleared by `end_marshal_pass()`
    pub const UPDATED_THIS_FRAME: Self = Self(1);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}
