/// Chunk classes used across the end-to-end tests

use replica_chunk::{
    DataSet, DataSetBase, PeerId, ReplicaChunkClass, ReplicaContext, Rpc, RpcBase, UnsignedFloat,
};

/// Two reliable fields
pub struct ScoreChunk {
    pub score: DataSet<i32>,
    pub label: DataSet<String>,
}

impl ScoreChunk {
    pub fn new() -> Self {
        Self {
            score: DataSet::new("score", 0),
            label: DataSet::new("label", String::new()),
        }
    }
}

impl Default for ScoreChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaChunkClass for ScoreChunk {
    type Mask = u8;
    const CHUNK_NAME: &'static str = "ScoreChunk";

    fn data_set(&self, index: u8) -> Option<&dyn DataSetBase> {
        match index {
            0 => Some(&self.score),
            1 => Some(&self.label),
            _ => None,
        }
    }

    fn data_set_mut(&mut self, index: u8) -> Option<&mut dyn DataSetBase> {
        match index {
            0 => Some(&mut self.score),
            1 => Some(&mut self.label),
            _ => None,
        }
    }

    fn is_replica_migratable(&self) -> bool {
        true
    }
}

pub type Tint = UnsignedFloat<10, 2>;

/// Reliable and unreliable fields plus RPCs in both directions
pub struct CombatChunk {
    pub health: DataSet<i32>,
    pub tint: DataSet<Tint>,
    pub heal: Rpc<i32>,
    pub request_heal: Rpc<i32>,
    pub ping: Rpc<u8>,
}

impl CombatChunk {
    pub const HEALTH: u8 = 0;
    pub const TINT: u8 = 1;

    pub const HEAL: u8 = 0;
    pub const REQUEST_HEAL: u8 = 1;
    pub const PING: u8 = 2;

    pub fn new() -> Self {
        Self {
            health: DataSet::new("health", 100),
            tint: DataSet::new("tint", Tint::new(0.0f32)).unreliable(),
            heal: Rpc::downstream("heal"),
            request_heal: Rpc::upstream("request_heal"),
            ping: Rpc::downstream("ping").unreliable(),
        }
    }
}

impl Default for CombatChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaChunkClass for CombatChunk {
    type Mask = u16;
    const CHUNK_NAME: &'static str = "CombatChunk";

    fn data_set(&self, index: u8) -> Option<&dyn DataSetBase> {
        match index {
            Self::HEALTH => Some(&self.health),
            Self::TINT => Some(&self.tint),
            _ => None,
        }
    }

    fn data_set_mut(&mut self, index: u8) -> Option<&mut dyn DataSetBase> {
        match index {
            Self::HEALTH => Some(&mut self.health),
            Self::TINT => Some(&mut self.tint),
            _ => None,
        }
    }

    fn rpc(&self, index: u8) -> Option<&dyn RpcBase> {
        match index {
            Self::HEAL => Some(&self.heal),
            Self::REQUEST_HEAL => Some(&self.request_heal),
            Self::PING => Some(&self.ping),
            _ => None,
        }
    }

    fn rpc_mut(&mut self, index: u8) -> Option<&mut dyn RpcBase> {
        match index {
            Self::HEAL => Some(&mut self.heal),
            Self::REQUEST_HEAL => Some(&mut self.request_heal),
            Self::PING => Some(&mut self.ping),
            _ => None,
        }
    }

    fn is_replica_migratable(&self) -> bool {
        true
    }
}

/// Can refuse to migrate, and has a tiny RPC queue
pub struct LockedChunk {
    pub note: DataSet<u32>,
    pub announce: Rpc<String>,
    pub locked: bool,
    pub migratable: bool,
    pub ownership_changes: u32,
}

impl LockedChunk {
    pub fn new() -> Self {
        Self {
            note: DataSet::new("note", 0),
            announce: Rpc::downstream("announce"),
            locked: false,
            migratable: true,
            ownership_changes: 0,
        }
    }
}

impl Default for LockedChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaChunkClass for LockedChunk {
    type Mask = u8;
    const CHUNK_NAME: &'static str = "LockedChunk";
    const RPC_QUEUE_CAPACITY: usize = 4;

    fn data_set(&self, index: u8) -> Option<&dyn DataSetBase> {
        (index == 0).then_some(&self.note as &dyn DataSetBase)
    }

    fn data_set_mut(&mut self, index: u8) -> Option<&mut dyn DataSetBase> {
        if index == 0 {
            Some(&mut self.note)
        } else {
            None
        }
    }

    fn rpc(&self, index: u8) -> Option<&dyn RpcBase> {
        (index == 0).then_some(&self.announce as &dyn RpcBase)
    }

    fn rpc_mut(&mut self, index: u8) -> Option<&mut dyn RpcBase> {
        if index == 0 {
            Some(&mut self.announce)
        } else {
            None
        }
    }

    fn is_replica_migratable(&self) -> bool {
        self.migratable
    }

    fn accept_change_ownership(&self, _requestor: PeerId, _ctx: &ReplicaContext) -> bool {
        !self.locked
    }

    fn on_replica_change_ownership(&mut self, _ctx: &ReplicaContext) {
        self.ownership_changes += 1;
    }
}
