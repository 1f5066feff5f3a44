use log::debug;

use crate::{replica::ReplicaHandle, ChunkRole};

use super::class::ChunkClassId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Detached,
    AttachedPrimary,
    AttachedProxy,
    Detaching,
}

impl LifecycleState {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Detached => "detached",
            LifecycleState::AttachedPrimary => "attached as primary",
            LifecycleState::AttachedProxy => "attached as proxy",
            LifecycleState::Detaching => "detaching",
        }
    }

    pub fn role(self) -> ChunkRole {
        match self {
            LifecycleState::AttachedPrimary => ChunkRole::Primary,
            LifecycleState::AttachedProxy => ChunkRole::Proxy,
            LifecycleState::Detached | LifecycleState::Detaching => ChunkRole::Inactive,
        }
    }
}

/// Rejected lifecycle transition, with the state it was attempted from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionError {
    InvalidState(LifecycleState),
    ClassMismatch { bound: ChunkClassId },
    NotInitialized,
}

/// Attach/detach/ownership state machine of a chunk
#[derive(Clone, Debug)]
pub struct ChunkLifecycle {
    state: LifecycleState,
    class_id: Option<ChunkClassId>,
    replica: Option<ReplicaHandle>,
}

impl ChunkLifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Detached,
            class_id: None,
            replica: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn role(&self) -> ChunkRole {
        self.state.role()
    }

    pub fn class_id(&self) -> Option<ChunkClassId> {
        self.class_id
    }

    pub fn replica(&self) -> Option<ReplicaHandle> {
        self.replica
    }

    /// Binds the class. Only from Detached; repeating it with the same class is
    /// a no-op.
    pub fn init(&mut self, class_id: ChunkClassId) -> Result<(), TransitionError> {
        if self.state != LifecycleState::Detached {
            return Err(TransitionError::InvalidState(self.state));
        }
        match self.class_id {
            Some(bound) if bound != class_id => Err(TransitionError::ClassMismatch { bound }),
            _ => {
                self.class_id = Some(class_id);
                Ok(())
            }
        }
    }

    pub fn attach(&mut self, replica: ReplicaHandle, primary: bool) -> Result<ChunkRole, TransitionError> {
        if self.class_id.is_none() {
            return Err(TransitionError::NotInitialized);
        }
        if self.state != LifecycleState::Detached {
            return Err(TransitionError::InvalidState(self.state));
        }
        self.state = if primary {
            LifecycleState::AttachedPrimary
        } else {
            LifecycleState::AttachedProxy
        };
        self.replica = Some(replica);
        debug!("chunk attached to {} as {:?}", replica.replica_id, self.role());
        Ok(self.role())
    }

    /// Flips between primary and proxy after an ownership change
    pub fn change_role(&mut self, primary: bool) -> Result<ChunkRole, TransitionError> {
        match self.state {
            LifecycleState::AttachedPrimary | LifecycleState::AttachedProxy => {
                self.state = if primary {
                    LifecycleState::AttachedPrimary
                } else {
                    LifecycleState::AttachedProxy
                };
                Ok(self.role())
            }
            state => Err(TransitionError::InvalidState(state)),
        }
    }

    pub fn begin_detach(&mut self) -> Result<(), TransitionError> {
        match self.state {
            LifecycleState::AttachedPrimary | LifecycleState::AttachedProxy => {
                self.state = LifecycleState::Detaching;
                Ok(())
            }
            state => Err(TransitionError::InvalidState(state)),
        }
    }

    /// Ends in Detached from any state
    pub fn finish_detach(&mut self) {
        self.state = LifecycleState::Detached;
        self.replica = None;
    }
}

impl Default for ChunkLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
