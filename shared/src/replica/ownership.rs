use log::{info, warn};

use crate::{chunk::ChunkError, PeerId};

use super::ReplicaContext;

/// The ownership-related part of a chunk, object safe so a Replica can hold
/// chunks of different classes
pub trait ChunkOwnership {
    fn class_name(&self) -> &'static str;

    fn is_replica_migratable(&self) -> bool;

    fn accept_change_ownership(&self, requestor: PeerId, ctx: &ReplicaContext) -> bool;

    fn on_replica_change_ownership(&mut self, ctx: &ReplicaContext) -> Result<(), ChunkError>;
}

/// Moves ownership of a Replica to `requestor`. Every chunk is asked first;
/// a single refusal vetoes the whole migration and nothing is changed.
pub fn change_replica_ownership(
    chunks: &mut [&mut dyn ChunkOwnership],
    requestor: PeerId,
    ctx: &ReplicaContext,
) -> Result<(), ChunkError> {
    for chunk in chunks.iter() {
        if !chunk.accept_change_ownership(requestor, ctx) {
            warn!(
                "chunk `{}` vetoed migration of {} to {}",
                chunk.class_name(),
                ctx.replica_id,
                requestor
            );
            return Err(ChunkError::MigrationVetoed {
                class_name: chunk.class_name(),
                replica_id: ctx.replica_id,
                requestor,
            });
        }
    }

    let ctx = ReplicaContext::new(ctx.replica_id, ctx.local_peer, requestor);
    apply_ownership_change(chunks, &ctx)?;
    info!("{} migrated to {}", ctx.replica_id, requestor);
    Ok(())
}

/// Applies an already agreed ownership change to every chunk
pub fn apply_ownership_change(
    chunks: &mut [&mut dyn ChunkOwnership],
    ctx: &ReplicaContext,
) -> Result<(), ChunkError> {
    for chunk in chunks.iter_mut() {
        chunk.on_replica_change_ownership(ctx)?;
    }
    Ok(())
}
