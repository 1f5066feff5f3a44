/// Integration tests for chunk lifecycle and ownership migration
/// Covers suspended updates, activation callbacks, vetoed and accepted migrations

use replica_chunk::{
    apply_ownership_change, change_replica_ownership, ChunkError, ChunkOwnership, ChunkRole,
    EndianType, LifecycleState, MarshalContext, MarshalFlags, PeerId, UnmarshalContext,
};
use replica_chunk_test::{
    assert_proxy_value, exchange_packets, LockedChunk, RecordingHandler, ScoreChunk, TestNode,
    TestReplica, TestSession,
};

const SERVER: PeerId = PeerId(1);
const ALICE: PeerId = PeerId(2);
const CAROL: PeerId = PeerId(3);

#[test]
fn activation_and_deactivation_reach_the_handler() {
    let mut session = TestSession::new(SERVER, ScoreChunk::new());
    assert_eq!(session.primary.handler().activations, 1);

    let ctx = session.primary.replica.context();
    session.primary.chunk.on_replica_deactivate(&ctx).unwrap();

    assert_eq!(session.primary.handler().deactivations, 1);
    assert_eq!(session.primary.chunk.lifecycle_state(), LifecycleState::Detaching);

    session.primary.chunk.detached_from_replica();
    assert_eq!(session.primary.chunk.lifecycle_state(), LifecycleState::Detached);

    session.primary.chunk.score.set(3);
    assert!(session.primary.handler().changes.is_empty());
}

#[test]
fn suspended_proxy_applies_updates_on_resume() {
    let mut session = TestSession::new(SERVER, ScoreChunk::new());
    session.add_proxy(ALICE, ScoreChunk::new());
    session.proxy_mut(ALICE).chunk.suspend_updates_from_replica();

    session.primary.chunk.score.set(5);
    session.primary.chunk.score.set(6);
    exchange_packets(&mut session);

    assert_proxy_value!(session, ALICE, score, 0);
    assert!(session.proxy(ALICE).handler().changes.is_empty());

    let report = session.proxy_mut(ALICE).chunk.resume_updates_from_replica();

    assert_eq!(report.applied, vec![0]);
    assert_proxy_value!(session, ALICE, score, 6);
    assert_eq!(session.proxy(ALICE).handler().changes.len(), 1);
}

#[test]
fn locked_chunk_vetoes_migration_without_side_effects() {
    let mut session = TestSession::new(SERVER, LockedChunk::new());
    session.add_proxy(ALICE, LockedChunk::new());
    session.primary.chunk.locked = true;
    session.primary.chunk.note.set(9);
    session.primary.chunk.announce.invoke("hold".to_string()).unwrap();
    let revision = session.primary.chunk.revision();
    let bits = session.primary.chunk.change_bits();

    let ctx = session.primary.replica.context();
    let result = {
        let mut chunks: [&mut dyn ChunkOwnership; 1] = [&mut session.primary.chunk];
        change_replica_ownership(&mut chunks, ALICE, &ctx)
    };

    assert!(matches!(result, Err(ChunkError::MigrationVetoed { .. })));
    assert!(session.primary.chunk.is_primary());
    assert_eq!(session.primary.chunk.revision(), revision);
    assert_eq!(session.primary.chunk.change_bits(), bits);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);
    assert_eq!(session.primary.chunk.ownership_changes, 0);
    assert!(session.primary.handler().ownership_changes.is_empty());

    exchange_packets(&mut session);
    assert_proxy_value!(session, ALICE, note, 9);
}

#[test]
fn non_migratable_chunk_vetoes_migration() {
    let mut session = TestSession::new(SERVER, LockedChunk::new());
    session.primary.chunk.migratable = false;
    let ctx = session.primary.replica.context();

    assert!(!session.primary.chunk.accept_change_ownership(ALICE, &ctx));

    let mut chunks: [&mut dyn ChunkOwnership; 1] = [&mut session.primary.chunk];
    assert!(change_replica_ownership(&mut chunks, ALICE, &ctx).is_err());
}

#[test]
fn accepted_migration_swaps_roles() {
    let mut session = TestSession::new(SERVER, LockedChunk::new());
    session.add_proxy(ALICE, LockedChunk::new());
    session.primary.chunk.announce.invoke("bye".to_string()).unwrap();

    let ctx = session.primary.replica.context();
    {
        let mut chunks: [&mut dyn ChunkOwnership; 1] = [&mut session.primary.chunk];
        change_replica_ownership(&mut chunks, ALICE, &ctx).unwrap();
    }
    {
        let alice = session.proxy_mut(ALICE);
        let handover = alice.replica.handover(ALICE);
        let mut chunks: [&mut dyn ChunkOwnership; 1] = [&mut alice.chunk];
        apply_ownership_change(&mut chunks, &handover).unwrap();
    }

    assert_eq!(session.primary.chunk.role(), ChunkRole::Proxy);
    assert!(session.primary.chunk.note.try_set(4).is_err());
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
    assert_eq!(session.primary.chunk.ownership_changes, 1);
    assert_eq!(session.primary.handler().ownership_changes, vec![false]);

    let alice = session.proxy(ALICE);
    assert_eq!(alice.chunk.role(), ChunkRole::Primary);
    assert_eq!(alice.chunk.ownership_changes, 1);
    assert_eq!(alice.handler().ownership_changes, vec![true]);
}

#[test]
fn promoted_proxy_catches_up_a_new_peer() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = TestSession::new(SERVER, ScoreChunk::new());
    session.add_proxy(ALICE, ScoreChunk::new());
    session.primary.chunk.score.set(7);
    session.primary.chunk.label.set("gold".to_string());
    exchange_packets(&mut session);

    let alice = session.proxy_mut(ALICE);
    let handover = alice.replica.handover(ALICE);
    alice.chunk.on_replica_change_ownership(&handover).unwrap();
    assert!(alice.chunk.is_primary());

    let mut carol = TestNode::new(
        ScoreChunk::new(),
        TestReplica::new(1, CAROL, ALICE),
        RecordingHandler::shared(),
    );
    carol.chunk.add_peer(ALICE).unwrap();
    alice.chunk.add_peer(CAROL).unwrap();

    alice
        .chunk
        .prepare_data(EndianType::Little, MarshalFlags::empty());
    let mut ctx = MarshalContext::new(CAROL, EndianType::Little, MarshalFlags::empty());
    let receipt = alice
        .chunk
        .marshal(&mut ctx, 0)
        .unwrap()
        .expect("non-default fields are due for a new peer");
    let bytes = ctx.to_bytes();
    let mut ctx = UnmarshalContext::new(&bytes, ALICE, EndianType::Little);
    carol.chunk.unmarshal(&mut ctx, 0).unwrap();

    assert_eq!(receipt.data_sets, vec![0, 1]);
    assert_eq!(*carol.chunk.score.get(), 7);
    assert_eq!(carol.chunk.label.get(), "gold");

    assert_eq!(alice.chunk.score.try_set(8), Ok(true));
    assert_eq!(alice.chunk.revision(), receipt.revision + 1);
}
