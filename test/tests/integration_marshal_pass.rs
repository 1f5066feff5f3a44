/// Integration tests for a marshal pass over several chunks of one Replica
/// Covers priority scheduling, chunk indices in a shared packet and baseline bookkeeping

use replica_chunk::{
    ChunkFlags, ChunkInspector, ChunkPriority, EndianType, MarshalContext, MarshalFlags,
    MarshalScheduler, PeerId, UnmarshalContext,
};
use replica_chunk_test::{CombatChunk, RecordingHandler, ScoreChunk, TestNode, TestReplica};

const SERVER: PeerId = PeerId(1);
const ALICE: PeerId = PeerId(2);

const SCORE_INDEX: u32 = 0;
const COMBAT_INDEX: u32 = 1;

struct Side {
    score: TestNode<ScoreChunk>,
    combat: TestNode<CombatChunk>,
}

fn side(local: PeerId, remote: PeerId) -> Side {
    let replica = TestReplica::new(7, local, SERVER);
    let mut side = Side {
        score: TestNode::new(ScoreChunk::new(), replica, RecordingHandler::shared()),
        combat: TestNode::new(CombatChunk::new(), replica, RecordingHandler::shared()),
    };
    side.score.chunk.add_peer(remote).unwrap();
    side.combat.chunk.add_peer(remote).unwrap();
    side
}

#[test]
fn chunks_share_one_packet_in_priority_order() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut server = side(SERVER, ALICE);
    let mut alice = side(ALICE, SERVER);
    server.combat.chunk.set_priority(ChunkPriority::HIGH);

    server.score.chunk.score.set(3);
    server.combat.chunk.health.set(50);
    server.combat.chunk.heal.invoke(5).unwrap();
    assert!(server.combat.chunk.flags().contains(ChunkFlags::UPDATED_THIS_FRAME));

    let mut scheduler = MarshalScheduler::new();
    let score_prepared = server
        .score
        .chunk
        .prepare_data(EndianType::Little, MarshalFlags::empty());
    let combat_prepared = server
        .combat
        .chunk
        .prepare_data(EndianType::Little, MarshalFlags::empty());
    assert!(scheduler.schedule(SCORE_INDEX, server.score.chunk.priority(), score_prepared));
    assert!(scheduler.schedule(COMBAT_INDEX, server.combat.chunk.priority(), combat_prepared));

    let mut ctx = MarshalContext::new(ALICE, EndianType::Little, MarshalFlags::empty());
    let mut order = Vec::new();
    for task in scheduler {
        let receipt = match task.key {
            SCORE_INDEX => server.score.chunk.marshal(&mut ctx, task.key),
            _ => server.combat.chunk.marshal(&mut ctx, task.key),
        };
        assert!(receipt.unwrap().is_some());
        order.push(task.key);
    }
    assert_eq!(order, vec![COMBAT_INDEX, SCORE_INDEX]);
    assert!(server.combat.chunk.flags().contains(ChunkFlags::UPDATED_THIS_FRAME));
    server.score.chunk.end_marshal_pass();
    server.combat.chunk.end_marshal_pass();
    assert!(!server.combat.chunk.flags().contains(ChunkFlags::UPDATED_THIS_FRAME));

    let bytes = ctx.to_bytes();
    let mut ctx = UnmarshalContext::new(&bytes, SERVER, EndianType::Little);
    let combat_report = alice.combat.chunk.unmarshal(&mut ctx, COMBAT_INDEX).unwrap();
    let score_report = alice.score.chunk.unmarshal(&mut ctx, SCORE_INDEX).unwrap();

    assert_eq!(combat_report.applied, vec![CombatChunk::HEALTH]);
    assert_eq!(combat_report.rpcs_dispatched, 1);
    assert_eq!(score_report.applied, vec![0]);
    assert_eq!(*alice.combat.chunk.health.get(), 50);
    assert_eq!(*alice.score.chunk.score.get(), 3);
    assert_eq!(
        alice.combat.handler().rpc_args::<i32>(CombatChunk::HEAL),
        vec![5]
    );
}

#[test]
fn baseline_tracks_marshals_until_acknowledged() {
    let mut server = side(SERVER, ALICE);
    assert!(server.combat.chunk.inspect_baseline(ALICE).is_none());

    server.combat.chunk.health.set(80);
    server.combat.chunk.heal.invoke(1).unwrap();
    server
        .combat
        .chunk
        .prepare_data(EndianType::Little, MarshalFlags::empty());
    let mut ctx = MarshalContext::new(ALICE, EndianType::Little, MarshalFlags::empty());
    let receipt = server
        .combat
        .chunk
        .marshal(&mut ctx, COMBAT_INDEX)
        .unwrap()
        .unwrap();

    let baseline = server.combat.chunk.inspect_baseline(ALICE).unwrap();
    assert_eq!(baseline.in_flight_count(), 1);
    assert_eq!(baseline.last_marshalled(), receipt.revision);
    assert_eq!(baseline.acked(), None);
    assert_eq!(server.combat.chunk.inspect_rpc_queue().len(), 1);
    assert_eq!(server.combat.chunk.inspect_change_bits().reliable_dirty(), 0b01);

    server
        .combat
        .chunk
        .acknowledge_data(ALICE, receipt.revision)
        .unwrap();
    for (id, _) in &receipt.rpcs {
        server.combat.chunk.acknowledge_rpc(ALICE, *id).unwrap();
    }

    let baseline = server.combat.chunk.inspect_baseline(ALICE).unwrap();
    assert_eq!(baseline.in_flight_count(), 0);
    assert_eq!(baseline.acked(), Some(receipt.revision));
    assert!(server.combat.chunk.inspect_rpc_queue().is_empty());
    assert_eq!(server.combat.chunk.inspect_change_bits().reliable_dirty(), 0);
}

#[test]
fn proxy_stages_nothing_when_idle() {
    let alice = side(ALICE, SERVER);

    assert!(alice.score.chunk.inspect_staged().is_empty());
    assert_eq!(alice.score.chunk.calculate_dirty_mask(SERVER), Some(0));
}
