/// Integration tests for field replication between a primary and its proxies
/// Covers delta marshalling, idle passes, late joiners and lost packets

use replica_chunk::{ChangeOrigin, EndianType, MarshalContext, MarshalFlags, PeerId};
use replica_chunk_test::{
    assert_proxy_value, assert_settled, exchange_packets, exchange_packets_n_times, ScoreChunk,
    TestSession,
};

const SERVER: PeerId = PeerId(1);
const ALICE: PeerId = PeerId(2);
const BOB: PeerId = PeerId(3);

fn session() -> TestSession<ScoreChunk> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = TestSession::new(SERVER, ScoreChunk::new());
    session.add_proxy(ALICE, ScoreChunk::new());
    session
}

#[test]
fn changed_field_reaches_proxy_once() {
    let mut session = session();

    session.primary.chunk.score.set(10);
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].receipt.data_sets, vec![0]);
    assert_proxy_value!(session, ALICE, score, 10);

    let proxy = session.proxy(ALICE);
    let handler = proxy.handler();
    assert_eq!(handler.changes.len(), 1);
    assert_eq!(handler.changes[0].name, "score");
    assert_eq!(handler.changes[0].origin, ChangeOrigin::Remote);
    assert_eq!(handler.changes[0].value::<i32>(), Ok(10));
}

#[test]
fn idle_chunk_marshals_nothing() {
    let mut session = session();
    session.primary.chunk.score.set(10);
    exchange_packets(&mut session);

    assert_settled!(session.primary.chunk);
    assert!(exchange_packets(&mut session).is_empty());

    let mut ctx = MarshalContext::new(ALICE, EndianType::Little, MarshalFlags::empty());
    assert_eq!(session.primary.chunk.marshal(&mut ctx, 0), Ok(None));
    assert!(ctx.is_empty());
}

#[test]
fn only_changed_fields_are_sent() {
    let mut session = session();
    session.primary.chunk.score.set(1);
    session.primary.chunk.label.set("gold".to_string());
    exchange_packets(&mut session);

    session.primary.chunk.label.set("silver".to_string());
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries[0].receipt.data_sets, vec![1]);
    assert_proxy_value!(session, ALICE, label, "silver".to_string());
    assert_eq!(session.proxy(ALICE).handler().changes_for(0).len(), 1);
    assert_eq!(session.proxy(ALICE).handler().changes_for(1).len(), 2);
}

#[test]
fn several_writes_between_passes_are_coalesced() {
    let mut session = session();

    session.primary.chunk.score.set(1);
    session.primary.chunk.score.set(2);
    session.primary.chunk.score.set(3);
    exchange_packets(&mut session);

    assert_proxy_value!(session, ALICE, score, 3);
    assert_eq!(session.proxy(ALICE).handler().changes.len(), 1);
    assert_eq!(session.primary.handler().changes.len(), 3);
}

#[test]
fn late_joiner_catches_up_on_non_default_fields() {
    let mut session = session();
    session.primary.chunk.label.set("gold".to_string());
    exchange_packets_n_times(&mut session, 2);
    assert_settled!(session.primary.chunk);

    session.add_proxy(BOB, ScoreChunk::new());
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].to, BOB);
    assert_eq!(deliveries[0].receipt.data_sets, vec![1]);
    assert_proxy_value!(session, BOB, label, "gold".to_string());
    assert_proxy_value!(session, BOB, score, 0);
}

#[test]
fn field_reset_to_default_is_still_sent_to_late_joiner() {
    let mut session = session();
    session.primary.chunk.score.set(5);
    exchange_packets(&mut session);
    session.primary.chunk.score.set(0);
    exchange_packets(&mut session);

    session.add_proxy(BOB, ScoreChunk::new());
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries[0].receipt.data_sets, vec![0]);
    assert_proxy_value!(session, BOB, score, 0);
    assert!(session.proxy(BOB).handler().changes.is_empty());
}

#[test]
fn lost_fields_are_sent_again() {
    let mut session = session();
    session.add_proxy(BOB, ScoreChunk::new());
    session.sever(BOB);

    session.primary.chunk.score.set(42);
    let deliveries = exchange_packets(&mut session);

    assert!(deliveries.iter().any(|delivery| delivery.to == BOB && delivery.was_dropped()));
    assert_proxy_value!(session, ALICE, score, 42);
    assert_proxy_value!(session, BOB, score, 0);

    session.restore(BOB);
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].to, BOB);
    assert_proxy_value!(session, BOB, score, 42);
    assert_settled!(session.primary.chunk);
}

#[test]
fn blocked_peer_is_skipped() {
    let mut session = session();
    session.add_proxy(BOB, ScoreChunk::new());
    session.primary.handler_mut().blocked_peers.insert(BOB);

    session.primary.chunk.score.set(7);
    exchange_packets(&mut session);

    assert_proxy_value!(session, ALICE, score, 7);
    assert_proxy_value!(session, BOB, score, 0);

    session.primary.handler_mut().blocked_peers.clear();
    exchange_packets(&mut session);

    assert_proxy_value!(session, BOB, score, 7);
}

#[test]
fn full_sync_resends_every_non_default_field() {
    let mut session = session();
    session.primary.chunk.score.set(9);
    exchange_packets(&mut session);

    let flags = MarshalFlags::FULL_SYNC;
    session.primary.chunk.prepare_data(EndianType::Little, flags);
    let mut ctx = MarshalContext::new(ALICE, EndianType::Little, flags);
    let receipt = session
        .primary
        .chunk
        .marshal(&mut ctx, 0)
        .unwrap()
        .expect("full sync writes non-default fields");

    assert_eq!(receipt.data_sets, vec![0]);
}

#[test]
fn prepare_data_reports_reliability_of_due_work() {
    let mut session = session();

    let idle = session
        .primary
        .chunk
        .prepare_data(EndianType::Big, MarshalFlags::empty());
    assert!(idle.is_empty());

    session.primary.chunk.score.set(1);
    let prepared = session
        .primary
        .chunk
        .prepare_data(EndianType::Big, MarshalFlags::empty());

    assert!(prepared.has_reliable);
    assert!(!prepared.has_unreliable);
    assert_eq!(prepared.endian, EndianType::Big);
    assert_eq!(prepared.revision, 1);
}
