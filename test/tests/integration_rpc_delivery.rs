/// Integration tests for RPC relay between a primary and its proxies
/// Covers acknowledgement, resends after loss, unreliable drops and upstream forwarding

use replica_chunk::{
    ChunkError, EndianType, MarshalContext, MarshalFlags, PeerId, Reliability, RpcDirection,
};
use replica_chunk_test::{
    exchange_packets, exchange_packets_n_times, CombatChunk, LockedChunk, RecordingHandler,
    TestSession,
};

const SERVER: PeerId = PeerId(1);
const ALICE: PeerId = PeerId(2);
const BOB: PeerId = PeerId(3);

fn combat() -> TestSession<CombatChunk> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = TestSession::new(SERVER, CombatChunk::new())
        .with_primary_handler(RecordingHandler::forwarding());
    session.add_proxy(ALICE, CombatChunk::new());
    session.add_proxy(BOB, CombatChunk::new());
    session
}

#[test]
fn downstream_rpc_reaches_every_proxy() {
    let mut session = combat();

    let id = session.primary.chunk.heal.invoke(25).unwrap();
    exchange_packets(&mut session);

    for peer in [ALICE, BOB] {
        let proxy = session.proxy(peer);
        let handler = proxy.handler();
        assert_eq!(handler.rpc_args::<i32>(CombatChunk::HEAL), vec![25]);
        assert_eq!(handler.rpcs[0].name, "heal");
        assert_eq!(handler.rpcs[0].request_id, id);
        assert_eq!(handler.rpcs[0].source, SERVER);
        assert_eq!(handler.rpcs[0].direction, RpcDirection::Downstream);
        assert_eq!(proxy.chunk.heal.decode(&handler.rpcs[0]), Some(Ok(25)));
    }
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn unreliable_broadcast_reaches_each_peer_when_prepared_per_peer() {
    let mut session = combat();
    let id = session.primary.chunk.ping.invoke(7).unwrap();

    for peer in [ALICE, BOB] {
        let prepared = session
            .primary
            .chunk
            .prepare_data(EndianType::Little, MarshalFlags::empty());
        assert!(prepared.has_unreliable);

        let mut ctx = MarshalContext::new(peer, EndianType::Little, MarshalFlags::empty());
        let receipt = session
            .primary
            .chunk
            .marshal(&mut ctx, 0)
            .unwrap()
            .expect("ping is due for every proxy");
        assert_eq!(receipt.rpcs, vec![(id, Reliability::Unreliable)]);
    }
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn unreliable_rpc_skipped_this_pass_is_dropped_at_pass_end() {
    let mut session = combat();
    session.primary.chunk.ping.invoke(7).unwrap();

    let mut ctx = MarshalContext::new(ALICE, EndianType::Little, MarshalFlags::empty());
    assert!(session.primary.chunk.marshal(&mut ctx, 0).unwrap().is_some());
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    session.primary.chunk.end_marshal_pass();

    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
    let mut ctx = MarshalContext::new(BOB, EndianType::Little, MarshalFlags::empty());
    assert!(session.primary.chunk.marshal(&mut ctx, 0).unwrap().is_none());
}

#[test]
fn rpc_stays_queued_until_every_target_acknowledges() {
    let mut session = combat();
    session.primary.chunk.heal.invoke(25).unwrap();

    let deliveries = session.send_downstream();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    session.settle(&deliveries[..1]);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    session.settle(&deliveries[1..]);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn lost_reliable_rpc_is_resent_only_to_the_peer_that_missed_it() {
    let mut session = combat();
    session.sever(BOB);

    session.primary.chunk.heal.invoke(10).unwrap();
    exchange_packets(&mut session);

    assert_eq!(session.proxy(BOB).handler().rpcs.len(), 0);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    session.restore(BOB);
    let deliveries = exchange_packets(&mut session);

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].to, BOB);
    assert_eq!(session.proxy(BOB).handler().rpc_args::<i32>(CombatChunk::HEAL), vec![10]);
    assert_eq!(session.proxy(ALICE).handler().rpc_args::<i32>(CombatChunk::HEAL), vec![10]);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn lost_unreliable_rpc_is_not_resent() {
    let mut session = combat();
    session.sever(BOB);

    session.primary.chunk.ping.invoke(7).unwrap();
    let deliveries = exchange_packets(&mut session);
    assert_eq!(
        deliveries[0].receipt.rpcs[0].1,
        Reliability::Unreliable
    );

    session.restore(BOB);
    exchange_packets_n_times(&mut session, 2);

    assert_eq!(session.proxy(ALICE).handler().rpc_args::<u8>(CombatChunk::PING), vec![7]);
    assert!(session.proxy(BOB).handler().rpcs.is_empty());
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn rpcs_arrive_in_invocation_order() {
    let mut session = combat();

    for amount in 1..=5 {
        session.primary.chunk.heal.invoke(amount).unwrap();
    }
    session.sever(ALICE);
    exchange_packets(&mut session);
    session.primary.chunk.heal.invoke(6).unwrap();
    session.restore(ALICE);
    exchange_packets(&mut session);

    let expected: Vec<i32> = (1..=6).collect();
    assert_eq!(session.proxy(ALICE).handler().rpc_args::<i32>(CombatChunk::HEAL), expected);
    assert_eq!(session.proxy(BOB).handler().rpc_args::<i32>(CombatChunk::HEAL), expected);
}

#[test]
fn upstream_rpc_is_forwarded_to_other_proxies() {
    let mut session = combat();

    session.proxy(ALICE).chunk.request_heal.invoke(15).unwrap();
    exchange_packets(&mut session);

    {
        let primary = session.primary.handler();
        assert_eq!(primary.rpc_args::<i32>(CombatChunk::REQUEST_HEAL), vec![15]);
        assert_eq!(primary.rpcs[0].source, ALICE);
        assert_eq!(primary.rpcs[0].direction, RpcDirection::Upstream);
    }
    assert_eq!(session.proxy(ALICE).chunk.pending_rpc_count(), 0);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    exchange_packets(&mut session);

    let bob = session.proxy(BOB).handler();
    assert_eq!(bob.rpc_args::<i32>(CombatChunk::REQUEST_HEAL), vec![15]);
    assert_eq!(bob.rpcs[0].source, SERVER);
    assert_eq!(bob.rpcs[0].direction, RpcDirection::Downstream);
    assert!(session.proxy(ALICE).handler().rpcs.is_empty());
    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn upstream_rpc_is_not_forwarded_when_handler_declines() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = TestSession::new(SERVER, CombatChunk::new());
    session.add_proxy(ALICE, CombatChunk::new());
    session.add_proxy(BOB, CombatChunk::new());

    session.proxy(ALICE).chunk.request_heal.invoke(15).unwrap();
    exchange_packets_n_times(&mut session, 2);

    assert_eq!(session.primary.handler().rpcs.len(), 1);
    assert!(session.proxy(BOB).handler().rpcs.is_empty());
}

#[test]
fn disconnected_peer_no_longer_holds_rpcs() {
    let mut session = combat();
    session.sever(BOB);
    session.primary.chunk.heal.invoke(1).unwrap();
    exchange_packets(&mut session);
    assert_eq!(session.primary.chunk.pending_rpc_count(), 1);

    assert!(session.primary.chunk.remove_peer(BOB));

    assert_eq!(session.primary.chunk.pending_rpc_count(), 0);
}

#[test]
fn small_queue_rejects_reliable_overflow() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut session = TestSession::new(SERVER, LockedChunk::new());
    session.add_proxy(ALICE, LockedChunk::new());

    for round in 0..4 {
        session
            .primary
            .chunk
            .announce
            .invoke(format!("round {}", round))
            .unwrap();
    }
    let overflow = session.primary.chunk.announce.invoke("late".to_string());

    assert_eq!(
        overflow,
        Err(ChunkError::QueueFull {
            class_name: "LockedChunk",
            capacity: 4,
        })
    );

    exchange_packets(&mut session);
    assert_eq!(session.proxy(ALICE).handler().rpc_args::<String>(0).len(), 4);
    assert!(session.primary.chunk.announce.invoke("again".to_string()).is_ok());
}
