//! Call scenarios between coordinators sharing an in-memory signaling bus.

mod common;

use std::{sync::Arc, time::Duration};

use common::{Peer, Spy, eventually, join_peer, room, wait_connected, wait_for_state};
use tokio::time::sleep;
use tsunagu_client::{
    SessionEvent,
    domain::{
        CallState, FailureReason, MediaKind, ParticipantId, SdpKind, SessionDescription,
        SignalMessage, SignalPayload, SignalingBus,
    },
    infrastructure::{CaptureBehavior, InMemorySignalingBus, SimulatedMediaCapture},
};

fn granting() -> SimulatedMediaCapture {
    SimulatedMediaCapture::granting()
}

async fn live_tracks_drop_to_zero(peer: &Peer) {
    eventually("media release", move || async move {
        peer.capture.live_tracks() == 0 && peer.transport.open_sessions() == 0
    })
    .await;
}

#[tokio::test]
async fn test_second_joiner_triggers_single_offer_and_answer() {
    // テスト項目: A の入室後に B が入室すると、A が 1 回オファーし B が 1 回応答して双方が接続される
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let mut alice_events = alice.coordinator.subscribe();

    // when (操作):
    let bob = join_peer(bus.clone(), "bob", granting()).await;

    // then (期待する結果):
    wait_connected(&alice).await;
    wait_connected(&bob).await;
    assert_eq!(spy.count_from("alice", "offer"), 1);
    assert_eq!(spy.count_from("bob", "offer"), 0);
    assert_eq!(spy.count_from("bob", "answer"), 1);
    assert_eq!(spy.count_from("alice", "answer"), 0);
    assert!(alice.coordinator.snapshot().await.remote_media.is_some());
    assert!(bob.coordinator.snapshot().await.remote_media.is_some());
    assert_eq!(alice.capture.live_tracks(), 2);
    assert_eq!(bob.capture.live_tracks(), 2);

    // 通話時間のティッカーが動いている
    let ticked = tokio::time::timeout(common::WAIT, async {
        loop {
            if let Ok(SessionEvent::CallElapsed(_)) = alice_events.recv().await {
                return;
            }
        }
    })
    .await;
    assert!(ticked.is_ok());
}

#[tokio::test]
async fn test_glare_resolves_to_one_offerer() {
    // テスト項目: 双方が同時に通話を開始しても、オファー側は 1 人に決まり応答は 1 回だけになる
    // given (前提条件): 双方が互いの join を受け取る
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let (alice, bob) = tokio::join!(
        join_peer(bus.clone(), "alice", granting()),
        join_peer(bus.clone(), "bob", granting())
    );

    // when (操作):
    let (a, b) = tokio::join!(
        alice.coordinator.start_call(),
        bob.coordinator.start_call()
    );

    // then (期待する結果):
    assert!(a.is_ok());
    assert!(b.is_ok());
    wait_connected(&alice).await;
    wait_connected(&bob).await;
    sleep(Duration::from_millis(100)).await;

    let answers = spy.answers();
    assert_eq!(answers.len(), 1);
    let (answerer, answered) = answers[0].clone();
    let offers = spy.offers();
    assert!(
        offers
            .iter()
            .any(|(offerer, id)| *id == answered && *offerer != answerer)
    );
    for peer in [&alice, &bob] {
        assert_eq!(peer.transport.open_sessions(), 1);
        assert_eq!(peer.capture.live_tracks(), 2);
    }
}

#[tokio::test]
async fn test_glare_loser_still_preparing_answers_after_preparation() {
    // テスト項目: 負けた側が自分のオファーを準備中の場合、準備完了後に勝者のオファーへ応答する
    // given (前提条件): bob のメディア取得は遅い
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;

    // when (操作):
    let (alice, bob) = tokio::join!(
        join_peer(bus.clone(), "alice", granting()),
        join_peer(
            bus.clone(),
            "bob",
            granting().with_latency(Duration::from_millis(300))
        )
    );

    // then (期待する結果):
    wait_connected(&alice).await;
    wait_connected(&bob).await;
    assert_eq!(spy.count_from("bob", "offer"), 0);
    assert_eq!(spy.count_from("bob", "answer"), 1);
    assert_eq!(spy.count_from("alice", "answer"), 0);
    assert_eq!(bob.transport.open_sessions(), 1);
    assert_eq!(bob.capture.live_tracks(), 2);
}

#[tokio::test]
async fn test_media_denied_then_retry_succeeds() {
    // テスト項目: メディア取得を拒否すると Failed(media-denied) になり、許可後の再開始で接続できる
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(bus.clone(), "alice", SimulatedMediaCapture::denying()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;

    // when (操作): bob の入室で alice がオファーを試みる
    wait_for_state(&alice, CallState::Failed(FailureReason::MediaDenied)).await;

    // then (期待する結果):
    assert_eq!(alice.capture.live_tracks(), 0);
    assert_eq!(alice.transport.open_sessions(), 0);
    assert_eq!(bob.coordinator.state().await, CallState::AwaitingPeer);

    // when (操作): 許可してから再度通話を開始する
    alice.capture.set_behavior(CaptureBehavior::Grant);
    alice.coordinator.start_call().await.unwrap();

    // then (期待する結果):
    wait_connected(&alice).await;
    wait_connected(&bob).await;
}

#[tokio::test]
async fn test_end_call_mid_negotiation_ignores_stale_answer() {
    // テスト項目: ネゴシエーション中に終了すると Ended になり、後から届いた古いアンサーは無視される
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    alice.coordinator.start_call().await.unwrap();
    let offer_id = {
        let mut found = None;
        for _ in 0..500 {
            if let Some((_, id)) = spy.offers().first() {
                found = Some(*id);
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        found.expect("alice never offered")
    };

    // when (操作):
    alice.coordinator.end_call().await;
    bus.publish(
        &room(),
        SignalMessage::new(
            ParticipantId::new("bob".to_string()).unwrap(),
            SignalPayload::Answer {
                negotiation_id: offer_id,
                description: SessionDescription {
                    kind: SdpKind::Answer,
                    sdp: "v=0".to_string(),
                },
            },
        ),
    );
    sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    assert_eq!(alice.coordinator.state().await, CallState::Ended);
    assert_eq!(alice.capture.live_tracks(), 0);
    assert_eq!(alice.transport.open_sessions(), 0);
    assert_eq!(spy.count_from("alice", "presence"), 2);
}

#[tokio::test]
async fn test_end_call_during_media_acquisition_leaves_no_tracks() {
    // テスト項目: メディア取得中に終了しても、取得完了後にトラックが解放される
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(
        bus.clone(),
        "alice",
        granting().with_latency(Duration::from_millis(200)),
    )
    .await;
    alice.coordinator.start_call().await.unwrap();
    assert_eq!(alice.coordinator.state().await, CallState::Negotiating);

    // when (操作):
    alice.coordinator.end_call().await;

    // then (期待する結果):
    assert_eq!(alice.coordinator.state().await, CallState::Ended);
    sleep(Duration::from_millis(400)).await;
    assert_eq!(alice.capture.live_tracks(), 0);
    assert_eq!(alice.transport.open_sessions(), 0);
    assert_eq!(alice.coordinator.state().await, CallState::Ended);
}

#[tokio::test]
async fn test_end_call_twice_is_noop() {
    // テスト項目: 通話終了を 2 回呼んでも 2 回目は何もしない。相手は相手待ちに戻る
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;
    wait_connected(&alice).await;
    wait_connected(&bob).await;
    let mut events = alice.coordinator.subscribe();

    // when (操作):
    alice.coordinator.end_call().await;
    alice.coordinator.end_call().await;

    // then (期待する結果):
    assert_eq!(alice.coordinator.state().await, CallState::Ended);
    assert_eq!(alice.capture.live_tracks(), 0);
    assert_eq!(alice.transport.open_sessions(), 0);
    let snapshot = alice.coordinator.snapshot().await;
    assert!(!snapshot.remote_connected);
    assert!(snapshot.remote_media.is_none());

    let mut ended = 0;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::StateChanged {
            state: CallState::Ended,
            reason,
        } = event
        {
            assert_eq!(reason, None);
            ended += 1;
        }
    }
    assert_eq!(ended, 1);

    wait_for_state(&bob, CallState::AwaitingPeer).await;
    live_tracks_drop_to_zero(&bob).await;
}

#[tokio::test]
async fn test_chat_order_is_preserved_during_call_setup() {
    // テスト項目: 通話のネゴシエーションと並行して送ったチャットが送信順に届く
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;

    // when (操作):
    for i in 0..30 {
        alice
            .coordinator
            .send_chat(&format!("message {i}"))
            .await
            .unwrap();
        if i % 10 == 0 {
            tokio::task::yield_now().await;
        }
    }

    // then (期待する結果):
    let receiver = &bob;
    eventually("all chat messages", move || async move {
        receiver.coordinator.chat_log().await.len() == 30
    })
    .await;
    let received: Vec<String> = bob
        .coordinator
        .chat_log()
        .await
        .into_iter()
        .map(|entry| {
            assert!(!entry.is_local);
            assert_eq!(entry.sender_display_name.as_str(), "ALICE");
            entry.text
        })
        .collect();
    let expected: Vec<String> = (0..30).map(|i| format!("message {i}")).collect();
    assert_eq!(received, expected);
    assert_eq!(alice.coordinator.chat_log().await.len(), 30);
    wait_connected(&bob).await;
}

#[tokio::test]
async fn test_toggle_before_and_after_media() {
    // テスト項目: メディア取得前の切り替えは設定のみ、取得後はトラックに即時反映され再ネゴシエーションしない
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let alice = join_peer(bus.clone(), "alice", granting()).await;

    // when (操作): メディアがない状態でカメラを切る
    let preference = alice.coordinator.toggle_camera().await;

    // then (期待する結果):
    assert!(!preference.video);
    assert_eq!(alice.capture.track_enabled(MediaKind::Video), None);

    // when (操作): 通話が始まりメディアが取得される
    let bob = join_peer(bus.clone(), "bob", granting()).await;
    wait_connected(&alice).await;

    // then (期待する結果): 取得したトラックには設定が反映されている
    assert_eq!(alice.capture.track_enabled(MediaKind::Video), Some(false));
    assert_eq!(alice.capture.track_enabled(MediaKind::Audio), Some(true));

    // when (操作): 通話中にカメラとマイクを切り替える
    alice.coordinator.toggle_camera().await;
    let preference = alice.coordinator.toggle_microphone().await;

    // then (期待する結果):
    assert!(preference.video);
    assert!(!preference.audio);
    assert_eq!(alice.capture.track_enabled(MediaKind::Video), Some(true));
    assert_eq!(alice.capture.track_enabled(MediaKind::Audio), Some(false));
    assert_eq!(spy.offers().len(), 1);
    assert_eq!(alice.coordinator.state().await, CallState::Connected);
    drop(bob);
}

#[tokio::test]
async fn test_peer_leave_frees_the_call_for_a_new_participant() {
    // テスト項目: 相手が退出すると相手待ちに戻り、次に入室した参加者と通話できる
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;
    wait_connected(&alice).await;
    wait_connected(&bob).await;

    // when (操作):
    bob.coordinator.leave().await;

    // then (期待する結果):
    wait_for_state(&alice, CallState::AwaitingPeer).await;
    live_tracks_drop_to_zero(&alice).await;

    // when (操作):
    let carol = join_peer(bus.clone(), "carol", granting()).await;

    // then (期待する結果):
    wait_connected(&alice).await;
    wait_connected(&carol).await;
}

#[tokio::test]
async fn test_third_participant_cannot_enter_the_call() {
    // テスト項目: 2 人の通話中に入室した 3 人目のオファーには誰も応答しない
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;
    wait_connected(&alice).await;
    wait_connected(&bob).await;

    // when (操作):
    let carol = join_peer(bus.clone(), "carol", granting()).await;
    carol.coordinator.start_call().await.unwrap();
    sleep(Duration::from_millis(200)).await;

    // then (期待する結果):
    assert_eq!(spy.answers().len(), 1);
    assert_eq!(carol.coordinator.state().await, CallState::Negotiating);
    assert_eq!(alice.coordinator.state().await, CallState::Connected);
    assert_eq!(bob.coordinator.state().await, CallState::Connected);
    assert_eq!(alice.transport.open_sessions(), 1);
    assert_eq!(bob.transport.open_sessions(), 1);
}

#[tokio::test]
async fn test_degraded_bus_fails_start_call_but_keeps_chat() {
    // テスト項目: シグナリングが使えない場合、通話開始は no-signaling で失敗するがチャットは残る
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::unavailable());
    let alice = join_peer(bus.clone(), "alice", granting()).await;

    // when (操作):
    let result = alice.coordinator.start_call().await;
    let chat = alice.coordinator.send_chat("anyone there?").await;

    // then (期待する結果):
    assert!(result.is_err());
    assert_eq!(
        alice.coordinator.state().await,
        CallState::Failed(FailureReason::NoSignaling)
    );
    assert!(chat.is_ok());
    assert_eq!(alice.coordinator.chat_log().await.len(), 1);
    assert_eq!(alice.capture.live_tracks(), 0);
}

#[tokio::test]
async fn test_blank_chat_is_rejected_without_state_change() {
    // テスト項目: 空白のみのチャットは拒否され、相手にも届かない
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let mut spy = Spy::attach(bus.as_ref()).await;
    let alice = join_peer(bus.clone(), "alice", granting()).await;

    // when (操作):
    let result = alice.coordinator.send_chat(" \t ").await;

    // then (期待する結果):
    assert!(result.is_err());
    assert!(alice.coordinator.chat_log().await.is_empty());
    assert_eq!(alice.coordinator.state().await, CallState::AwaitingPeer);
    sleep(Duration::from_millis(50)).await;
    assert_eq!(spy.count("chat"), 0);
}

#[tokio::test]
async fn test_call_ticker_stops_when_the_call_ends() {
    // テスト項目: 通話終了後は双方で通話時間の通知が止まり、経過秒数も変わらない
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = join_peer(bus.clone(), "alice", granting()).await;
    let bob = join_peer(bus.clone(), "bob", granting()).await;
    wait_connected(&alice).await;
    wait_connected(&bob).await;
    let mut alice_events = alice.coordinator.subscribe();
    let mut bob_events = bob.coordinator.subscribe();
    let ticked = tokio::time::timeout(common::WAIT, async {
        loop {
            if let Ok(SessionEvent::CallElapsed(_)) = alice_events.recv().await {
                return;
            }
        }
    })
    .await;
    assert!(ticked.is_ok());

    // when (操作):
    alice.coordinator.end_call().await;
    wait_for_state(&bob, CallState::AwaitingPeer).await;
    while alice_events.try_recv().is_ok() {}
    while bob_events.try_recv().is_ok() {}
    let alice_elapsed = alice.coordinator.snapshot().await.call_elapsed_secs;
    let bob_elapsed = bob.coordinator.snapshot().await.call_elapsed_secs;
    sleep(common::config().ticker_interval * 4).await;

    // then (期待する結果):
    for events in [&mut alice_events, &mut bob_events] {
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::CallElapsed(_)),
                "ticker still running: {event:?}"
            );
        }
    }
    assert_eq!(
        alice.coordinator.snapshot().await.call_elapsed_secs,
        alice_elapsed
    );
    assert_eq!(bob.coordinator.snapshot().await.call_elapsed_secs, bob_elapsed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_keep_session_and_track_in_step() {
    // テスト項目: 複数タスクから同時にカメラを切り替えても、セッションの設定とトラックの状態が一致する
    // given (前提条件):
    let bus = Arc::new(InMemorySignalingBus::new());
    let alice = Arc::new(join_peer(bus.clone(), "alice", granting()).await);
    alice.coordinator.start_call().await.unwrap();
    let peer = alice.as_ref();
    eventually("local media", move || async move {
        peer.capture.live_tracks() == 2
    })
    .await;

    // when (操作):
    let tasks: Vec<_> = (0..25)
        .map(|_| {
            let alice = alice.clone();
            tokio::spawn(async move {
                alice.coordinator.toggle_camera().await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    // then (期待する結果):
    let preference = alice.coordinator.snapshot().await.local_media_enabled;
    assert!(!preference.video);
    assert_eq!(
        alice.capture.track_enabled(MediaKind::Video),
        Some(preference.video)
    );
}
