//! Playback session state machine driven by a fake player.

mod common;

use std::sync::Arc;

use bridge_traits::{MediaSource, PlayerEvent};
use bytes::Bytes;
use common::{FakePlayer, Harness, RecordingNowPlaying, Script, ScriptedHttp};
use core_playback::{
    AssetId, ItemStatus, LoadOutcome, LoadRequest, PlaybackError, RemoteCommand, SessionState,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};

fn load_request(id: &str, url: &str) -> LoadRequest {
    LoadRequest {
        asset_id: AssetId::new(id),
        title: format!("Episode {id}"),
        collection_title: "Show".to_string(),
        collection_id: "show-1".to_string(),
        source_url: url.to_string(),
        autoplay: false,
        start_at: None,
    }
}

fn ready(player: &FakePlayer, duration: f64) -> PlayerEvent {
    PlayerEvent::Ready {
        item: player.last_item(),
        duration,
    }
}

#[tokio::test]
async fn load_streams_remote_asset_until_ready() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let now_playing = Arc::new(RecordingNowPlaying::default());
    let (mut session, _events) = harness.session(player.clone(), now_playing.clone());
    let mut snapshots = session.subscribe();

    let outcome = session
        .load(load_request("ep-1", " https://x/ep1.mp3 "), &mut downloads, &mut history)
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Pending);
    assert_eq!(session.snapshot().state, SessionState::Loading);
    assert!(session.snapshot().presented);
    assert!(session.snapshot().is_buffering);
    assert_eq!(
        player.last_source(),
        MediaSource::Remote("https://x/ep1.mp3".to_string())
    );

    let status = session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    assert_eq!(status, Some(ItemStatus::Ready { item: player.last_item() }));

    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.duration, 600.0);
    assert!(!snapshot.is_buffering);

    let info = now_playing.last().unwrap();
    assert_eq!(info.title, "Episode ep-1");
    assert_eq!(info.artist, "Show");
    assert_eq!(info.rate, 0.0);
    assert!(history.history_item(&AssetId::new("ep-1")).is_some());
}

#[tokio::test]
async fn completed_download_is_preferred_over_stream() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    let local = downloads.local_path(&AssetId::new("ep-7"));
    std::fs::write(&local, b"ID3 audio").unwrap();

    session
        .load(load_request("ep-7", "https://x/ep7.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();

    assert_eq!(player.last_source(), MediaSource::LocalFile(local));
    assert!(session.snapshot().is_local());
}

#[tokio::test]
async fn empty_local_file_falls_back_to_stream() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    std::fs::write(downloads.local_path(&AssetId::new("ep-7")), b"").unwrap();

    session
        .load(load_request("ep-7", "https://x/ep7.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    assert!(player.last_source().is_remote());
}

#[tokio::test]
async fn loading_the_same_asset_twice_is_a_no_op() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;

    let outcome = session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();

    assert_eq!(outcome, LoadOutcome::AlreadyLoaded);
    assert_eq!(player.state.lock().opened.len(), 1);
    assert_eq!(session.snapshot().state, SessionState::Ready);
}

#[tokio::test]
async fn invalid_url_fails_the_session() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    let err = session
        .load(load_request("ep-1", "not a url"), &mut downloads, &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::InvalidSource(_)));
    assert_eq!(session.snapshot().state, SessionState::Failed);
    assert_eq!(session.snapshot().last_error.as_deref(), Some("Invalid audio URL"));
    assert!(player.state.lock().opened.is_empty());

    let err = session
        .load(load_request("ep-2", ""), &mut downloads, &mut history)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No audio URL available for this episode");
}

#[tokio::test]
async fn player_failure_makes_controls_inert() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    let item = player.last_item();
    let status = session
        .handle_player_event(
            PlayerEvent::Failed {
                item,
                reason: "403 Forbidden".to_string(),
            },
            &mut downloads,
            &mut history,
        )
        .await;

    assert!(matches!(status, Some(ItemStatus::Failed { .. })));
    assert_eq!(session.snapshot().state, SessionState::Failed);
    assert_eq!(
        session.snapshot().last_error.as_deref(),
        Some("Playback failed: 403 Forbidden")
    );
    assert!(!session.snapshot().is_buffering);

    session.play(&mut downloads).await.unwrap();
    assert_eq!(player.state.lock().plays, 0);
    assert!(!session.snapshot().is_playing);
}

#[tokio::test]
async fn open_error_is_a_decode_failure() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    player.state.lock().fail_open = true;
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    let err = session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap_err();

    assert!(matches!(err, PlaybackError::DecodeFailure(_)));
    assert_eq!(session.snapshot().state, SessionState::Failed);
}

#[tokio::test]
async fn events_from_superseded_items_are_ignored() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    session
        .load(load_request("a", "https://x/a.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    let first = player.last_item();
    session
        .load(load_request("b", "https://x/b.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();

    assert!(player.state.lock().released.contains(&first));

    let status = session
        .handle_player_event(
            PlayerEvent::Ready {
                item: first,
                duration: 100.0,
            },
            &mut downloads,
            &mut history,
        )
        .await;
    assert_eq!(status, None);
    assert_eq!(session.snapshot().state, SessionState::Loading);
    assert_eq!(session.snapshot().asset_id, Some(AssetId::new("b")));
}

#[tokio::test]
async fn seeks_clamp_and_stale_completions_are_dropped() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let bus = EventBus::new(64);
    let mut bus_events = bus.subscribe();
    let (session, _events) = harness.session(player.clone(), Arc::default());
    let mut session = session.with_event_bus(bus);

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    let item = player.last_item();

    session.seek(-5.0).await;
    assert_eq!(session.snapshot().current_time, 0.0);
    session.seek(1000.0).await;
    assert_eq!(session.snapshot().current_time, 600.0);

    session.seek(100.0).await;
    let (_, stale) = player.last_seek().unwrap();
    session.seek(200.0).await;
    let (_, latest) = player.last_seek().unwrap();

    for token in [stale, latest] {
        session
            .handle_player_event(
                PlayerEvent::SeekCompleted {
                    item,
                    token,
                    finished: true,
                },
                &mut downloads,
                &mut history,
            )
            .await;
    }

    let mut seeked = Vec::new();
    while let Ok(event) = bus_events.try_recv() {
        if let CoreEvent::Playback(PlaybackEvent::Seeked { position_ms, .. }) = event {
            seeked.push(position_ms);
        }
    }
    assert_eq!(seeked, vec![200_000]);
    assert_eq!(session.snapshot().current_time, 200.0);
}

#[tokio::test]
async fn position_is_remembered_and_resumed() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());
    let ep1 = AssetId::new("ep-1");

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    session.seek(300.0).await;
    let (_, token) = player.last_seek().unwrap();
    session
        .handle_player_event(
            PlayerEvent::SeekCompleted {
                item: player.last_item(),
                token,
                finished: true,
            },
            &mut downloads,
            &mut history,
        )
        .await;
    session.stop(&mut history).await;

    assert_eq!(history.playback_position(&ep1), Some(300.0));

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;

    assert_eq!(player.last_seek().map(|(position, _)| position), Some(300.0));
    assert_eq!(session.snapshot().current_time, 300.0);
}

#[tokio::test]
async fn seek_while_loading_is_applied_on_ready() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session.seek(120.0).await;
    session.skip_forward(30.0).await;
    assert!(player.state.lock().seeks.is_empty());

    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    assert_eq!(player.last_seek().map(|(position, _)| position), Some(150.0));
}

#[tokio::test]
async fn interrupted_seek_does_not_stall_sampling() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());
    let id = AssetId::new("ep-1");

    let mut request = load_request("ep-1", "https://x/ep1.mp3");
    request.autoplay = true;
    session.load(request, &mut downloads, &mut history).await.unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    let item = player.last_item();

    session.seek(100.0).await;
    let (_, token) = player.last_seek().unwrap();
    session
        .handle_player_event(
            PlayerEvent::SeekCompleted {
                item,
                token,
                finished: false,
            },
            &mut downloads,
            &mut history,
        )
        .await;

    for position in [105.0, 110.0, 120.0, 130.0] {
        player.set_position(position);
        session.tick(&mut history).await;
    }
    assert_eq!(session.snapshot().current_time, 130.0);
    assert_eq!(history.playback_position(&id), Some(130.0));

    // A late completion for the interrupted seek changes nothing.
    session
        .handle_player_event(
            PlayerEvent::SeekCompleted {
                item,
                token,
                finished: true,
            },
            &mut downloads,
            &mut history,
        )
        .await;
    assert_eq!(session.snapshot().current_time, 130.0);
}

#[tokio::test]
async fn ticks_publish_forward_progress_and_save_periodically() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());
    let id = AssetId::new("https://x/ep1.mp3");

    let mut request = load_request("https://x/ep1.mp3", "https://x/ep1.mp3");
    request.autoplay = true;
    session.load(request, &mut downloads, &mut history).await.unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    assert_eq!(session.snapshot().state, SessionState::Playing);

    player.set_position(0.1);
    session.tick(&mut history).await;
    assert_eq!(session.snapshot().current_time, 0.0);

    player.set_position(1.0);
    session.tick(&mut history).await;
    assert_eq!(session.snapshot().current_time, 1.0);

    player.set_position(0.5);
    session.tick(&mut history).await;
    assert_eq!(session.snapshot().current_time, 1.0);

    assert_eq!(history.playback_position(&id), Some(0.0));
    player.set_position(11.5);
    session.tick(&mut history).await;
    assert_eq!(history.playback_position(&id), Some(11.5));
}

#[tokio::test]
async fn playing_a_stream_queues_its_download() {
    let harness = Harness::new(
        ScriptedHttp::default().with("https://x/ep1.mp3", Script::Body(Bytes::from_static(b"mp3"))),
    )
    .await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());
    let id = AssetId::new("ep-1");

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    assert!(!downloads.is_downloading(&id));

    session.play(&mut downloads).await.unwrap();
    assert!(downloads.is_downloading(&id));
    assert_eq!(player.state.lock().plays, 1);
}

#[tokio::test]
async fn end_of_episode_pauses_and_clears_history() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let (mut session, _events) = harness.session(player.clone(), Arc::default());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    session.play(&mut downloads).await.unwrap();
    session
        .handle_player_event(
            PlayerEvent::Ended {
                item: player.last_item(),
            },
            &mut downloads,
            &mut history,
        )
        .await;

    assert_eq!(session.snapshot().state, SessionState::Paused);
    assert_eq!(session.snapshot().current_time, 600.0);
    assert!(!session.snapshot().is_playing);
    assert!(history.history_item(&AssetId::new("ep-1")).is_none());
}

#[tokio::test]
async fn stop_resets_everything() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let now_playing = Arc::new(RecordingNowPlaying::default());
    let (mut session, _events) = harness.session(player.clone(), now_playing.clone());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;
    let item = player.last_item();

    session.stop(&mut history).await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.asset_id, None);
    assert!(!snapshot.presented);
    assert_eq!(session.current_item(), None);
    assert!(player.state.lock().released.contains(&item));
    assert_eq!(*now_playing.cleared.lock(), 1);
}

#[tokio::test]
async fn remote_commands_drive_transport() {
    let harness = Harness::new(ScriptedHttp::default()).await;
    let (mut downloads, _transfers) = harness.downloads().await;
    let mut history = harness.history().await;
    let player = Arc::new(FakePlayer::default());
    let now_playing = Arc::new(RecordingNowPlaying::default());
    let (mut session, _events) = harness.session(player.clone(), now_playing.clone());

    session
        .load(load_request("ep-1", "https://x/ep1.mp3"), &mut downloads, &mut history)
        .await
        .unwrap();
    session
        .handle_player_event(ready(&player, 600.0), &mut downloads, &mut history)
        .await;

    session
        .remote_command(RemoteCommand::TogglePlayPause, &mut downloads, &mut history)
        .await
        .unwrap();
    assert_eq!(session.snapshot().state, SessionState::Playing);
    assert_eq!(now_playing.last().unwrap().rate, 1.0);

    session
        .remote_command(RemoteCommand::SkipForward(None), &mut downloads, &mut history)
        .await
        .unwrap();
    assert_eq!(player.last_seek().map(|(position, _)| position), Some(30.0));

    session
        .remote_command(RemoteCommand::SkipBackward(Some(10.0)), &mut downloads, &mut history)
        .await
        .unwrap();
    assert_eq!(player.last_seek().map(|(position, _)| position), Some(20.0));

    session
        .remote_command(RemoteCommand::Pause, &mut downloads, &mut history)
        .await
        .unwrap();
    assert_eq!(session.snapshot().state, SessionState::Paused);
    assert_eq!(now_playing.last().unwrap().rate, 0.0);
}
