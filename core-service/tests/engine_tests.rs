//! End-to-end tests of the engine task through `CoreService`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ManualClock, MediaPlayer, MediaSource, NowPlayingCenter, NowPlayingInfo, PlayerEvent,
    PlayerEventSender, PlayerItemId,
};
use core_playback::{AssetId, LoadOutcome, LoadRequest, PlaybackError, SessionState};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_service::{CoreError, CoreService, FeedEpisode, FeedFetcher, FeedResult};
use mockall::mock;
use parking_lot::Mutex;
use uuid::Uuid;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Clone)]
enum OpenBehaviour {
    Ready(f64),
    Fail(String),
    /// Open succeeds but the item never reports back.
    Silent,
}

struct ScriptedPlayer {
    behaviour: Mutex<OpenBehaviour>,
    events: Mutex<Option<PlayerEventSender>>,
    seeks: Mutex<Vec<f64>>,
    position: Mutex<f64>,
}

impl ScriptedPlayer {
    fn new(behaviour: OpenBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(behaviour),
            events: Mutex::new(None),
            seeks: Mutex::new(Vec::new()),
            position: Mutex::new(0.0),
        })
    }

    fn last_seek(&self) -> Option<f64> {
        self.seeks.lock().last().copied()
    }
}

#[async_trait]
impl MediaPlayer for ScriptedPlayer {
    async fn open(
        &self,
        item: PlayerItemId,
        _source: MediaSource,
        events: PlayerEventSender,
    ) -> BridgeResult<()> {
        match self.behaviour.lock().clone() {
            OpenBehaviour::Ready(duration) => {
                let _ = events.send(PlayerEvent::Ready { item, duration });
            }
            OpenBehaviour::Fail(reason) => {
                let _ = events.send(PlayerEvent::Failed { item, reason });
            }
            OpenBehaviour::Silent => {}
        }
        *self.events.lock() = Some(events);
        *self.position.lock() = 0.0;
        Ok(())
    }

    async fn play(&self, _item: PlayerItemId) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self, _item: PlayerItemId) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, item: PlayerItemId, position: f64, token: u64) -> BridgeResult<()> {
        self.seeks.lock().push(position);
        *self.position.lock() = position;
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(PlayerEvent::SeekCompleted {
                item,
                token,
                finished: true,
            });
        }
        Ok(())
    }

    async fn current_time(&self, _item: PlayerItemId) -> BridgeResult<f64> {
        Ok(*self.position.lock())
    }

    async fn release(&self, _item: PlayerItemId) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SilentNowPlaying;

impl NowPlayingCenter for SilentNowPlaying {
    fn publish(&self, _info: NowPlayingInfo) -> BridgeResult<()> {
        Ok(())
    }

    fn clear(&self) -> BridgeResult<()> {
        Ok(())
    }
}

mock! {
    pub Fetcher {}

    #[async_trait]
    impl FeedFetcher for Fetcher {
        async fn fetch(&self, url: &str) -> core_cache::Result<FeedResult>;
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct TestService {
    service: CoreService,
    root: PathBuf,
}

impl Drop for TestService {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

async fn start(player: Arc<ScriptedPlayer>) -> TestService {
    let root = std::env::temp_dir().join(format!("core-service-it-{}", Uuid::new_v4()));
    let config = CoreConfig::builder()
        .cache_dir(root.join("cache"))
        .data_dir(root.join("data"))
        .file_system(Arc::new(TokioFileSystem::with_directories(
            root.join("cache"),
            root.join("data"),
        )))
        .settings_store(Arc::new(SqliteSettingsStore::in_memory().await.unwrap()))
        .http_client(Arc::new(ReqwestHttpClient::new()))
        .clock(Arc::new(ManualClock::default()))
        .auto_download_on_play(false)
        .build()
        .unwrap();

    let service = CoreService::bootstrap(config, player, Arc::new(SilentNowPlaying))
        .await
        .unwrap();
    TestService { service, root }
}

fn request(id: &str) -> LoadRequest {
    LoadRequest {
        asset_id: AssetId::new(id),
        title: format!("Episode {id}"),
        collection_title: "Show".to_string(),
        collection_id: "show-1".to_string(),
        source_url: format!("https://cdn.example.com/{id}.mp3"),
        autoplay: false,
        start_at: None,
    }
}

fn feed(url: &str) -> FeedResult {
    FeedResult {
        id: "show-1".to_string(),
        title: "Show".to_string(),
        collection_title: "Show".to_string(),
        source_url: url.to_string(),
        episodes: vec![FeedEpisode {
            id: "guid-1".to_string(),
            title: "Pilot".to_string(),
            audio_url: Some(" https://cdn.example.com/pilot.mp3 ".to_string()),
            image_url: None,
            pub_date: None,
            duration: Some(1800.0),
        }],
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn load_resolves_once_the_player_is_ready() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player.clone()).await;
    let engine = test.service.engine();
    let mut events = test.service.subscribe_events();

    let outcome = engine.load(request("ep-1")).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(snapshot.duration, 600.0);
    assert!(snapshot.presented);

    let ready = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(CoreEvent::Playback(PlaybackEvent::Ready { asset_id, .. })) =
                events.recv().await
            {
                return asset_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(ready, "ep-1");

    assert_eq!(
        engine.load(request("ep-1")).await.unwrap(),
        LoadOutcome::AlreadyLoaded
    );
}

#[tokio::test]
async fn listening_position_survives_stop_and_reload() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player.clone()).await;
    let engine = test.service.engine();
    let ep1 = AssetId::new("ep-1");

    engine.load(request("ep-1")).await.unwrap();
    engine.play().await.unwrap();
    engine.seek(300.0).await.unwrap();
    engine.pause().await.unwrap();
    assert_eq!(engine.playback_position(ep1.clone()).await.unwrap(), Some(300.0));

    engine.stop().await.unwrap();
    assert_eq!(engine.snapshot().state, SessionState::Idle);
    assert!(!engine.snapshot().presented);

    engine.load(request("ep-1")).await.unwrap();
    assert_eq!(player.last_seek(), Some(300.0));
    assert_eq!(engine.snapshot().current_time, 300.0);
}

#[tokio::test]
async fn player_failure_rejects_the_load() {
    let player = ScriptedPlayer::new(OpenBehaviour::Fail("unsupported codec".to_string()));
    let test = start(player).await;
    let engine = test.service.engine();

    let err = engine.load(request("ep-1")).await.unwrap_err();
    match err {
        CoreError::Playback(PlaybackError::DecodeFailure(message)) => {
            assert_eq!(message, "Playback failed: unsupported codec");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.snapshot().state, SessionState::Failed);
}

#[tokio::test]
async fn stopping_supersedes_a_pending_load() {
    let player = ScriptedPlayer::new(OpenBehaviour::Silent);
    let test = start(player).await;
    let engine = test.service.engine().clone();

    let pending = tokio::spawn({
        let engine = engine.clone();
        async move { engine.load(request("ep-1")).await }
    });

    let mut snapshots = engine.subscribe();
    tokio::time::timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.state == SessionState::Loading),
    )
    .await
    .unwrap()
    .unwrap();

    engine.stop().await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(
        result,
        Err(CoreError::Playback(PlaybackError::LoadSuperseded))
    ));
}

#[tokio::test]
async fn recently_played_defaults_to_three_newest() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player).await;
    let engine = test.service.engine();

    for id in ["a", "b", "c", "d"] {
        engine.load(request(id)).await.unwrap();
    }

    let recent = engine.recently_played(None).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|item| item.asset_id.as_str()).collect();
    assert_eq!(ids, vec!["d", "c", "b"]);

    engine.remove_from_history(AssetId::new("d")).await.unwrap();
    assert!(engine
        .history_item(AssetId::new("d"))
        .await
        .unwrap()
        .is_none());

    engine.clear_history().await.unwrap();
    assert!(engine.recently_played(Some(10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn download_queries_for_unknown_assets() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player).await;
    let engine = test.service.engine();
    let id = AssetId::new("ep-9");

    assert!(!engine.cancel_download(id.clone()).await.unwrap());
    assert_eq!(engine.download_state(id.clone()).await.unwrap(), None);
    assert!(!engine.is_downloaded(id.clone()).await.unwrap());
    assert!(engine.download_metadata(id.clone()).await.unwrap().is_none());
    assert!(engine.active_downloads().await.unwrap().is_empty());
    assert!(engine.downloaded_assets().await.unwrap().is_empty());
    engine.delete_download(id).await.unwrap();
}

#[tokio::test]
async fn feeds_are_cached_until_refreshed() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player).await;

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(2)
        .returning(|url| Ok(feed(url)));
    let feeds = test.service.feeds(Arc::new(fetcher));
    let url = "https://feeds.example.com/show.xml";

    let first = feeds.feed(url).await.unwrap();
    let second = feeds.feed(url).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.episodes[0].asset_id(),
        AssetId::new("https://cdn.example.com/pilot.mp3")
    );

    feeds.refresh(url).await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_the_engine() {
    let player = ScriptedPlayer::new(OpenBehaviour::Ready(600.0));
    let test = start(player).await;
    let engine = test.service.engine().clone();

    engine.load(request("ep-1")).await.unwrap();
    test.service.shutdown().await;

    assert!(matches!(engine.play().await, Err(CoreError::EngineStopped)));
    test.service.shutdown().await;
}
