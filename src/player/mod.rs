mod sequencer;
mod state;
mod transport;
pub(crate) mod voice;

use crate::model::Track;
use crate::recommendation::Recommender;
pub(crate) use sequencer::{
    ControlError, Epoch, Notice, Outcome, PlaybackStatus, Played, RecommendationRequest, Volume,
};
pub(crate) use transport::{AudioTransport, PlaybackId, TransportError};
use sequencer::Sequencer;
use serenity::all::{ChannelId, GuildId};
use serenity::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Duration;
use tracing::{debug, info, warn};

const DISCONNECT_STOP_TIMEOUT_DURATION: Duration = Duration::from_secs(1);

/// Posted into a guild's player from outside its lock.
#[derive(Debug)]
pub(crate) enum GuildEvent {
    TrackEnded {
        playback_id: PlaybackId,
        failure: Option<String>,
    },
    DriverDisconnected,
    /// Posted a while after [`GuildEvent::DriverDisconnected`].
    ReconnectWindowElapsed,
    Recommended {
        epoch: Epoch,
        track: Option<Track>,
    },
}

#[async_trait]
pub(crate) trait Notifier: Send + Sync + 'static {
    async fn notify(&self, text_channel_id: ChannelId, notice: Notice);
}

/// A read-only copy of a guild's playback.
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    pub(crate) status: PlaybackStatus,
    pub(crate) current_track: Option<Track>,
    pub(crate) queue: Vec<Track>,
    /// Oldest first.
    pub(crate) history: Vec<String>,
    pub(crate) radio_enabled: bool,
}

/// The serialized execution context of one guild.
///
/// Transitions happen under the sequencer lock. Transport callbacks and finished recommendation
/// searches arrive as [`GuildEvent`]s and are applied one at a time by a dedicated task.
pub(crate) struct Player {
    guild_id: GuildId,
    sequencer: Mutex<Sequencer>,
    events: mpsc::UnboundedSender<GuildEvent>,
    text_channel_id: RwLock<Option<ChannelId>>,
    recommender: Arc<Recommender>,
    notifier: Arc<dyn Notifier>,
}

impl Player {
    pub(crate) fn new(
        guild_id: GuildId,
        recommender: Arc<Recommender>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (events, receiver) = mpsc::unbounded_channel();
        let player = Arc::new(Self {
            guild_id,
            sequencer: Mutex::new(Sequencer::new()),
            events,
            text_channel_id: RwLock::new(None),
            recommender,
            notifier,
        });

        tokio::spawn(Self::handle_events(Arc::downgrade(&player), receiver));
        player
    }

    async fn handle_events(
        player: Weak<Self>,
        mut receiver: mpsc::UnboundedReceiver<GuildEvent>,
    ) {
        while let Some(event) = receiver.recv().await {
            let Some(player) = player.upgrade() else {
                break;
            };
            player.handle_event(event).await;
        }
    }

    async fn handle_event(self: &Arc<Self>, event: GuildEvent) {
        debug!("guild {} received {event:?}", self.guild_id);
        let outcome = match event {
            GuildEvent::TrackEnded {
                playback_id,
                failure,
            } => {
                self.sequencer
                    .lock()
                    .await
                    .on_track_ended(playback_id, failure)
                    .await
            }
            GuildEvent::Recommended { epoch, track } => {
                self.sequencer
                    .lock()
                    .await
                    .commit_recommendation(epoch, track)
                    .await
            }
            GuildEvent::DriverDisconnected => {
                // The driver reconnects on its own after short outages.
                let events = self.events.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(DISCONNECT_STOP_TIMEOUT_DURATION).await;
                    if events.send(GuildEvent::ReconnectWindowElapsed).is_err() {
                        debug!("the player was dropped while waiting for a reconnect");
                    }
                });
                return;
            }
            GuildEvent::ReconnectWindowElapsed => {
                let mut sequencer = self.sequencer.lock().await;
                if !sequencer.is_attached() || sequencer.is_connected().await {
                    return;
                }
                info!("guild {} lost its voice connection", self.guild_id);
                sequencer.disconnect();
                Outcome {
                    notices: vec![Notice::Disconnected],
                    recommendation: None,
                }
            }
        };

        self.apply(outcome).await;
    }

    /// Carries out the part of a transition that must not hold the lock.
    async fn apply(self: &Arc<Self>, outcome: Outcome) {
        for notice in outcome.notices {
            self.notify(notice).await;
        }

        if let Some(request) = outcome.recommendation {
            self.search_recommendation(request).await;
        }
    }

    async fn search_recommendation(&self, request: RecommendationRequest) {
        self.notify(Notice::SearchingRecommendation).await;

        let recommender = self.recommender.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let track = recommender.recommend(&request.seed).await;
            if events
                .send(GuildEvent::Recommended {
                    epoch: request.epoch,
                    track,
                })
                .is_err()
            {
                debug!("the player was dropped during a recommendation search");
            }
        });
    }

    async fn notify(&self, notice: Notice) {
        match *self.text_channel_id.read().await {
            None => warn!("guild {} has no text channel for {notice:?}", self.guild_id),
            Some(text_channel_id) => self.notifier.notify(text_channel_id, notice).await,
        }
    }

    pub(crate) fn events(&self) -> mpsc::UnboundedSender<GuildEvent> {
        self.events.clone()
    }

    pub(crate) async fn set_text_channel_id(&self, text_channel_id: ChannelId) {
        *self.text_channel_id.write().await = Some(text_channel_id);
    }

    pub(crate) async fn attach(&self, transport: Box<dyn AudioTransport>) {
        self.sequencer.lock().await.attach(transport);
    }

    pub(crate) async fn is_attached(&self) -> bool {
        self.sequencer.lock().await.is_attached()
    }

    /// The voice channel the guild plays in, if it is connected.
    pub(crate) async fn voice_channel_id(&self) -> Option<ChannelId> {
        self.sequencer.lock().await.voice_channel_id()
    }

    pub(crate) async fn epoch(&self) -> Epoch {
        self.sequencer.lock().await.epoch()
    }

    pub(crate) async fn play(self: &Arc<Self>, track: Track, epoch: Epoch) -> Played {
        let (played, outcome) = self.sequencer.lock().await.play(track, epoch).await;
        self.apply(outcome).await;
        played
    }

    pub(crate) async fn pause(&self) -> Result<(), ControlError> {
        self.sequencer.lock().await.pause()
    }

    pub(crate) async fn resume(&self) -> Result<(), ControlError> {
        self.sequencer.lock().await.resume()
    }

    pub(crate) async fn skip(&self) -> Result<(), ControlError> {
        self.sequencer.lock().await.skip()
    }

    pub(crate) async fn stop(&self) {
        self.sequencer.lock().await.stop();
    }

    pub(crate) async fn set_volume(&self, percent: i64) -> Result<Volume, ControlError> {
        self.sequencer.lock().await.set_volume(percent)
    }

    pub(crate) async fn enable_radio(self: &Arc<Self>) -> Result<(), ControlError> {
        let request = self.sequencer.lock().await.enable_radio()?;
        if let Some(request) = request {
            self.search_recommendation(request).await;
        }
        Ok(())
    }

    pub(crate) async fn disable_radio(&self) {
        self.sequencer.lock().await.disable_radio();
    }

    pub(crate) async fn leave(&self) {
        self.sequencer.lock().await.leave().await;
    }

    pub(crate) async fn snapshot(&self) -> Snapshot {
        let sequencer = self.sequencer.lock().await;
        let state = sequencer.state();
        Snapshot {
            status: sequencer.status(),
            current_track: state.current_track().cloned(),
            queue: state.queue().iter().cloned().collect(),
            history: state.history().iter().cloned().collect(),
            radio_enabled: state.radio_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{track, FakeTransport, RecordingNotifier, ScriptedResolver};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tokio::time::timeout;

    struct Fixture {
        player: Arc<Player>,
        transport: FakeTransport,
        notifier: Arc<RecordingNotifier>,
        resolver: Arc<ScriptedResolver>,
    }

    async fn fixture(
        recommendations: Vec<Result<Track, crate::query::ResolutionError>>,
    ) -> Fixture {
        let resolver = Arc::new(ScriptedResolver::new(recommendations));
        let recommender = Arc::new(Recommender::with_rng(
            resolver.clone(),
            StdRng::seed_from_u64(1),
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let player = Player::new(GuildId::new(1), recommender, notifier.clone());
        player.set_text_channel_id(ChannelId::new(2)).await;
        let transport = FakeTransport::reporting_to(player.events());
        player.attach(Box::new(transport.clone())).await;

        Fixture {
            player,
            transport,
            notifier,
            resolver,
        }
    }

    #[tokio::test]
    async fn natural_completion_plays_the_queue() {
        let fixture = fixture(vec![]).await;
        let epoch = fixture.player.epoch().await;
        fixture.player.play(track("A"), epoch).await;
        fixture.player.play(track("B"), epoch).await;

        fixture.transport.finish();

        assert_eq!(
            fixture.notifier.next().await,
            Notice::NowPlaying(track("B"))
        );
        let snapshot = fixture.player.snapshot().await;
        assert_eq!(snapshot.current_track, Some(track("B")));
        assert!(snapshot.queue.is_empty());
        assert_eq!(snapshot.history, ["A", "B"]);
    }

    #[tokio::test]
    async fn radio_extends_an_empty_queue() {
        let fixture = fixture(vec![Ok(track("Y"))]).await;
        fixture.player.play(track("X"), fixture.player.epoch().await).await;
        fixture.player.enable_radio().await.unwrap();
        assert_eq!(
            fixture.notifier.next().await,
            Notice::SearchingRecommendation
        );
        assert_eq!(
            fixture.notifier.next().await,
            Notice::RecommendationAdded(track("Y"))
        );
        assert_eq!(fixture.player.snapshot().await.queue, [track("Y")]);

        fixture.transport.finish();

        assert_eq!(
            fixture.notifier.next().await,
            Notice::NowPlaying(track("Y"))
        );
        assert_eq!(fixture.resolver.queries(), ["X similar songs"]);
    }

    #[tokio::test]
    async fn skip_with_radio_and_failed_search_goes_idle() {
        let fixture = fixture(vec![Err(crate::query::ResolutionError::NotFound)]).await;
        fixture.player.play(track("X"), fixture.player.epoch().await).await;
        fixture.player.play(track("Q"), fixture.player.epoch().await).await;
        fixture.player.enable_radio().await.unwrap();

        fixture.player.skip().await.unwrap();
        assert_eq!(
            fixture.notifier.next().await,
            Notice::NowPlaying(track("Q"))
        );
        fixture.player.skip().await.unwrap();

        assert_eq!(
            fixture.notifier.next().await,
            Notice::SearchingRecommendation
        );
        assert_eq!(
            fixture.notifier.next().await,
            Notice::NoRecommendationFound
        );
        let snapshot = fixture.player.snapshot().await;
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
        assert_eq!(snapshot.current_track, None);
        assert!(snapshot.queue.is_empty());
        assert_eq!(fixture.resolver.queries(), ["Q similar songs"]);
    }

    #[tokio::test]
    async fn stop_ignores_the_completion_it_causes() {
        let fixture = fixture(vec![]).await;
        let epoch = fixture.player.epoch().await;
        fixture.player.play(track("A"), epoch).await;
        fixture.player.play(track("B"), epoch).await;

        fixture.player.stop().await;
        fixture.player.play(track("C"), fixture.player.epoch().await).await;

        let snapshot = fixture.player.snapshot().await;
        assert_eq!(snapshot.current_track, Some(track("C")));
        assert!(snapshot.queue.is_empty());
        assert!(fixture.notifier.is_quiet().await);
    }

    #[tokio::test]
    async fn completions_are_not_held_up_by_a_disconnect_check() {
        let fixture = fixture(vec![]).await;
        fixture.player.play(track("A"), fixture.player.epoch().await).await;
        fixture.player.play(track("B"), fixture.player.epoch().await).await;

        fixture
            .player
            .events()
            .send(GuildEvent::DriverDisconnected)
            .unwrap();
        fixture.transport.finish();

        let notice = timeout(Duration::from_millis(500), fixture.notifier.next())
            .await
            .expect("the completion waited for the disconnect check");
        assert_eq!(notice, Notice::NowPlaying(track("B")));

        // Still connected, so the check changes nothing.
        tokio::time::sleep(DISCONNECT_STOP_TIMEOUT_DURATION).await;
        assert!(fixture.notifier.is_quiet().await);
        assert!(fixture.player.is_attached().await);
        assert_eq!(
            fixture.player.snapshot().await.current_track,
            Some(track("B"))
        );
    }

    #[tokio::test]
    async fn lost_connection_resets_the_guild() {
        let fixture = fixture(vec![]).await;
        fixture.player.play(track("A"), fixture.player.epoch().await).await;
        fixture.player.play(track("B"), fixture.player.epoch().await).await;

        fixture.transport.disconnect();
        fixture
            .player
            .events()
            .send(GuildEvent::DriverDisconnected)
            .unwrap();

        assert_eq!(fixture.notifier.next().await, Notice::Disconnected);
        let snapshot = fixture.player.snapshot().await;
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
        assert!(snapshot.queue.is_empty());
        assert_eq!(snapshot.history, ["A"]);
        assert!(!fixture.player.is_attached().await);
    }
}
