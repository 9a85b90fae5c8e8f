use crate::model::Track;
use crate::player::state::GuildState;
use crate::player::transport::{AudioTransport, PlaybackId, TransportError};
use serenity::all::ChannelId;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_VOLUME_PERCENT: u8 = 50;
const MAX_VOLUME_PERCENT: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlaybackStatus {
    Idle,
    Playing,
    Paused,
}

/// Bumped whenever the guild is stopped, so work started before that can be recognized as stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Epoch(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Volume(u8);

impl Volume {
    pub(crate) fn percent(self) -> u8 {
        self.0
    }

    fn gain(self) -> f32 {
        f32::from(self.0) / f32::from(MAX_VOLUME_PERCENT)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(DEFAULT_VOLUME_PERCENT)
    }
}

impl TryFrom<i64> for Volume {
    type Error = ControlError;

    fn try_from(percent: i64) -> Result<Self, Self::Error> {
        u8::try_from(percent)
            .ok()
            .filter(|percent| *percent <= MAX_VOLUME_PERCENT)
            .map(Self)
            .ok_or(ControlError::InvalidVolume(percent))
    }
}

#[derive(Error, Debug)]
pub(crate) enum ControlError {
    #[error("nothing is playing")]
    NotPlaying,
    #[error("the playback is not paused")]
    NotPaused,
    #[error("the volume {0} is not between 0 and 100")]
    InvalidVolume(i64),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Something the guild's text channel should be told about.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Notice {
    NowPlaying(Track),
    PlaybackFailed { title: String, reason: String },
    SearchingRecommendation,
    RecommendationAdded(Track),
    NoRecommendationFound,
    Disconnected,
}

#[derive(Debug, PartialEq)]
pub(crate) struct RecommendationRequest {
    pub(crate) seed: Track,
    pub(crate) epoch: Epoch,
}

/// What a transition asks its caller to do once the guild lock is released.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Outcome {
    pub(crate) notices: Vec<Notice>,
    pub(crate) recommendation: Option<RecommendationRequest>,
}

impl Outcome {
    fn notice(notice: Notice) -> Self {
        Self {
            notices: vec![notice],
            recommendation: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum Played {
    Started(Track),
    Queued { track: Track, position: usize },
    Failed { track: Track, reason: String },
    /// The guild was stopped while the track was being resolved.
    Discarded(Track),
}

/// The playback state machine of one guild.
pub(crate) struct Sequencer {
    state: GuildState,
    status: PlaybackStatus,
    transport: Option<Box<dyn AudioTransport>>,
    playback_id: PlaybackId,
    epoch: Epoch,
    volume: Volume,
    /// A recommendation search of the current epoch has not been committed yet.
    recommendation_pending: bool,
}

impl Sequencer {
    pub(crate) fn new() -> Self {
        Self {
            state: GuildState::default(),
            status: PlaybackStatus::Idle,
            transport: None,
            playback_id: PlaybackId::default(),
            epoch: Epoch::default(),
            volume: Volume::default(),
            recommendation_pending: false,
        }
    }

    pub(crate) fn state(&self) -> &GuildState {
        &self.state
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub(crate) fn epoch(&self) -> Epoch {
        self.epoch
    }

    #[cfg(test)]
    pub(crate) fn volume(&self) -> Volume {
        self.volume
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    pub(crate) fn voice_channel_id(&self) -> Option<ChannelId> {
        self.transport
            .as_ref()
            .map(|transport| transport.voice_channel_id())
    }

    pub(crate) async fn is_connected(&self) -> bool {
        match &self.transport {
            None => false,
            Some(transport) => transport.is_connected().await,
        }
    }

    /// Plays through a new voice connection, dropping any previous one along with the playback.
    pub(crate) fn attach(&mut self, transport: Box<dyn AudioTransport>) {
        if self.transport.is_some() {
            self.stop();
        }
        self.transport = Some(transport);
    }

    /// Starts the track when nothing is playing, queues it otherwise.
    pub(crate) async fn play(&mut self, track: Track, epoch: Epoch) -> (Played, Outcome) {
        if epoch != self.epoch {
            debug!("discarding {} resolved before a stop", track.title);
            return (Played::Discarded(track), Outcome::default());
        }

        if self.status != PlaybackStatus::Idle {
            self.state.enqueue(track.clone());
            let position = self.state.queue().len();
            return (Played::Queued { track, position }, Outcome::default());
        }

        match self.begin(&track).await {
            Ok(()) => (Played::Started(track), Outcome::default()),
            Err(error) => {
                warn!("could not start {}: {error}", track.title);
                let outcome = self.advance(None, Outcome::default()).await;
                let reason = error.to_string();
                (Played::Failed { track, reason }, outcome)
            }
        }
    }

    pub(crate) fn pause(&mut self) -> Result<(), ControlError> {
        if self.status != PlaybackStatus::Playing {
            return Err(ControlError::NotPlaying);
        }
        self.transport_mut()?.pause()?;
        self.status = PlaybackStatus::Paused;
        Ok(())
    }

    pub(crate) fn resume(&mut self) -> Result<(), ControlError> {
        if self.status != PlaybackStatus::Paused {
            return Err(ControlError::NotPaused);
        }
        self.transport_mut()?.resume()?;
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    /// Halts the current track. Advancing is left to its completion, exactly as if it had ended.
    pub(crate) fn skip(&mut self) -> Result<(), ControlError> {
        if self.status == PlaybackStatus::Idle {
            return Err(ControlError::NotPlaying);
        }
        self.transport_mut()?.halt();
        Ok(())
    }

    pub(crate) fn stop(&mut self) {
        self.state.reset();
        self.status = PlaybackStatus::Idle;
        self.epoch = Epoch(self.epoch.0 + 1);
        self.recommendation_pending = false;
        if let Some(transport) = self.transport.as_mut() {
            transport.halt();
        }
    }

    pub(crate) fn set_volume(&mut self, percent: i64) -> Result<Volume, ControlError> {
        if self.status == PlaybackStatus::Idle {
            return Err(ControlError::NotPlaying);
        }
        let volume = Volume::try_from(percent)?;
        self.transport_mut()?.set_volume(volume.gain())?;
        self.volume = volume;
        Ok(volume)
    }

    /// Turns radio mode on; with nothing queued a recommendation is searched for right away.
    pub(crate) fn enable_radio(&mut self) -> Result<Option<RecommendationRequest>, ControlError> {
        if self.status == PlaybackStatus::Idle {
            return Err(ControlError::NotPlaying);
        }
        self.state.set_radio(true);

        if !self.state.queue().is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .current_track()
            .cloned()
            .and_then(|seed| self.request_recommendation(seed)))
    }

    pub(crate) fn disable_radio(&mut self) {
        self.state.set_radio(false);
    }

    pub(crate) async fn on_track_ended(
        &mut self,
        playback_id: PlaybackId,
        failure: Option<String>,
    ) -> Outcome {
        if self.status == PlaybackStatus::Idle || playback_id != self.playback_id {
            debug!("ignoring the completion of the stale playback {playback_id:?}");
            return Outcome::default();
        }

        let finished = self.state.current_track().cloned();
        let mut outcome = Outcome::default();
        if let (Some(reason), Some(track)) = (failure, &finished) {
            outcome.notices.push(Notice::PlaybackFailed {
                title: track.title.clone(),
                reason,
            });
        }

        self.advance(finished, outcome).await
    }

    pub(crate) async fn commit_recommendation(
        &mut self,
        epoch: Epoch,
        recommended: Option<Track>,
    ) -> Outcome {
        if epoch != self.epoch {
            debug!("discarding a recommendation searched before a stop");
            return Outcome::default();
        }
        self.recommendation_pending = false;

        let Some(track) = recommended else {
            return Outcome::notice(Notice::NoRecommendationFound);
        };

        self.state.enqueue(track.clone());
        let outcome = Outcome::notice(Notice::RecommendationAdded(track));
        if self.status != PlaybackStatus::Idle {
            return outcome;
        }
        self.advance(None, outcome).await
    }

    /// Forgets the playback after the voice connection was lost.
    pub(crate) fn disconnect(&mut self) {
        self.stop();
        self.transport = None;
    }

    pub(crate) async fn leave(&mut self) {
        self.stop();
        if let Some(mut transport) = self.transport.take() {
            transport.leave().await;
        }
    }

    /// Plays the next queued track, or asks for a recommendation seeded by `finished` in radio
    /// mode. Tracks that fail to start are skipped.
    async fn advance(&mut self, finished: Option<Track>, mut outcome: Outcome) -> Outcome {
        self.state.set_current(None);
        self.status = PlaybackStatus::Idle;

        while let Some(next) = self.state.dequeue_next() {
            match self.begin(&next).await {
                Ok(()) => {
                    outcome.notices.push(Notice::NowPlaying(next));
                    return outcome;
                }
                Err(error) => {
                    warn!("could not start {}: {error}", next.title);
                    outcome.notices.push(Notice::PlaybackFailed {
                        title: next.title,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if self.state.radio_enabled() {
            outcome.recommendation = finished.and_then(|seed| self.request_recommendation(seed));
        }
        outcome
    }

    /// At most one search runs at a time; its result restarts an idle guild.
    fn request_recommendation(&mut self, seed: Track) -> Option<RecommendationRequest> {
        if self.recommendation_pending {
            debug!("a recommendation is already being searched for");
            return None;
        }
        self.recommendation_pending = true;
        Some(RecommendationRequest {
            seed,
            epoch: self.epoch,
        })
    }

    async fn begin(&mut self, track: &Track) -> Result<(), TransportError> {
        let playback_id = self.playback_id.next();
        self.playback_id = playback_id;
        self.transport
            .as_mut()
            .ok_or(TransportError::NotConnected)?
            .start(track, self.volume.gain(), playback_id)
            .await?;

        self.state.record_history(track.title.clone());
        self.state.set_current(Some(track.clone()));
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Box<dyn AudioTransport>, TransportError> {
        self.transport.as_mut().ok_or(TransportError::NotConnected)
    }
}
