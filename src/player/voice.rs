use crate::model::{StreamHandle, Track};
use crate::player::{AudioTransport, GuildEvent, PlaybackId, TransportError};
use serenity::all::{ChannelId, GuildId};
use serenity::async_trait;
use songbird::error::JoinError;
use songbird::input::{File, Input, YoutubeDl};
use songbird::tracks::{PlayMode, Track as SongbirdTrack, TrackHandle};
use songbird::{Call, CoreEvent, Event, EventContext, EventHandler, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Plays tracks through a songbird call.
pub(crate) struct SongbirdTransport {
    http_client: reqwest::Client,
    voice_driver: Arc<Mutex<Call>>,
    voice_channel_id: ChannelId,
    track_handle: Option<TrackHandle>,
    events: mpsc::UnboundedSender<GuildEvent>,
}

impl SongbirdTransport {
    pub(crate) async fn join(
        manager: &Songbird,
        http_client: reqwest::Client,
        guild_id: GuildId,
        voice_channel_id: ChannelId,
        events: mpsc::UnboundedSender<GuildEvent>,
    ) -> Result<Self, JoinError> {
        let voice_driver = manager.join(guild_id, voice_channel_id).await?;

        {
            let mut call = voice_driver.lock().await;
            call.deafen(true).await?;
            call.remove_all_global_events();
            call.add_global_event(
                CoreEvent::DriverDisconnect.into(),
                VoiceDriverEventHandler::new(events.clone(), None),
            );
        }

        Ok(Self {
            http_client,
            voice_driver,
            voice_channel_id,
            track_handle: None,
            events,
        })
    }

    fn input(&self, track: &Track) -> Input {
        match &track.stream {
            StreamHandle::Remote(url) => {
                YoutubeDl::new(self.http_client.clone(), url.clone()).into()
            }
            StreamHandle::Local(path) => File::new(path.clone()).into(),
        }
    }
}

#[async_trait]
impl AudioTransport for SongbirdTransport {
    async fn start(
        &mut self,
        track: &Track,
        volume: f32,
        playback_id: PlaybackId,
    ) -> Result<(), TransportError> {
        let input = self.input(track);
        let mut voice_driver = self.voice_driver.lock().await;
        if voice_driver.current_connection().is_none() {
            return Err(TransportError::NotConnected);
        }

        // Older tracks are stopped here; their completions carry stale playback ids.
        let track_handle = voice_driver.play_only(SongbirdTrack::new(input).volume(volume));
        self.track_handle = Some(track_handle.clone());
        drop(voice_driver);

        let event_handler = VoiceDriverEventHandler::new(self.events.clone(), Some(playback_id));
        track_handle.add_event(TrackEvent::End.into(), event_handler.clone())?;
        track_handle.add_event(TrackEvent::Error.into(), event_handler)?;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        match &self.track_handle {
            None => Ok(()),
            Some(track_handle) => Ok(track_handle.pause()?),
        }
    }

    fn resume(&mut self) -> Result<(), TransportError> {
        match &self.track_handle {
            None => Ok(()),
            Some(track_handle) => Ok(track_handle.play()?),
        }
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), TransportError> {
        match &self.track_handle {
            None => Ok(()),
            Some(track_handle) => Ok(track_handle.set_volume(volume)?),
        }
    }

    fn halt(&mut self) {
        if let Some(track_handle) = self.track_handle.take() {
            if let Err(error) = track_handle.stop() {
                debug!("the halted track had already finished: {error}");
            }
        }
    }

    fn voice_channel_id(&self) -> ChannelId {
        self.voice_channel_id
    }

    async fn is_connected(&self) -> bool {
        self.voice_driver
            .lock()
            .await
            .current_connection()
            .is_some()
    }

    async fn leave(&mut self) {
        self.halt();

        let mut voice_driver = self.voice_driver.lock().await;
        voice_driver.remove_all_global_events();
        if let Err(error) = voice_driver.leave().await {
            warn!("could not leave the voice channel: {error}");
        }
    }
}

/// Forwards songbird events into the guild's player.
#[derive(Clone)]
struct VoiceDriverEventHandler {
    events: mpsc::UnboundedSender<GuildEvent>,
    /// Set for the events of one track.
    playback_id: Option<PlaybackId>,
}

impl VoiceDriverEventHandler {
    fn new(events: mpsc::UnboundedSender<GuildEvent>, playback_id: Option<PlaybackId>) -> Self {
        Self {
            events,
            playback_id,
        }
    }

    fn post(&self, event: GuildEvent) {
        if self.events.send(event).is_err() {
            debug!("the player is gone, dropping a voice event");
        }
    }
}

#[async_trait]
impl EventHandler for VoiceDriverEventHandler {
    async fn act(&self, context: &EventContext<'_>) -> Option<Event> {
        match (context, self.playback_id) {
            (EventContext::Track([(track_state, _), ..]), Some(playback_id)) => {
                let failure = match &track_state.playing {
                    PlayMode::Errored(error) => Some(error.to_string()),
                    _ => None,
                };
                self.post(GuildEvent::TrackEnded {
                    playback_id,
                    failure,
                });
                // One report per track.
                return Some(Event::Cancel);
            }
            (EventContext::DriverDisconnect(_), None) => self.post(GuildEvent::DriverDisconnected),
            _ => (),
        }
        None
    }
}
