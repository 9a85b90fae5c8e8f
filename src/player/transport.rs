use crate::model::Track;
use serenity::all::ChannelId;
use serenity::async_trait;
use thiserror::Error;

/// Identifies one start of a track, so completions of earlier tracks can be told apart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct PlaybackId(pub(crate) u64);

impl PlaybackId {
    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Error, Debug)]
pub(crate) enum TransportError {
    #[error("not connected to a voice channel")]
    NotConnected,
    #[error("could not control the track: {0}")]
    Control(#[from] songbird::error::ControlError),
}

/// The voice connection audio is played through.
///
/// Every started track must be reported back exactly once as ended, including when it is
/// halted.
#[async_trait]
pub(crate) trait AudioTransport: Send + Sync {
    /// Replaces whatever is playing. `volume` is a gain in `0.0..=1.0`.
    async fn start(
        &mut self,
        track: &Track,
        volume: f32,
        playback_id: PlaybackId,
    ) -> Result<(), TransportError>;

    fn pause(&mut self) -> Result<(), TransportError>;

    fn resume(&mut self) -> Result<(), TransportError>;

    fn set_volume(&mut self, volume: f32) -> Result<(), TransportError>;

    fn halt(&mut self);

    /// The voice channel the audio is played in.
    fn voice_channel_id(&self) -> ChannelId;

    async fn is_connected(&self) -> bool;

    async fn leave(&mut self);
}
