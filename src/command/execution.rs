use crate::command::{Action, Command};
use crate::embed::ChannelNotifier;
use crate::model::Track;
use crate::player::voice::SongbirdTransport;
use crate::player::{self, PlaybackStatus, Played, Player, Volume};
use crate::query::{ResolutionError, Resolver};
use crate::recommendation::Recommender;
use serenity::all::{ChannelId, Context, GuildId};
use songbird::error::JoinError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    UserCaused(#[from] UserCausedError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Error, Debug)]
pub(crate) enum UserCausedError {
    #[error("the author is not in a voice channel")]
    UserNotInVoiceChannel,
    #[error("the author is in a different voice channel than the bot")]
    UserInDifferentVoiceChannel,
    #[error("the bot is not in a voice channel")]
    BotNotInVoiceChannel,
    #[error("the bot is already in a voice channel")]
    AlreadyConnected,
    #[error("could not join the voice channel: {0}")]
    CouldNotJoin(JoinError),
    #[error("nothing is playing")]
    NotPlaying,
    #[error("the playback is not paused")]
    NotPaused,
    #[error("the volume {0} is not between 0 and 100")]
    InvalidVolume(i64),
    #[error("nothing was found")]
    NotFound,
}

#[derive(Error, Debug)]
pub(crate) enum InternalError {
    #[error("the songbird client is not registered")]
    SongbirdClientRetrieval,
    #[error(transparent)]
    Resolution(ResolutionError),
    #[error(transparent)]
    Transport(player::TransportError),
}

impl From<player::ControlError> for Error {
    fn from(control_error: player::ControlError) -> Self {
        match control_error {
            player::ControlError::NotPlaying => UserCausedError::NotPlaying.into(),
            player::ControlError::NotPaused => UserCausedError::NotPaused.into(),
            player::ControlError::InvalidVolume(volume) => {
                UserCausedError::InvalidVolume(volume).into()
            }
            player::ControlError::Transport(error) => InternalError::Transport(error).into(),
        }
    }
}

impl From<ResolutionError> for Error {
    fn from(resolution_error: ResolutionError) -> Self {
        match resolution_error {
            ResolutionError::NotFound => UserCausedError::NotFound.into(),
            error => InternalError::Resolution(error).into(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Executed {
    Join(ChannelId),
    Leave,
    Play(Played),
    Pause,
    Resume,
    Skip,
    Stop,
    Radio(bool),
    RadioStatus(bool),
    Queue(Vec<Track>),
    /// Newest first.
    History(Vec<String>),
    Volume(Volume),
    NowPlaying { track: Track, paused: bool },
    Help { prefix: String },
}

/// Runs commands against the player of their guild, creating it on first use.
pub(crate) struct Executor {
    http_client: reqwest::Client,
    resolver: Arc<dyn Resolver>,
    recommender: Arc<Recommender>,
    players: Mutex<HashMap<GuildId, Arc<Player>>>,
    prefix: String,
}

impl Executor {
    pub(crate) fn new(
        http_client: reqwest::Client,
        resolver: Arc<dyn Resolver>,
        prefix: String,
    ) -> Self {
        Self {
            http_client,
            recommender: Arc::new(Recommender::new(resolver.clone())),
            resolver,
            players: Mutex::new(HashMap::new()),
            prefix,
        }
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) async fn execute(
        &self,
        context: &Context,
        command: Command,
    ) -> Result<Executed, Error> {
        let player = self.player(context, command.guild_id).await;
        player.set_text_channel_id(command.text_channel_id).await;

        match (&command.action, player.is_attached().await) {
            (Action::Join, true) => Err(UserCausedError::AlreadyConnected)?,
            (Action::Join | Action::Play { .. }, false) => {
                let voice_channel_id = command
                    .voice_channel_id
                    .ok_or(UserCausedError::UserNotInVoiceChannel)?;
                self.join(context, &player, command.guild_id, voice_channel_id)
                    .await?;
                if command.action == Action::Join {
                    return Ok(Executed::Join(voice_channel_id));
                }
            }
            _ => (),
        }

        self.perform(&player, command.action, command.voice_channel_id)
            .await
    }

    async fn player(&self, context: &Context, guild_id: GuildId) -> Arc<Player> {
        self.players
            .lock()
            .await
            .entry(guild_id)
            .or_insert_with(|| {
                Player::new(
                    guild_id,
                    self.recommender.clone(),
                    Arc::new(ChannelNotifier::new(context.http.clone())),
                )
            })
            .clone()
    }

    async fn join(
        &self,
        context: &Context,
        player: &Player,
        guild_id: GuildId,
        voice_channel_id: ChannelId,
    ) -> Result<(), Error> {
        let manager = songbird::get(context)
            .await
            .ok_or(InternalError::SongbirdClientRetrieval)?;

        let transport = SongbirdTransport::join(
            &manager,
            self.http_client.clone(),
            guild_id,
            voice_channel_id,
            player.events(),
        )
        .await
        .map_err(UserCausedError::CouldNotJoin)?;
        player.attach(Box::new(transport)).await;

        info!("joined the voice channel {voice_channel_id} of guild {guild_id}");
        Ok(())
    }

    /// Runs an action against a player that is already connected where the action needs it.
    ///
    /// Actions controlling the playback are only accepted from the voice channel the bot is in.
    pub(crate) async fn perform(
        &self,
        player: &Arc<Player>,
        action: Action,
        author_voice_channel_id: Option<ChannelId>,
    ) -> Result<Executed, Error> {
        if action.controls_playback() {
            let author_voice_channel_id =
                author_voice_channel_id.ok_or(UserCausedError::UserNotInVoiceChannel)?;
            match player.voice_channel_id().await {
                None => Err(UserCausedError::BotNotInVoiceChannel)?,
                Some(voice_channel_id) if voice_channel_id != author_voice_channel_id => {
                    Err(UserCausedError::UserInDifferentVoiceChannel)?
                }
                Some(_) => (),
            }
        }

        Ok(match action {
            Action::Join => Err(UserCausedError::AlreadyConnected)?,
            Action::Leave => {
                player.leave().await;
                Executed::Leave
            }
            Action::Play { query } => {
                let epoch = player.epoch().await;
                let track = self.resolver.resolve(&query, true).await?;
                Executed::Play(player.play(track, epoch).await)
            }
            Action::Pause => {
                player.pause().await?;
                Executed::Pause
            }
            Action::Resume => {
                player.resume().await?;
                Executed::Resume
            }
            Action::Skip => {
                player.skip().await?;
                Executed::Skip
            }
            Action::Stop => {
                player.stop().await;
                Executed::Stop
            }
            Action::Radio(None) => Executed::RadioStatus(player.snapshot().await.radio_enabled),
            Action::Radio(Some(true)) => {
                player.enable_radio().await?;
                Executed::Radio(true)
            }
            Action::Radio(Some(false)) => {
                player.disable_radio().await;
                Executed::Radio(false)
            }
            Action::Queue => Executed::Queue(player.snapshot().await.queue),
            Action::History => {
                let mut history = player.snapshot().await.history;
                history.reverse();
                Executed::History(history)
            }
            Action::Volume(percent) => Executed::Volume(player.set_volume(percent).await?),
            Action::NowPlaying => {
                let snapshot = player.snapshot().await;
                Executed::NowPlaying {
                    track: snapshot.current_track.ok_or(UserCausedError::NotPlaying)?,
                    paused: snapshot.status == PlaybackStatus::Paused,
                }
            }
            Action::Help => Executed::Help {
                prefix: self.prefix.clone(),
            },
        })
    }
}
