use crate::command::{self, FromMessageError, InternalError, ParseError, UserCausedError};
use crate::model::Track;
use crate::player::{Notice, Notifier, Played};
use serenity::all::{ChannelId, Http, Mentionable};
use serenity::async_trait;
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::model::Color;
use std::sync::Arc;
use tracing::warn;

const QUEUE_VIEW_MAX_TRACKS: usize = 10;
const HISTORY_VIEW_MAX_TRACKS: usize = 10;
const TITLE_MAX_CHARS: usize = 50;
const TITLE_ELLIPSIS: &str = "...";

pub(crate) fn error(title: impl Into<String>, description: impl Into<String>) -> CreateEmbed {
    base(title).description(description).color(Color::RED)
}

pub(crate) fn base(title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::new()
        .footer(CreateEmbedFooter::new(format!("Radiola v{}", crate::VERSION)))
        .title(title)
        .color(Color::BLURPLE)
}

fn track(title: &str, track: &Track) -> CreateEmbed {
    let mut embed = base(title)
        .description(format!("**{}**", track.title))
        .color(Color::DARK_GREEN);
    if let Some(uploader) = &track.uploader {
        embed = embed.field("Uploader", uploader, true);
    }
    if let Some(duration) = track.formatted_duration() {
        embed = embed.field("Duration", duration.to_string(), true);
    }
    if let Some(view_count) = track.view_count {
        embed = embed.field("Views", view_count.to_string(), true);
    }
    if let Some(like_count) = track.like_count {
        embed = embed.field("Likes", like_count.to_string(), true);
    }
    if let Some(page_url) = &track.page_url {
        embed = embed.url(page_url);
    }
    match &track.thumbnail_url {
        None => embed,
        Some(thumbnail_url) => embed.thumbnail(thumbnail_url),
    }
}

/// Shortens a title to at most [`TITLE_MAX_CHARS`] characters.
pub(crate) fn truncate_title(title: &str) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_owned();
    }

    let kept: String = title
        .chars()
        .take(TITLE_MAX_CHARS - TITLE_ELLIPSIS.len())
        .collect();
    kept + TITLE_ELLIPSIS
}

pub(crate) fn queue_description(queue: &[Track]) -> String {
    let mut description = queue
        .iter()
        .take(QUEUE_VIEW_MAX_TRACKS)
        .enumerate()
        .map(|(index, track)| format!("{}. {}", index + 1, truncate_title(&track.title)))
        .collect::<Vec<_>>()
        .join("\n");

    if queue.len() > QUEUE_VIEW_MAX_TRACKS {
        description.push_str(&format!(
            "\n*and {} more*",
            queue.len() - QUEUE_VIEW_MAX_TRACKS
        ));
    }
    description
}

/// Expects the history newest first.
pub(crate) fn history_description(history: &[String]) -> String {
    history
        .iter()
        .take(HISTORY_VIEW_MAX_TRACKS)
        .enumerate()
        .map(|(index, title)| format!("{}. {}", index + 1, truncate_title(title)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn help_description(prefix: &str) -> String {
    [
        ("join", "joins your voice channel"),
        ("leave", "leaves the voice channel and clears the queue"),
        ("play <link or search>", "plays a track or adds it to the queue"),
        ("pause", "pauses the playback"),
        ("resume", "resumes the playback"),
        ("skip", "skips the current track"),
        ("stop", "stops the playback and clears the queue"),
        ("radio [on|off]", "shows or switches the radio mode"),
        ("queue", "shows the queue"),
        ("history", "shows the recently played tracks"),
        ("volume <0-100>", "sets the volume"),
        ("now", "shows the current track"),
        ("help", "shows this list"),
    ]
    .iter()
    .map(|(usage, effect)| format!("`{prefix}{usage}` {effect}"))
    .collect::<Vec<_>>()
    .join("\n")
}

pub(crate) fn notice(notice: Notice) -> CreateEmbed {
    match notice {
        Notice::NowPlaying(now_playing) => track("Now playing", &now_playing),
        Notice::PlaybackFailed { title, reason } => error(
            "Playback failed",
            format!("Could not play **{title}**: {reason}"),
        ),
        Notice::SearchingRecommendation => {
            base("Radio").description("Searching for a similar track...")
        }
        Notice::RecommendationAdded(recommended) => {
            track("Radio added to the queue", &recommended)
        }
        Notice::NoRecommendationFound => {
            base("Radio").description("No similar track was found.")
        }
        Notice::Disconnected => error(
            "Disconnected",
            "The voice connection was lost, the queue has been cleared.",
        ),
    }
}

impl From<FromMessageError> for CreateEmbed {
    fn from(error: FromMessageError) -> Self {
        let description = match error {
            FromMessageError::NotInGuild => {
                "Commands can only be used in a server, not in direct messages.".to_owned()
            }
            FromMessageError::Parse(ParseError::MissingArgument { command, argument }) => {
                format!("The `{command}` command needs {argument}.")
            }
            FromMessageError::Parse(error) => format!("{}.", capitalize(&error.to_string())),
        };
        self::error("Invalid command", description)
    }
}

impl From<command::Error> for CreateEmbed {
    fn from(error: command::Error) -> Self {
        let user_caused_error = match error {
            command::Error::Internal(InternalError::Resolution(_)) => {
                return self::error("Error", "The search failed, please try again later.");
            }
            command::Error::Internal(_) => {
                return self::error("Error", "An error occurred while executing the command.");
            }
            command::Error::UserCaused(user_caused_error) => user_caused_error,
        };

        match user_caused_error {
            UserCausedError::UserNotInVoiceChannel => {
                self::error("Error", "You are not in a voice channel.")
            }
            UserCausedError::UserInDifferentVoiceChannel => {
                self::error("Error", "You need to be in the same voice channel as the bot.")
            }
            UserCausedError::BotNotInVoiceChannel => {
                self::error("Error", "The bot is not in a voice channel.")
            }
            UserCausedError::AlreadyConnected => {
                self::error("Error", "The bot is already in a voice channel.")
            }
            UserCausedError::CouldNotJoin(_) => {
                self::error("Error", "Could not join the voice channel.")
            }
            UserCausedError::NotPlaying => self::error("Error", "Nothing is playing right now."),
            UserCausedError::NotPaused => self::error("Error", "The playback is not paused."),
            UserCausedError::InvalidVolume(_) => {
                self::error("Error", "The volume must be between 0 and 100.")
            }
            UserCausedError::NotFound => {
                self::error("Not found", "Nothing was found for the given query.")
            }
        }
    }
}

impl From<command::Executed> for CreateEmbed {
    fn from(executed: command::Executed) -> Self {
        match executed {
            command::Executed::Join(voice_channel_id) => {
                base("Connected").description(format!("Joined {}.", voice_channel_id.mention()))
            }
            command::Executed::Leave => base("Disconnected").description("Left the voice channel."),
            command::Executed::Play(Played::Started(started)) => track("Now playing", &started),
            command::Executed::Play(Played::Queued { track: queued, position }) => {
                track(&format!("Added to the queue at position {position}"), &queued)
            }
            command::Executed::Play(Played::Failed { track, reason }) => error(
                "Playback failed",
                format!("Could not play **{}**: {reason}", track.title),
            ),
            command::Executed::Play(Played::Discarded(track)) => base("Stopped").description(
                format!("The playback was stopped before **{}** was found.", track.title),
            ),
            command::Executed::Pause => base("Paused").description("The playback is paused."),
            command::Executed::Resume => base("Resumed").description("The playback continues."),
            command::Executed::Skip => base("Skipped").description("The track was skipped."),
            command::Executed::Stop => {
                base("Stopped").description("The playback was stopped and the queue cleared.")
            }
            command::Executed::Radio(true) => base("Radio").description(
                "The radio mode is **on**, similar tracks will be added when the queue runs out.",
            ),
            command::Executed::Radio(false) => {
                base("Radio").description("The radio mode is **off**.")
            }
            command::Executed::RadioStatus(enabled) => base("Radio").description(format!(
                "The radio mode is **{}**.",
                if enabled { "on" } else { "off" }
            )),
            command::Executed::Queue(queue) if queue.is_empty() => {
                base("Queue").description("The queue is empty.")
            }
            command::Executed::Queue(queue) => base("Queue")
                .description(queue_description(&queue))
                .color(Color::BLUE),
            command::Executed::History(history) if history.is_empty() => {
                base("History").description("Nothing has been played yet.")
            }
            command::Executed::History(history) => base("History")
                .description(history_description(&history))
                .color(Color::PURPLE),
            command::Executed::Volume(volume) => {
                base("Volume").description(format!("The volume is set to {}%.", volume.percent()))
            }
            command::Executed::NowPlaying {
                track: now_playing,
                paused,
            } => track(if paused { "Paused" } else { "Now playing" }, &now_playing),
            command::Executed::Help { prefix } => {
                base("Commands").description(help_description(&prefix))
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Posts notices into a guild's text channel.
pub(crate) struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub(crate) fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, text_channel_id: ChannelId, notice: Notice) {
        if let Err(error) = text_channel_id
            .send_message(&self.http, CreateMessage::new().embed(self::notice(notice)))
            .await
        {
            warn!("could not send a notice to the channel {text_channel_id}: {error}");
        }
    }
}
