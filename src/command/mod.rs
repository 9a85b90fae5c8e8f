mod execution;

pub(crate) use execution::*;
use serenity::all::{ChannelId, Context, GuildId, Message};
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Action {
    Join,
    Leave,
    Play { query: String },
    Pause,
    Resume,
    Skip,
    Stop,
    /// `None` asks for the current setting.
    Radio(Option<bool>),
    Queue,
    History,
    Volume(i64),
    NowPlaying,
    Help,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum ParseError {
    #[error("the message is not a command")]
    NotCommand,
    #[error("there is no command named {0:?}")]
    UnknownCommand(String),
    #[error("the {command} command needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("{argument:?} is not a valid argument of the {command} command")]
    InvalidArgument {
        command: &'static str,
        argument: String,
    },
}

impl FromStr for Action {
    type Err = ParseError;

    /// Parses the text following the command prefix.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (name, arguments) = match text.split_once(char::is_whitespace) {
            None => (text, ""),
            Some((name, arguments)) => (name, arguments.trim()),
        };
        if name.is_empty() {
            return Err(ParseError::NotCommand);
        }

        let name = name.to_lowercase();
        Ok(match name.as_str() {
            "join" | "connect" => Self::Join,
            "leave" | "disconnect" => Self::Leave,
            "play" | "p" => {
                if arguments.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "play",
                        argument: "a link or a search term",
                    });
                }
                Self::Play {
                    query: arguments.to_owned(),
                }
            }
            "pause" => Self::Pause,
            "resume" | "unpause" => Self::Resume,
            "skip" | "next" => Self::Skip,
            "stop" => Self::Stop,
            "radio" => Self::Radio(parse_switch(arguments)?),
            "queue" | "q" => Self::Queue,
            "history" => Self::History,
            "volume" | "vol" => {
                if arguments.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "volume",
                        argument: "a number from 0 to 100",
                    });
                }
                Self::Volume(arguments.parse().map_err(|_| ParseError::InvalidArgument {
                    command: "volume",
                    argument: arguments.to_owned(),
                })?)
            }
            "now" | "np" => Self::NowPlaying,
            "help" => Self::Help,
            _ => return Err(ParseError::UnknownCommand(name)),
        })
    }
}

impl Action {
    /// Whether the action changes the playback, as opposed to only showing it.
    pub(crate) fn controls_playback(&self) -> bool {
        match self {
            Self::Join
            | Self::Leave
            | Self::Play { .. }
            | Self::Pause
            | Self::Resume
            | Self::Skip
            | Self::Stop
            | Self::Radio(Some(_))
            | Self::Volume(_) => true,
            Self::Radio(None) | Self::Queue | Self::History | Self::NowPlaying | Self::Help => {
                false
            }
        }
    }
}

fn parse_switch(argument: &str) -> Result<Option<bool>, ParseError> {
    if argument.is_empty() {
        return Ok(None);
    }

    match argument.to_lowercase().as_str() {
        "on" | "1" | "yes" | "true" | "enable" => Ok(Some(true)),
        "off" | "0" | "no" | "false" | "disable" => Ok(Some(false)),
        _ => Err(ParseError::InvalidArgument {
            command: "radio",
            argument: argument.to_owned(),
        }),
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum FromMessageError {
    #[error("commands can only be used in a server")]
    NotInGuild,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

pub(crate) struct Command {
    guild_id: GuildId,
    /// The voice channel of the author, if they are in one.
    voice_channel_id: Option<ChannelId>,
    text_channel_id: ChannelId,
    action: Action,
}

impl Command {
    pub(crate) fn new(
        guild_id: GuildId,
        voice_channel_id: Option<ChannelId>,
        text_channel_id: ChannelId,
        action: Action,
    ) -> Self {
        Self {
            guild_id,
            voice_channel_id,
            text_channel_id,
            action,
        }
    }

    pub(crate) fn try_from_message(
        message: &Message,
        context: &Context,
        prefix: &str,
    ) -> Result<Self, FromMessageError> {
        let action = parse_prefixed(&message.content, prefix)?;
        let guild_id = message.guild_id.ok_or(FromMessageError::NotInGuild)?;

        let voice_channel_id = guild_id
            .to_guild_cached(&context.cache)
            .and_then(|guild| {
                guild
                    .voice_states
                    .get(&message.author.id)
                    .and_then(|voice_state| voice_state.channel_id)
            });

        Ok(Self::new(
            guild_id,
            voice_channel_id,
            message.channel_id,
            action,
        ))
    }
}

pub(crate) fn parse_prefixed(text: &str, prefix: &str) -> Result<Action, ParseError> {
    text.trim_start()
        .strip_prefix(prefix)
        .ok_or(ParseError::NotCommand)?
        .parse()
}
