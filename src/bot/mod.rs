use crate::command::{self, Command, FromMessageError, ParseError};
use serenity::all::{
    ActivityData, Context, CreateEmbed, CreateMessage, EventHandler, Message, Ready,
};
use serenity::async_trait;
use tracing::{debug, error, info, warn};

pub(crate) struct Bot {
    command_executor: command::Executor,
}

impl Bot {
    pub(crate) fn new(command_executor: command::Executor) -> Self {
        Self { command_executor }
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, context: Context, ready: Ready) {
        info!("{} is connected", ready.user.name);

        context.set_activity(Some(ActivityData::playing(format!(
            "{}help | Music",
            self.command_executor.prefix()
        ))));
    }

    async fn message(&self, context: Context, message: Message) {
        if message.author.bot {
            return;
        }

        let command =
            match Command::try_from_message(&message, &context, self.command_executor.prefix()) {
                Ok(command) => command,
                Err(FromMessageError::Parse(ParseError::NotCommand)) => return,
                Err(FromMessageError::Parse(ParseError::UnknownCommand(name))) => {
                    debug!("ignoring the unknown command {name:?}");
                    return;
                }
                Err(error) => {
                    reply(&context, &message, error.into()).await;
                    return;
                }
            };

        let embed = match self.command_executor.execute(&context, command).await {
            Ok(executed) => executed.into(),
            Err(command::Error::Internal(internal_error)) => {
                error!("on executing {:?}: {internal_error}", message.content);
                command::Error::Internal(internal_error).into()
            }
            Err(error) => error.into(),
        };
        reply(&context, &message, embed).await;
    }
}

async fn reply(context: &Context, message: &Message, embed: CreateEmbed) {
    if let Err(error) = message
        .channel_id
        .send_message(&context.http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("could not reply in the channel {}: {error}", message.channel_id);
    }
}
