use crate::embed;
use crate::env::Config;
use crate::error::Result;
use crate::http::HttpTransport;
use crate::invidious::VideoCatalogClient;
use crate::link::{extract_links, Catalog, Link};
use crate::resolve::CrossResolver;
use crate::service::Service;
use crate::spotify::TrackCatalogClient;
use serenity::all::{
    Command, CommandInteraction, CommandType, Context, CreateCommand, CreateEmbed, CreateMessage,
    EditInteractionResponse, EventHandler, Interaction, Message, Ready,
};
use serenity::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const GET_LINKS_COMMAND: &str = "Get links";
const MAX_EMBEDS_PER_MESSAGE: usize = 10;

pub(crate) struct Bot {
    tracks: Arc<TrackCatalogClient>,
    videos: Arc<VideoCatalogClient>,
    resolver: CrossResolver,
}

impl Bot {
    /// Builds both catalog clients and starts them. A client that cannot
    /// start aborts the whole bot.
    pub(crate) async fn new(config: &Config) -> Result<Self> {
        let tracks = Arc::new(TrackCatalogClient::new(
            &config.spotify_api_credentials,
            Box::new(HttpTransport::new(config.http_timeout)?),
        )?);
        let videos = Arc::new(VideoCatalogClient::new(
            Box::new(HttpTransport::new(config.http_timeout)?),
            config.invidious_instance_url.clone(),
        ));
        let bot = Self {
            resolver: CrossResolver::new(tracks.clone(), videos.clone()),
            tracks,
            videos,
        };

        for service in bot.services() {
            if let Err(error) = service.start().await {
                bot.stop().await;
                return Err(error);
            }
        }

        Ok(bot)
    }

    fn services(&self) -> [&dyn Service; 2] {
        [self.tracks.as_ref(), self.videos.as_ref()]
    }

    pub(crate) async fn stop(&self) {
        for service in self.services() {
            service.stop().await;
        }
    }

    async fn describe(&self, link: &Link) -> CreateEmbed {
        let described = match link.catalog {
            Catalog::Track => self.describe_track(&link.id).await,
            Catalog::Video => self.describe_video(&link.id).await,
        };

        described.unwrap_or_else(|error| {
            warn!(id = %link.id, %error, "could not describe a link");
            embed::error(&error)
        })
    }

    async fn describe_track(&self, id: &str) -> Result<CreateEmbed> {
        let track = self.tracks.fetch_track(id).await?;
        let video = self
            .resolver
            .track_to_video(&track)
            .await
            .inspect_err(|error| debug!(id, %error, "no matching video"))
            .ok();

        Ok(embed::track(&track, video.as_ref()))
    }

    async fn describe_video(&self, id: &str) -> Result<CreateEmbed> {
        let video = self.videos.get_video(id).await?;
        let track = self
            .resolver
            .video_to_track(&video)
            .await
            .inspect_err(|error| debug!(id, %error, "no matching track"))
            .ok();
        let audio_url = self
            .videos
            .locate_audio_source(&video)
            .await
            .inspect_err(|error| debug!(id, %error, "no audio source"))
            .ok();

        Ok(embed::video(&video, track.as_ref(), audio_url.as_ref()))
    }

    async fn get_links(&self, context: &Context, command: &CommandInteraction) -> serenity::Result<()> {
        command.defer_ephemeral(&context.http).await?;

        let links = command
            .data
            .resolved
            .messages
            .values()
            .next()
            .map(|message| extract_links(&message.content))
            .unwrap_or_default();

        let mut embeds = Vec::new();
        for link in links.iter().take(MAX_EMBEDS_PER_MESSAGE) {
            embeds.push(self.describe(link).await);
        }

        let response = if embeds.is_empty() {
            EditInteractionResponse::new().content("No Spotify or YouTube links found.")
        } else {
            EditInteractionResponse::new().embeds(embeds)
        };
        command.edit_response(&context.http, response).await?;

        Ok(())
    }
}

/// Whether the message already shows a preview for the track.
fn is_enriched(message: &Message, track_id: &str) -> bool {
    message
        .embeds
        .iter()
        .any(|embed| embed.url.as_deref().is_some_and(|url| url.contains(track_id)))
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, context: Context, ready: Ready) {
        if let Err(error) = Command::set_global_commands(
            &context.http,
            vec![CreateCommand::new(GET_LINKS_COMMAND).kind(CommandType::Message)],
        )
        .await
        {
            error!(%error, "could not register the commands");
            return;
        }

        info!(user = %ready.user.name, "the bot is ready");
    }

    async fn interaction_create(&self, context: Context, interaction: Interaction) {
        let command = match interaction {
            Interaction::Command(command) if command.data.name == GET_LINKS_COMMAND => command,
            _ => return,
        };

        if let Err(error) = self.get_links(&context, &command).await {
            error!(%error, "could not answer the command");
        }
    }

    async fn message(&self, context: Context, message: Message) {
        if message.author.bot {
            return;
        }

        let mut seen = HashSet::new();
        for link in extract_links(&message.content) {
            if link.catalog != Catalog::Track
                || !seen.insert(link.id.clone())
                || is_enriched(&message, &link.id)
            {
                continue;
            }

            let embed = self.describe(&link).await;
            if let Err(error) = message
                .channel_id
                .send_message(
                    &context.http,
                    CreateMessage::new().embed(embed).reference_message(&message),
                )
                .await
            {
                error!(%error, "could not send the enrichment");
            }
        }
    }
}
