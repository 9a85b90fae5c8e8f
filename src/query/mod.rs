use crate::model::Track;
use serenity::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ResolutionError {
    #[error("no result found for the query")]
    NotFound,
    #[error("the media backend did not answer in time")]
    Timeout,
    #[error("the media backend failed: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Turns a URL or a search term into a playable [`Track`].
#[async_trait]
pub(crate) trait Resolver: Send + Sync {
    /// With `stream_only` set the returned track streams from the backend on playback, otherwise
    /// it refers to a downloaded local file.
    async fn resolve(&self, query: &str, stream_only: bool) -> Result<Track, ResolutionError>;
}

/// Whether the query is a web URL rather than free text to search for.
pub(crate) fn is_url(query: &str) -> bool {
    reqwest::Url::parse(query.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
