use crate::model::{StreamHandle, Track};
use crate::query::{self, ResolutionError};
use serenity::async_trait;
use songbird::input::{AudioStreamError, AuxMetadata, Compose, YoutubeDl};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const SEARCH_RESULTS_COUNT: usize = 1;
const YOUTUBE_DL_PROGRAM: &str = "yt-dlp";
const DOWNLOAD_FORMAT: &str = "bestaudio/best";
const DOWNLOAD_FILE_NAME_TEMPLATE: &str = "%(extractor)s-%(id)s-%(title)s.%(ext)s";
const UNKNOWN_TRACK_TITLE: &str = "Unknown track";

/// Resolves queries through yt-dlp, searching YouTube for anything that is not a URL.
pub(crate) struct Resolver {
    http_client: reqwest::Client,
    timeout: Duration,
    download_directory: PathBuf,
    youtube_dl_program: PathBuf,
}

impl Resolver {
    pub(crate) fn new(
        http_client: reqwest::Client,
        timeout: Duration,
        download_directory: PathBuf,
    ) -> Self {
        Self {
            http_client,
            timeout,
            download_directory,
            youtube_dl_program: PathBuf::from(YOUTUBE_DL_PROGRAM),
        }
    }

    #[cfg(test)]
    fn with_youtube_dl_program(mut self, youtube_dl_program: PathBuf) -> Self {
        self.youtube_dl_program = youtube_dl_program;
        self
    }

    async fn resolve_untimed(
        &self,
        query: &str,
        stream_only: bool,
    ) -> Result<Track, ResolutionError> {
        let is_url = query::is_url(query);
        let metadata = if is_url {
            YoutubeDl::new(self.http_client.clone(), query.to_owned())
                .aux_metadata()
                .await
                .map_err(into_resolution_error)?
        } else {
            let mut youtube_dl = YoutubeDl::new_search(self.http_client.clone(), query.to_owned());
            let results = youtube_dl
                .search(Some(SEARCH_RESULTS_COUNT))
                .await
                .map_err(into_resolution_error)?;
            results.into_iter().next().ok_or(ResolutionError::NotFound)?
        };

        let track = track_from_metadata(metadata, is_url.then_some(query))?;
        if stream_only {
            return Ok(track);
        }
        self.materialize(track).await
    }

    /// Replaces the remote stream of the track with a downloaded file.
    async fn materialize(&self, track: Track) -> Result<Track, ResolutionError> {
        let page_url = match &track.stream {
            StreamHandle::Remote(url) => url.clone(),
            StreamHandle::Local(_) => return Ok(track),
        };
        let downloaded = self.download(&page_url).await?;
        debug!("downloaded {} to {}", track.title, downloaded.path.display());

        Ok(Track {
            stream: StreamHandle::Local(downloaded.path),
            ..track
        }
        .with_counts(downloaded.view_count, downloaded.like_count))
    }

    async fn download(&self, page_url: &str) -> Result<Downloaded, ResolutionError> {
        tokio::fs::create_dir_all(&self.download_directory)
            .await
            .map_err(|error| ResolutionError::Backend(error.into()))?;

        let mut command =
            download_command(&self.youtube_dl_program, &self.download_directory, page_url);
        let output = command
            .output()
            .await
            .map_err(|error| ResolutionError::Backend(error.into()))?;

        if !output.status.success() {
            return Err(ResolutionError::Backend(anyhow::anyhow!(
                "{} exited with {}: {}",
                self.youtube_dl_program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_download_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Downloads the best audio of one page and prints the file path, view count and like count.
fn download_command(program: &Path, download_directory: &Path, page_url: &str) -> Command {
    let mut command = Command::new(program);
    command
        .args(["--no-playlist", "--restrict-filenames", "-f", DOWNLOAD_FORMAT])
        .arg("-o")
        .arg(download_directory.join(DOWNLOAD_FILE_NAME_TEMPLATE))
        .args([
            "--print",
            "after_move:filepath",
            "--print",
            "after_move:%(view_count)s",
            "--print",
            "after_move:%(like_count)s",
        ])
        .arg(page_url)
        .kill_on_drop(true);
    command
}

#[async_trait]
impl query::Resolver for Resolver {
    async fn resolve(&self, query: &str, stream_only: bool) -> Result<Track, ResolutionError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolutionError::NotFound);
        }

        debug!("resolving {query:?} (stream only: {stream_only})");
        tokio::time::timeout(self.timeout, self.resolve_untimed(query, stream_only))
            .await
            .map_err(|_| ResolutionError::Timeout)?
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Downloaded {
    path: PathBuf,
    view_count: Option<u64>,
    like_count: Option<u64>,
}

fn parse_download_output(stdout: &str) -> Result<Downloaded, ResolutionError> {
    let mut lines = stdout.lines().map(str::trim);
    let path = lines
        .next()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .ok_or(ResolutionError::NotFound)?;
    // yt-dlp prints "NA" for fields the extractor does not provide.
    let mut next_count = || lines.next().and_then(|line| line.parse().ok());

    Ok(Downloaded {
        path,
        view_count: next_count(),
        like_count: next_count(),
    })
}

fn track_from_metadata(
    metadata: AuxMetadata,
    requested_url: Option<&str>,
) -> Result<Track, ResolutionError> {
    let page_url = metadata
        .source_url
        .or_else(|| requested_url.map(ToOwned::to_owned))
        .ok_or(ResolutionError::NotFound)?;

    Ok(Track::new(
        metadata
            .title
            .unwrap_or_else(|| UNKNOWN_TRACK_TITLE.to_owned()),
        StreamHandle::Remote(page_url.clone()),
    )
    .with_uploader(metadata.artist.or(metadata.channel))
    .with_duration(metadata.duration.map(|duration| duration.as_secs()))
    .with_page_url(Some(page_url))
    .with_thumbnail_url(metadata.thumbnail))
}

fn into_resolution_error(error: AudioStreamError) -> ResolutionError {
    match error {
        AudioStreamError::Fail(error) => {
            if error.to_string().contains("no results found") {
                ResolutionError::NotFound
            } else {
                ResolutionError::Backend(anyhow::Error::from_boxed(error))
            }
        }
        error => ResolutionError::Backend(error.into()),
    }
}
