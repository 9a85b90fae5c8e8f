use std::fmt;
use std::path::PathBuf;

/// Where the audio of a [`Track`] comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StreamHandle {
    /// A page URL that is re-extracted and streamed on playback.
    Remote(String),
    /// A file downloaded ahead of playback.
    Local(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Track {
    pub(crate) title: String,
    pub(crate) uploader: Option<String>,
    /// Seconds.
    pub(crate) duration: Option<u64>,
    pub(crate) stream: StreamHandle,
    pub(crate) page_url: Option<String>,
    pub(crate) thumbnail_url: Option<String>,
    pub(crate) view_count: Option<u64>,
    pub(crate) like_count: Option<u64>,
}

impl Track {
    pub(crate) fn new(title: String, stream: StreamHandle) -> Self {
        Self {
            title,
            uploader: None,
            duration: None,
            stream,
            page_url: None,
            thumbnail_url: None,
            view_count: None,
            like_count: None,
        }
    }

    pub(crate) fn with_uploader(mut self, uploader: Option<String>) -> Self {
        self.uploader = uploader;
        self
    }

    pub(crate) fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    pub(crate) fn with_page_url(mut self, page_url: Option<String>) -> Self {
        self.page_url = page_url;
        self
    }

    pub(crate) fn with_thumbnail_url(mut self, thumbnail_url: Option<String>) -> Self {
        self.thumbnail_url = thumbnail_url;
        self
    }

    pub(crate) fn with_counts(mut self, view_count: Option<u64>, like_count: Option<u64>) -> Self {
        self.view_count = view_count;
        self.like_count = like_count;
        self
    }

    pub(crate) fn formatted_duration(&self) -> Option<FormattedDuration> {
        self.duration.map(FormattedDuration)
    }
}

/// Renders seconds as `m:ss`.
pub(crate) struct FormattedDuration(pub(crate) u64);

impl fmt::Display for FormattedDuration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{:02}", self.0 / 60, self.0 % 60)
    }
}
