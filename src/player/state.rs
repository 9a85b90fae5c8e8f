use crate::model::Track;
use std::collections::VecDeque;

pub(crate) const HISTORY_LENGTH_LIMIT: usize = 20;

/// Everything the bot remembers about one guild's playback.
#[derive(Default, Debug)]
pub(crate) struct GuildState {
    queue: VecDeque<Track>,
    /// Titles of started tracks, oldest first.
    history: VecDeque<String>,
    current_track: Option<Track>,
    radio_enabled: bool,
}

impl GuildState {
    pub(crate) fn enqueue(&mut self, track: Track) {
        self.queue.push_back(track);
    }

    pub(crate) fn dequeue_next(&mut self) -> Option<Track> {
        self.queue.pop_front()
    }

    pub(crate) fn record_history(&mut self, title: String) {
        self.history.push_back(title);
        while self.history.len() > HISTORY_LENGTH_LIMIT {
            self.history.pop_front();
        }
    }

    pub(crate) fn set_current(&mut self, track: Option<Track>) {
        self.current_track = track;
    }

    pub(crate) fn set_radio(&mut self, enabled: bool) {
        self.radio_enabled = enabled;
    }

    /// Forgets the queue, the current track and radio mode. History is kept.
    pub(crate) fn reset(&mut self) {
        self.queue.clear();
        self.current_track = None;
        self.radio_enabled = false;
    }

    pub(crate) fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub(crate) fn history(&self) -> &VecDeque<String> {
        &self.history
    }

    pub(crate) fn current_track(&self) -> Option<&Track> {
        self.current_track.as_ref()
    }

    pub(crate) fn radio_enabled(&self) -> bool {
        self.radio_enabled
    }
}
