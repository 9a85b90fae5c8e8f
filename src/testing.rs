//! Fakes for the seams between the bot and its external collaborators.

use crate::model::{StreamHandle, Track};
use crate::player::{AudioTransport, GuildEvent, Notice, Notifier, PlaybackId, TransportError};
use crate::query::{ResolutionError, Resolver};
use serenity::all::ChannelId;
use serenity::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// The channel every [`FakeTransport`] plays in.
pub(crate) fn voice_channel_id() -> ChannelId {
    ChannelId::new(10)
}

pub(crate) fn track(title: &str) -> Track {
    Track::new(
        title.to_owned(),
        StreamHandle::Remote(format!("https://example.com/{title}")),
    )
}

/// Answers queries from a script and remembers what it was asked.
#[derive(Default)]
pub(crate) struct ScriptedResolver {
    answers: Mutex<VecDeque<Result<Track, ResolutionError>>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub(crate) fn new(answers: Vec<Result<Track, ResolutionError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            queries: Mutex::default(),
        }
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, query: &str, stream_only: bool) -> Result<Track, ResolutionError> {
        assert!(stream_only);
        self.queries.lock().unwrap().push(query.to_owned());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ResolutionError::NotFound))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TransportCall {
    Start { title: String, volume: f32 },
    Pause,
    Resume,
    SetVolume(f32),
    Halt,
    Leave,
}

#[derive(Default)]
struct TransportLog {
    calls: Vec<TransportCall>,
    started: Vec<(String, PlaybackId)>,
    active: Option<PlaybackId>,
    failing_titles: HashSet<String>,
    disconnected: bool,
    events: Option<mpsc::UnboundedSender<GuildEvent>>,
}

/// Records what it is asked to play. When given an event sender it reports completions the
/// way a real voice connection does.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    log: Arc<Mutex<TransportLog>>,
}

impl FakeTransport {
    pub(crate) fn reporting_to(events: mpsc::UnboundedSender<GuildEvent>) -> Self {
        let transport = Self::default();
        transport.log.lock().unwrap().events = Some(events);
        transport
    }

    pub(crate) fn fail_on(&self, title: &str) {
        self.log
            .lock()
            .unwrap()
            .failing_titles
            .insert(title.to_owned());
    }

    pub(crate) fn disconnect(&self) {
        self.log.lock().unwrap().disconnected = true;
    }

    pub(crate) fn calls(&self) -> Vec<TransportCall> {
        self.log.lock().unwrap().calls.clone()
    }

    pub(crate) fn started_titles(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .started
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    pub(crate) fn last_playback_id(&self) -> Option<PlaybackId> {
        self.log
            .lock()
            .unwrap()
            .started
            .last()
            .map(|(_, playback_id)| *playback_id)
    }

    /// Lets the active track end on its own.
    pub(crate) fn finish(&self) {
        self.end_active();
    }

    fn end_active(&self) {
        let mut log = self.log.lock().unwrap();
        if let (Some(playback_id), Some(events)) = (log.active.take(), &log.events) {
            events
                .send(GuildEvent::TrackEnded {
                    playback_id,
                    failure: None,
                })
                .unwrap();
        }
    }
}

#[async_trait]
impl AudioTransport for FakeTransport {
    async fn start(
        &mut self,
        track: &Track,
        volume: f32,
        playback_id: PlaybackId,
    ) -> Result<(), TransportError> {
        let mut log = self.log.lock().unwrap();
        if log.disconnected {
            return Err(TransportError::NotConnected);
        }
        log.calls.push(TransportCall::Start {
            title: track.title.clone(),
            volume,
        });
        if log.failing_titles.contains(&track.title) {
            return Err(TransportError::NotConnected);
        }
        log.started.push((track.title.clone(), playback_id));
        log.active = Some(playback_id);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().calls.push(TransportCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().calls.push(TransportCall::Resume);
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .calls
            .push(TransportCall::SetVolume(volume));
        Ok(())
    }

    fn halt(&mut self) {
        self.log.lock().unwrap().calls.push(TransportCall::Halt);
        self.end_active();
    }

    fn voice_channel_id(&self) -> ChannelId {
        voice_channel_id()
    }

    async fn is_connected(&self) -> bool {
        !self.log.lock().unwrap().disconnected
    }

    async fn leave(&mut self) {
        self.log.lock().unwrap().calls.push(TransportCall::Leave);
    }
}

/// Forwards every notice into a channel the test reads from.
pub(crate) struct RecordingNotifier {
    sender: mpsc::UnboundedSender<(ChannelId, Notice)>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<(ChannelId, Notice)>>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }
}

impl RecordingNotifier {
    pub(crate) async fn next(&self) -> Notice {
        let (_, notice) = timeout(NOTICE_TIMEOUT, self.receiver.lock().await.recv())
            .await
            .expect("no notice arrived in time")
            .expect("the notice channel closed");
        notice
    }

    pub(crate) async fn is_quiet(&self) -> bool {
        timeout(QUIET_PERIOD, self.receiver.lock().await.recv())
            .await
            .is_err()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text_channel_id: ChannelId, notice: Notice) {
        _ = self.sender.send((text_channel_id, notice));
    }
}
