//! Typed event bus scoped to one player instance
//!
//! Widgets subscribe by [`EventKind`]; events triggered while an event is
//! being dispatched are queued and delivered in FIFO order.

use crate::grading::GraderKind;
use crate::types::VideoQuality;
use crate::widgets::WidgetKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Origin of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeekKind {
    /// Progress slider drag or click
    #[serde(rename = "onSlideSeek")]
    Slide,
    /// Click on a transcript line
    #[serde(rename = "onCaptionSeek")]
    Caption,
    /// Keyboard shortcut or programmatic seek
    #[serde(rename = "onSeek")]
    Other,
}

impl SeekKind {
    /// Value of the `type` field in `seek_video` logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SeekKind::Slide => "onSlideSeek",
            SeekKind::Caption => "onCaptionSeek",
            SeekKind::Other => "onSeek",
        }
    }
}

/// Everything that can happen to a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    // Media lifecycle, reported by the backend
    Ready,
    Play,
    Pause,
    Ended,
    Stop,
    Complete,
    /// A seek was committed
    Seek { time: f64, old_time: f64, kind: SeekKind },
    /// Host player progress tick
    Progress { time: f64 },
    /// Playback reached the configured clip end
    EndTimeReached,
    /// Backend answer to a quality levels request
    QualityLevels { levels: Vec<VideoQuality> },
    /// Backend could not report quality levels
    QualityLevelsUnavailable,
    /// Backend accepted a playback quality
    QualityChange { quality: VideoQuality },

    // Player commands
    /// Ask the player to seek
    SeekRequest { time: f64, kind: SeekKind },
    /// Periodic time sync
    TimeUpdate { time: f64, duration: f64 },
    /// Time display preview while dragging
    VcrTimeUpdate { time: f64, duration: f64 },
    SpeedChange { new_speed: f64, old_speed: f64 },
    AutoAdvanceChange { enabled: bool },

    // User interaction
    SliderSlide { time: f64 },
    SliderStop { time: f64 },
    /// Mouse movement or key press over the player
    UserActivity,
    TogglePlayback,
    ToggleQuality,
    DownloadClicked,
    Skip { do_not_show_again: bool },
    LanguageMenuShown,
    LanguageMenuHidden,
    TranscriptShown,
    TranscriptHidden,
    CaptionsShown,
    CaptionsHidden,

    /// A grader's condition was met
    Graded { grader: GraderKind },
    Destroy,
}

/// Discriminant of [`PlayerEvent`] used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Ready,
    Play,
    Pause,
    Ended,
    Stop,
    Complete,
    Seek,
    Progress,
    EndTimeReached,
    QualityLevels,
    QualityLevelsUnavailable,
    QualityChange,
    SeekRequest,
    TimeUpdate,
    VcrTimeUpdate,
    SpeedChange,
    AutoAdvanceChange,
    SliderSlide,
    SliderStop,
    UserActivity,
    TogglePlayback,
    ToggleQuality,
    DownloadClicked,
    Skip,
    LanguageMenuShown,
    LanguageMenuHidden,
    TranscriptShown,
    TranscriptHidden,
    CaptionsShown,
    CaptionsHidden,
    Graded,
    Destroy,
}

impl PlayerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Ready => EventKind::Ready,
            PlayerEvent::Play => EventKind::Play,
            PlayerEvent::Pause => EventKind::Pause,
            PlayerEvent::Ended => EventKind::Ended,
            PlayerEvent::Stop => EventKind::Stop,
            PlayerEvent::Complete => EventKind::Complete,
            PlayerEvent::Seek { .. } => EventKind::Seek,
            PlayerEvent::Progress { .. } => EventKind::Progress,
            PlayerEvent::EndTimeReached => EventKind::EndTimeReached,
            PlayerEvent::QualityLevels { .. } => EventKind::QualityLevels,
            PlayerEvent::QualityLevelsUnavailable => EventKind::QualityLevelsUnavailable,
            PlayerEvent::QualityChange { .. } => EventKind::QualityChange,
            PlayerEvent::SeekRequest { .. } => EventKind::SeekRequest,
            PlayerEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
            PlayerEvent::VcrTimeUpdate { .. } => EventKind::VcrTimeUpdate,
            PlayerEvent::SpeedChange { .. } => EventKind::SpeedChange,
            PlayerEvent::AutoAdvanceChange { .. } => EventKind::AutoAdvanceChange,
            PlayerEvent::SliderSlide { .. } => EventKind::SliderSlide,
            PlayerEvent::SliderStop { .. } => EventKind::SliderStop,
            PlayerEvent::UserActivity => EventKind::UserActivity,
            PlayerEvent::TogglePlayback => EventKind::TogglePlayback,
            PlayerEvent::ToggleQuality => EventKind::ToggleQuality,
            PlayerEvent::DownloadClicked => EventKind::DownloadClicked,
            PlayerEvent::Skip { .. } => EventKind::Skip,
            PlayerEvent::LanguageMenuShown => EventKind::LanguageMenuShown,
            PlayerEvent::LanguageMenuHidden => EventKind::LanguageMenuHidden,
            PlayerEvent::TranscriptShown => EventKind::TranscriptShown,
            PlayerEvent::TranscriptHidden => EventKind::TranscriptHidden,
            PlayerEvent::CaptionsShown => EventKind::CaptionsShown,
            PlayerEvent::CaptionsHidden => EventKind::CaptionsHidden,
            PlayerEvent::Graded { .. } => EventKind::Graded,
            PlayerEvent::Destroy => EventKind::Destroy,
        }
    }
}

/// Queue plus listener registry
#[derive(Debug, Default)]
pub struct EventBus {
    queue: VecDeque<PlayerEvent>,
    listeners: BTreeMap<EventKind, Vec<WidgetKind>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PlayerEvent) {
        self.queue.push_back(event);
    }

    pub fn pop(&mut self) -> Option<PlayerEvent> {
        self.queue.pop_front()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Register `owner` for each kind, keeping attach order
    pub fn subscribe(&mut self, owner: WidgetKind, kinds: &[EventKind]) {
        for kind in kinds {
            let owners = self.listeners.entry(*kind).or_default();
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
    }

    pub fn unsubscribe(&mut self, owner: WidgetKind, kind: EventKind) {
        if let Some(owners) = self.listeners.get_mut(&kind) {
            owners.retain(|o| *o != owner);
            if owners.is_empty() {
                self.listeners.remove(&kind);
            }
        }
    }

    /// Drop every listener registered by `owner`
    pub fn unsubscribe_all(&mut self, owner: WidgetKind) {
        self.listeners.retain(|_, owners| {
            owners.retain(|o| *o != owner);
            !owners.is_empty()
        });
    }

    /// Replace the subscriptions of `owner`
    pub fn resubscribe(&mut self, owner: WidgetKind, kinds: &[EventKind]) {
        self.unsubscribe_all(owner);
        self.subscribe(owner, kinds);
    }

    pub fn is_subscribed(&self, owner: WidgetKind, kind: EventKind) -> bool {
        self.listeners
            .get(&kind)
            .map(|owners| owners.contains(&owner))
            .unwrap_or(false)
    }

    pub fn listeners_for(&self, kind: EventKind) -> Vec<WidgetKind> {
        self.listeners.get(&kind).cloned().unwrap_or_default()
    }

    /// Total number of (event, widget) registrations
    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn listener_count_for(&self, owner: WidgetKind) -> usize {
        self.listeners
            .values()
            .filter(|owners| owners.contains(&owner))
            .count()
    }
}
