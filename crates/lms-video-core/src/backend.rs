//! Media backend seam
//!
//! The backend stands in for the YouTube IFrame API or the HTML5 `<video>`
//! wrapper. Commands are fire-and-forget; answers to asynchronous queries come
//! back into the player as events (`QualityLevels`, `QualityChange`, `Play`...).

use crate::types::VideoQuality;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Playback backend driven by the player
pub trait MediaBackend: Send {
    /// Current media position in seconds
    fn current_time(&self) -> f64;

    /// Media duration in seconds (0 or non-finite when unknown)
    fn duration(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// True when positions are reported in speed-scaled units
    fn reports_scaled_time(&self) -> bool {
        false
    }

    fn play(&mut self);

    fn pause(&mut self);

    fn seek_to(&mut self, time: f64);

    fn set_playback_quality(&mut self, quality: VideoQuality);

    /// Start an asynchronous quality levels query
    fn request_quality_levels(&mut self);
}

/// Command recorded by [`ScriptedBackend`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum BackendCommand {
    Play,
    Pause,
    Seek { time: f64 },
    SetQuality { quality: VideoQuality },
    RequestQualityLevels,
}

#[derive(Debug, Default)]
struct ScriptedInner {
    current_time: f64,
    duration: f64,
    playing: bool,
    scaled_time: bool,
    commands: Vec<BackendCommand>,
}

/// Backend whose position is set by the caller and whose commands are recorded
///
/// Clones share the same state, so a test can keep a handle after giving one
/// to the player.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    inner: Arc<Mutex<ScriptedInner>>,
}

impl ScriptedBackend {
    pub fn new(duration: f64) -> Self {
        let backend = Self::default();
        backend.lock().duration = duration;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        // A poisoned lock only means a test panicked mid-update
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_time(&self, time: f64) {
        self.lock().current_time = time;
    }

    pub fn set_duration(&self, duration: f64) {
        self.lock().duration = duration;
    }

    pub fn set_scaled_time(&self, scaled: bool) {
        self.lock().scaled_time = scaled;
    }

    /// All commands received so far
    pub fn commands(&self) -> Vec<BackendCommand> {
        self.lock().commands.clone()
    }

    pub fn take_commands(&self) -> Vec<BackendCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    /// Quality levels requested through `set_playback_quality`
    pub fn requested_qualities(&self) -> Vec<VideoQuality> {
        self.lock()
            .commands
            .iter()
            .filter_map(|command| match command {
                BackendCommand::SetQuality { quality } => Some(*quality),
                _ => None,
            })
            .collect()
    }
}

impl MediaBackend for ScriptedBackend {
    fn current_time(&self) -> f64 {
        self.lock().current_time
    }

    fn duration(&self) -> f64 {
        self.lock().duration
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn reports_scaled_time(&self) -> bool {
        self.lock().scaled_time
    }

    fn play(&mut self) {
        let mut inner = self.lock();
        inner.playing = true;
        inner.commands.push(BackendCommand::Play);
    }

    fn pause(&mut self) {
        let mut inner = self.lock();
        inner.playing = false;
        inner.commands.push(BackendCommand::Pause);
    }

    fn seek_to(&mut self, time: f64) {
        let mut inner = self.lock();
        inner.current_time = time;
        inner.commands.push(BackendCommand::Seek { time });
    }

    fn set_playback_quality(&mut self, quality: VideoQuality) {
        self.lock().commands.push(BackendCommand::SetQuality { quality });
    }

    fn request_quality_levels(&mut self) {
        self.lock().commands.push(BackendCommand::RequestQualityLevels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let backend = ScriptedBackend::new(60.0);
        let mut boxed: Box<dyn MediaBackend> = Box::new(backend.clone());

        boxed.seek_to(12.0);
        boxed.set_playback_quality(VideoQuality::Large);
        backend.set_time(13.5);

        assert_eq!(boxed.current_time(), 13.5);
        assert_eq!(boxed.duration(), 60.0);
        assert_eq!(backend.requested_qualities(), vec![VideoQuality::Large]);
        assert_eq!(backend.take_commands().len(), 2);
        assert!(backend.commands().is_empty());
    }
}
