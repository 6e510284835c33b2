//! Core types for the video player

use crate::error::{Error, Result};
use crate::grading::{GraderConfig, GraderKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Where the media comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoSource {
    /// YouTube IFrame player
    Youtube { id: String },
    /// HLS stream in an HTML5 video element
    Hls,
    /// Plain HTML5 video element
    #[default]
    Html5,
}

impl VideoSource {
    pub fn is_youtube(&self) -> bool {
        matches!(self, VideoSource::Youtube { .. })
    }

    /// Value of the `code` field in analytics payloads
    pub fn code(&self) -> &str {
        match self {
            VideoSource::Youtube { id } => id,
            VideoSource::Hls => "hls",
            VideoSource::Html5 => "html5",
        }
    }
}

/// YouTube playback quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Tiny,
    Small,
    Medium,
    Large,
    Hd720,
    Hd1080,
    Highres,
    Default,
    Auto,
}

impl VideoQuality {
    /// Levels considered high definition
    pub const HD: [VideoQuality; 3] = [VideoQuality::Highres, VideoQuality::Hd1080, VideoQuality::Hd720];

    pub fn is_hd(&self) -> bool {
        Self::HD.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoQuality::Tiny => "tiny",
            VideoQuality::Small => "small",
            VideoQuality::Medium => "medium",
            VideoQuality::Large => "large",
            VideoQuality::Hd720 => "hd720",
            VideoQuality::Hd1080 => "hd1080",
            VideoQuality::Highres => "highres",
            VideoQuality::Default => "default",
            VideoQuality::Auto => "auto",
        }
    }
}

impl std::fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoQuality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tiny" => Ok(VideoQuality::Tiny),
            "small" => Ok(VideoQuality::Small),
            "medium" => Ok(VideoQuality::Medium),
            "large" => Ok(VideoQuality::Large),
            "hd720" => Ok(VideoQuality::Hd720),
            "hd1080" => Ok(VideoQuality::Hd1080),
            "highres" => Ok(VideoQuality::Highres),
            "default" => Ok(VideoQuality::Default),
            "auto" => Ok(VideoQuality::Auto),
            other => Err(Error::config(format!("unknown quality level: {}", other))),
        }
    }
}

/// Containers present around the video
///
/// A missing container means the matching widget renders nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlsLayout {
    /// Progress slider container
    pub slider: bool,
    /// `.secondary-controls` container hosting the HD toggle
    pub secondary_controls: bool,
    /// Elapsed / total time display
    pub vcr: bool,
}

impl Default for ControlsLayout {
    fn default() -> Self {
        Self {
            slider: true,
            secondary_controls: true,
            vcr: true,
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    /// Video block id
    pub id: String,
    /// Media source
    pub source: VideoSource,
    /// Clip start in seconds
    pub start_time: f64,
    /// Clip end in seconds
    pub end_time: Option<f64>,
    /// Initial playback speed
    pub speed: f64,
    /// Current transcript language
    pub lang: String,
    /// Auto-hide the control bar for HTML5 sources
    pub autohide_html5: bool,
    /// Inactivity delay before hiding controls, and fade duration (ms)
    pub fade_out_timeout: u64,
    /// Captions shown on load
    pub captions_visible: bool,
    /// Graders are active for this video
    pub has_score: bool,
    /// Grader strategies keyed by name
    pub graders: BTreeMap<GraderKind, GraderConfig>,
    /// DOM containers present around the video
    pub layout: ControlsLayout,
    /// Extra fields merged into every analytics payload
    pub log_data: serde_json::Map<String, serde_json::Value>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            source: VideoSource::Html5,
            start_time: 0.0,
            end_time: None,
            speed: 1.0,
            lang: "en".to_string(),
            autohide_html5: false,
            fade_out_timeout: 1400,
            captions_visible: false,
            has_score: false,
            graders: BTreeMap::new(),
            layout: ControlsLayout::default(),
            log_data: serde_json::Map::new(),
        }
    }
}

impl PlayerConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reject values no video could be played with
    pub fn validate(&self) -> Result<()> {
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(Error::config(format!("startTime must be >= 0, got {}", self.start_time)));
        }
        if let Some(end) = self.end_time {
            if !end.is_finite() || end <= self.start_time {
                return Err(Error::config(format!(
                    "endTime {} must be greater than startTime {}",
                    end, self.start_time
                )));
            }
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::config(format!("speed must be positive, got {}", self.speed)));
        }
        if let VideoSource::Youtube { id } = &self.source {
            if id.is_empty() {
                return Err(Error::config("youtube source requires an id"));
            }
        }
        Ok(())
    }

    /// Auto-hide applies to HTML5 sources only
    pub fn autohide_enabled(&self) -> bool {
        self.autohide_html5 && !self.source.is_youtube()
    }
}

/// Clip bounds resolved against the media duration
///
/// A `duration` of zero means the duration is not known yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBounds {
    pub start: f64,
    pub end: Option<f64>,
}

impl ClipBounds {
    pub fn resolve(config: &PlayerConfig, duration: f64) -> Self {
        let known = duration > 0.0;

        let start = if known && config.start_time >= duration {
            0.0
        } else {
            config.start_time
        };

        let end = config
            .end_time
            .filter(|end| *end > start)
            .map(|end| if known { end.min(duration) } else { end });

        Self { start, end }
    }

    /// Clip end, or the media duration when no end is configured
    pub fn end_or(&self, duration: f64) -> f64 {
        self.end.unwrap_or(duration)
    }

    /// Length of the clip
    pub fn duration_within(&self, duration: f64) -> f64 {
        (self.end_or(duration) - self.start).max(0.0)
    }

    /// Time elapsed since the clip start
    pub fn elapsed(&self, time: f64) -> f64 {
        if time.is_finite() {
            (time - self.start).max(0.0)
        } else {
            0.0
        }
    }

    /// True when the clip stops before the media does
    pub fn is_partial(&self, duration: f64) -> bool {
        match self.end {
            Some(end) => duration > 0.0 && end < duration,
            None => false,
        }
    }
}
