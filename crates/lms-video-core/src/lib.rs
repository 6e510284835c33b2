//! LMS Video Core - headless courseware video player
//!
//! This crate provides the per-video player context and its widgets:
//! - Time formatting and speed conversion
//! - Progress slider with drag freeze handling
//! - Playback controls with inactivity auto-hide
//! - YouTube quality control
//! - Grader collection (basic, on end, on percent) with persisted progress
//! - Analytics events plugin
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Player                              │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────────────────┐  │
//! │  │ PlayerState│  │  EventBus  │  │ Scheduler (virtual clk)│  │
//! │  └────────────┘  └─────┬──────┘  └────────────────────────┘  │
//! │                        │ Context                             │
//! │   ┌──────────┬─────────┼─────────┬──────────────┐            │
//! │   │ Slider   │ Controls│ Quality │ EventsPlugin │ Graders    │
//! │   └──────────┴─────────┴─────────┴──────────────┘            │
//! └───────┬───────────────────┬───────────────────┬──────────────┘
//!         │                   │                   │
//!   MediaBackend        AnalyticsSink     KeyValueStorage / GradeReporter
//! ```
//!
//! ```rust
//! use lms_video_core::{Player, PlayerConfig, PlayerEvent, ScriptedBackend, GraderSeeds};
//!
//! let mut player = Player::builder(PlayerConfig::default())
//!     .backend(ScriptedBackend::new(120.0))
//!     .build()
//!     .unwrap();
//! player.install_default_widgets(&GraderSeeds::new()).unwrap();
//! player.emit(PlayerEvent::Play);
//! assert!(player.state().is_playing());
//! ```

pub mod analytics;
pub mod backend;
pub mod error;
pub mod events;
pub mod grading;
pub mod player;
pub mod reporter;
pub mod runtime;
pub mod scheduler;
pub mod storage;
pub mod time;
pub mod types;
pub mod widgets;

pub use analytics::{spawn_beacon, AnalyticsSink, ChannelSink, LogRecord, MemorySink, TracingSink};
pub use backend::{BackendCommand, MediaBackend, ScriptedBackend};
pub use error::{Error, Result};
pub use events::{EventBus, EventKind, PlayerEvent, SeekKind};
pub use grading::{
    create_grader, GradePromise, Grader, GraderCollection, GraderConfig, GraderKind, GraderSeeds, Verdict,
};
pub use player::{Context, Outbound, Player, PlayerBuilder, PlayerState};
pub use reporter::{GradeReporter, HttpGradeReporter, NoopReporter};
pub use runtime::{Command, PlayerRuntime, Snapshot};
pub use scheduler::{TimerHandle, TimerTag};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use types::*;
pub use widgets::{
    ControlsVisibility, EventsPlugin, PlaybackControls, PlayerWidget, ProgressSlider, QualityControl,
    SliderPhase, WidgetKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "LMS video core initialized");
}
