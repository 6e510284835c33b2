//! Player widgets
//!
//! Each widget owns its own state, subscribes to the events it needs and
//! reaches the rest of the player only through [`Context`].

pub mod controls;
pub mod events_plugin;
pub mod progress_slider;
pub mod quality;

pub use controls::{ControlsVisibility, PlaybackControls};
pub use events_plugin::EventsPlugin;
pub use progress_slider::{ProgressSlider, SliderHandle, SliderPhase, SliderRegion};
pub use quality::QualityControl;

use crate::events::{EventKind, PlayerEvent};
use crate::player::Context;
use crate::scheduler::TimerTag;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Widget slot; at most one widget of each kind per player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    ProgressSlider,
    Controls,
    QualityControl,
    EventsPlugin,
    Graders,
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetKind::ProgressSlider => write!(f, "progress_slider"),
            WidgetKind::Controls => write!(f, "controls"),
            WidgetKind::QualityControl => write!(f, "quality_control"),
            WidgetKind::EventsPlugin => write!(f, "events_plugin"),
            WidgetKind::Graders => write!(f, "graders"),
        }
    }
}

/// Capability shared by every widget attached to a player
pub trait PlayerWidget: Send + 'static {
    fn kind(&self) -> WidgetKind;

    /// Events delivered to [`PlayerWidget::handle`] once attached
    fn subscriptions(&self) -> Vec<EventKind>;

    /// Called once when attached
    fn init(&mut self, _ctx: &mut Context<'_>) {}

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>);

    /// Called when a timer scheduled by this widget fires
    fn on_timer(&mut self, _tag: TimerTag, _ctx: &mut Context<'_>) {}

    /// Release widget state; listeners and timers are removed by the player afterwards
    fn destroy(&mut self, _ctx: &mut Context<'_>) {}

    fn as_any(&self) -> &dyn Any;
}
