//! YouTube quality control
//!
//! Asks the backend for the available levels on first play and shows the HD
//! toggle when any HD level exists. The initial quality is always forced to
//! `large` so that resizing the iframe never upgrades it behind the user's back.

use super::{PlayerWidget, WidgetKind};
use crate::events::{EventKind, PlayerEvent};
use crate::player::{Context, PlayerState};
use crate::types::VideoQuality;
use std::any::Any;
use tracing::{debug, info};

#[derive(Debug)]
pub struct QualityControl {
    quality: VideoQuality,
    available_hd: Vec<VideoQuality>,
    visible: bool,
    active: bool,
    requested: bool,
    awaiting_levels: bool,
}

impl QualityControl {
    /// `None` for non-YouTube sources or without a secondary controls container
    pub fn new(state: &PlayerState) -> Option<Self> {
        if !state.is_youtube() || !state.config().layout.secondary_controls {
            return None;
        }

        Some(Self {
            quality: VideoQuality::Large,
            available_hd: Vec::new(),
            visible: false,
            active: false,
            requested: false,
            awaiting_levels: false,
        })
    }

    pub fn quality(&self) -> VideoQuality {
        self.quality
    }

    /// HD levels reported by the backend
    pub fn available_hd(&self) -> &[VideoQuality] {
        &self.available_hd
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Button rendered as active (HD on)
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn label(&self) -> &'static str {
        if self.active {
            "HD on"
        } else {
            "HD off"
        }
    }

    fn fetch_available_qualities(&mut self, ctx: &mut Context<'_>) {
        if self.requested {
            return;
        }
        self.requested = true;
        self.awaiting_levels = true;

        debug!("Requesting quality levels");
        ctx.backend().request_quality_levels();
        ctx.unsubscribe(EventKind::Play);
    }

    fn on_levels(&mut self, levels: &[VideoQuality], ctx: &mut Context<'_>) {
        if !self.awaiting_levels {
            debug!("Ignoring unsolicited quality levels");
            return;
        }
        self.awaiting_levels = false;

        self.available_hd = levels.iter().copied().filter(VideoQuality::is_hd).collect();
        info!(levels = levels.len(), hd = self.available_hd.len(), "Quality levels received");

        if !self.available_hd.is_empty() {
            self.visible = true;
            self.on_quality_change(self.quality);
        }
        self.force_large(ctx);
    }

    fn force_large(&mut self, ctx: &mut Context<'_>) {
        self.quality = VideoQuality::Large;
        ctx.backend().set_playback_quality(VideoQuality::Large);
    }

    /// Reflect an accepted quality in the button state
    pub fn on_quality_change(&mut self, value: VideoQuality) {
        self.active = value.is_hd();
    }

    fn toggle_quality(&mut self, ctx: &mut Context<'_>) {
        if self.available_hd.is_empty() {
            return;
        }

        let new_quality = if self.quality.is_hd() {
            VideoQuality::Large
        } else {
            VideoQuality::Highres
        };
        self.quality = new_quality;
        ctx.backend().set_playback_quality(new_quality);
    }
}

impl PlayerWidget for QualityControl {
    fn kind(&self) -> WidgetKind {
        WidgetKind::QualityControl
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Play,
            EventKind::QualityLevels,
            EventKind::QualityLevelsUnavailable,
            EventKind::QualityChange,
            EventKind::ToggleQuality,
        ]
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
        match event {
            PlayerEvent::Play => self.fetch_available_qualities(ctx),
            PlayerEvent::QualityLevels { levels } => self.on_levels(levels, ctx),
            PlayerEvent::QualityLevelsUnavailable => {
                if self.awaiting_levels {
                    self.awaiting_levels = false;
                    self.force_large(ctx);
                }
            }
            PlayerEvent::QualityChange { quality } => {
                self.quality = *quality;
                self.on_quality_change(*quality);
            }
            PlayerEvent::ToggleQuality => self.toggle_quality(ctx),
            _ => {}
        }
    }

    fn destroy(&mut self, _ctx: &mut Context<'_>) {
        self.awaiting_levels = false;
        self.visible = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
