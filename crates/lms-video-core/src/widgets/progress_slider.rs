//! Progress slider
//!
//! Turns drags into seeks. While a drag is in progress, and for a short
//! settling delay after it stops, the slider is frozen so that periodic time
//! updates cannot snap the handle back.

use super::{PlayerWidget, WidgetKind};
use crate::events::{EventKind, PlayerEvent, SeekKind};
use crate::player::{Context, PlayerState};
use crate::scheduler::{TimerHandle, TimerTag};
use crate::time;
use crate::types::ClipBounds;
use std::any::Any;
use std::time::Duration;
use tracing::debug;

/// Delay between a drag stop and the slider accepting time updates again
pub const UNFREEZE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderPhase {
    Idle,
    Dragging,
    /// Drag stopped, waiting for the unfreeze timer
    Settling,
}

/// Range control state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliderHandle {
    pub value: f64,
    pub max: f64,
    /// Elapsed time within the clip
    pub aria_valuenow: f64,
    /// Clip duration
    pub aria_valuemax: f64,
    /// Spoken description of `aria_valuenow`
    pub aria_valuetext: String,
    /// Handle parked at the end of the clip
    pub at_end: bool,
}

/// Highlighted clip range, in percent of the media duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRegion {
    pub left: f64,
    pub width: f64,
}

#[derive(Debug)]
pub struct ProgressSlider {
    phase: SliderPhase,
    last_seek_value: Option<f64>,
    handle: Option<SliderHandle>,
    region: Option<SliderRegion>,
    unfreeze: Option<TimerHandle>,
}

impl Default for ProgressSlider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSlider {
    pub fn new() -> Self {
        Self {
            phase: SliderPhase::Idle,
            last_seek_value: None,
            handle: None,
            region: None,
            unfreeze: None,
        }
    }

    pub fn phase(&self) -> SliderPhase {
        self.phase
    }

    /// True while time updates are ignored
    pub fn frozen(&self) -> bool {
        self.phase != SliderPhase::Idle
    }

    pub fn last_seek_value(&self) -> Option<f64> {
        self.last_seek_value
    }

    /// `None` when the player has no slider container
    pub fn handle(&self) -> Option<&SliderHandle> {
        self.handle.as_ref()
    }

    pub fn region(&self) -> Option<SliderRegion> {
        self.region
    }

    fn build_slider(&mut self, state: &PlayerState) {
        let mut handle = SliderHandle::default();
        let clip = state.clip();
        handle.max = clip.end_or(state.duration());
        describe(&mut handle, &clip, state.current_time(), state.duration());

        self.handle = Some(handle);
        self.update_region(&clip, state.duration());
    }

    fn update_region(&mut self, clip: &ClipBounds, duration: f64) {
        if duration <= 0.0 {
            return;
        }
        let end = clip.end_or(duration);
        self.region = Some(SliderRegion {
            left: clip.start / duration * 100.0,
            width: (end - clip.start) / duration * 100.0,
        });
    }

    fn on_slide(&mut self, time: f64, ctx: &mut Context<'_>) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        // Freeze before anything can observe the new position
        self.phase = SliderPhase::Dragging;
        if let Some(timer) = self.unfreeze.take() {
            ctx.cancel(timer);
        }
        self.last_seek_value = Some(time);

        let state = ctx.state();
        let (clip, duration) = (state.clip(), state.duration());
        handle.value = time;
        describe(handle, &clip, time, duration);

        ctx.trigger(PlayerEvent::VcrTimeUpdate { time, duration });
        ctx.trigger(PlayerEvent::SeekRequest { time, kind: SeekKind::Slide });
    }

    fn on_stop(&mut self, time: f64, ctx: &mut Context<'_>) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        self.phase = SliderPhase::Settling;
        if self.last_seek_value != Some(time) {
            ctx.trigger(PlayerEvent::SeekRequest { time, kind: SeekKind::Slide });
        }
        self.last_seek_value = Some(time);

        let state = ctx.state();
        let (clip, duration) = (state.clip(), state.duration());
        handle.value = time;
        describe(handle, &clip, time, duration);

        if let Some(timer) = self.unfreeze.take() {
            ctx.cancel(timer);
        }
        self.unfreeze = Some(ctx.schedule(UNFREEZE_DELAY, TimerTag::SliderUnfreeze));
    }

    fn update_play_time(&mut self, time: f64, duration: f64, ctx: &Context<'_>) {
        if self.frozen() {
            debug!(time, "Slider frozen, skipping time update");
            return;
        }
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let time = if time.is_finite() { time.floor() } else { 0.0 };
        let duration = if duration.is_finite() { duration.floor() } else { 0.0 };
        let clip = ClipBounds::resolve(ctx.state().config(), duration);

        // Configured ends past the real duration are clamped by resolve
        handle.max = clip.end_or(duration);
        handle.value = time;
        describe(handle, &clip, time, duration);

        self.update_region(&clip, duration);
    }
}

fn describe(handle: &mut SliderHandle, clip: &ClipBounds, time: f64, duration: f64) {
    let elapsed = clip.elapsed(time);
    handle.aria_valuenow = elapsed;
    handle.aria_valuemax = clip.duration_within(duration);
    handle.aria_valuetext = time::describe(elapsed);
}

impl PlayerWidget for ProgressSlider {
    fn kind(&self) -> WidgetKind {
        WidgetKind::ProgressSlider
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Ready,
            EventKind::Play,
            EventKind::Ended,
            EventKind::EndTimeReached,
            EventKind::TimeUpdate,
            EventKind::SliderSlide,
            EventKind::SliderStop,
        ]
    }

    fn init(&mut self, ctx: &mut Context<'_>) {
        if !ctx.state().config().layout.slider {
            debug!("No slider container");
            ctx.set_subscriptions(&[]);
            return;
        }
        self.build_slider(ctx.state());
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
        match event {
            PlayerEvent::SliderSlide { time } => self.on_slide(*time, ctx),
            PlayerEvent::SliderStop { time } => self.on_stop(*time, ctx),
            PlayerEvent::TimeUpdate { time, duration } => self.update_play_time(*time, *duration, ctx),
            PlayerEvent::Ready => {
                let state = ctx.state();
                self.update_region(&state.clip(), state.duration());
            }
            PlayerEvent::Ended | PlayerEvent::EndTimeReached => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.at_end = true;
                }
            }
            PlayerEvent::Play => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.at_end = false;
                }
            }
            _ => {}
        }
    }

    fn on_timer(&mut self, tag: TimerTag, _ctx: &mut Context<'_>) {
        if tag == TimerTag::SliderUnfreeze {
            self.unfreeze = None;
            self.phase = SliderPhase::Idle;
            debug!("Slider unfrozen");
        }
    }

    fn destroy(&mut self, _ctx: &mut Context<'_>) {
        self.unfreeze = None;
        self.handle = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, ScriptedBackend};
    use crate::player::Player;
    use crate::types::PlayerConfig;

    fn player_with(config: PlayerConfig) -> (Player, ScriptedBackend) {
        let backend = ScriptedBackend::new(120.0);
        let mut player = Player::builder(config).backend(backend.clone()).build().unwrap();
        player.attach(Box::new(ProgressSlider::new())).unwrap();
        (player, backend)
    }

    fn slider(player: &Player) -> &ProgressSlider {
        player.widget::<ProgressSlider>().unwrap()
    }

    #[test]
    fn test_slide_then_stop_unfreezes_once() {
        let (mut player, backend) = player_with(PlayerConfig::default());

        player.emit(PlayerEvent::SliderSlide { time: 30.0 });
        assert!(slider(&player).frozen());
        assert_eq!(slider(&player).phase(), SliderPhase::Dragging);

        player.emit(PlayerEvent::SliderStop { time: 30.0 });
        assert_eq!(slider(&player).phase(), SliderPhase::Settling);
        // Same value as the last slide, no second seek
        assert_eq!(backend.commands(), vec![BackendCommand::Seek { time: 30.0 }]);

        player.advance(Duration::from_millis(199));
        assert!(slider(&player).frozen());
        player.advance(Duration::from_millis(1));
        assert!(!slider(&player).frozen());
        assert_eq!(player.pending_timers(), 0);
    }

    #[test]
    fn test_click_seeks_on_stop() {
        let (mut player, backend) = player_with(PlayerConfig::default());
        player.emit(PlayerEvent::SliderStop { time: 45.0 });

        assert_eq!(backend.commands(), vec![BackendCommand::Seek { time: 45.0 }]);
        assert_eq!(slider(&player).last_seek_value(), Some(45.0));
    }

    #[test]
    fn test_frozen_slider_ignores_time_updates() {
        let (mut player, backend) = player_with(PlayerConfig::default());
        player.emit(PlayerEvent::SliderSlide { time: 30.0 });

        backend.set_time(12.0);
        player.sync_time();
        assert_eq!(slider(&player).handle().unwrap().value, 30.0);

        player.emit(PlayerEvent::SliderStop { time: 30.0 });
        player.advance(UNFREEZE_DELAY);
        player.sync_time();
        assert_eq!(slider(&player).handle().unwrap().value, 12.0);
    }

    #[test]
    fn test_slide_during_settling_keeps_single_timer() {
        let (mut player, _) = player_with(PlayerConfig::default());
        player.emit(PlayerEvent::SliderSlide { time: 10.0 });
        player.emit(PlayerEvent::SliderStop { time: 10.0 });
        player.advance(Duration::from_millis(100));

        player.emit(PlayerEvent::SliderSlide { time: 20.0 });
        assert_eq!(player.pending_timers_for(WidgetKind::ProgressSlider), 0);
        player.emit(PlayerEvent::SliderStop { time: 20.0 });
        assert_eq!(player.pending_timers_for(WidgetKind::ProgressSlider), 1);

        player.advance(Duration::from_millis(150));
        assert!(slider(&player).frozen());
        player.advance(Duration::from_millis(50));
        assert!(!slider(&player).frozen());
    }

    #[test]
    fn test_max_clamped_to_duration() {
        let config = PlayerConfig {
            start_time: 10.0,
            end_time: Some(500.0),
            ..Default::default()
        };
        let (mut player, _) = player_with(config);
        player.emit(PlayerEvent::TimeUpdate { time: 70.4, duration: 120.0 });

        let handle = slider(&player).handle().unwrap();
        assert_eq!(handle.max, 120.0);
        assert_eq!(handle.value, 70.0);
        assert_eq!(handle.aria_valuenow, 60.0);
        assert_eq!(handle.aria_valuemax, 110.0);
        assert_eq!(handle.aria_valuetext, "1 minute 0 seconds");
    }

    #[test]
    fn test_region_and_end_marker() {
        let config = PlayerConfig {
            start_time: 30.0,
            end_time: Some(90.0),
            ..Default::default()
        };
        let (mut player, _) = player_with(config);

        let region = slider(&player).region().unwrap();
        assert_eq!(region.left, 25.0);
        assert_eq!(region.width, 50.0);

        player.emit(PlayerEvent::EndTimeReached);
        assert!(slider(&player).handle().unwrap().at_end);
        player.emit(PlayerEvent::Play);
        assert!(!slider(&player).handle().unwrap().at_end);
    }

    #[test]
    fn test_missing_container_is_noop() {
        let mut config = PlayerConfig::default();
        config.layout.slider = false;
        let (mut player, backend) = player_with(config);

        assert!(slider(&player).handle().is_none());
        assert_eq!(player.listener_count_for(WidgetKind::ProgressSlider), 0);

        player.emit(PlayerEvent::SliderSlide { time: 30.0 });
        assert!(!slider(&player).frozen());
        assert!(backend.commands().is_empty());
    }
}
