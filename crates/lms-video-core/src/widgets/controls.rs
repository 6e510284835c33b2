//! Playback controls
//!
//! Transport bar visibility, the `elapsed / total` time display and the
//! play/pause button. HTML5 players with auto-hide enabled hide the bar after
//! a period of inactivity; YouTube players never do.

use super::{PlayerWidget, WidgetKind};
use crate::events::{EventKind, PlayerEvent};
use crate::player::Context;
use crate::scheduler::{TimerHandle, TimerTag};
use crate::time;
use crate::types::{ClipBounds, PlayerConfig};
use std::any::Any;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlsVisibility {
    Visible,
    /// Fading out
    Hiding,
    Invisible,
}

#[derive(Debug)]
pub struct PlaybackControls {
    visibility: ControlsVisibility,
    autohide: bool,
    fade_out: Duration,
    hide_timer: Option<TimerHandle>,
    fade_timer: Option<TimerHandle>,
    vcr_text: Option<String>,
    playing: bool,
}

impl PlaybackControls {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            visibility: ControlsVisibility::Invisible,
            autohide: config.autohide_enabled(),
            fade_out: Duration::from_millis(config.fade_out_timeout),
            hide_timer: None,
            fade_timer: None,
            vcr_text: config.layout.vcr.then(String::new),
            playing: false,
        }
    }

    pub fn visibility(&self) -> ControlsVisibility {
        self.visibility
    }

    /// `elapsed / total` display; `None` without a VCR container
    pub fn vcr_text(&self) -> Option<&str> {
        self.vcr_text.as_deref()
    }

    /// Play/pause button shows the pause glyph
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn autohide(&self) -> bool {
        self.autohide
    }

    pub fn has_hide_timer(&self) -> bool {
        self.hide_timer.is_some()
    }

    /// Reveal the bar once the player is ready
    pub fn show(&mut self, ctx: &mut Context<'_>) {
        self.visibility = ControlsVisibility::Visible;
        if self.autohide {
            self.restart_hide_timer(ctx);
        }
    }

    /// Bring the bar back after user activity and restart the inactivity timer
    pub fn show_controls(&mut self, ctx: &mut Context<'_>) {
        if !self.autohide {
            return;
        }

        if let Some(timer) = self.fade_timer.take() {
            ctx.cancel(timer);
        }
        self.visibility = ControlsVisibility::Visible;
        self.restart_hide_timer(ctx);
    }

    /// Start fading out; no-op while captions are visible
    pub fn hide_controls(&mut self, ctx: &mut Context<'_>) {
        self.hide_timer = None;
        if !ctx.state().captions_hidden() {
            return;
        }

        self.visibility = ControlsVisibility::Hiding;
        if let Some(timer) = self.fade_timer.take() {
            ctx.cancel(timer);
        }
        self.fade_timer = Some(ctx.schedule(self.fade_out, TimerTag::ControlsFade));
    }

    fn restart_hide_timer(&mut self, ctx: &mut Context<'_>) {
        if let Some(timer) = self.hide_timer.take() {
            ctx.cancel(timer);
        }
        // Captions overlap the bar, it stays up while they show
        if ctx.state().captions_hidden() {
            self.hide_timer = Some(ctx.schedule(self.fade_out, TimerTag::ControlsHide));
        }
    }

    fn cancel_timers(&mut self, ctx: &mut Context<'_>) {
        if let Some(timer) = self.hide_timer.take() {
            ctx.cancel(timer);
        }
        if let Some(timer) = self.fade_timer.take() {
            ctx.cancel(timer);
        }
    }

    /// Update the time display, normalized to the clip
    pub fn update_vcr_vid_time(&mut self, time: f64, duration: f64, config: &PlayerConfig) {
        let Some(text) = self.vcr_text.as_mut() else {
            return;
        };

        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let clip = ClipBounds::resolve(config, duration);
        let total = clip.duration_within(duration);
        let elapsed = clip.elapsed(time).min(total);

        *text = format!("{} / {}", time::format(elapsed, false), time::format(total, false));
    }
}

impl PlayerWidget for PlaybackControls {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Controls
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        let mut kinds = vec![
            EventKind::Ready,
            EventKind::Play,
            EventKind::Pause,
            EventKind::Ended,
            EventKind::TimeUpdate,
            EventKind::VcrTimeUpdate,
            EventKind::TogglePlayback,
        ];
        if self.autohide {
            kinds.extend([EventKind::UserActivity, EventKind::CaptionsShown, EventKind::CaptionsHidden]);
        }
        kinds
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
        match event {
            PlayerEvent::Ready => self.show(ctx),
            PlayerEvent::Play => self.playing = true,
            PlayerEvent::Pause | PlayerEvent::Ended => self.playing = false,
            PlayerEvent::TimeUpdate { time, duration } | PlayerEvent::VcrTimeUpdate { time, duration } => {
                self.update_vcr_vid_time(*time, *duration, ctx.state().config());
            }
            PlayerEvent::TogglePlayback => {
                if ctx.state().is_playing() {
                    ctx.backend().pause();
                } else {
                    ctx.backend().play();
                }
            }
            PlayerEvent::UserActivity => self.show_controls(ctx),
            PlayerEvent::CaptionsShown => {
                self.cancel_timers(ctx);
                self.visibility = ControlsVisibility::Visible;
            }
            PlayerEvent::CaptionsHidden => self.show_controls(ctx),
            _ => {}
        }
    }

    fn on_timer(&mut self, tag: TimerTag, ctx: &mut Context<'_>) {
        match tag {
            TimerTag::ControlsHide => self.hide_controls(ctx),
            TimerTag::ControlsFade => {
                self.fade_timer = None;
                self.visibility = ControlsVisibility::Invisible;
                debug!("Controls hidden");
            }
            _ => {}
        }
    }

    fn destroy(&mut self, ctx: &mut Context<'_>) {
        self.cancel_timers(ctx);
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
    use crate::types::VideoSource;

    fn autohide_config() -> PlayerConfig {
        PlayerConfig {
            autohide_html5: true,
            fade_out_timeout: 1000,
            ..Default::default()
        }
    }

    fn player_with(config: PlayerConfig) -> (Player, ScriptedBackend) {
        let backend = ScriptedBackend::new(300.0);
        let mut player = Player::builder(config.clone()).backend(backend.clone()).build().unwrap();
        player.attach(Box::new(PlaybackControls::new(&config))).unwrap();
        (player, backend)
    }

    fn controls(player: &Player) -> &PlaybackControls {
        player.widget::<PlaybackControls>().unwrap()
    }

    #[test]
    fn test_autohide_cycle() {
        let (mut player, _) = player_with(autohide_config());
        player.emit(PlayerEvent::Ready);
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Visible);

        player.advance(Duration::from_millis(1000));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Hiding);

        player.emit(PlayerEvent::UserActivity);
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Visible);

        player.advance(Duration::from_millis(2000));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Invisible);
        assert_eq!(player.pending_timers(), 0);
    }

    #[test]
    fn test_rapid_activity_keeps_one_hide_timer() {
        let (mut player, _) = player_with(autohide_config());
        player.emit(PlayerEvent::Ready);

        for _ in 0..10 {
            player.emit(PlayerEvent::UserActivity);
            player.advance(Duration::from_millis(100));
        }
        assert_eq!(player.pending_timers_for(WidgetKind::Controls), 1);
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Visible);
    }

    #[test]
    fn test_activity_during_fade_restarts_hide_timer() {
        let (mut player, _) = player_with(autohide_config());
        player.emit(PlayerEvent::Ready);
        player.advance(Duration::from_millis(1000));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Hiding);

        player.emit(PlayerEvent::UserActivity);
        assert_eq!(player.pending_timers_for(WidgetKind::Controls), 1);
        assert!(controls(&player).has_hide_timer());

        player.advance(Duration::from_millis(999));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Visible);
        player.advance(Duration::from_millis(1));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Hiding);
    }

    #[test]
    fn test_youtube_never_autohides() {
        let mut config = autohide_config();
        config.source = VideoSource::Youtube { id: "abc123".into() };
        let (mut player, _) = player_with(config);

        player.emit(PlayerEvent::Ready);
        player.emit(PlayerEvent::UserActivity);
        assert_eq!(player.pending_timers(), 0);
        assert_eq!(player.listener_count_for(WidgetKind::Controls), 7);
    }

    #[test]
    fn test_captions_block_hiding() {
        let (mut player, _) = player_with(autohide_config());
        player.emit(PlayerEvent::Ready);
        player.emit(PlayerEvent::CaptionsShown);
        assert_eq!(player.pending_timers(), 0);

        player.emit(PlayerEvent::UserActivity);
        player.advance(Duration::from_millis(5000));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Visible);

        player.emit(PlayerEvent::CaptionsHidden);
        player.advance(Duration::from_millis(1000));
        assert_eq!(controls(&player).visibility(), ControlsVisibility::Hiding);
    }

    #[test]
    fn test_vcr_time_normalized_to_clip() {
        let config = PlayerConfig {
            start_time: 60.0,
            end_time: Some(1000.0),
            ..Default::default()
        };
        let (mut player, _) = player_with(config);

        player.emit(PlayerEvent::TimeUpdate { time: 150.0, duration: 300.0 });
        assert_eq!(controls(&player).vcr_text(), Some("1:30 / 4:00"));
    }

    #[test]
    fn test_toggle_playback() {
        let (mut player, backend) = player_with(PlayerConfig::default());
        player.emit(PlayerEvent::TogglePlayback);
        player.emit(PlayerEvent::Play);
        assert!(controls(&player).is_playing());
        player.emit(PlayerEvent::TogglePlayback);

        assert_eq!(backend.commands(), vec![BackendCommand::Play, BackendCommand::Pause]);
    }

    #[test]
    fn test_destroy_clears_hide_timer() {
        let (mut player, _) = player_with(autohide_config());
        player.emit(PlayerEvent::Ready);
        assert_eq!(player.pending_timers(), 1);

        player.destroy();
        assert_eq!(player.pending_timers(), 0);
        assert!(player.widget::<PlaybackControls>().is_none());
    }
}
