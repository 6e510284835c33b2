//! Analytics events plugin
//!
//! Maps player lifecycle events to analytics log calls. Every payload carries
//! `id`, `code` and the clip `duration`, plus the event fields and the
//! configured `logData`. Logged times are relative to the clip start.

use super::{PlayerWidget, WidgetKind};
use crate::events::{EventKind, PlayerEvent};
use crate::player::Context;
use crate::time;
use serde_json::{json, Map, Value};
use std::any::Any;

#[derive(Debug)]
pub struct EventsPlugin {
    emit_play_video_event: bool,
}

impl Default for EventsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsPlugin {
    pub fn new() -> Self {
        Self { emit_play_video_event: true }
    }

    /// Next `Play` will be logged
    pub fn will_log_play(&self) -> bool {
        self.emit_play_video_event
    }

    fn log(&self, ctx: &mut Context<'_>, event_name: &str, fields: Value) {
        let state = ctx.state();
        let config = state.config();

        let mut payload = Map::new();
        payload.insert("id".into(), Value::from(config.id.clone()));
        payload.insert("code".into(), Value::from(config.source.code()));
        payload.insert("duration".into(), Value::from(state.clip_duration()));

        if let Value::Object(fields) = fields {
            payload.extend(fields);
        }
        payload.extend(config.log_data.iter().map(|(k, v)| (k.clone(), v.clone())));

        ctx.log(event_name, payload);
    }
}

/// Current time relative to the clip start
fn elapsed_now(ctx: &Context<'_>) -> f64 {
    let state = ctx.state();
    state.elapsed(state.current_time())
}

impl PlayerWidget for EventsPlugin {
    fn kind(&self) -> WidgetKind {
        WidgetKind::EventsPlugin
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::Ready,
            EventKind::Play,
            EventKind::Pause,
            EventKind::Complete,
            EventKind::Ended,
            EventKind::Stop,
            EventKind::Seek,
            EventKind::Skip,
            EventKind::SpeedChange,
            EventKind::AutoAdvanceChange,
            EventKind::LanguageMenuShown,
            EventKind::LanguageMenuHidden,
            EventKind::TranscriptShown,
            EventKind::TranscriptHidden,
            EventKind::CaptionsShown,
            EventKind::CaptionsHidden,
        ]
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
        match event {
            PlayerEvent::Ready => self.log(ctx, "load_video", json!({})),
            PlayerEvent::Play => {
                if self.emit_play_video_event {
                    let current = elapsed_now(ctx);
                    self.log(ctx, "play_video", json!({ "currentTime": current }));
                    self.emit_play_video_event = false;
                }
            }
            PlayerEvent::Pause => {
                let current = elapsed_now(ctx);
                self.log(ctx, "pause_video", json!({ "currentTime": current }));
                self.emit_play_video_event = true;
            }
            PlayerEvent::Complete => {
                let current = elapsed_now(ctx);
                self.log(ctx, "complete_video", json!({ "currentTime": current }));
            }
            PlayerEvent::Ended | PlayerEvent::Stop => {
                let current = elapsed_now(ctx);
                self.log(ctx, "stop_video", json!({ "currentTime": current }));
                self.emit_play_video_event = true;
            }
            PlayerEvent::Seek { time, old_time, kind } => {
                let state = ctx.state();
                let fields = json!({
                    "old_time": state.elapsed(*old_time),
                    "new_time": state.elapsed(*time),
                    "type": kind.as_str(),
                });
                self.log(ctx, "seek_video", fields);
                self.emit_play_video_event = true;
            }
            PlayerEvent::Skip { do_not_show_again } => {
                let name = if *do_not_show_again { "do_not_show_again_video" } else { "skip_video" };
                let current = elapsed_now(ctx);
                self.log(ctx, name, json!({ "currentTime": current }));
            }
            PlayerEvent::SpeedChange { new_speed, old_speed } => {
                let fields = json!({
                    "current_time": elapsed_now(ctx),
                    "old_speed": time::format_speed(*old_speed),
                    "new_speed": time::format_speed(*new_speed),
                });
                self.log(ctx, "speed_change_video", fields);
            }
            PlayerEvent::AutoAdvanceChange { enabled } => {
                self.log(ctx, "auto_advance_change_video", json!({ "enabled": enabled }));
            }
            PlayerEvent::LanguageMenuShown => self.log(ctx, "edx.video.language_menu.shown", json!({})),
            PlayerEvent::LanguageMenuHidden => {
                let language = ctx.state().config().lang.clone();
                self.log(ctx, "edx.video.language_menu.hidden", json!({ "language": language }));
            }
            PlayerEvent::TranscriptShown => {
                let current = elapsed_now(ctx);
                self.log(ctx, "show_transcript", json!({ "current_time": current }));
            }
            PlayerEvent::TranscriptHidden => {
                let current = elapsed_now(ctx);
                self.log(ctx, "hide_transcript", json!({ "current_time": current }));
            }
            PlayerEvent::CaptionsShown => {
                let current = elapsed_now(ctx);
                self.log(ctx, "edx.video.closed_captions.shown", json!({ "current_time": current }));
            }
            PlayerEvent::CaptionsHidden => {
                let current = elapsed_now(ctx);
                self.log(ctx, "edx.video.closed_captions.hidden", json!({ "current_time": current }));
            }
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
