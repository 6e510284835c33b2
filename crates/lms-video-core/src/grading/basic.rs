//! Resolves on the first sign of engagement

use super::{Grader, GraderKind, Verdict};
use crate::events::{EventKind, PlayerEvent};
use crate::player::Context;

/// Resolves on the first `Play`, or on a download click
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicGrader;

impl Grader for BasicGrader {
    fn kind(&self) -> GraderKind {
        GraderKind::BasicGrader
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Play, EventKind::DownloadClicked]
    }

    fn handle(&mut self, event: &PlayerEvent, _ctx: &mut Context<'_>) -> Verdict {
        match event {
            PlayerEvent::Play | PlayerEvent::DownloadClicked => Verdict::Resolved,
            _ => Verdict::Pending,
        }
    }
}
