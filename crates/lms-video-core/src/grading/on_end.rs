//! Resolves when the clip is watched to its end

use super::{Grader, GraderKind, GraderTimer, Verdict};
use crate::events::{EventKind, PlayerEvent};
use crate::player::{Context, PlayerState};
use crate::scheduler::{TimerHandle, TimerTag};
use std::time::Duration;
use tracing::debug;

/// Full clips resolve on `Ended`. Partial clips resolve on `EndTimeReached`
/// or on a seek landing on the end second; the media's own `Ended` is ignored
/// for them.
#[derive(Debug, Default)]
pub struct GradeOnEnd {
    seek_check: Option<TimerHandle>,
}

impl GradeOnEnd {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_partial(state: &PlayerState) -> bool {
        state.clip().is_partial(state.duration())
    }
}

impl Grader for GradeOnEnd {
    fn kind(&self) -> GraderKind {
        GraderKind::GradeOnEnd
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Ended, EventKind::EndTimeReached, EventKind::Seek]
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) -> Verdict {
        let partial = Self::is_partial(ctx.state());

        match event {
            PlayerEvent::Ended if !partial => Verdict::Resolved,
            PlayerEvent::EndTimeReached if partial => Verdict::Resolved,
            PlayerEvent::Seek { .. } if partial => {
                // Check once the seek has settled
                if let Some(handle) = self.seek_check.take() {
                    ctx.cancel(handle);
                }
                let tag = TimerTag::Grader(self.kind(), GraderTimer::Deferred);
                self.seek_check = Some(ctx.schedule(Duration::ZERO, tag));
                Verdict::Pending
            }
            _ => Verdict::Pending,
        }
    }

    fn on_timer(&mut self, timer: GraderTimer, ctx: &mut Context<'_>) -> Verdict {
        if timer != GraderTimer::Deferred {
            return Verdict::Pending;
        }
        self.seek_check = None;

        let state = ctx.state();
        let Some(end) = state.clip().end else {
            return Verdict::Pending;
        };

        let time = state.current_time();
        debug!(time, end, "Checking seek against clip end");
        if time.floor() == end.floor() {
            Verdict::Resolved
        } else {
            Verdict::Pending
        }
    }
}
