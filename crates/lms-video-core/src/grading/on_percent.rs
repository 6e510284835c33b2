//! Resolves once enough of the clip has been watched
//!
//! The clip is split into buckets; a progress tick inside a bucket marks it
//! visited. The timeline survives reloads through local storage and the
//! server-side `graderState`.

use super::{Grader, GraderConfig, GraderKind, GraderTimer, Verdict};
use crate::events::{EventKind, PlayerEvent};
use crate::player::{Context, Outbound};
use crate::scheduler::{TimerHandle, TimerTag};
use crate::storage::{load_json, save_json};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default number of buckets
pub const DEFAULT_BUCKETS: usize = 100;

/// Host player progress cadence
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Bucket count for a clip of `clip_duration` seconds
///
/// Clips too short for 200 ms progress ticks to reach every one of the
/// default buckets get one bucket per second instead.
pub fn bucket_count(clip_duration: f64) -> usize {
    let clip_ms = clip_duration * 1000.0;
    if clip_ms / DEFAULT_BUCKETS as f64 >= PROGRESS_INTERVAL.as_millis() as f64 {
        DEFAULT_BUCKETS
    } else {
        (clip_duration.floor() as usize).max(1)
    }
}

/// Throttle window for a clip split into `buckets`
pub fn throttle_window(clip_duration: f64, buckets: usize) -> Duration {
    let per_bucket = Duration::from_secs_f64((clip_duration / buckets.max(1) as f64).max(0.0));
    per_bucket.max(PROGRESS_INTERVAL)
}

/// Leading and trailing edge throttle on the virtual clock
#[derive(Debug, Default)]
pub struct Throttle {
    window: Duration,
    last_run: Option<Duration>,
    pending: Option<f64>,
    timer: Option<TimerHandle>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, ..Default::default() }
    }

    /// Value to act on now, if any; otherwise it is kept for the trailing edge
    pub fn call(&mut self, value: f64, ctx: &mut Context<'_>, tag: TimerTag) -> Option<f64> {
        let now = ctx.now();
        let elapsed = self.last_run.map(|last| now.saturating_sub(last));

        match elapsed {
            Some(elapsed) if elapsed < self.window => {
                self.pending = Some(value);
                if self.timer.is_none() {
                    self.timer = Some(ctx.schedule(self.window - elapsed, tag));
                }
                None
            }
            _ => {
                self.last_run = Some(now);
                Some(value)
            }
        }
    }

    /// Trailing edge
    pub fn fire(&mut self, ctx: &mut Context<'_>) -> Option<f64> {
        self.timer = None;
        let value = self.pending.take()?;
        self.last_run = Some(ctx.now());
        Some(value)
    }
}

#[derive(Debug, Clone)]
struct Timeline {
    marks: Vec<u8>,
    throttle_window: Duration,
}

impl Timeline {
    fn visited(&self) -> usize {
        self.marks.iter().filter(|mark| **mark == 1).count()
    }
}

/// Resolves once more than `graderValue` buckets are visited
#[derive(Debug)]
pub struct GradeOnPercent {
    grader_value: u32,
    seed: Option<Vec<u8>>,
    server_state: Option<Vec<u8>>,
    timeline: Option<Timeline>,
    throttle: Throttle,
}

impl GradeOnPercent {
    pub fn new(config: &GraderConfig, seed: Option<Vec<u8>>) -> Self {
        Self {
            grader_value: config.grader_value,
            seed,
            server_state: config.grader_state.clone(),
            timeline: None,
            throttle: Throttle::default(),
        }
    }

    /// Visited buckets needed to resolve
    fn required(&self, buckets: usize) -> usize {
        (self.grader_value as usize + 1).min(buckets)
    }

    fn is_complete(&self) -> bool {
        match &self.timeline {
            Some(timeline) => timeline.visited() >= self.required(timeline.marks.len()),
            None => false,
        }
    }

    fn verdict(&self) -> Verdict {
        if self.is_complete() {
            Verdict::Resolved
        } else {
            Verdict::Pending
        }
    }

    /// Build the timeline once the clip duration is known
    fn ensure_timeline(&mut self, ctx: &mut Context<'_>) -> bool {
        if self.timeline.is_some() {
            return true;
        }

        let clip_duration = ctx.state().clip_duration();
        if clip_duration <= 0.0 {
            return false;
        }

        let buckets = bucket_count(clip_duration);
        let key = self.kind().storage_key(&ctx.state().config().id);
        let stored: Option<Vec<u8>> = load_json(ctx.storage(), &key);

        let candidates = [
            ("seed", self.seed.take()),
            ("server", self.server_state.take()),
            ("storage", stored),
        ];
        let restored = candidates.into_iter().find_map(|(origin, marks)| {
            let marks = marks?;
            if is_valid(&marks, buckets) {
                debug!(origin, visited = marks.iter().filter(|m| **m == 1).count(), "Timeline restored");
                Some(marks)
            } else {
                warn!(origin, len = marks.len(), buckets, "Discarding incompatible timeline");
                None
            }
        });

        let window = throttle_window(clip_duration, buckets);
        info!(buckets, window_ms = window.as_millis() as u64, "Timeline created");

        self.throttle = Throttle::new(window);
        self.timeline = Some(Timeline {
            marks: restored.unwrap_or_else(|| vec![0; buckets]),
            throttle_window: window,
        });
        true
    }

    fn mark(&mut self, time: f64, ctx: &mut Context<'_>) -> Verdict {
        let state = ctx.state();
        let clip = state.clip();
        let clip_duration = state.clip_duration();
        let end = clip.end_or(state.duration());

        let Some(timeline) = self.timeline.as_mut() else {
            return Verdict::Pending;
        };
        if !time.is_finite() || time < clip.start || time > end || clip_duration <= 0.0 {
            return self.verdict();
        }

        let buckets = timeline.marks.len();
        let index = ((clip.elapsed(time) / clip_duration * buckets as f64).floor() as usize).min(buckets - 1);

        if timeline.marks[index] == 0 {
            timeline.marks[index] = 1;
            let marks = timeline.marks.clone();
            debug!(index, visited = timeline.visited(), "Bucket visited");
            self.persist(marks, ctx);
        }
        self.verdict()
    }

    fn persist(&self, marks: Vec<u8>, ctx: &mut Context<'_>) {
        let grader = self.kind();
        let key = grader.storage_key(&ctx.state().config().id);
        if let Err(e) = save_json(ctx.storage_mut(), &key, &marks) {
            warn!(error = %e, "Could not store timeline");
        }
        ctx.notify(Outbound::SaveProgress { grader, timeline: marks });
    }

    pub fn throttle_window(&self) -> Option<Duration> {
        self.timeline.as_ref().map(|t| t.throttle_window)
    }
}

fn is_valid(marks: &[u8], buckets: usize) -> bool {
    marks.len() == buckets && marks.iter().all(|mark| *mark <= 1)
}

impl Grader for GradeOnPercent {
    fn kind(&self) -> GraderKind {
        GraderKind::GradeOnPercent
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        &[EventKind::Play, EventKind::Progress]
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) -> Verdict {
        match event {
            PlayerEvent::Play => {
                self.ensure_timeline(ctx);
                self.verdict()
            }
            PlayerEvent::Progress { time } => {
                if !self.ensure_timeline(ctx) {
                    return Verdict::Pending;
                }
                let tag = TimerTag::Grader(self.kind(), GraderTimer::Throttle);
                match self.throttle.call(*time, ctx, tag) {
                    Some(time) => self.mark(time, ctx),
                    None => self.verdict(),
                }
            }
            _ => Verdict::Pending,
        }
    }

    fn on_timer(&mut self, timer: GraderTimer, ctx: &mut Context<'_>) -> Verdict {
        if timer != GraderTimer::Throttle {
            return Verdict::Pending;
        }
        match self.throttle.fire(ctx) {
            Some(time) => self.mark(time, ctx),
            None => self.verdict(),
        }
    }

    fn get_state(&self) -> Option<Vec<u8>> {
        self.timeline.as_ref().map(|t| t.marks.clone())
    }
}
