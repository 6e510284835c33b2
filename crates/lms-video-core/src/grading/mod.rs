//! Grader collection
//!
//! Graders watch playback and decide, from viewing behaviour alone, whether
//! a scoring condition is met. Each grader resolves at most once; resolution
//! emits [`PlayerEvent::Graded`] and queues an [`Outbound::Graded`]
//! notification for the grade reporter.

pub mod basic;
pub mod on_end;
pub mod on_percent;

pub use basic::BasicGrader;
pub use on_end::GradeOnEnd;
pub use on_percent::GradeOnPercent;

use crate::error::{Error, Result};
use crate::events::{EventKind, PlayerEvent};
use crate::player::{Context, Outbound, PlayerState};
use crate::scheduler::TimerTag;
use crate::widgets::{PlayerWidget, WidgetKind};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{debug, info};

/// Grading strategy, keyed by its configuration name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraderKind {
    BasicGrader,
    GradeOnEnd,
    GradeOnPercent,
}

impl GraderKind {
    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            GraderKind::BasicGrader => "basic_grader",
            GraderKind::GradeOnEnd => "grade_on_end",
            GraderKind::GradeOnPercent => "grade_on_percent",
        }
    }
}

impl GraderKind {
    /// Local storage key, scoped to one video
    pub fn storage_key(&self, video_id: &str) -> String {
        format!("{}:{}", video_id, self.name())
    }
}

impl std::fmt::Display for GraderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-grader configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraderConfig {
    /// Already graded; the grader is not constructed
    pub is_scored: bool,
    /// Strategy parameter (visited buckets beyond which the percent grader resolves)
    pub grader_value: u32,
    /// Server-persisted timeline
    pub grader_state: Option<Vec<u8>>,
}

/// In-memory timelines carried over from a previous player instance
pub type GraderSeeds = BTreeMap<GraderKind, Vec<u8>>;

/// Timers a grader can schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraderTimer {
    /// Zero-delay check run once the player state has settled
    Deferred,
    /// Trailing edge of the progress throttle
    Throttle,
}

/// Outcome of feeding an event to a grader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Resolved,
}

/// A grading strategy
pub trait Grader: Send {
    fn kind(&self) -> GraderKind;

    /// Events this grader needs while unresolved
    fn subscriptions(&self) -> &'static [EventKind];

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) -> Verdict;

    fn on_timer(&mut self, _timer: GraderTimer, _ctx: &mut Context<'_>) -> Verdict {
        Verdict::Pending
    }

    /// Timeline to persist, for graders that keep one
    fn get_state(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Map a configured grader to its strategy; `None` when already scored
pub fn create_grader(kind: GraderKind, config: &GraderConfig, seed: Option<Vec<u8>>) -> Option<Box<dyn Grader>> {
    if config.is_scored {
        debug!(grader = %kind, "Already scored, grader not created");
        return None;
    }

    Some(match kind {
        GraderKind::BasicGrader => Box::new(BasicGrader),
        GraderKind::GradeOnEnd => Box::new(GradeOnEnd::new()),
        GraderKind::GradeOnPercent => Box::new(GradeOnPercent::new(config, seed)),
    })
}

/// Single-assignment completion flag
#[derive(Debug)]
pub struct Deferred {
    tx: watch::Sender<bool>,
}

impl Deferred {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Resolve; false when it was already resolved
    pub fn resolve(&self) -> bool {
        self.tx.send_if_modified(|resolved| {
            if *resolved {
                false
            } else {
                *resolved = true;
                true
            }
        })
    }

    pub fn is_resolved(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn promise(&self) -> GradePromise {
        GradePromise { rx: self.tx.subscribe() }
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

/// Awaitable side of a [`Deferred`]
#[derive(Debug, Clone)]
pub struct GradePromise {
    rx: watch::Receiver<bool>,
}

impl GradePromise {
    pub fn is_resolved(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for resolution; fails when the grader is dropped unresolved
    pub async fn resolved(mut self) -> Result<()> {
        self.rx
            .wait_for(|resolved| *resolved)
            .await
            .map(|_| ())
            .map_err(|_| Error::ChannelClosed)
    }
}

struct Entry {
    grader: Box<dyn Grader>,
    deferred: Deferred,
}

impl Entry {
    /// Apply a verdict; true when this call resolved the grader
    fn settle(&mut self, verdict: Verdict, ctx: &mut Context<'_>) -> bool {
        if verdict != Verdict::Resolved || !self.deferred.resolve() {
            return false;
        }

        let grader = self.grader.kind();
        info!(%grader, "Grader resolved");
        ctx.trigger(PlayerEvent::Graded { grader });
        ctx.notify(Outbound::Graded { grader });
        true
    }
}

/// Widget running every configured grader
pub struct GraderCollection {
    entries: Vec<Entry>,
}

impl GraderCollection {
    /// `None` when the video is not scored or every grader is already scored
    pub fn new(state: &PlayerState, seeds: &GraderSeeds) -> Option<Self> {
        let config = state.config();
        if !config.has_score {
            return None;
        }

        let entries: Vec<Entry> = config
            .graders
            .iter()
            .filter_map(|(kind, grader_config)| create_grader(*kind, grader_config, seeds.get(kind).cloned()))
            .map(|grader| Entry { grader, deferred: Deferred::new() })
            .collect();

        if entries.is_empty() {
            debug!("No grader left to run");
            return None;
        }
        Some(Self { entries })
    }

    pub fn kinds(&self) -> Vec<GraderKind> {
        self.entries.iter().map(|e| e.grader.kind()).collect()
    }

    fn entry(&self, kind: GraderKind) -> Option<&Entry> {
        self.entries.iter().find(|e| e.grader.kind() == kind)
    }

    pub fn promise(&self, kind: GraderKind) -> Option<GradePromise> {
        self.entry(kind).map(|e| e.deferred.promise())
    }

    pub fn is_resolved(&self, kind: GraderKind) -> bool {
        self.entry(kind).map(|e| e.deferred.is_resolved()).unwrap_or(false)
    }

    pub fn get_state(&self, kind: GraderKind) -> Option<Vec<u8>> {
        self.entry(kind).and_then(|e| e.grader.get_state())
    }

    /// Timelines of every grader that keeps one
    pub fn states(&self) -> GraderSeeds {
        self.entries
            .iter()
            .filter_map(|e| e.grader.get_state().map(|state| (e.grader.kind(), state)))
            .collect()
    }

    fn active_subscriptions(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self
            .entries
            .iter()
            .filter(|e| !e.deferred.is_resolved())
            .flat_map(|e| e.grader.subscriptions().iter().copied())
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

impl PlayerWidget for GraderCollection {
    fn kind(&self) -> WidgetKind {
        WidgetKind::Graders
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        self.active_subscriptions()
    }

    fn handle(&mut self, event: &PlayerEvent, ctx: &mut Context<'_>) {
        let kind = event.kind();
        let mut resolved_any = false;

        for entry in self.entries.iter_mut() {
            if entry.deferred.is_resolved() || !entry.grader.subscriptions().contains(&kind) {
                continue;
            }
            let verdict = entry.grader.handle(event, ctx);
            resolved_any |= entry.settle(verdict, ctx);
        }

        if resolved_any {
            ctx.set_subscriptions(&self.active_subscriptions());
        }
    }

    fn on_timer(&mut self, tag: TimerTag, ctx: &mut Context<'_>) {
        let TimerTag::Grader(kind, timer) = tag else {
            return;
        };

        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.grader.kind() == kind && !e.deferred.is_resolved())
        else {
            return;
        };

        let verdict = entry.grader.on_timer(timer, ctx);
        if entry.settle(verdict, ctx) {
            ctx.set_subscriptions(&self.active_subscriptions());
        }
    }

    fn destroy(&mut self, _ctx: &mut Context<'_>) {
        let pending = self.entries.iter().filter(|e| !e.deferred.is_resolved()).count();
        debug!(pending, "Grader collection destroyed");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grader_kind_names() {
        assert_eq!(GraderKind::GradeOnPercent.name(), "grade_on_percent");
        assert_eq!(GraderKind::GradeOnPercent.storage_key("video-1"), "video-1:grade_on_percent");
        let kind: GraderKind = serde_json::from_str("\"basic_grader\"").unwrap();
        assert_eq!(kind, GraderKind::BasicGrader);
    }

    #[test]
    fn test_scored_grader_not_created() {
        let config = GraderConfig { is_scored: true, ..Default::default() };
        assert!(create_grader(GraderKind::BasicGrader, &config, None).is_none());
        assert!(create_grader(GraderKind::GradeOnEnd, &GraderConfig::default(), None).is_some());
    }

    #[test]
    fn test_deferred_resolves_once() {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        assert!(!promise.is_resolved());

        assert!(deferred.resolve());
        assert!(!deferred.resolve());
        assert!(promise.is_resolved());
    }

    #[tokio::test]
    async fn test_promise_awaits_resolution() {
        let deferred = Deferred::new();
        let promise = deferred.promise();

        let waiter = tokio::spawn(promise.resolved());
        deferred.resolve();

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_promise_fails_when_dropped() {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        drop(deferred);

        assert!(matches!(promise.resolved().await, Err(Error::ChannelClosed)));
    }

    #[test]
    fn test_promise_already_resolved() {
        let deferred = Deferred::new();
        assert!(deferred.resolve());
        assert!(!deferred.resolve());

        let promise = deferred.promise();
        assert!(promise.is_resolved());
        assert!(tokio_test::block_on(promise.resolved()).is_ok());
    }
}
