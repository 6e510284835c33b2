//! Tokio driver for a [`Player`]
//!
//! The player itself is single-threaded; the runtime owns it on one task,
//! feeds it commands over a channel, ticks its clock and time sync on an
//! interval and forwards outbound notifications to a [`GradeReporter`].

use crate::error::{Error, Result};
use crate::events::PlayerEvent;
use crate::grading::{GraderCollection, GraderKind, GraderSeeds};
use crate::player::{Outbound, Player};
use crate::reporter::GradeReporter;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default time sync period
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Command sent to the runtime task
#[derive(Debug, Clone)]
pub enum Command {
    Emit(PlayerEvent),
    SetSpeed(f64),
    Destroy,
}

/// Published player state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub current_time: f64,
    pub duration: f64,
    pub speed: f64,
    pub playing: bool,
    pub destroyed: bool,
    /// Graders resolved so far
    pub resolved: Vec<GraderKind>,
    /// Grader timelines
    pub grader_states: GraderSeeds,
}

impl Snapshot {
    fn update_from(&mut self, player: &Player) {
        let state = player.state();
        self.current_time = state.current_time();
        self.duration = state.duration();
        self.speed = state.speed();
        self.playing = state.is_playing();
        self.destroyed = state.is_destroyed();

        // Keep the last grader view once the collection is gone
        if let Some(graders) = player.widget::<GraderCollection>() {
            self.resolved = graders.kinds().into_iter().filter(|k| graders.is_resolved(*k)).collect();
            self.grader_states = graders.states();
        }
    }
}

/// Handle to a player running on a tokio task
pub struct PlayerRuntime {
    tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<Snapshot>,
    handle: JoinHandle<()>,
}

impl PlayerRuntime {
    /// Spawn the player task; must be called within a tokio runtime
    pub fn spawn(player: Player, reporter: Arc<dyn GradeReporter>, tick: Duration) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let mut initial = Snapshot::default();
        initial.update_from(&player);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let handle = tokio::spawn(run(player, rx, snapshot_tx, reporter, tick));
        Self { tx, snapshot_rx, handle }
    }

    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).await.map_err(|_| Error::ChannelClosed)
    }

    pub async fn emit(&self, event: PlayerEvent) -> Result<()> {
        self.send(Command::Emit(event)).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// Destroy the player and wait for the task to finish
    pub async fn shutdown(self) -> Result<Snapshot> {
        // The task may already be gone; joining reports that
        let _ = self.tx.send(Command::Destroy).await;
        drop(self.tx);

        self.handle
            .await
            .map_err(|e| Error::Internal(format!("player task failed: {}", e)))?;
        let snapshot = self.snapshot_rx.borrow().clone();
        Ok(snapshot)
    }
}

async fn run(
    mut player: Player,
    mut rx: mpsc::Receiver<Command>,
    snapshot_tx: watch::Sender<Snapshot>,
    reporter: Arc<dyn GradeReporter>,
    tick: Duration,
) {
    let video_id: Arc<str> = Arc::from(player.state().config().id.as_str());
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();

    info!(video_id = %video_id, tick_ms = tick.as_millis() as u64, "Player runtime started");

    loop {
        let keep_running = tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Emit(event)) => {
                    player.emit(event);
                    true
                }
                Some(Command::SetSpeed(speed)) => {
                    player.set_speed(speed);
                    true
                }
                Some(Command::Destroy) | None => {
                    player.destroy();
                    false
                }
            },
            _ = interval.tick() => {
                let now = Instant::now();
                player.advance(now - last_tick);
                last_tick = now;
                player.sync_time();
                true
            }
        };

        forward_outbound(player.take_outbound(), &reporter, &video_id);
        snapshot_tx.send_modify(|snapshot| snapshot.update_from(&player));

        if !keep_running {
            break;
        }
    }

    info!(video_id = %video_id, "Player runtime stopped");
}

fn forward_outbound(outbound: Vec<Outbound>, reporter: &Arc<dyn GradeReporter>, video_id: &Arc<str>) {
    for message in outbound {
        let reporter = Arc::clone(reporter);
        let video_id = Arc::clone(video_id);
        debug!(?message, "Forwarding to reporter");

        // Fire and forget; a failed report never blocks playback
        tokio::spawn(async move {
            let result = match &message {
                Outbound::Graded { grader } => reporter.report_grade(&video_id, *grader).await,
                Outbound::SaveProgress { grader, timeline } => {
                    reporter.save_progress(&video_id, *grader, timeline).await
                }
            };
            if let Err(e) = result {
                warn!(error = %e, ?message, "Grade reporter failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;
    use crate::grading::GraderConfig;
    use crate::types::PlayerConfig;
    use async_trait::async_trait;

    struct ChannelReporter {
        tx: mpsc::UnboundedSender<Outbound>,
    }

    #[async_trait]
    impl GradeReporter for ChannelReporter {
        async fn report_grade(&self, _video_id: &str, grader: GraderKind) -> anyhow::Result<()> {
            self.tx.send(Outbound::Graded { grader })?;
            Ok(())
        }

        async fn save_progress(&self, _video_id: &str, grader: GraderKind, timeline: &[u8]) -> anyhow::Result<()> {
            self.tx.send(Outbound::SaveProgress { grader, timeline: timeline.to_vec() })?;
            Ok(())
        }
    }

    fn scored_player() -> Player {
        let mut config = PlayerConfig {
            id: "video-1".into(),
            has_score: true,
            ..Default::default()
        };
        config.graders.insert(GraderKind::BasicGrader, GraderConfig::default());

        let mut player = Player::builder(config)
            .backend(ScriptedBackend::new(60.0))
            .build()
            .unwrap();
        player.install_default_widgets(&GraderSeeds::new()).unwrap();
        player
    }

    #[tokio::test]
    async fn test_grade_forwarded_to_reporter() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runtime = PlayerRuntime::spawn(scored_player(), Arc::new(ChannelReporter { tx }), Duration::from_millis(10));

        runtime.emit(PlayerEvent::Play).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(message, Some(Outbound::Graded { grader: GraderKind::BasicGrader }));

        let mut snapshots = runtime.subscribe();
        let snapshot = snapshots
            .wait_for(|s| s.resolved.contains(&GraderKind::BasicGrader))
            .await
            .unwrap()
            .clone();
        assert!(snapshot.playing);

        let last = runtime.shutdown().await.unwrap();
        assert!(last.destroyed);
        assert_eq!(last.resolved, vec![GraderKind::BasicGrader]);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_fails() {
        let runtime = PlayerRuntime::spawn(
            scored_player(),
            Arc::new(crate::reporter::NoopReporter),
            DEFAULT_TICK,
        );
        let tx = runtime.tx.clone();
        runtime.shutdown().await.unwrap();

        assert!(tx.send(Command::Emit(PlayerEvent::Play)).await.is_err());
    }
}
