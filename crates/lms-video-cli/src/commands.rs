//! CLI command implementations

use crate::output::{inline, print_json, OutputFormat};
use crate::script::{Script, Step};
use lms_video_core::{
    time, BackendCommand, FileStorage, GradeReporter, GraderCollection, GraderKind,
    HttpGradeReporter, LogRecord, MemorySink, Outbound, Player, PlayerConfig, ScriptedBackend,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Default, Serialize)]
struct GraderReport {
    resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<Vec<u8>>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    video_id: String,
    current_time: f64,
    destroyed: bool,
    log: Vec<LogRecord>,
    backend: Vec<BackendCommand>,
    graders: BTreeMap<GraderKind, GraderReport>,
    outbound: Vec<Outbound>,
}

fn grader_view(player: &Player) -> Option<BTreeMap<GraderKind, GraderReport>> {
    let graders = player.widget::<GraderCollection>()?;
    let mut states = graders.states();
    Some(
        graders
            .kinds()
            .into_iter()
            .map(|kind| {
                let report = GraderReport {
                    resolved: graders.is_resolved(kind),
                    state: states.remove(&kind),
                };
                (kind, report)
            })
            .collect(),
    )
}

/// Replay a session script
pub async fn replay(
    script_path: &Path,
    storage: Option<PathBuf>,
    report_url: Option<Url>,
    format: &str,
) -> anyhow::Result<()> {
    let script = Script::load(script_path)?;
    info!(video_id = %script.config.id, steps = script.steps.len(), "Replaying session");

    let backend = ScriptedBackend::new(script.duration);
    let sink = MemorySink::new();
    let mut builder = Player::builder(script.config.clone())
        .backend(backend.clone())
        .sink(sink.clone());
    if let Some(path) = storage {
        builder = builder.storage(FileStorage::open(path)?);
    }
    let mut player = builder.build()?;
    player.install_default_widgets(&script.seeds)?;

    // Grader view survives the collection being torn down
    let mut graders = BTreeMap::new();
    let mut outbound = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        debug!(index, ?step, "Step");
        run_step(&mut player, &backend, step);

        if let Some(view) = grader_view(&player) {
            graders = view;
        }
        outbound.extend(player.take_outbound());
    }

    if let Some(url) = report_url {
        report(&url, &script.config.id, &outbound).await?;
    }

    let report = ReplayReport {
        video_id: script.config.id.clone(),
        current_time: player.state().current_time(),
        destroyed: player.state().is_destroyed(),
        log: sink.records(),
        backend: backend.commands(),
        graders,
        outbound,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_replay(&report),
    }

    Ok(())
}

fn run_step(player: &mut Player, backend: &ScriptedBackend, step: &Step) {
    match step {
        Step::Emit { event } => player.emit(event.clone()),
        Step::Advance { ms } => player.advance(Duration::from_millis(*ms)),
        Step::Tick { time } => {
            backend.set_time(*time);
            player.sync_time();
        }
        Step::Watch { from, to, every_ms } => {
            let every = Duration::from_millis((*every_ms).max(1));
            for time in watch_positions(*from, *to, every) {
                if player.state().is_destroyed() {
                    break;
                }
                backend.set_time(time);
                player.sync_time();
                player.advance(every);
            }
        }
        Step::SetSpeed { speed } => player.set_speed(*speed),
        Step::Destroy => player.destroy(),
    }
}

/// Positions from `from` to `to` inclusive, `every` apart
fn watch_positions(from: f64, to: f64, every: Duration) -> impl Iterator<Item = f64> {
    let step = every.as_secs_f64();
    let count = if to >= from && step > 0.0 {
        // Tolerance keeps `to` itself when the span is a whole number of steps
        ((to - from) / step + 1e-9).floor() as u64 + 1
    } else {
        0
    };
    (0..count).map(move |i| from + i as f64 * step)
}

async fn report(url: &Url, video_id: &str, outbound: &[Outbound]) -> anyhow::Result<()> {
    let reporter = HttpGradeReporter::new(url, Duration::from_secs(10))?;

    for message in outbound {
        let result = match message {
            Outbound::Graded { grader } => reporter.report_grade(video_id, *grader).await,
            Outbound::SaveProgress { grader, timeline } => {
                reporter.save_progress(video_id, *grader, timeline).await
            }
        };
        if let Err(e) = result {
            warn!(error = %e, ?message, "Report failed");
        }
    }
    Ok(())
}

fn print_replay(report: &ReplayReport) {
    println!("Video: {}", report.video_id);
    println!("Position: {}", time::format(report.current_time, false));
    if report.destroyed {
        println!("Player destroyed");
    }

    println!();
    println!("Analytics ({} events):", report.log.len());
    for record in &report.log {
        println!("  #{:<4} {:<34} {}", record.sequence, record.event_name, inline(&record.payload));
    }

    if !report.backend.is_empty() {
        println!();
        println!("Backend commands:");
        for command in &report.backend {
            println!("  {:?}", command);
        }
    }

    println!();
    if report.graders.is_empty() {
        println!("Graders: none");
    } else {
        println!("Graders:");
        for (kind, grader) in &report.graders {
            let status = if grader.resolved { "resolved" } else { "pending" };
            match &grader.state {
                Some(state) => {
                    let visited = state.iter().filter(|&&v| v == 1).count();
                    println!("  {:<18} {:<9} {}/{} buckets", kind.name(), status, visited, state.len());
                }
                None => println!("  {:<18} {}", kind.name(), status),
            }
        }
    }

    let graded = report
        .outbound
        .iter()
        .filter(|m| matches!(m, Outbound::Graded { .. }))
        .count();
    println!();
    println!("Outbound: {} messages ({} grades)", report.outbound.len(), graded);
}

#[derive(Debug, Serialize)]
struct FormattedTime {
    seconds: f64,
    formatted: String,
    description: String,
}

/// Format seconds for display
pub fn format_time(seconds: f64, full: bool, format: &str) {
    let formatted = FormattedTime {
        seconds,
        formatted: time::format(seconds, full),
        description: time::describe(seconds),
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => {
            if let Err(e) = print_json(&formatted) {
                warn!(error = %e, "Could not serialize output");
            }
        }
        OutputFormat::Text => println!("{} ({})", formatted.formatted, formatted.description),
    }
}

/// Rescale a time across a speed change
pub fn convert(time_secs: f64, old_speed: f64, new_speed: f64, format: &str) -> anyhow::Result<()> {
    for speed in [old_speed, new_speed] {
        if !speed.is_finite() || speed <= 0.0 {
            anyhow::bail!("speed must be positive, got {}", speed);
        }
    }

    let converted = time::convert(time_secs, old_speed, new_speed);
    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&serde_json::json!({
            "time": time_secs,
            "old_speed": time::format_speed(old_speed),
            "new_speed": time::format_speed(new_speed),
            "converted": converted,
        }))?,
        OutputFormat::Text => println!(
            "{} at {}x -> {} at {}x",
            time_secs,
            time::format_speed(old_speed),
            converted,
            time::format_speed(new_speed)
        ),
    }
    Ok(())
}

/// Parse and validate a player config
pub fn check_config(path: &Path, format: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)?;
    let config = PlayerConfig::from_json(&text)?;
    config.validate()?;

    match OutputFormat::from(format) {
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Text => {
            println!("Config OK: {}", path.display());
            println!("  Video ID: {}", config.id);
            println!("  Source: {}", config.source.code());
            let end = config.end_time.map(|e| time::format(e, false)).unwrap_or_else(|| "end".to_string());
            println!("  Clip: {} - {}", time::format(config.start_time, false), end);
            println!("  Speed: {}", time::format_speed(config.speed));
            println!("  Auto-hide controls: {}", config.autohide_enabled());
            if config.has_score && !config.graders.is_empty() {
                let names: Vec<&str> = config.graders.keys().map(|k| k.name()).collect();
                println!("  Graders: {}", names.join(", "));
            } else {
                println!("  Graders: none");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_positions_reach_end() {
        let positions: Vec<f64> = watch_positions(5.0, 36.0, Duration::from_millis(200)).collect();
        assert_eq!(positions.len(), 156);
        assert_eq!(positions[0], 5.0);
        assert!((positions[155] - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_watch_positions_uneven_span() {
        let positions: Vec<f64> = watch_positions(0.0, 1.1, Duration::from_millis(500)).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_watch_positions_empty_when_reversed() {
        assert_eq!(watch_positions(10.0, 5.0, Duration::from_millis(200)).count(), 0);
    }
}
