//! Scripted playback session
//!
//! Plays a short graded clip against a scripted backend and prints the
//! analytics log and grader progress.
//!
//! Run with: cargo run -p lms-video-core --example session

use lms_video_core::grading::{GraderConfig, GraderKind, GraderSeeds};
use lms_video_core::{MemorySink, Player, PlayerConfig, PlayerEvent, ScriptedBackend, SeekKind};
use std::time::Duration;

fn main() -> lms_video_core::Result<()> {
    println!("LMS Video Core - Scripted Session Example");
    println!("==========================================\n");

    let mut config = PlayerConfig::from_json(
        r#"{
            "id": "block-v1:demo+intro+type@video+block@welcome",
            "source": {"type": "html5"},
            "startTime": 5,
            "endTime": 35,
            "hasScore": true,
            "logData": {"course_id": "course-v1:demo+intro+2026"}
        }"#,
    )?;
    config.graders.insert(GraderKind::GradeOnPercent, GraderConfig { grader_value: 20, ..Default::default() });
    config.graders.insert(GraderKind::GradeOnEnd, GraderConfig::default());

    let backend = ScriptedBackend::new(60.0);
    let sink = MemorySink::new();
    let mut player = Player::builder(config).backend(backend.clone()).sink(sink.clone()).build()?;
    player.install_default_widgets(&GraderSeeds::new())?;

    player.emit(PlayerEvent::Ready);
    player.emit(PlayerEvent::SeekRequest { time: 5.0, kind: SeekKind::Other });
    player.emit(PlayerEvent::Play);

    // Watch the clip at 200 ms ticks
    let mut position = 5.0;
    while position <= 36.0 {
        backend.set_time(position);
        player.sync_time();
        player.advance(Duration::from_millis(200));
        position += 0.2;
    }
    player.emit(PlayerEvent::Pause);

    println!("Analytics log:");
    for record in sink.records() {
        println!("  #{:<3} {:<20} {}", record.sequence, record.event_name, serde_json::Value::Object(record.payload));
    }

    println!("\nNotifications for the LMS:");
    for message in player.take_outbound().iter().filter(|m| matches!(m, lms_video_core::Outbound::Graded { .. })) {
        println!("  {:?}", message);
    }

    if let Some(graders) = player.widget::<lms_video_core::GraderCollection>() {
        for kind in graders.kinds() {
            println!("  {} resolved: {}", kind, graders.is_resolved(kind));
        }
    }

    player.destroy();
    println!("\nListeners after destroy: {}", player.listener_count());
    Ok(())
}
