//! Session script format
//!
//! ```json
//! {
//!   "config": { "id": "intro", "hasScore": true, "graders": { "grade_on_percent": { "graderValue": 50 } } },
//!   "duration": 120,
//!   "steps": [
//!     { "step": "emit", "event": { "type": "play" } },
//!     { "step": "watch", "from": 0, "to": 60 },
//!     { "step": "destroy" }
//!   ]
//! }
//! ```

use anyhow::Context as _;
use lms_video_core::{GraderSeeds, PlayerConfig, PlayerEvent};
use serde::Deserialize;
use std::path::Path;

/// A scripted player session
#[derive(Debug, Deserialize)]
pub struct Script {
    pub config: PlayerConfig,
    /// Media duration reported by the backend
    pub duration: f64,
    /// Grader timelines restored before storage
    #[serde(default)]
    pub seeds: GraderSeeds,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Trigger a player event
    Emit { event: PlayerEvent },
    /// Move the clock forward
    Advance { ms: u64 },
    /// Backend reports a new time, then the player syncs
    Tick { time: f64 },
    /// Play through `from..=to` with a sync every `every_ms` of media time
    Watch {
        from: f64,
        to: f64,
        #[serde(default = "default_watch_step")]
        every_ms: u64,
    },
    SetSpeed { speed: f64 },
    Destroy,
}

fn default_watch_step() -> u64 {
    200
}

impl Script {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let script: Script =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        script.config.validate()?;
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let script: Script = serde_json::from_str(
            r#"{
                "config": { "id": "intro", "startTime": 5 },
                "duration": 60,
                "steps": [
                    { "step": "emit", "event": { "type": "play" } },
                    { "step": "watch", "from": 5, "to": 10 },
                    { "step": "advance", "ms": 1500 },
                    { "step": "set_speed", "speed": 1.5 },
                    { "step": "destroy" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.config.id, "intro");
        assert!(script.seeds.is_empty());
        assert_eq!(script.steps.len(), 5);
        assert!(matches!(script.steps[1], Step::Watch { every_ms: 200, .. }));
        assert!(matches!(script.steps[4], Step::Destroy));
    }

    #[test]
    fn test_unknown_step_rejected() {
        let result: Result<Script, _> =
            serde_json::from_str(r#"{ "config": {}, "duration": 1, "steps": [{ "step": "rewind" }] }"#);
        assert!(result.is_err());
    }
}
