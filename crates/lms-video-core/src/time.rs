//! Time formatting for the VCR display, slider descriptions and speed logs
//!
//! ```rust
//! use lms_video_core::time;
//!
//! assert_eq!(time::format(90.0, false), "1:30");
//! assert_eq!(time::format_full(3661.0), "01:01:01");
//! ```

/// Split a time value into whole hours, minutes and seconds.
///
/// Non-finite and negative values count as zero.
fn split(time: f64) -> (u64, u64, u64) {
    let time = if time.is_finite() && time > 0.0 { time } else { 0.0 };
    let total = time.floor() as u64;
    (total / 3600, (total / 60) % 60, total % 60)
}

/// Format seconds for display.
///
/// `M:SS` when there are no hours, `H:MM:SS` otherwise. With `full` set every
/// field is padded to two digits (`HH:MM:SS`).
pub fn format(time: f64, full: bool) -> String {
    let (hours, minutes, seconds) = split(time);

    if full {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Format seconds as `HH:MM:SS`
pub fn format_full(time: f64) -> String {
    format(time, true)
}

/// Rescale an elapsed time across a speed change, rounded to milliseconds
pub fn convert(time: f64, old_speed: f64, new_speed: f64) -> f64 {
    (time * old_speed / new_speed * 1000.0).round() / 1000.0
}

fn plural(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Human readable description used as the slider's accessible value text
pub fn describe(time: f64) -> String {
    let (hours, minutes, seconds) = split(time);
    let seconds = plural(seconds, "second");

    if hours > 0 {
        format!("{} {} {}", plural(hours, "hour"), plural(minutes, "minute"), seconds)
    } else if minutes > 0 {
        format!("{} {}", plural(minutes, "minute"), seconds)
    } else {
        seconds
    }
}

/// Speed as logged in analytics payloads: `1.0`, `1.50`, `0.75`
pub fn format_speed(speed: f64) -> String {
    let formatted = format!("{:.2}", speed);
    match formatted.strip_suffix(".00") {
        Some(whole) => format!("{}.0", whole),
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_short() {
        assert_eq!(format(0.0, false), "0:00");
        assert_eq!(format(9.9, false), "0:09");
        assert_eq!(format(90.0, false), "1:30");
        assert_eq!(format(3599.0, false), "59:59");
        assert_eq!(format(3661.0, false), "1:01:01");
    }

    #[test]
    fn test_format_full() {
        assert_eq!(format(3661.0, true), "01:01:01");
        assert_eq!(format_full(59.0), "00:00:59");
        assert_eq!(format_full(36000.0), "10:00:00");
    }

    #[test]
    fn test_format_invalid_input() {
        assert_eq!(format(-5.0, false), "0:00");
        assert_eq!(format(f64::NAN, false), "0:00");
        assert_eq!(format(f64::INFINITY, false), "0:00");
        assert_eq!(format(f64::NEG_INFINITY, true), "00:00:00");
    }

    #[test]
    fn test_convert() {
        assert_eq!(convert(10.0, 1.0, 2.0), 5.0);
        assert_eq!(convert(10.0, 1.0, 0.75), 13.333);
        assert_eq!(convert(0.0, 1.5, 0.5), 0.0);
    }

    #[test]
    fn test_convert_round_trip() {
        let speeds = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];
        for &a in &speeds {
            for &b in &speeds {
                for t in [0.0, 1.0, 17.3, 123.456, 3600.0] {
                    let back = convert(convert(t, a, b), b, a);
                    assert!((back - t).abs() < 0.005, "{} {} {} -> {}", t, a, b, back);
                }
            }
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(5.0), "5 seconds");
        assert_eq!(describe(1.0), "1 second");
        assert_eq!(describe(120.0), "2 minutes 0 seconds");
        assert_eq!(describe(3723.0), "1 hour 2 minutes 3 seconds");
        assert_eq!(describe(f64::NAN), "0 seconds");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1.0), "1.0");
        assert_eq!(format_speed(1.5), "1.50");
        assert_eq!(format_speed(0.75), "0.75");
        assert_eq!(format_speed(2.0), "2.0");
    }
}
