//! Timestamp parsing, formatting and scene reconciliation.
//!
//! Scene boundaries come back from the model as `HH:MM:SS` strings and are
//! occasionally shifted one field to the left (`MM:SS:00` instead of
//! `00:MM:SS`). [`reconcile_scenes`] repairs such values against the known
//! media duration, orders the scenes and renumbers them.

use crate::media::Scene;

/// Parse a strict `HH:MM:SS` timestamp into total seconds.
///
/// # Examples
/// ```
/// use msearch_models::timestamp::parse_hms;
/// assert_eq!(parse_hms("01:30:05").unwrap(), 5405);
/// assert!(parse_hms("05:30").is_err());
/// ```
pub fn parse_hms(ts: &str) -> Result<i64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    };

    let field = |name: &'static str, value: &str| {
        value
            .parse::<i64>()
            .map_err(|_| TimestampError::InvalidValue(name, value.to_string()))
    };
    let (h, m, s) = (field("hours", h)?, field("minutes", m)?, field("seconds", s)?);

    total_seconds(h, m, s).ok_or_else(|| TimestampError::OutOfRange(ts.to_string()))
}

/// `h:m:s` in seconds, `None` on overflow.
fn total_seconds(h: i64, m: i64, s: i64) -> Option<i64> {
    h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(s)
}

/// Format whole seconds as `HH:MM:SS`.
pub fn format_seconds(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Repair a timestamp that lies beyond the end of the media.
///
/// Values within `duration_secs` are returned untouched, as are values that
/// are not three numeric fields. Out of range values are first read as
/// `00:HH:MM`; if that is still out of range they clamp to the duration.
pub fn correct_timestamp(ts: &str, duration_secs: u32) -> String {
    let parts: Vec<&str> = ts.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return ts.to_string();
    };
    let (Ok(h), Ok(m), Ok(s)) = (h.parse::<i64>(), m.parse::<i64>(), s.parse::<i64>()) else {
        return ts.to_string();
    };

    // Overflowing values are out of range by definition.
    let duration = i64::from(duration_secs);
    if total_seconds(h, m, s).is_some_and(|total| total <= duration) {
        return ts.to_string();
    }

    if total_seconds(0, h, m).is_some_and(|shifted| shifted <= duration) {
        return format!("00:{:02}:{:02}", h, m);
    }

    format_seconds(duration_secs)
}

/// Repair, order and sequence model-produced scenes.
///
/// An empty input yields a single scene covering the whole media with
/// `fallback_script` as its script. Ordering is a stable sort on the
/// corrected start time; unparsable starts sort as zero.
pub fn reconcile_scenes(mut scenes: Vec<Scene>, duration_secs: u32, fallback_script: &str) -> Vec<Scene> {
    if scenes.is_empty() {
        scenes.push(Scene::new(
            0,
            format_seconds(0),
            format_seconds(duration_secs),
            fallback_script,
        ));
    }

    for scene in &mut scenes {
        scene.start = correct_timestamp(&scene.start, duration_secs);
        scene.end = correct_timestamp(&scene.end, duration_secs);
    }

    scenes.sort_by_key(|scene| parse_hms(&scene.start).unwrap_or(0));

    for (index, scene) in scenes.iter_mut().enumerate() {
        scene.sequence_number = index as u32;
    }

    scenes
}

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampError {
    /// Timestamp string is empty
    Empty,
    /// Invalid numeric value for a component
    InvalidValue(&'static str, String),
    /// Not three colon separated fields
    InvalidFormat(String),
    /// Too large to represent in seconds
    OutOfRange(String),
}

impl std::fmt::Display for TimestampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Timestamp cannot be empty"),
            Self::InvalidValue(component, value) => {
                write!(f, "Invalid {} value: {}", component, value)
            }
            Self::InvalidFormat(ts) => {
                write!(f, "Invalid timestamp format '{}'. Use HH:MM:SS", ts)
            }
            Self::OutOfRange(ts) => write!(f, "Timestamp '{}' is out of range", ts),
        }
    }
}

impl std::error::Error for TimestampError {}
