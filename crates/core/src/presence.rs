//! Presence sink abstraction and display formatting.

use async_trait::async_trait;

use crate::error::PresenceError;
use ticker_presence_types::{Mood, PriceSnapshot};

/// Shown in place of a value the provider did not report.
pub const MISSING_VALUE: &str = "N/A";

const ARROW_UP: char = '⬈';
const ARROW_DOWN: char = '⬊';

/// A channel that displays the service's current name and status.
///
/// All calls are best-effort. Callers log failures and move on.
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Targets that carry a display name (e.g., one per joined server).
    async fn targets(&self) -> Vec<String>;

    /// Display name currently shown on `target`, if known.
    async fn display_name(&self, target: &str) -> Option<String>;

    async fn set_display_name(&self, target: &str, text: &str) -> Result<(), PresenceError>;

    async fn set_status(&self, text: &str, mood: Mood) -> Result<(), PresenceError>;
}

/// What gets published for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub display_name: String,
    pub status: String,
    pub mood: Mood,
}

impl Presence {
    pub fn from_snapshot(snapshot: &PriceSnapshot) -> Self {
        let down = snapshot.is_trending_down();
        Self {
            display_name: display_name(snapshot),
            status: status_text(snapshot),
            mood: if down { Mood::DoNotDisturb } else { Mood::Online },
        }
    }
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => MISSING_VALUE.to_string(),
    }
}

/// `"{name} #{rank}"`, e.g. `"IOTA #61"`.
pub fn display_name(snapshot: &PriceSnapshot) -> String {
    let rank = snapshot
        .rank
        .map(|r| r.to_string())
        .unwrap_or_else(|| MISSING_VALUE.to_string());
    format!("{} #{}", snapshot.name, rank)
}

/// `"${price} {arrow}24H: {pct}%"`, e.g. `"$0.2000 ⬈24H: 1.50%"`.
pub fn status_text(snapshot: &PriceSnapshot) -> String {
    let arrow = if snapshot.is_trending_down() {
        ARROW_DOWN
    } else {
        ARROW_UP
    };
    format!(
        "${} {}24H: {}%",
        fmt_opt(snapshot.current_price, 4),
        arrow,
        fmt_opt(snapshot.pct_change_24h, 2)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use ticker_presence_types::{PriceSnapshotRaw, TokenIdentity};

    fn snapshot(rank: Option<u32>, price: Option<f64>, pct_24h: Option<f64>) -> PriceSnapshot {
        let raw = PriceSnapshotRaw {
            rank,
            current_price: price,
            pct_change_24h: pct_24h,
            ..Default::default()
        };
        PriceSnapshot::from_raw(
            &TokenIdentity::new("iota", "IOTA", "miota"),
            raw,
            Utc::now(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_presence_up() {
        let presence = Presence::from_snapshot(&snapshot(Some(61), Some(0.2), Some(1.5)));

        assert_eq!(presence.display_name, "IOTA #61");
        assert_eq!(presence.status, "$0.2000 ⬈24H: 1.50%");
        assert_eq!(presence.mood, Mood::Online);
    }

    #[test]
    fn test_presence_down() {
        let presence = Presence::from_snapshot(&snapshot(Some(61), Some(0.18766), Some(-4.321)));

        assert_eq!(presence.status, "$0.1877 ⬊24H: -4.32%");
        assert_eq!(presence.mood, Mood::DoNotDisturb);
    }

    #[test]
    fn test_presence_missing_values() {
        let presence = Presence::from_snapshot(&snapshot(None, None, None));

        assert_eq!(presence.display_name, "IOTA #N/A");
        assert_eq!(presence.status, "$N/A ⬈24H: N/A%");
        assert_eq!(presence.mood, Mood::Online);
    }
}
