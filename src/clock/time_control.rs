//! Named clock configurations.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    /// 1 minute, no increment.
    Bullet,
    /// 3 minutes plus 2 seconds per move.
    #[default]
    Blitz,
    /// 10 minutes, no increment.
    Rapid,
    /// 30 minutes, no increment.
    Classical,
}

impl TimeControl {
    pub const ALL: [TimeControl; 4] = [
        TimeControl::Bullet,
        TimeControl::Blitz,
        TimeControl::Rapid,
        TimeControl::Classical,
    ];

    /// Resolve a client-supplied label. Unknown or missing labels fall back to blitz.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("bullet") => TimeControl::Bullet,
            Some("rapid") => TimeControl::Rapid,
            Some("classical") => TimeControl::Classical,
            _ => TimeControl::Blitz,
        }
    }

    pub const fn initial_ms(self) -> u64 {
        match self {
            TimeControl::Bullet => 60_000,
            TimeControl::Blitz => 180_000,
            TimeControl::Rapid => 600_000,
            TimeControl::Classical => 1_800_000,
        }
    }

    pub const fn increment_ms(self) -> u64 {
        match self {
            TimeControl::Blitz => 2_000,
            _ => 0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            TimeControl::Bullet => "bullet",
            TimeControl::Blitz => "blitz",
            TimeControl::Rapid => "rapid",
            TimeControl::Classical => "classical",
        }
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::TimeControl;

    #[test]
    fn table_values() {
        assert_eq!(TimeControl::Bullet.initial_ms(), 60_000);
        assert_eq!(TimeControl::Blitz.increment_ms(), 2_000);
        assert_eq!(TimeControl::Classical.initial_ms(), 1_800_000);
        assert_eq!(TimeControl::Rapid.increment_ms(), 0);
    }

    #[test]
    fn unknown_labels_fall_back_to_blitz() {
        assert_eq!(TimeControl::from_label(Some("Rapid")), TimeControl::Rapid);
        assert_eq!(TimeControl::from_label(Some("hyperbullet")), TimeControl::Blitz);
        assert_eq!(TimeControl::from_label(None), TimeControl::Blitz);
    }
}
