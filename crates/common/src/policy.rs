//! # Reward Policy
//!
//! Static table memetakan action kind ke jumlah coin, plus konstanta untuk
//! referral bonus dan daily spin cooldown.
//!
//! ## Design
//!
//! Spin eligibility is evaluated against an explicit `now` timestamp passed
//! in by the caller. This module never reads the system clock — same inputs
//! always produce the same outcome, so the cooldown window is trivially
//! testable without sleeping.

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// POLICY CONSTANTS
// ════════════════════════════════════════════════════════════════════════════

/// Coins credited to the referrer when a referred account registers.
pub const REFERRAL_BONUS: u64 = 100;

/// Coins credited on a successful daily spin.
pub const SPIN_REWARD: u64 = 10;

/// Minimum elapsed seconds between successive spins (rolling 24h window).
pub const SPIN_COOLDOWN_SECS: u64 = 86_400;

// ════════════════════════════════════════════════════════════════════════════
// ACTION KIND
// ════════════════════════════════════════════════════════════════════════════

/// Verifiable social engagement types a user can prove against an
/// advertisement for a one-time reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Like,
    Comment,
    Share,
    Subscribe,
}

impl ActionKind {
    /// All kinds, in canonical order. Used to compute remaining tasks per ad.
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Like,
        ActionKind::Comment,
        ActionKind::Share,
        ActionKind::Subscribe,
    ];

    /// Coin amount credited for a verified action of this kind.
    #[must_use]
    pub fn reward(self) -> u64 {
        match self {
            ActionKind::Like => 10,
            ActionKind::Comment => 20,
            ActionKind::Share => 30,
            ActionKind::Subscribe => 50,
        }
    }

    /// Stable single-byte tag used in storage keys.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            ActionKind::Like => 0,
            ActionKind::Comment => 1,
            ActionKind::Share => 2,
            ActionKind::Subscribe => 3,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<ActionKind> {
        match tag {
            0 => Some(ActionKind::Like),
            1 => Some(ActionKind::Comment),
            2 => Some(ActionKind::Share),
            3 => Some(ActionKind::Subscribe),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Comment => "comment",
            ActionKind::Share => "share",
            ActionKind::Subscribe => "subscribe",
        }
    }

    /// Parse from a URL path segment. Case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<ActionKind> {
        match s.to_ascii_lowercase().as_str() {
            "like" => Some(ActionKind::Like),
            "comment" => Some(ActionKind::Comment),
            "share" => Some(ActionKind::Share),
            "subscribe" => Some(ActionKind::Subscribe),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SPIN COOLDOWN
// ════════════════════════════════════════════════════════════════════════════

/// Outcome of a spin eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinStatus {
    /// No previous spin, or the cooldown window has elapsed.
    Eligible,
    /// Still inside the window; `remaining_secs` until the next spin.
    CoolingDown { remaining_secs: u64 },
}

/// Evaluate spin eligibility for `last_spin_time` at `now`.
///
/// Eligible when `last_spin_time` is `None` or
/// `now - last >= SPIN_COOLDOWN_SECS`. A `last` in the future is treated as
/// an active cooldown (conservative), matching the remaining-time math.
#[must_use]
pub fn spin_status(last_spin_time: Option<u64>, now: u64) -> SpinStatus {
    match last_spin_time {
        None => SpinStatus::Eligible,
        Some(last) => {
            let elapsed = now.saturating_sub(last);
            if elapsed >= SPIN_COOLDOWN_SECS {
                SpinStatus::Eligible
            } else {
                SpinStatus::CoolingDown {
                    remaining_secs: SPIN_COOLDOWN_SECS - elapsed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ACTION KIND ─────────────────────────────────────────────────────

    #[test]
    fn test_reward_table() {
        assert_eq!(ActionKind::Like.reward(), 10);
        assert_eq!(ActionKind::Comment.reward(), 20);
        assert_eq!(ActionKind::Share.reward(), 30);
        assert_eq!(ActionKind::Subscribe.reward(), 50);
    }

    #[test]
    fn test_tag_roundtrip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ActionKind::from_tag(4), None);
        assert_eq!(ActionKind::from_tag(255), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(ActionKind::parse("like"), Some(ActionKind::Like));
        assert_eq!(ActionKind::parse("SHARE"), Some(ActionKind::Share));
        assert_eq!(ActionKind::parse("Subscribe"), Some(ActionKind::Subscribe));
        assert_eq!(ActionKind::parse("follow"), None);
        assert_eq!(ActionKind::parse(""), None);
    }

    // ── SPIN STATUS ─────────────────────────────────────────────────────

    #[test]
    fn test_spin_never_spun_is_eligible() {
        assert_eq!(spin_status(None, 0), SpinStatus::Eligible);
        assert_eq!(spin_status(None, u64::MAX), SpinStatus::Eligible);
    }

    #[test]
    fn test_spin_inside_window_cooling_down() {
        let last = 1_000;
        match spin_status(Some(last), last + 100) {
            SpinStatus::CoolingDown { remaining_secs } => {
                assert_eq!(remaining_secs, SPIN_COOLDOWN_SECS - 100);
            }
            SpinStatus::Eligible => panic!("expected cooling down"),
        }
    }

    #[test]
    fn test_spin_remaining_strictly_decreases() {
        let last = 1_000;
        let mut prev = u64::MAX;
        for dt in [1, 100, 10_000, 86_399] {
            match spin_status(Some(last), last + dt) {
                SpinStatus::CoolingDown { remaining_secs } => {
                    assert!(remaining_secs < prev, "remaining must decrease");
                    prev = remaining_secs;
                }
                SpinStatus::Eligible => panic!("still inside window at +{}", dt),
            }
        }
    }

    #[test]
    fn test_spin_exact_boundary_is_eligible() {
        let last = 1_000;
        assert_eq!(
            spin_status(Some(last), last + SPIN_COOLDOWN_SECS),
            SpinStatus::Eligible
        );
        assert_eq!(
            spin_status(Some(last), last + SPIN_COOLDOWN_SECS - 1),
            SpinStatus::CoolingDown { remaining_secs: 1 }
        );
    }

    #[test]
    fn test_spin_future_last_is_conservative() {
        // last di masa depan → elapsed saturates ke 0 → full cooldown.
        assert_eq!(
            spin_status(Some(5_000), 1_000),
            SpinStatus::CoolingDown {
                remaining_secs: SPIN_COOLDOWN_SECS
            }
        );
    }
}
