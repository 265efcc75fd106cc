use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Flat points awarded per accepted keystroke
pub const POINTS_PER_KEY: u32 = 10;
/// Size of the sliding window of keystrokes kept for on-screen feedback
pub const RECENT_WINDOW: usize = 10;
/// Floor for the KPM denominator so the first keystrokes don't spike the rate
pub const MIN_KPM_MINUTES: f64 = 0.1;

pub const COMBO_TIER_HIGH: u32 = 50;
pub const COMBO_TIER_LOW: u32 = 25;

/// End-of-session payout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub coins: u64,
    pub experience: u64,
    pub bonus_coins: u32,
    pub claimed: bool,
}

impl Rewards {
    /// Coins credited to the balance on claim
    pub fn total_coins(&self) -> u64 {
        self.coins + self.bonus_coins as u64
    }
}

pub fn elapsed_between(start: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(start).unwrap_or_default()
}

pub fn keys_per_minute(total_keys: u64, elapsed: Duration) -> u32 {
    let minutes = (elapsed.as_secs_f64() / 60.0).max(MIN_KPM_MINUTES);
    (total_keys as f64 / minutes).round() as u32
}

pub fn combo_bonus(max_combo: u32) -> u32 {
    if max_combo >= COMBO_TIER_HIGH {
        20
    } else if max_combo >= COMBO_TIER_LOW {
        10
    } else {
        0
    }
}

pub fn compute_rewards(score: u64, max_combo: u32) -> Rewards {
    Rewards {
        coins: score / 100,
        experience: score / 10,
        bonus_coins: combo_bonus(max_combo),
        claimed: false,
    }
}
