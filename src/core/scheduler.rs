//! SM-2 variant with a four-step quality scale.
//!
//! - Again (0): progress resets, the card comes back tomorrow, ease drops by 0.2
//! - Hard (1): progress resets, interval grows by 20%, ease drops by 0.15
//! - Good (2): 1 day, then 6 days, then `interval * ease`
//! - Easy (3): 4 days, then 6 days, then `interval * ease * 1.3`, ease rises by 0.15
//!
//! Ease always stays within [1.3, 2.5] and the interval is never below one day.

use crate::domain::model::{Quality, SchedulingState, MAX_EASE_FACTOR, MIN_EASE_FACTOR};
use crate::utils::error::Result;
use chrono::{DateTime, Duration, Utc};

const AGAIN_EASE_PENALTY: f64 = 0.2;
const HARD_EASE_PENALTY: f64 = 0.15;
const HARD_INTERVAL_FACTOR: f64 = 1.2;
const EASY_EASE_BONUS: f64 = 0.15;
const EASY_INTERVAL_BONUS: f64 = 1.3;

/// Computes the scheduling state that follows a review of `quality` at `now`.
pub fn next_state(
    quality: Quality,
    current: &SchedulingState,
    now: DateTime<Utc>,
) -> SchedulingState {
    let interval = current.interval.max(1);
    let ease = current.ease_factor;

    let (new_interval, new_ease, new_repetitions) = match quality {
        Quality::Again => (1, ease - AGAIN_EASE_PENALTY, 0),
        Quality::Hard => (
            ceil_days(interval as f64 * HARD_INTERVAL_FACTOR),
            ease - HARD_EASE_PENALTY,
            0,
        ),
        Quality::Good => {
            let reps = current.repetitions + 1;
            let days = match reps {
                1 => 1,
                2 => 6,
                _ => ceil_days(interval as f64 * ease),
            };
            (days, ease, reps)
        }
        Quality::Easy => {
            let reps = current.repetitions + 1;
            let days = match reps {
                1 => 4,
                2 => 6,
                _ => ceil_days(interval as f64 * ease * EASY_INTERVAL_BONUS),
            };
            (days, ease + EASY_EASE_BONUS, reps)
        }
    };

    let new_interval = new_interval.max(1);

    SchedulingState {
        interval: new_interval,
        ease_factor: new_ease.clamp(MIN_EASE_FACTOR, MAX_EASE_FACTOR),
        repetitions: new_repetitions,
        due_date: now + Duration::days(i64::from(new_interval)),
        last_reviewed: Some(now),
    }
}

/// Same as [`next_state`] for a raw rating, rejecting anything outside 0..=3.
pub fn next_state_for_rating(
    rating: i64,
    current: &SchedulingState,
    now: DateTime<Utc>,
) -> Result<SchedulingState> {
    let quality = Quality::try_from(rating)?;
    Ok(next_state(quality, current, now))
}

fn ceil_days(days: f64) -> u32 {
    // 區間以整天計，向上取整
    if days.is_finite() && days > 0.0 {
        days.ceil().min(u32::MAX as f64) as u32
    } else {
        1
    }
}
