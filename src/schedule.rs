use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDateTime, NaiveTime};

/// Parse a daily run time in `HH:MM` form.
pub fn parse_run_time(raw: &str) -> Result<NaiveTime> {
    let trimmed = raw.trim();
    let valid_shape = trimmed
        .split_once(':')
        .is_some_and(|(h, m)| {
            (1..=2).contains(&h.len())
                && m.len() == 2
                && h.chars().all(|c| c.is_ascii_digit())
                && m.chars().all(|c| c.is_ascii_digit())
        });
    if !valid_shape {
        return Err(anyhow!(
            "Invalid time format '{}'. Use HH:MM format (e.g., 09:30)",
            raw
        ));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| {
        anyhow!(
            "Invalid time format '{}'. Use HH:MM format (e.g., 09:30)",
            raw
        )
    })
}

/// Next occurrence of `at` strictly after `now`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}
