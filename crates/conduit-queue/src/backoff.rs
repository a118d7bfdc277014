// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::Duration;

/// Fallback schedule used if a caller hands in an empty schedule; mirrors
/// the spec default so `delay_for` never divides by zero.
const DEFAULT_SCHEDULE_SECS: [i64; 4] = [5, 25, 120, 600];

/// Retry backoff schedule, clamped at the last step: 5s, 25s, 2m, 10m, then
/// 10m forever by default. `retry_count` is the count *after* the failure
/// that just happened, so the first failure (retry_count == 1) waits for
/// `schedule[0]`. `schedule` is normally `QueueConfig::backoff_schedule_secs`.
pub fn delay_for(retry_count: u32, schedule: &[i64]) -> Duration {
    let schedule = if schedule.is_empty() { &DEFAULT_SCHEDULE_SECS[..] } else { schedule };
    let idx = (retry_count.saturating_sub(1) as usize).min(schedule.len() - 1);
    Duration::seconds(schedule[idx])
}
