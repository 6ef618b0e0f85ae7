//! Rolling 24 hour swap statistics

use engine_config::service::time::SECONDS_PER_HOUR;
use serde::{Deserialize, Serialize};

const WINDOW_HOURS: u64 = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: u64,
    pub volume_a: u128,
    pub volume_b: u128,
    pub fees_a: u128,
    pub fees_b: u128,
    pub swaps: u64,
}

/// Totals over the trailing window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTotals {
    pub volume_a: u128,
    pub volume_b: u128,
    pub fees_a: u128,
    pub fees_b: u128,
    pub swaps: u64,
}

/// Hourly buckets of input volume and fees per token side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeWindow {
    buckets: Vec<HourBucket>,
}

impl VolumeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a swap paying `amount_in` of side A (`a_in`) or side B
    pub fn record(&mut self, now: u64, a_in: bool, amount_in: u128, fee: u128) {
        let hour = now / SECONDS_PER_HOUR;
        self.buckets.retain(|b| b.hour + WINDOW_HOURS > hour);

        let index = match self.buckets.iter().position(|b| b.hour == hour) {
            Some(index) => index,
            None => {
                self.buckets.push(HourBucket {
                    hour,
                    ..HourBucket::default()
                });
                self.buckets.len() - 1
            }
        };
        let bucket = &mut self.buckets[index];

        if a_in {
            bucket.volume_a = bucket.volume_a.saturating_add(amount_in);
            bucket.fees_a = bucket.fees_a.saturating_add(fee);
        } else {
            bucket.volume_b = bucket.volume_b.saturating_add(amount_in);
            bucket.fees_b = bucket.fees_b.saturating_add(fee);
        }
        bucket.swaps += 1;
    }

    pub fn totals(&self, now: u64) -> WindowTotals {
        let hour = now / SECONDS_PER_HOUR;
        self.buckets
            .iter()
            .filter(|b| b.hour <= hour && b.hour + WINDOW_HOURS > hour)
            .fold(WindowTotals::default(), |mut acc, b| {
                acc.volume_a = acc.volume_a.saturating_add(b.volume_a);
                acc.volume_b = acc.volume_b.saturating_add(b.volume_b);
                acc.fees_a = acc.fees_a.saturating_add(b.fees_a);
                acc.fees_b = acc.fees_b.saturating_add(b.fees_b);
                acc.swaps += b.swaps;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_accumulates_and_expires() {
        let mut window = VolumeWindow::new();
        let start = 1_000 * SECONDS_PER_HOUR;
        window.record(start, true, 1_000, 3);
        window.record(start + 60, false, 500, 1);
        window.record(start + 2 * SECONDS_PER_HOUR, true, 2_000, 6);

        let totals = window.totals(start + 2 * SECONDS_PER_HOUR);
        assert_eq!(totals.volume_a, 3_000);
        assert_eq!(totals.volume_b, 500);
        assert_eq!(totals.fees_a, 9);
        assert_eq!(totals.swaps, 3);

        // first hour drops out after 24h
        let later = window.totals(start + 24 * SECONDS_PER_HOUR);
        assert_eq!(later.volume_a, 2_000);
        assert_eq!(later.volume_b, 0);

        assert_eq!(window.totals(start + 30 * SECONDS_PER_HOUR), WindowTotals::default());
    }
}
