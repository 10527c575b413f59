//! Time-decayed per-market debt estimates ("candles").
//!
//! Re-reading every market on every rate computation is expensive, and a
//! single fresh reading is manipulable. Instead each market keeps a candle:
//! the debt reading taken at the last write plus the estimate the candle had
//! at that moment. Between writes the estimate decays exponentially from
//! `base` toward `reading`, so it is a pure function of the stored state and
//! the clock.

use cascade_common::{mul_div_up, w_exp, Timestamp, WAD};

/// Smoothing time constant in seconds. Ten minutes keeps the estimate
/// within one write-interval's debt increment of ground truth at any
/// realistic write cadence while still flattening single-reading spikes.
pub const CANDLE_TAU: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebtCandle {
    /// Estimate at the time of the last reading.
    pub base: u128,
    /// Debt read from the market at `ts`.
    pub reading: u128,
    /// When `reading` was taken.
    pub ts: Timestamp,
}

impl DebtCandle {
    /// First observation: no history, no lag.
    pub fn snap(reading: u128, now: Timestamp) -> Self {
        Self {
            base: reading,
            reading,
            ts: now,
        }
    }

    /// The estimate at `now`: `reading - (reading - base)·exp(-dt/tau)`,
    /// symmetric when debt is falling. Always between `base` and
    /// `reading`, so a rising true debt is never overstated.
    pub fn value(&self, now: Timestamp) -> u128 {
        let dt = now.saturating_sub(self.ts);
        if dt == 0 || self.base == self.reading {
            return self.base;
        }
        let decay = w_exp(-((dt as i128) * WAD as i128 / CANDLE_TAU as i128));
        // decay <= WAD, so the kept difference never exceeds the gap
        if self.reading >= self.base {
            let kept = mul_div_up(self.reading - self.base, decay, WAD).unwrap_or(0);
            self.reading - kept
        } else {
            let kept = mul_div_up(self.base - self.reading, decay, WAD).unwrap_or(0);
            self.reading + kept
        }
    }

    /// Fold a fresh reading in: the current estimate becomes the new base.
    /// Immediately after a roll, `value(now)` is unchanged — rolling moves
    /// the decay target, never the estimate.
    pub fn roll(&self, reading: u128, now: Timestamp) -> Self {
        Self {
            base: self.value(now),
            reading,
            ts: now,
        }
    }
}
