//! Wave timer.
//!
//! Wave `n` spans ticks `[n * interval, (n + 1) * interval)`. When it ends,
//! every formation that did not deploy during the wave is deployed
//! automatically and wave `n + 1` begins.

use serde::{Deserialize, Serialize};

use crate::config::WaveConfig;

/// A wave ending on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveTrigger {
    /// Wave that ended.
    pub wave: u32,
    /// Tick it ended on.
    pub tick: u64,
}

/// Tracks the current wave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSchedule {
    current: u32,
}

impl WaveSchedule {
    /// Start at wave 0.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: 0 }
    }

    /// Wave in progress.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Advance the timer to `tick`, returning every wave that ended.
    ///
    /// The wave in progress is always `tick / interval`, so a tick that
    /// lands after a gap ends all the waves it skipped past, oldest first.
    pub fn tick(&mut self, tick: u64, config: &WaveConfig) -> Vec<WaveTrigger> {
        if config.interval_ticks == 0 {
            return Vec::new();
        }
        let reached = u32::try_from(tick / config.interval_ticks).unwrap_or(u32::MAX);
        let ended = (self.current..reached)
            .map(|wave| WaveTrigger { wave, tick })
            .collect();
        self.current = self.current.max(reached);
        ended
    }

    /// Ticks until the current wave ends.
    #[must_use]
    pub const fn ticks_remaining(&self, tick: u64, config: &WaveConfig) -> u64 {
        if config.interval_ticks == 0 {
            return 0;
        }
        config.interval_ticks - tick % config.interval_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waves_trigger_on_interval() {
        let config = WaveConfig { interval_ticks: 10 };
        let mut schedule = WaveSchedule::new();

        let triggers: Vec<_> = (0..=30).flat_map(|t| schedule.tick(t, &config)).collect();
        assert_eq!(
            triggers,
            vec![
                WaveTrigger { wave: 0, tick: 10 },
                WaveTrigger { wave: 1, tick: 20 },
                WaveTrigger { wave: 2, tick: 30 },
            ]
        );
        assert_eq!(schedule.current(), 3);
        assert_eq!(schedule.ticks_remaining(34, &config), 6);
    }

    #[test]
    fn test_gap_ends_skipped_waves() {
        let config = WaveConfig { interval_ticks: 10 };
        let mut schedule = WaveSchedule::new();

        let early: Vec<_> = (1..=9).flat_map(|t| schedule.tick(t, &config)).collect();
        assert!(early.is_empty());
        assert_eq!(
            schedule.tick(11, &config),
            vec![WaveTrigger { wave: 0, tick: 11 }]
        );
        let later: Vec<_> = (12..=20).flat_map(|t| schedule.tick(t, &config)).collect();
        assert_eq!(later, vec![WaveTrigger { wave: 1, tick: 20 }]);

        assert_eq!(
            schedule.tick(45, &config),
            vec![WaveTrigger { wave: 2, tick: 45 }, WaveTrigger { wave: 3, tick: 45 }]
        );
        assert_eq!(schedule.current(), 4);
    }
}
