//! Yearly volume and time spent per process.

use crate::duration::WorkDuration;
use crate::record::Frequency;

impl Frequency {
    /// Occurrences per year. Daily counts working days, weekly excludes
    /// holiday weeks.
    pub fn yearly_multiplier(self) -> u32 {
        match self {
            Frequency::Daily => 220,
            Frequency::Weekly => 48,
            Frequency::BiWeekly => 24,
            Frequency::Monthly => 12,
            Frequency::Quarterly => 4,
            Frequency::Yearly => 1,
        }
    }
}

/// Derived yearly figures for one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearlyMetrics {
    /// Runs per year: `volume × frequency multiplier`.
    pub volume: u64,
    /// Minutes per year, rounded to the nearest 5.
    pub minutes: u64,
}

impl YearlyMetrics {
    pub fn compute(volume: u32, frequency: Frequency, duration: WorkDuration) -> Self {
        let yearly_volume = u64::from(volume) * u64::from(frequency.yearly_multiplier());
        let total = u64::from(duration.total_minutes()) * yearly_volume;
        Self {
            volume: yearly_volume,
            minutes: (total + 2) / 5 * 5,
        }
    }

    /// `HH:MM`, with as many hour digits as needed.
    pub fn duration_label(&self) -> String {
        format!("{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}
