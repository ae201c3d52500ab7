//! Completion estimate for selective leak scans.
//!
//! The server never reports when a leak-scan task finishes. Completion is
//! declared once the parent job shows any leak detection after `min_ticks`
//! polls, or unconditionally after `max_ticks` polls. Until then the
//! percentage grows linearly with elapsed ticks and is capped.

use crate::config::LeakScanConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicSettings {
    pub max_ticks: u32,
    pub min_ticks: u32,
    pub cap_percent: f64,
}

impl Default for HeuristicSettings {
    fn default() -> Self {
        Self::from(&LeakScanConfig::default())
    }
}

impl From<&LeakScanConfig> for HeuristicSettings {
    fn from(config: &LeakScanConfig) -> Self {
        Self {
            max_ticks: config.max_ticks.max(1),
            min_ticks: config.min_ticks,
            cap_percent: f64::from(config.progress_cap_percent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    LeaksFound,
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeuristicStep {
    Running { tick: u32, percent: f64 },
    Complete { tick: u32, reason: CompletionReason },
}

#[derive(Debug, Clone)]
pub struct CompletionHeuristic {
    settings: HeuristicSettings,
    tick: u32,
    leak_count: usize,
    completed: Option<CompletionReason>,
}

impl CompletionHeuristic {
    pub fn new(settings: HeuristicSettings) -> Self {
        Self {
            settings,
            tick: 0,
            leak_count: 0,
            completed: None,
        }
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Most recent leak count seen.
    pub fn leak_count(&self) -> usize {
        self.leak_count
    }

    /// Advance one polling interval. `observed` is the leak count fetched
    /// on this tick, `None` when the fetch failed.
    pub fn tick(&mut self, observed: Option<usize>) -> HeuristicStep {
        if let Some(reason) = self.completed {
            return HeuristicStep::Complete {
                tick: self.tick,
                reason,
            };
        }

        self.tick += 1;
        if let Some(count) = observed {
            self.leak_count = count;
        }

        let reason = if self.tick >= self.settings.min_ticks
            && self.leak_count > 0
        {
            Some(CompletionReason::LeaksFound)
        } else if self.tick >= self.settings.max_ticks {
            Some(CompletionReason::BudgetExhausted)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                self.completed = Some(reason);
                HeuristicStep::Complete {
                    tick: self.tick,
                    reason,
                }
            }
            None => HeuristicStep::Running {
                tick: self.tick,
                percent: self.percent_at(self.tick),
            },
        }
    }

    /// `min(cap, 100 * t / max_ticks)`.
    pub fn percent_at(&self, tick: u32) -> f64 {
        let raw = 100.0 * f64::from(tick) / f64::from(self.settings.max_ticks);
        raw.min(self.settings.cap_percent)
    }
}

/// Whole-number percentage for display.
pub fn display_percent(percent: f64) -> u8 {
    percent.clamp(0.0, 100.0).round() as u8
}
