//! Breakout-retest matching of local extrema against the global envelope.

use chrono::Duration;
use core_types::{ExtremeLevel, LevelKind};
use rust_decimal::Decimal;

/// Acceptance rules for a retest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetestRules {
    /// Maximum relative distance from the level, e.g. `0.002` for 0.2%.
    pub tolerance: Decimal,
    /// Minimum time between the level and its retest.
    pub min_separation: Duration,
}

impl RetestRules {
    pub fn new(tolerance: Decimal, min_bars: i64, bar_seconds: i64) -> Self {
        Self {
            tolerance,
            min_separation: Duration::seconds(min_bars.saturating_mul(bar_seconds)),
        }
    }

    /// Whether `local` is a qualifying retest of `global`.
    pub fn accepts(&self, global: &ExtremeLevel, local: &ExtremeLevel) -> bool {
        if local.time <= global.time || local.time - global.time < self.min_separation {
            return false;
        }
        let approaches = match global.kind {
            LevelKind::High => local.price < global.price,
            LevelKind::Low => local.price > global.price,
        };
        if !approaches {
            return false;
        }
        (global.price - local.price)
            .abs()
            .checked_div(global.price)
            .is_some_and(|distance| distance <= self.tolerance)
    }
}

/// A global level together with the local extreme that retested it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retest {
    pub level: ExtremeLevel,
    pub retest: ExtremeLevel,
}

/// For each global level, the earliest local extreme that retests it.
///
/// Levels without a qualifying retest produce nothing; each level yields at
/// most one signal. The output follows the order of `globals`.
pub fn find_retests(globals: &[ExtremeLevel], locals: &[ExtremeLevel], rules: &RetestRules) -> Vec<Retest> {
    let mut ordered: Vec<&ExtremeLevel> = locals.iter().collect();
    ordered.sort_by_key(|l| l.time);

    globals
        .iter()
        .filter_map(|global| {
            ordered
                .iter()
                .find(|local| local.kind == global.kind && rules.accepts(global, local))
                .map(|local| Retest {
                    level: *global,
                    retest: **local,
                })
        })
        .collect()
}
