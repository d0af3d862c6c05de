//! Rolling-window extrema and the unbroken-level envelope.

use crate::error::DetectorError;
use core_types::{Bar, ExtremeLevel, LevelKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;
use ta::Next as _;
use ta::indicators::{Maximum, Minimum};

enum Window {
    Max(Maximum),
    Min(Minimum),
}

impl Window {
    fn new(kind: LevelKind, period: usize) -> Result<Self, DetectorError> {
        let window = match kind {
            LevelKind::High => Maximum::new(period).map(Window::Max),
            LevelKind::Low => Minimum::new(period).map(Window::Min),
        };
        window.map_err(|e| DetectorError::IndicatorError(format!("Failed to initialize window of {period}: {e:?}")))
    }

    fn next(&mut self, value: f64) -> f64 {
        match self {
            Window::Max(m) => m.next(value),
            Window::Min(m) => m.next(value),
        }
    }
}

fn price_of(bar: &Bar, kind: LevelKind) -> Decimal {
    match kind {
        LevelKind::High => bar.high,
        LevelKind::Low => bar.low,
    }
}

/// Levels where a bar's high (or low) is the extreme of the trailing `window` bars.
///
/// Bars before the first full window never produce a level. The result is in
/// bar order.
pub fn rolling_extrema(bars: &[Bar], window: usize, kind: LevelKind) -> Result<Vec<ExtremeLevel>, DetectorError> {
    if window == 0 {
        return Err(DetectorError::InvalidParameters("window must be at least 1".to_string()));
    }
    let mut indicator = Window::new(kind, window)?;
    let mut levels = Vec::new();

    for (i, bar) in bars.iter().enumerate() {
        let price = price_of(bar, kind);
        let value = price.to_f64().ok_or_else(|| {
            DetectorError::IndicatorError(format!("Failed to convert price {price} to f64"))
        })?;
        let extreme = indicator.next(value);
        if i + 1 >= window && value == extreme {
            levels.push(ExtremeLevel::new(bar.timestamp, price, kind));
        }
    }
    Ok(levels)
}

/// Reduces levels to the envelope that was never broken later in time.
///
/// `levels` is in time order. They are scanned newest to oldest, keeping a level
/// when it reaches or extends the running extreme. The result is in scan order.
pub fn filter_unbroken_levels(levels: &[ExtremeLevel], kind: LevelKind) -> Vec<ExtremeLevel> {
    let mut kept = Vec::new();
    let mut extreme: Option<Decimal> = None;

    for level in levels.iter().rev() {
        let extends = match (extreme, kind) {
            (None, _) => true,
            (Some(e), LevelKind::High) => level.price >= e,
            (Some(e), LevelKind::Low) => level.price <= e,
        };
        if extends {
            extreme = Some(level.price);
            kept.push(*level);
        }
    }
    kept
}

/// The global support/resistance ladder of a ticker.
pub fn global_levels(bars: &[Bar], window: usize, kind: LevelKind) -> Result<Vec<ExtremeLevel>, DetectorError> {
    let raw = rolling_extrema(bars, window, kind)?;
    Ok(filter_unbroken_levels(&raw, kind))
}

/// Fine-grained extrema over the whole history, minus the points already in `global`.
///
/// Returned in ascending time order, ready for retest matching.
pub fn local_extrema(
    bars: &[Bar],
    window: usize,
    unbroken: bool,
    kind: LevelKind,
    global: &[ExtremeLevel],
) -> Result<Vec<ExtremeLevel>, DetectorError> {
    let raw = rolling_extrema(bars, window, kind)?;
    let mut candidates = if unbroken {
        filter_unbroken_levels(&raw, kind)
    } else {
        raw
    };

    let taken: HashSet<(i64, Decimal)> = global.iter().map(ExtremeLevel::key).collect();
    candidates.retain(|l| !taken.contains(&l.key()));
    candidates.sort_by_key(|l| l.time);
    Ok(candidates)
}
