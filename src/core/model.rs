use chrono::NaiveDate;

use super::types::{CyclePhase, CyclePrice, PricePoint};

// Support-line power law: fair value = A * days^B, days counted from the
// genesis block. The floor and upper band are fixed multiples of fair value,
// so upper/floor is a constant ~4.76x trading range.
pub const POWER_LAW_COEFFICIENT: f64 = 1.0117e-17;
pub const POWER_LAW_EXPONENT: f64 = 5.82;
pub const FLOOR_RATIO: f64 = 0.42;
pub const UPPER_RATIO: f64 = 2.0;

// Blend positions inside the floor..fair and fair..upper bands for the four
// repeating cycle phases.
pub const RECOVERY_BLEND: f64 = 0.75;
const BULL_BLEND: f64 = 0.7;
const PEAK_CORRECTION_BLEND: f64 = 0.3;

pub fn genesis_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2009, 1, 3).expect("valid genesis date")
}

// Clamped to one day so dates at or before genesis still price positive under
// the fractional exponent.
fn days_since_genesis(date: NaiveDate) -> f64 {
    (date - genesis_date()).num_days().max(1) as f64
}

pub fn fair_value(date: NaiveDate) -> f64 {
    POWER_LAW_COEFFICIENT * days_since_genesis(date).powf(POWER_LAW_EXPONENT)
}

pub fn floor_value(date: NaiveDate) -> f64 {
    fair_value(date) * FLOOR_RATIO
}

pub fn upper_bound(date: NaiveDate) -> f64 {
    fair_value(date) * UPPER_RATIO
}

pub fn price_point(date: NaiveDate) -> PricePoint {
    let fair = fair_value(date);
    PricePoint {
        date,
        fair_value: fair,
        floor_value: fair * FLOOR_RATIO,
        upper_bound: fair * UPPER_RATIO,
    }
}

pub fn year_start(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).expect("valid calendar year")
}

pub fn fair_value_for_year(year: i32) -> f64 {
    fair_value(year_start(year))
}

// Two forced floor years at the anchor, one recovery year, then the repeating
// four-phase pattern. Band values are evaluated at anchor + offset, so the
// phases ride the growing trend rather than resetting it.
pub fn price_for_offset(anchor_year: i32, offset_years: u32) -> CyclePrice {
    let point = price_point(year_start(anchor_year + offset_years as i32));
    let (price, phase) = match offset_years {
        0 | 1 => (point.floor_value, CyclePhase::DeepBearFloor),
        2 => (recovery_price(&point), CyclePhase::BearRecovery),
        _ => match (offset_years - 3) % 4 {
            0 => (point.floor_value, CyclePhase::DeepBearFloor),
            1 => (recovery_price(&point), CyclePhase::BearRecovery),
            2 => (
                point.fair_value + (point.upper_bound - point.fair_value) * BULL_BLEND,
                CyclePhase::BullMarket,
            ),
            _ => (
                point.fair_value + (point.upper_bound - point.fair_value) * PEAK_CORRECTION_BLEND,
                CyclePhase::BullPeakCorrection,
            ),
        },
    };
    CyclePrice { price, phase }
}

pub fn price_for_absolute_year(calendar_year: i32, anchor_year: i32) -> Option<CyclePrice> {
    if calendar_year < anchor_year {
        return None;
    }
    Some(price_for_offset(
        anchor_year,
        (calendar_year - anchor_year) as u32,
    ))
}

fn recovery_price(point: &PricePoint) -> f64 {
    point.floor_value + (point.fair_value - point.floor_value) * RECOVERY_BLEND
}
