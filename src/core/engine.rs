use chrono::{Datelike, Months, NaiveDate};

use super::model;
use super::types::{
    CyclePhase, Inputs, LedgerRow, MonthlyRow, RowEvent, StrategyTag, SurvivalResult,
    WithdrawalDecision,
};

pub const MAX_WITHDRAWAL_YEARS: u32 = 50;
pub const RUNWAY_YEARS_REQUIRED: f64 = 20.0;

// Valuation-ratio band edges, lower-inclusive, scanned ascending.
const EXTREME_UNDERVALUED_MAX: f64 = 0.5;
const UNDERVALUED_MAX: f64 = 0.8;
const NEAR_FAIR_MAX: f64 = 1.2;
const OVERVALUED_MAX: f64 = 2.5;

// Near-fair blending knobs: cap cash at 60% of the need or 1.2x the cash
// value share, whichever is smaller. Tunable, not derived.
pub const NEAR_FAIR_CASH_CAP: f64 = 0.6;
pub const NEAR_FAIR_CASH_TILT: f64 = 1.2;

const UNDERVALUED_CASH_FLOOR: f64 = 0.8;
const OVERVALUED_BITCOIN_CAP: f64 = 0.8;

const BALANCE_EPS: f64 = 1e-9;

pub fn validate_inputs(inputs: &Inputs) -> Vec<String> {
    let mut errors = Vec::new();

    let numerics = [
        ("bitcoin holdings", inputs.bitcoin_holdings),
        ("cash holdings", inputs.cash_holdings),
        ("annual withdrawal", inputs.annual_withdrawal),
        ("current price", inputs.current_price),
        ("monthly savings amount", inputs.monthly_savings_amount),
    ];
    for (name, value) in numerics {
        if !value.is_finite() {
            errors.push(format!("{name} must be a finite number"));
        }
    }

    if inputs.annual_withdrawal <= 0.0 {
        errors.push("annual withdrawal must be greater than zero".to_string());
    }
    if inputs.bitcoin_holdings < 0.0 {
        errors.push("bitcoin holdings cannot be negative".to_string());
    }
    if inputs.cash_holdings < 0.0 {
        errors.push("cash holdings cannot be negative".to_string());
    }
    if inputs.monthly_savings_amount < 0.0 {
        errors.push("monthly savings amount cannot be negative".to_string());
    }
    if inputs.current_price <= 0.0 {
        errors.push("current price must be greater than zero".to_string());
    }

    // Negative holdings are reported above; the emptiness check only applies
    // to genuinely zero portfolios.
    let no_starting_assets = inputs.bitcoin_holdings == 0.0 && inputs.cash_holdings == 0.0;
    let has_savings_plan =
        inputs.monthly_savings_amount > 0.0 && inputs.accumulation_horizon_years() > 0;
    if no_starting_assets && !has_savings_plan {
        errors.push(
            "starting assets are empty and no savings plan is configured".to_string(),
        );
    }

    errors
}

// Fixed stress path: two years at the floor, one at the recovery price, all
// anchored to the trend values for the given calendar year, then a 20-year
// runway check at fair value. The spot price is accepted for call-site
// symmetry but the stress prices come from the model.
pub fn run_survival_test(
    _current_price: f64,
    year: i32,
    bitcoin_holdings: f64,
    annual_withdrawal: f64,
    cash_holdings: f64,
) -> SurvivalResult {
    if bitcoin_holdings <= 0.0 || annual_withdrawal <= 0.0 {
        return SurvivalResult {
            passes: false,
            remaining_bitcoin: 0.0,
            remaining_cash: 0.0,
        };
    }

    let fair = model::fair_value_for_year(year);
    let floor = fair * model::FLOOR_RATIO;
    let recovery = floor + (fair - floor) * model::RECOVERY_BLEND;

    let mut bitcoin = bitcoin_holdings;
    let mut cash = cash_holdings.max(0.0);

    for sale_price in [floor, floor, recovery] {
        if cash >= annual_withdrawal {
            cash -= annual_withdrawal;
        } else {
            let from_sale = annual_withdrawal - cash;
            cash = 0.0;
            bitcoin -= from_sale / sale_price;
        }
        if bitcoin < 0.0 {
            return SurvivalResult {
                passes: false,
                remaining_bitcoin: 0.0,
                remaining_cash: 0.0,
            };
        }
    }

    let total_remaining_value = bitcoin * fair + cash;
    SurvivalResult {
        passes: total_remaining_value / annual_withdrawal >= RUNWAY_YEARS_REQUIRED,
        remaining_bitcoin: bitcoin,
        remaining_cash: cash,
    }
}

#[derive(Debug, Clone, Copy)]
struct Split {
    cash: f64,
    bitcoin: f64,
}

pub fn decide_withdrawal(
    current_price: f64,
    fair_value: f64,
    available_cash: f64,
    available_bitcoin: f64,
    amount_needed: f64,
    emergency_mode: bool,
) -> WithdrawalDecision {
    let cash = available_cash.max(0.0);
    let bitcoin = available_bitcoin.max(0.0);
    let needed = amount_needed.max(0.0);
    // May be non-finite when fair value is degenerate; callers treat a
    // non-finite ratio as "no usable recommendation".
    let ratio = current_price / fair_value;

    if emergency_mode {
        let split = cash_first_split(cash, bitcoin, current_price, needed);
        return finish_decision(
            split,
            cash,
            bitcoin,
            current_price,
            needed,
            StrategyTag::EmergencyOnly,
            ratio,
        );
    }

    let (split, tag) = if ratio <= EXTREME_UNDERVALUED_MAX {
        (
            cash_first_split(cash, bitcoin, current_price, needed),
            StrategyTag::HodlBitcoin,
        )
    } else if ratio <= UNDERVALUED_MAX {
        (
            undervalued_split(cash, bitcoin, current_price, needed),
            StrategyTag::HodlBitcoin,
        )
    } else if ratio <= NEAR_FAIR_MAX {
        (
            near_fair_split(cash, bitcoin, current_price, needed),
            StrategyTag::Balanced,
        )
    } else if ratio <= OVERVALUED_MAX {
        (
            overvalued_split(cash, bitcoin, current_price, needed),
            StrategyTag::SpendBitcoin,
        )
    } else {
        // Bubble and extreme bubble alike liquidate bitcoin before cash.
        (
            bitcoin_first_split(cash, bitcoin, current_price, needed),
            StrategyTag::SpendBitcoin,
        )
    };

    finish_decision(split, cash, bitcoin, current_price, needed, tag, ratio)
}

fn top_up_with_bitcoin(use_cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    let remainder = (needed - use_cash).max(0.0);
    let use_bitcoin = if remainder > 0.0 && price > 0.0 {
        bitcoin.min(remainder / price)
    } else {
        0.0
    };
    Split {
        cash: use_cash,
        bitcoin: use_bitcoin,
    }
}

fn cash_first_split(cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    top_up_with_bitcoin(cash.min(needed), bitcoin, price, needed)
}

fn bitcoin_first_split(cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    let bitcoin_value = bitcoin * price;
    let use_bitcoin = if price > 0.0 {
        bitcoin_value.min(needed) / price
    } else {
        0.0
    };
    let remainder = (needed - use_bitcoin * price).max(0.0);
    Split {
        cash: cash.min(remainder),
        bitcoin: use_bitcoin,
    }
}

fn undervalued_split(cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    if needed <= 0.0 {
        return Split {
            cash: 0.0,
            bitcoin: 0.0,
        };
    }
    let coverage = (cash / needed).min(1.0);
    let cash_target = needed * UNDERVALUED_CASH_FLOOR.max(coverage);
    top_up_with_bitcoin(cash.min(cash_target), bitcoin, price, needed)
}

fn near_fair_split(cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    let total_value = cash + bitcoin * price;
    if total_value <= 0.0 || needed <= 0.0 {
        return Split {
            cash: 0.0,
            bitcoin: 0.0,
        };
    }
    let cash_share = cash / total_value;
    let cash_fraction = NEAR_FAIR_CASH_CAP.min(cash_share * NEAR_FAIR_CASH_TILT);
    top_up_with_bitcoin(cash.min(needed * cash_fraction), bitcoin, price, needed)
}

fn overvalued_split(cash: f64, bitcoin: f64, price: f64, needed: f64) -> Split {
    let bitcoin_value = bitcoin * price;
    if bitcoin_value >= needed && price > 0.0 {
        return Split {
            cash: 0.0,
            bitcoin: needed / price,
        };
    }
    let from_bitcoin = bitcoin_value.min(needed * OVERVALUED_BITCOIN_CAP);
    let use_bitcoin = if price > 0.0 { from_bitcoin / price } else { 0.0 };
    Split {
        cash: cash.min((needed - from_bitcoin).max(0.0)),
        bitcoin: use_bitcoin,
    }
}

// Whatever the band preferred, any uncovered remainder is drawn from the
// assets that are left before a shortfall is reported, so a decision only
// signals insufficiency once both balances are exhausted.
fn finish_decision(
    mut split: Split,
    cash: f64,
    bitcoin: f64,
    price: f64,
    needed: f64,
    tag: StrategyTag,
    ratio: f64,
) -> WithdrawalDecision {
    let covered = split.cash + split.bitcoin * price;
    let mut remaining = (needed - covered).max(0.0);

    if remaining > BALANCE_EPS {
        let extra_cash = (cash - split.cash).max(0.0).min(remaining);
        split.cash += extra_cash;
        remaining -= extra_cash;
    }
    if remaining > BALANCE_EPS && price > 0.0 {
        let extra_bitcoin = (bitcoin - split.bitcoin).max(0.0).min(remaining / price);
        split.bitcoin += extra_bitcoin;
        remaining -= extra_bitcoin * price;
    }

    WithdrawalDecision {
        use_cash_amount: split.cash,
        use_bitcoin_amount: split.bitcoin,
        strategy_tag: tag,
        fair_value_ratio: ratio,
        shortfall: remaining.max(0.0),
    }
}

pub fn project_accumulation(
    monthly_amount: f64,
    years: u32,
    double_during_bear: bool,
    start_date: NaiveDate,
) -> Vec<MonthlyRow> {
    let months = years.saturating_mul(12);
    let monthly = monthly_amount.max(0.0);
    let anchor_year = start_date.year();

    let mut rows = Vec::with_capacity(months as usize);
    let mut total_bitcoin = 0.0;
    let mut total_invested = 0.0;

    for month_index in 0..months {
        let date = start_date
            .checked_add_months(Months::new(month_index))
            .expect("date within calendar range");
        let offset = date.year() - anchor_year;
        // The start calendar year is "today": plain trend pricing, no cycle.
        let (price, phase) = if offset <= 0 {
            (model::fair_value(date), CyclePhase::CurrentYear)
        } else {
            let cycle = model::price_for_offset(anchor_year, offset as u32);
            (cycle.price, cycle.phase)
        };

        let contribution = if double_during_bear && phase.is_bear() {
            monthly * 2.0
        } else {
            monthly
        };
        let bitcoin_purchased = if price > 0.0 { contribution / price } else { 0.0 };

        total_bitcoin += bitcoin_purchased;
        total_invested += contribution;
        rows.push(MonthlyRow {
            month_index,
            date,
            phase,
            price,
            contribution,
            bitcoin_purchased,
            total_bitcoin,
            total_invested,
        });
    }

    rows
}

pub fn simulate_lifecycle(inputs: &Inputs) -> Vec<LedgerRow> {
    let mut ledger = Vec::new();
    let mut bitcoin = inputs.bitcoin_holdings.max(0.0);
    let mut cash = inputs.cash_holdings.max(0.0);
    let retirement_year = inputs.retirement_year();

    if let Some(plan) = inputs.accumulation_plan() {
        let monthly = project_accumulation(
            plan.monthly_amount,
            plan.years,
            plan.double_during_bear,
            plan.start_date,
        );
        append_accumulation_years(&mut ledger, &monthly, &mut bitcoin, cash);
    }

    // Year 0 states the starting balances; withdrawals begin the next year.
    let start = model::price_for_offset(retirement_year, 0);
    ledger.push(LedgerRow {
        calendar_year: retirement_year,
        year_index: 0,
        event: RowEvent::RetirementStart,
        phase: start.phase,
        price: start.price,
        fair_value_ratio: start.price / model::fair_value_for_year(retirement_year),
        cash_flow: 0.0,
        bitcoin_delta: 0.0,
        bitcoin_balance: bitcoin,
        cash_balance: cash,
    });

    for offset in 1..=MAX_WITHDRAWAL_YEARS {
        let calendar_year = retirement_year + offset as i32;
        let cycle = model::price_for_offset(retirement_year, offset);
        let fair = model::fair_value_for_year(calendar_year);
        let decision = decide_withdrawal(
            cycle.price,
            fair,
            cash,
            bitcoin,
            inputs.annual_withdrawal,
            false,
        );

        cash = (cash - decision.use_cash_amount).max(0.0);
        bitcoin = (bitcoin - decision.use_bitcoin_amount).max(0.0);

        let event = if decision.shortfall > BALANCE_EPS {
            RowEvent::Depleted
        } else {
            RowEvent::Withdrawal
        };
        ledger.push(LedgerRow {
            calendar_year,
            year_index: offset,
            event,
            phase: cycle.phase,
            price: cycle.price,
            fair_value_ratio: cycle.price / fair,
            cash_flow: -decision.covered_amount(cycle.price),
            bitcoin_delta: -decision.use_bitcoin_amount,
            bitcoin_balance: bitcoin,
            cash_balance: cash,
        });

        if bitcoin <= BALANCE_EPS && cash <= BALANCE_EPS {
            break;
        }
    }

    ledger
}

// Contributions are new money, so the cash balance is untouched; the cash
// flow column records the year's invested amount as an outflow.
fn append_accumulation_years(
    ledger: &mut Vec<LedgerRow>,
    monthly: &[MonthlyRow],
    bitcoin: &mut f64,
    cash: f64,
) {
    let mut start = 0;
    let mut year_index = 0u32;
    while start < monthly.len() {
        let year = monthly[start].date.year();
        let mut end = start;
        while end < monthly.len() && monthly[end].date.year() == year {
            end += 1;
        }
        let span = &monthly[start..end];
        let invested: f64 = span.iter().map(|row| row.contribution).sum();
        let purchased: f64 = span.iter().map(|row| row.bitcoin_purchased).sum();
        let last = &span[span.len() - 1];

        *bitcoin += purchased;
        ledger.push(LedgerRow {
            calendar_year: year,
            year_index,
            event: RowEvent::Accumulation,
            phase: last.phase,
            price: last.price,
            fair_value_ratio: last.price / model::fair_value_for_year(year),
            cash_flow: -invested,
            bitcoin_delta: purchased,
            bitcoin_balance: *bitcoin,
            cash_balance: cash,
        });

        year_index += 1;
        start = end;
    }
}
