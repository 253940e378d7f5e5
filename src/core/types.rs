use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePhase {
    DeepBearFloor,
    BearRecovery,
    BullMarket,
    BullPeakCorrection,
    FairValue,
    CurrentYear,
}

impl CyclePhase {
    pub fn is_bear(self) -> bool {
        matches!(self, CyclePhase::DeepBearFloor | CyclePhase::BearRecovery)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    HodlBitcoin,
    Balanced,
    SpendBitcoin,
    EmergencyOnly,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowEvent {
    Accumulation,
    RetirementStart,
    Withdrawal,
    Depleted,
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub bitcoin_holdings: f64,
    pub cash_holdings: f64,
    pub annual_withdrawal: f64,
    pub current_price: f64,
    pub today: NaiveDate,
    pub years_until_retirement: u32,
    pub years_to_retirement: u32,
    pub monthly_savings_amount: f64,
    pub double_down_in_bear_markets: bool,
}

impl Inputs {
    // The two horizon fields come from different input forms; the later one wins.
    pub fn accumulation_horizon_years(&self) -> u32 {
        self.years_until_retirement.max(self.years_to_retirement)
    }

    pub fn retirement_year(&self) -> i32 {
        self.today.year() + self.accumulation_horizon_years() as i32
    }

    pub fn accumulation_plan(&self) -> Option<AccumulationPlan> {
        let years = self.accumulation_horizon_years();
        if years == 0 {
            return None;
        }
        Some(AccumulationPlan {
            monthly_amount: self.monthly_savings_amount.max(0.0),
            years,
            double_during_bear: self.double_down_in_bear_markets,
            start_date: self.today,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AccumulationPlan {
    pub monthly_amount: f64,
    pub years: u32,
    pub double_during_bear: bool,
    pub start_date: NaiveDate,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: NaiveDate,
    pub fair_value: f64,
    pub floor_value: f64,
    pub upper_bound: f64,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclePrice {
    pub price: f64,
    pub phase: CyclePhase,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurvivalResult {
    pub passes: bool,
    pub remaining_bitcoin: f64,
    pub remaining_cash: f64,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDecision {
    pub use_cash_amount: f64,
    pub use_bitcoin_amount: f64,
    pub strategy_tag: StrategyTag,
    pub fair_value_ratio: f64,
    pub shortfall: f64,
}

impl WithdrawalDecision {
    pub fn covered_amount(&self, current_price: f64) -> f64 {
        self.use_cash_amount + self.use_bitcoin_amount * current_price
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRow {
    pub month_index: u32,
    pub date: NaiveDate,
    pub phase: CyclePhase,
    pub price: f64,
    pub contribution: f64,
    pub bitcoin_purchased: f64,
    pub total_bitcoin: f64,
    pub total_invested: f64,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub calendar_year: i32,
    pub year_index: u32,
    pub event: RowEvent,
    pub phase: CyclePhase,
    pub price: f64,
    pub fair_value_ratio: f64,
    pub cash_flow: f64,
    pub bitcoin_delta: f64,
    pub bitcoin_balance: f64,
    pub cash_balance: f64,
}
