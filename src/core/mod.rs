mod engine;
mod model;
mod solver;
mod types;

pub use engine::{
    MAX_WITHDRAWAL_YEARS, NEAR_FAIR_CASH_CAP, NEAR_FAIR_CASH_TILT, RUNWAY_YEARS_REQUIRED,
    decide_withdrawal, project_accumulation, run_survival_test, simulate_lifecycle,
    validate_inputs,
};
pub use model::{
    FLOOR_RATIO, POWER_LAW_COEFFICIENT, POWER_LAW_EXPONENT, RECOVERY_BLEND, UPPER_RATIO,
    fair_value, fair_value_for_year, floor_value, genesis_date, price_for_absolute_year,
    price_for_offset, price_point, upper_bound, year_start,
};
pub use solver::{GoalType, SolveConfig, SolveIteration, SolveResult, solve_goal};
pub use types::{
    AccumulationPlan, CyclePhase, CyclePrice, Inputs, LedgerRow, MonthlyRow, PricePoint,
    RowEvent, StrategyTag, SurvivalResult, WithdrawalDecision,
};
