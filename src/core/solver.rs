use super::engine::run_survival_test;
use super::types::Inputs;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GoalType {
    FirstSurvivableYear,
    RequiredBitcoin,
}

#[derive(Debug, Clone, Copy)]
pub struct SolveConfig {
    pub goal_type: GoalType,
    pub start_year: i32,
    pub horizon_years: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl SolveConfig {
    pub fn first_survivable_year(start_year: i32, horizon_years: u32) -> Self {
        Self {
            goal_type: GoalType::FirstSurvivableYear,
            start_year,
            horizon_years,
            search_min: 0.0,
            search_max: 0.0,
            tolerance: 0.0,
            max_iterations: 0,
        }
    }

    pub fn required_bitcoin(
        year: i32,
        search_min: f64,
        search_max: f64,
        tolerance: f64,
        max_iterations: u32,
    ) -> Self {
        Self {
            goal_type: GoalType::RequiredBitcoin,
            start_year: year,
            horizon_years: 0,
            search_min,
            search_max,
            tolerance,
            max_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub passes: bool,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub goal_type: GoalType,
    pub solved_year: Option<i32>,
    pub solved_value: Option<f64>,
    pub iterations: Vec<SolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

pub fn solve_goal(inputs: &Inputs, config: SolveConfig) -> Result<SolveResult, String> {
    validate_config(config)?;
    match config.goal_type {
        GoalType::FirstSurvivableYear => Ok(solve_first_survivable_year(inputs, config)),
        GoalType::RequiredBitcoin => Ok(solve_required_bitcoin(inputs, config)),
    }
}

fn survives_in_year(inputs: &Inputs, year: i32, bitcoin_holdings: f64) -> bool {
    run_survival_test(
        inputs.current_price,
        year,
        bitcoin_holdings,
        inputs.annual_withdrawal,
        inputs.cash_holdings,
    )
    .passes
}

// Fair value is monotone in time, so the first passing year of an ascending
// scan is the boundary.
fn solve_first_survivable_year(inputs: &Inputs, config: SolveConfig) -> SolveResult {
    let mut iterations = Vec::with_capacity(config.horizon_years as usize);
    let end_year = config.start_year + config.horizon_years as i32;

    for (index, year) in (config.start_year..end_year).enumerate() {
        let passes = survives_in_year(inputs, year, inputs.bitcoin_holdings);
        iterations.push(SolveIteration {
            iteration: index as u32 + 1,
            lower_bound: year as f64,
            upper_bound: year as f64,
            candidate_value: year as f64,
            passes,
        });

        if passes {
            return SolveResult {
                goal_type: config.goal_type,
                solved_year: Some(year),
                solved_value: Some(year as f64),
                iterations,
                converged: true,
                feasible: true,
                message: "Found first survivable year.".to_string(),
            };
        }
    }

    SolveResult {
        goal_type: config.goal_type,
        solved_year: None,
        solved_value: None,
        iterations,
        converged: false,
        feasible: false,
        message: "No survivable year within the scan horizon.".to_string(),
    }
}

fn solve_required_bitcoin(inputs: &Inputs, config: SolveConfig) -> SolveResult {
    let mut iterations = Vec::with_capacity(config.max_iterations as usize);

    if survives_in_year(inputs, config.start_year, config.search_min) {
        return SolveResult {
            goal_type: config.goal_type,
            solved_year: Some(config.start_year),
            solved_value: Some(config.search_min),
            iterations,
            converged: true,
            feasible: true,
            message: "Already survives at the lower holdings bound.".to_string(),
        };
    }
    if !survives_in_year(inputs, config.start_year, config.search_max) {
        return SolveResult {
            goal_type: config.goal_type,
            solved_year: Some(config.start_year),
            solved_value: None,
            iterations,
            converged: false,
            feasible: false,
            message: "No surviving holdings level within the search bounds.".to_string(),
        };
    }

    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut converged = false;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let mid = (lo + hi) * 0.5;
        let passes = survives_in_year(inputs, config.start_year, mid);
        iterations.push(SolveIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: mid,
            passes,
        });

        if passes {
            hi = mid;
        } else {
            lo = mid;
        }

        if (hi - lo).abs() <= config.tolerance {
            converged = true;
            break;
        }
    }

    let message = if converged {
        "Solved required bitcoin holdings.".to_string()
    } else {
        "Reached max iterations before tolerance was met; returning best estimate.".to_string()
    };

    SolveResult {
        goal_type: config.goal_type,
        solved_year: Some(config.start_year),
        solved_value: Some(hi),
        iterations,
        converged,
        feasible: true,
        message,
    }
}

fn validate_config(config: SolveConfig) -> Result<(), String> {
    match config.goal_type {
        GoalType::FirstSurvivableYear => {
            if config.horizon_years == 0 {
                return Err("horizon_years must be > 0".to_string());
            }
        }
        GoalType::RequiredBitcoin => {
            if !config.search_min.is_finite() || !config.search_max.is_finite() {
                return Err("search bounds must be finite".to_string());
            }
            if config.search_max <= config.search_min {
                return Err("search_max must be greater than search_min".to_string());
            }
            if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
                return Err("tolerance must be > 0".to_string());
            }
            if config.max_iterations == 0 {
                return Err("max_iterations must be > 0".to_string());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base_inputs() -> Inputs {
        Inputs {
            bitcoin_holdings: 0.5,
            cash_holdings: 0.0,
            annual_withdrawal: 30_000.0,
            current_price: 95_000.0,
            today: NaiveDate::from_ymd_opt(2025, 8, 7).expect("valid test date"),
            years_until_retirement: 0,
            years_to_retirement: 0,
            monthly_savings_amount: 0.0,
            double_down_in_bear_markets: false,
        }
    }

    #[test]
    fn scan_finds_the_survival_boundary_year() {
        let inputs = base_inputs();
        let config = SolveConfig::first_survivable_year(2025, 40);

        let result = solve_goal(&inputs, config).expect("valid config");
        assert!(result.feasible);
        let year = result.solved_year.expect("boundary within horizon");

        assert!(survives_in_year(&inputs, year, inputs.bitcoin_holdings));
        if year > config.start_year {
            assert!(!survives_in_year(&inputs, year - 1, inputs.bitcoin_holdings));
        }
        assert_eq!(
            result.iterations.len(),
            (year - config.start_year + 1) as usize
        );
    }

    #[test]
    fn scan_reports_infeasible_when_horizon_is_too_short() {
        let mut inputs = base_inputs();
        inputs.bitcoin_holdings = 0.001;
        inputs.annual_withdrawal = 500_000.0;

        let result = solve_goal(&inputs, SolveConfig::first_survivable_year(2025, 3))
            .expect("valid config");
        assert!(!result.feasible);
        assert!(result.solved_year.is_none());
        assert_eq!(result.iterations.len(), 3);
    }

    #[test]
    fn bisection_converges_to_the_pass_fail_boundary() {
        let inputs = base_inputs();
        let config = SolveConfig::required_bitcoin(2025, 0.0, 100.0, 0.01, 40);

        let result = solve_goal(&inputs, config).expect("valid config");
        assert!(result.feasible);
        assert!(result.converged);
        let solved = result.solved_value.expect("value expected");

        assert!(survives_in_year(&inputs, 2025, solved));
        assert!(!survives_in_year(&inputs, 2025, solved - 1.0));
    }

    #[test]
    fn bisection_reports_infeasible_when_bounds_are_too_low() {
        let inputs = base_inputs();
        let config = SolveConfig::required_bitcoin(2025, 0.0, 0.01, 0.001, 20);

        let result = solve_goal(&inputs, config).expect("valid config");
        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
    }

    #[test]
    fn config_validation_rejects_degenerate_setups() {
        let inputs = base_inputs();
        assert!(solve_goal(&inputs, SolveConfig::first_survivable_year(2025, 0)).is_err());
        assert!(
            solve_goal(&inputs, SolveConfig::required_bitcoin(2025, 5.0, 1.0, 0.01, 20)).is_err()
        );
        assert!(
            solve_goal(&inputs, SolveConfig::required_bitcoin(2025, 0.0, 1.0, 0.0, 20)).is_err()
        );
        assert!(
            solve_goal(&inputs, SolveConfig::required_bitcoin(2025, 0.0, 1.0, 0.01, 0)).is_err()
        );
    }
}
