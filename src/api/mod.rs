use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    Inputs, LedgerRow, PricePoint, SolveConfig, SurvivalResult, WithdrawalDecision,
    decide_withdrawal, fair_value, price_point, run_survival_test, simulate_lifecycle,
    solve_goal, validate_inputs,
};

// How far ahead the readiness scan looks for the first survivable year.
const READINESS_SCAN_YEARS: u32 = 80;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    bitcoin_amount: Option<f64>,
    cash_amount: Option<f64>,
    annual_withdrawal: Option<f64>,
    current_price: Option<f64>,
    today: Option<String>,
    years_until_retirement: Option<u32>,
    years_to_retirement: Option<u32>,
    monthly_savings_amount: Option<f64>,
    double_down_in_bear_markets: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AllocationPayload {
    current_price: Option<f64>,
    date: Option<String>,
    available_cash: Option<f64>,
    available_bitcoin: Option<f64>,
    amount_needed: Option<f64>,
    emergency_mode: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SurvivalPayload {
    current_price: Option<f64>,
    year: Option<i32>,
    bitcoin_amount: Option<f64>,
    annual_withdrawal: Option<f64>,
    cash_amount: Option<f64>,
}

#[derive(Parser, Debug)]
#[command(
    name = "hodlplan",
    about = "Power-law bitcoin retirement planner (cycle-aware withdrawals + survival stress test)"
)]
struct Cli {
    #[arg(long, default_value_t = 0.0)]
    bitcoin_amount: f64,
    #[arg(long, default_value_t = 0.0)]
    cash_amount: f64,
    #[arg(long, default_value_t = 40_000.0, help = "Annual withdrawal target once retired")]
    annual_withdrawal: f64,
    #[arg(long, help = "Spot price; defaults to the model fair value for today")]
    current_price: Option<f64>,
    #[arg(long, help = "Valuation date (YYYY-MM-DD); defaults to the system date")]
    today: Option<String>,
    #[arg(long, default_value_t = 0)]
    years_until_retirement: u32,
    #[arg(long, default_value_t = 0)]
    years_to_retirement: u32,
    #[arg(long, default_value_t = 0.0)]
    monthly_savings_amount: f64,
    #[arg(long, help = "Double monthly purchases during bear-market years")]
    double_down_in_bear_markets: bool,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationErrorResponse {
    error: String,
    details: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    retirement_year: i32,
    current_price: f64,
    today_price_point: PricePoint,
    survival: SurvivalResult,
    today_decision: WithdrawalDecision,
    first_survivable_year: Option<i32>,
    ledger: Vec<LedgerRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocationResponse {
    price_point: PricePoint,
    decision: WithdrawalDecision,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/allocation",
            get(allocation_get_handler).post(allocation_post_handler),
        )
        .route(
            "/api/survival",
            get(survival_get_handler).post(survival_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("hodlplan HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match api_request_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(details) => return validation_error_response(details),
    };

    let ledger = simulate_lifecycle(&inputs);
    let survival = run_survival_test(
        inputs.current_price,
        inputs.today.year(),
        inputs.bitcoin_holdings,
        inputs.annual_withdrawal,
        inputs.cash_holdings,
    );
    let today_point = price_point(inputs.today);
    let today_decision = decide_withdrawal(
        inputs.current_price,
        today_point.fair_value,
        inputs.cash_holdings,
        inputs.bitcoin_holdings,
        inputs.annual_withdrawal,
        false,
    );
    let first_survivable_year = solve_goal(
        &inputs,
        SolveConfig::first_survivable_year(inputs.today.year(), READINESS_SCAN_YEARS),
    )
    .ok()
    .and_then(|result| result.solved_year);

    let response = SimulateResponse {
        retirement_year: inputs.retirement_year(),
        current_price: inputs.current_price,
        today_price_point: today_point,
        survival,
        today_decision,
        first_survivable_year,
        ledger,
    };
    json_response(StatusCode::OK, response)
}

async fn allocation_get_handler(Query(payload): Query<AllocationPayload>) -> Response {
    allocation_handler_impl(payload).await
}

async fn allocation_post_handler(Json(payload): Json<AllocationPayload>) -> Response {
    allocation_handler_impl(payload).await
}

async fn allocation_handler_impl(payload: AllocationPayload) -> Response {
    let date = match resolve_date(payload.date.as_deref()) {
        Ok(date) => date,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let point = price_point(date);
    let current_price = payload.current_price.unwrap_or(point.fair_value);
    if !current_price.is_finite() || current_price <= 0.0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "currentPrice must be a positive finite number",
        );
    }

    let decision = decide_withdrawal(
        current_price,
        point.fair_value,
        payload.available_cash.unwrap_or(0.0),
        payload.available_bitcoin.unwrap_or(0.0),
        payload.amount_needed.unwrap_or(0.0),
        payload.emergency_mode.unwrap_or(false),
    );
    json_response(
        StatusCode::OK,
        AllocationResponse {
            price_point: point,
            decision,
        },
    )
}

async fn survival_get_handler(Query(payload): Query<SurvivalPayload>) -> Response {
    survival_handler_impl(payload).await
}

async fn survival_post_handler(Json(payload): Json<SurvivalPayload>) -> Response {
    survival_handler_impl(payload).await
}

async fn survival_handler_impl(payload: SurvivalPayload) -> Response {
    let today = Local::now().date_naive();
    let year = payload.year.unwrap_or_else(|| today.year());
    let current_price = payload.current_price.unwrap_or_else(|| fair_value(today));

    let result = run_survival_test(
        current_price,
        year,
        payload.bitcoin_amount.unwrap_or(0.0),
        payload.annual_withdrawal.unwrap_or(0.0),
        payload.cash_amount.unwrap_or(0.0),
    );
    json_response(StatusCode::OK, result)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn validation_error_response(details: Vec<String>) -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        ValidationErrorResponse {
            error: "Invalid inputs".to_string(),
            details,
        },
    )
}

fn resolve_date(raw: Option<&str>) -> Result<NaiveDate, String> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| format!("Invalid date {raw:?}: {e}")),
        None => Ok(Local::now().date_naive()),
    }
}

fn default_cli_for_api() -> Cli {
    Cli::parse_from(["hodlplan"])
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<Inputs, Vec<String>> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| vec![format!("Invalid API JSON payload: {e}")])?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<Inputs, Vec<String>> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.bitcoin_amount {
        cli.bitcoin_amount = v;
    }
    if let Some(v) = payload.cash_amount {
        cli.cash_amount = v;
    }
    if let Some(v) = payload.annual_withdrawal {
        cli.annual_withdrawal = v;
    }
    if let Some(v) = payload.current_price {
        cli.current_price = Some(v);
    }
    if let Some(v) = payload.today {
        cli.today = Some(v);
    }
    if let Some(v) = payload.years_until_retirement {
        cli.years_until_retirement = v;
    }
    if let Some(v) = payload.years_to_retirement {
        cli.years_to_retirement = v;
    }
    if let Some(v) = payload.monthly_savings_amount {
        cli.monthly_savings_amount = v;
    }
    if let Some(v) = payload.double_down_in_bear_markets {
        cli.double_down_in_bear_markets = v;
    }

    build_inputs(cli)
}

fn build_inputs(cli: Cli) -> Result<Inputs, Vec<String>> {
    let today = match cli.today.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| vec![format!("Invalid today date {raw:?}: {e}")])?,
        None => Local::now().date_naive(),
    };
    let current_price = cli.current_price.unwrap_or_else(|| fair_value(today));

    let inputs = Inputs {
        bitcoin_holdings: cli.bitcoin_amount,
        cash_holdings: cli.cash_amount,
        annual_withdrawal: cli.annual_withdrawal,
        current_price,
        today,
        years_until_retirement: cli.years_until_retirement,
        years_to_retirement: cli.years_to_retirement,
        monthly_savings_amount: cli.monthly_savings_amount,
        double_down_in_bear_markets: cli.double_down_in_bear_markets,
    };

    let errors = validate_inputs(&inputs);
    if errors.is_empty() { Ok(inputs) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_maps_onto_inputs() {
        let inputs = api_request_from_json(
            r#"{
                "bitcoinAmount": 2.5,
                "cashAmount": 80000,
                "annualWithdrawal": 45000,
                "currentPrice": 90000,
                "today": "2025-08-07",
                "yearsUntilRetirement": 3,
                "yearsToRetirement": 7,
                "monthlySavingsAmount": 1200,
                "doubleDownInBearMarkets": true
            }"#,
        )
        .expect("valid payload");

        assert_eq!(inputs.bitcoin_holdings, 2.5);
        assert_eq!(inputs.cash_holdings, 80_000.0);
        assert_eq!(inputs.annual_withdrawal, 45_000.0);
        assert_eq!(inputs.current_price, 90_000.0);
        assert_eq!(
            inputs.today,
            NaiveDate::from_ymd_opt(2025, 8, 7).expect("valid date")
        );
        assert_eq!(inputs.accumulation_horizon_years(), 7);
        assert_eq!(inputs.retirement_year(), 2032);
        assert!(inputs.double_down_in_bear_markets);
    }

    #[test]
    fn missing_price_defaults_to_the_model_fair_value() {
        let inputs = api_request_from_json(
            r#"{"bitcoinAmount": 1.0, "annualWithdrawal": 30000, "today": "2025-08-07"}"#,
        )
        .expect("valid payload");
        assert_eq!(inputs.current_price, fair_value(inputs.today));
        assert!(inputs.current_price > 0.0);
    }

    #[test]
    fn empty_payload_fails_validation_with_the_asset_message() {
        let errors = api_request_from_json("{}").expect_err("no assets configured");
        assert!(errors.iter().any(|e| e.contains("starting assets")));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let errors = api_request_from_json(
            r#"{
                "bitcoinAmount": -1,
                "cashAmount": -2,
                "annualWithdrawal": -3,
                "today": "2025-08-07"
            }"#,
        )
        .expect_err("invalid inputs");
        assert!(errors.len() >= 3);
        assert!(errors.iter().any(|e| e.contains("annual withdrawal")));
        assert!(errors.iter().any(|e| e.contains("bitcoin holdings")));
        assert!(errors.iter().any(|e| e.contains("cash holdings")));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        let errors = api_request_from_json(
            r#"{"bitcoinAmount": 1.0, "today": "07/08/2025"}"#,
        )
        .expect_err("bad date");
        assert!(errors[0].contains("Invalid today date"));

        assert!(resolve_date(Some("2025-08-07")).is_ok());
        assert!(resolve_date(Some("not-a-date")).is_err());
    }

    #[test]
    fn cli_defaults_parse_and_validate_shape() {
        let cli = default_cli_for_api();
        assert_eq!(cli.bitcoin_amount, 0.0);
        assert_eq!(cli.annual_withdrawal, 40_000.0);
        assert!(cli.current_price.is_none());
    }
}
