use axum::{
    Router,
    extract::{Json, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Asset, AssetKind, EquityCompanyConfig, EquityContract, Expense, PropertyConfig, SalaryData,
    SimulationDataPoint, SimulationParams, WithdrawalIteration, YearMonth,
    find_optimal_withdrawal, net_employment_income,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiAssetKind {
    Pension,
    Liquid,
    #[serde(alias = "investment", alias = "investments")]
    Invest,
}

impl From<ApiAssetKind> for AssetKind {
    fn from(value: ApiAssetKind) -> Self {
        match value {
            ApiAssetKind::Pension => AssetKind::Pension,
            ApiAssetKind::Liquid => AssetKind::Liquid,
            ApiAssetKind::Invest => AssetKind::Invest,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPayload {
    #[serde(default)]
    id: u32,
    name: String,
    value: f64,
    kind: ApiAssetKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpensePayload {
    #[serde(default)]
    id: u32,
    name: String,
    amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractPayload {
    name: String,
    shares: f64,
    strike: f64,
    start_year: i32,
    start_month: u32,
    period_years: f64,
    #[serde(default)]
    cliff_months: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EquityCompanyPayload {
    #[serde(default)]
    id: u32,
    name: String,
    exit_year: i32,
    share_price_at_exit: f64,
    #[serde(default)]
    contracts: Vec<ContractPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start_year: Option<i32>,
    start_month: Option<u32>,
    current_age: Option<u32>,
    end_of_life_age: Option<u32>,

    annual_return: Option<f64>,
    inflation_rate: Option<f64>,
    property_appreciation_rate: Option<f64>,
    fx_rate: Option<f64>,

    transition_to_half_work_year: Option<f64>,
    stop_work_year: Option<f64>,

    gross_salary_primary: Option<f64>,
    net_salary_primary: Option<f64>,
    gross_salary_secondary: Option<f64>,
    net_salary_secondary: Option<f64>,
    pension_contribution_rate: Option<f64>,

    initial_investments: Option<f64>,
    initial_pension: Option<f64>,
    monthly_budget: Option<f64>,

    property_price: Option<f64>,
    property_year: Option<i32>,
    property_monthly_savings: Option<f64>,

    assets: Option<Vec<AssetPayload>>,
    monthly_expenses: Option<Vec<ExpensePayload>>,
    yearly_expenses: Option<Vec<ExpensePayload>>,
    equity_companies: Option<Vec<EquityCompanyPayload>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "glidepath",
    about = "Household net-worth projection and sustainable-withdrawal planner"
)]
struct Cli {
    #[arg(long, default_value_t = 2026, help = "Calendar year the projection starts in")]
    start_year: i32,
    #[arg(long, default_value_t = 1, help = "Calendar month (1-12) the projection starts in")]
    start_month: u32,
    #[arg(long, default_value_t = 40)]
    current_age: u32,
    #[arg(long, default_value_t = 90, help = "Age to fund through")]
    end_of_life_age: u32,
    #[arg(
        long,
        default_value_t = 7.0,
        help = "Blended annual portfolio return in percent"
    )]
    annual_return: f64,
    #[arg(long, default_value_t = 3.0, help = "Expected annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 3.5,
        help = "Annual property appreciation in percent"
    )]
    property_appreciation_rate: f64,
    #[arg(
        long,
        default_value_t = 3.6,
        help = "Conversion rate applied to foreign-listed equity proceeds"
    )]
    fx_rate: f64,
    #[arg(
        long,
        default_value_t = 10.0,
        help = "Years from the start until work drops to half time"
    )]
    transition_to_half_work_year: f64,
    #[arg(long, default_value_t = 20.0, help = "Years from the start until work stops")]
    stop_work_year: f64,
    #[arg(long, default_value_t = 45000.0, help = "Primary earner gross monthly salary")]
    gross_salary_primary: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Primary earner net monthly salary; derived from gross when 0"
    )]
    net_salary_primary: f64,
    #[arg(long, default_value_t = 25000.0, help = "Secondary earner gross monthly salary")]
    gross_salary_secondary: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Secondary earner net monthly salary; derived from gross when 0"
    )]
    net_salary_secondary: f64,
    #[arg(
        long,
        default_value_t = 12.5,
        help = "Pension contribution as a percent of gross salary"
    )]
    pension_contribution_rate: f64,
    #[arg(long, default_value_t = 500000.0)]
    initial_investments: f64,
    #[arg(long, default_value_t = 300000.0)]
    initial_pension: f64,
    #[arg(long, default_value_t = 15000.0, help = "Household monthly budget in today's money")]
    monthly_budget: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "One-time property purchase price; 0 disables the purchase"
    )]
    property_price: f64,
    #[arg(long, default_value_t = 0, help = "Calendar year of the property purchase")]
    property_year: i32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Monthly expense reduction once the property is owned (e.g. rent)"
    )]
    property_monthly_savings: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    optimal_withdrawal: f64,
    iterations: Vec<WithdrawalIteration>,
    points: Vec<SimulationDataPoint>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn resolve_net_salary(gross: f64, net: f64) -> f64 {
    if net == 0.0 && gross > 0.0 {
        net_employment_income(gross * 12.0) / 12.0
    } else {
        net
    }
}

fn build_params(cli: Cli) -> Result<SimulationParams, String> {
    if !(1..=12).contains(&cli.start_month) {
        return Err("--start-month must be between 1 and 12".to_string());
    }

    if cli.current_age == 0 {
        return Err("--current-age must be > 0".to_string());
    }

    if cli.end_of_life_age <= cli.current_age {
        return Err("--end-of-life-age must be > --current-age".to_string());
    }

    if !(-100.0..=100.0).contains(&cli.annual_return) {
        return Err("--annual-return must be between -100 and 100".to_string());
    }

    if !(-100.0..=100.0).contains(&cli.inflation_rate) {
        return Err("--inflation-rate must be between -100 and 100".to_string());
    }

    if !(-100.0..=100.0).contains(&cli.property_appreciation_rate) {
        return Err("--property-appreciation-rate must be between -100 and 100".to_string());
    }

    if !cli.fx_rate.is_finite() || cli.fx_rate <= 0.0 {
        return Err("--fx-rate must be > 0".to_string());
    }

    if !cli.transition_to_half_work_year.is_finite() || cli.transition_to_half_work_year < 0.0 {
        return Err("--transition-to-half-work-year must be >= 0".to_string());
    }

    if !cli.stop_work_year.is_finite() || cli.stop_work_year < cli.transition_to_half_work_year {
        return Err("--stop-work-year must be >= --transition-to-half-work-year".to_string());
    }

    if !(0.0..=100.0).contains(&cli.pension_contribution_rate) {
        return Err("--pension-contribution-rate must be between 0 and 100".to_string());
    }

    for (name, value) in [
        ("--gross-salary-primary", cli.gross_salary_primary),
        ("--net-salary-primary", cli.net_salary_primary),
        ("--gross-salary-secondary", cli.gross_salary_secondary),
        ("--net-salary-secondary", cli.net_salary_secondary),
        ("--initial-investments", cli.initial_investments),
        ("--initial-pension", cli.initial_pension),
        ("--monthly-budget", cli.monthly_budget),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    let net_primary = resolve_net_salary(cli.gross_salary_primary, cli.net_salary_primary);
    let net_secondary = resolve_net_salary(cli.gross_salary_secondary, cli.net_salary_secondary);

    if net_primary > cli.gross_salary_primary {
        return Err("--net-salary-primary cannot exceed --gross-salary-primary".to_string());
    }

    if net_secondary > cli.gross_salary_secondary {
        return Err("--net-salary-secondary cannot exceed --gross-salary-secondary".to_string());
    }

    let property = if cli.property_price > 0.0 {
        if !cli.property_price.is_finite() {
            return Err("--property-price must be finite".to_string());
        }
        if cli.property_year < cli.start_year {
            return Err("--property-year must be >= --start-year".to_string());
        }
        if !cli.property_monthly_savings.is_finite() || cli.property_monthly_savings < 0.0 {
            return Err("--property-monthly-savings must be >= 0".to_string());
        }
        Some(PropertyConfig {
            price: cli.property_price,
            year: cli.property_year,
            monthly_savings: cli.property_monthly_savings,
        })
    } else {
        None
    };

    Ok(SimulationParams {
        start: YearMonth::new(cli.start_year, cli.start_month),
        initial_age: cli.current_age,
        end_of_life_age: cli.end_of_life_age,
        annual_return: cli.annual_return / 100.0,
        annual_inflation: cli.inflation_rate / 100.0,
        property_appreciation_rate: cli.property_appreciation_rate / 100.0,
        fx_rate: cli.fx_rate,
        transition_to_half_work_year: cli.transition_to_half_work_year,
        stop_work_year: cli.stop_work_year,
        salary: SalaryData {
            gross_primary: cli.gross_salary_primary,
            net_primary,
            gross_secondary: cli.gross_salary_secondary,
            net_secondary,
        },
        pension_contribution_rate: cli.pension_contribution_rate / 100.0,
        assets: vec![
            Asset {
                id: 1,
                name: "Investments".to_string(),
                value: cli.initial_investments,
                kind: AssetKind::Invest,
            },
            Asset {
                id: 2,
                name: "Pension".to_string(),
                value: cli.initial_pension,
                kind: AssetKind::Pension,
            },
        ],
        monthly_expenses: vec![Expense {
            id: 1,
            name: "Household budget".to_string(),
            amount: cli.monthly_budget,
        }],
        yearly_expenses: Vec::new(),
        property,
        equity: Vec::new(),
    })
}

fn convert_assets(payloads: Vec<AssetPayload>) -> Result<Vec<Asset>, String> {
    payloads
        .into_iter()
        .map(|p| {
            if !p.value.is_finite() || p.value < 0.0 {
                return Err(format!("asset '{}' value must be >= 0", p.name));
            }
            Ok(Asset {
                id: p.id,
                name: p.name,
                value: p.value,
                kind: p.kind.into(),
            })
        })
        .collect()
}

fn convert_expenses(payloads: Vec<ExpensePayload>) -> Result<Vec<Expense>, String> {
    payloads
        .into_iter()
        .map(|p| {
            if !p.amount.is_finite() || p.amount < 0.0 {
                return Err(format!("expense '{}' amount must be >= 0", p.name));
            }
            Ok(Expense {
                id: p.id,
                name: p.name,
                amount: p.amount,
            })
        })
        .collect()
}

fn convert_equity(payloads: Vec<EquityCompanyPayload>) -> Result<Vec<EquityCompanyConfig>, String> {
    payloads
        .into_iter()
        .map(|company| {
            if !company.share_price_at_exit.is_finite() || company.share_price_at_exit < 0.0 {
                return Err(format!(
                    "company '{}' sharePriceAtExit must be >= 0",
                    company.name
                ));
            }

            let contracts = company
                .contracts
                .into_iter()
                .map(|c| {
                    if !c.shares.is_finite() || c.shares < 0.0 {
                        return Err(format!("contract '{}' shares must be >= 0", c.name));
                    }
                    if !c.strike.is_finite() || c.strike < 0.0 {
                        return Err(format!("contract '{}' strike must be >= 0", c.name));
                    }
                    if !c.period_years.is_finite() || c.period_years <= 0.0 {
                        return Err(format!("contract '{}' periodYears must be > 0", c.name));
                    }
                    if !(1..=12).contains(&c.start_month) {
                        return Err(format!(
                            "contract '{}' startMonth must be between 1 and 12",
                            c.name
                        ));
                    }
                    Ok(EquityContract {
                        name: c.name,
                        shares: c.shares,
                        strike: c.strike,
                        start: YearMonth::new(c.start_year, c.start_month),
                        period_years: c.period_years,
                        cliff_months: c.cliff_months,
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;

            Ok(EquityCompanyConfig {
                id: company.id,
                name: company.name,
                contracts,
                exit_year: company.exit_year,
                share_price_at_exit: company.share_price_at_exit,
            })
        })
        .collect()
}

fn default_cli_for_api() -> Cli {
    Cli::parse_from(["glidepath"])
}

fn params_from_payload(payload: SimulatePayload) -> Result<SimulationParams, String> {
    let defaults = default_cli_for_api();
    let cli = Cli {
        start_year: payload.start_year.unwrap_or(defaults.start_year),
        start_month: payload.start_month.unwrap_or(defaults.start_month),
        current_age: payload.current_age.unwrap_or(defaults.current_age),
        end_of_life_age: payload.end_of_life_age.unwrap_or(defaults.end_of_life_age),
        annual_return: payload.annual_return.unwrap_or(defaults.annual_return),
        inflation_rate: payload.inflation_rate.unwrap_or(defaults.inflation_rate),
        property_appreciation_rate: payload
            .property_appreciation_rate
            .unwrap_or(defaults.property_appreciation_rate),
        fx_rate: payload.fx_rate.unwrap_or(defaults.fx_rate),
        transition_to_half_work_year: payload
            .transition_to_half_work_year
            .unwrap_or(defaults.transition_to_half_work_year),
        stop_work_year: payload.stop_work_year.unwrap_or(defaults.stop_work_year),
        gross_salary_primary: payload
            .gross_salary_primary
            .unwrap_or(defaults.gross_salary_primary),
        net_salary_primary: payload
            .net_salary_primary
            .unwrap_or(defaults.net_salary_primary),
        gross_salary_secondary: payload
            .gross_salary_secondary
            .unwrap_or(defaults.gross_salary_secondary),
        net_salary_secondary: payload
            .net_salary_secondary
            .unwrap_or(defaults.net_salary_secondary),
        pension_contribution_rate: payload
            .pension_contribution_rate
            .unwrap_or(defaults.pension_contribution_rate),
        initial_investments: payload
            .initial_investments
            .unwrap_or(defaults.initial_investments),
        initial_pension: payload.initial_pension.unwrap_or(defaults.initial_pension),
        monthly_budget: payload.monthly_budget.unwrap_or(defaults.monthly_budget),
        property_price: payload.property_price.unwrap_or(defaults.property_price),
        property_year: payload.property_year.unwrap_or(defaults.property_year),
        property_monthly_savings: payload
            .property_monthly_savings
            .unwrap_or(defaults.property_monthly_savings),
    };

    let mut params = build_params(cli)?;

    if let Some(assets) = payload.assets {
        params.assets = convert_assets(assets)?;
    }
    if let Some(expenses) = payload.monthly_expenses {
        params.monthly_expenses = convert_expenses(expenses)?;
    }
    if let Some(expenses) = payload.yearly_expenses {
        params.yearly_expenses = convert_expenses(expenses)?;
    }
    if let Some(companies) = payload.equity_companies {
        params.equity = convert_equity(companies)?;
    }

    Ok(params)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    println!("Listening on http://{addr}");
    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let plan = find_optimal_withdrawal(&params);
    json_response(
        StatusCode::OK,
        SimulateResponse {
            optimal_withdrawal: plan.value,
            iterations: plan.iterations,
            points: plan.trace,
        },
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_params_applies_percent_conversions_and_defaults() {
        let params = build_params(sample_cli()).expect("defaults must validate");
        assert_approx(params.annual_return, 0.07);
        assert_approx(params.annual_inflation, 0.03);
        assert_approx(params.pension_contribution_rate, 0.125);
        assert_eq!(params.assets.len(), 2);
        assert_eq!(params.monthly_expenses.len(), 1);
        assert!(params.property.is_none());
        assert!(params.equity.is_empty());
    }

    #[test]
    fn build_params_derives_net_salary_from_gross() {
        let params = build_params(sample_cli()).expect("defaults must validate");
        // 45,000 gross/month annualizes into the 35% band.
        let expected = net_employment_income(45_000.0 * 12.0) / 12.0;
        assert_approx(params.salary.net_primary, expected);
        assert!(params.salary.net_primary < params.salary.gross_primary);
    }

    #[test]
    fn build_params_rejects_inverted_ages() {
        let mut cli = sample_cli();
        cli.current_age = 70;
        cli.end_of_life_age = 65;
        let err = build_params(cli).expect_err("must reject");
        assert!(err.contains("--end-of-life-age"));
    }

    #[test]
    fn build_params_rejects_net_above_gross() {
        let mut cli = sample_cli();
        cli.gross_salary_primary = 20_000.0;
        cli.net_salary_primary = 25_000.0;
        let err = build_params(cli).expect_err("must reject");
        assert!(err.contains("--net-salary-primary"));
    }

    #[test]
    fn build_params_rejects_work_phase_inversion() {
        let mut cli = sample_cli();
        cli.transition_to_half_work_year = 15.0;
        cli.stop_work_year = 10.0;
        let err = build_params(cli).expect_err("must reject");
        assert!(err.contains("--stop-work-year"));
    }

    #[test]
    fn build_params_rejects_bad_start_month() {
        let mut cli = sample_cli();
        cli.start_month = 13;
        let err = build_params(cli).expect_err("must reject");
        assert!(err.contains("--start-month"));
    }

    #[test]
    fn build_params_maps_property_when_priced() {
        let mut cli = sample_cli();
        cli.property_price = 1_500_000.0;
        cli.property_year = 2030;
        cli.property_monthly_savings = 4_500.0;
        let params = build_params(cli).expect("must validate");
        let property = params.property.expect("property expected");
        assert_approx(property.price, 1_500_000.0);
        assert_eq!(property.year, 2030);
        assert_approx(property.monthly_savings, 4_500.0);
    }

    #[test]
    fn build_params_rejects_property_before_start() {
        let mut cli = sample_cli();
        cli.property_price = 1_500_000.0;
        cli.property_year = 2020;
        let err = build_params(cli).expect_err("must reject");
        assert!(err.contains("--property-year"));
    }

    #[test]
    fn payload_lists_override_scalar_defaults() {
        let payload: SimulatePayload = serde_json::from_str(
            r#"{
                "currentAge": 50,
                "endOfLifeAge": 80,
                "monthlyExpenses": [
                    {"name": "rent", "amount": 7000},
                    {"name": "food", "amount": 4000}
                ],
                "yearlyExpenses": [
                    {"name": "insurance", "amount": 12000}
                ],
                "assets": [
                    {"name": "brokerage", "value": 800000, "kind": "invest"},
                    {"name": "fund", "value": 400000, "kind": "pension"}
                ],
                "equityCompanies": [
                    {
                        "name": "Acme",
                        "exitYear": 2030,
                        "sharePriceAtExit": 12.5,
                        "contracts": [
                            {
                                "name": "grant-1",
                                "shares": 10000,
                                "strike": 1.5,
                                "startYear": 2024,
                                "startMonth": 6,
                                "periodYears": 4,
                                "cliffMonths": 12
                            }
                        ]
                    }
                ]
            }"#,
        )
        .expect("payload must parse");

        let params = params_from_payload(payload).expect("must validate");
        assert_eq!(params.initial_age, 50);
        assert_eq!(params.monthly_expenses.len(), 2);
        assert_eq!(params.yearly_expenses.len(), 1);
        assert_eq!(params.assets.len(), 2);
        assert_eq!(params.equity.len(), 1);
        let contract = &params.equity[0].contracts[0];
        assert_eq!(contract.start, YearMonth::new(2024, 6));
        assert_eq!(contract.cliff_months, 12);
    }

    #[test]
    fn payload_rejects_negative_expense() {
        let payload: SimulatePayload = serde_json::from_str(
            r#"{"monthlyExpenses": [{"name": "rent", "amount": -1}]}"#,
        )
        .expect("payload must parse");
        let err = params_from_payload(payload).expect_err("must reject");
        assert!(err.contains("rent"));
    }

    #[test]
    fn payload_rejects_zero_vesting_period() {
        let payload: SimulatePayload = serde_json::from_str(
            r#"{
                "equityCompanies": [{
                    "name": "Acme",
                    "exitYear": 2030,
                    "sharePriceAtExit": 10,
                    "contracts": [{
                        "name": "grant-1",
                        "shares": 100,
                        "strike": 1,
                        "startYear": 2024,
                        "startMonth": 1,
                        "periodYears": 0
                    }]
                }]
            }"#,
        )
        .expect("payload must parse");
        let err = params_from_payload(payload).expect_err("must reject");
        assert!(err.contains("periodYears"));
    }

    #[test]
    fn simulate_wiring_produces_a_plan() {
        let payload: SimulatePayload = serde_json::from_str(
            r#"{
                "currentAge": 60,
                "endOfLifeAge": 70,
                "stopWorkYear": 0,
                "transitionToHalfWorkYear": 0,
                "annualReturn": 0,
                "inflationRate": 0,
                "assets": [
                    {"name": "brokerage", "value": 3000000, "kind": "invest"}
                ]
            }"#,
        )
        .expect("payload must parse");

        let params = params_from_payload(payload).expect("must validate");
        let plan = find_optimal_withdrawal(&params);
        assert!(plan.value >= 0.0);
        assert!(!plan.trace.is_empty());
    }
}
