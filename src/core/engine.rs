use super::solver::gross_for_desired_net;
use super::tax::{
    CAPITAL_GAINS_BRACKETS, annuity_tax, effective_rate, net_capital_gains, pension_annuity,
};
use super::types::{
    EquityCompanyConfig, SimulationDataPoint, SimulationOutcome, SimulationParams,
};
use super::vesting::vesting_at;

/// Age at which early pension drawdowns stop and the one-time annuity
/// conversion becomes available.
pub const RETIREMENT_AGE: f64 = 60.0;

/// Snapshots are emitted monthly this long, then every third month.
const FINE_RESOLUTION_MONTHS: u32 = 36;

#[derive(Debug)]
struct CompanyState {
    exited: bool,
    cashed_out_shares: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct MonthFlows {
    income: f64,
    withdrawal_net: f64,
    withdrawal_gross: f64,
    pension_withdrawal_gross: f64,
    annuity_net: f64,
    tax_paid: f64,
    taxed_gross: f64,
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn expense_sum(expenses: &[super::types::Expense]) -> f64 {
    expenses.iter().map(|e| sanitize(e.amount).max(0.0)).sum()
}

fn combined_gross_salary(params: &SimulationParams) -> f64 {
    sanitize(params.salary.gross_primary).max(0.0) + sanitize(params.salary.gross_secondary).max(0.0)
}

fn combined_net_salary(params: &SimulationParams) -> f64 {
    sanitize(params.salary.net_primary).max(0.0) + sanitize(params.salary.net_secondary).max(0.0)
}

/// Monthly pension inflow while fully employed: the gross/net differential
/// plus the configured contribution rate on gross.
fn monthly_pension_inflow(params: &SimulationParams) -> f64 {
    let gross = combined_gross_salary(params);
    let net = combined_net_salary(params);
    (gross - net).max(0.0) + sanitize(params.pension_contribution_rate).max(0.0) * gross
}

/// Gross liquid sale needed to realize `desired_net` after capital-gains
/// tax, with the effective rate read off the annualized draw so the surtax
/// tiers bind above the threshold. Returns (gross, rate).
fn liquid_gross_for_net(desired_net: f64) -> (f64, f64) {
    if desired_net <= 0.0 {
        return (0.0, 0.0);
    }
    let rate = effective_rate(desired_net * 12.0, &CAPITAL_GAINS_BRACKETS, 0.0);
    if rate >= 1.0 {
        return (desired_net, rate);
    }
    (desired_net / (1.0 - rate), rate)
}

fn cash_out_equity(
    config: &EquityCompanyConfig,
    state: &mut CompanyState,
    date: super::types::YearMonth,
    fx_rate: f64,
    investments: &mut f64,
    flows: &mut MonthFlows,
    events: &mut Vec<String>,
) {
    let price = sanitize(config.share_price_at_exit);
    if config.contracts.is_empty() || price <= 0.0 {
        return;
    }

    let result = vesting_at(&config.contracts, date);

    if !state.exited {
        if date.year >= config.exit_year {
            let gross = (result.total_vested * price - result.total_cost) * fx_rate;
            let net = net_capital_gains(gross);
            *investments += net;
            flows.tax_paid += (gross - net).max(0.0);
            flows.taxed_gross += gross.max(0.0);
            state.exited = true;
            state.cashed_out_shares = result.total_vested;
            events.push(format!("{} equity exit", config.name));
        }
        return;
    }

    let increment = result.total_vested - state.cashed_out_shares;
    if increment <= 1e-9 {
        return;
    }

    // Weighted-average strike across the company's contracts; incremental
    // lots are not attributed per-contract.
    let avg_strike = if result.total_vested > 0.0 {
        result.total_cost / result.total_vested
    } else {
        0.0
    };
    let gross = increment * (price - avg_strike) * fx_rate;
    let net = net_capital_gains(gross);
    *investments += net;
    flows.tax_paid += (gross - net).max(0.0);
    flows.taxed_gross += gross.max(0.0);
    state.cashed_out_shares = result.total_vested;
}

/// Advance the household one month at a time from `params.start` to the end
/// of life, drawing `monthly_target` (inflation-indexed) once work stops.
/// Balances may go negative internally; display values are clamped and the
/// loop always runs the full horizon so the caller can observe the outcome.
pub fn run_simulation(params: &SimulationParams, monthly_target: f64) -> SimulationOutcome {
    let total_months = params.end_of_life_age.saturating_sub(params.initial_age) * 12;
    let monthly_return = sanitize(params.annual_return) / 12.0;
    let monthly_inflation = sanitize(params.annual_inflation) / 12.0;
    let monthly_appreciation = sanitize(params.property_appreciation_rate) / 12.0;
    let fx_rate = sanitize(params.fx_rate).max(0.0);
    let monthly_target = sanitize(monthly_target).max(0.0);

    let mut investments = 0.0;
    let mut pension = 0.0;
    for asset in &params.assets {
        let value = sanitize(asset.value).max(0.0);
        match asset.kind {
            super::types::AssetKind::Pension => pension += value,
            _ => investments += value,
        }
    }

    let base_expense = expense_sum(&params.monthly_expenses)
        + expense_sum(&params.yearly_expenses) / 12.0;
    let net_salary = combined_net_salary(params);
    let pension_inflow = monthly_pension_inflow(params);

    let mut company_states: Vec<CompanyState> = params
        .equity
        .iter()
        .map(|_| CompanyState {
            exited: false,
            cashed_out_shares: 0.0,
        })
        .collect();

    let mut property_value = 0.0;
    let mut property_owned = false;
    let mut monthly_annuity_gross = 0.0;
    let mut annuitized = false;
    let mut depleted_month = None;
    let mut pending_events: Vec<String> = Vec::new();
    let mut points = Vec::new();

    for m in 0..=total_months {
        let date = params.start.plus_months(m);
        let years_passed = m as f64 / 12.0;
        let age = params.initial_age as f64 + years_passed;
        let inflation_factor = (1.0 + monthly_inflation).powi(m as i32);
        let mut flows = MonthFlows::default();

        // Property first: the purchase changes this month's expense base.
        if let Some(prop) = &params.property {
            if !property_owned {
                if date.year >= prop.year {
                    let price = sanitize(prop.price).max(0.0);
                    investments -= price;
                    property_value = price;
                    property_owned = true;
                    pending_events.push("Property purchase".to_string());
                }
            } else {
                property_value *= 1.0 + monthly_appreciation;
            }
        }

        let mut expense_base = base_expense;
        if property_owned {
            if let Some(prop) = &params.property {
                expense_base = (expense_base - sanitize(prop.monthly_savings).max(0.0)).max(0.0);
            }
        }
        let expenses = expense_base * inflation_factor;

        investments *= 1.0 + monthly_return;
        pension *= 1.0 + monthly_return;

        let income_source;
        if years_passed < params.transition_to_half_work_year {
            pension += pension_inflow;
            flows.income = net_salary;
            investments += net_salary - expenses;
            income_source = "salary";
        } else if years_passed < params.stop_work_year {
            // Breakeven: reduced work covers exactly the inflated expenses.
            pension += pension_inflow * 0.5;
            flows.income = expenses;
            income_source = "salary (reduced)";
        } else if age < RETIREMENT_AGE {
            income_source = early_retirement_month(
                monthly_target * inflation_factor,
                &mut investments,
                &mut pension,
                &mut flows,
            );
        } else {
            if !annuitized {
                monthly_annuity_gross = pension_annuity(pension);
                pension = 0.0;
                annuitized = true;
                pending_events.push("Pension converted to annuity".to_string());
            } else {
                // The annuity is indexed to inflation, never to returns.
                monthly_annuity_gross *= 1.0 + monthly_inflation;
            }
            income_source = annuity_month(
                monthly_target * inflation_factor,
                monthly_annuity_gross,
                &mut investments,
                &mut flows,
            );
        }

        for (config, state) in params.equity.iter().zip(company_states.iter_mut()) {
            cash_out_equity(
                config,
                state,
                date,
                fx_rate,
                &mut investments,
                &mut flows,
                &mut pending_events,
            );
        }

        if depleted_month.is_none() && investments + pension <= 0.0 {
            depleted_month = Some(m);
        }

        if m < FINE_RESOLUTION_MONTHS || m % 3 == 0 {
            let liquid_wealth = (investments + pension).max(0.0);
            let effective_tax_rate = if flows.taxed_gross > 0.0 {
                flows.tax_paid / flows.taxed_gross
            } else {
                0.0
            };
            points.push(SimulationDataPoint {
                month: m,
                label: date.label(),
                age,
                investments: investments.round(),
                pension: pension.round(),
                property_value: property_value.round(),
                liquid_wealth: liquid_wealth.round(),
                net_worth: (liquid_wealth + property_value).round(),
                income: flows.income.round(),
                expenses: expenses.round(),
                withdrawal_net: flows.withdrawal_net.round(),
                withdrawal_gross: flows.withdrawal_gross.round(),
                pension_withdrawal_gross: flows.pension_withdrawal_gross.round(),
                pension_annuity: flows.annuity_net.round(),
                tax_paid: flows.tax_paid.round(),
                effective_tax_rate,
                income_source: income_source.to_string(),
                events: std::mem::take(&mut pending_events),
            });
        }
    }

    SimulationOutcome {
        points,
        depleted_month,
        final_liquid_wealth: investments + pension,
    }
}

/// Early retirement (work stopped, below the annuity age): liquid assets are
/// drawn first under capital-gains tax; any shortfall is grossed up out of
/// the pension at marginal non-employment rates.
fn early_retirement_month(
    desired: f64,
    investments: &mut f64,
    pension: &mut f64,
    flows: &mut MonthFlows,
) -> &'static str {
    if desired <= 0.0 {
        return "investments";
    }

    let (gross_needed, rate) = liquid_gross_for_net(desired);
    if *investments >= gross_needed {
        *investments -= gross_needed;
        flows.withdrawal_gross = gross_needed;
        flows.withdrawal_net = desired;
        flows.tax_paid += gross_needed - desired;
        flows.taxed_gross += gross_needed;
        return "investments";
    }

    let available_gross = investments.max(0.0);
    let available_net = available_gross * (1.0 - rate);
    *investments -= available_gross;
    flows.withdrawal_gross = available_gross;
    flows.tax_paid += available_gross - available_net;
    flows.taxed_gross += available_gross;

    let shortfall = desired - available_net;
    let gross_annual = gross_for_desired_net(shortfall * 12.0, 0.0);
    let gross_monthly = gross_annual / 12.0;
    *pension -= gross_monthly;
    flows.pension_withdrawal_gross = gross_monthly;
    flows.tax_paid += (gross_monthly - shortfall).max(0.0);
    flows.taxed_gross += gross_monthly;
    flows.withdrawal_net = desired;

    if gross_monthly > available_gross {
        "pension"
    } else {
        "investments"
    }
}

/// Annuity retirement: the net annuity covers the draw first; surplus is
/// reinvested, shortfall comes out of liquid assets under capital-gains tax.
fn annuity_month(
    desired: f64,
    annuity_gross: f64,
    investments: &mut f64,
    flows: &mut MonthFlows,
) -> &'static str {
    let tax = annuity_tax(annuity_gross);
    let annuity_net = annuity_gross - tax;
    flows.annuity_net = annuity_net;
    flows.income = annuity_net;
    flows.tax_paid += tax;
    flows.taxed_gross += annuity_gross.max(0.0);

    if desired <= 0.0 {
        *investments += annuity_net.max(0.0);
        return "annuity";
    }

    if annuity_net >= desired {
        *investments += annuity_net - desired;
        flows.withdrawal_net = desired;
        flows.withdrawal_gross = desired;
        return "annuity";
    }

    let gap = desired - annuity_net;
    let (gross_gap, _) = liquid_gross_for_net(gap);
    *investments -= gross_gap;
    flows.withdrawal_gross = gross_gap;
    flows.withdrawal_net = desired;
    flows.tax_paid += gross_gap - gap;
    flows.taxed_gross += gross_gap;

    if annuity_net >= gap { "annuity" } else { "investments" }
}
