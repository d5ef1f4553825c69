use serde::Serialize;

/// Calendar month; day-of-month is deliberately unrepresentable because
/// vesting and event scheduling ignore it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self {
            year,
            month: month.clamp(1, 12),
        }
    }

    /// Signed whole-month difference from `earlier` to `self`.
    pub fn months_since(self, earlier: YearMonth) -> i64 {
        (self.year as i64 - earlier.year as i64) * 12 + (self.month as i64 - earlier.month as i64)
    }

    pub fn plus_months(self, months: u32) -> YearMonth {
        let zero_based = (self.month as i64 - 1) + months as i64;
        YearMonth {
            year: self.year + (zero_based / 12) as i32,
            month: (zero_based % 12) as u32 + 1,
        }
    }

    pub fn label(self) -> String {
        let name = MONTH_NAMES[(self.month as usize - 1).min(11)];
        format!("{name} {}", self.year)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssetKind {
    Pension,
    Liquid,
    Invest,
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub id: u32,
    pub name: String,
    pub value: f64,
    pub kind: AssetKind,
}

#[derive(Debug, Clone)]
pub struct Expense {
    pub id: u32,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SalaryData {
    pub gross_primary: f64,
    pub net_primary: f64,
    pub gross_secondary: f64,
    pub net_secondary: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyConfig {
    pub price: f64,
    pub year: i32,
    pub monthly_savings: f64,
}

#[derive(Debug, Clone)]
pub struct EquityContract {
    pub name: String,
    pub shares: f64,
    pub strike: f64,
    pub start: YearMonth,
    pub period_years: f64,
    pub cliff_months: u32,
}

#[derive(Debug, Clone)]
pub struct EquityCompanyConfig {
    pub id: u32,
    pub name: String,
    pub contracts: Vec<EquityContract>,
    pub exit_year: i32,
    pub share_price_at_exit: f64,
}

/// Point-in-time vesting snapshot, derived from a contract list and never
/// stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VestingResult {
    pub total_vested: f64,
    pub total_cost: f64,
    pub details: Vec<ContractVesting>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractVesting {
    pub name: String,
    pub vested: f64,
    pub cost: f64,
}

/// Immutable per-run parameter bundle. The caller validates; the core only
/// zero-coalesces non-finite monetary fields at aggregation points.
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub start: YearMonth,
    pub initial_age: u32,
    pub end_of_life_age: u32,
    pub annual_return: f64,
    pub annual_inflation: f64,
    pub property_appreciation_rate: f64,
    pub fx_rate: f64,
    pub transition_to_half_work_year: f64,
    pub stop_work_year: f64,
    pub salary: SalaryData,
    pub pension_contribution_rate: f64,
    pub assets: Vec<Asset>,
    pub monthly_expenses: Vec<Expense>,
    pub yearly_expenses: Vec<Expense>,
    pub property: Option<PropertyConfig>,
    pub equity: Vec<EquityCompanyConfig>,
}

/// One emitted snapshot of the household's state. Balances are rounded for
/// display; `liquid_wealth` is clamped at zero even when the underlying
/// balances have gone negative.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationDataPoint {
    pub month: u32,
    pub label: String,
    pub age: f64,
    pub investments: f64,
    pub pension: f64,
    pub property_value: f64,
    pub liquid_wealth: f64,
    pub net_worth: f64,
    pub income: f64,
    pub expenses: f64,
    pub withdrawal_net: f64,
    pub withdrawal_gross: f64,
    pub pension_withdrawal_gross: f64,
    pub pension_annuity: f64,
    pub tax_paid: f64,
    pub effective_tax_rate: f64,
    pub income_source: String,
    pub events: Vec<String>,
}

/// Full-horizon result of a single simulation run. `depleted_month` is the
/// first month the unclamped investments+pension sum reached zero or below.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub points: Vec<SimulationDataPoint>,
    pub depleted_month: Option<u32>,
    pub final_liquid_wealth: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub sustainable: bool,
}

/// Chosen sustainable withdrawal plus the monthly trace produced at the
/// winning value. `value == 0.0` is the legitimate "no sustainable
/// withdrawal exists" outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPlan {
    pub value: f64,
    pub trace: Vec<SimulationDataPoint>,
    pub iterations: Vec<WithdrawalIteration>,
}
