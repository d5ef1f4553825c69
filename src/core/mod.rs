mod engine;
mod solver;
mod tax;
mod types;
mod vesting;

pub use engine::{RETIREMENT_AGE, run_simulation};
pub use solver::{
    WITHDRAWAL_SEARCH_MAX, WITHDRAWAL_SEARCH_MIN, find_optimal_withdrawal, gross_for_desired_net,
};
pub use tax::{
    ANNUITY_COEFFICIENT, ANNUITY_TAX_RATE, CAPITAL_GAINS_BRACKETS, EMPLOYMENT_BRACKETS,
    NON_EMPLOYMENT_BRACKETS, SURTAX_THRESHOLD, TaxBracket, annuity_tax, effective_rate,
    marginal_tax, net_capital_gains, net_employment_income, pension_annuity,
};
pub use types::{
    Asset, AssetKind, ContractVesting, EquityCompanyConfig, EquityContract, Expense,
    PropertyConfig, SalaryData, SimulationDataPoint, SimulationOutcome, SimulationParams,
    VestingResult, WithdrawalIteration, WithdrawalPlan, YearMonth,
};
pub use vesting::vesting_at;
