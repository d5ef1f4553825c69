use super::types::{ContractVesting, EquityContract, VestingResult, YearMonth};

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn vested_shares(contract: &EquityContract, at: YearMonth) -> f64 {
    let elapsed = at.months_since(contract.start);
    if elapsed < contract.cliff_months as i64 {
        return 0.0;
    }

    let shares = sanitize(contract.shares).max(0.0);
    let total_months = sanitize(contract.period_years) * 12.0;
    if total_months <= 0.0 {
        return shares;
    }

    let linear = (elapsed as f64 / total_months) * shares;
    linear.max(0.0).min(shares)
}

/// Vested share count and cost basis for a set of grants at an arbitrary
/// month. Linear accrual after the cliff, clamped to the full grant; a
/// contract observed before its start date vests nothing. Aggregates are
/// exact; per-contract detail rows are rounded for display.
pub fn vesting_at(contracts: &[EquityContract], at: YearMonth) -> VestingResult {
    let mut total_vested = 0.0;
    let mut total_cost = 0.0;
    let mut details = Vec::with_capacity(contracts.len());

    for contract in contracts {
        let vested = vested_shares(contract, at);
        let cost = vested * sanitize(contract.strike).max(0.0);
        total_vested += vested;
        total_cost += cost;
        details.push(ContractVesting {
            name: contract.name.clone(),
            vested: vested.round(),
            cost: cost.round(),
        });
    }

    VestingResult {
        total_vested,
        total_cost,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn contract(shares: f64, strike: f64, period_years: f64, cliff_months: u32) -> EquityContract {
        EquityContract {
            name: "grant".to_string(),
            shares,
            strike,
            start: YearMonth::new(2024, 1),
            period_years,
            cliff_months,
        }
    }

    #[test]
    fn quarter_of_a_one_year_grant_after_three_months() {
        let contracts = [contract(12_000.0, 2.0, 1.0, 0)];
        let result = vesting_at(&contracts, YearMonth::new(2024, 4));
        assert_approx(result.total_vested, 3_000.0);
        assert_approx(result.total_cost, 6_000.0);
        assert_approx(result.details[0].vested, 3_000.0);
        assert_approx(result.details[0].cost, 6_000.0);
    }

    #[test]
    fn nothing_vests_before_the_cliff() {
        let contracts = [contract(12_000.0, 2.0, 4.0, 12)];
        let result = vesting_at(&contracts, YearMonth::new(2024, 12));
        assert_approx(result.total_vested, 0.0);

        // The month the cliff elapses, the full linear amount is vested.
        let result = vesting_at(&contracts, YearMonth::new(2025, 1));
        assert_approx(result.total_vested, 3_000.0);
    }

    #[test]
    fn nothing_vests_before_the_start_date() {
        let contracts = [contract(10_000.0, 1.0, 4.0, 0)];
        let result = vesting_at(&contracts, YearMonth::new(2023, 6));
        assert_approx(result.total_vested, 0.0);
        assert_approx(result.total_cost, 0.0);
    }

    #[test]
    fn vesting_caps_at_the_full_grant() {
        let contracts = [contract(10_000.0, 1.5, 2.0, 0)];
        let result = vesting_at(&contracts, YearMonth::new(2030, 1));
        assert_approx(result.total_vested, 10_000.0);
        assert_approx(result.total_cost, 15_000.0);
    }

    #[test]
    fn aggregates_are_additive_across_contracts() {
        let contracts = [
            contract(12_000.0, 2.0, 1.0, 0),
            contract(4_800.0, 5.0, 4.0, 0),
        ];
        let result = vesting_at(&contracts, YearMonth::new(2024, 7));
        // 6 months: 6,000 of the first grant, 600 of the second.
        assert_approx(result.total_vested, 6_600.0);
        assert_approx(result.total_cost, 6_000.0 * 2.0 + 600.0 * 5.0);
        assert_eq!(result.details.len(), 2);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_vested_stays_within_bounds(
            shares in 0u32..1_000_000,
            period_years in 1u32..10,
            cliff_months in 0u32..48,
            offset_months in 0u32..240
        ) {
            let c = contract(shares as f64, 1.0, period_years as f64, cliff_months);
            let at = c.start.plus_months(offset_months);
            let result = vesting_at(std::slice::from_ref(&c), at);
            prop_assert!(result.total_vested >= 0.0);
            prop_assert!(result.total_vested <= shares as f64 + 1e-9);
        }

        #[test]
        fn prop_vesting_is_monotonic_until_fully_vested(
            shares in 1u32..1_000_000,
            period_years in 1u32..10,
            cliff_months in 0u32..48,
            earlier in 0u32..240,
            later_offset in 0u32..240
        ) {
            let c = contract(shares as f64, 1.0, period_years as f64, cliff_months);
            let d1 = c.start.plus_months(earlier);
            let d2 = c.start.plus_months(earlier + later_offset);
            let v1 = vesting_at(std::slice::from_ref(&c), d1).total_vested;
            let v2 = vesting_at(std::slice::from_ref(&c), d2).total_vested;
            prop_assert!(v1 <= v2 + 1e-9);

            let full = c.start.plus_months(period_years * 12 + cliff_months);
            let v_full = vesting_at(std::slice::from_ref(&c), full).total_vested;
            prop_assert!((v_full - shares as f64).abs() <= 1e-9);
        }
    }
}
