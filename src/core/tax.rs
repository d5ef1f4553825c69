/// One slice of a progressive tax schedule: income up to `up_to` (and above
/// the previous bracket's ceiling) is taxed at `rate`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub up_to: f64,
    pub rate: f64,
}

/// Annual employment-income schedule, today's money.
pub const EMPLOYMENT_BRACKETS: [TaxBracket; 7] = [
    TaxBracket {
        up_to: 84_120.0,
        rate: 0.10,
    },
    TaxBracket {
        up_to: 120_720.0,
        rate: 0.14,
    },
    TaxBracket {
        up_to: 193_800.0,
        rate: 0.20,
    },
    TaxBracket {
        up_to: 269_280.0,
        rate: 0.31,
    },
    TaxBracket {
        up_to: 560_280.0,
        rate: 0.35,
    },
    TaxBracket {
        up_to: 721_560.0,
        rate: 0.47,
    },
    TaxBracket {
        up_to: f64::INFINITY,
        rate: 0.50,
    },
];

/// Annual schedule for non-employment income (early pension drawdowns);
/// the low bands do not apply.
pub const NON_EMPLOYMENT_BRACKETS: [TaxBracket; 4] = [
    TaxBracket {
        up_to: 269_280.0,
        rate: 0.31,
    },
    TaxBracket {
        up_to: 560_280.0,
        rate: 0.35,
    },
    TaxBracket {
        up_to: 721_560.0,
        rate: 0.47,
    },
    TaxBracket {
        up_to: f64::INFINITY,
        rate: 0.50,
    },
];

/// Three-tier capital-gains schedule; the upper tiers carry the surtax.
pub const CAPITAL_GAINS_BRACKETS: [TaxBracket; 3] = [
    TaxBracket {
        up_to: 721_560.0,
        rate: 0.25,
    },
    TaxBracket {
        up_to: 3_000_000.0,
        rate: 0.28,
    },
    TaxBracket {
        up_to: f64::INFINITY,
        rate: 0.30,
    },
];

/// Annual income above which the surtax tiers apply.
pub const SURTAX_THRESHOLD: f64 = 721_560.0;

/// Divisor converting a lump pension balance into a gross monthly annuity.
pub const ANNUITY_COEFFICIENT: f64 = 210.0;

/// Flat tax rate on the gross monthly annuity.
pub const ANNUITY_TAX_RATE: f64 = 0.15;

fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Marginal tax on an incremental `amount` stacked on top of
/// `existing_income`, which is treated as already having consumed the lower
/// brackets. Returns 0 for non-positive amounts.
pub fn marginal_tax(amount: f64, brackets: &[TaxBracket], existing_income: f64) -> f64 {
    let amount = sanitize(amount);
    if amount <= 0.0 {
        return 0.0;
    }

    let mut floor = sanitize(existing_income).max(0.0);
    let mut remaining = amount;
    let mut tax = 0.0;

    for bracket in brackets {
        if bracket.up_to <= floor {
            continue;
        }

        let slice = remaining.min(bracket.up_to - floor);
        tax += slice * bracket.rate;
        remaining -= slice;
        floor = bracket.up_to;

        if remaining <= 0.0 {
            break;
        }
    }

    tax
}

pub fn effective_rate(amount: f64, brackets: &[TaxBracket], existing_income: f64) -> f64 {
    let amount = sanitize(amount);
    if amount <= 0.0 {
        return 0.0;
    }
    marginal_tax(amount, brackets, existing_income) / amount
}

/// Net proceeds of a capital gain after the three-tier schedule, rounded to
/// whole currency units. Non-finite or non-positive input yields 0.
pub fn net_capital_gains(gross: f64) -> f64 {
    let gross = sanitize(gross);
    if gross <= 0.0 {
        return 0.0;
    }
    (gross - marginal_tax(gross, &CAPITAL_GAINS_BRACKETS, 0.0)).round()
}

/// Net annual employment income under the employment schedule.
pub fn net_employment_income(gross_annual: f64) -> f64 {
    let gross = sanitize(gross_annual);
    if gross <= 0.0 {
        return 0.0;
    }
    (gross - marginal_tax(gross, &EMPLOYMENT_BRACKETS, 0.0)).max(0.0)
}

/// Gross monthly annuity from a lump pension balance.
pub fn pension_annuity(balance: f64) -> f64 {
    let balance = sanitize(balance);
    if balance <= 0.0 {
        return 0.0;
    }
    balance / ANNUITY_COEFFICIENT
}

pub fn annuity_tax(gross_annuity: f64) -> f64 {
    sanitize(gross_annuity).max(0.0) * ANNUITY_TAX_RATE
}
