use crate::params::{ExUnits, ProtocolParams, Ratio};

/// Size-based component of the fee: `a * size + b`.
pub fn linear_fee(size: u64, params: &ProtocolParams) -> u64 {
    params.min_fee_a * size + params.min_fee_b
}

/// Execution cost of `redeemers` scripts, each charged the default budget.
pub fn script_fee(redeemers: usize, params: &ProtocolParams) -> u64 {
    if redeemers == 0 {
        return 0;
    }

    let ExUnits { mem, steps } = params.default_ex_units;
    let count = redeemers as u128;

    priced(mem as u128 * count, &params.price_mem)
        + priced(steps as u128 * count, &params.price_step)
}

fn priced(units: u128, price: &Ratio) -> u64 {
    if price.denominator == 0 {
        return 0;
    }

    let numerator = units * price.numerator as u128;
    let denominator = price.denominator as u128;

    numerator.div_ceil(denominator) as u64
}
