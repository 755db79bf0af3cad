use anchor_lang::prelude::*;

use crate::constants::{BPS_DENOMINATOR, MAX_FEE_MULTIPLIER_BPS, MIN_FEE_MULTIPLIER_BPS};
use crate::error::FlashLiquidityError;
use crate::math::oracle::OraclePrice;
use crate::state::{bps_of, FeeMode, Governance};

/// Fee multiplier in bps. 10_000 = 1x.
///
/// Dynamic mode scales with how wide the oracle confidence interval is
/// relative to the governance reference, clamped to 0.5x..5x.
pub fn fee_multiplier_bps(price: &OraclePrice, governance: &Governance) -> Result<u64> {
    match governance.fee_mode {
        FeeMode::Fixed => Ok(BPS_DENOMINATOR),
        FeeMode::Dynamic => {
            let ratio = price
                .confidence_bps
                .checked_mul(BPS_DENOMINATOR)
                .ok_or(FlashLiquidityError::MathOverflow)?
                .checked_div(governance.reference_confidence_bps as u64)
                .ok_or(FlashLiquidityError::DivisionByZero)?;

            Ok(ratio.clamp(MIN_FEE_MULTIPLIER_BPS, MAX_FEE_MULTIPLIER_BPS))
        }
    }
}

/// Fee owed on a loan of `principal` held for `duration_slots`
///
/// Formula:
/// - base = principal * flash_loan_fee_bps / 10_000
/// - fee = base * multiplier_bps / 10_000
///
/// Duration only has to be non-zero; the multiplier clamp bounds the fee.
pub fn compute_fee(
    principal: u64,
    duration_slots: u64,
    price: &OraclePrice,
    governance: &Governance,
) -> Result<u64> {
    require!(duration_slots > 0, FlashLiquidityError::ZeroDuration);

    let base = bps_of(principal, governance.flash_loan_fee_bps)?;
    let multiplier = fee_multiplier_bps(price, governance)?;

    let fee = (base as u128)
        .checked_mul(multiplier as u128)
        .ok_or(error!(FlashLiquidityError::MathOverflow))?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(error!(FlashLiquidityError::DivisionByZero))?;

    u64::try_from(fee).map_err(|_| error!(FlashLiquidityError::MathOverflow))
}
