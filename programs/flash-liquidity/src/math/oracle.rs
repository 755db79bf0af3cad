use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::state::Governance;

/// Validated price, normalized to PRICE_PRECISION (1e6)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OraclePrice {
    pub price: u64,
    pub confidence: u64,
    /// confidence / price in basis points, from the raw feed values
    pub confidence_bps: u64,
    pub posted_slot: u64,
}

/// Fields read from a Pyth PriceUpdateV2 account, before any validation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceUpdate {
    pub fully_verified: bool,
    pub price: i64,
    pub conf: u64,
    pub exponent: i32,
    pub posted_slot: u64,
}

fn read_bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(error!(FlashLiquidityError::OracleUnavailable))
}

/// Parse the price message out of raw PriceUpdateV2 account data
pub fn parse_price_update(data: &[u8]) -> Result<PriceUpdate> {
    require!(
        data.len() >= PYTH_PRICE_UPDATE_MIN_LEN,
        FlashLiquidityError::OracleUnavailable
    );

    let [verification_level] = read_bytes::<1>(data, PYTH_VERIFICATION_LEVEL_OFFSET)?;

    Ok(PriceUpdate {
        fully_verified: verification_level == PYTH_VERIFICATION_FULL,
        price: i64::from_le_bytes(read_bytes(data, PYTH_PRICE_OFFSET)?),
        conf: u64::from_le_bytes(read_bytes(data, PYTH_CONF_OFFSET)?),
        exponent: i32::from_le_bytes(read_bytes(data, PYTH_EXPONENT_OFFSET)?),
        posted_slot: u64::from_le_bytes(read_bytes(data, PYTH_POSTED_SLOT_OFFSET)?),
    })
}

/// Check a parsed update against the governance bounds and normalize it
pub fn validate_price(
    update: &PriceUpdate,
    current_slot: u64,
    governance: &Governance,
) -> Result<OraclePrice> {
    require!(update.fully_verified, FlashLiquidityError::OracleUnavailable);
    require!(update.price > 0, FlashLiquidityError::OracleUnavailable);

    // An update posted in a later slot than the one we run in is not stale
    let age = current_slot.saturating_sub(update.posted_slot);
    require!(
        age <= governance.max_price_staleness_slots,
        FlashLiquidityError::StalePrice
    );

    let raw_price = update.price as u64;
    let confidence_bps = (update.conf as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(error!(FlashLiquidityError::MathOverflow))?
        .checked_div(raw_price as u128)
        .ok_or(error!(FlashLiquidityError::DivisionByZero))?;
    require!(
        confidence_bps <= governance.max_confidence_bps as u128,
        FlashLiquidityError::OracleUnavailable
    );

    let price = normalize_price(raw_price, update.exponent)?;
    require!(price > 0, FlashLiquidityError::OracleUnavailable);

    Ok(OraclePrice {
        price,
        confidence: normalize_price(update.conf, update.exponent)?,
        // bounded by max_confidence_bps above
        confidence_bps: confidence_bps as u64,
        posted_slot: update.posted_slot,
    })
}

/// Read and validate the collateral price from a Pyth PriceUpdateV2 account
pub fn get_price(
    price_feed: &AccountInfo,
    current_slot: u64,
    governance: &Governance,
) -> Result<OraclePrice> {
    let data = price_feed.try_borrow_data()?;
    let update = parse_price_update(&data)?;
    validate_price(&update, current_slot, governance)
}

/// Normalize a Pyth value with exponent to PRICE_PRECISION (1e6).
/// Exponents the scale cannot represent fail with OracleUnavailable.
fn normalize_price(raw: u64, exponent: i32) -> Result<u64> {
    // PRICE_PRECISION = 10^6
    let shift = 6i32
        .checked_add(exponent)
        .ok_or(FlashLiquidityError::OracleUnavailable)?;
    let scale = 10u64
        .checked_pow(shift.unsigned_abs())
        .ok_or(FlashLiquidityError::OracleUnavailable)?;

    if shift >= 0 {
        raw.checked_mul(scale)
            .ok_or(error!(FlashLiquidityError::OracleUnavailable))
    } else {
        Ok(raw / scale)
    }
}
