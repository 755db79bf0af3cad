// =============================================================================
// Flash Liquidity Constants
// =============================================================================

use anchor_lang::prelude::*;

// PDA Seeds
#[constant]
pub const GOVERNANCE_SEED: &[u8] = b"governance";
#[constant]
pub const VAULT_SEED: &[u8] = b"vault";
#[constant]
pub const VAULT_TOKENS_SEED: &[u8] = b"vault_tokens";
#[constant]
pub const DERIVATIVE_MINT_SEED: &[u8] = b"derivative_mint";
#[constant]
pub const STAKER_SEED: &[u8] = b"staker";
#[constant]
pub const LOAN_SEED: &[u8] = b"loan";
#[constant]
pub const REWARD_POOL_SEED: &[u8] = b"reward_pool";
#[constant]
pub const REWARD_VAULT_SEED: &[u8] = b"reward_vault";

/// Total basis points (100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Oracle prices are normalized to 6 decimals
pub const PRICE_PRECISION: u64 = 1_000_000;

// =============================================================================
// Fee Calculator
// =============================================================================

/// Dynamic fee multiplier clamp: 0.5x .. 5x of the base fee
pub const MIN_FEE_MULTIPLIER_BPS: u64 = 5_000;
pub const MAX_FEE_MULTIPLIER_BPS: u64 = 50_000;

// =============================================================================
// Reward Accounting
// =============================================================================

/// Fixed-point scale of RewardPool::reward_per_token (10^18)
pub const REWARD_PRECISION: u128 = 1_000_000_000_000_000_000;

// =============================================================================
// Safety Limits
// =============================================================================

/// Longest lock a stake may request (~1 year at 400ms slots)
pub const MAX_LOCK_DURATION_SLOTS: u64 = 78_840_000;

// =============================================================================
// Borrow Callback
// =============================================================================

/// First 8 bytes of the instruction data sent to a borrow callback program.
/// Followed by loan_id (u64 LE), principal (u64 LE), collateral_mint (32 bytes).
pub const CALLBACK_DISCRIMINATOR: [u8; 8] = *b"flashcb1";

// =============================================================================
// Pyth PriceUpdateV2 layout
// =============================================================================
// discriminator(8) + write_authority(32) + verification_level(1 for Full)
// then the price message: feed_id(32) price(i64) conf(u64) exponent(i32)
// publish_time(i64) prev_publish_time(i64) ema_price(i64) ema_conf(u64),
// then posted_slot(u64).

pub const PYTH_VERIFICATION_LEVEL_OFFSET: usize = 40;
pub const PYTH_VERIFICATION_FULL: u8 = 1;
pub const PYTH_PRICE_OFFSET: usize = 73;
pub const PYTH_CONF_OFFSET: usize = 81;
pub const PYTH_EXPONENT_OFFSET: usize = 89;
pub const PYTH_POSTED_SLOT_OFFSET: usize = 125;
pub const PYTH_PRICE_UPDATE_MIN_LEN: usize = 133;
