// =============================================================================
// Flash Liquidity - collateralized short-duration liquidity on Solana
// =============================================================================
//
// - Stakers deposit collateral into a per-mint vault and receive a derivative
// - Stakers borrow vault liquidity against their own unreserved collateral
//   for a bounded number of slots, optionally running a callback program
//   with the funds
// - Loans are repaid with a fee (plus a late fee inside the grace window),
//   or liquidated by anyone once the grace window has passed
// - Fees and penalties accrue to a reward pool that stakers compound and claim
//
// All durations are measured in slots.
// =============================================================================

pub mod constants;
pub mod error;
pub mod events;
pub mod instructions;
pub mod math;
pub mod state;

use anchor_lang::prelude::*;

pub use constants::*;
pub use error::*;
pub use instructions::*;
pub use state::*;

declare_id!("22NCpAaA3BYfiuDt1oGKGJhULjQXEEMwS2mNHC8HxaUK");

#[program]
pub mod flash_liquidity {
    use super::*;

    // =========================================================================
    // Governance
    // =========================================================================

    /// Create the Governance account; the signer becomes admin
    ///
    /// # Arguments
    /// * `ctx` - Context containing all required accounts
    /// * `params` - Fee, penalty, grace, compound, borrow ratio and oracle bounds
    ///
    pub fn initialize_governance(
        ctx: Context<InitializeGovernance>,
        params: GovernanceParams,
    ) -> Result<()> {
        instructions::initialize_governance::handler_initialize_governance(ctx, params)
    }

    /// Replace every governance parameter (admin only)
    pub fn update_governance(ctx: Context<AdminOnly>, params: GovernanceParams) -> Result<()> {
        instructions::admin::handler_update_governance(ctx, params)
    }

    /// Pause or resume stake, borrow and compound (admin only)
    ///
    /// Repay, unstake, liquidate and claim stay available while paused.
    ///
    /// # Arguments
    /// * `ctx` - Context containing all required accounts
    /// * `paused` - Whether to pause (true) or resume (false)
    ///
    pub fn pause_protocol(ctx: Context<AdminOnly>, paused: bool) -> Result<()> {
        instructions::admin::handler_pause_protocol(ctx, paused)
    }

    /// Transfer admin rights to a new address (admin only)
    pub fn transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
        instructions::admin::handler_transfer_admin(ctx)
    }

    /// Register a collateral mint (admin only)
    ///
    /// Creates the vault, its token account, the derivative mint, the reward
    /// pool and the reward vault, and binds the Pyth price feed.
    ///
    pub fn initialize_vault(ctx: Context<InitializeVault>) -> Result<()> {
        instructions::initialize_vault::handler_initialize_vault(ctx)
    }

    // =========================================================================
    // Vault Ledger
    // =========================================================================

    /// Deposit collateral and mint derivative
    ///
    /// # Arguments
    /// * `ctx` - Context containing all required accounts
    /// * `amount` - Collateral to deposit
    /// * `lock_duration` - Slots before the position may be withdrawn
    ///
    pub fn stake(ctx: Context<Stake>, amount: u64, lock_duration: u64) -> Result<()> {
        instructions::stake::handler_stake(ctx, amount, lock_duration)
    }

    /// Burn derivative and withdraw unreserved, unlocked collateral
    ///
    /// # Arguments
    /// * `ctx` - Context containing all required accounts
    /// * `amount` - Collateral to withdraw
    ///
    pub fn unstake(ctx: Context<Unstake>, amount: u64) -> Result<()> {
        instructions::unstake::handler_unstake(ctx, amount)
    }

    // =========================================================================
    // Loan Ledger
    // =========================================================================

    /// Borrow against the signer's staked collateral
    ///
    /// # Arguments
    /// * `ctx` - Context containing all required accounts. Remaining accounts
    ///   are forwarded to the optional callback program.
    /// * `principal` - Collateral units to borrow
    /// * `duration_slots` - Slots until the loan is due
    ///
    pub fn borrow<'info>(
        ctx: Context<'_, '_, 'info, 'info, Borrow<'info>>,
        principal: u64,
        duration_slots: u64,
    ) -> Result<()> {
        instructions::borrow::handler_borrow(ctx, principal, duration_slots)
    }

    /// Repay an open loan with its fee
    pub fn repay(ctx: Context<Repay>) -> Result<()> {
        instructions::repay::handler_repay(ctx)
    }

    /// Liquidate a loan past its grace window (permissionless)
    pub fn liquidate(ctx: Context<Liquidate>) -> Result<()> {
        instructions::liquidate::handler_liquidate(ctx)
    }

    // =========================================================================
    // Rewards
    // =========================================================================

    /// Credit a staker's share of fee income (permissionless, once per slot)
    pub fn compound(ctx: Context<Compound>) -> Result<()> {
        instructions::compound::handler_compound(ctx)
    }

    /// Withdraw compounded rewards
    pub fn claim_rewards(ctx: Context<ClaimRewards>) -> Result<()> {
        instructions::claim_rewards::handler_claim_rewards(ctx)
    }
}
