// =============================================================================
// Compound Instruction
// =============================================================================
// Permissionless crank. Credits a staker's reward_basis with fee income at
// most once per slot.
//
// Fees are allocated to derivative holders pro rata when they arrive
// (RewardPool::reward_per_token). Compound settles this staker's allocation
// into reward_share, then moves the rate-limited part of it into
// reward_basis:
//
//   growth = reward_basis * numerator / denominator - reward_basis
//   credit = min(growth, reward_share)
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::RewardsCompounded;
use crate::state::{Governance, RewardPool, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Compound<'info> {
    pub cranker: Signer<'info>,

    #[account(
        seeds = [GOVERNANCE_SEED],
        bump = governance.bump
    )]
    pub governance: Box<Account<'info, Governance>>,

    #[account(
        seeds = [VAULT_SEED, vault.collateral_mint.as_ref()],
        bump = vault.bump
    )]
    pub vault: Box<Account<'info, VaultAccount>>,

    #[account(
        mut,
        seeds = [STAKER_SEED, staker.owner.as_ref(), vault.collateral_mint.as_ref()],
        bump = staker.bump
    )]
    pub staker: Box<Account<'info, StakerAccount>>,

    #[account(
        mut,
        seeds = [REWARD_POOL_SEED, vault.collateral_mint.as_ref()],
        bump = reward_pool.bump
    )]
    pub reward_pool: Box<Account<'info, RewardPool>>,
}

/// Returns the credited amount; 0 when this slot was already compounded
pub fn process_compound(
    governance: &Governance,
    staker: &mut StakerAccount,
    reward_pool: &mut RewardPool,
    current_slot: u64,
) -> Result<u64> {
    require!(!governance.is_paused, FlashLiquidityError::ProtocolPaused);

    if staker.last_compound_slot == current_slot {
        return Ok(0);
    }

    staker.settle_reward_share(reward_pool.reward_per_token)?;
    let credit = staker.calculate_compound_credit(
        governance.compound_rate_numerator,
        governance.compound_rate_denominator,
    )?;

    reward_pool.record_distribution(credit)?;
    staker.credit_rewards(credit, current_slot)?;

    Ok(credit)
}

pub fn handler_compound(ctx: Context<Compound>) -> Result<()> {
    let slot = Clock::get()?.slot;

    let credit = process_compound(
        &ctx.accounts.governance,
        &mut ctx.accounts.staker,
        &mut ctx.accounts.reward_pool,
        slot,
    )?;

    let staker = &ctx.accounts.staker;
    msg!(
        "Compounded {} for {}. Reward basis: {}, pending: {}",
        credit,
        staker.owner,
        staker.reward_basis,
        staker.pending_rewards()
    );

    emit!(RewardsCompounded {
        owner: staker.owner,
        collateral_mint: staker.collateral_mint,
        credit,
        reward_basis: staker.reward_basis,
        slot,
    });

    Ok(())
}
