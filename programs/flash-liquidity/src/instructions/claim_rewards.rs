use anchor_lang::prelude::*;
use anchor_spl::token::{self, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::RewardsClaimed;
use crate::state::{RewardPool, StakerAccount, VaultAccount};

/// Claim compounded rewards
///
/// # Flow
/// 1. claimable = reward_basis - staked_amount
/// 2. Transfer claimable from the reward vault to the owner
/// 3. Reset reward_basis to staked_amount
///
#[derive(Accounts)]
pub struct ClaimRewards<'info> {
    pub owner: Signer<'info>,

    #[account(
        seeds = [VAULT_SEED, vault.collateral_mint.as_ref()],
        bump = vault.bump
    )]
    pub vault: Box<Account<'info, VaultAccount>>,

    #[account(
        mut,
        seeds = [STAKER_SEED, owner.key().as_ref(), vault.collateral_mint.as_ref()],
        bump = staker.bump,
        constraint = staker.owner == owner.key() @ FlashLiquidityError::Unauthorized
    )]
    pub staker: Box<Account<'info, StakerAccount>>,

    #[account(
        mut,
        seeds = [REWARD_POOL_SEED, vault.collateral_mint.as_ref()],
        bump = reward_pool.bump
    )]
    pub reward_pool: Box<Account<'info, RewardPool>>,

    #[account(
        mut,
        seeds = [REWARD_VAULT_SEED, vault.collateral_mint.as_ref()],
        bump = reward_pool.reward_vault_bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = owner_collateral_account.mint == vault.collateral_mint @ FlashLiquidityError::InvalidCollateralMint,
        constraint = owner_collateral_account.owner == owner.key() @ FlashLiquidityError::InvalidTokenAccountOwner
    )]
    pub owner_collateral_account: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

/// Returns the amount to pay out
pub fn process_claim_rewards(staker: &mut StakerAccount, reward_pool: &mut RewardPool) -> Result<u64> {
    let claimable = staker.record_claim()?;
    reward_pool.record_claim(claimable)?;
    Ok(claimable)
}

pub fn handler_claim_rewards(ctx: Context<ClaimRewards>) -> Result<()> {
    let slot = Clock::get()?.slot;

    let claimable = process_claim_rewards(&mut ctx.accounts.staker, &mut ctx.accounts.reward_pool)?;

    // The reward vault is owned by the vault PDA
    let collateral_mint = ctx.accounts.vault.collateral_mint;
    let vault_seeds = &[
        VAULT_SEED,
        collateral_mint.as_ref(),
        &[ctx.accounts.vault.bump],
    ];
    let signer_seeds = &[&vault_seeds[..]];

    token::transfer(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.reward_vault.to_account_info(),
                to: ctx.accounts.owner_collateral_account.to_account_info(),
                authority: ctx.accounts.vault.to_account_info(),
            },
            signer_seeds,
        ),
        claimable,
    )?;

    msg!(
        "Claimed {} rewards. Total claimed: {}",
        claimable,
        ctx.accounts.staker.rewards_claimed
    );

    emit!(RewardsClaimed {
        owner: ctx.accounts.owner.key(),
        collateral_mint,
        amount: claimable,
        slot,
    });

    Ok(())
}
