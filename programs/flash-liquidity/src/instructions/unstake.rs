// =============================================================================
// Unstake Instruction
// =============================================================================
// Burns derivative and returns collateral. Only the unreserved part of an
// unlocked position can leave, and only out of liquidity that is not lent out.
// Not blocked by pause.
//
// Forfeited derivative a liquidation could not burn is burned here first.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, Mint, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::Unstaked;
use crate::state::{RewardPool, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Unstake<'info> {
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        mut,
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
        seeds = [REWARD_POOL_SEED, vault.collateral_mint.as_ref()],
        bump = reward_pool.bump
    )]
    pub reward_pool: Box<Account<'info, RewardPool>>,

    #[account(
        constraint = collateral_mint.key() == vault.collateral_mint @ FlashLiquidityError::InvalidCollateralMint
    )]
    pub collateral_mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        seeds = [DERIVATIVE_MINT_SEED, vault.collateral_mint.as_ref()],
        bump = vault.derivative_mint_bump
    )]
    pub derivative_mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        token::mint = collateral_mint,
        token::authority = owner
    )]
    pub owner_collateral_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        token::mint = derivative_mint,
        token::authority = owner
    )]
    pub owner_derivative_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [VAULT_TOKENS_SEED, vault.collateral_mint.as_ref()],
        bump = vault.vault_token_bump
    )]
    pub vault_token_account: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

/// Validate a withdrawal and apply it. Returns the derivative amount to burn,
/// including any forfeit the position still owes.
///
/// `derivative_held` is the owner's derivative token balance; derivative may
/// have been transferred away since it was minted.
pub fn process_unstake(
    vault: &mut VaultAccount,
    staker: &mut StakerAccount,
    reward_pool: &RewardPool,
    amount: u64,
    derivative_held: u64,
    current_slot: u64,
) -> Result<u64> {
    require!(amount > 0, FlashLiquidityError::InvalidAmount);
    require!(
        current_slot >= staker.lock_expiry_slot,
        FlashLiquidityError::StillLocked
    );
    require!(
        amount <= staker.unreserved()?,
        FlashLiquidityError::InsufficientUnlockedCollateral
    );
    require!(
        amount <= vault.available_liquidity()?,
        FlashLiquidityError::InsufficientLiquidity
    );

    let burned = staker.calculate_derivative_to_burn(amount)?;
    let forfeit = staker.unburned_forfeit;
    let to_burn = burned
        .checked_add(forfeit)
        .ok_or(FlashLiquidityError::MathOverflow)?;
    require!(
        derivative_held >= to_burn,
        FlashLiquidityError::InsufficientDerivativeBalance
    );

    staker.settle_reward_share(reward_pool.reward_per_token)?;
    staker.record_unstake(amount, burned)?;
    staker.unburned_forfeit = 0;
    vault.clear_forfeit(forfeit)?;
    vault.record_unstake(amount, burned, staker.staked_amount == 0)?;

    Ok(to_burn)
}

pub fn handler_unstake(ctx: Context<Unstake>, amount: u64) -> Result<()> {
    let slot = Clock::get()?.slot;
    let derivative_held = ctx.accounts.owner_derivative_account.amount;

    let burned = process_unstake(
        &mut ctx.accounts.vault,
        &mut ctx.accounts.staker,
        &ctx.accounts.reward_pool,
        amount,
        derivative_held,
        slot,
    )?;

    // Burn derivative from the user
    token::burn(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Burn {
                mint: ctx.accounts.derivative_mint.to_account_info(),
                from: ctx.accounts.owner_derivative_account.to_account_info(),
                authority: ctx.accounts.owner.to_account_info(),
            },
        ),
        burned,
    )?;

    // Transfer collateral back, signed by the vault PDA
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
                from: ctx.accounts.vault_token_account.to_account_info(),
                to: ctx.accounts.owner_collateral_account.to_account_info(),
                authority: ctx.accounts.vault.to_account_info(),
            },
            signer_seeds,
        ),
        amount,
    )?;

    msg!(
        "Unstaked {} collateral, burned {} derivative. Position: {}, vault total: {}",
        amount,
        burned,
        ctx.accounts.staker.staked_amount,
        ctx.accounts.vault.total_collateral
    );

    emit!(Unstaked {
        owner: ctx.accounts.owner.key(),
        collateral_mint,
        amount,
        derivative_burned: burned,
        slot,
    });

    Ok(())
}
