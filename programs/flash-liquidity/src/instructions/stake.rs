// =============================================================================
// Stake Instruction
// =============================================================================
// Deposits collateral into the vault and mints the derivative token.
//
// Derivative calculation:
// - First stake into an empty vault: minted = amount (1:1)
// - Later: minted = amount * total_derivative_supply / total_collateral
//
// A lock duration may be requested; the position's lock is only ever extended.
//
// The vault PDA is approved as delegate over the owner's derivative account
// for the whole position, so a liquidation can burn forfeited derivative.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Approve, Mint, MintTo, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::Staked;
use crate::state::{Governance, RewardPool, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Stake<'info> {
    /// User staking collateral
    #[account(mut)]
    pub owner: Signer<'info>,

    #[account(
        seeds = [GOVERNANCE_SEED],
        bump = governance.bump
    )]
    pub governance: Box<Account<'info, Governance>>,

    #[account(
        mut,
        seeds = [VAULT_SEED, vault.collateral_mint.as_ref()],
        bump = vault.bump
    )]
    pub vault: Box<Account<'info, VaultAccount>>,

    /// User's staking position (created if first time)
    #[account(
        init_if_needed,
        payer = owner,
        space = 8 + StakerAccount::INIT_SPACE,
        seeds = [STAKER_SEED, owner.key().as_ref(), vault.collateral_mint.as_ref()],
        bump
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

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

/// Validate a stake and apply it to the vault and staker records.
/// Returns the derivative amount to mint.
///
/// `derivative_account` is bound to the position on its first stake; later
/// stakes must mint into the same account.
#[allow(clippy::too_many_arguments)]
pub fn process_stake(
    governance: &Governance,
    vault: &mut VaultAccount,
    staker: &mut StakerAccount,
    reward_pool: &RewardPool,
    owner: Pubkey,
    staker_bump: u8,
    derivative_account: Pubkey,
    amount: u64,
    lock_duration: u64,
    current_slot: u64,
) -> Result<u64> {
    require!(amount > 0, FlashLiquidityError::InvalidAmount);
    require!(
        lock_duration <= MAX_LOCK_DURATION_SLOTS,
        FlashLiquidityError::InvalidLockDuration
    );
    require!(!governance.is_paused, FlashLiquidityError::ProtocolPaused);

    let minted = vault.calculate_derivative_to_mint(amount)?;
    require!(minted > 0, FlashLiquidityError::DerivativeAmountZero);

    if staker.is_uninitialized() {
        staker.owner = owner;
        staker.collateral_mint = vault.collateral_mint;
        staker.derivative_account = derivative_account;
        staker.bump = staker_bump;
    }
    require!(
        staker.derivative_account == derivative_account,
        FlashLiquidityError::DerivativeAccountMismatch
    );

    // A position that was fully withdrawn counts as a new staker again
    let is_new_staker = staker.staked_amount == 0;
    if is_new_staker {
        staker.last_compound_slot = current_slot;
    }

    staker.settle_reward_share(reward_pool.reward_per_token)?;
    staker.record_stake(amount, minted, lock_duration, current_slot)?;
    vault.record_stake(amount, minted, is_new_staker)?;

    Ok(minted)
}

pub fn handler_stake(ctx: Context<Stake>, amount: u64, lock_duration: u64) -> Result<()> {
    let slot = Clock::get()?.slot;
    let owner = ctx.accounts.owner.key();

    let minted = process_stake(
        &ctx.accounts.governance,
        &mut ctx.accounts.vault,
        &mut ctx.accounts.staker,
        &ctx.accounts.reward_pool,
        owner,
        ctx.bumps.staker,
        ctx.accounts.owner_derivative_account.key(),
        amount,
        lock_duration,
        slot,
    )?;

    // Transfer collateral from user to vault
    token::transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.owner_collateral_account.to_account_info(),
                to: ctx.accounts.vault_token_account.to_account_info(),
                authority: ctx.accounts.owner.to_account_info(),
            },
        ),
        amount,
    )?;

    // Mint derivative to user, signed by the vault PDA
    let collateral_mint = ctx.accounts.vault.collateral_mint;
    let vault_seeds = &[
        VAULT_SEED,
        collateral_mint.as_ref(),
        &[ctx.accounts.vault.bump],
    ];
    let signer_seeds = &[&vault_seeds[..]];

    token::mint_to(
        CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            MintTo {
                mint: ctx.accounts.derivative_mint.to_account_info(),
                to: ctx.accounts.owner_derivative_account.to_account_info(),
                authority: ctx.accounts.vault.to_account_info(),
            },
            signer_seeds,
        ),
        minted,
    )?;

    // Delegate the whole position, including any forfeit still owed
    let staker = &ctx.accounts.staker;
    let delegated = staker
        .derivative_balance
        .checked_add(staker.unburned_forfeit)
        .ok_or(FlashLiquidityError::MathOverflow)?;

    token::approve(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Approve {
                to: ctx.accounts.owner_derivative_account.to_account_info(),
                delegate: ctx.accounts.vault.to_account_info(),
                authority: ctx.accounts.owner.to_account_info(),
            },
        ),
        delegated,
    )?;

    msg!(
        "Staked {} collateral, minted {} derivative. Position: {}, vault total: {}, locked until slot {}",
        amount,
        minted,
        staker.staked_amount,
        ctx.accounts.vault.total_collateral,
        staker.lock_expiry_slot
    );

    emit!(Staked {
        owner,
        collateral_mint,
        amount,
        derivative_minted: minted,
        lock_expiry_slot: staker.lock_expiry_slot,
        slot,
    });

    Ok(())
}
