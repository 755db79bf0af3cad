// =============================================================================
// Initialize Vault Instruction
// =============================================================================
// Registers a collateral mint. Creates, all owned by the vault PDA:
// - VaultAccount             ["vault", mint]
// - collateral token account ["vault_tokens", mint]
// - derivative mint          ["derivative_mint", mint] (same decimals as collateral)
// - RewardPool               ["reward_pool", mint]
// - reward token account     ["reward_vault", mint]
// and binds the Pyth price feed the vault will be priced with.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::VaultInitialized;
use crate::math::parse_price_update;
use crate::state::{Governance, RewardPool, VaultAccount};

#[derive(Accounts)]
pub struct InitializeVault<'info> {
    // =========================================================================
    // Signers
    // =========================================================================

    #[account(
        mut,
        constraint = admin.key() == governance.admin @ FlashLiquidityError::Unauthorized
    )]
    pub admin: Signer<'info>,

    #[account(
        seeds = [GOVERNANCE_SEED],
        bump = governance.bump
    )]
    pub governance: Box<Account<'info, Governance>>,

    // =========================================================================
    // Vault
    // =========================================================================

    pub collateral_mint: Box<Account<'info, Mint>>,

    #[account(
        init,
        payer = admin,
        space = 8 + VaultAccount::INIT_SPACE,
        seeds = [VAULT_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub vault: Box<Account<'info, VaultAccount>>,

    #[account(
        init,
        payer = admin,
        token::mint = collateral_mint,
        token::authority = vault,
        seeds = [VAULT_TOKENS_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub vault_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = admin,
        mint::decimals = collateral_mint.decimals,
        mint::authority = vault,
        seeds = [DERIVATIVE_MINT_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub derivative_mint: Box<Account<'info, Mint>>,

    // =========================================================================
    // Rewards
    // =========================================================================

    #[account(
        init,
        payer = admin,
        space = 8 + RewardPool::INIT_SPACE,
        seeds = [REWARD_POOL_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub reward_pool: Box<Account<'info, RewardPool>>,

    #[account(
        init,
        payer = admin,
        token::mint = collateral_mint,
        token::authority = vault,
        seeds = [REWARD_VAULT_SEED, collateral_mint.key().as_ref()],
        bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    /// CHECK: Pyth PriceUpdateV2 account, layout checked in the handler
    pub price_feed: UncheckedAccount<'info>,

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

pub fn handler_initialize_vault(ctx: Context<InitializeVault>) -> Result<()> {
    // Feed must parse here; freshness is checked per borrow
    {
        let data = ctx.accounts.price_feed.try_borrow_data()?;
        parse_price_update(&data).map_err(|_| error!(FlashLiquidityError::InvalidPriceFeed))?;
    }

    let collateral_mint = ctx.accounts.collateral_mint.key();

    let vault = &mut ctx.accounts.vault;
    vault.collateral_mint = collateral_mint;
    vault.derivative_mint = ctx.accounts.derivative_mint.key();
    vault.vault_token_account = ctx.accounts.vault_token_account.key();
    vault.price_feed = ctx.accounts.price_feed.key();
    vault.bump = ctx.bumps.vault;
    vault.vault_token_bump = ctx.bumps.vault_token_account;
    vault.derivative_mint_bump = ctx.bumps.derivative_mint;

    let reward_pool = &mut ctx.accounts.reward_pool;
    reward_pool.collateral_mint = collateral_mint;
    reward_pool.reward_vault = ctx.accounts.reward_vault.key();
    reward_pool.bump = ctx.bumps.reward_pool;
    reward_pool.reward_vault_bump = ctx.bumps.reward_vault;

    msg!("Vault initialized for collateral {}", collateral_mint);
    msg!("Derivative mint: {}", vault.derivative_mint);
    msg!("Price feed: {}", vault.price_feed);

    emit!(VaultInitialized {
        vault: vault.key(),
        collateral_mint,
        derivative_mint: vault.derivative_mint,
        price_feed: vault.price_feed,
        slot: Clock::get()?.slot,
    });

    Ok(())
}
