// =============================================================================
// Repay Instruction
// =============================================================================
// Settles an open loan.
//
// - principal           borrower -> vault token account
// - fee (+ late fee)    borrower -> reward vault
//
// Inside the grace window after due_at_slot a late fee at the liquidation
// penalty rate is added. After the grace window the loan can only be
// liquidated. Not blocked by pause.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::LoanRepaid;
use crate::state::{Governance, Loan, RepaymentQuote, RewardPool, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Repay<'info> {
    pub borrower: Signer<'info>,

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

    #[account(
        mut,
        seeds = [LOAN_SEED, vault.key().as_ref(), &loan.loan_id.to_le_bytes()],
        bump = loan.bump,
        constraint = loan.borrower == borrower.key() @ FlashLiquidityError::Unauthorized
    )]
    pub loan: Box<Account<'info, Loan>>,

    #[account(
        mut,
        constraint = staker.key() == loan.staker @ FlashLiquidityError::LoanMismatch
    )]
    pub staker: Box<Account<'info, StakerAccount>>,

    #[account(
        mut,
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
        token::mint = collateral_mint,
        token::authority = borrower
    )]
    pub borrower_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [VAULT_TOKENS_SEED, vault.collateral_mint.as_ref()],
        bump = vault.vault_token_bump
    )]
    pub vault_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [REWARD_VAULT_SEED, vault.collateral_mint.as_ref()],
        bump = reward_pool.reward_vault_bump
    )]
    pub reward_vault: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

/// Validate a repayment and apply it to the ledger. Returns the amounts to move.
pub fn process_repay(
    governance: &Governance,
    vault: &mut VaultAccount,
    staker: &mut StakerAccount,
    loan: &mut Loan,
    reward_pool: &mut RewardPool,
    current_slot: u64,
) -> Result<RepaymentQuote> {
    loan.require_settleable()?;
    require!(
        loan.collateral_mint == vault.collateral_mint,
        FlashLiquidityError::LoanMismatch
    );

    let quote = loan.repayment_quote(current_slot, governance)?;

    staker.release(quote.principal)?;
    vault.release_reservation(quote.principal)?;
    reward_pool.record_fees(quote.total_fees()?, vault.total_derivative_supply)?;
    loan.mark_repaid(&quote, current_slot);

    Ok(quote)
}

pub fn handler_repay(ctx: Context<Repay>) -> Result<()> {
    let slot = Clock::get()?.slot;

    let quote = process_repay(
        &ctx.accounts.governance,
        &mut ctx.accounts.vault,
        &mut ctx.accounts.staker,
        &mut ctx.accounts.loan,
        &mut ctx.accounts.reward_pool,
        slot,
    )?;

    // Principal back to the vault
    token::transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.borrower_token_account.to_account_info(),
                to: ctx.accounts.vault_token_account.to_account_info(),
                authority: ctx.accounts.borrower.to_account_info(),
            },
        ),
        quote.principal,
    )?;

    // Fees to the reward vault
    let fees = quote.total_fees()?;
    if fees > 0 {
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.borrower_token_account.to_account_info(),
                    to: ctx.accounts.reward_vault.to_account_info(),
                    authority: ctx.accounts.borrower.to_account_info(),
                },
            ),
            fees,
        )?;
    }

    let loan = &ctx.accounts.loan;
    msg!(
        "Loan {} repaid: {} principal, {} fee, {} late fee",
        loan.loan_id,
        quote.principal,
        quote.fee,
        quote.late_fee
    );

    emit!(LoanRepaid {
        loan_id: loan.loan_id,
        borrower: loan.borrower,
        principal: quote.principal,
        fee: quote.fee,
        late_fee: quote.late_fee,
        slot,
    });

    Ok(())
}
