// =============================================================================
// Borrow Instruction
// =============================================================================
// Lends vault liquidity against the borrower's own staked collateral for a
// bounded number of slots.
//
// Flow:
// 1. Validate request (amount, duration, pause, reentrancy)
// 2. Read the oracle price
// 3. Check the borrow limit and vault liquidity
// 4. Fix the fee, reserve collateral, create the Loan
// 5. Transfer principal to the borrower
// 6. Optionally invoke the borrower's callback program exactly once
//
// Repayment happens in a later repay instruction; it may be in the same
// transaction. While the callback runs, the loan and the staker are flagged
// and every settle or borrow entry on them is rejected.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_lang::solana_program::{
    instruction::{AccountMeta, Instruction},
    program::invoke,
};
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::LoanIssued;
use crate::math::{compute_fee, get_price, OraclePrice};
use crate::state::{Governance, Loan, LoanStatus, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Borrow<'info> {
    // =========================================================================
    // Signers
    // =========================================================================

    #[account(mut)]
    pub borrower: Signer<'info>,

    // =========================================================================
    // Protocol State
    // =========================================================================

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

    /// Borrower's staking position backing the loan
    #[account(
        mut,
        seeds = [STAKER_SEED, borrower.key().as_ref(), vault.collateral_mint.as_ref()],
        bump = staker.bump,
        constraint = staker.owner == borrower.key() @ FlashLiquidityError::Unauthorized
    )]
    pub staker: Box<Account<'info, StakerAccount>>,

    #[account(
        init,
        payer = borrower,
        space = 8 + Loan::INIT_SPACE,
        seeds = [LOAN_SEED, vault.key().as_ref(), &vault.next_loan_id.to_le_bytes()],
        bump
    )]
    pub loan: Box<Account<'info, Loan>>,

    // =========================================================================
    // Collateral & Oracle
    // =========================================================================

    #[account(
        constraint = collateral_mint.key() == vault.collateral_mint @ FlashLiquidityError::InvalidCollateralMint
    )]
    pub collateral_mint: Box<Account<'info, Mint>>,

    /// CHECK: Pyth PriceUpdateV2 account bound to the vault at initialization
    #[account(
        constraint = price_feed.key() == vault.price_feed @ FlashLiquidityError::InvalidPriceFeed
    )]
    pub price_feed: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [VAULT_TOKENS_SEED, vault.collateral_mint.as_ref()],
        bump = vault.vault_token_bump
    )]
    pub vault_token_account: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        token::mint = collateral_mint,
        constraint = borrower_token_account.owner == borrower.key() @ FlashLiquidityError::InvalidTokenAccountOwner
    )]
    pub borrower_token_account: Box<Account<'info, TokenAccount>>,

    // =========================================================================
    // Callback
    // =========================================================================

    /// CHECK: Optional program invoked once with the borrowed funds.
    /// Must be executable and not this program; checked in the handler.
    pub callback_program: Option<UncheckedAccount<'info>>,

    pub system_program: Program<'info, System>,
    pub token_program: Program<'info, Token>,
}

/// Everything a borrow decided, for the handler to act on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BorrowOutcome {
    pub loan_id: u64,
    pub fee: u64,
    pub price: u64,
}

/// Validate a borrow and apply it to the ledger.
///
/// `read_price` is only called once the request itself is valid, so a bad
/// request never touches the oracle.
#[allow(clippy::too_many_arguments)]
pub fn process_borrow<F>(
    governance: &Governance,
    vault: &mut VaultAccount,
    staker: &mut StakerAccount,
    loan: &mut Loan,
    borrower: Pubkey,
    staker_key: Pubkey,
    loan_bump: u8,
    principal: u64,
    duration_slots: u64,
    current_slot: u64,
    read_price: F,
) -> Result<BorrowOutcome>
where
    F: FnOnce() -> Result<OraclePrice>,
{
    require!(principal > 0, FlashLiquidityError::InvalidAmount);
    require!(duration_slots > 0, FlashLiquidityError::ZeroDuration);
    require!(!governance.is_paused, FlashLiquidityError::ProtocolPaused);
    require!(!staker.in_callback, FlashLiquidityError::ReentrancyDetected);

    let price = read_price()?;

    check_borrow_limit(principal, staker.unreserved()?, governance)?;
    require!(
        principal <= vault.available_liquidity()?,
        FlashLiquidityError::InsufficientLiquidity
    );

    let fee = compute_fee(principal, duration_slots, &price, governance)?;
    let due_at_slot = current_slot
        .checked_add(duration_slots)
        .ok_or(FlashLiquidityError::MathOverflow)?;

    staker.reserve(principal)?;
    let loan_id = vault.open_loan(principal)?;

    *loan = Loan {
        loan_id,
        borrower,
        collateral_mint: vault.collateral_mint,
        staker: staker_key,
        principal,
        fee_accrued: fee,
        late_fee_paid: 0,
        issued_at_slot: current_slot,
        due_at_slot,
        settled_at_slot: 0,
        status: LoanStatus::Open,
        collateral_seized: 0,
        bad_debt: 0,
        in_callback: false,
        bump: loan_bump,
    };

    Ok(BorrowOutcome {
        loan_id,
        fee,
        price: price.price,
    })
}

/// principal * 10_000 <= unreserved * max_borrow_ratio_bps, compared exactly
/// in u128. Loan and collateral are the same asset, so the price cancels.
pub fn check_borrow_limit(principal: u64, unreserved: u64, governance: &Governance) -> Result<()> {
    let requested = (principal as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(FlashLiquidityError::MathOverflow)?;
    let allowed = (unreserved as u128)
        .checked_mul(governance.max_borrow_ratio_bps as u128)
        .ok_or(FlashLiquidityError::MathOverflow)?;

    require!(requested <= allowed, FlashLiquidityError::ExceedsBorrowLimit);
    Ok(())
}

/// CALLBACK_DISCRIMINATOR ++ loan_id (LE) ++ principal (LE) ++ collateral_mint
pub fn callback_instruction_data(loan_id: u64, principal: u64, collateral_mint: &Pubkey) -> Vec<u8> {
    let mut data = Vec::with_capacity(8 + 8 + 8 + 32);
    data.extend_from_slice(&CALLBACK_DISCRIMINATOR);
    data.extend_from_slice(&loan_id.to_le_bytes());
    data.extend_from_slice(&principal.to_le_bytes());
    data.extend_from_slice(collateral_mint.as_ref());
    data
}

pub fn handler_borrow<'info>(
    ctx: Context<'_, '_, 'info, 'info, Borrow<'info>>,
    principal: u64,
    duration_slots: u64,
) -> Result<()> {
    let slot = Clock::get()?.slot;
    let borrower = ctx.accounts.borrower.key();
    let staker_key = ctx.accounts.staker.key();

    if let Some(callback_program) = &ctx.accounts.callback_program {
        require!(
            callback_program.executable && callback_program.key() != crate::ID,
            FlashLiquidityError::InvalidCallbackProgram
        );
    }

    let price_feed = ctx.accounts.price_feed.to_account_info();
    let governance = &ctx.accounts.governance;

    let outcome = process_borrow(
        governance,
        &mut ctx.accounts.vault,
        &mut ctx.accounts.staker,
        &mut ctx.accounts.loan,
        borrower,
        staker_key,
        ctx.bumps.loan,
        principal,
        duration_slots,
        slot,
        || get_price(&price_feed, slot, governance),
    )?;

    // =========================================================================
    // Transfer principal to borrower
    // =========================================================================

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
                to: ctx.accounts.borrower_token_account.to_account_info(),
                authority: ctx.accounts.vault.to_account_info(),
            },
            signer_seeds,
        ),
        principal,
    )?;

    msg!(
        "Loan {} issued: {} principal, {} fee, due at slot {} (price {})",
        outcome.loan_id,
        principal,
        outcome.fee,
        ctx.accounts.loan.due_at_slot,
        outcome.price
    );

    // =========================================================================
    // Callback
    // =========================================================================

    let callback_key = ctx.accounts.callback_program.as_ref().map(|p| p.key());

    if let Some(callback_program) = ctx.accounts.callback_program.clone() {
        ctx.accounts.loan.in_callback = true;
        ctx.accounts.staker.in_callback = true;

        // Flush flags and the new loan before handing over control
        ctx.accounts.loan.exit(&crate::ID)?;
        ctx.accounts.staker.exit(&crate::ID)?;
        ctx.accounts.vault.exit(&crate::ID)?;

        let mut account_metas = vec![
            AccountMeta::new_readonly(borrower, true),
            AccountMeta::new(ctx.accounts.borrower_token_account.key(), false),
            AccountMeta::new_readonly(ctx.accounts.loan.key(), false),
        ];
        let mut account_infos = vec![
            ctx.accounts.borrower.to_account_info(),
            ctx.accounts.borrower_token_account.to_account_info(),
            ctx.accounts.loan.to_account_info(),
        ];
        for acc in ctx.remaining_accounts.iter() {
            account_metas.push(if acc.is_writable {
                AccountMeta::new(*acc.key, acc.is_signer)
            } else {
                AccountMeta::new_readonly(*acc.key, acc.is_signer)
            });
            account_infos.push(acc.clone());
        }
        account_infos.push(callback_program.to_account_info());

        let callback_instruction = Instruction {
            program_id: callback_program.key(),
            accounts: account_metas,
            data: callback_instruction_data(outcome.loan_id, principal, &collateral_mint),
        };

        invoke(&callback_instruction, &account_infos).map_err(|e| {
            msg!("Borrow callback failed: {:?}", e);
            FlashLiquidityError::CallbackFailed
        })?;

        ctx.accounts.loan.reload()?;
        ctx.accounts.staker.reload()?;
        ctx.accounts.vault.reload()?;
        ctx.accounts.loan.in_callback = false;
        ctx.accounts.staker.in_callback = false;

        msg!("Callback {} completed for loan {}", callback_program.key(), outcome.loan_id);
    }

    emit!(LoanIssued {
        loan_id: outcome.loan_id,
        borrower,
        staker: staker_key,
        collateral_mint,
        principal,
        fee: outcome.fee,
        due_at_slot: ctx.accounts.loan.due_at_slot,
        price: outcome.price,
        callback_program: callback_key,
        slot,
    });

    Ok(())
}
