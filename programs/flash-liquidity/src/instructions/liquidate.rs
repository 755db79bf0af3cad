// =============================================================================
// Liquidate Instruction
// =============================================================================
// Permissionless. Once a loan is past due_at_slot + grace, anyone can settle
// it against the backing staker's collateral.
//
// Seizure:
// - penalty  = principal * liquidation_penalty_bps / 10_000
// - seizable = staked - (reserved - principal)   (other loans stay backed)
// - seized   = min(principal + penalty, seizable)
// - bad_debt = principal + penalty - seized      (recorded, never an error)
//
// The collected penalty moves from the vault token account to the reward
// vault. Derivative is forfeited pro rata to the seized collateral and
// burned from the staker's derivative account, where the vault PDA is
// delegate. Whatever the delegation no longer covers is recorded as
// unburned_forfeit and must be burned before the owner can unstake.
// =============================================================================

use anchor_lang::prelude::*;
use anchor_lang::solana_program::program_option::COption;
use anchor_spl::token::{self, Burn, Mint, Token, TokenAccount, Transfer};

use crate::constants::*;
use crate::error::FlashLiquidityError;
use crate::events::LoanLiquidated;
use crate::state::{Governance, LiquidationPlan, Loan, RewardPool, StakerAccount, VaultAccount};

#[derive(Accounts)]
pub struct Liquidate<'info> {
    /// Anyone may liquidate an overdue loan
    pub liquidator: Signer<'info>,

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
        bump = loan.bump
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

    #[account(
        mut,
        seeds = [DERIVATIVE_MINT_SEED, vault.collateral_mint.as_ref()],
        bump = vault.derivative_mint_bump
    )]
    pub derivative_mint: Box<Account<'info, Mint>>,

    /// CHECK: The staker's registered derivative account. Read leniently so
    /// a closed or revoked account never blocks liquidation.
    #[account(
        mut,
        constraint = staker_derivative_account.key() == staker.derivative_account @ FlashLiquidityError::DerivativeAccountMismatch
    )]
    pub staker_derivative_account: UncheckedAccount<'info>,

    pub token_program: Program<'info, Token>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidationOutcome {
    pub plan: LiquidationPlan,
    pub forfeited_derivative: u64,
    /// Derivative to burn through the vault's delegation
    pub derivative_burned: u64,
}

/// Derivative the vault PDA can burn from `account` right now
pub fn burnable_derivative(account: &AccountInfo, vault: &Pubkey, derivative_mint: &Pubkey) -> u64 {
    if account.owner != &token::ID {
        return 0;
    }
    let Ok(data) = account.try_borrow_data() else {
        return 0;
    };
    let Ok(token_account) = TokenAccount::try_deserialize(&mut &data[..]) else {
        return 0;
    };

    if token_account.mint != *derivative_mint || token_account.delegate != COption::Some(*vault) {
        return 0;
    }
    token_account.amount.min(token_account.delegated_amount)
}

/// Validate a liquidation and apply it to the ledger.
///
/// `burnable` is what the vault can burn from the staker's derivative account.
/// Forfeit it cannot burn stays owed by the staker.
#[allow(clippy::too_many_arguments)]
pub fn process_liquidate(
    governance: &Governance,
    vault: &mut VaultAccount,
    staker: &mut StakerAccount,
    loan: &mut Loan,
    reward_pool: &mut RewardPool,
    burnable: u64,
    current_slot: u64,
) -> Result<LiquidationOutcome> {
    loan.require_settleable()?;
    require!(
        loan.collateral_mint == vault.collateral_mint,
        FlashLiquidityError::LoanMismatch
    );
    require!(
        loan.is_liquidatable(current_slot, governance)?,
        FlashLiquidityError::NotYetLiquidatable
    );

    let principal = loan.principal;
    let plan = LiquidationPlan::new(
        principal,
        governance.penalty_for(principal)?,
        staker.seizable_for(principal)?,
    )?;

    staker.settle_reward_share(reward_pool.reward_per_token)?;
    let forfeited_derivative = staker.apply_seizure(principal, plan.seized)?;
    vault.record_liquidation(
        principal,
        plan.penalty_collected,
        plan.seized,
        plan.bad_debt,
        forfeited_derivative,
    )?;

    // Earlier unburned forfeit is collected together with this one
    let prior_forfeit = staker.unburned_forfeit;
    let owed = forfeited_derivative
        .checked_add(prior_forfeit)
        .ok_or(FlashLiquidityError::MathOverflow)?;
    let derivative_burned = owed.min(burnable);
    staker.unburned_forfeit = owed - derivative_burned;
    vault.clear_forfeit(prior_forfeit)?;
    vault.record_unburned_forfeit(staker.unburned_forfeit)?;

    // Penalty goes to the holders left after the forfeit
    reward_pool.record_fees(plan.penalty_collected, vault.total_derivative_supply)?;
    loan.mark_liquidated(&plan, current_slot);

    if staker.staked_amount == 0 {
        vault.staker_count = vault.staker_count.saturating_sub(1);
    }

    Ok(LiquidationOutcome {
        plan,
        forfeited_derivative,
        derivative_burned,
    })
}

pub fn handler_liquidate(ctx: Context<Liquidate>) -> Result<()> {
    let slot = Clock::get()?.slot;
    let burnable = burnable_derivative(
        &ctx.accounts.staker_derivative_account.to_account_info(),
        &ctx.accounts.vault.key(),
        &ctx.accounts.derivative_mint.key(),
    );

    let outcome = process_liquidate(
        &ctx.accounts.governance,
        &mut ctx.accounts.vault,
        &mut ctx.accounts.staker,
        &mut ctx.accounts.loan,
        &mut ctx.accounts.reward_pool,
        burnable,
        slot,
    )?;
    let plan = outcome.plan;

    let collateral_mint = ctx.accounts.vault.collateral_mint;
    let vault_seeds = &[
        VAULT_SEED,
        collateral_mint.as_ref(),
        &[ctx.accounts.vault.bump],
    ];
    let signer_seeds = &[&vault_seeds[..]];

    if outcome.derivative_burned > 0 {
        token::burn(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.to_account_info(),
                Burn {
                    mint: ctx.accounts.derivative_mint.to_account_info(),
                    from: ctx.accounts.staker_derivative_account.to_account_info(),
                    authority: ctx.accounts.vault.to_account_info(),
                },
                signer_seeds,
            ),
            outcome.derivative_burned,
        )?;
    }

    if plan.penalty_collected > 0 {
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.to_account_info(),
                Transfer {
                    from: ctx.accounts.vault_token_account.to_account_info(),
                    to: ctx.accounts.reward_vault.to_account_info(),
                    authority: ctx.accounts.vault.to_account_info(),
                },
                signer_seeds,
            ),
            plan.penalty_collected,
        )?;
    }

    let loan = &ctx.accounts.loan;
    msg!(
        "Loan {} liquidated: seized {} ({} principal + {} penalty), bad debt {}, forfeited {} derivative, burned {}",
        loan.loan_id,
        plan.seized,
        plan.principal,
        plan.penalty,
        plan.bad_debt,
        outcome.forfeited_derivative,
        outcome.derivative_burned
    );

    emit!(LoanLiquidated {
        loan_id: loan.loan_id,
        liquidator: ctx.accounts.liquidator.key(),
        staker: loan.staker,
        principal: plan.principal,
        penalty: plan.penalty,
        collateral_seized: plan.seized,
        bad_debt: plan.bad_debt,
        slot,
    });

    Ok(())
}
