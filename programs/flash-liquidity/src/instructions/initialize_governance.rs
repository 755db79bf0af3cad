// =============================================================================
// Initialize Governance Instruction
// =============================================================================
// Creates the single Governance account. The signer becomes admin.
// =============================================================================

use anchor_lang::prelude::*;

use crate::constants::GOVERNANCE_SEED;
use crate::events::GovernanceUpdated;
use crate::state::{Governance, GovernanceParams};

#[derive(Accounts)]
pub struct InitializeGovernance<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(
        init,
        payer = admin,
        space = 8 + Governance::INIT_SPACE,
        seeds = [GOVERNANCE_SEED],
        bump
    )]
    pub governance: Account<'info, Governance>,

    pub system_program: Program<'info, System>,
}

/// Bind admin, validate and store parameters. Starts unpaused.
pub fn process_initialize_governance(
    governance: &mut Governance,
    admin: Pubkey,
    params: &GovernanceParams,
    bump: u8,
) -> Result<()> {
    governance.apply(params)?;
    governance.admin = admin;
    governance.is_paused = false;
    governance.bump = bump;
    Ok(())
}

pub fn handler_initialize_governance(
    ctx: Context<InitializeGovernance>,
    params: GovernanceParams,
) -> Result<()> {
    let slot = Clock::get()?.slot;
    let admin = ctx.accounts.admin.key();
    let governance = &mut ctx.accounts.governance;

    process_initialize_governance(governance, admin, &params, ctx.bumps.governance)?;

    msg!("Governance initialized");
    msg!("Admin: {}", admin);
    msg!(
        "Fee: {} bps, penalty: {} bps, grace: {} slots, max borrow ratio: {} bps",
        governance.flash_loan_fee_bps,
        governance.liquidation_penalty_bps,
        governance.liquidation_grace_slots,
        governance.max_borrow_ratio_bps
    );

    emit!(GovernanceUpdated {
        admin,
        flash_loan_fee_bps: governance.flash_loan_fee_bps,
        liquidation_penalty_bps: governance.liquidation_penalty_bps,
        max_borrow_ratio_bps: governance.max_borrow_ratio_bps,
        slot,
    });

    Ok(())
}
