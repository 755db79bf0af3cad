use anchor_lang::prelude::*;

use crate::constants::GOVERNANCE_SEED;
use crate::error::FlashLiquidityError;
use crate::events::{AdminTransferred, GovernanceUpdated, ProtocolPauseChanged};
use crate::state::{Governance, GovernanceParams};

/// Accounts shared by every admin-only governance change
#[derive(Accounts)]
pub struct AdminOnly<'info> {
    #[account(
        constraint = admin.key() == governance.admin @ FlashLiquidityError::Unauthorized
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [GOVERNANCE_SEED],
        bump = governance.bump
    )]
    pub governance: Account<'info, Governance>,
}

// =============================================================================
// Update Governance
// =============================================================================

pub fn handler_update_governance(ctx: Context<AdminOnly>, params: GovernanceParams) -> Result<()> {
    let governance = &mut ctx.accounts.governance;
    governance.apply(&params)?;

    msg!(
        "Governance updated: fee {} bps, penalty {} bps, grace {} slots, ratio {} bps, mode {:?}",
        governance.flash_loan_fee_bps,
        governance.liquidation_penalty_bps,
        governance.liquidation_grace_slots,
        governance.max_borrow_ratio_bps,
        governance.fee_mode
    );

    emit!(GovernanceUpdated {
        admin: governance.admin,
        flash_loan_fee_bps: governance.flash_loan_fee_bps,
        liquidation_penalty_bps: governance.liquidation_penalty_bps,
        max_borrow_ratio_bps: governance.max_borrow_ratio_bps,
        slot: Clock::get()?.slot,
    });

    Ok(())
}

// =============================================================================
// Pause Protocol
// =============================================================================

pub fn handler_pause_protocol(ctx: Context<AdminOnly>, paused: bool) -> Result<()> {
    ctx.accounts.governance.is_paused = paused;

    msg!(
        "Protocol {}",
        if paused { "PAUSED" } else { "RESUMED" }
    );

    emit!(ProtocolPauseChanged {
        admin: ctx.accounts.admin.key(),
        is_paused: paused,
        slot: Clock::get()?.slot,
    });

    Ok(())
}

// =============================================================================
// Transfer Admin
// =============================================================================

#[derive(Accounts)]
pub struct TransferAdmin<'info> {
    #[account(
        constraint = admin.key() == governance.admin @ FlashLiquidityError::Unauthorized
    )]
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [GOVERNANCE_SEED],
        bump = governance.bump
    )]
    pub governance: Account<'info, Governance>,

    /// CHECK: New admin address, validated to not be default
    #[account(
        constraint = new_admin.key() != Pubkey::default() @ FlashLiquidityError::InvalidAuthority,
        constraint = new_admin.key() != admin.key() @ FlashLiquidityError::InvalidAuthority
    )]
    pub new_admin: UncheckedAccount<'info>,
}

pub fn handler_transfer_admin(ctx: Context<TransferAdmin>) -> Result<()> {
    let old_admin = ctx.accounts.governance.admin;
    let new_admin = ctx.accounts.new_admin.key();
    ctx.accounts.governance.admin = new_admin;

    msg!("Admin transferred from {} to {}", old_admin, new_admin);

    emit!(AdminTransferred {
        old_admin,
        new_admin,
        slot: Clock::get()?.slot,
    });

    Ok(())
}
