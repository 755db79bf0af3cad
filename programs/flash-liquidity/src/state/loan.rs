use anchor_lang::prelude::*;

use crate::error::FlashLiquidityError;
use crate::state::Governance;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, InitSpace)]
pub enum LoanStatus {
    #[default]
    Open,
    Repaid,
    Liquidated,
}

/// A single bounded-duration loan against one staker's collateral
/// PDA: ["loan", vault, loan_id.to_le_bytes()]
#[account]
#[derive(Default, Debug, PartialEq, Eq, InitSpace)]
pub struct Loan {
    pub loan_id: u64,

    pub borrower: Pubkey,

    pub collateral_mint: Pubkey,

    /// StakerAccount whose collateral backs this loan
    pub staker: Pubkey,

    pub principal: u64,

    /// Fee fixed at issuance, owed on repay
    pub fee_accrued: u64,

    /// Late fee actually paid when repaid inside the grace window
    pub late_fee_paid: u64,

    pub issued_at_slot: u64,
    pub due_at_slot: u64,
    pub settled_at_slot: u64,

    pub status: LoanStatus,

    /// Filled in by liquidation
    pub collateral_seized: u64,
    pub bad_debt: u64,

    /// Set while the borrow callback runs
    pub in_callback: bool,

    pub bump: u8,
}

/// Amounts a repay moves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepaymentQuote {
    pub principal: u64,
    pub fee: u64,
    pub late_fee: u64,
}

impl RepaymentQuote {
    /// Everything that goes to the reward vault
    pub fn total_fees(&self) -> Result<u64> {
        self.fee
            .checked_add(self.late_fee)
            .ok_or(error!(FlashLiquidityError::MathOverflow))
    }
}

/// Outcome of liquidating a loan against its staker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiquidationPlan {
    pub principal: u64,
    pub penalty: u64,
    pub seized: u64,
    pub bad_debt: u64,
    /// Part of `seized` that pays the penalty; moves to the reward vault
    pub penalty_collected: u64,
}

impl LiquidationPlan {
    /// Size a liquidation. Never fails on a shortfall: whatever cannot be
    /// seized becomes bad debt.
    pub fn new(principal: u64, penalty: u64, seizable: u64) -> Result<Self> {
        let owed = principal
            .checked_add(penalty)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?;
        let seized = owed.min(seizable);
        let bad_debt = owed - seized;
        let principal_recovered = seized.min(principal);

        Ok(Self {
            principal,
            penalty,
            seized,
            bad_debt,
            penalty_collected: seized - principal_recovered,
        })
    }
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.status == LoanStatus::Open
    }

    /// Shared guard for every entry that settles a loan
    pub fn require_settleable(&self) -> Result<()> {
        require!(self.is_open(), FlashLiquidityError::AlreadySettled);
        require!(!self.in_callback, FlashLiquidityError::ReentrancyDetected);
        Ok(())
    }

    /// Amounts owed if repaid at `current_slot`.
    /// Past due but inside grace adds a late fee at the liquidation penalty rate.
    pub fn repayment_quote(&self, current_slot: u64, governance: &Governance) -> Result<RepaymentQuote> {
        let grace_end = governance.grace_end(self.due_at_slot)?;
        require!(
            current_slot <= grace_end,
            FlashLiquidityError::LoanOverdueLiquidationRequired
        );

        let late_fee = if current_slot > self.due_at_slot {
            governance.penalty_for(self.principal)?
        } else {
            0
        };

        Ok(RepaymentQuote {
            principal: self.principal,
            fee: self.fee_accrued,
            late_fee,
        })
    }

    pub fn is_liquidatable(&self, current_slot: u64, governance: &Governance) -> Result<bool> {
        Ok(self.is_open() && current_slot > governance.grace_end(self.due_at_slot)?)
    }

    pub fn mark_repaid(&mut self, quote: &RepaymentQuote, current_slot: u64) {
        self.status = LoanStatus::Repaid;
        self.late_fee_paid = quote.late_fee;
        self.settled_at_slot = current_slot;
    }

    pub fn mark_liquidated(&mut self, plan: &LiquidationPlan, current_slot: u64) {
        self.status = LoanStatus::Liquidated;
        self.collateral_seized = plan.seized;
        self.bad_debt = plan.bad_debt;
        self.settled_at_slot = current_slot;
    }
}
