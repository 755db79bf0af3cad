use anchor_lang::prelude::*;

use crate::constants::REWARD_PRECISION;
use crate::error::FlashLiquidityError;

/// Fee and penalty income for one collateral type
/// PDA: ["reward_pool", collateral_mint]
///
/// total_claimed <= distributed_to_stakers <= accumulated_fees.
/// The reward vault holds accumulated_fees - total_claimed.
///
/// Fees are allocated pro rata to derivative holders as they arrive, through
/// reward_per_token. Each staker settles its allocation into its own
/// reward_share, and compound draws only from that share.
#[account]
#[derive(Default, Debug, PartialEq, Eq, InitSpace)]
pub struct RewardPool {
    pub collateral_mint: Pubkey,

    /// Token account holding fees until claimed
    /// PDA: ["reward_vault", collateral_mint]
    pub reward_vault: Pubkey,

    /// Loan fees, late fees and collected penalties (lifetime)
    pub accumulated_fees: u64,

    /// Credited to stakers' reward_basis by compound
    pub distributed_to_stakers: u64,

    /// Paid out by claim_rewards
    pub total_claimed: u64,

    /// Cumulative fees per derivative unit, scaled by REWARD_PRECISION
    pub reward_per_token: u128,

    /// Fees that arrived while no derivative was outstanding; allocated
    /// with the next fees that find holders
    pub unallocated_fees: u64,

    pub bump: u8,
    pub reward_vault_bump: u8,
}

impl RewardPool {
    /// Fees not yet credited to any staker
    pub fn undistributed(&self) -> Result<u64> {
        self.accumulated_fees
            .checked_sub(self.distributed_to_stakers)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))
    }

    /// Book fee income and allocate it across `total_derivative_supply`
    pub fn record_fees(&mut self, amount: u64, total_derivative_supply: u64) -> Result<()> {
        self.accumulated_fees = self
            .accumulated_fees
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        let to_allocate = self
            .unallocated_fees
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        if total_derivative_supply == 0 {
            self.unallocated_fees = to_allocate;
            return Ok(());
        }

        let reward_increase = (to_allocate as u128)
            .checked_mul(REWARD_PRECISION)
            .ok_or(FlashLiquidityError::MathOverflow)?
            .checked_div(total_derivative_supply as u128)
            .ok_or(FlashLiquidityError::DivisionByZero)?;

        self.reward_per_token = self
            .reward_per_token
            .checked_add(reward_increase)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.unallocated_fees = 0;

        Ok(())
    }

    pub fn record_distribution(&mut self, credit: u64) -> Result<()> {
        let distributed = self
            .distributed_to_stakers
            .checked_add(credit)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        require!(
            distributed <= self.accumulated_fees,
            FlashLiquidityError::MathOverflow
        );
        self.distributed_to_stakers = distributed;
        Ok(())
    }

    pub fn record_claim(&mut self, amount: u64) -> Result<()> {
        let claimed = self
            .total_claimed
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        require!(
            claimed <= self.distributed_to_stakers,
            FlashLiquidityError::MathOverflow
        );
        self.total_claimed = claimed;
        Ok(())
    }
}
