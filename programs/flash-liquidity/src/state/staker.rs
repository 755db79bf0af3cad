use anchor_lang::prelude::*;

use crate::constants::REWARD_PRECISION;
use crate::error::FlashLiquidityError;

/// Per-user staking position in one vault
/// PDA: ["staker", owner, collateral_mint]
#[account]
#[derive(Default, Debug, PartialEq, Eq, InitSpace)]
pub struct StakerAccount {
    /// Owner of this staking position
    pub owner: Pubkey,

    /// Collateral mint of the vault this position belongs to
    pub collateral_mint: Pubkey,

    /// Collateral deposited and not yet withdrawn or seized
    pub staked_amount: u64,

    /// Derivative minted for this position, net of burns and forfeits
    pub derivative_balance: u64,

    /// Token account the derivative is minted to. The vault PDA is its
    /// delegate so a liquidation can burn forfeited derivative.
    pub derivative_account: Pubkey,

    /// Forfeited derivative the vault could not burn at liquidation.
    /// Burned from the owner on the next unstake.
    pub unburned_forfeit: u64,

    /// Unstake is rejected before this slot
    pub lock_expiry_slot: u64,

    /// Principal of this staker's open loans
    pub reserved_collateral: u64,

    /// staked_amount plus compounded, unclaimed rewards.
    /// claimable = reward_basis - staked_amount
    pub reward_basis: u64,

    pub last_compound_slot: u64,

    /// RewardPool::reward_per_token at the last settlement
    pub reward_debt: u128,

    /// Fee income allocated to this position and not yet compounded
    pub reward_share: u64,

    /// Total rewards claimed (lifetime)
    pub rewards_claimed: u64,

    pub open_loans: u32,

    /// Set while a borrow callback backed by this position is running
    pub in_callback: bool,

    /// PDA bump seed
    pub bump: u8,
}

impl StakerAccount {
    /// A zeroed record created by init_if_needed that has never been bound to an owner
    pub fn is_uninitialized(&self) -> bool {
        self.owner == Pubkey::default()
    }

    /// Stake that no open loan is drawing on
    pub fn unreserved(&self) -> Result<u64> {
        self.staked_amount
            .checked_sub(self.reserved_collateral)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))
    }

    pub fn pending_rewards(&self) -> u64 {
        self.reward_basis.saturating_sub(self.staked_amount)
    }

    /// Fee income earned by the current derivative balance since the last
    /// settlement
    pub fn calculate_pending_share(&self, pool_reward_per_token: u128) -> Result<u64> {
        if self.derivative_balance == 0 {
            return Ok(0);
        }

        let reward_diff = pool_reward_per_token
            .checked_sub(self.reward_debt)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))?;

        let pending = (self.derivative_balance as u128)
            .checked_mul(reward_diff)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?
            .checked_div(REWARD_PRECISION)
            .ok_or(error!(FlashLiquidityError::DivisionByZero))?;

        u64::try_from(pending).map_err(|_| error!(FlashLiquidityError::MathOverflow))
    }

    /// Move pending fee income into reward_share and reset the debt.
    /// Must run before every derivative_balance change.
    pub fn settle_reward_share(&mut self, pool_reward_per_token: u128) -> Result<()> {
        let pending = self.calculate_pending_share(pool_reward_per_token)?;
        self.reward_share = self
            .reward_share
            .checked_add(pending)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.reward_debt = pool_reward_per_token;
        Ok(())
    }

    /// Compound credit: the rate-driven growth of reward_basis, paid only out
    /// of this position's settled reward_share.
    ///
    /// growth = basis * numerator / denominator - basis
    pub fn calculate_compound_credit(&self, rate_numerator: u64, rate_denominator: u64) -> Result<u64> {
        let target = (self.reward_basis as u128)
            .checked_mul(rate_numerator as u128)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?
            .checked_div(rate_denominator as u128)
            .ok_or(error!(FlashLiquidityError::DivisionByZero))?;
        let growth = target.saturating_sub(self.reward_basis as u128);

        // reward_share is a u64, so the min always fits
        Ok(growth.min(self.reward_share as u128) as u64)
    }

    /// Record a stake action. The lock is only ever extended.
    pub fn record_stake(
        &mut self,
        amount: u64,
        minted: u64,
        lock_duration: u64,
        current_slot: u64,
    ) -> Result<()> {
        let lock_expiry = current_slot
            .checked_add(lock_duration)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        self.staked_amount = self
            .staked_amount
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.derivative_balance = self
            .derivative_balance
            .checked_add(minted)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.reward_basis = self
            .reward_basis
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.lock_expiry_slot = self.lock_expiry_slot.max(lock_expiry);

        Ok(())
    }

    /// Derivative to burn when withdrawing `amount` collateral.
    ///
    /// Full exit burns the whole balance; partial exits round up so the
    /// position never leaves with more derivative per collateral than it had.
    pub fn calculate_derivative_to_burn(&self, amount: u64) -> Result<u64> {
        if amount == self.staked_amount {
            return Ok(self.derivative_balance);
        }
        require!(self.staked_amount > 0, FlashLiquidityError::DivisionByZero);

        let numerator = (self.derivative_balance as u128)
            .checked_mul(amount as u128)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?;
        let burn = numerator
            .checked_add(self.staked_amount as u128 - 1)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?
            .checked_div(self.staked_amount as u128)
            .ok_or(error!(FlashLiquidityError::DivisionByZero))?;

        u64::try_from(burn).map_err(|_| error!(FlashLiquidityError::MathOverflow))
    }

    /// Record an unstake action. Accrued rewards stay claimable.
    pub fn record_unstake(&mut self, amount: u64, burned: u64) -> Result<()> {
        self.staked_amount = self
            .staked_amount
            .checked_sub(amount)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.derivative_balance = self
            .derivative_balance
            .checked_sub(burned)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.reward_basis = self
            .reward_basis
            .checked_sub(amount)
            .ok_or(FlashLiquidityError::MathUnderflow)?;

        Ok(())
    }

    pub fn reserve(&mut self, principal: u64) -> Result<()> {
        let reserved = self
            .reserved_collateral
            .checked_add(principal)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        require!(
            reserved <= self.staked_amount,
            FlashLiquidityError::ExceedsBorrowLimit
        );

        self.reserved_collateral = reserved;
        self.open_loans = self
            .open_loans
            .checked_add(1)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        Ok(())
    }

    pub fn release(&mut self, principal: u64) -> Result<()> {
        self.reserved_collateral = self
            .reserved_collateral
            .checked_sub(principal)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.open_loans = self
            .open_loans
            .checked_sub(1)
            .ok_or(FlashLiquidityError::MathUnderflow)?;

        Ok(())
    }

    /// Collateral a liquidation of `principal` may take: everything except
    /// what backs this staker's other open loans
    pub fn seizable_for(&self, principal: u64) -> Result<u64> {
        let other_reservations = self
            .reserved_collateral
            .checked_sub(principal)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))?;

        self.staked_amount
            .checked_sub(other_reservations)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))
    }

    /// Take `seized` collateral and release the loan's reservation.
    /// Returns the derivative forfeited with it.
    pub fn apply_seizure(&mut self, principal: u64, seized: u64) -> Result<u64> {
        let forfeited = if seized == self.staked_amount {
            self.derivative_balance
        } else {
            let value = (self.derivative_balance as u128)
                .checked_mul(seized as u128)
                .ok_or(error!(FlashLiquidityError::MathOverflow))?
                .checked_div(self.staked_amount as u128)
                .ok_or(error!(FlashLiquidityError::DivisionByZero))?;
            u64::try_from(value).map_err(|_| error!(FlashLiquidityError::MathOverflow))?
        };

        self.release(principal)?;
        self.staked_amount = self
            .staked_amount
            .checked_sub(seized)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.derivative_balance = self
            .derivative_balance
            .checked_sub(forfeited)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.reward_basis = self
            .reward_basis
            .saturating_sub(seized)
            .max(self.staked_amount);

        Ok(forfeited)
    }

    pub fn credit_rewards(&mut self, credit: u64, current_slot: u64) -> Result<()> {
        self.reward_share = self
            .reward_share
            .checked_sub(credit)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.reward_basis = self
            .reward_basis
            .checked_add(credit)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.last_compound_slot = current_slot;
        Ok(())
    }

    /// Record a claim action; returns the amount to pay out
    pub fn record_claim(&mut self) -> Result<u64> {
        let claimable = self.pending_rewards();
        require!(claimable > 0, FlashLiquidityError::NoRewardsToClaim);

        self.reward_basis = self.staked_amount;
        self.rewards_claimed = self
            .rewards_claimed
            .checked_add(claimable)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        Ok(claimable)
    }
}
