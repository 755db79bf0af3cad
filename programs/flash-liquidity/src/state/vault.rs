// =============================================================================
// Vault State Account
// =============================================================================
// One vault per collateral mint. Holds every staker's collateral in a single
// PDA-owned token account and mints the derivative token against it.
//
// Accounting invariants (checked by the instruction layer before any write):
// - total_reserved <= total_collateral
// - total_derivative_supply == sum of every staker's derivative_balance
// - derivative mint supply == total_derivative_supply + outstanding_forfeit
// =============================================================================

use anchor_lang::prelude::*;

use crate::error::FlashLiquidityError;

/// PDA: ["vault", collateral_mint]
#[account]
#[derive(Default, Debug, InitSpace)]
pub struct VaultAccount {
    // =========================================================================
    // Identification
    // =========================================================================

    /// The SPL mint stakers deposit and borrowers receive
    pub collateral_mint: Pubkey,

    /// Liquid-staking derivative, minted 1:1 on the first stake
    /// PDA: ["derivative_mint", collateral_mint]
    pub derivative_mint: Pubkey,

    /// Collateral custody account
    /// PDA: ["vault_tokens", collateral_mint]
    pub vault_token_account: Pubkey,

    /// Pyth PriceUpdateV2 account pricing the collateral
    pub price_feed: Pubkey,

    // =========================================================================
    // Accounting (collateral base units)
    // =========================================================================

    /// Collateral owned by stakers, including amounts currently lent out
    pub total_collateral: u64,

    pub total_derivative_supply: u64,

    /// Forfeited derivative still in liquidated owners' accounts.
    /// Counted in the mint supply but backed by no collateral.
    pub outstanding_forfeit: u64,

    /// Principal of all open loans
    pub total_reserved: u64,

    /// Lifetime collateral seized by liquidations
    pub total_seized: u64,

    /// Lifetime shortfall that seizure could not cover
    pub total_bad_debt: u64,

    /// Id assigned to the next loan; also the loan PDA seed
    pub next_loan_id: u64,

    /// Stakers with a non-zero stake
    pub staker_count: u64,

    // =========================================================================
    // PDA Bumps
    // =========================================================================

    pub bump: u8,
    pub vault_token_bump: u8,
    pub derivative_mint_bump: u8,
}

impl VaultAccount {
    /// Collateral that is neither lent out nor owed back
    pub fn available_liquidity(&self) -> Result<u64> {
        self.total_collateral
            .checked_sub(self.total_reserved)
            .ok_or(error!(FlashLiquidityError::MathUnderflow))
    }

    /// Derivative minted for a deposit of `amount` collateral
    ///
    /// Formula:
    /// - Empty vault or empty supply: minted = amount (1:1)
    /// - Otherwise: minted = amount * total_derivative_supply / total_collateral
    pub fn calculate_derivative_to_mint(&self, amount: u64) -> Result<u64> {
        if self.total_derivative_supply == 0 || self.total_collateral == 0 {
            return Ok(amount);
        }

        let minted = (amount as u128)
            .checked_mul(self.total_derivative_supply as u128)
            .ok_or(error!(FlashLiquidityError::MathOverflow))?
            .checked_div(self.total_collateral as u128)
            .ok_or(error!(FlashLiquidityError::DivisionByZero))?;

        u64::try_from(minted).map_err(|_| error!(FlashLiquidityError::MathOverflow))
    }

    pub fn record_stake(&mut self, amount: u64, minted: u64, is_new_staker: bool) -> Result<()> {
        self.total_collateral = self
            .total_collateral
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.total_derivative_supply = self
            .total_derivative_supply
            .checked_add(minted)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        if is_new_staker {
            self.staker_count = self
                .staker_count
                .checked_add(1)
                .ok_or(FlashLiquidityError::MathOverflow)?;
        }

        Ok(())
    }

    pub fn record_unstake(&mut self, amount: u64, burned: u64, staker_exited: bool) -> Result<()> {
        self.total_collateral = self
            .total_collateral
            .checked_sub(amount)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.total_derivative_supply = self
            .total_derivative_supply
            .checked_sub(burned)
            .ok_or(FlashLiquidityError::MathUnderflow)?;

        if staker_exited {
            self.staker_count = self.staker_count.saturating_sub(1);
        }

        Ok(())
    }

    /// Reserve `principal` for a new loan and hand out its id
    pub fn open_loan(&mut self, principal: u64) -> Result<u64> {
        let new_reserved = self
            .total_reserved
            .checked_add(principal)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        require!(
            new_reserved <= self.total_collateral,
            FlashLiquidityError::InsufficientLiquidity
        );

        let loan_id = self.next_loan_id;
        self.next_loan_id = loan_id
            .checked_add(1)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.total_reserved = new_reserved;

        Ok(loan_id)
    }

    pub fn release_reservation(&mut self, principal: u64) -> Result<()> {
        self.total_reserved = self
            .total_reserved
            .checked_sub(principal)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        Ok(())
    }

    pub fn record_unburned_forfeit(&mut self, amount: u64) -> Result<()> {
        self.outstanding_forfeit = self
            .outstanding_forfeit
            .checked_add(amount)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        Ok(())
    }

    pub fn clear_forfeit(&mut self, amount: u64) -> Result<()> {
        self.outstanding_forfeit = self
            .outstanding_forfeit
            .checked_sub(amount)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        Ok(())
    }

    /// Book a liquidation.
    ///
    /// The principal left with the borrower and the penalty that moved to the
    /// reward vault both leave total_collateral. Seized stake beyond that was
    /// already in custody and stays.
    pub fn record_liquidation(
        &mut self,
        principal: u64,
        penalty_collected: u64,
        seized: u64,
        bad_debt: u64,
        forfeited_derivative: u64,
    ) -> Result<()> {
        let outflow = principal
            .checked_add(penalty_collected)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        self.release_reservation(principal)?;
        self.total_collateral = self
            .total_collateral
            .checked_sub(outflow)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.total_derivative_supply = self
            .total_derivative_supply
            .checked_sub(forfeited_derivative)
            .ok_or(FlashLiquidityError::MathUnderflow)?;
        self.total_seized = self
            .total_seized
            .checked_add(seized)
            .ok_or(FlashLiquidityError::MathOverflow)?;
        self.total_bad_debt = self
            .total_bad_debt
            .checked_add(bad_debt)
            .ok_or(FlashLiquidityError::MathOverflow)?;

        Ok(())
    }
}
