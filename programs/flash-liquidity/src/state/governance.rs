use anchor_lang::prelude::*;

use crate::constants::BPS_DENOMINATOR;
use crate::error::FlashLiquidityError;

/// How the flash loan fee reacts to the oracle
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq, InitSpace)]
pub enum FeeMode {
    /// Base fee only
    Fixed,

    /// Base fee scaled by the oracle confidence interval
    #[default]
    Dynamic,
}

/// Protocol parameters, set by the admin
/// PDA: ["governance"]
#[account]
#[derive(Default, Debug, InitSpace)]
pub struct Governance {
    /// Only signer allowed to update parameters and register vaults
    pub admin: Pubkey,

    /// Base flash loan fee
    pub flash_loan_fee_bps: u16,

    /// Liquidation penalty, also charged as the late fee during grace
    pub liquidation_penalty_bps: u16,

    /// Slots after due_at_slot during which repay is still accepted
    pub liquidation_grace_slots: u64,

    /// Reward growth per compound: basis * numerator / denominator
    pub compound_rate_numerator: u64,
    pub compound_rate_denominator: u64,

    /// Max principal as a share of unreserved collateral value
    pub max_borrow_ratio_bps: u16,

    pub fee_mode: FeeMode,

    /// Oracle confidence ratio that maps to a 1x fee multiplier
    pub reference_confidence_bps: u16,

    /// Prices with a wider confidence ratio are rejected
    pub max_confidence_bps: u16,

    /// Price updates older than this many slots are stale
    pub max_price_staleness_slots: u64,

    /// Blocks stake, borrow and compound
    pub is_paused: bool,

    /// PDA bump seed
    pub bump: u8,
}

/// Instruction argument for initialize_governance / update_governance
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GovernanceParams {
    pub flash_loan_fee_bps: u16,
    pub liquidation_penalty_bps: u16,
    pub liquidation_grace_slots: u64,
    pub compound_rate_numerator: u64,
    pub compound_rate_denominator: u64,
    pub max_borrow_ratio_bps: u16,
    pub fee_mode: FeeMode,
    pub reference_confidence_bps: u16,
    pub max_confidence_bps: u16,
    pub max_price_staleness_slots: u64,
}

impl GovernanceParams {
    pub fn validate(&self) -> Result<()> {
        let bps_fields = [
            self.flash_loan_fee_bps,
            self.liquidation_penalty_bps,
            self.max_borrow_ratio_bps,
            self.reference_confidence_bps,
            self.max_confidence_bps,
        ];
        require!(
            bps_fields.iter().all(|bps| u64::from(*bps) <= BPS_DENOMINATOR),
            FlashLiquidityError::InvalidGovernanceParams
        );
        require!(
            self.compound_rate_denominator > 0,
            FlashLiquidityError::InvalidGovernanceParams
        );
        // The fee multiplier divides by the reference confidence
        require!(
            self.reference_confidence_bps > 0
                && self.reference_confidence_bps <= self.max_confidence_bps,
            FlashLiquidityError::InvalidGovernanceParams
        );
        Ok(())
    }
}

impl Governance {
    /// Validate and overwrite every parameter. Admin, pause flag and bump are untouched.
    pub fn apply(&mut self, params: &GovernanceParams) -> Result<()> {
        params.validate()?;

        self.flash_loan_fee_bps = params.flash_loan_fee_bps;
        self.liquidation_penalty_bps = params.liquidation_penalty_bps;
        self.liquidation_grace_slots = params.liquidation_grace_slots;
        self.compound_rate_numerator = params.compound_rate_numerator;
        self.compound_rate_denominator = params.compound_rate_denominator;
        self.max_borrow_ratio_bps = params.max_borrow_ratio_bps;
        self.fee_mode = params.fee_mode;
        self.reference_confidence_bps = params.reference_confidence_bps;
        self.max_confidence_bps = params.max_confidence_bps;
        self.max_price_staleness_slots = params.max_price_staleness_slots;

        Ok(())
    }

    /// Current parameters in instruction-argument form
    pub fn params(&self) -> GovernanceParams {
        GovernanceParams {
            flash_loan_fee_bps: self.flash_loan_fee_bps,
            liquidation_penalty_bps: self.liquidation_penalty_bps,
            liquidation_grace_slots: self.liquidation_grace_slots,
            compound_rate_numerator: self.compound_rate_numerator,
            compound_rate_denominator: self.compound_rate_denominator,
            max_borrow_ratio_bps: self.max_borrow_ratio_bps,
            fee_mode: self.fee_mode,
            reference_confidence_bps: self.reference_confidence_bps,
            max_confidence_bps: self.max_confidence_bps,
            max_price_staleness_slots: self.max_price_staleness_slots,
        }
    }

    /// Penalty on `principal` at liquidation_penalty_bps
    pub fn penalty_for(&self, principal: u64) -> Result<u64> {
        bps_of(principal, self.liquidation_penalty_bps)
    }

    /// Last slot at which a loan due at `due_at_slot` may still be repaid
    pub fn grace_end(&self, due_at_slot: u64) -> Result<u64> {
        due_at_slot
            .checked_add(self.liquidation_grace_slots)
            .ok_or(error!(FlashLiquidityError::MathOverflow))
    }
}

/// amount * bps / 10_000, rounded down
pub fn bps_of(amount: u64, bps: u16) -> Result<u64> {
    let value = (amount as u128)
        .checked_mul(bps as u128)
        .ok_or(error!(FlashLiquidityError::MathOverflow))?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(error!(FlashLiquidityError::DivisionByZero))?;

    u64::try_from(value).map_err(|_| error!(FlashLiquidityError::MathOverflow))
}
