//! Ledger lifecycle tests
//!
//! Drive the `process_*` layer of every instruction over in-memory account
//! state, the same state the handlers load and persist on chain.

use anchor_lang::error::Error;
use anchor_lang::prelude::*;
use pretty_assertions::assert_eq;

use flash_liquidity::error::FlashLiquidityError;
use flash_liquidity::instructions::{
    callback_instruction_data, check_borrow_limit, process_borrow, process_claim_rewards,
    process_compound, process_initialize_governance, process_liquidate, process_repay,
    process_stake, process_unstake, BorrowOutcome, LiquidationOutcome,
};
use flash_liquidity::math::OraclePrice;
use flash_liquidity::state::*;
use flash_liquidity::CALLBACK_DISCRIMINATOR;

// ===== Fixtures =====

fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

const ADMIN: u8 = 1;
const ALICE: u8 = 2;
const MINT: u8 = 9;
const DERIVATIVE_ACCOUNT_OFFSET: u8 = 50;
const STAKER_RECORD_OFFSET: u8 = 100;

fn owner(index: usize) -> Pubkey {
    key(ALICE + index as u8)
}

fn derivative_account(index: usize) -> Pubkey {
    key(ALICE + DERIVATIVE_ACCOUNT_OFFSET + index as u8)
}

fn staker_record(index: usize) -> Pubkey {
    key(ALICE + STAKER_RECORD_OFFSET + index as u8)
}

fn params() -> GovernanceParams {
    GovernanceParams {
        flash_loan_fee_bps: 20,
        liquidation_penalty_bps: 50,
        liquidation_grace_slots: 10,
        compound_rate_numerator: 101,
        compound_rate_denominator: 100,
        max_borrow_ratio_bps: 5_000,
        fee_mode: FeeMode::Dynamic,
        reference_confidence_bps: 50,
        max_confidence_bps: 500,
        max_price_staleness_slots: 25,
    }
}

/// $1.00 with a 50 bps confidence interval: exactly the reference, so a 1x fee
fn baseline_price() -> OraclePrice {
    OraclePrice {
        price: 1_000_000,
        confidence: 5_000,
        confidence_bps: 50,
        posted_slot: 0,
    }
}

struct Protocol {
    governance: Governance,
    vault: VaultAccount,
    reward_pool: RewardPool,
    staker: StakerAccount,
}

impl Protocol {
    fn new() -> Self {
        let mut governance = Governance::default();
        process_initialize_governance(&mut governance, key(ADMIN), &params(), 255).unwrap();

        Self {
            governance,
            vault: VaultAccount {
                collateral_mint: key(MINT),
                ..Default::default()
            },
            reward_pool: RewardPool {
                collateral_mint: key(MINT),
                ..Default::default()
            },
            staker: StakerAccount::default(),
        }
    }

    fn stake(&mut self, amount: u64, lock_duration: u64, slot: u64) -> Result<u64> {
        process_stake(
            &self.governance,
            &mut self.vault,
            &mut self.staker,
            &self.reward_pool,
            owner(0),
            254,
            derivative_account(0),
            amount,
            lock_duration,
            slot,
        )
    }

    fn borrow(&mut self, loan: &mut Loan, principal: u64, duration: u64, slot: u64) -> Result<BorrowOutcome> {
        process_borrow(
            &self.governance,
            &mut self.vault,
            &mut self.staker,
            loan,
            owner(0),
            staker_record(0),
            253,
            principal,
            duration,
            slot,
            || Ok(baseline_price()),
        )
    }

    fn repay(&mut self, loan: &mut Loan, slot: u64) -> Result<RepaymentQuote> {
        process_repay(
            &self.governance,
            &mut self.vault,
            &mut self.staker,
            loan,
            &mut self.reward_pool,
            slot,
        )
    }

    fn liquidate(&mut self, loan: &mut Loan, slot: u64) -> Result<LiquidationOutcome> {
        process_liquidate(
            &self.governance,
            &mut self.vault,
            &mut self.staker,
            loan,
            &mut self.reward_pool,
            u64::MAX,
            slot,
        )
    }

    fn unstake(&mut self, amount: u64, derivative_held: u64, slot: u64) -> Result<u64> {
        process_unstake(
            &mut self.vault,
            &mut self.staker,
            &self.reward_pool,
            amount,
            derivative_held,
            slot,
        )
    }

    fn compound(&mut self, slot: u64) -> Result<u64> {
        process_compound(&self.governance, &mut self.staker, &mut self.reward_pool, slot)
    }

    /// With a single staker every vault total mirrors the staker record
    fn assert_conserved(&self) {
        assert_eq!(self.vault.total_collateral, self.staker.staked_amount);
        assert_eq!(self.vault.total_derivative_supply, self.staker.derivative_balance);
        assert_eq!(self.vault.total_reserved, self.staker.reserved_collateral);
        assert!(self.staker.reserved_collateral <= self.staker.staked_amount);
        assert!(self.vault.total_reserved <= self.vault.total_collateral);
        assert!(self.reward_pool.total_claimed <= self.reward_pool.distributed_to_stakers);
        assert!(self.reward_pool.distributed_to_stakers <= self.reward_pool.accumulated_fees);
    }
}

fn assert_error<T: std::fmt::Debug>(result: Result<T>, expected: FlashLiquidityError) {
    assert_eq!(result.unwrap_err(), Error::from(expected));
}

// ===== Scenario =====

#[test]
fn test_overdue_loan_is_liquidated_with_penalty() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();

    assert_eq!(p.stake(1_000_000, 0, 0).unwrap(), 1_000_000);

    let outcome = p.borrow(&mut loan, 500_000, 50, 0).unwrap();
    assert_eq!(
        outcome,
        BorrowOutcome {
            loan_id: 0,
            fee: 1_000,
            price: 1_000_000,
        }
    );
    assert_eq!(loan.due_at_slot, 50);
    assert_eq!(loan.status, LoanStatus::Open);
    p.assert_conserved();

    // Still inside grace: repay is allowed, liquidation is not
    assert_error(p.liquidate(&mut loan, 60), FlashLiquidityError::NotYetLiquidatable);

    // Grace over: repay is refused
    assert_error(p.repay(&mut loan, 61), FlashLiquidityError::LoanOverdueLiquidationRequired);

    let liquidated = p.liquidate(&mut loan, 61).unwrap();
    assert_eq!(liquidated.plan.seized, 502_500);
    assert_eq!(liquidated.plan.penalty, 2_500);
    assert_eq!(liquidated.plan.bad_debt, 0);

    assert_eq!(loan.status, LoanStatus::Liquidated);
    assert_eq!(loan.collateral_seized, 502_500);
    assert_eq!(loan.settled_at_slot, 61);
    assert_eq!(p.staker.staked_amount, 497_500);
    assert_eq!(p.staker.reserved_collateral, 0);
    assert_eq!(p.staker.open_loans, 0);
    assert_eq!(p.vault.total_seized, 502_500);
    assert_eq!(p.reward_pool.accumulated_fees, 2_500);
    p.assert_conserved();

    // Terminal state is final
    assert_error(p.liquidate(&mut loan, 62), FlashLiquidityError::AlreadySettled);
    assert_error(p.repay(&mut loan, 62), FlashLiquidityError::AlreadySettled);
}

#[test]
fn test_repay_before_due_pays_base_fee() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();

    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 500_000, 50, 0).unwrap();

    let quote = p.repay(&mut loan, 40).unwrap();

    assert_eq!(
        quote,
        RepaymentQuote {
            principal: 500_000,
            fee: 1_000,
            late_fee: 0,
        }
    );
    assert_eq!(loan.status, LoanStatus::Repaid);
    assert_eq!(loan.settled_at_slot, 40);
    assert_eq!(p.staker.reserved_collateral, 0);
    assert_eq!(p.vault.total_collateral, 1_000_000);
    assert_eq!(p.reward_pool.accumulated_fees, 1_000);
    p.assert_conserved();

    assert_error(p.liquidate(&mut loan, 1_000), FlashLiquidityError::AlreadySettled);
}

#[test]
fn test_repay_in_grace_charges_late_fee() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();

    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 500_000, 50, 0).unwrap();

    let quote = p.repay(&mut loan, 60).unwrap();

    assert_eq!(quote.late_fee, 2_500);
    assert_eq!(loan.late_fee_paid, 2_500);
    assert_eq!(p.reward_pool.accumulated_fees, 3_500);
}

// ===== Borrow limit =====

#[test]
fn test_borrow_exactly_at_limit_succeeds() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();

    assert!(p.borrow(&mut Loan::default(), 500_000, 10, 0).is_ok());
}

#[test]
fn test_borrow_one_unit_above_limit_fails_without_effects() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();
    let vault_before = p.vault.clone();
    let staker_before = p.staker.clone();

    assert_error(
        p.borrow(&mut Loan::default(), 500_001, 10, 0),
        FlashLiquidityError::ExceedsBorrowLimit,
    );

    assert_eq!(p.vault.next_loan_id, vault_before.next_loan_id);
    assert_eq!(p.vault.total_reserved, vault_before.total_reserved);
    assert_eq!(p.staker, staker_before);
}

#[test]
fn test_limit_applies_to_unreserved_collateral() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut Loan::default(), 400_000, 10, 0).unwrap();

    // 50% of the remaining 600_000
    assert_error(
        p.borrow(&mut Loan::default(), 300_001, 10, 0),
        FlashLiquidityError::ExceedsBorrowLimit,
    );
    let second = p.borrow(&mut Loan::default(), 300_000, 10, 0).unwrap();
    assert_eq!(second.loan_id, 1);
    assert_eq!(p.staker.open_loans, 2);
    p.assert_conserved();
}

#[test]
fn test_invalid_request_never_reads_oracle() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();

    let result = process_borrow(
        &p.governance,
        &mut p.vault,
        &mut p.staker,
        &mut Loan::default(),
        owner(0),
        staker_record(0),
        253,
        0,
        10,
        0,
        || panic!("oracle must not be read"),
    );
    assert_error(result, FlashLiquidityError::InvalidAmount);

    let result = process_borrow(
        &p.governance,
        &mut p.vault,
        &mut p.staker,
        &mut Loan::default(),
        owner(0),
        staker_record(0),
        253,
        100,
        0,
        0,
        || panic!("oracle must not be read"),
    );
    assert_error(result, FlashLiquidityError::ZeroDuration);
}

#[test]
fn test_oracle_failure_aborts_borrow() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();
    let staker_before = p.staker.clone();

    let result = process_borrow(
        &p.governance,
        &mut p.vault,
        &mut p.staker,
        &mut Loan::default(),
        owner(0),
        staker_record(0),
        253,
        100,
        10,
        0,
        || Err(error!(FlashLiquidityError::StalePrice)),
    );

    assert_error(result, FlashLiquidityError::StalePrice);
    assert_eq!(p.staker, staker_before);
    assert_eq!(p.vault.next_loan_id, 0);
}

// ===== Vault ledger =====

#[test]
fn test_unstake_limited_to_unreserved_collateral() {
    let mut p = Protocol::new();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut Loan::default(), 500_000, 50, 0).unwrap();

    assert_error(
        p.unstake(500_001, 1_000_000, 1),
        FlashLiquidityError::InsufficientUnlockedCollateral,
    );

    let burned = p.unstake(500_000, 1_000_000, 1).unwrap();
    assert_eq!(burned, 500_000);
    assert_eq!(p.staker.staked_amount, 500_000);
    assert_eq!(p.vault.available_liquidity().unwrap(), 0);
    p.assert_conserved();
}

#[test]
fn test_unstake_respects_lock() {
    let mut p = Protocol::new();
    p.stake(1_000, 100, 5).unwrap();

    assert_error(
        p.unstake(1_000, 1_000, 104),
        FlashLiquidityError::StillLocked,
    );
    assert!(p.unstake(1_000, 1_000, 105).is_ok());
    assert_eq!(p.vault.staker_count, 0);
}

#[test]
fn test_unstake_requires_held_derivative() {
    let mut p = Protocol::new();
    p.stake(1_000, 0, 0).unwrap();

    assert_error(
        p.unstake(1_000, 999, 0),
        FlashLiquidityError::InsufficientDerivativeBalance,
    );
}

#[test]
fn test_stake_validation() {
    let mut p = Protocol::new();

    assert_error(p.stake(0, 0, 0), FlashLiquidityError::InvalidAmount);
    assert_error(
        p.stake(1, flash_liquidity::MAX_LOCK_DURATION_SLOTS + 1, 0),
        FlashLiquidityError::InvalidLockDuration,
    );
    assert_eq!(p.vault.staker_count, 0);

    p.stake(10, 0, 3).unwrap();
    assert_eq!(p.staker.owner, owner(0));
    assert_eq!(p.staker.derivative_account, derivative_account(0));
    assert_eq!(p.staker.collateral_mint, key(MINT));
    assert_eq!(p.staker.last_compound_slot, 3);
    assert_eq!(p.vault.staker_count, 1);
}

// ===== Liquidation =====

#[test]
fn test_liquidation_spares_other_loans_and_records_bad_debt() {
    let mut p = Protocol::new();
    // 100% borrow ratio and a 10% penalty so the staker can be fully drawn
    let mut aggressive = params();
    aggressive.max_borrow_ratio_bps = 10_000;
    aggressive.liquidation_penalty_bps = 1_000;
    p.governance.apply(&aggressive).unwrap();

    p.stake(1_000, 0, 0).unwrap();
    let mut first = Loan::default();
    let mut second = Loan::default();
    p.borrow(&mut first, 300, 10, 0).unwrap();
    p.borrow(&mut second, 700, 50, 0).unwrap();

    // First loan: 300 + 30 penalty, 700 still backs the second loan
    let outcome = p.liquidate(&mut first, 21).unwrap();
    assert_eq!(outcome.plan.seized, 300);
    assert_eq!(outcome.plan.bad_debt, 30);
    assert_eq!(outcome.plan.penalty_collected, 0);
    assert_eq!(first.bad_debt, 30);

    assert_eq!(p.staker.staked_amount, 700);
    assert_eq!(p.staker.reserved_collateral, 700);
    assert_eq!(p.vault.total_bad_debt, 30);
    p.assert_conserved();

    // Second loan takes the rest
    let outcome = p.liquidate(&mut second, 61).unwrap();
    assert_eq!(outcome.plan.seized, 700);
    assert_eq!(outcome.plan.bad_debt, 70);
    assert_eq!(p.staker.staked_amount, 0);
    assert_eq!(p.staker.derivative_balance, 0);
    assert_eq!(p.vault.total_bad_debt, 100);
    assert_eq!(p.vault.staker_count, 0);
    p.assert_conserved();
}

// ===== Reentrancy =====

#[test]
fn test_flagged_loan_and_staker_reject_nested_entry() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 100_000, 50, 0).unwrap();

    loan.in_callback = true;
    p.staker.in_callback = true;

    assert_error(p.repay(&mut loan, 1), FlashLiquidityError::ReentrancyDetected);
    assert_error(p.liquidate(&mut loan, 100), FlashLiquidityError::ReentrancyDetected);
    assert_error(
        p.borrow(&mut Loan::default(), 1_000, 10, 1),
        FlashLiquidityError::ReentrancyDetected,
    );

    loan.in_callback = false;
    p.staker.in_callback = false;
    assert!(p.repay(&mut loan, 1).is_ok());
}

#[test]
fn test_callback_instruction_layout() {
    let mint = key(MINT);
    let data = callback_instruction_data(7, 500_000, &mint);

    assert_eq!(data.len(), 56);
    assert_eq!(&data[..8], &CALLBACK_DISCRIMINATOR);
    assert_eq!(&data[8..16], &7u64.to_le_bytes());
    assert_eq!(&data[16..24], &500_000u64.to_le_bytes());
    assert_eq!(&data[24..], mint.as_ref());
}

// ===== Pause =====

#[test]
fn test_pause_blocks_entry_but_not_exit() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 100_000, 50, 0).unwrap();

    p.governance.is_paused = true;

    assert_error(p.stake(1, 0, 1), FlashLiquidityError::ProtocolPaused);
    assert_error(
        p.borrow(&mut Loan::default(), 1_000, 10, 1),
        FlashLiquidityError::ProtocolPaused,
    );
    assert_error(p.compound(1), FlashLiquidityError::ProtocolPaused);

    assert!(p.repay(&mut loan, 1).is_ok());
    assert!(p.unstake(1_000, 1_000_000, 1).is_ok());
}

// ===== Rewards =====

#[test]
fn test_compound_is_idempotent_within_a_slot() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 500_000, 50, 0).unwrap();
    p.repay(&mut loan, 40).unwrap();

    // Created in slot 0: nothing to do in slot 0
    assert_eq!(p.compound(0).unwrap(), 0);

    // 1% growth would be 10_000, only 1_000 of fees exist
    assert_eq!(p.compound(41).unwrap(), 1_000);
    let staker_after = p.staker.clone();
    let pool_after = p.reward_pool.clone();

    assert_eq!(p.compound(41).unwrap(), 0);
    assert_eq!(p.staker, staker_after);
    assert_eq!(p.reward_pool, pool_after);
    p.assert_conserved();
}

#[test]
fn test_claim_pays_compounded_rewards_once() {
    let mut p = Protocol::new();
    let mut loan = Loan::default();
    p.stake(1_000_000, 0, 0).unwrap();
    p.borrow(&mut loan, 500_000, 50, 0).unwrap();
    p.repay(&mut loan, 40).unwrap();

    assert_error(
        process_claim_rewards(&mut p.staker, &mut p.reward_pool),
        FlashLiquidityError::NoRewardsToClaim,
    );

    p.compound(41).unwrap();
    assert_eq!(process_claim_rewards(&mut p.staker, &mut p.reward_pool).unwrap(), 1_000);
    assert_eq!(p.staker.reward_basis, p.staker.staked_amount);
    assert_eq!(p.staker.rewards_claimed, 1_000);
    assert_eq!(p.reward_pool.total_claimed, 1_000);

    assert_error(
        process_claim_rewards(&mut p.staker, &mut p.reward_pool),
        FlashLiquidityError::NoRewardsToClaim,
    );
    p.assert_conserved();
}

// ===== Governance =====

#[test]
fn test_initialize_governance_rejects_bad_params() {
    let mut governance = Governance::default();
    let mut bad = params();
    bad.compound_rate_denominator = 0;

    assert_error(
        process_initialize_governance(&mut governance, key(ADMIN), &bad, 255),
        FlashLiquidityError::InvalidGovernanceParams,
    );

    process_initialize_governance(&mut governance, key(ADMIN), &params(), 255).unwrap();
    assert_eq!(governance.admin, key(ADMIN));
    assert!(!governance.is_paused);
    assert_eq!(governance.params(), params());
}

#[test]
fn test_stake_mints_into_registered_derivative_account() {
    let mut p = Protocol::new();
    p.stake(1_000, 0, 0).unwrap();

    let result = process_stake(
        &p.governance,
        &mut p.vault,
        &mut p.staker,
        &p.reward_pool,
        owner(0),
        254,
        derivative_account(1),
        1_000,
        0,
        1,
    );

    assert_error(result, FlashLiquidityError::DerivativeAccountMismatch);
    assert_eq!(p.staker.staked_amount, 1_000);
    assert_eq!(p.vault.total_derivative_supply, 1_000);
}

#[test]
fn test_borrow_limit_holds_at_extreme_amounts() {
    let governance = Protocol::new().governance;

    assert!(check_borrow_limit(u64::MAX / 2, u64::MAX, &governance).is_ok());
    assert_error(
        check_borrow_limit(u64::MAX / 2 + 1, u64::MAX, &governance),
        FlashLiquidityError::ExceedsBorrowLimit,
    );
}

// ===== Several stakers =====

/// One vault shared by several stakers, with the derivative token side
/// tracked next to the ledger
struct Market {
    governance: Governance,
    vault: VaultAccount,
    reward_pool: RewardPool,
    stakers: Vec<StakerAccount>,
    /// Balance of each staker's registered derivative account
    held: Vec<u64>,
    /// What the vault PDA may still burn from each account
    delegated: Vec<u64>,
    mint_supply: u64,
}

impl Market {
    fn new(stakers: usize, params: &GovernanceParams) -> Self {
        let mut governance = Governance::default();
        process_initialize_governance(&mut governance, key(ADMIN), params, 255).unwrap();

        Self {
            governance,
            vault: VaultAccount {
                collateral_mint: key(MINT),
                ..Default::default()
            },
            reward_pool: RewardPool {
                collateral_mint: key(MINT),
                ..Default::default()
            },
            stakers: vec![StakerAccount::default(); stakers],
            held: vec![0; stakers],
            delegated: vec![0; stakers],
            mint_supply: 0,
        }
    }

    fn stake(&mut self, index: usize, amount: u64, slot: u64) -> Result<u64> {
        let minted = process_stake(
            &self.governance,
            &mut self.vault,
            &mut self.stakers[index],
            &self.reward_pool,
            owner(index),
            254,
            derivative_account(index),
            amount,
            0,
            slot,
        )?;

        self.held[index] += minted;
        self.mint_supply += minted;
        // Every stake approves the vault for the whole position again
        let staker = &self.stakers[index];
        self.delegated[index] = staker.derivative_balance + staker.unburned_forfeit;
        Ok(minted)
    }

    fn borrow(&mut self, index: usize, loan: &mut Loan, principal: u64, duration: u64, slot: u64) -> Result<BorrowOutcome> {
        process_borrow(
            &self.governance,
            &mut self.vault,
            &mut self.stakers[index],
            loan,
            owner(index),
            staker_record(index),
            253,
            principal,
            duration,
            slot,
            || Ok(baseline_price()),
        )
    }

    fn repay(&mut self, index: usize, loan: &mut Loan, slot: u64) -> Result<RepaymentQuote> {
        process_repay(
            &self.governance,
            &mut self.vault,
            &mut self.stakers[index],
            loan,
            &mut self.reward_pool,
            slot,
        )
    }

    fn liquidate(&mut self, index: usize, loan: &mut Loan, slot: u64) -> Result<LiquidationOutcome> {
        let burnable = self.held[index].min(self.delegated[index]);
        let outcome = process_liquidate(
            &self.governance,
            &mut self.vault,
            &mut self.stakers[index],
            loan,
            &mut self.reward_pool,
            burnable,
            slot,
        )?;

        self.held[index] -= outcome.derivative_burned;
        self.delegated[index] -= outcome.derivative_burned;
        self.mint_supply -= outcome.derivative_burned;
        Ok(outcome)
    }

    fn unstake(&mut self, index: usize, amount: u64, slot: u64) -> Result<u64> {
        let burned = process_unstake(
            &mut self.vault,
            &mut self.stakers[index],
            &self.reward_pool,
            amount,
            self.held[index],
            slot,
        )?;

        self.held[index] -= burned;
        self.mint_supply -= burned;
        Ok(burned)
    }

    fn compound(&mut self, index: usize, slot: u64) -> Result<u64> {
        process_compound(&self.governance, &mut self.stakers[index], &mut self.reward_pool, slot)
    }

    fn assert_conserved(&self) {
        let sum = |field: fn(&StakerAccount) -> u64| self.stakers.iter().map(field).sum::<u64>();

        assert_eq!(self.vault.total_collateral, sum(|s| s.staked_amount));
        assert_eq!(self.vault.total_derivative_supply, sum(|s| s.derivative_balance));
        assert_eq!(self.vault.total_reserved, sum(|s| s.reserved_collateral));
        assert_eq!(self.vault.outstanding_forfeit, sum(|s| s.unburned_forfeit));
        assert_eq!(
            self.mint_supply,
            self.vault.total_derivative_supply + self.vault.outstanding_forfeit
        );
        assert!(self.vault.total_reserved <= self.vault.total_collateral);
        assert!(self.reward_pool.total_claimed <= self.reward_pool.distributed_to_stakers);
        assert!(self.reward_pool.distributed_to_stakers <= self.reward_pool.accumulated_fees);
    }
}

fn doubling_rate() -> GovernanceParams {
    GovernanceParams {
        compound_rate_numerator: 2,
        compound_rate_denominator: 1,
        ..params()
    }
}

#[test]
fn test_equal_stakers_earn_equal_rewards_whatever_their_compound_cadence() {
    let mut m = Market::new(2, &doubling_rate());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();

    let mut loan = Loan::default();
    m.borrow(0, &mut loan, 500_000, 50, 0).unwrap();
    assert_eq!(m.repay(0, &mut loan, 0).unwrap().fee, 1_000);

    let mut eager = 0;
    for slot in 1..=10 {
        eager += m.compound(0, slot).unwrap();
    }
    let patient = m.compound(1, 11).unwrap();

    assert_eq!(eager, 500);
    assert_eq!(patient, 500);
    assert_eq!(m.reward_pool.distributed_to_stakers, 1_000);
    m.assert_conserved();
}

#[test]
fn test_late_staker_does_not_share_earlier_fees() {
    let mut m = Market::new(2, &doubling_rate());
    m.stake(0, 1_000_000, 0).unwrap();

    let mut loan = Loan::default();
    m.borrow(0, &mut loan, 500_000, 50, 0).unwrap();
    m.repay(0, &mut loan, 1).unwrap();

    m.stake(1, 1_000_000, 2).unwrap();
    assert_eq!(m.compound(1, 3).unwrap(), 0);
    assert_eq!(m.compound(0, 3).unwrap(), 1_000);
    m.assert_conserved();
}

#[test]
fn test_ledger_conserved_across_stakers() {
    let mut m = Market::new(3, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 2_000_000, 0).unwrap();
    m.stake(2, 500_000, 0).unwrap();
    m.assert_conserved();

    let mut first = Loan::default();
    let mut second = Loan::default();
    m.borrow(0, &mut first, 500_000, 10, 0).unwrap();
    m.borrow(1, &mut second, 1_000_000, 50, 0).unwrap();
    assert_eq!(m.vault.total_reserved, 1_500_000);
    m.assert_conserved();

    // The first staker defaults; the second loan stays backed
    let outcome = m.liquidate(0, &mut first, 21).unwrap();
    assert_eq!(outcome.plan.seized, 502_500);
    assert_eq!(m.stakers[1].reserved_collateral, 1_000_000);
    m.assert_conserved();

    assert_eq!(m.unstake(2, 500_000, 22).unwrap(), 500_000);
    m.repay(1, &mut second, 30).unwrap();
    m.compound(0, 31).unwrap();
    m.compound(1, 31).unwrap();
    m.assert_conserved();

    assert_eq!(m.vault.total_collateral, 2_497_500);
    assert_eq!(m.vault.total_reserved, 0);
    assert_eq!(m.vault.staker_count, 2);
}

#[test]
fn test_borrow_limit_uses_own_stake_not_vault_liquidity() {
    let mut m = Market::new(2, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();

    assert_error(
        m.borrow(1, &mut Loan::default(), 500_001, 10, 0),
        FlashLiquidityError::ExceedsBorrowLimit,
    );

    m.borrow(0, &mut Loan::default(), 500_000, 10, 0).unwrap();
    m.borrow(1, &mut Loan::default(), 500_000, 10, 0).unwrap();
    assert_eq!(m.vault.available_liquidity().unwrap(), 1_000_000);
    m.assert_conserved();
}

#[test]
fn test_one_stakers_loan_does_not_lock_another_stakers_exit() {
    let mut m = Market::new(2, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();
    m.borrow(0, &mut Loan::default(), 500_000, 50, 0).unwrap();
    assert_eq!(m.vault.available_liquidity().unwrap(), 1_500_000);

    assert_eq!(m.unstake(1, 1_000_000, 1).unwrap(), 1_000_000);
    assert_eq!(m.vault.available_liquidity().unwrap(), 500_000);

    // The borrower keeps its reservation in the vault
    assert_error(
        m.unstake(0, 500_001, 1),
        FlashLiquidityError::InsufficientUnlockedCollateral,
    );
    assert_eq!(m.unstake(0, 500_000, 1).unwrap(), 500_000);
    assert_eq!(m.vault.available_liquidity().unwrap(), 0);
    assert_eq!(m.vault.total_reserved, 500_000);
    m.assert_conserved();
}

#[test]
fn test_liquidation_burns_forfeited_derivative() {
    let mut m = Market::new(2, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();

    let mut loan = Loan::default();
    m.borrow(0, &mut loan, 500_000, 10, 0).unwrap();
    let outcome = m.liquidate(0, &mut loan, 21).unwrap();

    assert_eq!(outcome.forfeited_derivative, 502_500);
    assert_eq!(outcome.derivative_burned, 502_500);
    assert_eq!(m.held[0], 497_500);
    assert_eq!(m.mint_supply, 1_497_500);
    assert_eq!(m.mint_supply, m.vault.total_derivative_supply);
    assert_eq!(m.vault.outstanding_forfeit, 0);
    m.assert_conserved();

    // The 2_500 penalty goes to the derivative left after the forfeit
    assert_eq!(m.compound(1, 22).unwrap(), 1_669);
    assert_eq!(m.compound(0, 22).unwrap(), 830);
    m.assert_conserved();
}

#[test]
fn test_unburned_forfeit_is_collected_on_exit() {
    let mut m = Market::new(2, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();

    let mut loan = Loan::default();
    m.borrow(0, &mut loan, 500_000, 10, 0).unwrap();

    // Owner revoked the vault's delegation
    m.delegated[0] = 0;
    let outcome = m.liquidate(0, &mut loan, 21).unwrap();

    assert_eq!(outcome.derivative_burned, 0);
    assert_eq!(m.stakers[0].unburned_forfeit, 502_500);
    assert_eq!(m.vault.outstanding_forfeit, 502_500);
    assert_eq!(m.mint_supply, 2_000_000);
    m.assert_conserved();

    // One unit moved elsewhere: the account no longer covers the exit
    m.held[0] -= 1;
    assert_error(
        m.unstake(0, 497_500, 22),
        FlashLiquidityError::InsufficientDerivativeBalance,
    );
    m.held[0] += 1;

    assert_eq!(m.unstake(0, 497_500, 22).unwrap(), 1_000_000);
    assert_eq!(m.stakers[0].unburned_forfeit, 0);
    assert_eq!(m.vault.outstanding_forfeit, 0);
    assert_eq!(m.mint_supply, 1_000_000);
    assert_eq!(m.mint_supply, m.vault.total_derivative_supply);
    m.assert_conserved();
}

#[test]
fn test_restake_redelegates_and_liquidation_collects_earlier_forfeit() {
    let mut m = Market::new(2, &params());
    m.stake(0, 1_000_000, 0).unwrap();
    m.stake(1, 1_000_000, 0).unwrap();

    let mut first = Loan::default();
    m.borrow(0, &mut first, 500_000, 10, 0).unwrap();
    m.delegated[0] = 0;
    m.liquidate(0, &mut first, 21).unwrap();
    assert_eq!(m.vault.outstanding_forfeit, 502_500);

    m.stake(0, 2_500, 22).unwrap();
    assert_eq!(m.delegated[0], 1_002_500);

    let mut second = Loan::default();
    m.borrow(0, &mut second, 250_000, 10, 22).unwrap();
    let outcome = m.liquidate(0, &mut second, 43).unwrap();

    assert_eq!(outcome.forfeited_derivative, 251_250);
    assert_eq!(outcome.derivative_burned, 753_750);
    assert_eq!(m.stakers[0].unburned_forfeit, 0);
    assert_eq!(m.vault.outstanding_forfeit, 0);
    assert_eq!(m.held[0], m.stakers[0].derivative_balance);
    assert_eq!(m.mint_supply, 1_248_750);
    m.assert_conserved();
}
