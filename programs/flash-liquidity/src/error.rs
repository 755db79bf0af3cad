// =============================================================================
// Flash Liquidity Error Codes
// =============================================================================
// Every rejected operation returns one of these. Anchor assigns numeric codes
// starting from 6000 in declaration order.
// =============================================================================

use anchor_lang::prelude::*;

#[error_code]
pub enum FlashLiquidityError {
    // =========================================================================
    // Validation Errors (rejected before any state change)
    // =========================================================================

    #[msg("Amount must be greater than zero")]
    InvalidAmount,

    #[msg("Loan duration must be at least one slot")]
    ZeroDuration,

    #[msg("Lock duration exceeds the maximum")]
    InvalidLockDuration,

    #[msg("Collateral mint does not match the vault")]
    InvalidCollateralMint,

    #[msg("Price feed does not match the vault")]
    InvalidPriceFeed,

    #[msg("Invalid token account owner")]
    InvalidTokenAccountOwner,

    #[msg("Derivative must be held in the account registered on the first stake")]
    DerivativeAccountMismatch,

    #[msg("Callback program must be an executable program other than this one")]
    InvalidCallbackProgram,

    #[msg("Derivative amount rounds to zero")]
    DerivativeAmountZero,

    #[msg("Governance parameters out of range")]
    InvalidGovernanceParams,

    // =========================================================================
    // Capacity Errors
    // =========================================================================

    #[msg("Borrow amount exceeds allowed collateral ratio")]
    ExceedsBorrowLimit,

    #[msg("Vault does not hold enough unreserved liquidity")]
    InsufficientLiquidity,

    #[msg("Amount exceeds unreserved staked collateral")]
    InsufficientUnlockedCollateral,

    #[msg("Not enough derivative tokens to burn")]
    InsufficientDerivativeBalance,

    // =========================================================================
    // Timing Errors
    // =========================================================================

    #[msg("Stake is still locked")]
    StillLocked,

    #[msg("Loan is not past its grace period")]
    NotYetLiquidatable,

    #[msg("Grace period elapsed, loan must be liquidated")]
    LoanOverdueLiquidationRequired,

    // =========================================================================
    // External Dependency Errors (abort the whole operation)
    // =========================================================================

    #[msg("Oracle price unavailable or outside confidence bounds")]
    OracleUnavailable,

    #[msg("Oracle price is stale")]
    StalePrice,

    #[msg("Borrow callback program failed")]
    CallbackFailed,

    // =========================================================================
    // State Errors
    // =========================================================================

    #[msg("Loan is already settled")]
    AlreadySettled,

    #[msg("Reentrancy detected")]
    ReentrancyDetected,

    #[msg("Loan does not belong to these accounts")]
    LoanMismatch,

    #[msg("No rewards available to claim")]
    NoRewardsToClaim,

    #[msg("Protocol is paused")]
    ProtocolPaused,

    // =========================================================================
    // Authorization Errors
    // =========================================================================

    #[msg("Unauthorized: admin only")]
    Unauthorized,

    #[msg("Invalid authority")]
    InvalidAuthority,

    // =========================================================================
    // Math Errors
    // =========================================================================

    #[msg("Math overflow")]
    MathOverflow,

    #[msg("Math underflow")]
    MathUnderflow,

    #[msg("Division by zero")]
    DivisionByZero,
}
