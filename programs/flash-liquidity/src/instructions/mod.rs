// =============================================================================
// Instructions Module
// =============================================================================
// Each handler does the token CPIs, logging and events. The checks and ledger
// updates live in a matching `process_*` function over plain account structs.
// =============================================================================

// Governance operations
pub mod admin;
pub mod initialize_governance;
pub mod initialize_vault;

// Vault ledger
pub mod stake;
pub mod unstake;

// Loan ledger
pub mod borrow;
pub mod liquidate;
pub mod repay;

// Rewards
pub mod claim_rewards;
pub mod compound;

// The #[derive(Accounts)] macro generates helper types that need to be at crate root
pub use admin::*;
pub use borrow::*;
pub use claim_rewards::*;
pub use compound::*;
pub use initialize_governance::*;
pub use initialize_vault::*;
pub use liquidate::*;
pub use repay::*;
pub use stake::*;
pub use unstake::*;
