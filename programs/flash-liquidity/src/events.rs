use anchor_lang::prelude::*;

// Governance events
#[event]
pub struct GovernanceUpdated {
    pub admin: Pubkey,
    pub flash_loan_fee_bps: u16,
    pub liquidation_penalty_bps: u16,
    pub max_borrow_ratio_bps: u16,
    pub slot: u64,
}

#[event]
pub struct ProtocolPauseChanged {
    pub admin: Pubkey,
    pub is_paused: bool,
    pub slot: u64,
}

#[event]
pub struct AdminTransferred {
    pub old_admin: Pubkey,
    pub new_admin: Pubkey,
    pub slot: u64,
}

#[event]
pub struct VaultInitialized {
    pub vault: Pubkey,
    pub collateral_mint: Pubkey,
    pub derivative_mint: Pubkey,
    pub price_feed: Pubkey,
    pub slot: u64,
}

// Vault ledger events
#[event]
pub struct Staked {
    pub owner: Pubkey,
    pub collateral_mint: Pubkey,
    pub amount: u64,
    pub derivative_minted: u64,
    pub lock_expiry_slot: u64,
    pub slot: u64,
}

#[event]
pub struct Unstaked {
    pub owner: Pubkey,
    pub collateral_mint: Pubkey,
    pub amount: u64,
    pub derivative_burned: u64,
    pub slot: u64,
}

// Loan events
#[event]
pub struct LoanIssued {
    pub loan_id: u64,
    pub borrower: Pubkey,
    pub staker: Pubkey,
    pub collateral_mint: Pubkey,
    pub principal: u64,
    pub fee: u64,
    pub due_at_slot: u64,
    pub price: u64,
    pub callback_program: Option<Pubkey>,
    pub slot: u64,
}

#[event]
pub struct LoanRepaid {
    pub loan_id: u64,
    pub borrower: Pubkey,
    pub principal: u64,
    pub fee: u64,
    pub late_fee: u64,
    pub slot: u64,
}

#[event]
pub struct LoanLiquidated {
    pub loan_id: u64,
    pub liquidator: Pubkey,
    pub staker: Pubkey,
    pub principal: u64,
    pub penalty: u64,
    pub collateral_seized: u64,
    pub bad_debt: u64,
    pub slot: u64,
}

// Reward events
#[event]
pub struct RewardsCompounded {
    pub owner: Pubkey,
    pub collateral_mint: Pubkey,
    pub credit: u64,
    pub reward_basis: u64,
    pub slot: u64,
}

#[event]
pub struct RewardsClaimed {
    pub owner: Pubkey,
    pub collateral_mint: Pubkey,
    pub amount: u64,
    pub slot: u64,
}
