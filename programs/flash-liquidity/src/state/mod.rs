pub mod governance;
pub mod loan;
pub mod reward_pool;
pub mod staker;
pub mod vault;

pub use governance::*;
pub use loan::*;
pub use reward_pool::*;
pub use staker::*;
pub use vault::*;
