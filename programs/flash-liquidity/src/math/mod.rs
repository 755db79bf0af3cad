pub mod fee;
pub mod oracle;

pub use fee::*;
pub use oracle::*;
