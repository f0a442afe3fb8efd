pub mod abi;
pub mod composer;
pub mod devnet;
pub mod txn;
