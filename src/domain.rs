pub mod accumulator;
pub mod commitment;
pub mod encrypted;
pub mod keys;
pub mod note;
pub mod nullifier;
pub mod proof;
pub mod witness;
