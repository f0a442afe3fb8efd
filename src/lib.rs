//! Off-chain client for a shielded UTXO vault layered over a public account
//! ledger.
//!
//! Users deposit funds publicly and spend them privately by proving, in zero
//! knowledge, ownership of an unspent note inside an append-only Merkle
//! accumulator mirrored by this crate. The crate builds and proves notes,
//! derives note secrets through a stealth-address scheme, composes the
//! opcode-pooled transaction groups the on-chain verifiers require, and
//! drives the deploy pipeline that wires verifiers, treasury signature and
//! application together.

pub mod circuits;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod frontend;
pub mod ledger;
pub mod ports;
pub mod prover;
pub mod setup;
