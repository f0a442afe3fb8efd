//! The ledger client port.
//!
//! Everything the coordinator and the deploy pipeline need from the outer
//! ledger, as a trait. The in-process devnet ledger implements it for local
//! deployment and the test suite; a remote RPC adapter is deliberately out
//! of scope and plugs in here.

use std::{
    collections::HashMap,
    time::Duration,
};

use thiserror::Error;

use crate::ledger::txn::{
    Address,
    SignedTransaction,
    SuggestedParams,
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Network or RPC failure. The only kind retried, and only for reads.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("timeout waiting for confirmation of {0}")]
    ConfirmationTimeout(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("program compilation failed: {0}")]
    Compile(String),
}

/// Confirmation data for a submitted group.
#[derive(Debug, Clone)]
pub struct PendingInfo {
    pub confirmed_round: u64,
    /// Set when the transaction created an application.
    pub application_index: Option<u64>,
    /// Logs of the first application call, method returns included.
    pub logs: Vec<Vec<u8>>,
    pub txids: Vec<String>,
}

/// Opcode budget accounting reported by group simulation.
#[derive(Debug, Clone)]
pub struct SimulateResult {
    pub app_budget_consumed: u64,
    pub app_budget_added: u64,
    pub failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub amount: u64,
    pub min_balance: u64,
}

#[derive(Debug, Clone)]
pub struct ApplicationInfo {
    pub global_state: HashMap<Vec<u8>, Vec<u8>>,
}

/// The ledger round-trips the coordinator suspends on.
pub trait LedgerClient: Send + Sync {
    fn suggested_params(
        &self,
    ) -> impl core::future::Future<Output = Result<SuggestedParams, LedgerError>>;

    /// Compile a program source to bytecode.
    fn compile_program(
        &self,
        source: &str,
    ) -> impl core::future::Future<Output = Result<Vec<u8>, LedgerError>>;

    /// Dry-run a group, reporting opcode budget accounting.
    fn simulate(
        &self,
        group: &[SignedTransaction],
    ) -> impl core::future::Future<Output = Result<SimulateResult, LedgerError>>;

    /// Submit a group; returns the first transaction id.
    fn submit(
        &self,
        group: Vec<SignedTransaction>,
    ) -> impl core::future::Future<Output = Result<String, LedgerError>>;

    fn wait_for_confirmation(
        &self,
        txid: &str,
        wait_rounds: u64,
    ) -> impl core::future::Future<Output = Result<PendingInfo, LedgerError>>;

    fn account_information(
        &self,
        address: &Address,
    ) -> impl core::future::Future<Output = Result<AccountInfo, LedgerError>>;

    fn application_info(
        &self,
        app_id: u64,
    ) -> impl core::future::Future<Output = Result<ApplicationInfo, LedgerError>>;
}

/// Retry a read with exponential backoff. Only [`LedgerError::Unavailable`]
/// is retried; every other failure surfaces immediately, as do writes.
pub async fn read_with_retries<T, F, Fut>(
    max_attempts: u32,
    mut operation: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: core::future::Future<Output = Result<T, LedgerError>>,
{
    let mut delay = Duration::from_millis(250);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(LedgerError::Unavailable(message)) if attempt < max_attempts => {
                tracing::warn!(attempt, %message, "ledger read failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    use super::*;

    #[tokio::test]
    async fn test_read_retries_on_unavailable() {
        let calls = AtomicU32::new(0);
        let result = read_with_retries(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::Unavailable("flaky".into()))
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_does_not_retry_rejections() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = read_with_retries(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::Rejected("no".into())) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
