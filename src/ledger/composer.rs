//! Transaction composer: assembles the opcode-pooled groups the on-chain
//! verifiers require.
//!
//! Each verifier logic signature consumes more opcode budget than a single
//! transaction carries, so groups are padded with top-level no-op
//! application calls until the pooled budget suffices. One transaction per
//! group carries the whole flat fee; all others ride at zero.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::{
        DEPOSIT_FEE_MULTIPLIER,
        DEPOSIT_METHOD,
        NOOP_METHOD,
        NULLIFIER_MBR,
        ROOTS_BOX,
        SUBTREE_BOX,
        VERIFIER_TOP_LEVEL_TXNS,
        WITHDRAW_METHOD,
    },
    ledger::{
        abi::{
            AbiArg,
            AbiError,
            Arc32Schema,
            method_call_args,
        },
        txn::{
            Account,
            Address,
            BoxRef,
            LogicSigAccount,
            SignedTransaction,
            SuggestedParams,
            Transaction,
            TxnSigner,
        },
    },
    ports::ledger::{
        LedgerClient,
        LedgerError,
        PendingInfo,
    },
};

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("group simulation failed: {0}")]
    SimulationFailed(String),

    #[error("opcode budget exceeded: consumed {consumed} > added {added}")]
    BudgetExceeded { consumed: u64, added: u64 },
}

/// The deployed application and its companion signatures, as loaded from
/// the artefact bundle.
#[derive(Clone)]
pub struct VaultApp {
    pub id: u64,
    pub schema: Arc32Schema,
    pub tss: LogicSigAccount,
    pub deposit_verifier: LogicSigAccount,
    pub withdrawal_verifier: LogicSigAccount,
}

impl VaultApp {
    pub fn address(&self) -> Address {
        Address::from_app_id(self.id)
    }
}

/// An atomic group under assembly: transactions paired with their signers.
#[derive(Default)]
pub struct AtomicGroupComposer {
    entries: Vec<(Transaction, TxnSigner)>,
}

impl AtomicGroupComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, txn: Transaction, signer: TxnSigner) {
        self.entries.push((txn, signer));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sign every transaction with its assigned signer.
    pub fn sign(self) -> Vec<SignedTransaction> {
        self.entries
            .into_iter()
            .map(|(txn, signer)| signer.sign(txn))
            .collect()
    }
}

/// Build a deposit group:
/// the verifier-signed `deposit` call, the payment funding the note, and
/// treasury-signed no-op padding up to the pooled budget.
pub fn build_deposit_group(
    app: &VaultApp,
    params: &SuggestedParams,
    from: &Arc<Account>,
    amount: u64,
    proof_args: Vec<AbiArg>,
) -> Result<AtomicGroupComposer, ComposerError> {
    let zero_fee = params.with_flat_fee(0);
    let mut composer = AtomicGroupComposer::new();

    // 1. the method call, first in the group, signed by the verifier
    let deposit_method = app.schema.contract.method(DEPOSIT_METHOD)?;
    let mut args = proof_args;
    args.push(AbiArg::Address(from.address.0));
    let call = Transaction::app_call(
        &zero_fee,
        app.deposit_verifier.address(),
        app.id,
        method_call_args(deposit_method, &args),
    )
    .with_boxes(vec![
        // subtree twice: per-call box byte budget accounting
        BoxRef {
            app_id: app.id,
            name: SUBTREE_BOX.to_vec(),
        },
        BoxRef {
            app_id: app.id,
            name: SUBTREE_BOX.to_vec(),
        },
        BoxRef {
            app_id: app.id,
            name: ROOTS_BOX.to_vec(),
        },
    ]);
    composer.add(call, TxnSigner::LogicSig(app.deposit_verifier.clone()));

    // 2. the payment, carrying the whole group fee
    let fee_params = params.with_flat_fee(params.min_fee * DEPOSIT_FEE_MULTIPLIER);
    let payment = Transaction::payment(&fee_params, from.address, app.address(), amount);
    composer.add(payment, TxnSigner::Account(Arc::clone(from)));

    // 3. treasury-signed padding for opcode pooling
    add_noop_padding(
        &mut composer,
        app,
        &zero_fee,
        app.tss.address(),
        &TxnSigner::LogicSig(app.tss.clone()),
        VERIFIER_TOP_LEVEL_TXNS - 2,
    )?;

    Ok(composer)
}

/// Build a withdrawal group:
/// the verifier-signed `withdraw` call, the fee-paying no-op call, and
/// padding up to the pooled budget.
#[allow(clippy::too_many_arguments)]
pub fn build_withdrawal_group(
    app: &VaultApp,
    params: &SuggestedParams,
    proof_args: Vec<AbiArg>,
    nullifier: [u8; 32],
    recipient: Address,
    fee_recipient: Address,
    fee_signer: &TxnSigner,
    fee: u64,
    no_change: bool,
) -> Result<AtomicGroupComposer, ComposerError> {
    let zero_fee = params.with_flat_fee(0);
    let mut composer = AtomicGroupComposer::new();

    let withdraw_method = app.schema.contract.method(WITHDRAW_METHOD)?;
    let mut args = proof_args;
    args.push(AbiArg::Address(recipient.0));
    args.push(AbiArg::Address(fee_recipient.0));
    args.push(AbiArg::Bool(no_change));

    let call = Transaction::app_call(
        &zero_fee,
        app.withdrawal_verifier.address(),
        app.id,
        method_call_args(withdraw_method, &args),
    )
    .with_boxes(vec![
        BoxRef {
            app_id: app.id,
            name: nullifier.to_vec(),
        },
        BoxRef {
            app_id: app.id,
            name: SUBTREE_BOX.to_vec(),
        },
        BoxRef {
            app_id: app.id,
            name: ROOTS_BOX.to_vec(),
        },
    ])
    .with_foreign_accounts(vec![fee_recipient, recipient]);
    composer.add(call, TxnSigner::LogicSig(app.withdrawal_verifier.clone()));

    // the fee-paying call: the network fee share of the flat fee, the
    // nullifier MBR staying with the application
    let noop_method = app.schema.contract.method(NOOP_METHOD)?;
    let fee_params = params.with_flat_fee(fee - NULLIFIER_MBR);
    let fee_call = Transaction::app_call(
        &fee_params,
        fee_recipient,
        app.id,
        method_call_args(noop_method, &[AbiArg::Uint64(0)]),
    );
    composer.add(fee_call, fee_signer.clone());

    add_noop_padding(
        &mut composer,
        app,
        &zero_fee,
        fee_recipient,
        fee_signer,
        VERIFIER_TOP_LEVEL_TXNS - 2,
    )?;

    Ok(composer)
}

/// Top-level no-op application calls: they pool opcode budget for both the
/// logic signatures and the contract.
fn add_noop_padding(
    composer: &mut AtomicGroupComposer,
    app: &VaultApp,
    params: &SuggestedParams,
    sender: Address,
    signer: &TxnSigner,
    count: usize,
) -> Result<(), ComposerError> {
    let noop_method = app.schema.contract.method(NOOP_METHOD)?;
    for i in 0..count {
        let txn = Transaction::app_call(
            params,
            sender,
            app.id,
            method_call_args(noop_method, &[AbiArg::Uint64(i as u64)]),
        );
        composer.add(txn, signer.clone());
    }
    Ok(())
}

/// Simulate, gate on the opcode budget, submit, and wait for confirmation.
pub async fn validate_and_submit<L: LedgerClient>(
    client: &L,
    composer: AtomicGroupComposer,
    wait_rounds: u64,
) -> Result<PendingInfo, ComposerError> {
    let group = composer.sign();

    let simulation = client.simulate(&group).await?;
    if let Some(failure) = simulation.failure {
        return Err(ComposerError::SimulationFailed(failure));
    }
    tracing::info!(
        consumed = simulation.app_budget_consumed,
        added = simulation.app_budget_added,
        txns = group.len(),
        "group simulated"
    );
    if simulation.app_budget_consumed > simulation.app_budget_added {
        return Err(ComposerError::BudgetExceeded {
            consumed: simulation.app_budget_consumed,
            added: simulation.app_budget_added,
        });
    }

    let txid = client.submit(group).await?;
    Ok(client.wait_for_confirmation(&txid, wait_rounds).await?)
}
