//! The coordinator: mirrors the on-chain accumulator, issues deposits and
//! withdrawals, and recovers stealth notes from ledger history.
//!
//! One instance is single-threaded; the only suspension points are the
//! ledger round-trips. After every confirmed submission the coordinator
//! reconciles its mirror against the root returned by the method and the
//! root stored on-chain, treating any disagreement as a fatal divergence.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::{
        DEPOSIT_MINIMUM_AMOUNT,
        ROOT_KEY,
        WAIT_ROUNDS,
        WITHDRAWAL_DEFAULT_FEE,
    },
    crypto::{
        ecies::ecies_decrypt,
        field::{
            amount_from_bytes32,
            fr_from_bytes32,
            fr_to_bytes32,
        },
    },
    domain::{
        accumulator::{
            Accumulator,
            AccumulatorError,
        },
        encrypted::EncryptedNote,
        keys::{
            SpendKey,
            SpendPub,
        },
        note::Note,
        witness::{
            DepositWitness,
            WithdrawalWitness,
        },
    },
    ledger::{
        abi::{
            AbiError,
            decode_index_and_root,
            parse_method_return,
        },
        composer::{
            ComposerError,
            VaultApp,
            build_deposit_group,
            build_withdrawal_group,
            validate_and_submit,
        },
        txn::{
            Account,
            Address,
            TxnSigner,
        },
    },
    ports::ledger::{
        LedgerClient,
        LedgerError,
        PendingInfo,
        read_with_retries,
    },
    prover::{
        Prover,
        ProverError,
        proof_method_args,
    },
    setup::pipeline::VaultBundle,
};

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Prover(#[from] ProverError),

    #[error(transparent)]
    Composer(#[from] ComposerError),

    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error("deposit amount {amount} below minimum {minimum}")]
    AmountBelowMinimum { amount: u64, minimum: u64 },

    #[error("note holds {available}, requested {requested} plus fee {fee}")]
    InsufficientNote {
        available: u64,
        requested: u64,
        fee: u64,
    },

    #[error("note is not inserted in the tree")]
    NoteNotInserted,

    #[error("method result malformed: {0}")]
    MalformedResult(&'static str),

    /// The on-chain root disagrees with the returned or locally projected
    /// root. Fatal: the mirror must be rebuilt from the ledger.
    #[error("root divergence: {context}")]
    RootDivergence { context: &'static str },

    #[error("leaf index divergence: local {local}, on-chain {onchain}")]
    IndexDivergence { local: u32, onchain: u64 },
}

/// A confirmed deposit: the note is live in the tree and spendable.
#[derive(Debug, Clone)]
pub struct Deposit {
    pub from_address: Address,
    pub txids: Vec<String>,
    pub note: Note,
    pub encrypted_note: EncryptedNote,
}

/// A confirmed withdrawal: the change note is live, the transfer note is
/// handed to its recipient off-chain.
#[derive(Debug, Clone)]
pub struct Withdrawal {
    pub to_address: Address,
    pub txids: Vec<String>,
    pub change_note: Note,
    pub transfer_note: Note,
}

/// Options for a withdrawal.
pub struct WithdrawalOpts {
    pub recipient: Address,
    /// Defaults to the treasury signature's address.
    pub fee_recipient: Option<Address>,
    /// Defaults to the treasury signature.
    pub fee_signer: Option<TxnSigner>,
    /// Amount leaving the pool to `recipient`.
    pub amount: u64,
    /// Amount transferred in-pool to the output key (zero for a plain
    /// withdrawal).
    pub transfer_amount: u64,
    /// Zero selects the default flat fee.
    pub fee: u64,
    /// Skip inserting the change note (required once the tree is full).
    pub no_change: bool,
    pub from_note: Note,
}

pub struct Frontend<L: LedgerClient> {
    client: Arc<L>,
    app: VaultApp,
    prover: Prover,
    accumulator: Accumulator,
    pub deposits: Vec<Deposit>,
    pub withdrawals: Vec<Withdrawal>,
}

impl<L: LedgerClient> Frontend<L> {
    pub fn new(client: Arc<L>, bundle: VaultBundle) -> Self {
        let prover = Prover::new(
            Arc::new(bundle.deposit_circuit),
            Arc::new(bundle.withdrawal_circuit),
        );
        Self {
            client,
            app: bundle.app,
            prover,
            accumulator: Accumulator::new(&bundle.tree_config),
            deposits: Vec::new(),
            withdrawals: Vec::new(),
        }
    }

    pub fn app(&self) -> &VaultApp {
        &self.app
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Build, prove and submit a deposit, then mirror the inserted leaf.
    pub async fn send_deposit(
        &mut self,
        from: &Arc<Account>,
        amount: u64,
        sender_key: &SpendKey,
        output_pub: &SpendPub,
    ) -> Result<Deposit, FrontendError> {
        if amount < DEPOSIT_MINIMUM_AMOUNT {
            return Err(FrontendError::AmountBelowMinimum {
                amount,
                minimum: DEPOSIT_MINIMUM_AMOUNT,
            });
        }

        let mut note = Note::derive(amount, sender_key, output_pub);
        let encrypted_note = EncryptedNote::seal(&note, &sender_key.public());

        let proof = self.prover.prove_deposit(&DepositWitness::new(&note))?;
        let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());

        let params = self.client.suggested_params().await?;
        let composer = build_deposit_group(&self.app, &params, from, amount, args)?;
        let info = validate_and_submit(&*self.client, composer, WAIT_ROUNDS).await?;

        let (index, root) = parse_index_and_root(&info)?;
        self.reconcile_root(&root).await?;

        let local_index = self.accumulator.append(note.commitment.0)?;
        if u64::from(local_index) != index {
            return Err(FrontendError::IndexDivergence {
                local: local_index,
                onchain: index,
            });
        }
        if fr_to_bytes32(&self.accumulator.current_root()) != root {
            return Err(FrontendError::RootDivergence {
                context: "local projection after deposit",
            });
        }
        note.inserted_index = Some(local_index);
        tracing::info!(index, amount, "deposit confirmed");

        let deposit = Deposit {
            from_address: from.address,
            txids: info.txids,
            note,
            encrypted_note,
        };
        self.deposits.push(deposit.clone());
        Ok(deposit)
    }

    /// Spend a note: withdraw to a public address, optionally transferring
    /// part of it in-pool, and mirror the change commitment.
    pub async fn send_withdrawal(
        &mut self,
        opts: &WithdrawalOpts,
        spender: &SpendKey,
        output_pub: &SpendPub,
    ) -> Result<Withdrawal, FrontendError> {
        let from_note = &opts.from_note;
        let index = from_note.inserted_index.ok_or(FrontendError::NoteNotInserted)?;

        let fee = if opts.fee == 0 {
            WITHDRAWAL_DEFAULT_FEE
        } else {
            opts.fee
        };
        let consumed = opts.amount + opts.transfer_amount;
        if consumed + fee > from_note.amount {
            return Err(FrontendError::InsufficientNote {
                available: from_note.amount,
                requested: consumed,
                fee,
            });
        }
        let change = from_note.amount - consumed - fee;

        // change returns to the spender's own key; the transferred sub-note
        // goes to the output key
        let change_note = Note::derive(change, spender, &spender.public());
        let transfer_note = Note::derive(opts.transfer_amount, spender, output_pub);
        let signature = spender.sign(&change_note.commitment.0);

        let path = self.accumulator.proof(from_note.leaf_value(), index)?;
        let root = self.accumulator.current_root();

        let witness = WithdrawalWitness::new(
            fr_from_bytes32(&opts.recipient.0),
            opts.amount,
            fee,
            from_note,
            index,
            &change_note,
            &transfer_note,
            root,
            path,
            spender.public(),
            signature,
        );
        let proof = self.prover.prove_withdrawal(&witness)?;
        let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());

        let (fee_recipient, fee_signer) = match (&opts.fee_recipient, &opts.fee_signer) {
            (Some(recipient), Some(signer)) => (*recipient, signer.clone()),
            _ => (
                self.app.tss.address(),
                TxnSigner::LogicSig(self.app.tss.clone()),
            ),
        };

        let params = self.client.suggested_params().await?;
        let composer = build_withdrawal_group(
            &self.app,
            &params,
            args,
            from_note.nullifier().to_bytes(),
            opts.recipient,
            fee_recipient,
            &fee_signer,
            fee,
            opts.no_change,
        )?;
        let info = validate_and_submit(&*self.client, composer, WAIT_ROUNDS).await?;

        let (onchain_index, returned_root) = parse_index_and_root(&info)?;
        self.reconcile_root(&returned_root).await?;

        let mut change_note = change_note;
        if !opts.no_change {
            let local_index = self.accumulator.append(change_note.commitment.0)?;
            if u64::from(local_index) != onchain_index {
                return Err(FrontendError::IndexDivergence {
                    local: local_index,
                    onchain: onchain_index,
                });
            }
            if fr_to_bytes32(&self.accumulator.current_root()) != returned_root {
                return Err(FrontendError::RootDivergence {
                    context: "local projection after withdrawal",
                });
            }
            change_note.inserted_index = Some(local_index);
        }
        tracing::info!(
            amount = opts.amount,
            transfer = opts.transfer_amount,
            fee,
            change,
            "withdrawal confirmed"
        );

        let withdrawal = Withdrawal {
            to_address: opts.recipient,
            txids: info.txids,
            change_note,
            transfer_note,
        };
        self.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    /// Attempt stealth recovery of an encrypted note. `None` means the
    /// note is not addressed to this key (or is corrupted) — never an
    /// error for the caller.
    pub fn recover_note(
        &self,
        encrypted: &EncryptedNote,
        recipient: &SpendKey,
        inserted_index: Option<u32>,
    ) -> Option<Note> {
        let secret = recipient.as_scalar();
        let k_bytes: [u8; 32] = ecies_decrypt(&encrypted.encrypted_k, secret)
            .ok()?
            .try_into()
            .ok()?;
        let r_bytes: [u8; 32] = ecies_decrypt(&encrypted.encrypted_r, secret)
            .ok()?
            .try_into()
            .ok()?;
        let output_bytes = ecies_decrypt(&encrypted.encrypted_output, secret).ok()?;
        let amount_bytes: [u8; 32] = ecies_decrypt(&encrypted.encrypted_amount, secret)
            .ok()?
            .try_into()
            .ok()?;

        let output_pub = SpendPub::from_bytes(&output_bytes).ok()?;
        Some(Note::from_parts(
            amount_from_bytes32(&amount_bytes),
            fr_from_bytes32(&k_bytes),
            fr_from_bytes32(&r_bytes),
            output_pub,
            inserted_index,
        ))
    }

    /// The root stored in the application's global state.
    pub async fn read_root_onchain(&self) -> Result<[u8; 32], FrontendError> {
        let info = read_with_retries(3, || self.client.application_info(self.app.id)).await?;
        let root = info
            .global_state
            .get(ROOT_KEY)
            .ok_or(FrontendError::MalformedResult("root key missing"))?;
        root.as_slice()
            .try_into()
            .map_err(|_| FrontendError::MalformedResult("root is not 32 bytes"))
    }

    /// Current minimum balance of the application escrow.
    pub async fn app_mbr(&self) -> Result<u64, FrontendError> {
        let address = self.app.address();
        let info =
            read_with_retries(3, || self.client.account_information(&address)).await?;
        Ok(info.min_balance)
    }

    /// Assert the returned root matches the authoritative on-chain root.
    async fn reconcile_root(&self, returned: &[u8; 32]) -> Result<(), FrontendError> {
        let onchain = self.read_root_onchain().await?;
        if *returned != onchain {
            return Err(FrontendError::RootDivergence {
                context: "returned root vs on-chain global state",
            });
        }
        Ok(())
    }
}

fn parse_index_and_root(info: &PendingInfo) -> Result<(u64, [u8; 32]), FrontendError> {
    let payload = parse_method_return(&info.logs)
        .ok_or(FrontendError::MalformedResult("no method return in logs"))?;
    Ok(decode_index_and_root(payload)?)
}
