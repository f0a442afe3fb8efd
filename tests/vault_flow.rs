//! End-to-end flow against the in-process devnet ledger.
//!
//! The whole stack runs for real: the deploy pipeline compiles circuits,
//! generates and "compiles" the verifier programs, deploys and initializes
//! the application; deposits and withdrawals produce real Groth16 proofs
//! that the devnet ledger verifies with the keys templated into the
//! verifier programs.
//!
//! A shallow tree keeps proving times reasonable; the fee and MBR
//! arithmetic is the production configuration.

use std::{
    path::Path,
    sync::Arc,
};

use ark_bn254::Fr;
use shielded_vault::{
    circuits::compiled::CompiledCircuit,
    config::{
        INITIAL_MBR,
        NULLIFIER_MBR,
        TreeConfig,
        WITHDRAWAL_DEFAULT_FEE,
    },
    crypto::{
        field::fr_from_bytes32,
        poseidon::field_hash,
    },
    domain::{
        accumulator::Accumulator,
        keys::{
            SpendKey,
            SpendPub,
        },
        note::{
            Note,
            derive_note_secrets,
        },
        witness::{
            DepositWitness,
            WithdrawalWitness,
        },
    },
    frontend::{
        Frontend,
        FrontendError,
        WithdrawalOpts,
    },
    ledger::{
        abi::{
            decode_index_and_root,
            parse_method_return,
        },
        composer::{
            ComposerError,
            build_deposit_group,
            build_withdrawal_group,
            validate_and_submit,
        },
        devnet::DevLedger,
        txn::{
            Account,
            Address,
            LogicSigAccount,
            TxnSigner,
        },
    },
    ports::ledger::LedgerClient,
    prover::{
        Prover,
        proof_method_args,
    },
    setup::{
        artefacts::ArtefactPaths,
        network::Network,
        pipeline,
    },
};

const TEST_TREE_DEPTH: usize = 8;

/// Load the prover from an exported network directory.
fn load_prover(deployed_dir: &Path) -> Prover {
    Prover::new(
        Arc::new(
            CompiledCircuit::from_file(&deployed_dir.join("CompiledDepositCircuit.bin")).unwrap(),
        ),
        Arc::new(
            CompiledCircuit::from_file(&deployed_dir.join("CompiledWithdrawalCircuit.bin"))
                .unwrap(),
        ),
    )
}

/// Copy the contract sources into a scratch repository root and run the
/// full pipeline against the given ledger.
async fn deploy(
    ledger: &DevLedger,
    root: &Path,
) -> (ArtefactPaths, pipeline::VaultBundle) {
    let repo_contracts = Path::new(env!("CARGO_MANIFEST_DIR")).join("contracts");
    let contracts = root.join("contracts");
    std::fs::create_dir_all(&contracts).unwrap();
    for entry in std::fs::read_dir(&repo_contracts).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), contracts.join(entry.file_name())).unwrap();
    }

    let paths = ArtefactPaths::new(root);
    let deployer = ledger.default_account();
    pipeline::create_app_with_tree(
        ledger,
        &deployer,
        Network::DevNet,
        &paths,
        &TreeConfig::new(TEST_TREE_DEPTH),
    )
    .await
    .unwrap();

    let bundle = pipeline::load_bundle(&paths.network_dir(Network::DevNet)).unwrap();
    (paths, bundle)
}

#[tokio::test]
async fn test_vault_end_to_end() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (_paths, bundle) = deploy(&ledger, scratch.path()).await;
    let mut frontend = Frontend::new(Arc::clone(&ledger), bundle);

    // fund the depositor
    let account_a = Arc::new(Account::random());
    ledger.fund(account_a.address, 10_000_000_000).await;

    // the freshly initialized app escrow sits exactly at its MBR
    assert_eq!(frontend.app_mbr().await.unwrap(), INITIAL_MBR);

    // --- deposit 10 units to a fresh recipient key ---
    let alice = SpendKey::random();
    let deposit = frontend
        .send_deposit(&account_a, 10_000_000, &alice, &alice.public())
        .await
        .unwrap();
    assert_eq!(deposit.note.inserted_index, Some(0));
    assert_eq!(frontend.accumulator().len(), 1);
    let root = frontend.accumulator().current_root();
    assert!(frontend.accumulator().contains_root(&root));

    // stealth recovery: the recipient key recovers the note, others see
    // nothing
    let recovered = frontend
        .recover_note(&deposit.encrypted_note, &alice, Some(0))
        .unwrap();
    assert_eq!(recovered.commitment, deposit.note.commitment);
    assert_eq!(recovered.amount, 10_000_000);
    assert!(frontend
        .recover_note(&deposit.encrypted_note, &SpendKey::random(), Some(0))
        .is_none());

    // --- withdraw 5 units back to A ---
    let balance_before = ledger.balance(&account_a.address).await;
    let withdrawal_1 = frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient: account_a.address,
                fee_recipient: None,
                fee_signer: None,
                amount: 5_000_000,
                transfer_amount: 0,
                fee: 0,
                no_change: false,
                from_note: deposit.note.clone(),
            },
            &alice,
            &alice.public(),
        )
        .await
        .unwrap();
    // change = 10_000_000 - 5_000_000 - (60 * 1_000 + 15_300)
    assert_eq!(withdrawal_1.change_note.amount, 4_924_700);
    assert_eq!(withdrawal_1.change_note.inserted_index, Some(1));
    assert_eq!(
        ledger.balance(&account_a.address).await,
        balance_before + 5_000_000
    );

    // --- drain the change note to a fresh account B ---
    let account_b = Account::random();
    let available = 10_000_000 - 5_000_000 - 2 * WITHDRAWAL_DEFAULT_FEE;
    let withdrawal_2 = frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient: account_b.address,
                fee_recipient: None,
                fee_signer: None,
                amount: available,
                transfer_amount: 0,
                fee: 0,
                no_change: false,
                from_note: withdrawal_1.change_note.clone(),
            },
            &alice,
            &alice.public(),
        )
        .await
        .unwrap();
    assert_eq!(ledger.balance(&account_b.address).await, available);
    assert_eq!(withdrawal_2.change_note.amount, 0);

    // --- double spend: the first note's nullifier is already boxed ---
    let mirrored_leaves = frontend.accumulator().len();
    let double_spend = frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient: account_a.address,
                fee_recipient: None,
                fee_signer: None,
                amount: 1_000_000,
                transfer_amount: 0,
                fee: 0,
                no_change: false,
                from_note: deposit.note.clone(),
            },
            &alice,
            &alice.public(),
        )
        .await;
    match double_spend {
        Err(FrontendError::Composer(ComposerError::SimulationFailed(message))) => {
            assert!(message.contains("nullifier already spent"), "{message}");
        }
        other => panic!("expected simulation failure, got {other:?}"),
    }
    // the rejected attempt must not corrupt the mirror
    assert_eq!(frontend.accumulator().len(), mirrored_leaves);

    // --- overdraw the zero-amount change note ---
    let overdraw = frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient: account_a.address,
                fee_recipient: None,
                fee_signer: None,
                amount: 1,
                transfer_amount: 0,
                fee: 0,
                no_change: true,
                from_note: withdrawal_2.change_note.clone(),
            },
            &alice,
            &alice.public(),
        )
        .await;
    assert!(matches!(
        overdraw,
        Err(FrontendError::InsufficientNote { .. })
    ));

    // two nullifier boxes were created
    assert_eq!(
        frontend.app_mbr().await.unwrap(),
        INITIAL_MBR + 2 * NULLIFIER_MBR
    );
}

#[tokio::test]
async fn test_withdrawal_to_address_beyond_field_modulus() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (_paths, bundle) = deploy(&ledger, scratch.path()).await;
    let mut frontend = Frontend::new(Arc::clone(&ledger), bundle);

    let depositor = Arc::new(Account::random());
    ledger.fund(depositor.address, 100_000_000).await;

    let alice = SpendKey::random();
    let deposit = frontend
        .send_deposit(&depositor, 10_000_000, &alice, &alice.public())
        .await
        .unwrap();

    // an address whose big-endian value exceeds the scalar field modulus:
    // the circuit must not constrain it into the field
    let recipient = Address([0xFF; 32]);
    frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient,
                fee_recipient: None,
                fee_signer: None,
                amount: 2_000_000,
                transfer_amount: 0,
                fee: 0,
                no_change: false,
                from_note: deposit.note.clone(),
            },
            &alice,
            &alice.public(),
        )
        .await
        .unwrap();
    assert_eq!(ledger.balance(&recipient).await, 2_000_000);
}

#[tokio::test]
async fn test_in_pool_transfer_emits_spendable_note() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (_paths, bundle) = deploy(&ledger, scratch.path()).await;
    let mut frontend = Frontend::new(Arc::clone(&ledger), bundle);

    let depositor = Arc::new(Account::random());
    ledger.fund(depositor.address, 100_000_000).await;

    let alice = SpendKey::random();
    let bob = SpendKey::random();
    let deposit = frontend
        .send_deposit(&depositor, 10_000_000, &alice, &alice.public())
        .await
        .unwrap();

    // withdraw 1 unit publicly and move 3 more to Bob inside the pool
    let withdrawal = frontend
        .send_withdrawal(
            &WithdrawalOpts {
                recipient: depositor.address,
                fee_recipient: None,
                fee_signer: None,
                amount: 1_000_000,
                transfer_amount: 3_000_000,
                fee: 0,
                no_change: false,
                from_note: deposit.note.clone(),
            },
            &alice,
            &bob.public(),
        )
        .await
        .unwrap();

    assert_eq!(withdrawal.transfer_note.amount, 3_000_000);
    assert_eq!(
        withdrawal.change_note.amount,
        10_000_000 - 1_000_000 - 3_000_000 - WITHDRAWAL_DEFAULT_FEE
    );
    // Bob can re-derive the transfer secrets from his own key
    let (k, r) = derive_note_secrets(&bob, &alice.public());
    assert_eq!(withdrawal.transfer_note.k, k);
    assert_eq!(withdrawal.transfer_note.r, r);
}

#[tokio::test]
async fn test_withdrawal_rejects_substituted_recipient() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (paths, bundle) = deploy(&ledger, scratch.path()).await;
    let prover = load_prover(&paths.network_dir(Network::DevNet));
    let app = bundle.app.clone();
    let mut frontend = Frontend::new(Arc::clone(&ledger), bundle);

    let depositor = Arc::new(Account::random());
    ledger.fund(depositor.address, 100_000_000).await;

    let alice = SpendKey::random();
    let deposit = frontend
        .send_deposit(&depositor, 10_000_000, &alice, &alice.public())
        .await
        .unwrap();

    // a valid withdrawal proof committing to the honest recipient...
    let honest = Account::random();
    let attacker = Account::random();
    let amount = 2_000_000u64;
    let fee = WITHDRAWAL_DEFAULT_FEE;
    let change_note = Note::derive(10_000_000 - amount - fee, &alice, &alice.public());
    let spent_note = Note::derive(0, &alice, &alice.public());
    let signature = alice.sign(&change_note.commitment.0);
    let index = deposit.note.inserted_index.unwrap();
    let path = frontend
        .accumulator()
        .proof(deposit.note.leaf_value(), index)
        .unwrap();
    let witness = WithdrawalWitness::new(
        fr_from_bytes32(&honest.address.0),
        amount,
        fee,
        &deposit.note,
        index,
        &change_note,
        &spent_note,
        frontend.accumulator().current_root(),
        path,
        alice.public(),
        signature,
    );
    let proof = prover.prove_withdrawal(&witness).unwrap();
    let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());

    // ...submitted with the recipient argument swapped for the attacker
    let params = ledger.suggested_params().await.unwrap();
    let composer = build_withdrawal_group(
        &app,
        &params,
        args,
        deposit.note.nullifier().to_bytes(),
        attacker.address,
        app.tss.address(),
        &TxnSigner::LogicSig(app.tss.clone()),
        fee,
        false,
    )
    .unwrap();
    match validate_and_submit(&*ledger, composer, 4).await {
        Err(ComposerError::SimulationFailed(message)) => {
            assert!(message.contains("recipient address mod"), "{message}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(ledger.balance(&attacker.address).await, 0);
    assert_eq!(ledger.balance(&honest.address).await, 0);
}

#[tokio::test]
async fn test_address_based_spender_withdrawal() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (paths, bundle) = deploy(&ledger, scratch.path()).await;
    let prover = load_prover(&paths.network_dir(Network::DevNet));
    let app = bundle.app.clone();

    let spender = Arc::new(Account::random());
    ledger.fund(spender.address, 100_000_000).await;

    // an address-owned note: bound to the zero key, its secrets held by
    // the depositing account rather than derived from a stealth exchange
    let from_note = Note::from_parts(
        10_000_000,
        field_hash(&[Fr::from(21u64)]),
        field_hash(&[Fr::from(22u64)]),
        SpendPub::zero(),
        None,
    );
    let proof = prover
        .prove_deposit(&DepositWitness::new(&from_note))
        .unwrap();
    let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());
    let params = ledger.suggested_params().await.unwrap();
    let composer = build_deposit_group(&app, &params, &spender, 10_000_000, args).unwrap();
    let info = validate_and_submit(&*ledger, composer, 4).await.unwrap();
    let (index, _) = decode_index_and_root(parse_method_return(&info.logs).unwrap()).unwrap();
    assert_eq!(index, 0);

    // mirror the single leaf locally to build the membership proof
    let mut accumulator = Accumulator::with_window(&TreeConfig::new(TEST_TREE_DEPTH), 3);
    accumulator.append(from_note.commitment.0).unwrap();

    // spend it with no signature: the spender is its ledger address
    let recipient = Account::random();
    let amount = 2_000_000u64;
    let fee = WITHDRAWAL_DEFAULT_FEE;
    let change_note = Note::from_parts(
        10_000_000 - amount - fee,
        field_hash(&[Fr::from(23u64)]),
        field_hash(&[Fr::from(24u64)]),
        SpendPub::zero(),
        None,
    );
    let spent_note = Note::from_parts(
        0,
        field_hash(&[Fr::from(25u64)]),
        field_hash(&[Fr::from(26u64)]),
        SpendPub::zero(),
        None,
    );
    let path = accumulator.proof(from_note.leaf_value(), 0).unwrap();
    let witness = WithdrawalWitness::new_address_based(
        fr_from_bytes32(&recipient.address.0),
        amount,
        fee,
        &from_note,
        0,
        &change_note,
        &spent_note,
        accumulator.current_root(),
        path,
        fr_from_bytes32(&spender.address.0),
        fr_from_bytes32(&spender.address.0),
    );
    let proof = prover.prove_withdrawal(&witness).unwrap();
    let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());

    let params = ledger.suggested_params().await.unwrap();
    let composer = build_withdrawal_group(
        &app,
        &params,
        args,
        from_note.nullifier().to_bytes(),
        recipient.address,
        app.tss.address(),
        &TxnSigner::LogicSig(app.tss.clone()),
        fee,
        false,
    )
    .unwrap();
    validate_and_submit(&*ledger, composer, 4).await.unwrap();
    assert_eq!(ledger.balance(&recipient.address).await, amount);
}

#[tokio::test]
async fn test_foreign_verifier_is_rejected_by_the_app() {
    let ledger = Arc::new(DevLedger::new());
    let scratch = tempfile::tempdir().unwrap();
    let (paths, bundle) = deploy(&ledger, scratch.path()).await;
    let prover = load_prover(&paths.network_dir(Network::DevNet));

    let depositor = Arc::new(Account::random());
    ledger.fund(depositor.address, 100_000_000).await;

    // an "always accept" logic signature: compiles fine, but its address
    // differs from the one templated into the approval program
    let rogue_bytecode = ledger
        .compile_program("# rogue verifier\nALWAYS_ACCEPT = 1\n")
        .await
        .unwrap();
    let mut rogue_app = bundle.app.clone();
    rogue_app.deposit_verifier = LogicSigAccount::new(rogue_bytecode);

    let mut frontend = Frontend::new(Arc::clone(&ledger), bundle);
    let alice = SpendKey::random();

    // prove a perfectly valid deposit, then route it through the rogue
    // verifier
    let note = Note::derive(5_000_000, &alice, &alice.public());
    let proof = prover.prove_deposit(&DepositWitness::new(&note)).unwrap();
    let args = proof_method_args(&proof.proof, &proof.public_inputs.to_bytes32());

    let params = ledger.suggested_params().await.unwrap();
    let composer =
        build_deposit_group(&rogue_app, &params, &depositor, 5_000_000, args).unwrap();
    let result = validate_and_submit(&*ledger, composer, 4).await;

    match result {
        Err(ComposerError::SimulationFailed(message)) => {
            assert!(message.contains("not the deposit verifier"), "{message}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    // the honest frontend still works afterwards
    frontend
        .send_deposit(&depositor, 5_000_000, &alice, &alice.public())
        .await
        .unwrap();
}
