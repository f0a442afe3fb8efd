//! The one-shot deploy pipeline.
//!
//! ConfigLoad → CircuitCompile → TemplateApproval → DeployApp → TssCompile
//! → InitApp → ExportBundle. Every step is mtime-gated against its sources,
//! and a live network with a non-empty output directory aborts the run
//! before anything is submitted.

use std::{
    path::Path,
    sync::Arc,
};

use ark_bn254::Fr;
use ark_ff::PrimeField;
use ark_relations::r1cs::ConstraintSynthesizer;
use thiserror::Error;

use crate::{
    circuits::{
        compiled::{
            CircuitError,
            CompiledCircuit,
        },
        deposit::DepositCircuit,
        withdrawal::WithdrawalCircuit,
    },
    config::{
        CREATE_METHOD,
        INIT_METHOD,
        INITIAL_MBR,
        ROOTS_BOX,
        SUBTREE_BOX,
        TreeConfig,
        UPDATE_METHOD,
        WAIT_ROUNDS,
    },
    ledger::{
        abi::{
            AbiArg,
            AbiError,
            Arc32Schema,
            method_call_args,
        },
        composer::{
            AtomicGroupComposer,
            ComposerError,
            VaultApp,
        },
        txn::{
            Account,
            Address,
            BoxRef,
            LogicSigAccount,
            OnComplete,
            StateSchema,
            Transaction,
            TransactionBody,
            TxnSigner,
        },
    },
    ports::ledger::{
        LedgerClient,
        LedgerError,
    },
    setup::{
        artefacts::{
            AppRecord,
            ArtefactPaths,
            DEPOSIT_VERIFIER_NAME,
            TSS_NAME,
            WITHDRAWAL_VERIFIER_NAME,
            change_values_in_file,
            copy_file,
            encode_json_file,
            decode_json_file,
            format_with_underscores,
            replace_in_file,
            should_recompile,
            update_zero_hashes_in_file,
            ArtefactError,
        },
        network::{
            ConfigError,
            Network,
        },
    },
};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Artefact(#[from] ArtefactError),

    #[error(transparent)]
    Circuit(#[from] CircuitError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Composer(#[from] ComposerError),

    #[error("app already deployed on {network}: directory {dir} is not empty")]
    AlreadyDeployed { network: Network, dir: String },

    #[error("ledger response missing {0}")]
    MissingResult(&'static str),
}

/// Everything a frontend needs, as exported per network.
pub struct VaultBundle {
    pub record: AppRecord,
    pub app: VaultApp,
    pub tree_config: TreeConfig,
    pub deposit_circuit: CompiledCircuit,
    pub withdrawal_circuit: CompiledCircuit,
}

/// Run the whole pipeline and return the deployed application record.
pub async fn create_app<L: LedgerClient>(
    client: &L,
    deployer: &Arc<Account>,
    network: Network,
    paths: &ArtefactPaths,
) -> Result<AppRecord, SetupError> {
    create_app_with_tree(client, deployer, network, paths, &TreeConfig::default()).await
}

/// The pipeline for an explicit tree configuration. Production deployments
/// use the default; the integration suite deploys shallow trees.
pub async fn create_app_with_tree<L: LedgerClient>(
    client: &L,
    deployer: &Arc<Account>,
    network: Network,
    paths: &ArtefactPaths,
    tree_config: &TreeConfig,
) -> Result<AppRecord, SetupError> {
    let network_dir = paths.network_dir(network);
    if network.is_live() {
        let occupied = std::fs::read_dir(&network_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied {
            return Err(SetupError::AlreadyDeployed {
                network,
                dir: network_dir.display().to_string(),
            });
        }
    }
    std::fs::create_dir_all(&paths.generated_dir)
        .and_then(|_| std::fs::create_dir_all(&network_dir))
        .map_err(|e| ArtefactError::Io {
            path: paths.generated_dir.display().to_string(),
            source: e,
        })?;

    encode_json_file(&paths.tree_config_json(), tree_config)?;

    tracing::info!(%network, "compiling circuits and generating verifiers");
    let deposit_verifier = generate_verifier(
        client,
        paths,
        DEPOSIT_VERIFIER_NAME,
        "Deposit",
        DepositCircuit::default(),
    )
    .await?;
    let withdrawal_verifier = generate_verifier(
        client,
        paths,
        WITHDRAWAL_VERIFIER_NAME,
        "Withdrawal",
        WithdrawalCircuit::blank(tree_config.depth as usize),
    )
    .await?;

    template_approval(paths, tree_config, &deposit_verifier, &withdrawal_verifier)?;

    let record = deploy_app(client, deployer, paths).await?;
    tracing::info!(app_id = record.id, block = record.creation_block, "application deployed");

    let tss = compile_tss(client, paths, record.id).await?;
    tracing::info!(tss_address = %tss.address(), "treasury signature compiled");

    init_app(client, deployer, paths, record.id, &tss.address()).await?;
    tracing::info!(
        app_address = %Address::from_app_id(record.id),
        "application initialized"
    );

    for artefact in paths.export_set() {
        let name = artefact.file_name().expect("artefact paths carry file names");
        copy_file(&artefact, &network_dir.join(name))?;
    }
    tracing::info!(dir = %network_dir.display(), "exported frontend setup files");

    Ok(record)
}

/// Compile a circuit (if stale), persist it, render its verifier program
/// and compile that through the ledger. Returns the verifier address.
async fn generate_verifier<L, C>(
    client: &L,
    paths: &ArtefactPaths,
    verifier_name: &str,
    circuit_name: &str,
    circuit: C,
) -> Result<LogicSigAccount, SetupError>
where
    L: LedgerClient,
    C: ConstraintSynthesizer<Fr> + Clone,
{
    let compiled_path = paths.compiled_circuit(circuit_name);
    let compiled = if compiled_path.exists() {
        CompiledCircuit::from_file(&compiled_path)?
    } else {
        let compiled = CompiledCircuit::compile(circuit, &mut rand::thread_rng())?;
        compiled.to_file(&compiled_path)?;
        tracing::info!(
            circuit = circuit_name,
            constraints = compiled.num_constraints,
            "circuit compiled"
        );
        compiled
    };

    let source_path = paths.verifier_source(verifier_name);
    if should_recompile(&source_path, &[&compiled_path]) {
        let source = render_verifier_source(verifier_name, &compiled)?;
        std::fs::write(&source_path, source).map_err(|e| ArtefactError::Io {
            path: source_path.display().to_string(),
            source: e,
        })?;
    }

    let source = std::fs::read_to_string(&source_path).map_err(|e| ArtefactError::Io {
        path: source_path.display().to_string(),
        source: e,
    })?;
    let bytecode = client.compile_program(&source).await?;
    std::fs::write(paths.bytecode(verifier_name), &bytecode).map_err(|e| ArtefactError::Io {
        path: paths.bytecode(verifier_name).display().to_string(),
        source: e,
    })?;

    Ok(LogicSigAccount::new(bytecode))
}

/// The generated verifier logic-signature source, carrying the circuit's
/// verifying key and public-input count as templated constants.
fn render_verifier_source(
    name: &str,
    compiled: &CompiledCircuit,
) -> Result<String, SetupError> {
    let vk_hex = hex::encode(compiled.verifying_key_bytes()?);
    Ok(format!(
        r#"# {name} logic signature: Groth16 proof verifier.
# Generated from the compiled circuit; do not edit.

from algopy import Bytes, Txn, UInt64, logicsig

from vault_verifier_lib import groth16_verify

NUM_PUBLIC_INPUTS = {inputs}
VERIFYING_KEY = "{vk_hex}"


@logicsig
def verifier() -> bool:
    proof = Txn.application_args(1)
    public_inputs = Txn.application_args(2)
    return groth16_verify(
        proof,
        public_inputs,
        Bytes.from_hex(VERIFYING_KEY),
        UInt64(NUM_PUBLIC_INPUTS),
    )
"#,
        name = name,
        inputs = compiled.num_public_inputs,
        vk_hex = vk_hex,
    ))
}

/// Copy the approval and clear sources into the artefact directory and run
/// the textual substitutions: verifier addresses, numeric constants, and
/// the regenerated zero-hashes block.
fn template_approval(
    paths: &ArtefactPaths,
    tree_config: &TreeConfig,
    deposit_verifier: &LogicSigAccount,
    withdrawal_verifier: &LogicSigAccount,
) -> Result<(), SetupError> {
    let approval = paths.templated_approval();
    let sources = [
        paths.approval_source(),
        paths.bytecode(DEPOSIT_VERIFIER_NAME),
        paths.bytecode(WITHDRAWAL_VERIFIER_NAME),
    ];
    let source_refs: Vec<&Path> = sources.iter().map(|p| p.as_path()).collect();
    if !should_recompile(&approval, &source_refs) {
        return Ok(());
    }

    copy_file(&paths.approval_source(), &approval)?;
    copy_file(&paths.clear_source(), &paths.templated_clear())?;
    copy_file(&paths.schema_source(), &paths.schema())?;

    let depth = tree_config.depth as usize;
    change_values_in_file(
        &approval,
        &[
            ("CURVE_MOD", Fr::MODULUS.to_string()),
            (
                "DEPOSIT_MINIMUM_AMOUNT",
                format_with_underscores(crate::config::DEPOSIT_MINIMUM_AMOUNT as u128),
            ),
            ("TREE_DEPTH", format_with_underscores(depth as u128)),
            ("MAX_LEAVES", format_with_underscores(1u128 << depth)),
            (
                "ROOTS_COUNT",
                format_with_underscores(crate::config::ROOTS_WINDOW as u128),
            ),
            (
                "INITIAL_ROOT",
                format!(
                    "\"{}\"",
                    hex::encode(crate::crypto::field::fr_to_bytes32(&tree_config.empty_root()))
                ),
            ),
            (
                "DEPOSIT_OPCODE_BUDGET_OPUP",
                format_with_underscores(crate::config::DEPOSIT_OPCODE_BUDGET_OPUP as u128),
            ),
            (
                "WITHDRAWAL_OPCODE_BUDGET_OPUP",
                format_with_underscores(crate::config::WITHDRAWAL_OPCODE_BUDGET_OPUP as u128),
            ),
            (
                "NULLIFIER_MBR",
                format_with_underscores(crate::config::NULLIFIER_MBR as u128),
            ),
        ],
    )?;
    update_zero_hashes_in_file(&approval, &tree_config.zero_hashes[..depth])?;
    replace_in_file(
        &approval,
        &[
            (
                "TMPL_DEPOSIT_VERIFIER_ADDRESS",
                hex::encode(deposit_verifier.address().0),
            ),
            (
                "TMPL_WITHDRAWAL_VERIFIER_ADDRESS",
                hex::encode(withdrawal_verifier.address().0),
            ),
        ],
    )?;
    Ok(())
}

/// Create the application on the ledger and persist `App.json`.
async fn deploy_app<L: LedgerClient>(
    client: &L,
    deployer: &Arc<Account>,
    paths: &ArtefactPaths,
) -> Result<AppRecord, SetupError> {
    let approval_source =
        std::fs::read_to_string(paths.templated_approval()).map_err(|e| ArtefactError::Io {
            path: paths.templated_approval().display().to_string(),
            source: e,
        })?;
    let clear_source =
        std::fs::read_to_string(paths.templated_clear()).map_err(|e| ArtefactError::Io {
            path: paths.templated_clear().display().to_string(),
            source: e,
        })?;
    let approval = client.compile_program(&approval_source).await?;
    let clear = client.compile_program(&clear_source).await?;

    let schema = Arc32Schema::from_file(&paths.schema())?;
    let create_method = schema.contract.method(CREATE_METHOD)?;

    let params = client.suggested_params().await?;
    let txn = Transaction::app_create(
        &params.with_flat_fee(params.min_fee),
        deployer.address,
        approval,
        clear,
        StateSchema {
            num_uints: schema.state.global.num_uints,
            num_byte_slices: schema.state.global.num_byte_slices,
        },
        method_call_args(create_method, &[]),
    );
    let txid = client.submit(vec![deployer.sign(txn)]).await?;
    let info = client.wait_for_confirmation(&txid, WAIT_ROUNDS).await?;
    let app_id = info
        .application_index
        .ok_or(SetupError::MissingResult("application index"))?;

    let record = AppRecord {
        id: app_id,
        creation_block: info.confirmed_round,
    };
    // rewrite only when the id changed, keeping mtimes stable
    let stale = decode_json_file::<AppRecord>(&paths.app_json())
        .map(|existing| existing.id != record.id)
        .unwrap_or(true);
    if stale {
        encode_json_file(&paths.app_json(), &record)?;
    }
    Ok(record)
}

/// Template the application id into the treasury signature and compile it.
async fn compile_tss<L: LedgerClient>(
    client: &L,
    paths: &ArtefactPaths,
    app_id: u64,
) -> Result<LogicSigAccount, SetupError> {
    let tss_source_path = paths.templated_tss();
    if should_recompile(
        &tss_source_path,
        &[&paths.tss_source(), &paths.app_json()],
    ) {
        copy_file(&paths.tss_source(), &tss_source_path)?;
        replace_in_file(
            &tss_source_path,
            &[("TMPL_MAIN_CONTRACT_APP_ID", app_id.to_string())],
        )?;
    }

    let source = std::fs::read_to_string(&tss_source_path).map_err(|e| ArtefactError::Io {
        path: tss_source_path.display().to_string(),
        source: e,
    })?;
    let bytecode = client.compile_program(&source).await?;
    std::fs::write(paths.bytecode(TSS_NAME), &bytecode).map_err(|e| ArtefactError::Io {
        path: paths.bytecode(TSS_NAME).display().to_string(),
        source: e,
    })?;
    Ok(LogicSigAccount::new(bytecode))
}

/// Fund the application and the treasury, then call `init` — one atomic
/// group, so a partial failure rolls everything back.
async fn init_app<L: LedgerClient>(
    client: &L,
    deployer: &Arc<Account>,
    paths: &ArtefactPaths,
    app_id: u64,
    treasury: &Address,
) -> Result<(), SetupError> {
    let schema = Arc32Schema::from_file(&paths.schema())?;
    let init_method = schema.contract.method(INIT_METHOD)?;
    let params = client.suggested_params().await?;
    let fee_params = params.with_flat_fee(params.min_fee);

    let mut composer = AtomicGroupComposer::new();
    let signer = TxnSigner::Account(Arc::clone(deployer));
    let app_address = Address::from_app_id(app_id);

    for (recipient, amount) in [(app_address, INITIAL_MBR), (*treasury, 100_000)] {
        let payment = Transaction::payment(&fee_params, deployer.address, recipient, amount);
        composer.add(payment, signer.clone());
    }

    let call = Transaction::app_call(
        &fee_params,
        deployer.address,
        app_id,
        method_call_args(init_method, &[AbiArg::Address(treasury.0)]),
    )
    .with_boxes(vec![
        BoxRef {
            app_id,
            name: ROOTS_BOX.to_vec(),
        },
        BoxRef {
            app_id,
            name: SUBTREE_BOX.to_vec(),
        },
        BoxRef {
            app_id,
            name: SUBTREE_BOX.to_vec(),
        },
    ]);
    composer.add(call, signer);

    let txid = client.submit(composer.sign()).await?;
    client.wait_for_confirmation(&txid, WAIT_ROUNDS).await?;
    Ok(())
}

/// Delete an application through its `update` selector. Devnet convenience.
pub async fn delete_app<L: LedgerClient>(
    client: &L,
    deployer: &Arc<Account>,
    app_id: u64,
    schema: &Arc32Schema,
) -> Result<(), SetupError> {
    let update_method = schema.contract.method(UPDATE_METHOD)?;
    let params = client.suggested_params().await?;
    let mut txn = Transaction::app_call(
        &params.with_flat_fee(params.min_fee),
        deployer.address,
        app_id,
        method_call_args(update_method, &[]),
    );
    if let TransactionBody::AppCall { on_complete, .. } = &mut txn.body {
        *on_complete = OnComplete::DeleteApplication;
    }
    let txid = client.submit(vec![deployer.sign(txn)]).await?;
    client.wait_for_confirmation(&txid, WAIT_ROUNDS).await?;
    Ok(())
}

/// Top up an account to a minimum balance from a funder account.
pub async fn ensure_funded<L: LedgerClient>(
    client: &L,
    funder: &Arc<Account>,
    address: Address,
    minimum: u64,
) -> Result<(), SetupError> {
    let info = client.account_information(&address).await?;
    if info.amount >= minimum {
        return Ok(());
    }
    let params = client.suggested_params().await?;
    let payment = Transaction::payment(
        &params.with_flat_fee(params.min_fee),
        funder.address,
        address,
        minimum - info.amount,
    );
    let txid = client.submit(vec![funder.sign(payment)]).await?;
    client.wait_for_confirmation(&txid, WAIT_ROUNDS).await?;
    Ok(())
}

/// Load the exported bundle of a deployed network directory.
pub fn load_bundle(dir: &Path) -> Result<VaultBundle, SetupError> {
    let record: AppRecord = decode_json_file(&dir.join("App.json"))?;
    let schema = Arc32Schema::from_file(&dir.join("APP.arc32.json"))?;
    let tree_config: TreeConfig = decode_json_file(&dir.join("TreeConfig.json"))?;

    let read_bytes = |name: &str| -> Result<Vec<u8>, SetupError> {
        std::fs::read(dir.join(name)).map_err(|e| {
            ArtefactError::Io {
                path: dir.join(name).display().to_string(),
                source: e,
            }
            .into()
        })
    };

    let app = VaultApp {
        id: record.id,
        schema,
        tss: LogicSigAccount::new(read_bytes("TSS.tok")?),
        deposit_verifier: LogicSigAccount::new(read_bytes("DepositVerifier.tok")?),
        withdrawal_verifier: LogicSigAccount::new(read_bytes("WithdrawalVerifier.tok")?),
    };
    let deposit_circuit = CompiledCircuit::from_file(&dir.join("CompiledDepositCircuit.bin"))?;
    let withdrawal_circuit =
        CompiledCircuit::from_file(&dir.join("CompiledWithdrawalCircuit.bin"))?;

    Ok(VaultBundle {
        record,
        app,
        tree_config,
        deposit_circuit,
        withdrawal_circuit,
    })
}
