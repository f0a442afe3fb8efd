//! In-process devnet ledger.
//!
//! An executable twin of the on-chain side: application creation, box MBR
//! accounting, the vault contract's deposit/withdraw semantics (its own
//! accumulator, root window and nullifier boxes), logic-signature
//! authorization, and real Groth16 verification against the verifying key
//! templated into each verifier program. Drives the deploy pipeline on
//! devnet and the integration tests; remote networks need an RPC adapter
//! behind the same port.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::Arc,
};

use ark_bn254::{
    Bn254,
    Fr,
};
use ark_groth16::{
    Groth16,
    Proof,
    VerifyingKey,
};
use ark_serialize::CanonicalDeserialize;
use ark_snark::SNARK;
use sha2::{
    Digest,
    Sha512_256,
};
use tokio::sync::Mutex;

use crate::{
    config::{
        DEPOSIT_OPCODE_BUDGET_OPUP,
        NULLIFIER_MBR,
        ROOTS_WINDOW,
        TREE_DEPTH,
        TreeConfig,
        WITHDRAWAL_OPCODE_BUDGET_OPUP,
        box_mbr,
    },
    crypto::field::{
        amount_from_bytes32,
        fr_from_bytes32,
        fr_to_bytes32,
    },
    domain::accumulator::Accumulator,
    ledger::{
        abi::encode_index_and_root,
        txn::{
            Account,
            Address,
            OnComplete,
            SignedTransaction,
            SuggestedParams,
            TransactionBody,
            TxnSignature,
        },
    },
    ports::ledger::{
        AccountInfo,
        ApplicationInfo,
        LedgerClient,
        LedgerError,
        PendingInfo,
        SimulateResult,
    },
};

/// Pooled logic-signature budget contributed by each top-level transaction.
const LSIG_BUDGET_PER_TXN: u64 = 20_000;

/// Budget one proof verification costs a verifier program.
const VERIFIER_COST: u64 = 118_000;

const DEPOSIT_SELECTOR_SIG: &str = "deposit(byte[],byte[32][],address)(uint64,byte[32])";
const WITHDRAW_SELECTOR_SIG: &str =
    "withdraw(byte[],byte[32][],address,address,bool)(uint64,byte[32])";
const NOOP_SELECTOR_SIG: &str = "noop(uint64)void";
const CREATE_SELECTOR_SIG: &str = "create()void";
const INIT_SELECTOR_SIG: &str = "init(address)void";
const UPDATE_SELECTOR_SIG: &str = "update()void";

fn selector(signature: &str) -> [u8; 4] {
    let digest = Sha512_256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Constants parsed out of a compiled program's `NAME = value` lines.
type ProgramConstants = HashMap<String, String>;

#[derive(Clone)]
struct AppState {
    constants: ProgramConstants,
    global: HashMap<Vec<u8>, Vec<u8>>,
    accumulator: Accumulator,
    nullifiers: HashSet<[u8; 32]>,
    treasury: Option<Address>,
}

#[derive(Clone)]
struct LedgerState {
    round: u64,
    balances: HashMap<Address, u64>,
    programs: HashMap<Vec<u8>, ProgramConstants>,
    apps: HashMap<u64, AppState>,
    next_app_id: u64,
    pending: HashMap<String, PendingInfo>,
}

pub struct DevLedger {
    state: Mutex<LedgerState>,
    faucet: Arc<Account>,
}

impl DevLedger {
    pub fn new() -> Self {
        let faucet = Arc::new(Account::random());
        let mut balances = HashMap::new();
        balances.insert(faucet.address, 10_000_000_000_000_000u64);
        Self {
            state: Mutex::new(LedgerState {
                round: 1,
                balances,
                programs: HashMap::new(),
                apps: HashMap::new(),
                next_app_id: 1,
                pending: HashMap::new(),
            }),
            faucet,
        }
    }

    /// The pre-funded genesis account, standing in for the key-management
    /// daemon's default wallet on a development network.
    pub fn default_account(&self) -> Arc<Account> {
        Arc::clone(&self.faucet)
    }

    pub async fn balance(&self, address: &Address) -> u64 {
        *self.state.lock().await.balances.get(address).unwrap_or(&0)
    }

    /// Test/setup convenience: credit an account straight from the faucet.
    pub async fn fund(&self, address: Address, amount: u64) {
        let mut state = self.state.lock().await;
        let faucet_balance = state
            .balances
            .get_mut(&self.faucet.address)
            .expect("faucet is funded at genesis");
        *faucet_balance -= amount;
        *state.balances.entry(address).or_insert(0) += amount;
    }

    fn app_min_balance(app: &AppState) -> u64 {
        100_000
            + box_mbr(7, 32 * TREE_DEPTH)
            + box_mbr(5, 32 * ROOTS_WINDOW)
            + NULLIFIER_MBR * app.nullifiers.len() as u64
    }

    /// Execute a group against a state, mutating it on success.
    fn execute(state: &mut LedgerState, group: &[SignedTransaction]) -> Result<PendingInfo, LedgerError> {
        if group.is_empty() || group.len() > 16 {
            return Err(LedgerError::Rejected("invalid group size".into()));
        }
        for signed in group {
            if !signed.verify_authorization() {
                return Err(LedgerError::Rejected(format!(
                    "signature does not authorize sender {}",
                    signed.txn.sender
                )));
            }
        }
        let min_fee_total = 1_000u64 * group.len() as u64;
        let fee_total: u64 = group.iter().map(|s| s.txn.fee).sum();
        if fee_total < min_fee_total {
            return Err(LedgerError::Rejected(format!(
                "group fee {fee_total} below minimum {min_fee_total}"
            )));
        }

        let mut application_index = None;
        let mut logs = Vec::new();

        for (position, signed) in group.iter().enumerate() {
            let txn = &signed.txn;
            // the fee leaves the sender regardless of the body
            if txn.fee > 0 {
                Self::debit(state, &txn.sender, txn.fee)?;
            }
            match &txn.body {
                TransactionBody::Payment { receiver, amount } => {
                    Self::debit(state, &txn.sender, *amount)?;
                    *state.balances.entry(*receiver).or_insert(0) += amount;
                }
                TransactionBody::AppCall {
                    app_id: 0,
                    approval_program: Some(approval),
                    ..
                } => {
                    let id = Self::create_app(state, approval)?;
                    application_index = Some(id);
                }
                TransactionBody::AppCall {
                    app_id,
                    on_complete: OnComplete::DeleteApplication,
                    ..
                } => {
                    state.apps.remove(app_id);
                }
                TransactionBody::AppCall {
                    app_id, app_args, ..
                } => {
                    let call_logs =
                        Self::app_call(state, *app_id, app_args, signed, group, position)?;
                    if position == 0 {
                        logs = call_logs;
                    }
                }
            }
        }

        state.round += 1;
        let txids: Vec<String> = group.iter().map(|s| s.txn.id()).collect();
        Ok(PendingInfo {
            confirmed_round: state.round,
            application_index,
            logs,
            txids,
        })
    }

    fn debit(state: &mut LedgerState, address: &Address, amount: u64) -> Result<(), LedgerError> {
        let balance = state.balances.entry(*address).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::Rejected(format!(
                "overspend by {address}: {balance} < {amount}"
            )));
        }
        *balance -= amount;
        Ok(())
    }

    fn create_app(state: &mut LedgerState, approval: &[u8]) -> Result<u64, LedgerError> {
        let constants = state
            .programs
            .get(approval)
            .cloned()
            .unwrap_or_default();
        let depth = constants
            .get("TREE_DEPTH")
            .and_then(|v| v.replace('_', "").parse().ok())
            .unwrap_or(TREE_DEPTH);
        let window = constants
            .get("ROOTS_COUNT")
            .and_then(|v| v.replace('_', "").parse().ok())
            .unwrap_or(ROOTS_WINDOW);

        let id = state.next_app_id;
        state.next_app_id += 1;

        let tree_config = TreeConfig::new(depth);
        let mut global = HashMap::new();
        global.insert(
            b"root".to_vec(),
            fr_to_bytes32(&tree_config.empty_root()).to_vec(),
        );
        state.apps.insert(
            id,
            AppState {
                constants,
                global,
                accumulator: Accumulator::with_window(&tree_config, window),
                nullifiers: HashSet::new(),
                treasury: None,
            },
        );
        state.balances.entry(Address::from_app_id(id)).or_insert(0);
        Ok(id)
    }

    fn app_call(
        state: &mut LedgerState,
        app_id: u64,
        app_args: &[Vec<u8>],
        signed: &SignedTransaction,
        group: &[SignedTransaction],
        position: usize,
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        let Some(method_selector) = app_args.first() else {
            return Err(LedgerError::Rejected("bare app call".into()));
        };

        if method_selector.as_slice() == selector(NOOP_SELECTOR_SIG) {
            return Ok(Vec::new());
        }
        if method_selector.as_slice() == selector(CREATE_SELECTOR_SIG)
            || method_selector.as_slice() == selector(UPDATE_SELECTOR_SIG)
        {
            return Ok(Vec::new());
        }
        if method_selector.as_slice() == selector(INIT_SELECTOR_SIG) {
            return Self::init_app(state, app_id, app_args, group);
        }
        if method_selector.as_slice() == selector(DEPOSIT_SELECTOR_SIG) {
            return Self::deposit(state, app_id, app_args, signed, group, position);
        }
        if method_selector.as_slice() == selector(WITHDRAW_SELECTOR_SIG) {
            return Self::withdraw(state, app_id, app_args, signed);
        }
        Err(LedgerError::Rejected("unknown method selector".into()))
    }

    fn init_app(
        state: &mut LedgerState,
        app_id: u64,
        app_args: &[Vec<u8>],
        group: &[SignedTransaction],
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        let treasury_bytes: [u8; 32] = app_args
            .get(1)
            .and_then(|a| a.as_slice().try_into().ok())
            .ok_or_else(|| LedgerError::Rejected("init: missing treasury address".into()))?;

        let app_address = Address::from_app_id(app_id);
        let funded: u64 = group
            .iter()
            .filter_map(|s| match &s.txn.body {
                TransactionBody::Payment { receiver, amount } if *receiver == app_address => {
                    Some(*amount)
                }
                _ => None,
            })
            .sum();
        let app = Self::app_mut(state, app_id)?;
        if funded < Self::app_min_balance(app) {
            return Err(LedgerError::Rejected(format!(
                "init: app underfunded ({funded})"
            )));
        }
        app.treasury = Some(Address(treasury_bytes));
        Ok(Vec::new())
    }

    fn deposit(
        state: &mut LedgerState,
        app_id: u64,
        app_args: &[Vec<u8>],
        signed: &SignedTransaction,
        group: &[SignedTransaction],
        position: usize,
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        let (proof, public_inputs) = decode_proof_args(app_args)?;
        let verifier = constant_address(Self::app_ref(state, app_id)?, "DEPOSIT_VERIFIER_ADDRESS")?;
        if signed.txn.sender != verifier {
            return Err(LedgerError::Rejected(
                "deposit: caller is not the deposit verifier".into(),
            ));
        }
        Self::run_verifier_program(state, signed, &proof, &public_inputs)?;

        let [amount_bytes, commitment] = public_inputs.as_slice() else {
            return Err(LedgerError::Rejected(
                "deposit: expected 2 public inputs".into(),
            ));
        };
        let amount = amount_from_bytes32(amount_bytes);
        let app = Self::app_ref(state, app_id)?;
        let minimum = app
            .constants
            .get("DEPOSIT_MINIMUM_AMOUNT")
            .and_then(|v| v.replace('_', "").parse().ok())
            .unwrap_or(1_000_000u64);
        if amount < minimum {
            return Err(LedgerError::Rejected(format!(
                "deposit: amount {amount} below minimum {minimum}"
            )));
        }

        // the contract requires the funding payment right after the call
        let app_address = Address::from_app_id(app_id);
        let paid = group.get(position + 1).and_then(|s| match &s.txn.body {
            TransactionBody::Payment { receiver, amount } if *receiver == app_address => {
                Some(*amount)
            }
            _ => None,
        });
        if paid != Some(amount) {
            return Err(LedgerError::Rejected(
                "deposit: funding payment missing or mismatched".into(),
            ));
        }

        let app = Self::app_mut(state, app_id)?;
        let index = app
            .accumulator
            .append(fr_from_bytes32(commitment))
            .map_err(|e| LedgerError::Rejected(format!("deposit: {e}")))?;
        let root = fr_to_bytes32(&app.accumulator.current_root());
        app.global.insert(b"root".to_vec(), root.to_vec());

        Ok(vec![encode_index_and_root(index as u64, &root)])
    }

    fn withdraw(
        state: &mut LedgerState,
        app_id: u64,
        app_args: &[Vec<u8>],
        signed: &SignedTransaction,
    ) -> Result<Vec<Vec<u8>>, LedgerError> {
        let (proof, public_inputs) = decode_proof_args(app_args)?;
        let verifier =
            constant_address(Self::app_ref(state, app_id)?, "WITHDRAWAL_VERIFIER_ADDRESS")?;
        if signed.txn.sender != verifier {
            return Err(LedgerError::Rejected(
                "withdraw: caller is not the withdrawal verifier".into(),
            ));
        }
        Self::run_verifier_program(state, signed, &proof, &public_inputs)?;

        if public_inputs.len() != 9 {
            return Err(LedgerError::Rejected(
                "withdraw: expected 9 public inputs".into(),
            ));
        }
        let withdrawal_amount = amount_from_bytes32(&public_inputs[1]);
        let fee = amount_from_bytes32(&public_inputs[2]);
        let nullifier = public_inputs[3];
        let root = fr_from_bytes32(&public_inputs[4]);
        let unspent_commitment = fr_from_bytes32(&public_inputs[5]);

        let recipient: [u8; 32] = app_args
            .get(3)
            .and_then(|a| a.as_slice().try_into().ok())
            .ok_or_else(|| LedgerError::Rejected("withdraw: missing recipient".into()))?;
        let fee_recipient: [u8; 32] = app_args
            .get(4)
            .and_then(|a| a.as_slice().try_into().ok())
            .ok_or_else(|| LedgerError::Rejected("withdraw: missing fee recipient".into()))?;
        let no_change = app_args.get(5).map(|a| a.as_slice() == [0x80]).unwrap_or(false);

        // the ABI recipient, reduced into the field, must match the proof's
        // committed withdrawal address
        let recipient_mod = fr_to_bytes32(&fr_from_bytes32(&recipient));
        if recipient_mod != public_inputs[0] {
            return Err(LedgerError::Rejected(
                "withdraw: recipient address mod does not match".into(),
            ));
        }

        if fee < NULLIFIER_MBR {
            return Err(LedgerError::Rejected(format!(
                "withdraw: fee {fee} below nullifier MBR {NULLIFIER_MBR}"
            )));
        }
        let app = Self::app_ref(state, app_id)?;
        if app.nullifiers.contains(&nullifier) {
            return Err(LedgerError::Rejected("withdraw: nullifier already spent".into()));
        }
        if !app.accumulator.contains_root(&root) {
            return Err(LedgerError::Rejected("withdraw: unknown root".into()));
        }

        // pay out: the withdrawal to the recipient, the fee minus the
        // nullifier box MBR to the fee recipient
        let app_address = Address::from_app_id(app_id);
        Self::debit(state, &app_address, withdrawal_amount + (fee - NULLIFIER_MBR))?;
        *state.balances.entry(Address(recipient)).or_insert(0) += withdrawal_amount;
        *state.balances.entry(Address(fee_recipient)).or_insert(0) += fee - NULLIFIER_MBR;

        let app = Self::app_mut(state, app_id)?;
        app.nullifiers.insert(nullifier);
        let (index, root) = if no_change {
            (0, fr_to_bytes32(&app.accumulator.current_root()))
        } else {
            let index = app
                .accumulator
                .append(unspent_commitment)
                .map_err(|e| LedgerError::Rejected(format!("withdraw: {e}")))?;
            (index as u64, fr_to_bytes32(&app.accumulator.current_root()))
        };
        app.global.insert(b"root".to_vec(), root.to_vec());

        Ok(vec![encode_index_and_root(index, &root)])
    }

    /// The verifier logic signature's side: deserialize the templated
    /// verifying key and check the Groth16 proof against the public inputs.
    fn run_verifier_program(
        state: &LedgerState,
        signed: &SignedTransaction,
        proof: &[u8],
        public_inputs: &[[u8; 32]],
    ) -> Result<(), LedgerError> {
        let TxnSignature::LogicSig(program) = &signed.signature else {
            return Err(LedgerError::Rejected(
                "verifier call must be logic-signature signed".into(),
            ));
        };
        let constants = state.programs.get(program).cloned().unwrap_or_default();
        let Some(vk_hex) = constants.get("VERIFYING_KEY") else {
            // a program without a templated key verifies nothing
            return Ok(());
        };

        let vk_bytes = hex::decode(vk_hex)
            .map_err(|_| LedgerError::Rejected("verifier: malformed verifying key".into()))?;
        let vk = VerifyingKey::<Bn254>::deserialize_compressed(vk_bytes.as_slice())
            .map_err(|_| LedgerError::Rejected("verifier: invalid verifying key".into()))?;
        let proof = Proof::<Bn254>::deserialize_compressed(proof)
            .map_err(|_| LedgerError::Rejected("verifier: malformed proof".into()))?;
        let inputs: Vec<Fr> = public_inputs.iter().map(fr_from_bytes32).collect();

        let accepted = Groth16::<Bn254>::verify(&vk, &inputs, &proof)
            .map_err(|e| LedgerError::Rejected(format!("verifier: {e}")))?;
        if !accepted {
            return Err(LedgerError::Rejected("logic signature rejected proof".into()));
        }
        Ok(())
    }

    fn app_ref(state: &LedgerState, app_id: u64) -> Result<&AppState, LedgerError> {
        state
            .apps
            .get(&app_id)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown application {app_id}")))
    }

    fn app_mut(state: &mut LedgerState, app_id: u64) -> Result<&mut AppState, LedgerError> {
        state
            .apps
            .get_mut(&app_id)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown application {app_id}")))
    }

    /// Budget accounting mirrored from the contract's op-up constants.
    fn budget(group: &[SignedTransaction]) -> (u64, u64) {
        let added = LSIG_BUDGET_PER_TXN * group.len() as u64;
        let mut consumed = 0;
        for signed in group {
            if let TransactionBody::AppCall { app_args, .. } = &signed.txn.body {
                if let Some(sel) = app_args.first() {
                    if sel.as_slice() == selector(DEPOSIT_SELECTOR_SIG) {
                        consumed += VERIFIER_COST + DEPOSIT_OPCODE_BUDGET_OPUP;
                    } else if sel.as_slice() == selector(WITHDRAW_SELECTOR_SIG) {
                        consumed += VERIFIER_COST + WITHDRAWAL_OPCODE_BUDGET_OPUP;
                    }
                }
            }
        }
        (consumed, added)
    }
}

impl Default for DevLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerClient for DevLedger {
    async fn suggested_params(&self) -> Result<SuggestedParams, LedgerError> {
        let state = self.state.lock().await;
        Ok(SuggestedParams {
            fee: 1_000,
            min_fee: 1_000,
            flat_fee: false,
            first_valid: state.round,
            last_valid: state.round + 1_000,
        })
    }

    async fn compile_program(&self, source: &str) -> Result<Vec<u8>, LedgerError> {
        if source.trim().is_empty() {
            return Err(LedgerError::Compile("empty program source".into()));
        }
        let mut bytecode = vec![0x0a];
        bytecode.extend_from_slice(&Sha512_256::digest(source.as_bytes()));

        let constants = parse_program_constants(source);
        self.state
            .lock()
            .await
            .programs
            .insert(bytecode.clone(), constants);
        Ok(bytecode)
    }

    async fn simulate(&self, group: &[SignedTransaction]) -> Result<SimulateResult, LedgerError> {
        let state = self.state.lock().await;
        let mut scratch = state.clone();
        let failure = Self::execute(&mut scratch, group).err().map(|e| e.to_string());
        let (consumed, added) = Self::budget(group);
        Ok(SimulateResult {
            app_budget_consumed: consumed,
            app_budget_added: added,
            failure,
        })
    }

    async fn submit(&self, group: Vec<SignedTransaction>) -> Result<String, LedgerError> {
        let mut state = self.state.lock().await;
        let info = Self::execute(&mut state, &group)?;
        let first_txid = info.txids[0].clone();
        state.pending.insert(first_txid.clone(), info);
        Ok(first_txid)
    }

    async fn wait_for_confirmation(
        &self,
        txid: &str,
        _wait_rounds: u64,
    ) -> Result<PendingInfo, LedgerError> {
        self.state
            .lock()
            .await
            .pending
            .get(txid)
            .cloned()
            .ok_or_else(|| LedgerError::ConfirmationTimeout(txid.to_string()))
    }

    async fn account_information(&self, address: &Address) -> Result<AccountInfo, LedgerError> {
        let state = self.state.lock().await;
        let amount = *state.balances.get(address).unwrap_or(&0);
        let min_balance = state
            .apps
            .iter()
            .find(|(id, _)| Address::from_app_id(**id) == *address)
            .map(|(_, app)| Self::app_min_balance(app))
            .unwrap_or(100_000);
        Ok(AccountInfo {
            amount,
            min_balance,
        })
    }

    async fn application_info(&self, app_id: u64) -> Result<ApplicationInfo, LedgerError> {
        let state = self.state.lock().await;
        let app = Self::app_ref(&state, app_id)?;
        Ok(ApplicationInfo {
            global_state: app.global.clone(),
        })
    }
}

/// Extract `NAME = value` constants from a program source. Quoted strings
/// lose their quotes; everything else is kept verbatim.
fn parse_program_constants(source: &str) -> ProgramConstants {
    let mut constants = HashMap::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            continue;
        }
        let value = value
            .trim()
            .split('#')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches('"')
            .to_string();
        constants.insert(name.to_string(), value);
    }
    constants
}

fn constant_address(app: &AppState, name: &str) -> Result<Address, LedgerError> {
    let hex_value = app
        .constants
        .get(name)
        .ok_or_else(|| LedgerError::Rejected(format!("approval program missing {name}")))?;
    let bytes: [u8; 32] = hex::decode(hex_value)
        .ok()
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| LedgerError::Rejected(format!("malformed {name}")))?;
    Ok(Address(bytes))
}

/// Decode the leading `(byte[], byte[32][])` proof arguments of a verifier
/// method call.
fn decode_proof_args(app_args: &[Vec<u8>]) -> Result<(Vec<u8>, Vec<[u8; 32]>), LedgerError> {
    let proof_arg = app_args
        .get(1)
        .ok_or_else(|| LedgerError::Rejected("missing proof argument".into()))?;
    if proof_arg.len() < 2 {
        return Err(LedgerError::Rejected("malformed proof argument".into()));
    }
    let proof = proof_arg[2..].to_vec();

    let inputs_arg = app_args
        .get(2)
        .ok_or_else(|| LedgerError::Rejected("missing public inputs argument".into()))?;
    if inputs_arg.len() < 2 || (inputs_arg.len() - 2) % 32 != 0 {
        return Err(LedgerError::Rejected("malformed public inputs".into()));
    }
    let inputs = inputs_arg[2..]
        .chunks(32)
        .map(|chunk| chunk.try_into().expect("32-byte chunk"))
        .collect();
    Ok((proof, inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::txn::Transaction;

    #[tokio::test]
    async fn test_compile_parses_constants() {
        let ledger = DevLedger::new();
        let source = "TREE_DEPTH = 32\nINITIAL_ROOT = \"abcd\"\n# COMMENT = 1\nfoo = 2\n";
        let bytecode = ledger.compile_program(source).await.unwrap();

        let state = ledger.state.lock().await;
        let constants = state.programs.get(&bytecode).unwrap();
        assert_eq!(constants.get("TREE_DEPTH").unwrap(), "32");
        assert_eq!(constants.get("INITIAL_ROOT").unwrap(), "abcd");
        assert!(!constants.contains_key("COMMENT"));
        assert!(!constants.contains_key("foo"));
    }

    #[tokio::test]
    async fn test_fund_and_balance() {
        let ledger = DevLedger::new();
        let account = Account::random();
        ledger.fund(account.address, 5_000_000).await;
        assert_eq!(ledger.balance(&account.address).await, 5_000_000);
    }

    #[tokio::test]
    async fn test_payment_moves_funds_and_fee() {
        let ledger = DevLedger::new();
        let sender = Arc::new(Account::random());
        let receiver = Account::random();
        ledger.fund(sender.address, 1_000_000).await;

        let params = ledger.suggested_params().await.unwrap();
        let txn = Transaction::payment(
            &params.with_flat_fee(8_000),
            sender.address,
            receiver.address,
            500_000,
        );
        let txid = ledger.submit(vec![sender.sign(txn)]).await.unwrap();
        ledger.wait_for_confirmation(&txid, 4).await.unwrap();

        assert_eq!(ledger.balance(&receiver.address).await, 500_000);
        assert_eq!(ledger.balance(&sender.address).await, 1_000_000 - 500_000 - 8_000);
    }

    #[tokio::test]
    async fn test_group_fee_floor() {
        let ledger = DevLedger::new();
        let sender = Arc::new(Account::random());
        ledger.fund(sender.address, 1_000_000).await;

        let params = ledger.suggested_params().await.unwrap();
        let txn = Transaction::payment(
            &params.with_flat_fee(0),
            sender.address,
            Account::random().address,
            1,
        );
        let result = ledger.submit(vec![sender.sign(txn)]).await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
    }
}
