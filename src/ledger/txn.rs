//! Ledger transaction model: addresses, transactions, signers.
//!
//! Only the parts of the outer ledger the composer needs are modeled; the
//! wire encoding of the remote RPC protocol lives behind the
//! `ports::ledger` trait.

use std::{
    fmt,
    sync::Arc,
};

use ed25519_dalek::{
    Signer as _,
    SigningKey,
    Verifier as _,
    VerifyingKey,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha512_256,
};

/// A 32-byte ledger address: an ed25519 public key, an application escrow
/// or a logic-signature program hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    /// The escrow address of an application.
    pub fn from_app_id(app_id: u64) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(b"appID");
        hasher.update(app_id.to_be_bytes());
        Self(hasher.finalize().into())
    }

    /// The address of a logic-signature program.
    pub fn from_program(bytecode: &[u8]) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(b"Program");
        hasher.update(bytecode);
        Self(hasher.finalize().into())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Suggested transaction parameters read from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedParams {
    pub fee: u64,
    pub min_fee: u64,
    pub flat_fee: bool,
    pub first_valid: u64,
    pub last_valid: u64,
}

impl SuggestedParams {
    /// A copy with a flat fee, preventing dynamic re-estimation.
    pub fn with_flat_fee(&self, fee: u64) -> Self {
        Self {
            fee,
            flat_fee: true,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnComplete {
    NoOp,
    DeleteApplication,
}

/// A box referenced by an application call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRef {
    pub app_id: u64,
    pub name: Vec<u8>,
}

/// Global/local state allocation of an application.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateSchema {
    pub num_uints: u64,
    pub num_byte_slices: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransactionBody {
    Payment {
        receiver: Address,
        amount: u64,
    },
    AppCall {
        /// Zero for application creation.
        app_id: u64,
        on_complete: OnComplete,
        app_args: Vec<Vec<u8>>,
        boxes: Vec<BoxRef>,
        foreign_accounts: Vec<Address>,
        approval_program: Option<Vec<u8>>,
        clear_program: Option<Vec<u8>>,
        global_schema: StateSchema,
        extra_pages: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub fee: u64,
    pub flat_fee: bool,
    pub first_valid: u64,
    pub last_valid: u64,
    pub note: Vec<u8>,
    pub body: TransactionBody,
}

impl Transaction {
    pub fn payment(
        params: &SuggestedParams,
        sender: Address,
        receiver: Address,
        amount: u64,
    ) -> Self {
        Self {
            sender,
            fee: params.fee,
            flat_fee: params.flat_fee,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            note: Vec::new(),
            body: TransactionBody::Payment { receiver, amount },
        }
    }

    pub fn app_call(
        params: &SuggestedParams,
        sender: Address,
        app_id: u64,
        app_args: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            sender,
            fee: params.fee,
            flat_fee: params.flat_fee,
            first_valid: params.first_valid,
            last_valid: params.last_valid,
            note: Vec::new(),
            body: TransactionBody::AppCall {
                app_id,
                on_complete: OnComplete::NoOp,
                app_args,
                boxes: Vec::new(),
                foreign_accounts: Vec::new(),
                approval_program: None,
                clear_program: None,
                global_schema: StateSchema::default(),
                extra_pages: 0,
            },
        }
    }

    pub fn with_boxes(mut self, boxes: Vec<BoxRef>) -> Self {
        if let TransactionBody::AppCall { boxes: b, .. } = &mut self.body {
            *b = boxes;
        }
        self
    }

    pub fn with_foreign_accounts(mut self, accounts: Vec<Address>) -> Self {
        if let TransactionBody::AppCall {
            foreign_accounts, ..
        } = &mut self.body
        {
            *foreign_accounts = accounts;
        }
        self
    }

    /// Application creation: an app call with id 0 carrying the programs.
    pub fn app_create(
        params: &SuggestedParams,
        sender: Address,
        approval_program: Vec<u8>,
        clear_program: Vec<u8>,
        global_schema: StateSchema,
        app_args: Vec<Vec<u8>>,
    ) -> Self {
        let extra_pages =
            ((approval_program.len() + clear_program.len()) / 2048) as u32;
        let mut txn = Self::app_call(params, sender, 0, app_args);
        if let TransactionBody::AppCall {
            approval_program: ap,
            clear_program: cp,
            global_schema: gs,
            extra_pages: ep,
            ..
        } = &mut txn.body
        {
            *ap = Some(approval_program);
            *cp = Some(clear_program);
            *gs = global_schema;
            *ep = extra_pages;
        }
        txn
    }

    /// The domain-separated byte string covered by signatures.
    pub fn bytes_to_sign(&self) -> Vec<u8> {
        let mut bytes = b"TX".to_vec();
        bytes.extend_from_slice(
            &serde_json::to_vec(self).expect("transaction serialization is infallible"),
        );
        bytes
    }

    /// Transaction id: hash of the signable bytes.
    pub fn id(&self) -> String {
        hex::encode(Sha512_256::digest(self.bytes_to_sign()))
    }
}

/// An ordinary ledger account holding an ed25519 key.
pub struct Account {
    key: SigningKey,
    pub address: Address,
}

impl Account {
    pub fn random() -> Self {
        Self::from_seed(rand::random())
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        let key = SigningKey::from_bytes(&seed);
        let address = Address(key.verifying_key().to_bytes());
        Self { key, address }
    }

    pub fn sign(&self, txn: Transaction) -> SignedTransaction {
        let signature = self.key.sign(&txn.bytes_to_sign());
        SignedTransaction {
            txn,
            signature: TxnSignature::Ed25519(signature.to_bytes().to_vec()),
        }
    }
}

/// A logic-signature account: a compiled program standing in for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicSigAccount {
    pub program: Vec<u8>,
}

impl LogicSigAccount {
    pub fn new(program: Vec<u8>) -> Self {
        Self { program }
    }

    pub fn address(&self) -> Address {
        Address::from_program(&self.program)
    }
}

/// Signer assignment for a transaction inside a group.
#[derive(Clone)]
pub enum TxnSigner {
    Account(Arc<Account>),
    LogicSig(LogicSigAccount),
}

impl TxnSigner {
    pub fn address(&self) -> Address {
        match self {
            Self::Account(account) => account.address,
            Self::LogicSig(lsig) => lsig.address(),
        }
    }

    pub fn sign(&self, txn: Transaction) -> SignedTransaction {
        match self {
            Self::Account(account) => account.sign(txn),
            Self::LogicSig(lsig) => SignedTransaction {
                txn,
                signature: TxnSignature::LogicSig(lsig.program.clone()),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum TxnSignature {
    Ed25519(Vec<u8>),
    LogicSig(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub txn: Transaction,
    pub signature: TxnSignature,
}

impl SignedTransaction {
    /// Check the signature authorizes the sender: an ed25519 signature by
    /// the sender key, or a program hashing to the sender address.
    pub fn verify_authorization(&self) -> bool {
        match &self.signature {
            TxnSignature::Ed25519(sig_bytes) => {
                let Ok(key) = VerifyingKey::from_bytes(self.txn.sender.as_bytes()) else {
                    return false;
                };
                let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
                    return false;
                };
                let signature = ed25519_dalek::Signature::from_bytes(&sig_array);
                key.verify(&self.txn.bytes_to_sign(), &signature).is_ok()
            }
            TxnSignature::LogicSig(program) => {
                Address::from_program(program) == self.txn.sender
            }
        }
    }
}
