//! ARC-32 application schema and ABI argument encoding.
//!
//! Method arguments are carried as a tagged variant so the composer can mix
//! byte arrays, integers, addresses and flags in one list; marshalling to
//! the wire follows the method selectors and types of the schema loaded
//! from the application's interface file.

use std::path::Path;

use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha512_256,
};
use thiserror::Error;

/// Log prefix marking an ABI method return value.
pub const RETURN_PREFIX: [u8; 4] = [0x15, 0x1f, 0x7c, 0x75];

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("method {0} not found in contract")]
    MethodNotFound(String),

    #[error("malformed method return value")]
    MalformedReturn,

    #[error("error reading schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("error decoding schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// A partial ARC-32 schema: state allocation plus the contract interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc32Schema {
    pub state: StateDecl,
    pub contract: Contract,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDecl {
    pub global: SchemaCounts,
    pub local: SchemaCounts,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchemaCounts {
    pub num_byte_slices: u64,
    pub num_uints: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub methods: Vec<Method>,
}

impl Contract {
    pub fn method(&self, name: &str) -> Result<&Method, AbiError> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| AbiError::MethodNotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    #[serde(default)]
    pub args: Vec<MethodArg>,
    pub returns: MethodReturns,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodArg {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodReturns {
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Method {
    /// The canonical method signature, e.g. `deposit(byte[],byte[32][],address)(uint64,byte[32])`.
    pub fn signature(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(|a| a.type_name.as_str()).collect();
        format!("{}({}){}", self.name, args.join(","), self.returns.type_name)
    }

    /// First four bytes of the signature hash.
    pub fn selector(&self) -> [u8; 4] {
        let digest = Sha512_256::digest(self.signature().as_bytes());
        [digest[0], digest[1], digest[2], digest[3]]
    }
}

impl Arc32Schema {
    pub fn from_file(path: &Path) -> Result<Self, AbiError> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// A method argument: the tagged variant the composer carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiArg {
    /// Dynamic byte array (`byte[]`).
    Bytes(Vec<u8>),
    /// Dynamic array of 32-byte blobs (`byte[32][]`).
    Bytes32Array(Vec<[u8; 32]>),
    /// `uint64`.
    Uint64(u64),
    /// `address`.
    Address([u8; 32]),
    /// `bool`.
    Bool(bool),
}

impl AbiArg {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => {
                let mut out = Vec::with_capacity(2 + bytes.len());
                out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                out.extend_from_slice(bytes);
                out
            }
            Self::Bytes32Array(items) => {
                let mut out = Vec::with_capacity(2 + 32 * items.len());
                out.extend_from_slice(&(items.len() as u16).to_be_bytes());
                for item in items {
                    out.extend_from_slice(item);
                }
                out
            }
            Self::Uint64(value) => value.to_be_bytes().to_vec(),
            Self::Address(bytes) => bytes.to_vec(),
            Self::Bool(value) => vec![if *value { 0x80 } else { 0x00 }],
        }
    }
}

/// The application arguments of a method call: selector first, then each
/// encoded argument.
pub fn method_call_args(method: &Method, args: &[AbiArg]) -> Vec<Vec<u8>> {
    let mut out = Vec::with_capacity(1 + args.len());
    out.push(method.selector().to_vec());
    out.extend(args.iter().map(AbiArg::encode));
    out
}

/// Find the method return payload among a transaction's logs.
pub fn parse_method_return(logs: &[Vec<u8>]) -> Option<&[u8]> {
    logs.iter()
        .rev()
        .find(|log| log.starts_with(&RETURN_PREFIX))
        .map(|log| &log[RETURN_PREFIX.len()..])
}

/// Decode a `(uint64,byte[32])` return: the leaf index and post-insertion
/// root returned by `deposit` and `withdraw`.
pub fn decode_index_and_root(payload: &[u8]) -> Result<(u64, [u8; 32]), AbiError> {
    if payload.len() != 40 {
        return Err(AbiError::MalformedReturn);
    }
    let index = u64::from_be_bytes(payload[..8].try_into().expect("8-byte slice"));
    let root: [u8; 32] = payload[8..].try_into().expect("32-byte slice");
    Ok((index, root))
}

/// Encode a `(uint64,byte[32])` return payload, with the log prefix.
pub fn encode_index_and_root(index: u64, root: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 40);
    out.extend_from_slice(&RETURN_PREFIX);
    out.extend_from_slice(&index.to_be_bytes());
    out.extend_from_slice(root);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_method() -> Method {
        Method {
            name: "noop".into(),
            args: vec![MethodArg {
                type_name: "uint64".into(),
                name: None,
            }],
            returns: MethodReturns {
                type_name: "void".into(),
            },
        }
    }

    #[test]
    fn test_method_signature() {
        assert_eq!(noop_method().signature(), "noop(uint64)void");
    }

    #[test]
    fn test_selector_is_stable() {
        let method = noop_method();
        assert_eq!(method.selector(), method.selector());
    }

    #[test]
    fn test_encode_bytes_prefixes_length() {
        let encoded = AbiArg::Bytes(vec![0xAA; 3]).encode();
        assert_eq!(encoded, vec![0, 3, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn test_encode_bytes32_array() {
        let encoded = AbiArg::Bytes32Array(vec![[1u8; 32], [2u8; 32]]).encode();
        assert_eq!(encoded.len(), 2 + 64);
        assert_eq!(&encoded[..2], &[0, 2]);
    }

    #[test]
    fn test_return_value_roundtrip() {
        let root = [9u8; 32];
        let logs = vec![vec![1, 2, 3], encode_index_and_root(7, &root)];
        let payload = parse_method_return(&logs).unwrap();
        assert_eq!(decode_index_and_root(payload).unwrap(), (7, root));
    }
}
