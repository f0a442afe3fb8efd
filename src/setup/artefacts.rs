//! Artefact file layout, freshness checks and the textual templating the
//! deploy pipeline runs over the on-chain sources.

use std::path::{
    Path,
    PathBuf,
};

use ark_bn254::Fr;
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use thiserror::Error;

use crate::{
    crypto::field::fr_to_bytes32,
    setup::network::Network,
};

pub const APP_NAME: &str = "APP";
pub const TSS_NAME: &str = "TSS";
pub const DEPOSIT_VERIFIER_NAME: &str = "DepositVerifier";
pub const WITHDRAWAL_VERIFIER_NAME: &str = "WithdrawalVerifier";

#[derive(Debug, Error)]
pub enum ArtefactError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("json error on {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("marker {0} not found in source")]
    MarkerNotFound(String),
}

fn io_err(path: &Path, source: std::io::Error) -> ArtefactError {
    ArtefactError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Deployed application record (`App.json`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    pub id: u64,
    pub creation_block: u64,
}

/// Every path the pipeline reads or writes, rooted at the repository.
#[derive(Debug, Clone)]
pub struct ArtefactPaths {
    pub contracts_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub deployed_dir: PathBuf,
}

impl ArtefactPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            contracts_dir: root.join("contracts"),
            generated_dir: root.join("generated"),
            deployed_dir: root.join("deployed"),
        }
    }

    pub fn approval_source(&self) -> PathBuf {
        self.contracts_dir.join(format!("{APP_NAME}.py"))
    }

    pub fn clear_source(&self) -> PathBuf {
        self.contracts_dir.join(format!("{APP_NAME}.clear.py"))
    }

    pub fn tss_source(&self) -> PathBuf {
        self.contracts_dir.join(format!("{TSS_NAME}.py"))
    }

    pub fn schema_source(&self) -> PathBuf {
        self.contracts_dir.join(format!("{APP_NAME}.arc32.json"))
    }

    pub fn templated_approval(&self) -> PathBuf {
        self.generated_dir.join(format!("{APP_NAME}.approval.py"))
    }

    pub fn templated_clear(&self) -> PathBuf {
        self.generated_dir.join(format!("{APP_NAME}.clear.py"))
    }

    pub fn templated_tss(&self) -> PathBuf {
        self.generated_dir.join(format!("{TSS_NAME}.py"))
    }

    pub fn schema(&self) -> PathBuf {
        self.generated_dir.join(format!("{APP_NAME}.arc32.json"))
    }

    pub fn app_json(&self) -> PathBuf {
        self.generated_dir.join("App.json")
    }

    pub fn tree_config_json(&self) -> PathBuf {
        self.generated_dir.join("TreeConfig.json")
    }

    pub fn verifier_source(&self, name: &str) -> PathBuf {
        self.generated_dir.join(format!("{name}.py"))
    }

    pub fn bytecode(&self, name: &str) -> PathBuf {
        self.generated_dir.join(format!("{name}.tok"))
    }

    pub fn compiled_circuit(&self, name: &str) -> PathBuf {
        self.generated_dir.join(format!("Compiled{name}Circuit.bin"))
    }

    pub fn network_dir(&self, network: Network) -> PathBuf {
        self.deployed_dir.join(network.as_str())
    }

    /// The files a frontend needs, copied per network by the export step.
    pub fn export_set(&self) -> Vec<PathBuf> {
        vec![
            self.app_json(),
            self.schema(),
            self.tree_config_json(),
            self.bytecode(TSS_NAME),
            self.bytecode(DEPOSIT_VERIFIER_NAME),
            self.bytecode(WITHDRAWAL_VERIFIER_NAME),
            self.compiled_circuit("Deposit"),
            self.compiled_circuit("Withdrawal"),
        ]
    }
}

/// Whether a target must be rebuilt: missing, or older than any source.
pub fn should_recompile(target: &Path, sources: &[&Path]) -> bool {
    let Ok(target_meta) = std::fs::metadata(target) else {
        return true;
    };
    let Ok(target_mtime) = target_meta.modified() else {
        return true;
    };
    sources.iter().any(|source| {
        std::fs::metadata(source)
            .and_then(|m| m.modified())
            .map(|mtime| mtime > target_mtime)
            .unwrap_or(true)
    })
}

pub fn encode_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtefactError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtefactError::Json {
        path: path.display().to_string(),
        source,
    })?;
    std::fs::write(path, json).map_err(|e| io_err(path, e))
}

pub fn decode_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ArtefactError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&content).map_err(|source| ArtefactError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn copy_file(from: &Path, to: &Path) -> Result<(), ArtefactError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::copy(from, to).map_err(|e| io_err(from, e))?;
    Ok(())
}

/// Replace every occurrence of each placeholder in a file.
pub fn replace_in_file(path: &Path, substitutions: &[(&str, String)]) -> Result<(), ArtefactError> {
    let mut content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    for (placeholder, value) in substitutions {
        content = content.replace(placeholder, value);
    }
    std::fs::write(path, content).map_err(|e| io_err(path, e))
}

/// Rewrite `NAME = value` lines, preserving any trailing comment.
pub fn change_values_in_file(
    path: &Path,
    changes: &[(&str, String)],
) -> Result<(), ArtefactError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    for (name, value) in changes {
        let prefix = format!("{name} = ");
        let line = lines
            .iter_mut()
            .find(|l| l.starts_with(&prefix))
            .ok_or_else(|| ArtefactError::MarkerNotFound((*name).to_string()))?;
        let comment = line
            .split_once('#')
            .map(|(_, c)| format!("  # {}", c.trim()))
            .unwrap_or_default();
        *line = format!("{prefix}{value}{comment}");
    }

    std::fs::write(path, lines.join("\n") + "\n").map_err(|e| io_err(path, e))
}

/// Replace the body of the `ZERO_HASHES = (` … `)` block with the hex
/// constants of the given hashes, one string literal per line.
pub fn update_zero_hashes_in_file(path: &Path, hashes: &[Fr]) -> Result<(), ArtefactError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let lines: Vec<&str> = content.lines().collect();

    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with("ZERO_HASHES = ("))
        .ok_or_else(|| ArtefactError::MarkerNotFound("ZERO_HASHES".into()))?;
    let end = lines[start..]
        .iter()
        .position(|l| l.trim() == ")")
        .map(|offset| start + offset)
        .ok_or_else(|| ArtefactError::MarkerNotFound("ZERO_HASHES closing paren".into()))?;

    let mut out: Vec<String> = lines[..=start].iter().map(|s| s.to_string()).collect();
    for (i, hash) in hashes.iter().enumerate() {
        let hex = hex::encode(fr_to_bytes32(hash));
        if i == 0 {
            out.push(format!("    \"{hex}\""));
        } else {
            out.push(format!("    + \"{hex}\""));
        }
    }
    out.extend(lines[end..].iter().map(|s| s.to_string()));

    std::fs::write(path, out.join("\n") + "\n").map_err(|e| io_err(path, e))
}

/// Format a number with underscores every three digits, matching the style
/// of the contract sources.
pub fn format_with_underscores(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        out.push(c);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push('_');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::poseidon::field_hash;

    #[test]
    fn test_format_with_underscores() {
        assert_eq!(format_with_underscores(1), "1");
        assert_eq!(format_with_underscores(1_000), "1_000");
        assert_eq!(format_with_underscores(4_294_967_296), "4_294_967_296");
        assert_eq!(format_with_underscores(100), "100");
    }

    #[test]
    fn test_change_values_preserves_comment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.py");
        std::fs::write(&path, "TREE_DEPTH = 8  # levels\nOTHER = 1\n").unwrap();

        change_values_in_file(&path, &[("TREE_DEPTH", "32".into())]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("TREE_DEPTH = 32  # levels"));
        assert!(content.contains("OTHER = 1"));
    }

    #[test]
    fn test_change_values_unknown_name_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.py");
        std::fs::write(&path, "A = 1\n").unwrap();
        assert!(change_values_in_file(&path, &[("B", "2".into())]).is_err());
    }

    #[test]
    fn test_zero_hashes_block_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.py");
        std::fs::write(&path, "X = 1\nZERO_HASHES = (\n    \"00\"\n)\nY = 2\n").unwrap();

        let hashes = vec![field_hash(&[Fr::from(0u64)]), field_hash(&[Fr::from(1u64)])];
        update_zero_hashes_in_file(&path, &hashes).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(&hex::encode(fr_to_bytes32(&hashes[0]))));
        assert!(content.contains(&format!("+ \"{}\"", hex::encode(fr_to_bytes32(&hashes[1])))));
        assert!(content.starts_with("X = 1\n"));
        assert!(content.trim_end().ends_with("Y = 2"));
    }

    #[test]
    fn test_should_recompile_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        std::fs::write(&source, "x").unwrap();
        assert!(should_recompile(&dir.path().join("missing"), &[&source]));
    }
}
