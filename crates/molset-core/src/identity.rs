//! Canonical molecular identity derived from raw SMILES text.
//!
//! The identity is content-derived: the raw input is normalized (surrounding
//! whitespace stripped, charset and bracket nesting checked) and the SHA-256
//! digest of the normalized bytes, in lowercase hex, becomes the [`MolId`].
//! Two raw strings collapse onto one identity exactly when they normalize to
//! the same bytes. Stores built by a featurization stage that already carries
//! a chemistry-aware canonical form may supply precomputed ids instead.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Canonical identity for one molecule, lowercase hex SHA-256 of the
/// normalized raw input. Sorted `MolId` order defines the final entity order
/// after a merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MolId(pub String);

impl MolId {
    /// Computes the canonical identity for one raw SMILES string.
    ///
    /// Pure and deterministic: equal inputs always produce equal ids.
    pub fn from_smiles(smiles: &str) -> Result<Self, IdentityError> {
        let normalized = normalize_smiles(smiles)?;
        let digest = Sha256::digest(normalized.as_bytes());
        Ok(MolId(hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("empty raw input")]
    Empty,
    #[error("illegal byte 0x{byte:02x} at position {at}")]
    IllegalByte { byte: u8, at: usize },
    #[error("unbalanced '{bracket}' at position {at}")]
    UnbalancedBracket { bracket: char, at: usize },
}

/// Strips surrounding ASCII whitespace and rejects inputs that cannot be a
/// SMILES string: empty after trimming, non-printable or non-ASCII bytes,
/// or unbalanced `()` / `[]` nesting.
fn normalize_smiles(raw: &str) -> Result<&str, IdentityError> {
    let s = raw.trim_matches(|c: char| c.is_ascii_whitespace());
    if s.is_empty() {
        return Err(IdentityError::Empty);
    }

    let mut parens: Vec<usize> = Vec::new();
    let mut brackets: Vec<usize> = Vec::new();
    for (at, byte) in s.bytes().enumerate() {
        if !byte.is_ascii_graphic() {
            return Err(IdentityError::IllegalByte { byte, at });
        }
        match byte {
            b'(' => parens.push(at),
            b'[' => brackets.push(at),
            b')' => {
                if parens.pop().is_none() {
                    return Err(IdentityError::UnbalancedBracket { bracket: ')', at });
                }
            }
            b']' => {
                if brackets.pop().is_none() {
                    return Err(IdentityError::UnbalancedBracket { bracket: ']', at });
                }
            }
            _ => {}
        }
    }
    if let Some(at) = parens.pop() {
        return Err(IdentityError::UnbalancedBracket { bracket: '(', at });
    }
    if let Some(at) = brackets.pop() {
        return Err(IdentityError::UnbalancedBracket { bracket: '[', at });
    }
    Ok(s)
}

/// Execution backend for the batch identity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// Resolve chunks on the calling thread.
    Serial,
    /// Resolve chunks on a rayon worker pool sized by `n_jobs`.
    #[default]
    Threads,
}

impl Backend {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        match input.trim() {
            "serial" => Ok(Backend::Serial),
            "threads" => Ok(Backend::Threads),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Configuration for [`batch_mol_ids`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Worker count for [`Backend::Threads`]; `-1` uses all available cores.
    pub n_jobs: i64,
    pub backend: Backend,
    /// Inputs per dispatched chunk; amortizes dispatch overhead.
    pub chunk_size: usize,
    /// Emit a structured event per completed chunk.
    pub progress: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            n_jobs: -1,
            backend: Backend::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: true,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        if self.n_jobs == 0 || self.n_jobs < -1 {
            return Err(ConfigError::InvalidJobs(self.n_jobs));
        }
        Ok(())
    }

    /// Thread count handed to the rayon pool builder; 0 means "pool default",
    /// which rayon resolves to all available cores.
    fn pool_threads(&self) -> usize {
        if self.n_jobs < 0 {
            0
        } else {
            usize::try_from(self.n_jobs).unwrap_or(0)
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown backend {0:?} (expected \"serial\" or \"threads\")")]
    UnknownBackend(String),
    #[error("chunk_size must be > 0")]
    InvalidChunkSize,
    #[error("n_jobs must be -1 (all cores) or >= 1, got {0}")]
    InvalidJobs(i64),
}

/// All per-input failures from one batch pass.
///
/// The batch policy is collect-and-report: the whole batch runs to
/// completion and every failing input is reported with its index, rather
/// than aborting on the first failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("identity resolution failed for {} of {total} inputs", .failures.len())]
pub struct BatchIdentityError {
    pub total: usize,
    /// `(input index, cause)` pairs in ascending input order.
    pub failures: Vec<(usize, IdentityError)>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Invalid(#[from] BatchIdentityError),
    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),
}

/// Resolves canonical ids for a whole input slice.
///
/// The computation is distributed over bounded chunks; output order matches
/// input order exactly regardless of backend, worker count, or chunk size.
pub fn batch_mol_ids<S>(inputs: &[S], cfg: &ResolverConfig) -> Result<Vec<MolId>, ResolveError>
where
    S: AsRef<str> + Sync,
{
    cfg.validate()?;

    let chunk_count = inputs.len().div_ceil(cfg.chunk_size);
    let done = AtomicUsize::new(0);
    let resolve_chunk = |chunk: &[S]| -> Vec<Result<MolId, IdentityError>> {
        let out = chunk
            .iter()
            .map(|s| MolId::from_smiles(s.as_ref()))
            .collect();
        if cfg.progress {
            let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(
                target: "molset",
                event = "identity_chunk_done",
                completed = completed as u64,
                chunks = chunk_count as u64,
                "resolved identity chunk"
            );
        }
        out
    };

    let per_chunk: Vec<Vec<Result<MolId, IdentityError>>> = match cfg.backend {
        Backend::Serial => inputs.chunks(cfg.chunk_size).map(resolve_chunk).collect(),
        Backend::Threads => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.pool_threads())
                .build()
                .map_err(|e| ResolveError::WorkerPool(e.to_string()))?;
            pool.install(|| {
                inputs
                    .par_chunks(cfg.chunk_size)
                    .map(resolve_chunk)
                    .collect()
            })
        }
    };

    let mut ids = Vec::with_capacity(inputs.len());
    let mut failures = Vec::new();
    for (index, result) in per_chunk.into_iter().flatten().enumerate() {
        match result {
            Ok(id) => ids.push(id),
            Err(err) => failures.push((index, err)),
        }
    }

    if failures.is_empty() {
        Ok(ids)
    } else {
        Err(BatchIdentityError {
            total: inputs.len(),
            failures,
        }
        .into())
    }
}
