//! One task's parallel sample arrays, validated once at construction and
//! immutable afterwards.

use molset_core::arena::StringArena;
use molset_core::identity::MolId;
use molset_core::types::Label;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{field} must be the same length as labels: expected {expected}, got {got}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Holds one task's rows: labels plus whichever optional parallel arrays the
/// featurization stage supplied. All provided arrays have identical length.
///
/// Raw inputs are kept in a [`StringArena`], so handing a clone of the store
/// to every worker shares one backing buffer instead of duplicating the
/// string array per worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleTaskStore<F> {
    labels: Vec<Label>,
    features: Option<Vec<F>>,
    smiles: Option<StringArena>,
    mol_ids: Option<Vec<MolId>>,
    weights: Option<Vec<f64>>,
    indices: Option<Vec<u64>>,
}

impl<F> SingleTaskStore<F> {
    pub fn builder(labels: Vec<Label>) -> SingleTaskStoreBuilder<F> {
        SingleTaskStoreBuilder {
            labels,
            features: None,
            smiles: None,
            mol_ids: None,
            weights: None,
            indices: None,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn features(&self) -> Option<&[F]> {
        self.features.as_deref()
    }

    pub fn smiles(&self) -> Option<&StringArena> {
        self.smiles.as_ref()
    }

    pub fn mol_ids(&self) -> Option<&[MolId]> {
        self.mol_ids.as_deref()
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn indices(&self) -> Option<&[u64]> {
        self.indices.as_deref()
    }

    /// Returns the row at `index`, exposing only the fields supplied at
    /// construction. Absence of a field means "not tracked", not null.
    pub fn get(&self, index: usize) -> Option<StoreRow<'_, F>> {
        let label = self.labels.get(index)?;
        Some(StoreRow {
            label,
            feature: self.features.as_ref().and_then(|f| f.get(index)),
            smiles: self.smiles.as_ref().and_then(|s| s.get(index)),
            mol_id: self.mol_ids.as_ref().and_then(|m| m.get(index)),
            weight: self.weights.as_ref().and_then(|w| w.get(index)).copied(),
            source_index: self.indices.as_ref().and_then(|i| i.get(index)).copied(),
        })
    }
}

/// Borrowed view of one store row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow<'a, F> {
    pub label: &'a Label,
    pub feature: Option<&'a F>,
    pub smiles: Option<&'a str>,
    pub mol_id: Option<&'a MolId>,
    pub weight: Option<f64>,
    pub source_index: Option<u64>,
}

#[derive(Debug)]
pub struct SingleTaskStoreBuilder<F> {
    labels: Vec<Label>,
    features: Option<Vec<F>>,
    smiles: Option<Vec<String>>,
    mol_ids: Option<Vec<MolId>>,
    weights: Option<Vec<f64>>,
    indices: Option<Vec<u64>>,
}

impl<F> SingleTaskStoreBuilder<F> {
    pub fn features(mut self, features: Vec<F>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn smiles<I, S>(mut self, smiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.smiles = Some(smiles.into_iter().map(Into::into).collect());
        self
    }

    pub fn mol_ids(mut self, mol_ids: Vec<MolId>) -> Self {
        self.mol_ids = Some(mol_ids);
        self
    }

    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn indices(mut self, indices: Vec<u64>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Validates that every provided parallel array matches the label count,
    /// naming the offending pair on mismatch.
    pub fn build(self) -> Result<SingleTaskStore<F>, StoreError> {
        let expected = self.labels.len();
        check_len("features", expected, self.features.as_ref().map(Vec::len))?;
        check_len("smiles", expected, self.smiles.as_ref().map(Vec::len))?;
        check_len("mol_ids", expected, self.mol_ids.as_ref().map(Vec::len))?;
        check_len("weights", expected, self.weights.as_ref().map(Vec::len))?;
        check_len("indices", expected, self.indices.as_ref().map(Vec::len))?;

        Ok(SingleTaskStore {
            labels: self.labels,
            features: self.features,
            smiles: self
                .smiles
                .map(|smiles| smiles.iter().map(String::as_str).collect()),
            mol_ids: self.mol_ids,
            weights: self.weights,
            indices: self.indices,
        })
    }
}

fn check_len(field: &'static str, expected: usize, got: Option<usize>) -> Result<(), StoreError> {
    match got {
        Some(got) if got != expected => Err(StoreError::LengthMismatch {
            field,
            expected,
            got,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_fails_at_construction() {
        let labels: Vec<Label> = (0..5).map(|i| Label::Scalar(i as f64)).collect();
        let err = SingleTaskStore::builder(labels)
            .features(vec![(); 4])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::LengthMismatch {
                field: "features",
                expected: 5,
                got: 4,
            }
        );
    }

    #[test]
    fn rows_expose_only_supplied_fields() -> anyhow::Result<()> {
        let store: SingleTaskStore<()> =
            SingleTaskStore::builder(vec![Label::Scalar(0.0), Label::Scalar(1.0)])
                .smiles(["CCO", "OCC"])
                .weights(vec![1.0, 0.5])
                .build()?;

        let row = store.get(1).ok_or_else(|| anyhow::anyhow!("missing row"))?;
        assert_eq!(row.label, &Label::Scalar(1.0));
        assert_eq!(row.smiles, Some("OCC"));
        assert_eq!(row.weight, Some(0.5));
        assert_eq!(row.feature, None);
        assert_eq!(row.mol_id, None);
        assert_eq!(row.source_index, None);
        assert!(store.get(2).is_none());
        Ok(())
    }

    #[test]
    fn store_clone_shares_the_smiles_backing() -> anyhow::Result<()> {
        let store: SingleTaskStore<()> = SingleTaskStore::builder(vec![Label::Scalar(0.0)])
            .smiles(["CCO"])
            .build()?;
        let clone = store.clone();
        // Arena equality is cheap; pointer sharing is asserted in molset-core.
        assert_eq!(store.smiles(), clone.smiles());
        Ok(())
    }

    #[test]
    fn serde_roundtrip() -> anyhow::Result<()> {
        let store: SingleTaskStore<u32> = SingleTaskStore::builder(vec![
            Label::Vector(vec![0.0, 1.0]),
            Label::Vector(vec![2.0, 3.0]),
        ])
        .smiles(["CCO", "OCC"])
        .features(vec![7, 8])
        .build()?;

        let json = serde_json::to_string(&store)?;
        let back: SingleTaskStore<u32> = serde_json::from_str(&json)?;
        assert_eq!(back, store);
        Ok(())
    }
}
