//! Deterministic duplicate dataset built from a single base record, for
//! testing and benchmarking without a real corpus.

use std::collections::BTreeMap;

use molset_core::types::{LabelShape, TaskName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::CompositeRecord;
use crate::merge::{MergeConfig, MergeError, Merger, TaskStores};

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("base merge produced no entities to replicate")]
    EmptyBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Replication<F> {
    /// One stored record; every index aliases it.
    Shared(CompositeRecord<F>),
    /// Eagerly deep-copied records, one per index.
    Owned(Vec<CompositeRecord<F>>),
}

/// A collection of `num_records` copies of one merged base record.
///
/// In shared mode every index resolves to the same underlying record, so
/// mutation through any index is visible through all others and the memory
/// footprint stays constant in `num_records`. In owned mode the base record
/// is deep-copied up front and every index owns its copy independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDataset<F> {
    records: Replication<F>,
    num_records: usize,
    label_shapes: BTreeMap<TaskName, LabelShape>,
    about: String,
}

impl<F: Clone> SyntheticDataset<F> {
    /// Merges `tasks` once, keeps only the first resulting entity as the
    /// base record, and replicates it `num_records` times.
    pub fn build(
        tasks: &TaskStores<F>,
        cfg: MergeConfig,
        num_records: usize,
        share_single_record: bool,
    ) -> Result<Self, SyntheticError> {
        let merger = Merger::new(cfg).map_err(MergeError::from)?;
        let merged = merger.merge(tasks)?;
        let base = merged.get(0).ok_or(SyntheticError::EmptyBase)?;

        let records = if share_single_record {
            Replication::Shared(base)
        } else {
            Replication::Owned(vec![base; num_records])
        };

        tracing::info!(
            target: "molset",
            event = "synthetic_built",
            records = num_records as u64,
            shared = share_single_record,
            "replicated base record"
        );

        Ok(Self {
            records,
            num_records,
            label_shapes: merged.label_shapes().clone(),
            about: merged.about().to_string(),
        })
    }

    /// Always exactly the configured record count, independent of how many
    /// distinct entities existed upstream.
    pub fn len(&self) -> usize {
        self.num_records
    }

    pub fn is_empty(&self) -> bool {
        self.num_records == 0
    }

    pub fn get(&self, index: usize) -> Option<&CompositeRecord<F>> {
        if index >= self.num_records {
            return None;
        }
        match &self.records {
            Replication::Shared(record) => Some(record),
            Replication::Owned(records) => records.get(index),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CompositeRecord<F>> {
        if index >= self.num_records {
            return None;
        }
        match &mut self.records {
            Replication::Shared(record) => Some(record),
            Replication::Owned(records) => records.get_mut(index),
        }
    }

    pub fn label_shapes(&self) -> &BTreeMap<TaskName, LabelShape> {
        &self.label_shapes
    }

    pub fn about(&self) -> &str {
        &self.about
    }
}
