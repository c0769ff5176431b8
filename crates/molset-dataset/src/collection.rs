use std::collections::BTreeMap;
use std::fmt;

use molset_core::arena::{GroupedStringArena, StringArena};
use molset_core::identity::MolId;
use molset_core::types::{Label, LabelShape, TaskName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structural size of an attached feature object, used only for diagnostics.
///
/// Implemented by the featurization stage's graph type; the engine never
/// looks inside features otherwise.
pub trait GraphStats {
    fn num_nodes(&self) -> usize;
    fn num_edges(&self) -> usize;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatsError {
    #[error("collection has no entities")]
    EmptyDataset,
    #[error("collection carries no features")]
    NoFeatures,
}

/// The unit returned by one index lookup: whichever of identity, raw-input
/// variants, sparse label map, and feature were retained by the merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRecord<F> {
    pub mol_id: Option<MolId>,
    pub smiles: Option<Vec<String>>,
    pub labels: BTreeMap<TaskName, Label>,
    pub feature: Option<F>,
}

/// The deduplicated, index-aligned result of one merge pass.
///
/// Immutable after construction; position `i` corresponds to the `i`-th
/// canonical identity in sorted order. Raw-input variants and identities are
/// backed by shared arenas, so cloning the collection for worker threads
/// does not duplicate the string payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCollection<F> {
    pub(crate) mol_ids: Option<StringArena>,
    pub(crate) smiles: Option<GroupedStringArena>,
    pub(crate) labels: Vec<BTreeMap<TaskName, Label>>,
    pub(crate) features: Option<Vec<Option<F>>>,
    pub(crate) label_shapes: BTreeMap<TaskName, LabelShape>,
    pub(crate) about: String,
}

impl<F> UnifiedCollection<F> {
    /// Number of deduplicated entities.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Free-text diagnostic label; no behavioral effect.
    pub fn about(&self) -> &str {
        &self.about
    }

    /// Label shape per task, inferred from the first entity carrying that
    /// task. Not validated against the rest of the collection.
    pub fn label_shapes(&self) -> &BTreeMap<TaskName, LabelShape> {
        &self.label_shapes
    }

    pub fn mol_id(&self, index: usize) -> Option<MolId> {
        self.mol_ids
            .as_ref()?
            .get(index)
            .map(|s| MolId(s.to_string()))
    }

    pub fn smiles_variants(&self, index: usize) -> Option<Vec<String>> {
        let group = self.smiles.as_ref()?.group(index)?;
        Some(group.map(str::to_string).collect())
    }

    pub fn task_labels(&self, index: usize) -> Option<&BTreeMap<TaskName, Label>> {
        self.labels.get(index)
    }

    pub fn feature(&self, index: usize) -> Option<&F> {
        self.features.as_ref()?.get(index)?.as_ref()
    }
}

impl<F: Clone> UnifiedCollection<F> {
    /// Assembles the composite record at `index`; `None` past the end.
    pub fn get(&self, index: usize) -> Option<CompositeRecord<F>> {
        let labels = self.labels.get(index)?;
        Some(CompositeRecord {
            mol_id: self.mol_id(index),
            smiles: self.smiles_variants(index),
            labels: labels.clone(),
            feature: self.feature(index).cloned(),
        })
    }
}

/// Aggregate of a per-entity structural measure (node or edge counts).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralStats {
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub std: f64,
}

impl<F: GraphStats> UnifiedCollection<F> {
    pub fn num_graphs_total(&self) -> usize {
        self.len()
    }

    /// Node-count statistics over the feature-bearing entities.
    pub fn node_stats(&self) -> Result<StructuralStats, StatsError> {
        self.stat_over(GraphStats::num_nodes)
    }

    /// Edge-count statistics over the feature-bearing entities.
    pub fn edge_stats(&self) -> Result<StructuralStats, StatsError> {
        self.stat_over(GraphStats::num_edges)
    }

    fn stat_over(&self, measure: impl Fn(&F) -> usize) -> Result<StructuralStats, StatsError> {
        if self.is_empty() {
            return Err(StatsError::EmptyDataset);
        }
        let features = self.features.as_ref().ok_or(StatsError::NoFeatures)?;
        let values: Vec<u64> = features
            .iter()
            .flatten()
            .map(|f| measure(f) as u64)
            .collect();
        let count = values.len();
        if count == 0 {
            return Err(StatsError::NoFeatures);
        }

        let total: u64 = values.iter().sum();
        let min = values.iter().copied().min().unwrap_or(0);
        let max = values.iter().copied().max().unwrap_or(0);
        let mean = total as f64 / count as f64;
        let var = values
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count as f64;

        Ok(StructuralStats {
            total,
            min,
            max,
            mean,
            std: var.sqrt(),
        })
    }
}

impl<F: GraphStats> fmt::Display for UnifiedCollection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-------------------")?;
        writeln!(f, "UnifiedCollection")?;
        writeln!(f, "\tabout = {}", self.about)?;
        writeln!(f, "\tnum_graphs_total = {}", self.num_graphs_total())?;
        if let (Ok(nodes), Ok(edges)) = (self.node_stats(), self.edge_stats()) {
            writeln!(f, "\tnum_nodes_total = {}", nodes.total)?;
            writeln!(f, "\tmax_num_nodes_per_graph = {}", nodes.max)?;
            writeln!(f, "\tmin_num_nodes_per_graph = {}", nodes.min)?;
            writeln!(f, "\tstd_num_nodes_per_graph = {}", nodes.std)?;
            writeln!(f, "\tmean_num_nodes_per_graph = {}", nodes.mean)?;
            writeln!(f, "\tnum_edges_total = {}", edges.total)?;
            writeln!(f, "\tmax_num_edges_per_graph = {}", edges.max)?;
            writeln!(f, "\tmin_num_edges_per_graph = {}", edges.min)?;
            writeln!(f, "\tstd_num_edges_per_graph = {}", edges.std)?;
            writeln!(f, "\tmean_num_edges_per_graph = {}", edges.mean)?;
        }
        write!(f, "-------------------")
    }
}
