//! Deterministic merge of several single-task stores into one unified,
//! identity-deduplicated collection.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use molset_core::arena::{GroupedStringArenaBuilder, StringArenaBuilder};
use molset_core::identity::{batch_mol_ids, ConfigError, MolId, ResolveError, ResolverConfig};
use molset_core::types::{Label, LabelShape, TaskName};
use molset_observe::metrics::{Counter, DurationAgg, Gauge, ScopedTimer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::UnifiedCollection;
use crate::store::SingleTaskStore;

/// Task mapping handed to the merge. A `BTreeMap` fixes the row-processing
/// order (task name order, then row order within task) independently of how
/// the caller assembled the mapping.
pub type TaskStores<F> = BTreeMap<TaskName, SingleTaskStore<F>>;

/// What to do when more than one row collapses onto the same slot: a second
/// label for one (entity, task) pair, or a second feature for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// The later row in row-processing order replaces the earlier one.
    #[default]
    LastWins,
    /// The earlier row is kept and later rows are ignored.
    FirstWins,
    /// Any collision aborts the merge with an error.
    Error,
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub resolver: ResolverConfig,
    pub collisions: CollisionPolicy,
    /// When false, canonical ids and raw-input variant lists are discarded
    /// after the merge to reduce memory; labels and features are retained.
    pub keep_ids_and_smiles: bool,
    /// Free-text diagnostic label; no behavioral effect.
    pub about: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            resolver: ResolverConfig::default(),
            collisions: CollisionPolicy::default(),
            keep_ids_and_smiles: true,
            about: String::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MergeMetrics {
    pub rows_total: Counter,
    pub ids_resolved_total: Counter,
    pub entities: Gauge,
    pub label_collisions_total: Counter,
    pub feature_collisions_total: Counter,
    pub identity_pass: DurationAgg,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("identity resolution failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("task {task} supplies neither raw inputs nor precomputed ids")]
    MissingSmiles { task: TaskName },
    #[error("task {task} produced a second label for molecule {mol_id}")]
    LabelCollision { task: TaskName, mol_id: MolId },
    #[error("more than one row carries a feature for molecule {mol_id}")]
    FeatureCollision { mol_id: MolId },
}

/// Merges task stores into a [`UnifiedCollection`].
///
/// Configuration is validated here, at construction; a bad backend or chunk
/// size never surfaces later inside a merge pass.
#[derive(Debug)]
pub struct Merger {
    cfg: MergeConfig,
    metrics: Arc<MergeMetrics>,
}

impl Merger {
    pub fn new(cfg: MergeConfig) -> Result<Self, ConfigError> {
        cfg.resolver.validate()?;
        Ok(Self {
            cfg,
            metrics: Arc::new(MergeMetrics::default()),
        })
    }

    pub fn metrics(&self) -> Arc<MergeMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &MergeConfig {
        &self.cfg
    }

    /// Runs the merge to completion; no partial state is observable.
    ///
    /// Tasks with zero rows are skipped silently. Per row, a precomputed id
    /// is reused when the store supplied one; otherwise the store's raw
    /// inputs go through the batched identity pass. The final entity order is
    /// the sorted order of distinct canonical ids.
    pub fn merge<F: Clone>(&self, tasks: &TaskStores<F>) -> Result<UnifiedCollection<F>, MergeError> {
        struct Row<'a, F> {
            task: &'a TaskName,
            label: &'a Label,
            feature: Option<&'a F>,
            smiles: Option<&'a str>,
        }

        let mut rows: Vec<Row<'_, F>> = Vec::new();
        let mut all_ids: Vec<MolId> = Vec::new();

        for (task, store) in tasks {
            if store.is_empty() {
                continue;
            }
            let ids: Vec<MolId> = match store.mol_ids() {
                Some(ids) => ids.to_vec(),
                None => {
                    let smiles = store.smiles().ok_or_else(|| MergeError::MissingSmiles {
                        task: task.clone(),
                    })?;
                    let inputs: Vec<&str> = smiles.iter().collect();
                    let ids = {
                        let _timer = ScopedTimer::new(&self.metrics.identity_pass);
                        batch_mol_ids(&inputs, &self.cfg.resolver)?
                    };
                    self.metrics.ids_resolved_total.inc_by(ids.len() as u64);
                    tracing::info!(
                        target: "molset",
                        event = "identity_batch_done",
                        task = %task,
                        rows = ids.len() as u64,
                        "resolved canonical ids"
                    );
                    ids
                }
            };

            for i in 0..store.len() {
                rows.push(Row {
                    task,
                    label: &store.labels()[i],
                    feature: store.features().and_then(|f| f.get(i)),
                    smiles: store.smiles().and_then(|s| s.get(i)),
                });
            }
            all_ids.extend(ids);
        }

        self.metrics.rows_total.inc_by(rows.len() as u64);
        tracing::info!(
            target: "molset",
            event = "merge_started",
            tasks = tasks.len() as u64,
            rows = rows.len() as u64,
            "merging task stores"
        );

        // Sorted distinct ids plus, per row, its position in the sorted set.
        let mut order: Vec<usize> = (0..all_ids.len()).collect();
        order.sort_by(|&a, &b| all_ids[a].cmp(&all_ids[b]));
        let mut sorted_ids: Vec<MolId> = Vec::new();
        let mut inverse = vec![0usize; all_ids.len()];
        for &row in &order {
            if sorted_ids.last() != Some(&all_ids[row]) {
                sorted_ids.push(all_ids[row].clone());
            }
            inverse[row] = sorted_ids.len() - 1;
        }
        let entity_count = sorted_ids.len();

        // Scatter in row-processing order; this order is observable in the
        // per-entity variant lists and in collision resolution.
        let mut variants: Vec<Vec<&str>> = vec![Vec::new(); entity_count];
        let mut any_smiles = false;
        let mut labels: Vec<BTreeMap<TaskName, Label>> = vec![BTreeMap::new(); entity_count];
        let mut features: Vec<Option<F>> = (0..entity_count).map(|_| None).collect();
        let mut any_features = false;

        for (row_idx, row) in rows.iter().enumerate() {
            let pos = inverse[row_idx];

            if let Some(s) = row.smiles {
                variants[pos].push(s);
                any_smiles = true;
            }

            match labels[pos].entry(row.task.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(row.label.clone());
                }
                Entry::Occupied(mut slot) => {
                    self.metrics.label_collisions_total.inc();
                    match self.cfg.collisions {
                        CollisionPolicy::LastWins => {
                            slot.insert(row.label.clone());
                        }
                        CollisionPolicy::FirstWins => {}
                        CollisionPolicy::Error => {
                            return Err(MergeError::LabelCollision {
                                task: row.task.clone(),
                                mol_id: sorted_ids[pos].clone(),
                            });
                        }
                    }
                }
            }

            if let Some(feature) = row.feature {
                any_features = true;
                if features[pos].is_none() {
                    features[pos] = Some(feature.clone());
                } else {
                    self.metrics.feature_collisions_total.inc();
                    match self.cfg.collisions {
                        CollisionPolicy::LastWins => features[pos] = Some(feature.clone()),
                        CollisionPolicy::FirstWins => {}
                        CollisionPolicy::Error => {
                            return Err(MergeError::FeatureCollision {
                                mol_id: sorted_ids[pos].clone(),
                            });
                        }
                    }
                }
            }
        }

        // Shape registry: the first entity (in final order) carrying each task.
        let mut label_shapes: BTreeMap<TaskName, LabelShape> = BTreeMap::new();
        for task in tasks.keys() {
            if let Some(shape) = labels.iter().find_map(|m| m.get(task)).map(Label::shape) {
                label_shapes.insert(task.clone(), shape);
            }
        }

        let (mol_ids, smiles) = if self.cfg.keep_ids_and_smiles {
            let mut ids = StringArenaBuilder::with_capacity(entity_count, entity_count * 64);
            for id in &sorted_ids {
                ids.push(id.as_str());
            }
            let smiles = if any_smiles {
                let mut groups = GroupedStringArenaBuilder::new();
                for group in &variants {
                    groups.push_group(group.iter().copied());
                }
                Some(groups.finish())
            } else {
                None
            };
            (Some(ids.finish()), smiles)
        } else {
            (None, None)
        };

        self.metrics.entities.set(entity_count as u64);
        tracing::info!(
            target: "molset",
            event = "merge_done",
            rows = rows.len() as u64,
            entities = entity_count as u64,
            label_collisions = self.metrics.label_collisions_total.get(),
            "merged task stores"
        );

        Ok(UnifiedCollection {
            mol_ids,
            smiles,
            labels,
            features: any_features.then_some(features),
            label_shapes,
            about: self.cfg.about.clone(),
        })
    }
}
