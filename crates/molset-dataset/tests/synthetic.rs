use std::collections::BTreeMap;

use molset_core::identity::{Backend, ResolverConfig};
use molset_core::types::{Label, LabelShape, TaskName};
use molset_dataset::{
    GraphStats, MergeConfig, SingleTaskStore, SyntheticDataset, SyntheticError, TaskStores,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestGraph {
    nodes: usize,
    edges: usize,
}

impl GraphStats for TestGraph {
    fn num_nodes(&self) -> usize {
        self.nodes
    }

    fn num_edges(&self) -> usize {
        self.edges
    }
}

fn serial_config() -> MergeConfig {
    MergeConfig {
        resolver: ResolverConfig {
            backend: Backend::Serial,
            progress: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn one_entity_tasks() -> TaskStores<TestGraph> {
    let mut tasks: TaskStores<TestGraph> = BTreeMap::new();
    tasks.insert(
        TaskName::from("a"),
        SingleTaskStore::builder(vec![Label::Vector(vec![0.0, 1.0])])
            .smiles(["CCO"])
            .features(vec![TestGraph { nodes: 3, edges: 2 }])
            .build()
            .unwrap(),
    );
    tasks
}

#[test]
fn length_is_exactly_the_requested_record_count() -> anyhow::Result<()> {
    let dataset = SyntheticDataset::build(&one_entity_tasks(), serial_config(), 10, false)?;
    assert_eq!(dataset.len(), 10);
    assert!(dataset.get(9).is_some());
    assert!(dataset.get(10).is_none());
    assert_eq!(
        dataset.label_shapes().get(&TaskName::from("a")),
        Some(&LabelShape(vec![2]))
    );
    Ok(())
}

#[test]
fn owned_records_are_pairwise_equal_but_independent() -> anyhow::Result<()> {
    let mut dataset = SyntheticDataset::build(&one_entity_tasks(), serial_config(), 10, false)?;

    let first = dataset.get(0).cloned();
    for i in 1..dataset.len() {
        assert_eq!(dataset.get(i).cloned(), first);
    }

    // Mutating index 0 must leave index 1 unchanged.
    let record = dataset
        .get_mut(0)
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    record
        .labels
        .insert(TaskName::from("a"), Label::Scalar(99.0));

    assert_ne!(dataset.get(0), dataset.get(1));
    assert_eq!(dataset.get(1).cloned(), first);
    Ok(())
}

#[test]
fn shared_records_alias_one_underlying_record() -> anyhow::Result<()> {
    let mut dataset = SyntheticDataset::build(&one_entity_tasks(), serial_config(), 10, true)?;
    assert_eq!(dataset.len(), 10);

    // Mutating through index 0 is observable through index 1.
    let record = dataset
        .get_mut(0)
        .ok_or_else(|| anyhow::anyhow!("no record"))?;
    record
        .labels
        .insert(TaskName::from("a"), Label::Scalar(99.0));

    assert_eq!(
        dataset
            .get(1)
            .and_then(|r| r.labels.get(&TaskName::from("a"))),
        Some(&Label::Scalar(99.0))
    );
    assert_eq!(dataset.get(0), dataset.get(9));
    Ok(())
}

#[test]
fn only_the_first_merged_entity_becomes_the_base() -> anyhow::Result<()> {
    // Two distinct molecules upstream; the replicated dataset still holds
    // copies of a single record.
    let mut tasks = one_entity_tasks();
    tasks.insert(
        TaskName::from("b"),
        SingleTaskStore::builder(vec![Label::Scalar(1.0)])
            .smiles(["CCN"])
            .build()?,
    );

    let dataset = SyntheticDataset::build(&tasks, serial_config(), 4, false)?;
    assert_eq!(dataset.len(), 4);
    let first = dataset.get(0).cloned();
    for i in 1..4 {
        assert_eq!(dataset.get(i).cloned(), first);
    }
    Ok(())
}

#[test]
fn empty_base_merge_is_an_error() {
    let tasks: TaskStores<TestGraph> = BTreeMap::new();
    let err = SyntheticDataset::build(&tasks, serial_config(), 10, false).unwrap_err();
    assert!(matches!(err, SyntheticError::EmptyBase));
}
