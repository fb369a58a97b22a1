//! Provenance graph over wells and samples.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineageEndpoint {
    Well {
        labware_id: String,
        well_id: String,
    },
    Sample {
        sample_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl LineageEndpoint {
    pub fn well(labware_id: &str, well_id: &str) -> Self {
        LineageEndpoint::Well {
            labware_id: labware_id.to_string(),
            well_id: well_id.to_string(),
        }
    }

    pub fn sample(sample_id: &str, label: Option<&str>) -> Self {
        LineageEndpoint::Sample {
            sample_id: sample_id.to_string(),
            label: label.map(str::to_string),
        }
    }

    /// Sample id for samples, `"{labware_id}:{well_id}"` for wells.
    pub fn key(&self) -> String {
        match self {
            LineageEndpoint::Well { labware_id, well_id } => format!("{}:{}", labware_id, well_id),
            LineageEndpoint::Sample { sample_id, .. } => sample_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub event_id: String,
    pub from: LineageEndpoint,
    pub to: LineageEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moles: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineageNode {
    pub key: String,
    #[serde(flatten)]
    pub endpoint: LineageEndpoint,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LineageGraph {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

/// Collects the distinct endpoints of `edges` as nodes, in first-seen order.
///
/// Edges are kept as given: two transfers between the same wells are two
/// provenance records.
pub fn build_lineage_graph(edges: &[LineageEdge]) -> LineageGraph {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for edge in edges {
        for endpoint in [&edge.from, &edge.to] {
            let key = endpoint.key();
            if seen.insert(key.clone()) {
                nodes.push(LineageNode {
                    key,
                    endpoint: endpoint.clone(),
                });
            }
        }
    }
    LineageGraph {
        nodes,
        edges: edges.to_vec(),
    }
}

impl LineageGraph {
    pub fn node(&self, key: &str) -> Option<&LineageNode> {
        self.nodes.iter().find(|n| n.key == key)
    }

    /// Every node upstream of `key`, nearest first.
    pub fn ancestors(&self, key: &str) -> Vec<&LineageNode> {
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &self.edges {
            parents
                .entry(edge.to.key())
                .or_default()
                .push(edge.from.key());
        }

        let mut visited: HashSet<String> = HashSet::from([key.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([key.to_string()]);
        let mut found = Vec::new();
        while let Some(current) = queue.pop_front() {
            for parent in parents.get(&current).into_iter().flatten() {
                if visited.insert(parent.clone()) {
                    if let Some(node) = self.node(parent) {
                        found.push(node);
                    }
                    queue.push_back(parent.clone());
                }
            }
        }
        found
    }
}
