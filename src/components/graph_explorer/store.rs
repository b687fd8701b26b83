//! The graph store seam: where seed graphs, neighbors and node details come from.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
	GraphEdge, GraphNode, NeighborPayload, NodeDetails, Relationship, SeedPayload,
};

/// Failures talking to a [`GraphDataStore`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
	/// The request never produced a response.
	#[error("request failed: {0}")]
	Transport(String),

	/// Non-success HTTP status.
	#[error("HTTP {0}")]
	Status(u16),

	/// The body was not the expected JSON.
	#[error("malformed payload: {0}")]
	Decode(String),

	/// The store has no node with this id.
	#[error("unknown node: {0}")]
	UnknownNode(String),
}

/// Supplies graph data for one explorer session.
///
/// Calls happen on the UI thread, so implementations need not be `Send`.
#[async_trait(?Send)]
pub trait GraphDataStore {
	/// Initial node/edge set for the session.
	async fn seed(&self, session_id: &str) -> Result<SeedPayload, StoreError>;

	/// One-hop neighbors of `node_id`, capped at `limit` nodes.
	async fn neighbors(
		&self,
		session_id: &str,
		node_id: &str,
		limit: usize,
	) -> Result<NeighborPayload, StoreError>;

	/// Extended detail for the side panel.
	async fn node_details(&self, session_id: &str, node_id: &str)
	-> Result<NodeDetails, StoreError>;
}

/// In-memory store over a complete graph.
///
/// `seed` hands out the first `seed_size` nodes (with their connection counts
/// computed inside that seed), and every further node only becomes reachable
/// through `neighbors`.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
	nodes: Vec<GraphNode>,
	edges: Vec<GraphEdge>,
	node_index: HashMap<String, usize>,
	seed_size: usize,
	neighbor_calls: Cell<usize>,
	fail_neighbors: Cell<bool>,
}

impl MemoryGraphStore {
	/// Store whose seed is every node, in the given order.
	pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
		let node_index = nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id.clone(), i))
			.collect();
		let seed_size = nodes.len();
		Self {
			nodes,
			edges,
			node_index,
			seed_size,
			..Self::default()
		}
	}

	/// Builder: only the first `n` nodes are part of the seed.
	pub fn with_seed_size(mut self, n: usize) -> Self {
		self.seed_size = n.min(self.nodes.len());
		self
	}

	/// How many neighbor queries have been answered (or failed).
	pub fn neighbor_calls(&self) -> usize {
		self.neighbor_calls.get()
	}

	/// Make subsequent neighbor queries fail with a transport error.
	pub fn set_fail_neighbors(&self, fail: bool) {
		self.fail_neighbors.set(fail);
	}

	fn node(&self, id: &str) -> Option<&GraphNode> {
		self.node_index.get(id).map(|&i| &self.nodes[i])
	}

	fn degree(&self, id: &str) -> u32 {
		self.edges.iter().filter(|e| e.touches(id)).count() as u32
	}
}

#[async_trait(?Send)]
impl GraphDataStore for MemoryGraphStore {
	async fn seed(&self, _session_id: &str) -> Result<SeedPayload, StoreError> {
		let ids: HashSet<&str> = self.nodes[..self.seed_size]
			.iter()
			.map(|n| n.id.as_str())
			.collect();
		let edges: Vec<GraphEdge> = self
			.edges
			.iter()
			.filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()))
			.cloned()
			.collect();
		let nodes = self.nodes[..self.seed_size]
			.iter()
			.map(|n| {
				let degree = edges.iter().filter(|e| e.touches(&n.id)).count() as u32;
				n.clone().with_connections(degree)
			})
			.collect();
		Ok(SeedPayload { nodes, edges })
	}

	async fn neighbors(
		&self,
		_session_id: &str,
		node_id: &str,
		limit: usize,
	) -> Result<NeighborPayload, StoreError> {
		self.neighbor_calls.set(self.neighbor_calls.get() + 1);
		if self.fail_neighbors.get() {
			return Err(StoreError::Transport("connection reset".into()));
		}
		if self.node(node_id).is_none() {
			return Err(StoreError::UnknownNode(node_id.to_owned()));
		}

		let mut seen = HashSet::new();
		let mut payload = NeighborPayload::default();
		for edge in self.edges.iter().filter(|e| e.touches(node_id)) {
			let Some(other) = edge.other_end(node_id) else {
				continue;
			};
			if !seen.contains(other) {
				if seen.len() >= limit {
					continue;
				}
				seen.insert(other.to_owned());
				if let Some(n) = self.node(other) {
					payload
						.neighbors
						.push(n.clone().with_connections(self.degree(other)));
				}
			}
			payload.edges.push(edge.clone());
		}
		Ok(payload)
	}

	async fn node_details(
		&self,
		_session_id: &str,
		node_id: &str,
	) -> Result<NodeDetails, StoreError> {
		let node = self
			.node(node_id)
			.ok_or_else(|| StoreError::UnknownNode(node_id.to_owned()))?;

		let relationships = self
			.edges
			.iter()
			.filter_map(|e| {
				let other = self.node(e.other_end(node_id)?)?;
				Some(Relationship {
					target_id: other.id.clone(),
					target_name: other.name.clone(),
					target_type: other.kind.clone(),
					direction: if e.source == node_id { "outgoing" } else { "incoming" }.into(),
					weight: e.weight,
					edge_type: e.kind.clone(),
					edge_description: e.description.clone(),
				})
			})
			.collect();

		Ok(NodeDetails {
			description: node.description.clone(),
			aliases: Vec::new(),
			connection_count: self.degree(node_id),
			source_documents: Vec::new(),
			relationships,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store() -> MemoryGraphStore {
		MemoryGraphStore::new(
			vec![
				GraphNode::new("a", "CONCEPT", "Alpha"),
				GraphNode::new("b", "PERSON", "Beta"),
				GraphNode::new("c", "PLACE", "Gamma"),
				GraphNode::new("d", "PLACE", "Delta"),
			],
			vec![
				GraphEdge::new("a", "b", "KNOWS"),
				GraphEdge::new("a", "c", "LOCATED_IN"),
				GraphEdge::new("d", "a", "CONTAINS"),
			],
		)
		.with_seed_size(2)
	}

	#[test]
	fn test_seed_counts_degree_within_seed() {
		let seed = pollster::block_on(store().seed("s")).unwrap();

		assert_eq!(seed.nodes.len(), 2);
		assert_eq!(seed.edges.len(), 1);
		assert!(seed.nodes.iter().all(|n| n.connection_count == 1));
	}

	#[test]
	fn test_neighbors_respects_limit() {
		let store = store();
		let all = pollster::block_on(store.neighbors("s", "a", 10)).unwrap();
		assert_eq!(all.neighbors.len(), 3);
		assert_eq!(all.edges.len(), 3);

		let capped = pollster::block_on(store.neighbors("s", "a", 1)).unwrap();
		assert_eq!(capped.neighbors.len(), 1);
		assert_eq!(capped.edges.len(), 1);
		assert_eq!(store.neighbor_calls(), 2);
	}

	#[test]
	fn test_unknown_node_and_failures() {
		let store = store();
		let err = pollster::block_on(store.neighbors("s", "zz", 5)).unwrap_err();
		assert_eq!(err, StoreError::UnknownNode("zz".into()));

		store.set_fail_neighbors(true);
		let err = pollster::block_on(store.neighbors("s", "a", 5)).unwrap_err();
		assert!(matches!(err, StoreError::Transport(_)));
	}

	#[test]
	fn test_node_details_lists_relationships() {
		let details = pollster::block_on(store().node_details("s", "a")).unwrap();

		assert_eq!(details.connection_count, 3);
		assert_eq!(details.relationships.len(), 3);
		let incoming = details
			.relationships
			.iter()
			.find(|r| r.target_id == "d")
			.unwrap();
		assert_eq!(incoming.direction, "incoming");
	}
}
