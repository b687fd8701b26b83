//! Authoritative node/edge map for one explorer session.
//!
//! The manager only grows: seed data and neighbor batches are merged
//! additively (first write wins per id), and what the user sees is the
//! VisibleSet intersected with the active type filter. Nothing here is touched
//! while rendering; render code only reads [`IncrementalGraphManager::visible_graph`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info, warn};

use super::store::StoreError;
use super::types::{EdgeKey, GraphEdge, GraphNode, NeighborPayload, NodeId, SeedPayload};

/// How many seed nodes are shown initially.
pub const DEFAULT_MAX_VISIBLE: usize = 40;
/// Neighbors requested per expansion.
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 25;

/// What the most recent structural change was, so the layout knows whether
/// to restart or to reheat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructuralChange {
	/// Everything was replaced; positions start over.
	Reseeded,
	/// Nodes or edges were added to the existing graph.
	Merged,
	/// The type filter changed what is rendered.
	Filtered,
}

/// Claim on the single expansion slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandTicket {
	node_id: NodeId,
	epoch: u64,
}

impl ExpandTicket {
	/// Node the ticket expands.
	pub fn node_id(&self) -> &str {
		&self.node_id
	}
}

/// Result of applying a neighbor fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpandOutcome {
	/// Neighbors were merged and made visible.
	Merged {
		/// Nodes not known before.
		added_nodes: usize,
		/// Edges not known before.
		added_edges: usize,
	},
	/// The fetch failed; the slot was released and nothing else changed.
	Failed,
	/// The ticket belongs to an older seed or a closed manager.
	Stale,
}

/// The rendered subgraph: visible nodes of an active type, and the edges
/// whose endpoints are both among them.
#[derive(Clone, Debug, Default)]
pub struct VisibleGraph {
	/// Rendered nodes in insertion order.
	pub nodes: Vec<Rc<GraphNode>>,
	/// Edges between rendered nodes.
	pub edges: Vec<GraphEdge>,
}

/// Grows the session graph and decides what is visible, expanded and
/// selected.
pub struct IncrementalGraphManager {
	nodes: Vec<Rc<GraphNode>>,
	node_index: HashMap<NodeId, usize>,
	edges: Vec<GraphEdge>,
	edge_keys: HashSet<EdgeKey>,
	visible: HashSet<NodeId>,
	known_types: BTreeSet<String>,
	type_ordinals: HashMap<String, usize>,
	active_types: HashSet<String>,
	expanded: HashSet<NodeId>,
	in_flight: Option<ExpandTicket>,
	selected: Option<NodeId>,
	max_visible: usize,
	epoch: u64,
	revision: u64,
	last_change: Option<StructuralChange>,
	closed: bool,
}

impl Default for IncrementalGraphManager {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_VISIBLE)
	}
}

impl IncrementalGraphManager {
	/// Empty manager that shows at most `max_visible` nodes of a seed.
	pub fn new(max_visible: usize) -> Self {
		Self {
			nodes: Vec::new(),
			node_index: HashMap::new(),
			edges: Vec::new(),
			edge_keys: HashSet::new(),
			visible: HashSet::new(),
			known_types: BTreeSet::new(),
			type_ordinals: HashMap::new(),
			active_types: HashSet::new(),
			expanded: HashSet::new(),
			in_flight: None,
			selected: None,
			max_visible,
			epoch: 0,
			revision: 0,
			last_change: None,
			closed: false,
		}
	}

	// =========================================================================
	// SEED / EXPAND
	// =========================================================================

	/// Replace everything with a fresh seed graph.
	pub fn seed(&mut self, payload: SeedPayload) {
		self.nodes.clear();
		self.node_index.clear();
		self.edges.clear();
		self.edge_keys.clear();
		self.known_types.clear();
		self.type_ordinals.clear();
		self.active_types.clear();
		self.expanded.clear();
		self.in_flight = None;
		self.selected = None;
		self.epoch += 1;

		for node in payload.nodes {
			self.insert_node(node);
		}
		for edge in payload.edges {
			self.insert_edge(edge);
		}

		self.visible = prioritized_top_k(&self.nodes, |_| true, self.max_visible)
			.into_iter()
			.collect();
		self.active_types = self.known_types.iter().cloned().collect();

		info!(
			"Seeded graph with {} nodes, {} edges ({} visible)",
			self.nodes.len(),
			self.edges.len(),
			self.visible.len()
		);
		self.touch(StructuralChange::Reseeded);
	}

	/// Claim the expansion slot for `node_id`.
	///
	/// Returns `None` when the node was already expanded or another
	/// expansion is in flight; the caller must not issue a fetch then.
	pub fn begin_expand(&mut self, node_id: &str) -> Option<ExpandTicket> {
		if self.closed || self.expanded.contains(node_id) {
			return None;
		}
		if let Some(ticket) = &self.in_flight {
			debug!("Expansion of {} ignored, {} in flight", node_id, ticket.node_id);
			return None;
		}
		let ticket = ExpandTicket {
			node_id: node_id.to_owned(),
			epoch: self.epoch,
		};
		self.in_flight = Some(ticket.clone());
		Some(ticket)
	}

	/// Apply (or discard) the result of the fetch started with `ticket`.
	pub fn finish_expand(
		&mut self,
		ticket: ExpandTicket,
		result: Result<NeighborPayload, StoreError>,
	) -> ExpandOutcome {
		if self.closed || self.in_flight.as_ref() != Some(&ticket) {
			warn!("Dropping stale expansion of {}", ticket.node_id);
			return ExpandOutcome::Stale;
		}
		self.in_flight = None;

		let payload = match result {
			Ok(payload) => payload,
			Err(err) => {
				warn!("Expanding {} failed: {}", ticket.node_id, err);
				return ExpandOutcome::Failed;
			}
		};

		let mut added_nodes = 0;
		for node in payload.neighbors {
			if node.id.is_empty() {
				continue;
			}
			self.visible.insert(node.id.clone());
			self.active_types.insert(node.kind.clone());
			if self.insert_node(node) {
				added_nodes += 1;
			}
		}
		let added_edges = payload
			.edges
			.into_iter()
			.map(|edge| self.insert_edge(edge))
			.filter(|&inserted| inserted)
			.count();

		self.expanded.insert(ticket.node_id.clone());
		info!(
			"Expanded {}: +{} nodes, +{} edges",
			ticket.node_id, added_nodes, added_edges
		);
		self.touch(StructuralChange::Merged);
		ExpandOutcome::Merged {
			added_nodes,
			added_edges,
		}
	}

	/// Node currently being expanded, if any.
	pub fn expanding(&self) -> Option<&str> {
		self.in_flight.as_ref().map(|t| t.node_id.as_str())
	}

	/// Whether the neighbors of `node_id` have been merged.
	pub fn is_expanded(&self, node_id: &str) -> bool {
		self.expanded.contains(node_id)
	}

	/// Tear down: every outstanding ticket becomes stale.
	pub fn close(&mut self) {
		self.closed = true;
		self.in_flight = None;
	}

	// =========================================================================
	// FILTER
	// =========================================================================

	/// Returns whether the filter actually changed.
	pub fn set_type_filter(&mut self, kind: &str, active: bool) -> bool {
		let changed = if active {
			self.known_types.contains(kind) && self.active_types.insert(kind.to_owned())
		} else {
			self.active_types.remove(kind)
		};
		if changed {
			debug!("Type filter {} -> {}", kind, active);
			self.touch(StructuralChange::Filtered);
		}
		changed
	}

	/// Whether nodes of type `kind` pass the filter.
	pub fn is_type_active(&self, kind: &str) -> bool {
		self.active_types.contains(kind)
	}

	/// Every type seen so far, sorted, with its filter state.
	pub fn types(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
		self.known_types
			.iter()
			.map(|t| (t.as_str(), self.active_types.contains(t)))
	}

	/// Palette ordinal of a type, fixed by the order types were first seen.
	pub fn type_ordinal(&self, kind: &str) -> usize {
		self.type_ordinals.get(kind).copied().unwrap_or(0)
	}

	// =========================================================================
	// SELECTION
	// =========================================================================

	/// Currently selected node.
	pub fn selected(&self) -> Option<&str> {
		self.selected.as_deref()
	}

	/// Replace the selection.
	pub fn select(&mut self, node_id: Option<&str>) {
		self.selected = node_id.map(str::to_owned);
	}

	/// Select `node_id`, or deselect it if it already is the selection.
	pub fn toggle_selection(&mut self, node_id: &str) {
		if self.selected.as_deref() == Some(node_id) {
			self.selected = None;
		} else {
			self.selected = Some(node_id.to_owned());
		}
	}

	// =========================================================================
	// QUERIES
	// =========================================================================

	/// Known node by id, visible or not.
	pub fn node(&self, id: &str) -> Option<&Rc<GraphNode>> {
		self.node_index.get(id).map(|&i| &self.nodes[i])
	}

	/// Whether `id` is in the visible set, regardless of the filter.
	pub fn is_visible(&self, id: &str) -> bool {
		self.visible.contains(id)
	}

	/// Whether `id` is visible and its type is active.
	pub fn is_rendered(&self, id: &str) -> bool {
		self.visible.contains(id)
			&& self
				.node(id)
				.is_some_and(|n| self.active_types.contains(&n.kind))
	}

	/// Number of known nodes.
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	/// Number of known edges.
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	/// Bumped on every structural change.
	pub fn revision(&self) -> u64 {
		self.revision
	}

	/// Kind of the most recent structural change.
	pub fn last_change(&self) -> Option<StructuralChange> {
		self.last_change
	}

	/// Snapshot of what should be laid out and drawn.
	pub fn visible_graph(&self) -> VisibleGraph {
		let nodes: Vec<Rc<GraphNode>> = self
			.nodes
			.iter()
			.filter(|n| self.visible.contains(&n.id) && self.active_types.contains(&n.kind))
			.cloned()
			.collect();
		let rendered: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
		let edges = self
			.edges
			.iter()
			.filter(|e| rendered.contains(e.source.as_str()) && rendered.contains(e.target.as_str()))
			.cloned()
			.collect();
		VisibleGraph { nodes, edges }
	}

	fn insert_node(&mut self, node: GraphNode) -> bool {
		if node.id.is_empty() || self.node_index.contains_key(&node.id) {
			return false;
		}
		if self.known_types.insert(node.kind.clone()) {
			let ordinal = self.type_ordinals.len();
			self.type_ordinals.insert(node.kind.clone(), ordinal);
		}
		self.node_index.insert(node.id.clone(), self.nodes.len());
		self.nodes.push(Rc::new(node));
		true
	}

	fn insert_edge(&mut self, mut edge: GraphEdge) -> bool {
		if !edge.weight.is_finite() || edge.weight < 0.0 {
			edge.weight = 0.0;
		}
		if !self.edge_keys.insert(edge.key()) {
			return false;
		}
		self.edges.push(edge);
		true
	}

	fn touch(&mut self, change: StructuralChange) {
		self.revision += 1;
		self.last_change = Some(change);
	}
}

/// Pick up to `max_count` node ids: first the best-scoring node of every type
/// (so rare types are not crowded out), then the rest by score.
pub fn prioritized_top_k<F>(nodes: &[Rc<GraphNode>], filter: F, max_count: usize) -> Vec<NodeId>
where
	F: Fn(&GraphNode) -> bool,
{
	let candidates: Vec<&GraphNode> = nodes.iter().map(Rc::as_ref).filter(|n| filter(n)).collect();

	let mut best_of_type: HashMap<&str, usize> = HashMap::new();
	for (i, node) in candidates.iter().enumerate() {
		let slot = best_of_type.entry(node.kind.as_str()).or_insert(i);
		if node.score() > candidates[*slot].score() {
			*slot = i;
		}
	}

	let mut representatives: Vec<usize> = best_of_type.into_values().collect();
	representatives.sort_by(|&a, &b| {
		candidates[b]
			.score()
			.total_cmp(&candidates[a].score())
			.then(a.cmp(&b))
	});
	representatives.truncate(max_count);

	let chosen: HashSet<usize> = representatives.iter().copied().collect();
	let mut rest: Vec<usize> = (0..candidates.len()).filter(|i| !chosen.contains(i)).collect();
	rest.sort_by(|&a, &b| candidates[b].score().total_cmp(&candidates[a].score()));

	let remaining = max_count.saturating_sub(representatives.len());
	representatives
		.into_iter()
		.chain(rest.into_iter().take(remaining))
		.map(|i| candidates[i].id.clone())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(id: &str, kind: &str, degree: u32) -> GraphNode {
		GraphNode::new(id, kind, id.to_uppercase()).with_connections(degree)
	}

	fn seeded(max_visible: usize) -> IncrementalGraphManager {
		let mut manager = IncrementalGraphManager::new(max_visible);
		manager.seed(SeedPayload {
			nodes: vec![
				node("a", "CONCEPT", 5),
				node("b", "PERSON", 1),
				node("c", "CONCEPT", 9),
			],
			edges: vec![
				GraphEdge::new("a", "b", "KNOWS"),
				GraphEdge::new("c", "b", "MENTIONS"),
			],
		});
		manager
	}

	fn ids(graph: &VisibleGraph) -> Vec<&str> {
		let mut ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
		ids.sort();
		ids
	}

	fn assert_edges_visible(manager: &IncrementalGraphManager) {
		let graph = manager.visible_graph();
		for edge in &graph.edges {
			assert!(manager.is_visible(&edge.source) && manager.is_visible(&edge.target));
			assert!(graph.nodes.iter().any(|n| n.id == edge.source));
			assert!(graph.nodes.iter().any(|n| n.id == edge.target));
		}
	}

	#[test]
	fn test_top_k_keeps_one_per_type() {
		let manager = seeded(2);
		let graph = manager.visible_graph();

		assert_eq!(ids(&graph), vec!["b", "c"]);
		assert_eq!(graph.edges.len(), 1);
		assert_eq!(graph.edges[0].source, "c");
	}

	#[test]
	fn test_top_k_covers_every_type() {
		let kinds = ["A", "B", "C", "D"];
		let mut nodes: Vec<Rc<GraphNode>> = (0..40)
			.map(|i| Rc::new(node(&format!("hub{i}"), "A", 100 + i)))
			.collect();
		for kind in &kinds[1..] {
			nodes.push(Rc::new(node(&format!("rare-{kind}"), kind, 0)));
		}

		let picked = prioritized_top_k(&nodes, |_| true, kinds.len());
		assert_eq!(picked.len(), kinds.len());
		for kind in kinds {
			assert!(
				picked
					.iter()
					.any(|id| nodes.iter().any(|n| &n.id == id && n.kind == kind)),
				"missing {kind}"
			);
		}
		assert!(picked.contains(&"hub39".to_string()));
	}

	#[test]
	fn test_top_k_prefers_importance() {
		let nodes = vec![
			Rc::new(node("a", "X", 10)),
			Rc::new(node("b", "X", 1).with_importance(50.0)),
			Rc::new(node("c", "X", 5)),
		];
		assert_eq!(prioritized_top_k(&nodes, |_| true, 2), vec!["b", "a"]);
		assert_eq!(
			prioritized_top_k(&nodes, |n| n.id != "b", 5),
			vec!["a", "c"]
		);
	}

	#[test]
	fn test_expand_merges_once() {
		let mut manager = seeded(2);
		let revision = manager.revision();

		let ticket = manager.begin_expand("c").unwrap();
		assert_eq!(manager.expanding(), Some("c"));
		assert!(manager.begin_expand("b").is_none(), "expansion is single-flight");

		let outcome = manager.finish_expand(
			ticket,
			Ok(NeighborPayload {
				neighbors: vec![node("a", "CONCEPT", 5), node("d", "PLACE", 2)],
				edges: vec![
					GraphEdge::new("c", "a", "RELATES"),
					GraphEdge::new("c", "d", "LOCATED_IN"),
					GraphEdge::new("c", "b", "MENTIONS"),
				],
			}),
		);

		assert_eq!(
			outcome,
			ExpandOutcome::Merged {
				added_nodes: 1,
				added_edges: 2
			}
		);
		assert!(manager.is_expanded("c"));
		assert_eq!(manager.expanding(), None);
		assert_eq!(manager.revision(), revision + 1);
		assert_eq!(manager.last_change(), Some(StructuralChange::Merged));
		assert_eq!(ids(&manager.visible_graph()), vec!["a", "b", "c", "d"]);
		assert!(manager.is_type_active("PLACE"));
		assert_eq!(manager.edge_count(), 4);

		assert!(manager.begin_expand("c").is_none());
		assert_edges_visible(&manager);
	}

	#[test]
	fn test_first_write_wins() {
		let mut manager = seeded(3);
		let ticket = manager.begin_expand("a").unwrap();
		let mut renamed = node("b", "PERSON", 1);
		renamed.name = "Impostor".into();
		manager.finish_expand(
			ticket,
			Ok(NeighborPayload {
				neighbors: vec![renamed],
				edges: vec![],
			}),
		);

		assert_eq!(manager.node("b").unwrap().name, "B");
	}

	#[test]
	fn test_failed_expand_releases_guard() {
		let mut manager = seeded(2);
		let revision = manager.revision();
		let ticket = manager.begin_expand("c").unwrap();

		let outcome =
			manager.finish_expand(ticket, Err(StoreError::Transport("offline".into())));

		assert_eq!(outcome, ExpandOutcome::Failed);
		assert_eq!(manager.expanding(), None);
		assert!(!manager.is_expanded("c"));
		assert_eq!(manager.revision(), revision);
		assert!(manager.begin_expand("c").is_some());
	}

	#[test]
	fn test_reseed_and_close_make_tickets_stale() {
		let mut manager = seeded(2);
		let ticket = manager.begin_expand("c").unwrap();
		manager.seed(SeedPayload::default());
		assert_eq!(
			manager.finish_expand(ticket, Ok(NeighborPayload::default())),
			ExpandOutcome::Stale
		);

		let mut manager = seeded(2);
		let ticket = manager.begin_expand("c").unwrap();
		manager.close();
		assert_eq!(
			manager.finish_expand(ticket, Ok(NeighborPayload::default())),
			ExpandOutcome::Stale
		);
		assert!(manager.begin_expand("b").is_none());
	}

	#[test]
	fn test_type_filter_hides_nodes_and_their_edges() {
		let mut manager = seeded(3);
		assert!(manager.set_type_filter("PERSON", false));
		assert!(!manager.set_type_filter("PERSON", false));
		assert_eq!(manager.last_change(), Some(StructuralChange::Filtered));

		let graph = manager.visible_graph();
		assert_eq!(ids(&graph), vec!["a", "c"]);
		assert!(graph.edges.is_empty());
		assert!(!manager.is_rendered("b"));
		assert_edges_visible(&manager);

		assert!(manager.set_type_filter("PERSON", true));
		assert_eq!(manager.visible_graph().edges.len(), 2);
		assert!(!manager.set_type_filter("UNKNOWN", true));
	}

	#[test]
	fn test_selection_toggles_and_seed_clears() {
		let mut manager = seeded(3);
		manager.toggle_selection("a");
		assert_eq!(manager.selected(), Some("a"));
		manager.toggle_selection("b");
		assert_eq!(manager.selected(), Some("b"));
		manager.toggle_selection("b");
		assert_eq!(manager.selected(), None);

		manager.select(Some("a"));
		manager.seed(SeedPayload::default());
		assert_eq!(manager.selected(), None);
	}

	#[test]
	fn test_types_and_ordinals() {
		let manager = seeded(3);
		let types: Vec<_> = manager.types().collect();
		assert_eq!(types, vec![("CONCEPT", true), ("PERSON", true)]);
		assert_eq!(manager.type_ordinal("CONCEPT"), 0);
		assert_eq!(manager.type_ordinal("PERSON"), 1);
	}

	#[test]
	fn test_bad_weights_are_clamped() {
		let mut manager = IncrementalGraphManager::new(5);
		manager.seed(SeedPayload {
			nodes: vec![node("a", "X", 1), node("b", "X", 1), node("", "X", 9)],
			edges: vec![
				GraphEdge::new("a", "b", "R").with_weight(-3.0),
				GraphEdge::new("b", "a", "R").with_weight(f64::NAN),
			],
		});

		assert_eq!(manager.node_count(), 2);
		assert!(manager.visible_graph().edges.iter().all(|e| e.weight == 0.0));
	}
}
