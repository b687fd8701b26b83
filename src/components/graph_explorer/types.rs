use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable node identifier as issued by the graph store.
pub type NodeId = String;

/// Free-form node attributes; only the ones the explorer reads are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeProperties {
	/// Overrides `connection_count` as the node's score when present.
	#[serde(deserialize_with = "lenient")]
	pub importance: Option<f64>,
}

/// An entity as delivered by the graph store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphNode {
	/// Store-issued identifier.
	#[serde(deserialize_with = "lenient")]
	pub id: NodeId,
	/// Entity type, e.g. `PERSON`; drives color and filtering.
	#[serde(rename = "type", deserialize_with = "lenient")]
	pub kind: String,
	/// Display label.
	#[serde(deserialize_with = "lenient")]
	pub name: String,
	/// Short summary, if the store has one.
	#[serde(deserialize_with = "lenient")]
	pub description: Option<String>,
	/// Degree in the seed graph.
	#[serde(deserialize_with = "lenient_count")]
	pub connection_count: u32,
	/// Extra attributes.
	#[serde(deserialize_with = "lenient")]
	pub properties: NodeProperties,
}

impl GraphNode {
	/// Node with no connections and no properties.
	pub fn new(id: impl Into<NodeId>, kind: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			kind: kind.into(),
			name: name.into(),
			..Self::default()
		}
	}

	/// Set the degree used for scoring.
	pub fn with_connections(mut self, count: u32) -> Self {
		self.connection_count = count;
		self
	}

	/// Set an explicit importance score.
	pub fn with_importance(mut self, importance: f64) -> Self {
		self.properties.importance = Some(importance);
		self
	}

	/// `properties.importance` when present, otherwise `connection_count`.
	pub fn score(&self) -> f64 {
		self.properties
			.importance
			.filter(|v| v.is_finite())
			.unwrap_or(self.connection_count as f64)
	}
}

fn default_weight() -> f64 {
	1.0
}

/// Either a well-formed `T` or anything else (including `null`).
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
	Value(T),
	Other(#[allow(dead_code)] IgnoredAny),
}

/// `null` or a value of the wrong shape decodes as the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(match Lenient::<T>::deserialize(deserializer)? {
		Lenient::Value(value) => value,
		Lenient::Other(_) => T::default(),
	})
}

/// Keeps the well-formed entries of a list; anything but a list is empty.
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(match Lenient::<Vec<Lenient<T>>>::deserialize(deserializer)? {
		Lenient::Value(items) => items
			.into_iter()
			.filter_map(|item| match item {
				Lenient::Value(value) => Some(value),
				Lenient::Other(_) => None,
			})
			.collect(),
		Lenient::Other(_) => Vec::new(),
	})
}

/// Non-negative finite numbers, truncated; everything else is 0.
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Lenient::<f64>::deserialize(deserializer)? {
		Lenient::Value(v) if v.is_finite() && v >= 0.0 => v.min(u32::MAX as f64) as u32,
		_ => 0,
	})
}

fn lenient_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Lenient::<f64>::deserialize(deserializer)? {
		Lenient::Value(v) => v,
		Lenient::Other(_) => default_weight(),
	})
}

/// A typed relationship between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphEdge {
	/// Origin node id.
	#[serde(deserialize_with = "lenient")]
	pub source: NodeId,
	/// Destination node id.
	#[serde(deserialize_with = "lenient")]
	pub target: NodeId,
	/// Relationship type.
	#[serde(rename = "type", deserialize_with = "lenient")]
	pub kind: String,
	/// Free-text description of the relationship.
	#[serde(deserialize_with = "lenient")]
	pub description: Option<String>,
	/// Strength in `[0, 1]`; missing or malformed values become `1.0`.
	#[serde(default = "default_weight", deserialize_with = "lenient_weight")]
	pub weight: f64,
}

impl Default for GraphEdge {
	fn default() -> Self {
		Self {
			source: NodeId::new(),
			target: NodeId::new(),
			kind: String::new(),
			description: None,
			weight: default_weight(),
		}
	}
}

/// Identity used to drop exact duplicate edges on merge.
pub type EdgeKey = (NodeId, NodeId, String);

impl GraphEdge {
	/// Edge of weight `1.0`.
	pub fn new(
		source: impl Into<NodeId>,
		target: impl Into<NodeId>,
		kind: impl Into<String>,
	) -> Self {
		Self {
			source: source.into(),
			target: target.into(),
			kind: kind.into(),
			..Self::default()
		}
	}

	/// Set the edge weight.
	pub fn with_weight(mut self, weight: f64) -> Self {
		self.weight = weight;
		self
	}

	/// Deduplication key: source, target and type.
	pub fn key(&self) -> EdgeKey {
		(self.source.clone(), self.target.clone(), self.kind.clone())
	}

	/// Whether `id` is either endpoint.
	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}

	/// The endpoint opposite to `id`, if `id` is one of the endpoints.
	pub fn other_end(&self, id: &str) -> Option<&str> {
		if self.source == id {
			Some(&self.target)
		} else if self.target == id {
			Some(&self.source)
		} else {
			None
		}
	}
}

/// Response of the seed request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedPayload {
	/// Seed nodes, unordered.
	#[serde(deserialize_with = "lenient_items")]
	pub nodes: Vec<GraphNode>,
	/// Edges among the seed nodes.
	#[serde(deserialize_with = "lenient_items")]
	pub edges: Vec<GraphEdge>,
}

/// Response of a neighbor request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NeighborPayload {
	/// Neighbors of the requested node, best first.
	#[serde(deserialize_with = "lenient_items")]
	pub neighbors: Vec<GraphNode>,
	/// Edges linking the requested node to its neighbors.
	#[serde(deserialize_with = "lenient_items")]
	pub edges: Vec<GraphEdge>,
}

/// A document the entity was extracted from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceDocument {
	/// Document identifier.
	#[serde(deserialize_with = "lenient")]
	pub document_id: String,
	/// Title, possibly empty.
	#[serde(deserialize_with = "lenient")]
	pub document_title: String,
}

/// One relationship listed in the detail panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Relationship {
	/// The node on the other end.
	#[serde(deserialize_with = "lenient")]
	pub target_id: NodeId,
	/// Name of the other node.
	#[serde(deserialize_with = "lenient")]
	pub target_name: String,
	/// Type of the other node.
	#[serde(deserialize_with = "lenient")]
	pub target_type: String,
	/// `"outgoing"` or `"incoming"` relative to the detailed node.
	#[serde(deserialize_with = "lenient")]
	pub direction: String,
	/// Edge weight as reported by the store.
	#[serde(deserialize_with = "lenient")]
	pub weight: f64,
	/// Relationship type.
	#[serde(deserialize_with = "lenient")]
	pub edge_type: String,
	/// Relationship description, shown as a tooltip.
	#[serde(deserialize_with = "lenient")]
	pub edge_description: Option<String>,
}

/// Extended detail shown in the side panel for the selected node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeDetails {
	/// Long description.
	#[serde(deserialize_with = "lenient")]
	pub description: Option<String>,
	/// Alternative names.
	#[serde(deserialize_with = "lenient_items")]
	pub aliases: Vec<String>,
	/// Degree in the full graph.
	#[serde(deserialize_with = "lenient_count")]
	pub connection_count: u32,
	/// Documents mentioning the entity.
	#[serde(deserialize_with = "lenient_items")]
	pub source_documents: Vec<SourceDocument>,
	/// Relationships in both directions.
	#[serde(deserialize_with = "lenient_items")]
	pub relationships: Vec<Relationship>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_importance_overrides_connection_count() {
		let plain = GraphNode::new("a", "CONCEPT", "Alpha").with_connections(7);
		assert_eq!(plain.score(), 7.0);

		let weighted = plain.clone().with_importance(2.5);
		assert_eq!(weighted.score(), 2.5);

		let broken = plain.with_importance(f64::NAN);
		assert_eq!(broken.score(), 7.0);
	}

	#[test]
	fn test_partial_payload_is_defaulted() {
		let payload: SeedPayload = serde_json::from_str(
			r#"{"nodes":[{"id":"n1","type":"PERSON"}],"edges":[{"source":"n1","target":"n2"}]}"#,
		)
		.unwrap();

		assert_eq!(payload.nodes[0].name, "");
		assert_eq!(payload.nodes[0].connection_count, 0);
		assert_eq!(payload.edges[0].weight, 1.0);
		assert_eq!(payload.edges[0].kind, "");

		let empty: NeighborPayload = serde_json::from_str("{}").unwrap();
		assert!(empty.neighbors.is_empty() && empty.edges.is_empty());
	}

	#[test]
	fn test_null_fields_are_defaulted() {
		let payload: SeedPayload = serde_json::from_str(
			r#"{
				"nodes": [
					{"id": "n1", "type": "PERSON", "name": null, "connectionCount": null, "properties": null},
					{"id": "n2", "type": "PLACE", "connectionCount": -4, "properties": {"importance": "high"}},
					{"id": "n3", "type": "PLACE", "connectionCount": 6},
					42
				],
				"edges": [
					{"source": "n1", "target": "n2", "type": null, "weight": null},
					{"source": "n2", "target": "n3", "weight": "heavy"}
				]
			}"#,
		)
		.unwrap();

		assert_eq!(payload.nodes.len(), 3);
		assert_eq!(payload.nodes[0].name, "");
		assert_eq!(payload.nodes[0].connection_count, 0);
		assert_eq!(payload.nodes[0].properties, NodeProperties::default());
		assert_eq!(payload.nodes[1].connection_count, 0);
		assert_eq!(payload.nodes[1].properties.importance, None);
		assert_eq!(payload.nodes[2].connection_count, 6);
		assert_eq!(payload.edges[0].kind, "");
		assert_eq!(payload.edges[0].weight, 1.0);
		assert_eq!(payload.edges[1].weight, 1.0);

		let neighbors: NeighborPayload =
			serde_json::from_str(r#"{"neighbors": null, "edges": [{"source": "a", "target": "b", "weight": 2.5}]}"#)
				.unwrap();
		assert!(neighbors.neighbors.is_empty());
		assert_eq!(neighbors.edges[0].weight, 2.5);

		let details: NodeDetails =
			serde_json::from_str(r#"{"aliases": null, "connectionCount": null, "relationships": null}"#).unwrap();
		assert_eq!(details, NodeDetails::default());
	}

	#[test]
	fn test_node_details_decode() {
		let details: NodeDetails = serde_json::from_str(
			r#"{
				"description": "A thing",
				"connectionCount": 3,
				"sourceDocuments": [{"documentId": "d1", "documentTitle": "Deck"}],
				"relationships": [{"targetId": "b", "targetName": "Beta", "direction": "outgoing", "weight": 0.5, "edgeType": "MENTIONS"}]
			}"#,
		)
		.unwrap();

		assert_eq!(details.connection_count, 3);
		assert!(details.aliases.is_empty());
		assert_eq!(details.source_documents[0].document_title, "Deck");
		assert_eq!(details.relationships[0].edge_type, "MENTIONS");
		assert_eq!(details.relationships[0].edge_description, None);
	}

	#[test]
	fn test_other_end() {
		let edge = GraphEdge::new("a", "b", "LINKS");
		assert_eq!(edge.other_end("a"), Some("b"));
		assert_eq!(edge.other_end("b"), Some("a"));
		assert_eq!(edge.other_end("c"), None);
	}
}
