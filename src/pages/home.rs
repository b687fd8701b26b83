use std::rc::Rc;

use leptos::prelude::*;

use crate::components::graph_explorer::{
	GraphDataStore, GraphEdge, GraphExplorer, GraphNode, MemoryGraphStore,
};

const KINDS: [&str; 5] = ["PERSON", "ORGANIZATION", "CONCEPT", "LOCATION", "EVENT"];
const RELATIONS: [&str; 4] = ["RELATED_TO", "PART_OF", "MENTIONS", "LOCATED_IN"];

/// Generate a demo knowledge graph: a random tree with a few cross links.
fn generate_sample_graph(n: usize) -> (Vec<GraphNode>, Vec<GraphEdge>) {
	let nodes: Vec<GraphNode> = (0..n)
		.map(|i| {
			let kind = KINDS[(rand_simple(i * 7) * KINDS.len() as f64) as usize % KINDS.len()];
			let mut node = GraphNode::new(format!("n{}", i), kind, format!("{} {}", title_case(kind), i));
			node.description = Some(format!("Sample {} number {}", kind.to_lowercase(), i));
			if i % 9 == 0 {
				node = node.with_importance(4.0 + rand_simple(i) * 8.0);
			}
			node
		})
		.collect();

	let mut edges: Vec<GraphEdge> = (1..n)
		.map(|i| {
			let target = (rand_simple(i) * (i as f64)) as usize;
			GraphEdge::new(
				format!("n{}", i),
				format!("n{}", target),
				RELATIONS[i % RELATIONS.len()],
			)
			.with_weight(0.5 + rand_simple(i * 3) * 2.5)
		})
		.collect();
	edges.extend((0..n / 6).map(|i| {
		let (a, b) = (
			(rand_simple(i * 11) * n as f64) as usize,
			(rand_simple(i * 13 + 5) * n as f64) as usize,
		);
		GraphEdge::new(format!("n{}", a), format!("n{}", b), "MENTIONS")
	}));
	edges.retain(|e| e.source != e.target);

	(nodes, edges)
}

fn title_case(kind: &str) -> String {
	let lower = kind.to_lowercase();
	let mut chars = lower.chars();
	chars
		.next()
		.map(|c| c.to_uppercase().chain(chars).collect())
		.unwrap_or_default()
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

/// Demo page backed by an in-memory graph.
#[component]
pub fn Home() -> impl IntoView {
	let (nodes, edges) = generate_sample_graph(160);
	let store: Rc<dyn GraphDataStore> =
		Rc::new(MemoryGraphStore::new(nodes, edges).with_seed_size(60));

	view! {
		<div class="fullscreen-graph">
			<GraphExplorer store=store session_id="demo" fullscreen=true />
			<div class="graph-overlay">
				<h1>"Knowledge Graph"</h1>
				<p class="subtitle">
					"Click to select, double-click to expand. Drag nodes, scroll to zoom, drag the background to pan."
				</p>
			</div>
		</div>
	}
}
