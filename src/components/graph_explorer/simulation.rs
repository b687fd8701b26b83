//! Force layout over the visible subgraph.
//!
//! Spring and charge forces are integrated by [`force_graph`]; on top of each
//! integration step the simulator runs an alpha-scaled link-distance pass,
//! centering, weak per-axis springs and collision separation. The simulator
//! is the only writer of positions. After every tick it publishes a
//! [`LayoutFrame`], and everything else (render, hit testing, hover) reads
//! that frame only.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::f32::consts::TAU;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;
use serde::Deserialize;

use super::manager::VisibleGraph;
use super::scale;
use super::types::{GraphEdge, GraphNode, NodeId};

/// Force constants. The first five feed [`SimulationParameters`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
	/// Repulsion between every pair of nodes.
	pub charge: f32,
	/// Attraction along edges.
	pub spring: f32,
	/// Cap on the force applied per step.
	pub max_force: f32,
	/// Velocity scale of the integrator.
	pub node_speed: f32,
	/// Velocity kept between steps.
	pub damping: f32,
	/// Target separation of linked nodes.
	pub link_distance: f32,
	/// How hard the link pass corrects toward `link_distance`.
	pub link_strength: f32,
	/// Pull of the centroid toward the layout origin.
	pub center_strength: f32,
	/// Per-axis spring toward the origin.
	pub axis_strength: f32,
	/// Gap kept between node circles on top of their radii.
	pub collision_margin: f32,
	/// Fraction of the remaining alpha lost per tick.
	pub alpha_decay: f32,
	/// Below this alpha the layout counts as settled.
	pub alpha_min: f32,
}

impl Default for LayoutConfig {
	fn default() -> Self {
		Self {
			charge: 150.0,
			spring: 0.05,
			max_force: 100.0,
			node_speed: 3000.0,
			damping: 0.9,
			link_distance: 90.0,
			link_strength: 0.3,
			center_strength: 0.1,
			axis_strength: 0.03,
			collision_margin: 4.0,
			alpha_decay: 0.0228,
			alpha_min: 0.001,
		}
	}
}

impl LayoutConfig {
	fn parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: self.charge,
			force_spring: self.spring,
			force_max: self.max_force,
			node_speed: self.node_speed,
			damping_factor: self.damping,
		}
	}
}

/// A graph node with its layout position for one frame.
#[derive(Clone, Debug)]
pub struct PositionedNode {
	/// The node being placed.
	pub node: Rc<GraphNode>,
	/// Horizontal layout coordinate.
	pub x: f64,
	/// Vertical layout coordinate.
	pub y: f64,
	/// Pinned coordinates; set while the node is being dragged.
	pub fx: Option<f64>,
	/// See `fx`.
	pub fy: Option<f64>,
	/// Drawn radius, from the node score.
	pub radius: f64,
}

impl PositionedNode {
	/// Id of the placed node.
	pub fn id(&self) -> &str {
		&self.node.id
	}

	/// False when the integrator produced NaN or infinity.
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}

	/// Whether both pin coordinates are set.
	pub fn is_pinned(&self) -> bool {
		self.fx.is_some() && self.fy.is_some()
	}
}

/// Edge endpoint, resolved once when the simulation is (re)built.
#[derive(Clone, Debug, PartialEq)]
pub enum Endpoint {
	/// Index into [`LayoutFrame::nodes`].
	Node(usize),
	/// Not part of the simulation; the edge is never drawn.
	Missing(NodeId),
}

/// A graph edge with its endpoints resolved against the frame.
#[derive(Clone, Debug)]
pub struct PositionedEdge {
	/// The edge being drawn.
	pub edge: GraphEdge,
	/// Resolved source.
	pub source: Endpoint,
	/// Resolved target.
	pub target: Endpoint,
}

/// Immutable snapshot taken at a tick boundary.
#[derive(Clone, Debug, Default)]
pub struct LayoutFrame {
	/// Placed nodes, in simulation order.
	pub nodes: Rc<[PositionedNode]>,
	/// Edges with resolved endpoints.
	pub edges: Rc<[PositionedEdge]>,
	/// Ticks run since the last rebuild.
	pub tick: u64,
}

impl LayoutFrame {
	/// Both endpoints of `edge`, if both are in the frame with finite positions.
	pub fn endpoints(&self, edge: &PositionedEdge) -> Option<(&PositionedNode, &PositionedNode)> {
		let (Endpoint::Node(s), Endpoint::Node(t)) = (&edge.source, &edge.target) else {
			return None;
		};
		let (s, t) = (self.nodes.get(*s)?, self.nodes.get(*t)?);
		(s.is_finite() && t.is_finite()).then_some((s, t))
	}

	/// Placed node by id.
	pub fn node(&self, id: &str) -> Option<&PositionedNode> {
		self.nodes.iter().find(|n| n.id() == id)
	}
}

#[derive(Clone, Debug, Default)]
struct SimNode {
	slot: usize,
}

struct Slot {
	node: Rc<GraphNode>,
	graph_idx: DefaultNodeIdx,
	radius: f32,
	pin: Option<(f32, f32)>,
}

/// Owns node positions for the visible graph and cools them toward rest.
pub struct LayoutSimulator {
	graph: ForceGraph<SimNode, ()>,
	slots: Vec<Slot>,
	links: Vec<(usize, usize)>,
	frame: LayoutFrame,
	config: LayoutConfig,
	alpha: f32,
	alpha_target: f32,
	center: (f32, f32),
	rebuilds: u64,
}

impl LayoutSimulator {
	/// Empty, settled simulator.
	pub fn new(config: LayoutConfig) -> Self {
		Self {
			graph: ForceGraph::new(config.parameters()),
			slots: Vec::new(),
			links: Vec::new(),
			frame: LayoutFrame::default(),
			config,
			alpha: 0.0,
			alpha_target: 0.0,
			center: (0.0, 0.0),
			rebuilds: 0,
		}
	}

	// =========================================================================
	// REBUILD / REHEAT
	// =========================================================================

	/// Rebuild for a new node/edge identity set and start cooling from scratch.
	pub fn restart(&mut self, graph: &VisibleGraph) {
		self.load(graph);
		self.alpha = 1.0;
		debug!("Layout restarted with {} nodes", self.slots.len());
	}

	/// Rebuild for a changed node set without discarding positions, then
	/// inject `alpha` worth of energy.
	pub fn merge(&mut self, graph: &VisibleGraph, alpha: f32) {
		self.load(graph);
		self.reheat(alpha);
	}

	/// Raise alpha to at least `alpha`.
	pub fn reheat(&mut self, alpha: f32) {
		self.alpha = self.alpha.max(alpha);
		debug!("Layout reheated to {:.3}", self.alpha);
	}

	/// Level the simulation cools toward; held above zero while dragging.
	pub fn set_alpha_target(&mut self, target: f32) {
		self.alpha_target = target;
	}

	/// Current energy level.
	pub fn alpha(&self) -> f32 {
		self.alpha
	}

	/// Whether alpha has cooled below `alpha_min`.
	pub fn is_settled(&self) -> bool {
		self.alpha < self.config.alpha_min
	}

	/// How many times the simulation buffers were rebuilt.
	pub fn rebuilds(&self) -> u64 {
		self.rebuilds
	}

	fn load(&mut self, graph: &VisibleGraph) {
		let previous = std::mem::take(&mut self.frame);
		let known: HashMap<&str, &PositionedNode> = previous
			.nodes
			.iter()
			.filter(|n| n.is_finite())
			.map(|n| (n.id(), n))
			.collect();

		self.graph = ForceGraph::new(self.config.parameters());
		self.slots.clear();
		self.links.clear();

		let mut slot_of: HashMap<&str, usize> = HashMap::new();
		for node in &graph.nodes {
			let slot = self.slots.len();
			let (x, y, pin) = match known.get(node.id.as_str()) {
				Some(prev) => (
					prev.x as f32,
					prev.y as f32,
					prev.fx.zip(prev.fy).map(|(fx, fy)| (fx as f32, fy as f32)),
				),
				None => {
					let (x, y) = self.initial_position(node, graph, &known);
					(x, y, None)
				}
			};
			let (x, y) = pin.unwrap_or((x, y));
			let graph_idx = self.graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: pin.is_some(),
				user_data: SimNode { slot },
			});
			self.slots.push(Slot {
				node: node.clone(),
				graph_idx,
				radius: scale::node_radius(node.score()) as f32,
				pin,
			});
			slot_of.insert(node.id.as_str(), slot);
		}

		let resolve = |id: &str| match slot_of.get(id) {
			Some(&slot) => Endpoint::Node(slot),
			None => Endpoint::Missing(id.to_owned()),
		};
		let mut edges = Vec::with_capacity(graph.edges.len());
		for edge in &graph.edges {
			let (source, target) = (resolve(&edge.source), resolve(&edge.target));
			if let (Endpoint::Node(s), Endpoint::Node(t)) = (&source, &target) {
				if s != t {
					self.graph.add_edge(
						self.slots[*s].graph_idx,
						self.slots[*t].graph_idx,
						EdgeData::default(),
					);
					self.links.push((*s, *t));
				}
			}
			edges.push(PositionedEdge {
				edge: edge.clone(),
				source,
				target,
			});
		}

		self.rebuilds += 1;
		let positions = self.positions();
		self.publish(&positions, edges.into(), previous.tick);
	}

	/// New nodes start next to their already-placed neighbors, or around the
	/// center when they have none.
	fn initial_position(
		&self,
		node: &GraphNode,
		graph: &VisibleGraph,
		known: &HashMap<&str, &PositionedNode>,
	) -> (f32, f32) {
		let (mut sx, mut sy, mut count) = (0.0, 0.0, 0);
		for edge in graph.edges.iter().filter(|e| e.touches(&node.id)) {
			if let Some(other) = edge.other_end(&node.id).and_then(|id| known.get(id)) {
				sx += other.x as f32;
				sy += other.y as f32;
				count += 1;
			}
		}
		if count > 0 {
			let (dx, dy) = scatter(&node.id, self.config.link_distance * 0.6);
			(sx / count as f32 + dx, sy / count as f32 + dy)
		} else {
			let (dx, dy) = scatter(&node.id, 150.0);
			(self.center.0 + dx, self.center.1 + dy)
		}
	}

	// =========================================================================
	// PINNING
	// =========================================================================

	/// Fix `id` at `(x, y)` until [`LayoutSimulator::unpin`]. Non-finite
	/// coordinates are ignored.
	pub fn pin(&mut self, id: &str, x: f64, y: f64) {
		let Some(slot) = self.slot_of(id) else {
			return;
		};
		let pin = (x as f32, y as f32);
		if !(pin.0.is_finite() && pin.1.is_finite()) {
			return;
		}
		self.slots[slot].pin = Some(pin);
		let mut positions = self.positions();
		positions[slot] = pin;
		self.write_back(&positions);
		self.publish(&positions, self.frame.edges.clone(), self.frame.tick);
	}

	/// Let `id` move freely again.
	pub fn unpin(&mut self, id: &str) {
		let Some(slot) = self.slot_of(id) else {
			return;
		};
		self.slots[slot].pin = None;
		let positions = self.positions();
		self.write_back(&positions);
		self.publish(&positions, self.frame.edges.clone(), self.frame.tick);
	}

	fn slot_of(&self, id: &str) -> Option<usize> {
		self.slots.iter().position(|s| s.node.id == id)
	}

	// =========================================================================
	// SIMULATION
	// =========================================================================

	/// Advance one frame. Returns `false` once the layout has settled.
	pub fn tick(&mut self, dt: f32) -> bool {
		if self.slots.is_empty() {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
		if self.alpha < self.config.alpha_min {
			return false;
		}

		let before = self.positions();
		self.graph.update(dt * self.alpha.min(1.0));
		let mut positions = self.positions();
		for (p, b) in positions.iter_mut().zip(&before) {
			if !(p.0.is_finite() && p.1.is_finite()) {
				*p = *b;
			}
		}

		self.apply_links(&mut positions);
		self.apply_centering(&mut positions);
		self.apply_collisions(&mut positions);
		for (p, slot) in positions.iter_mut().zip(&self.slots) {
			if let Some(pin) = slot.pin {
				*p = pin;
			}
		}

		self.write_back(&positions);
		self.publish(&positions, self.frame.edges.clone(), self.frame.tick + 1);
		true
	}

	fn apply_links(&self, positions: &mut [(f32, f32)]) {
		for &(s, t) in &self.links {
			let (dx, dy) = (positions[t].0 - positions[s].0, positions[t].1 - positions[s].1);
			let len = (dx * dx + dy * dy).sqrt().max(1e-3);
			let k = (len - self.config.link_distance) / len
				* self.alpha
				* self.config.link_strength
				* 0.5;
			if self.slots[t].pin.is_none() {
				positions[t].0 -= dx * k;
				positions[t].1 -= dy * k;
			}
			if self.slots[s].pin.is_none() {
				positions[s].0 += dx * k;
				positions[s].1 += dy * k;
			}
		}
	}

	fn apply_centering(&self, positions: &mut [(f32, f32)]) {
		let n = positions.len() as f32;
		let (mx, my) = positions
			.iter()
			.fold((0.0, 0.0), |(ax, ay), p| (ax + p.0 / n, ay + p.1 / n));
		let (shift_x, shift_y) = (
			(self.center.0 - mx) * self.config.center_strength,
			(self.center.1 - my) * self.config.center_strength,
		);
		let axis = self.config.axis_strength * self.alpha;
		for (p, slot) in positions.iter_mut().zip(&self.slots) {
			if slot.pin.is_some() {
				continue;
			}
			p.0 += shift_x + (self.center.0 - p.0) * axis;
			p.1 += shift_y + (self.center.1 - p.1) * axis;
		}
	}

	fn apply_collisions(&self, positions: &mut [(f32, f32)]) {
		let n = positions.len();
		for i in 0..n {
			for j in (i + 1)..n {
				let min = self.slots[i].radius + self.slots[j].radius + self.config.collision_margin;
				let (mut dx, mut dy) = (positions[j].0 - positions[i].0, positions[j].1 - positions[i].1);
				let mut dist = (dx * dx + dy * dy).sqrt();
				if dist >= min {
					continue;
				}
				if dist < 1e-3 {
					// Coincident: separate along a fixed per-pair direction.
					let angle = (i * 31 + j) as f32 * 2.399_963;
					(dx, dy, dist) = (angle.cos(), angle.sin(), 1.0);
				}
				let push = (min - dist) / dist;
				let (i_free, j_free) = (self.slots[i].pin.is_none(), self.slots[j].pin.is_none());
				let share = match (i_free, j_free) {
					(true, true) => 0.5,
					(false, false) => continue,
					_ => 1.0,
				};
				if i_free {
					positions[i].0 -= dx * push * share;
					positions[i].1 -= dy * push * share;
				}
				if j_free {
					positions[j].0 += dx * push * share;
					positions[j].1 += dy * push * share;
				}
			}
		}
	}

	fn positions(&self) -> Vec<(f32, f32)> {
		let mut out = vec![(f32::NAN, f32::NAN); self.slots.len()];
		self.graph.visit_nodes(|node| {
			if let Some(p) = out.get_mut(node.data.user_data.slot) {
				*p = (node.x(), node.y());
			}
		});
		out
	}

	fn write_back(&mut self, positions: &[(f32, f32)]) {
		let slots = &self.slots;
		self.graph.visit_nodes_mut(|node| {
			let slot = node.data.user_data.slot;
			if let (Some(&(x, y)), Some(s)) = (positions.get(slot), slots.get(slot)) {
				node.data.x = x;
				node.data.y = y;
				node.data.is_anchor = s.pin.is_some();
			}
		});
	}

	fn publish(&mut self, positions: &[(f32, f32)], edges: Rc<[PositionedEdge]>, tick: u64) {
		let nodes: Rc<[PositionedNode]> = self
			.slots
			.iter()
			.zip(positions)
			.map(|(slot, &(x, y))| PositionedNode {
				node: slot.node.clone(),
				x: x as f64,
				y: y as f64,
				fx: slot.pin.map(|p| p.0 as f64),
				fy: slot.pin.map(|p| p.1 as f64),
				radius: slot.radius as f64,
			})
			.collect();
		self.frame = LayoutFrame { nodes, edges, tick };
	}

	// =========================================================================
	// READ SIDE
	// =========================================================================

	/// Snapshot from the most recent tick.
	pub fn frame(&self) -> &LayoutFrame {
		&self.frame
	}

	/// Topmost node whose circle contains the layout point.
	pub fn node_at(&self, x: f64, y: f64) -> Option<&PositionedNode> {
		self.frame.nodes.iter().rev().find(|n| {
			n.is_finite() && {
				let (dx, dy) = (n.x - x, n.y - y);
				(dx * dx + dy * dy).sqrt() <= n.radius + 2.0
			}
		})
	}
}

/// Deterministic pseudo-random offset, at most `spread` from the origin.
fn scatter(id: &str, spread: f32) -> (f32, f32) {
	let mut hasher = DefaultHasher::new();
	id.hash(&mut hasher);
	let h = hasher.finish();
	let angle = (h & 0xFFFF) as f32 / 65536.0 * TAU;
	let dist = spread * (0.5 + ((h >> 16) & 0xFFFF) as f32 / 131_072.0);
	(angle.cos() * dist, angle.sin() * dist)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn graph(ids: &[&str], links: &[(&str, &str)]) -> VisibleGraph {
		VisibleGraph {
			nodes: ids
				.iter()
				.map(|id| Rc::new(GraphNode::new(*id, "CONCEPT", *id).with_connections(4)))
				.collect(),
			edges: links
				.iter()
				.map(|(s, t)| GraphEdge::new(*s, *t, "LINKS"))
				.collect(),
		}
	}

	fn run(sim: &mut LayoutSimulator, ticks: usize) {
		for _ in 0..ticks {
			sim.tick(0.016);
		}
	}

	fn distance(frame: &LayoutFrame, a: &str, b: &str) -> f64 {
		let (a, b) = (frame.node(a).unwrap(), frame.node(b).unwrap());
		((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
	}

	#[test]
	fn test_restart_places_every_node() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		sim.restart(&graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));

		let frame = sim.frame();
		assert_eq!(frame.nodes.len(), 3);
		assert!(frame.nodes.iter().all(|n| n.is_finite() && !n.is_pinned()));
		assert_eq!(frame.edges.len(), 2);
		assert_eq!(sim.alpha(), 1.0);
		assert_eq!(sim.rebuilds(), 1);
	}

	#[test]
	fn test_layout_stays_finite_and_separated() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		let ids = ["a", "b", "c", "d", "e", "f"];
		sim.restart(&graph(&ids, &[("a", "b"), ("a", "c"), ("a", "d"), ("e", "f")]));
		run(&mut sim, 400);

		let frame = sim.frame();
		assert!(frame.nodes.iter().all(PositionedNode::is_finite));
		for (i, a) in ids.iter().enumerate() {
			for b in &ids[i + 1..] {
				assert!(distance(frame, a, b) > 1.0, "{a} and {b} overlap");
			}
		}
	}

	#[test]
	fn test_alpha_cools_until_settled() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		sim.restart(&graph(&["a", "b"], &[("a", "b")]));
		let mut ticks = 0;
		while sim.tick(0.016) {
			ticks += 1;
			assert!(ticks < 10_000);
		}
		assert!(sim.is_settled());

		let frame_tick = sim.frame().tick;
		assert!(!sim.tick(0.016));
		assert_eq!(sim.frame().tick, frame_tick);

		sim.reheat(0.3);
		assert!(sim.tick(0.016));
	}

	#[test]
	fn test_merge_keeps_existing_positions() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		sim.restart(&graph(&["a", "b"], &[("a", "b")]));
		run(&mut sim, 50);
		let a = sim.frame().node("a").unwrap().clone();

		sim.merge(&graph(&["a", "b", "c"], &[("a", "b"), ("a", "c")]), 0.3);

		let frame = sim.frame();
		let a_after = frame.node("a").unwrap();
		assert_eq!((a_after.x, a_after.y), (a.x, a.y));
		assert!(frame.node("c").unwrap().is_finite());
		assert!(distance(frame, "a", "c") < 150.0, "new neighbor spawns near its parent");
		assert!(sim.alpha() >= 0.3);
		assert_eq!(sim.rebuilds(), 2);
	}

	#[test]
	fn test_pin_holds_node_and_survives_rebuild() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		sim.restart(&graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]));
		sim.pin("b", 42.0, -17.0);
		run(&mut sim, 30);

		let b = sim.frame().node("b").unwrap();
		assert_eq!((b.x, b.y), (42.0, -17.0));
		assert_eq!((b.fx, b.fy), (Some(42.0), Some(-17.0)));

		sim.merge(&graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c")]), 0.3);
		assert!(sim.frame().node("b").unwrap().is_pinned());

		sim.unpin("b");
		let b = sim.frame().node("b").unwrap();
		assert_eq!((b.fx, b.fy), (None, None));
	}

	#[test]
	fn test_missing_endpoint_is_tagged() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		let mut g = graph(&["a", "b"], &[("a", "b")]);
		g.edges.push(GraphEdge::new("a", "ghost", "LINKS"));
		sim.restart(&g);

		let frame = sim.frame();
		assert!(frame.endpoints(&frame.edges[0]).is_some());
		assert_eq!(frame.edges[1].target, Endpoint::Missing("ghost".into()));
		assert!(frame.endpoints(&frame.edges[1]).is_none());
	}

	#[test]
	fn test_node_at_hits_topmost() {
		let mut sim = LayoutSimulator::new(LayoutConfig::default());
		sim.restart(&graph(&["a", "b"], &[]));
		sim.pin("a", 0.0, 0.0);
		sim.pin("b", 300.0, 0.0);

		assert_eq!(sim.node_at(1.0, 1.0).map(PositionedNode::id), Some("a"));
		assert_eq!(sim.node_at(300.0, 2.0).map(PositionedNode::id), Some("b"));
		assert!(sim.node_at(150.0, 0.0).is_none());
	}
}
