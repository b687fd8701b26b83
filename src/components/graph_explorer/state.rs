use std::collections::HashSet;
use std::time::Duration;

use log::{debug, info};
use serde::Deserialize;

use super::interaction::{ClickTimer, GestureAction, GestureConfig, InteractionController};
use super::manager::{
	DEFAULT_MAX_VISIBLE, DEFAULT_NEIGHBOR_LIMIT, ExpandOutcome, ExpandTicket,
	IncrementalGraphManager, StructuralChange,
};
use super::simulation::{LayoutConfig, LayoutSimulator};
use super::store::StoreError;
use super::types::{NeighborPayload, NodeId, SeedPayload};
use super::viewport::{ScreenRect, ViewportController, ZoomDirection};

/// Energy injected after neighbors were merged in.
pub const MERGE_REHEAT: f32 = 0.3;
/// Energy injected after the type filter changed.
pub const FILTER_REHEAT: f32 = 0.2;
/// Energy injected when a dragged node is let go.
pub const RELEASE_REHEAT: f32 = 0.1;
/// Alpha target held while a node is being dragged.
pub const DRAG_ALPHA_TARGET: f32 = 0.3;

/// Tunables for one explorer, deserializable from a partial config.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
	/// Cap on the initially visible seed nodes.
	pub max_visible: usize,
	/// Cap passed to neighbor queries.
	pub neighbor_limit: usize,
	/// Click and drag thresholds.
	pub gestures: GestureConfig,
	/// Force constants.
	pub layout: LayoutConfig,
}

impl Default for ExplorerConfig {
	fn default() -> Self {
		Self {
			max_visible: DEFAULT_MAX_VISIBLE,
			neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
			gestures: GestureConfig::default(),
			layout: LayoutConfig::default(),
		}
	}
}

/// Hover target and the eased highlight around it.
#[derive(Clone, Debug, Default)]
pub struct HoverState {
	/// Node under the pointer.
	pub node: Option<NodeId>,
	/// Node the highlight is drawn around; outlives `node` while fading out.
	pub focus: Option<NodeId>,
	/// Rendered neighbors of `focus`.
	pub neighbors: HashSet<NodeId>,
	/// Highlight strength in `[0, 1]`.
	pub highlight_t: f64,
	delay_t: f64,
}

/// Everything one mounted explorer owns.
pub struct ExplorerState<H: ClickTimer> {
	/// Session graph and its visible subset.
	pub graph: IncrementalGraphManager,
	/// Positions of the rendered nodes.
	pub layout: LayoutSimulator,
	/// Pan and zoom window.
	pub viewport: ViewportController,
	/// Pointer and click state machine.
	pub gestures: InteractionController<H>,
	/// Current hover highlight.
	pub hover: HoverState,
	/// Canvas width in CSS pixels.
	pub width: f64,
	/// Canvas height in CSS pixels.
	pub height: f64,
	/// Settings the state was built with.
	pub config: ExplorerConfig,
	synced_revision: u64,
}

impl<H: ClickTimer> ExplorerState<H> {
	/// Empty explorer for a `width` by `height` canvas.
	pub fn new(config: ExplorerConfig, width: f64, height: f64) -> Self {
		Self {
			graph: IncrementalGraphManager::new(config.max_visible),
			layout: LayoutSimulator::new(config.layout.clone()),
			viewport: ViewportController::new(width, height),
			gestures: InteractionController::new(config.gestures.clone()),
			hover: HoverState::default(),
			width,
			height,
			config,
			synced_revision: 0,
		}
	}

	/// Replace the graph with a seed payload and reset the view.
	pub fn seed(&mut self, payload: SeedPayload) {
		self.graph.seed(payload);
		self.hover = HoverState::default();
		self.viewport.reset();
		self.sync_layout();
	}

	/// Rebuild the simulation if the manager changed structurally since the
	/// last sync: restart on a reseed, keep positions and reheat otherwise.
	pub fn sync_layout(&mut self) {
		let revision = self.graph.revision();
		if revision == self.synced_revision {
			return;
		}
		self.synced_revision = revision;

		let visible = self.graph.visible_graph();
		match self.graph.last_change() {
			Some(StructuralChange::Reseeded) | None => self.layout.restart(&visible),
			Some(StructuralChange::Merged) => self.layout.merge(&visible, MERGE_REHEAT),
			Some(StructuralChange::Filtered) => self.layout.merge(&visible, FILTER_REHEAT),
		}
	}

	/// Advance layout and hover easing by `dt` seconds.
	pub fn tick(&mut self, dt: f32) {
		self.sync_layout();
		self.layout.tick(dt);

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};
		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt as f64).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.focus = None;
				self.hover.neighbors.clear();
			}
		}
	}

	/// Follow a canvas resize.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.viewport.resize(width, height);
	}

	// =========================================================================
	// HIT TESTING / HOVER
	// =========================================================================

	/// Topmost rendered node under a page coordinate.
	pub fn node_at_screen(&self, px: f64, py: f64, rect: &ScreenRect) -> Option<NodeId> {
		let (x, y) = self.viewport.screen_to_layout(px, py, rect);
		self.layout.node_at(x, y).map(|n| n.id().to_owned())
	}

	/// Change the hovered node, recomputing the highlighted neighborhood.
	pub fn set_hover(&mut self, node: Option<NodeId>) {
		if self.hover.node == node {
			return;
		}
		if self.hover.node.is_none() {
			self.hover.delay_t = 0.0;
		}
		self.hover.node = node;
		let Some(id) = self.hover.node.clone() else {
			// keep the old focus so the highlight can fade out
			return;
		};

		self.hover.neighbors.clear();
		for edge in self.layout.frame().edges.iter() {
			if let Some(other) = edge.edge.other_end(&id) {
				self.hover.neighbors.insert(other.to_owned());
			}
		}
		self.hover.focus = Some(id);
	}

	/// Whether `id` is the hover focus or one of its neighbors.
	pub fn is_highlighted(&self, id: &str) -> bool {
		self.hover.focus.as_deref() == Some(id) || self.hover.neighbors.contains(id)
	}

	/// Whether `id` is the hover focus.
	pub fn is_hovered(&self, id: &str) -> bool {
		self.hover.focus.as_deref() == Some(id)
	}

	/// Whether a highlight is visible at all.
	pub fn has_active_highlight(&self) -> bool {
		self.hover.focus.is_some() && self.hover.highlight_t > 0.0
	}

	// =========================================================================
	// POINTER INPUT
	// =========================================================================

	/// Start a press at a page coordinate.
	pub fn pointer_down(&mut self, px: f64, py: f64, rect: &ScreenRect) {
		let hit = self.node_at_screen(px, py, rect);
		self.gestures.pointer_down(px, py, hit);
	}

	/// Pointer moved: pan, drag or update hover.
	pub fn pointer_move(&mut self, px: f64, py: f64, rect: &ScreenRect) {
		let actions = self.gestures.pointer_move(px, py);
		if actions.is_empty() && !self.gestures.is_panning() && !self.gestures.is_dragging() {
			let hovered = self.node_at_screen(px, py, rect);
			self.set_hover(hovered);
		}
		for action in actions {
			self.apply(action, rect);
		}
	}

	/// Returns a ticket when the release completed a double click on a node
	/// that can be expanded; the caller runs the fetch.
	pub fn pointer_up<F>(&mut self, rect: &ScreenRect, schedule: F) -> Option<ExpandTicket>
	where
		F: FnOnce(NodeId, Duration) -> H,
	{
		let actions = self.gestures.pointer_up(schedule);
		self.apply_all(actions, rect)
	}

	/// Abort the current press, releasing any dragged node.
	pub fn pointer_cancel(&mut self, rect: &ScreenRect) {
		let actions = self.gestures.pointer_cancel();
		self.apply_all(actions, rect);
		self.set_hover(None);
	}

	/// The single-click window for `node` elapsed.
	pub fn click_timer_fired(&mut self, node: &str, rect: &ScreenRect) {
		if let Some(action) = self.gestures.click_timer_fired(node) {
			self.apply(action, rect);
		}
	}

	fn apply_all(&mut self, actions: Vec<GestureAction>, rect: &ScreenRect) -> Option<ExpandTicket> {
		actions
			.into_iter()
			.fold(None, |ticket, action| self.apply(action, rect).or(ticket))
	}

	fn apply(&mut self, action: GestureAction, rect: &ScreenRect) -> Option<ExpandTicket> {
		match action {
			GestureAction::Pan { dx, dy } => self.viewport.pan(dx, dy),
			GestureAction::DragStart { node } => {
				debug!("Pinning {} for drag", node);
				self.layout.set_alpha_target(DRAG_ALPHA_TARGET);
				self.layout.reheat(DRAG_ALPHA_TARGET);
				self.set_hover(Some(node));
			}
			GestureAction::DragMove { node, x, y } => {
				let (lx, ly) = self.viewport.screen_to_layout(x, y, rect);
				self.layout.pin(&node, lx, ly);
			}
			GestureAction::DragEnd { node } => {
				self.layout.unpin(&node);
				self.layout.set_alpha_target(0.0);
				self.layout.reheat(RELEASE_REHEAT);
			}
			GestureAction::ToggleSelection { node } => self.graph.toggle_selection(&node),
			GestureAction::SelectAndExpand { node } => {
				self.graph.select(Some(&node));
				return self.graph.begin_expand(&node);
			}
		}
		None
	}

	// =========================================================================
	// EXPANSION / FILTER / ZOOM
	// =========================================================================

	/// Claim the expansion slot for `node`.
	pub fn expand(&mut self, node: &str) -> Option<ExpandTicket> {
		self.graph.begin_expand(node)
	}

	/// Apply the neighbor fetch started with `ticket`.
	pub fn finish_expand(
		&mut self,
		ticket: ExpandTicket,
		result: Result<NeighborPayload, StoreError>,
	) -> ExpandOutcome {
		let outcome = self.graph.finish_expand(ticket, result);
		self.sync_layout();
		outcome
	}

	/// Show or hide nodes of type `kind`.
	pub fn set_type_filter(&mut self, kind: &str, active: bool) {
		if self.graph.set_type_filter(kind, active) {
			self.sync_layout();
		}
	}

	/// Zoom one step about the visible center.
	pub fn zoom(&mut self, direction: ZoomDirection) {
		self.viewport.zoom(direction);
	}

	/// Teardown: cancel the click timer and make every in-flight fetch stale.
	pub fn shutdown(&mut self) {
		self.gestures.cancel_pending();
		self.graph.close();
		info!("Graph explorer shut down");
	}
}
