//! Incremental knowledge-graph explorer: a bounded seed view that grows one
//! double-clicked node at a time, laid out by a force simulation on canvas.

mod component;
mod detail;
mod http;
mod interaction;
mod manager;
mod render;
mod scale;
mod simulation;
mod state;
mod store;
mod types;
mod viewport;

pub use component::{BrowserTimer, GraphExplorer};
pub use detail::{DetailPanel, DetailRequests, DetailView};
pub use http::HttpGraphStore;
pub use interaction::{
	CLICK_DELAY, ClickPhase, ClickTimer, DRAG_THRESHOLD_PX, GestureAction, GestureConfig,
	InteractionController,
};
pub use manager::{
	DEFAULT_MAX_VISIBLE, DEFAULT_NEIGHBOR_LIMIT, ExpandOutcome, ExpandTicket,
	IncrementalGraphManager, StructuralChange, VisibleGraph, prioritized_top_k,
};
pub use scale::{edge_opacity, node_radius, truncate_label, type_color};
pub use simulation::{
	Endpoint, LayoutConfig, LayoutFrame, LayoutSimulator, PositionedEdge, PositionedNode,
};
pub use state::{ExplorerConfig, ExplorerState, HoverState};
pub use store::{GraphDataStore, MemoryGraphStore, StoreError};
pub use types::{
	EdgeKey, GraphEdge, GraphNode, NeighborPayload, NodeDetails, NodeId, NodeProperties,
	Relationship, SeedPayload, SourceDocument,
};
pub use viewport::{MAX_SIZE, MIN_SIZE, ScreenRect, ViewBox, ViewportController, ZoomDirection};
