//! Visual scales: score to radius, weight to opacity, name to label, type to color.

/// Radius of the least important node.
pub const MIN_NODE_RADIUS: f64 = 6.0;
/// Radius of the most important node.
pub const MAX_NODE_RADIUS: f64 = 20.0;
/// Opacity of the weakest edge.
pub const MIN_EDGE_OPACITY: f64 = 0.2;
/// Opacity of the strongest edge.
pub const MAX_EDGE_OPACITY: f64 = 0.8;
/// Labels longer than this are cut with an ellipsis.
pub const LABEL_MAX_CHARS: usize = 14;

/// Extra radius of the selection ring.
pub const SELECTED_RING_OFFSET: f64 = 4.0;
/// Extra radius of the dashed "already expanded" ring.
pub const EXPANDED_RING_OFFSET: f64 = 2.0;

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

/// Radius for a node score; NaN maps to the minimum.
pub fn node_radius(score: f64) -> f64 {
	if score.is_nan() {
		return MIN_NODE_RADIUS;
	}
	(score * 1.5).clamp(MIN_NODE_RADIUS, MAX_NODE_RADIUS)
}

/// Stroke opacity for an edge weight; NaN maps to the minimum.
pub fn edge_opacity(weight: f64) -> f64 {
	if weight.is_nan() {
		return MIN_EDGE_OPACITY;
	}
	(weight * 0.3).clamp(MIN_EDGE_OPACITY, MAX_EDGE_OPACITY)
}

/// Node name cut to [`LABEL_MAX_CHARS`] characters plus an ellipsis.
pub fn truncate_label(name: &str) -> String {
	if name.chars().count() <= LABEL_MAX_CHARS {
		return name.to_owned();
	}
	let mut label: String = name.chars().take(LABEL_MAX_CHARS).collect();
	label.push('…');
	label
}

/// Palette color for the `ordinal`-th known node type.
pub fn type_color(ordinal: usize) -> &'static str {
	COLORS[ordinal % COLORS.len()]
}
