use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::interaction::ClickTimer;
use super::scale::{self, EXPANDED_RING_OFFSET, SELECTED_RING_OFFSET};
use super::simulation::PositionedNode;
use super::state::ExplorerState;

fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Draw the most recent layout frame inside the current view box.
pub fn render<H: ClickTimer>(state: &ExplorerState<H>, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);

	let (ox, oy) = state.viewport.origin();
	let k = 1.0 / state.viewport.scale();
	ctx.save();
	let _ = ctx.scale(k, k);
	let _ = ctx.translate(-ox, -oy);
	draw_edges(state, ctx, k);
	draw_nodes(state, ctx, k);
	ctx.restore();
}

fn draw_edges<H: ClickTimer>(state: &ExplorerState<H>, ctx: &CanvasRenderingContext2d, k: f64) {
	let frame = state.layout.frame();
	let (has_highlight, t) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
	);

	for edge in frame.edges.iter() {
		let Some((s, d)) = frame.endpoints(edge) else {
			continue;
		};
		let (dx, dy) = (d.x - s.x, d.y - s.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}

		let base = scale::edge_opacity(edge.edge.weight);
		let alpha = if !has_highlight {
			base
		} else if state.is_highlighted(s.id()) && state.is_highlighted(d.id()) {
			base + (1.0 - base) * 0.5 * t
		} else {
			base * (1.0 - 0.75 * t)
		};

		let (ux, uy) = (dx / dist, dy / dist);
		ctx.set_stroke_style_str(&format!("rgba(100, 180, 255, {})", alpha));
		ctx.set_line_width(1.5 / k);
		ctx.begin_path();
		ctx.move_to(s.x + ux * s.radius, s.y + uy * s.radius);
		ctx.line_to(d.x - ux * d.radius, d.y - uy * d.radius);
		ctx.stroke();
	}
}

fn draw_nodes<H: ClickTimer>(state: &ExplorerState<H>, ctx: &CanvasRenderingContext2d, k: f64) {
	let frame = state.layout.frame();
	let (has_highlight, t) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
	);
	let selected = state.graph.selected();
	let expanding = state.graph.expanding();

	for node in frame.nodes.iter() {
		if !node.is_finite() || !state.viewport.is_visible(node.x, node.y, node.radius + 8.0) {
			continue;
		}
		let (x, y, radius) = (node.x, node.y, node.radius);
		let highlighted = state.is_highlighted(node.id());
		let alpha = if has_highlight && !highlighted {
			1.0 - 0.7 * t
		} else {
			1.0
		};

		if has_highlight && state.is_hovered(node.id()) && t > 0.01 {
			draw_glow(ctx, x, y, radius, t);
		}

		ctx.set_global_alpha(alpha);
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(scale::type_color(state.graph.type_ordinal(&node.node.kind)));
		ctx.fill();

		if state.graph.is_expanded(node.id()) || expanding == Some(node.id()) {
			let dash = 3.0 / k;
			let _ = ctx.set_line_dash(&js_sys::Array::of2(
				&JsValue::from_f64(dash),
				&JsValue::from_f64(dash),
			));
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + EXPANDED_RING_OFFSET, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("rgba(255, 255, 255, 0.6)");
			ctx.set_line_width(1.0 / k);
			ctx.stroke();
			let _ = ctx.set_line_dash(&js_sys::Array::new());
		}

		if selected == Some(node.id()) {
			ctx.begin_path();
			let _ = ctx.arc(x, y, radius + SELECTED_RING_OFFSET, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str("#ffd166");
			ctx.set_line_width(2.0 / k);
			ctx.stroke();
		}

		draw_label(ctx, node, alpha, k);
		ctx.set_global_alpha(1.0);
	}
}

fn draw_glow(ctx: &CanvasRenderingContext2d, x: f64, y: f64, radius: f64, t: f64) {
	let glow_radius = radius * (1.8 + 1.2 * t);
	let Ok(gradient) = ctx.create_radial_gradient(x, y, radius * 0.3, x, y, glow_radius) else {
		return;
	};
	let alpha = 0.35 * t;
	let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", alpha));
	let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", alpha * 0.3));
	let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
	ctx.begin_path();
	let _ = ctx.arc(x, y, glow_radius, 0.0, 2.0 * PI);
	#[allow(deprecated)]
	ctx.set_fill_style(&gradient);
	ctx.fill();
}

fn draw_label(ctx: &CanvasRenderingContext2d, node: &PositionedNode, alpha: f64, k: f64) {
	if node.node.name.is_empty() {
		return;
	}
	ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {})", alpha * 0.85));
	ctx.set_font(&format!("{}px sans-serif", 11.0 / k.max(0.5)));
	let _ = ctx.fill_text(
		&scale::truncate_label(&node.node.name),
		node.x + node.radius + 3.0,
		node.y + 3.0,
	);
}
