use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use leptos::prelude::*;
use log::{debug, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
	AddEventListenerOptions, CanvasRenderingContext2d, HtmlCanvasElement, KeyboardEvent,
	MouseEvent, PointerEvent, WheelEvent, Window,
};

use super::detail::{DetailPanel, DetailRequests, DetailView};
use super::interaction::ClickTimer;
use super::manager::{ExpandOutcome, ExpandTicket};
use super::render;
use super::scale;
use super::state::{ExplorerConfig, ExplorerState};
use super::store::GraphDataStore;
use super::types::NodeId;
use super::viewport::{ScreenRect, ZoomDirection};

type SharedState = Rc<RefCell<Option<ExplorerState<BrowserTimer>>>>;

/// `setTimeout` handle backing the pending single click.
pub struct BrowserTimer {
	handle: Option<i32>,
}

impl ClickTimer for BrowserTimer {
	fn cancel(self) {
		if let (Some(handle), Some(window)) = (self.handle, web_sys::window()) {
			window.clear_timeout_with_handle(handle);
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
enum LoadStatus {
	Loading,
	Ready,
	Failed(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
struct GraphStats {
	nodes: usize,
	edges: usize,
	expanding: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
struct LegendEntry {
	kind: String,
	active: bool,
	color: &'static str,
}

/// Signals the view reads; written after every state change.
#[derive(Clone, Copy)]
struct ViewSignals {
	status: RwSignal<LoadStatus>,
	stats: RwSignal<GraphStats>,
	legend: RwSignal<Vec<LegendEntry>>,
	selected: RwSignal<Option<NodeId>>,
}

impl ViewSignals {
	fn publish<H: ClickTimer>(&self, s: &ExplorerState<H>) {
		set_if_changed(self.selected, s.graph.selected().map(str::to_owned));

		let frame = s.layout.frame();
		set_if_changed(
			self.stats,
			GraphStats {
				nodes: frame.nodes.len(),
				edges: frame.edges.len(),
				expanding: s
					.graph
					.expanding()
					.and_then(|id| s.graph.node(id))
					.map(|n| n.name.clone()),
			},
		);

		let legend = s
			.graph
			.types()
			.map(|(kind, active)| LegendEntry {
				kind: kind.to_owned(),
				active,
				color: scale::type_color(s.graph.type_ordinal(kind)),
			})
			.collect();
		set_if_changed(self.legend, legend);
	}
}

fn set_if_changed<T: PartialEq + Send + Sync + 'static>(signal: RwSignal<T>, value: T) {
	if signal.try_with_untracked(|current| *current != value) == Some(true) {
		signal.try_set(value);
	}
}

/// Where neighbor and detail queries go.
#[derive(Clone)]
struct Backend {
	store: Rc<dyn GraphDataStore>,
	session_id: Rc<str>,
	neighbor_limit: usize,
}

impl Backend {
	fn expand(&self, shared: SharedState, ticket: ExpandTicket, signals: ViewSignals) {
		let backend = self.clone();
		spawn_local(async move {
			let node_id = ticket.node_id().to_owned();
			let result = backend
				.store
				.neighbors(&backend.session_id, &node_id, backend.neighbor_limit)
				.await;
			let mut guard = shared.borrow_mut();
			let Some(s) = guard.as_mut() else {
				debug!("Explorer gone before {} expanded", node_id);
				return;
			};
			if let ExpandOutcome::Merged { added_nodes, .. } = s.finish_expand(ticket, result) {
				debug!("{} new nodes around {}", added_nodes, node_id);
			}
			signals.publish(s);
		});
	}
}

fn screen_rect(canvas_ref: NodeRef<leptos::html::Canvas>) -> Option<ScreenRect> {
	let canvas: HtmlCanvasElement = canvas_ref.get_untracked()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(ScreenRect {
		left: rect.left(),
		top: rect.top(),
		width: rect.width(),
		height: rect.height(),
	})
}

fn window_size(window: &Window) -> (f64, f64) {
	(
		window
			.inner_width()
			.ok()
			.and_then(|v| v.as_f64())
			.unwrap_or(800.0),
		window
			.inner_height()
			.ok()
			.and_then(|v| v.as_f64())
			.unwrap_or(600.0),
	)
}

/// Arm the single-click timer for `node`; firing turns into a selection toggle.
fn schedule_click(
	shared: SharedState,
	canvas_ref: NodeRef<leptos::html::Canvas>,
	signals: ViewSignals,
) -> impl FnOnce(NodeId, Duration) -> BrowserTimer {
	move |node, delay| {
		let callback = Closure::once_into_js(move || {
			let Some(rect) = screen_rect(canvas_ref) else {
				return;
			};
			if let Some(ref mut s) = *shared.borrow_mut() {
				s.click_timer_fired(&node, &rect);
				signals.publish(s);
			}
		});
		let handle = web_sys::window().and_then(|w| {
			w.set_timeout_with_callback_and_timeout_and_arguments_0(
				callback.unchecked_ref(),
				delay.as_millis() as i32,
			)
			.ok()
		});
		BrowserTimer { handle }
	}
}

/// Interactive knowledge-graph canvas with legend, zoom controls, and a
/// detail panel for the selected node.
#[component]
pub fn GraphExplorer(
	/// Source of seed, neighbor and detail data.
	store: Rc<dyn GraphDataStore>,
	/// Session passed to every store call.
	#[prop(into)]
	session_id: String,
	/// Tunables; defaults when omitted.
	#[prop(optional)]
	config: Option<ExplorerConfig>,
	/// Fill the window and follow its resizes.
	#[prop(default = false)]
	fullscreen: bool,
	/// Canvas width; the parent's width when unset.
	#[prop(default = None)]
	width: Option<f64>,
	/// Canvas height; the parent's height when unset.
	#[prop(default = None)]
	height: Option<f64>,
) -> impl IntoView {
	let config = config.unwrap_or_default();
	let backend = Backend {
		store,
		session_id: Rc::from(session_id),
		neighbor_limit: config.neighbor_limit,
	};

	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let wheel_cb: Rc<RefCell<Option<Closure<dyn FnMut(WheelEvent)>>>> = Rc::new(RefCell::new(None));

	let signals = ViewSignals {
		status: RwSignal::new(LoadStatus::Loading),
		stats: RwSignal::new(GraphStats::default()),
		legend: RwSignal::new(Vec::new()),
		selected: RwSignal::new(None),
	};
	let detail = RwSignal::new(DetailView::Empty);
	let filter_request: RwSignal<Option<(String, bool)>> = RwSignal::new(None);
	let detail_requests = DetailRequests::new();

	let mounted = Arc::new(AtomicBool::new(true));
	on_cleanup({
		let (mounted, detail_requests) = (mounted.clone(), detail_requests.clone());
		move || {
			mounted.store(false, Ordering::SeqCst);
			detail_requests.close();
		}
	});

	let (state_init, animate_init, resize_cb_init, wheel_cb_init, backend_init) = (
		state.clone(),
		animate.clone(),
		resize_cb.clone(),
		wheel_cb.clone(),
		backend.clone(),
	);
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("Canvas 2d context unavailable");
			return;
		};
		*state_init.borrow_mut() = Some(ExplorerState::new(config.clone(), w, h));

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some(win) = web_sys::window() else {
					return;
				};
				let (nw, nh) = window_size(&win);
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		// Registered natively as non-passive so prevent_default holds.
		let state_wheel = state_init.clone();
		*wheel_cb_init.borrow_mut() = Some(Closure::new(move |ev: WheelEvent| {
			ev.prevent_default();
			if let Some(ref mut s) = *state_wheel.borrow_mut() {
				s.zoom(ZoomDirection::from_wheel(ev.delta_y()));
			}
		}));
		if let Some(ref cb) = *wheel_cb_init.borrow() {
			let options = AddEventListenerOptions::new();
			options.set_passive(false);
			let _ = canvas.add_event_listener_with_callback_and_add_event_listener_options(
				"wheel",
				cb.as_ref().unchecked_ref(),
				&options,
			);
		}

		let (state_anim, animate_inner, resize_cb_anim, wheel_cb_anim, canvas_anim, mounted_anim) = (
			state_init.clone(),
			animate_init.clone(),
			resize_cb_init.clone(),
			wheel_cb_init.clone(),
			canvas.clone(),
			mounted.clone(),
		);
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let Some(window) = web_sys::window() else {
				return;
			};
			if !mounted_anim.load(Ordering::SeqCst) {
				if let Some(mut s) = state_anim.borrow_mut().take() {
					s.shutdown();
				}
				if let Some(cb) = resize_cb_anim.borrow_mut().take() {
					let _ = window
						.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
				}
				if let Some(cb) = wheel_cb_anim.borrow_mut().take() {
					let _ = canvas_anim
						.remove_event_listener_with_callback("wheel", cb.as_ref().unchecked_ref());
				}
				return;
			}
			if let Some(ref mut s) = *state_anim.borrow_mut() {
				s.tick(0.016);
				render::render(s, &ctx);
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}

		let (backend, shared) = (backend_init.clone(), state_init.clone());
		spawn_local(async move {
			match backend.store.seed(&backend.session_id).await {
				Ok(payload) => {
					info!(
						"Seeded session {} with {} nodes",
						backend.session_id,
						payload.nodes.len()
					);
					if let Some(ref mut s) = *shared.borrow_mut() {
						s.seed(payload);
						signals.publish(s);
					}
					signals.status.try_set(LoadStatus::Ready);
				}
				Err(err) => {
					warn!("Loading session {} failed: {}", backend.session_id, err);
					signals.status.try_set(LoadStatus::Failed(err.to_string()));
				}
			}
		});
	});

	// Legend checkboxes live in a reactive closure; route their changes here.
	let state_filter = state.clone();
	Effect::new(move |_| {
		let Some((kind, active)) = filter_request.get() else {
			return;
		};
		if let Some(ref mut s) = *state_filter.borrow_mut() {
			s.set_type_filter(&kind, active);
			signals.publish(s);
		}
	});

	let (state_detail, backend_detail) = (state.clone(), backend.clone());
	Effect::new(move |_| {
		let selected = signals.selected.get();
		let ticket = detail_requests.begin();
		let node = selected.as_deref().and_then(|id| {
			state_detail
				.borrow()
				.as_ref()
				.and_then(|s| s.graph.node(id).map(|n| (**n).clone()))
		});
		let Some(node) = node else {
			detail.set(DetailView::Empty);
			return;
		};

		detail.set(DetailView::Loading(node.clone()));
		let (backend, requests) = (backend_detail.clone(), detail_requests.clone());
		spawn_local(async move {
			let result = backend.store.node_details(&backend.session_id, &node.id).await;
			if !requests.is_current(ticket) {
				debug!("Discarding superseded details for {}", node.id);
				return;
			}
			let next = match result {
				Ok(details) => DetailView::Loaded(node, details),
				Err(err) => {
					warn!("Details for {} failed: {}", node.id, err);
					DetailView::Unavailable(node)
				}
			};
			detail.try_set(next);
		});
	});

	let state_pd = state.clone();
	let on_pointerdown = move |ev: PointerEvent| {
		let Some(rect) = screen_rect(canvas_ref) else {
			return;
		};
		if let Some(canvas) = canvas_ref.get_untracked() {
			let _ = canvas.set_pointer_capture(ev.pointer_id());
		}
		if let Some(ref mut s) = *state_pd.borrow_mut() {
			s.pointer_down(ev.client_x() as f64, ev.client_y() as f64, &rect);
		}
	};

	let state_pm = state.clone();
	let on_pointermove = move |ev: PointerEvent| {
		let Some(rect) = screen_rect(canvas_ref) else {
			return;
		};
		if let Some(ref mut s) = *state_pm.borrow_mut() {
			s.pointer_move(ev.client_x() as f64, ev.client_y() as f64, &rect);
			signals.publish(s);
		}
	};

	let (state_pu, backend_pu) = (state.clone(), backend.clone());
	let on_pointerup = move |ev: PointerEvent| {
		let Some(rect) = screen_rect(canvas_ref) else {
			return;
		};
		if let Some(canvas) = canvas_ref.get_untracked() {
			let _ = canvas.release_pointer_capture(ev.pointer_id());
		}
		let schedule = schedule_click(state_pu.clone(), canvas_ref, signals);
		let ticket = {
			let mut guard = state_pu.borrow_mut();
			let Some(s) = guard.as_mut() else {
				return;
			};
			let ticket = s.pointer_up(&rect, schedule);
			signals.publish(s);
			ticket
		};
		if let Some(ticket) = ticket {
			backend_pu.expand(state_pu.clone(), ticket, signals);
		}
	};

	let state_pl = state.clone();
	let cancel_gesture = move || {
		let Some(rect) = screen_rect(canvas_ref) else {
			return;
		};
		if let Some(ref mut s) = *state_pl.borrow_mut() {
			s.pointer_cancel(&rect);
		}
	};
	let on_pointerleave = {
		let cancel = cancel_gesture.clone();
		move |_: PointerEvent| cancel()
	};
	let on_pointercancel = move |_: PointerEvent| cancel_gesture();

	let state_kd = state.clone();
	let on_keydown = move |ev: KeyboardEvent| {
		if let Some(ref mut s) = *state_kd.borrow_mut() {
			match ev.key().as_str() {
				"Escape" => s.graph.select(None),
				"+" | "=" => s.zoom(ZoomDirection::In),
				"-" | "_" => s.zoom(ZoomDirection::Out),
				"0" => s.viewport.reset(),
				_ => return,
			}
			ev.prevent_default();
			signals.publish(s);
		}
	};

	let state_zi = state.clone();
	let zoom_in = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_zi.borrow_mut() {
			s.zoom(ZoomDirection::In);
		}
	};
	let state_zo = state.clone();
	let zoom_out = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_zo.borrow_mut() {
			s.zoom(ZoomDirection::Out);
		}
	};
	let state_zr = state.clone();
	let zoom_reset = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_zr.borrow_mut() {
			s.viewport.reset();
		}
	};

	let status_line = move || match signals.status.get() {
		LoadStatus::Loading => "Loading graph…".to_string(),
		LoadStatus::Failed(err) => format!("Could not load graph: {}", err),
		LoadStatus::Ready => {
			let stats = signals.stats.get();
			match stats.expanding {
				Some(name) => format!("Expanding {}…", name),
				None => format!("{} nodes, {} edges", stats.nodes, stats.edges),
			}
		}
	};

	let legend = move || {
		signals
			.legend
			.get()
			.into_iter()
			.map(|entry| {
				let kind = entry.kind.clone();
				view! {
					<li>
						<label>
							<input
								type="checkbox"
								prop:checked=entry.active
								on:change=move |ev| {
									filter_request.set(Some((kind.clone(), event_target_checked(&ev))));
								}
							/>
							<span class="legend-swatch" style={format!("background: {};", entry.color)}></span>
							{entry.kind}
						</label>
					</li>
				}
			})
			.collect_view()
	};

	view! {
		<div class="graph-explorer">
			<canvas
				node_ref=canvas_ref
				class="graph-explorer-canvas"
				tabindex="0"
				on:pointerdown=on_pointerdown
				on:pointermove=on_pointermove
				on:pointerup=on_pointerup
				on:pointerleave=on_pointerleave
				on:pointercancel=on_pointercancel
				on:keydown=on_keydown
				style="display: block; cursor: grab; touch-action: none;"
			/>
			<div class="graph-toolbar">
				<button on:click=zoom_in title="Zoom in">"+"</button>
				<button on:click=zoom_out title="Zoom out">"−"</button>
				<button on:click=zoom_reset title="Reset view">"Reset"</button>
				<span class="graph-status">{status_line}</span>
			</div>
			<ul class="graph-legend">{legend}</ul>
			<DetailPanel detail=detail />
		</div>
	}
}
