use std::rc::Rc;

use leptos::prelude::*;
use leptos_router::hooks::{use_params_map, use_query_map};
use log::debug;

use crate::components::graph_explorer::{ExplorerConfig, GraphDataStore, GraphExplorer, HttpGraphStore};

/// Apply `?max=` and `?limit=` overrides on top of the defaults.
fn config_from_query(max: Option<String>, limit: Option<String>) -> ExplorerConfig {
	let mut config = ExplorerConfig::default();
	if let Some(max) = max.and_then(|v| v.parse::<usize>().ok()) {
		config.max_visible = max;
	}
	if let Some(limit) = limit.and_then(|v| v.parse::<usize>().ok()) {
		config.neighbor_limit = limit;
	}
	config
}

/// Live graph for `/sessions/:id`, served by the REST API at `?api=` (or the
/// page's own origin).
#[component]
pub fn Session() -> impl IntoView {
	let params = use_params_map();
	let query = use_query_map();

	move || {
		let session_id = params.with(|p| p.get("id")).unwrap_or_default();
		let (api, config) = query.with(|q| {
			(
				q.get("api").unwrap_or_default(),
				config_from_query(q.get("max"), q.get("limit")),
			)
		});
		debug!("Opening session {} against '{}'", session_id, api);

		let store: Rc<dyn GraphDataStore> = Rc::new(HttpGraphStore::new(&api));
		view! {
			<div class="fullscreen-graph">
				<GraphExplorer store=store session_id=session_id config=config fullscreen=true />
			</div>
		}
	}
}
