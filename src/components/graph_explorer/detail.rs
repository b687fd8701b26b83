//! Side panel describing the selected node.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use leptos::prelude::*;

use super::types::{GraphNode, NodeDetails};

/// Generation counter for detail fetches. Each fetch captures the value
/// returned by [`DetailRequests::begin`]; a response is applied only while
/// that value is still current.
#[derive(Clone, Debug, Default)]
pub struct DetailRequests {
	generation: Arc<AtomicU64>,
}

impl DetailRequests {
	/// Counter with nothing in flight.
	pub fn new() -> Self {
		Self::default()
	}

	/// Start a fetch, superseding every earlier one.
	pub fn begin(&self) -> u64 {
		self.generation.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Whether `ticket` is the newest fetch.
	pub fn is_current(&self, ticket: u64) -> bool {
		self.generation.load(Ordering::SeqCst) == ticket
	}

	/// Supersede whatever is in flight without starting anything new.
	pub fn close(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}
}

/// What the panel currently shows.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DetailView {
	/// No selection.
	#[default]
	Empty,
	/// Selected; details are being fetched.
	Loading(GraphNode),
	/// Selected, with fetched details.
	Loaded(GraphNode, NodeDetails),
	/// The fetch failed; only the summary from the graph is shown.
	Unavailable(GraphNode),
}

impl DetailView {
	/// Selected node, if any.
	pub fn node(&self) -> Option<&GraphNode> {
		match self {
			DetailView::Empty => None,
			DetailView::Loading(n) | DetailView::Loaded(n, _) | DetailView::Unavailable(n) => Some(n),
		}
	}
}

/// Renders the selected node's summary and fetched details.
#[component]
pub fn DetailPanel(
	/// What to show.
	#[prop(into)]
	detail: Signal<DetailView>,
) -> impl IntoView {
	move || {
		let current = detail.get();
		let Some(node) = current.node().cloned() else {
			return None;
		};

		let body = match current {
			DetailView::Loading(_) => view! { <p class="detail-status">"Loading details…"</p> }.into_any(),
			DetailView::Unavailable(_) => {
				view! { <p class="detail-status">"Details unavailable"</p> }.into_any()
			}
			DetailView::Loaded(_, details) => details_view(details).into_any(),
			DetailView::Empty => ().into_any(),
		};

		Some(view! {
			<aside class="detail-panel">
				<h2>{node.name.clone()}</h2>
				<p class="detail-type">{node.kind.clone()}</p>
				<p class="detail-connections">{format!("{} connections", node.connection_count)}</p>
				{body}
			</aside>
		})
	}
}

fn details_view(details: NodeDetails) -> impl IntoView {
	let aliases = (!details.aliases.is_empty()).then(|| {
		view! { <p class="detail-aliases">"Also known as: " {details.aliases.join(", ")}</p> }
	});

	let documents = (!details.source_documents.is_empty()).then(|| {
		view! {
			<h3>"Sources"</h3>
			<ul class="detail-sources">
				{details
					.source_documents
					.into_iter()
					.map(|doc| {
						let title = if doc.document_title.is_empty() {
							doc.document_id
						} else {
							doc.document_title
						};
						view! { <li>{title}</li> }
					})
					.collect_view()}
			</ul>
		}
	});

	let relationships = (!details.relationships.is_empty()).then(|| {
		view! {
			<h3>"Relationships"</h3>
			<ul class="detail-relationships">
				{details
					.relationships
					.into_iter()
					.map(|rel| {
						let arrow = if rel.direction == "incoming" { "←" } else { "→" };
						view! {
							<li title={rel.edge_description.clone().unwrap_or_default()}>
								<span class="rel-type">{arrow} " " {rel.edge_type}</span>
								" "
								<span class="rel-target">{rel.target_name}</span>
								<span class="rel-target-type">" (" {rel.target_type} ")"</span>
							</li>
						}
					})
					.collect_view()}
			</ul>
		}
	});

	view! {
		{details.description.map(|d| view! { <p class="detail-description">{d}</p> })}
		{aliases}
		{documents}
		{relationships}
	}
}
