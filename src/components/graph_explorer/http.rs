//! [`GraphDataStore`] over the host application's REST API, using browser fetch.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use super::store::{GraphDataStore, StoreError};
use super::types::{NeighborPayload, NodeDetails, SeedPayload};

/// Graph store backed by `{base_url}/api/graph/{session}` endpoints.
#[derive(Clone, Debug)]
pub struct HttpGraphStore {
	base_url: String,
}

impl HttpGraphStore {
	/// Store rooted at `base_url`; a trailing slash is dropped.
	pub fn new(base_url: &str) -> Self {
		Self {
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}

	fn url(&self, session_id: &str, path: &str) -> String {
		format!(
			"{}/api/graph/{}{}",
			self.base_url,
			encode(session_id),
			path
		)
	}

	async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, StoreError> {
		let opts = RequestInit::new();
		opts.set_method("GET");
		opts.set_mode(RequestMode::Cors);

		let request = Request::new_with_str_and_init(url, &opts)
			.map_err(|e| StoreError::Transport(format!("{:?}", e)))?;

		let window =
			web_sys::window().ok_or_else(|| StoreError::Transport("no window".into()))?;
		let resp_value = JsFuture::from(window.fetch_with_request(&request))
			.await
			.map_err(|e| StoreError::Transport(format!("{:?}", e)))?;

		let resp: Response = resp_value
			.dyn_into()
			.map_err(|_| StoreError::Decode("response is not a Response".into()))?;

		if !resp.ok() {
			return Err(StoreError::Status(resp.status()));
		}

		let json = JsFuture::from(
			resp.json()
				.map_err(|e| StoreError::Decode(format!("{:?}", e)))?,
		)
		.await
		.map_err(|e| StoreError::Decode(format!("{:?}", e)))?;

		serde_wasm_bindgen::from_value(json).map_err(|e| StoreError::Decode(e.to_string()))
	}
}

fn encode(segment: &str) -> String {
	String::from(js_sys::encode_uri_component(segment))
}

#[async_trait(?Send)]
impl GraphDataStore for HttpGraphStore {
	async fn seed(&self, session_id: &str) -> Result<SeedPayload, StoreError> {
		self.get(&self.url(session_id, "/seed")).await
	}

	async fn neighbors(
		&self,
		session_id: &str,
		node_id: &str,
		limit: usize,
	) -> Result<NeighborPayload, StoreError> {
		let path = format!("/nodes/{}/neighbors?limit={}", encode(node_id), limit);
		self.get(&self.url(session_id, &path)).await
	}

	async fn node_details(
		&self,
		session_id: &str,
		node_id: &str,
	) -> Result<NodeDetails, StoreError> {
		let path = format!("/nodes/{}", encode(node_id));
		self.get(&self.url(session_id, &path)).await
	}
}
