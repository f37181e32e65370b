//! Render lifecycle: reset, query, stream, finalize, hand off to the
//! rendering engine.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::StreamExt;
use log::{debug, error, info, warn};
use thiserror::Error;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;

use super::build::{self, DEFAULT_SIZE, SizeLookup};
use super::config::{NetworkOptions, VizConfig};
use super::dataset::{DatasetStore, GraphSnapshot};
use super::record::{CypherValue, GraphValue};
use super::transport::{CypherTransport, Params, Record};

/// Where the current render cycle sits in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPhase {
	#[default]
	Idle,
	Querying,
	Streaming,
	Finalizing,
	Rendered,
	Errored,
}

/// Rendering-engine boundary: bind a dataset, stop the physics simulation.
pub trait NetworkView {
	fn set_data(&self, snapshot: &GraphSnapshot, options: &NetworkOptions);
	fn stop_simulation(&self);
}

/// Invoked with the bound renderer handle once a cycle reaches `Rendered`.
pub type GraphFetchedCallback = Box<dyn Fn(&Rc<dyn NetworkView>)>;

#[derive(Debug, Error)]
pub enum VizError {
	#[error(transparent)]
	Transport(#[from] super::transport::TransportError),
}

/// Row limit bound as the `limit` parameter of the main query.
const QUERY_LIMIT: i64 = 30;
/// Fixed delay after which the physics simulation is told to stop.
/// Fires regardless of actual stabilization state; superseded only by
/// the next render cycle's timer.
#[cfg(target_arch = "wasm32")]
const STOP_SIMULATION_AFTER_MS: i32 = 10_000;

/// Drives the full pipeline: issue the query, stream records through the
/// classifier, run the smoothing pass, bind the snapshot to the attached
/// renderer.
pub struct CypherViz<T: CypherTransport> {
	config: VizConfig,
	transport: Rc<T>,
	query: RefCell<String>,
	store: RefCell<DatasetStore>,
	phase: Cell<RenderPhase>,
	network: RefCell<Option<Rc<dyn NetworkView>>>,
	on_graph_fetched: RefCell<Option<GraphFetchedCallback>>,
	// timeout handle plus its closure, kept alive until the timer fires
	// or the next cycle cancels it
	#[cfg(target_arch = "wasm32")]
	stop_timer: RefCell<Option<(i32, Closure<dyn FnMut()>)>>,
}

impl<T: CypherTransport + 'static> CypherViz<T> {
	pub fn new(config: VizConfig, transport: T) -> Self {
		let query = config.initial_cypher.clone();
		Self {
			config,
			transport: Rc::new(transport),
			query: RefCell::new(query),
			store: RefCell::new(DatasetStore::new()),
			phase: Cell::new(RenderPhase::Idle),
			network: RefCell::new(None),
			on_graph_fetched: RefCell::new(None),
			#[cfg(target_arch = "wasm32")]
			stop_timer: RefCell::new(None),
		}
	}

	pub fn config(&self) -> &VizConfig {
		&self.config
	}

	pub fn phase(&self) -> RenderPhase {
		self.phase.get()
	}

	pub fn query(&self) -> String {
		self.query.borrow().clone()
	}

	/// The underlying query transport.
	pub fn transport(&self) -> Rc<T> {
		self.transport.clone()
	}

	/// Snapshot of the dataset as accumulated so far.
	pub fn dataset(&self) -> GraphSnapshot {
		self.store.borrow().snapshot()
	}

	/// The attached rendering-engine handle, if any.
	pub fn network(&self) -> Option<Rc<dyn NetworkView>> {
		self.network.borrow().clone()
	}

	pub fn attach_network(&self, view: Rc<dyn NetworkView>) {
		*self.network.borrow_mut() = Some(view);
	}

	pub fn set_on_graph_fetched(&self, callback: impl Fn(&Rc<dyn NetworkView>) + 'static) {
		*self.on_graph_fetched.borrow_mut() = Some(Box::new(callback));
	}

	/// Run one full render cycle with the current query.
	pub async fn render(&self) -> Result<GraphSnapshot, VizError> {
		self.store.borrow_mut().reset();
		self.phase.set(RenderPhase::Querying);

		let query = self.query();
		info!("render cycle started: {query}");
		let params: Params = vec![("limit".to_string(), CypherValue::Int(QUERY_LIMIT))];
		let mut stream = match self.transport.run(&query, params).await {
			Ok(stream) => stream,
			Err(err) => {
				error!("query submission failed: {err}");
				self.phase.set(RenderPhase::Errored);
				return Err(err.into());
			}
		};

		let mut pending: Vec<SizeLookup> = Vec::new();
		while let Some(delivered) = stream.next().await {
			self.phase.set(RenderPhase::Streaming);
			let record = match delivered {
				Ok(record) => record,
				Err(err) => {
					error!("record stream failed: {err}");
					self.phase.set(RenderPhase::Errored);
					return Err(err.into());
				}
			};
			let mut store = self.store.borrow_mut();
			for value in &record.values {
				build::ingest_value(value, &self.config, &mut store, &mut pending);
			}
		}
		// stream exhausted: completion; dropping it releases the session
		drop(stream);

		self.phase.set(RenderPhase::Finalizing);
		self.resolve_pending_sizes(pending).await;
		let snapshot = {
			let mut store = self.store.borrow_mut();
			store.apply_smoothing();
			store.snapshot()
		};
		debug!(
			"dataset finalized: {} nodes, {} edges",
			snapshot.nodes.len(),
			snapshot.edges.len()
		);

		self.bind_network(&snapshot);
		self.phase.set(RenderPhase::Rendered);
		Ok(snapshot)
	}

	/// Re-run the current query from scratch.
	pub async fn reload(&self) -> Result<GraphSnapshot, VizError> {
		self.clear_network();
		self.render().await
	}

	/// Swap the query text and re-run.
	pub async fn render_with_cypher(
		&self,
		query: impl Into<String>,
	) -> Result<GraphSnapshot, VizError> {
		self.clear_network();
		*self.query.borrow_mut() = query.into();
		self.render().await
	}

	/// Discard the dataset and bind an empty one to the renderer.
	pub fn clear_network(&self) {
		self.store.borrow_mut().reset();
		if let Some(network) = self.network() {
			network.set_data(
				&GraphSnapshot::default(),
				&NetworkOptions::from_config(&self.config),
			);
		}
		self.phase.set(RenderPhase::Idle);
	}

	/// Stop the physics simulation immediately.
	pub fn stabilize(&self) {
		if let Some(network) = self.network() {
			network.stop_simulation();
		}
	}

	/// Every pending size lookup is awaited before the snapshot is taken,
	/// so the bound dataset never mutates afterwards. A failed lookup, or
	/// one that yields no numeric row, falls back to the default size.
	async fn resolve_pending_sizes(&self, pending: Vec<SizeLookup>) {
		for lookup in pending {
			let value = self.run_size_lookup(&lookup).await.unwrap_or(DEFAULT_SIZE);
			self.store.borrow_mut().set_node_value(lookup.node_id, value);
		}
	}

	async fn run_size_lookup(&self, lookup: &SizeLookup) -> Option<f64> {
		let params: Params = vec![("id".to_string(), CypherValue::Int(lookup.node_id))];
		let mut stream = match self.transport.run(&lookup.cypher, params).await {
			Ok(stream) => stream,
			Err(err) => {
				warn!("size lookup for node {} failed: {err}", lookup.node_id);
				return None;
			}
		};
		while let Some(delivered) = stream.next().await {
			match delivered {
				Ok(record) => {
					if let Some(value) = extract_size(&record) {
						return Some(value);
					}
				}
				Err(err) => {
					warn!("size lookup for node {} failed: {err}", lookup.node_id);
					return None;
				}
			}
		}
		None
	}

	fn bind_network(&self, snapshot: &GraphSnapshot) {
		let Some(network) = self.network() else {
			return;
		};
		let options = NetworkOptions::from_config(&self.config);
		network.set_data(snapshot, &options);
		self.schedule_stop_simulation(network.clone());
		if let Some(callback) = self.on_graph_fetched.borrow().as_ref() {
			callback(&network);
		}
	}

	#[cfg(target_arch = "wasm32")]
	fn schedule_stop_simulation(&self, network: Rc<dyn NetworkView>) {
		let Some(window) = web_sys::window() else {
			return;
		};
		// a new cycle inside the delay window cancels the previous timer,
		// otherwise it would fire against a dropped closure
		if let Some((handle, _)) = self.stop_timer.borrow_mut().take() {
			window.clear_timeout_with_handle(handle);
		}
		let closure: Closure<dyn FnMut()> = Closure::new(move || network.stop_simulation());
		match window.set_timeout_with_callback_and_timeout_and_arguments_0(
			closure.as_ref().unchecked_ref(),
			STOP_SIMULATION_AFTER_MS,
		) {
			Ok(handle) => *self.stop_timer.borrow_mut() = Some((handle, closure)),
			Err(_) => drop(closure),
		}
	}

	// no event loop to schedule on outside the browser
	#[cfg(not(target_arch = "wasm32"))]
	fn schedule_stop_simulation(&self, _network: Rc<dyn NetworkView>) {}
}

/// First numeric (or safely integer-convertible) value in a secondary
/// size-query record.
fn extract_size(record: &Record) -> Option<f64> {
	record.values.iter().find_map(|value| match value {
		GraphValue::Unknown(scalar) => scalar.as_render_number(),
		_ => None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::viz::config::{CaptionSetting, LabelConfig, RelTypeConfig, ScaleSetting};
	use crate::viz::dataset::{Group, SmoothKind};
	use crate::viz::record::{NodeRecord, RelRecord};
	use crate::viz::transport::FixtureTransport;

	use futures::executor::block_on;

	#[derive(Default)]
	struct RecordingView {
		bound: RefCell<Option<GraphSnapshot>>,
		arrows: Cell<bool>,
		stopped: Cell<bool>,
	}

	impl NetworkView for RecordingView {
		fn set_data(&self, snapshot: &GraphSnapshot, options: &NetworkOptions) {
			*self.bound.borrow_mut() = Some(snapshot.clone());
			self.arrows.set(options.edges.arrows_to_enabled);
		}

		fn stop_simulation(&self) {
			self.stopped.set(true);
		}
	}

	fn knows_records() -> Vec<Record> {
		vec![
			Record::new(vec![
				GraphValue::Node(NodeRecord::new(1, &["Person"]).with_property("name", "Alice")),
				GraphValue::Node(NodeRecord::new(2, &["Person"]).with_property("name", "Bob")),
			]),
			Record::new(vec![
				GraphValue::Relationship(RelRecord::new(10, "KNOWS", 1, 2)),
				GraphValue::Relationship(RelRecord::new(11, "KNOWS", 2, 1)),
			]),
		]
	}

	#[test]
	fn end_to_end_scenario() {
		let viz = CypherViz::new(
			VizConfig::default(),
			FixtureTransport::new(knows_records()),
		);
		let snapshot = block_on(viz.render()).unwrap();
		assert_eq!(viz.phase(), RenderPhase::Rendered);

		assert_eq!(snapshot.nodes.len(), 2);
		for node in &snapshot.nodes {
			assert_eq!(node.group, Group::Label("Person".to_string()));
			assert_eq!(node.shape, "dot");
			assert_eq!(node.value, Some(1.0));
		}
		assert_eq!(snapshot.edges.len(), 2);
		for edge in &snapshot.edges {
			assert_eq!(edge.label, "KNOWS");
			assert!(edge.smooth.enabled);
			assert_eq!(edge.smooth.kind, SmoothKind::CurvedCw);
			assert_eq!(edge.smooth.roundness, Some(0.1));
		}
	}

	#[test]
	fn render_binds_the_attached_network() {
		let viz = CypherViz::new(
			VizConfig {
				arrows: true,
				..VizConfig::default()
			},
			FixtureTransport::new(knows_records()),
		);
		let view = Rc::new(RecordingView::default());
		viz.attach_network(view.clone());

		let fetched = Rc::new(Cell::new(false));
		let seen = fetched.clone();
		viz.set_on_graph_fetched(move |_| seen.set(true));

		block_on(viz.render()).unwrap();
		let bound = view.bound.borrow().clone().unwrap();
		assert_eq!(bound.nodes.len(), 2);
		assert!(view.arrows.get());
		assert!(fetched.get());

		viz.stabilize();
		assert!(view.stopped.get());
	}

	#[test]
	fn consecutive_cycles_rebind_the_network() {
		// a second cycle inside the stop-timer window must supersede the
		// first cleanly
		let viz = CypherViz::new(
			VizConfig::default(),
			FixtureTransport::new(knows_records()),
		);
		let view = Rc::new(RecordingView::default());
		viz.attach_network(view.clone());

		block_on(viz.render()).unwrap();
		block_on(viz.reload()).unwrap();

		assert_eq!(viz.phase(), RenderPhase::Rendered);
		let bound = view.bound.borrow().clone().unwrap();
		assert_eq!(bound.nodes.len(), 2);
		assert_eq!(bound.edges.len(), 2);
	}

	#[test]
	fn size_lookup_resolves_before_the_snapshot() {
		let size_cypher = "MATCH (p)-[:KNOWS]-() WHERE id(p) = $id RETURN count(*)";
		let mut config = VizConfig::default();
		config.labels.insert(
			"Person".to_string(),
			LabelConfig {
				// both configured: the cypher path must win
				size: Some(ScaleSetting::Literal(9.0)),
				size_cypher: Some(size_cypher.to_string()),
				..LabelConfig::default()
			},
		);
		let transport = FixtureTransport::new(knows_records()).with_response(
			size_cypher,
			vec![Record::single(GraphValue::Unknown(CypherValue::Int(7)))],
		);

		let viz = CypherViz::new(config, transport);
		let snapshot = block_on(viz.render()).unwrap();
		for node in &snapshot.nodes {
			assert_eq!(node.value, Some(7.0));
		}
	}

	#[test]
	fn failed_size_lookup_falls_back_to_default() {
		let mut config = VizConfig::default();
		config.labels.insert(
			"Person".to_string(),
			LabelConfig {
				size_cypher: Some("RETURN boom".to_string()),
				..LabelConfig::default()
			},
		);
		// the lookup query gets no keyed response: it falls through to the
		// main records, which contain no numeric scalar
		let transport = FixtureTransport::new(vec![Record::single(GraphValue::Node(
			NodeRecord::new(1, &["Person"]),
		))]);
		let viz = CypherViz::new(config, transport);
		let snapshot = block_on(viz.render()).unwrap();
		assert_eq!(snapshot.nodes[0].value, Some(1.0));
	}

	#[test]
	fn submission_failure_reaches_errored_without_binding() {
		let viz = CypherViz::new(
			VizConfig::default(),
			FixtureTransport::failing("no route to host"),
		);
		let view = Rc::new(RecordingView::default());
		viz.attach_network(view.clone());
		assert!(block_on(viz.render()).is_err());
		assert_eq!(viz.phase(), RenderPhase::Errored);
		assert!(view.bound.borrow().is_none());
	}

	#[test]
	fn stream_failure_keeps_partial_dataset_unrendered() {
		let transport = FixtureTransport::new(vec![Record::single(GraphValue::Node(
			NodeRecord::new(1, &["Person"]),
		))])
		.with_stream_error("connection reset");
		let viz = CypherViz::new(VizConfig::default(), transport);
		let view = Rc::new(RecordingView::default());
		viz.attach_network(view.clone());

		assert!(block_on(viz.render()).is_err());
		assert_eq!(viz.phase(), RenderPhase::Errored);
		// the store keeps what it reached, but nothing was bound
		assert_eq!(viz.dataset().nodes.len(), 1);
		assert!(view.bound.borrow().is_none());
	}

	#[test]
	fn render_with_cypher_swaps_the_query() {
		let other_query = "MATCH (c:Company) RETURN c";
		let transport = FixtureTransport::new(knows_records()).with_response(
			other_query,
			vec![Record::single(GraphValue::Node(
				NodeRecord::new(5, &["Company"]).with_property("name", "Initech"),
			))],
		);
		let viz = CypherViz::new(VizConfig::default(), transport);

		let first = block_on(viz.render()).unwrap();
		assert_eq!(first.nodes.len(), 2);

		let second = block_on(viz.render_with_cypher(other_query)).unwrap();
		assert_eq!(viz.query(), other_query);
		assert_eq!(second.nodes.len(), 1);
		assert_eq!(second.nodes[0].id, 5);
	}

	#[test]
	fn clear_network_empties_the_dataset() {
		let viz = CypherViz::new(
			VizConfig::default(),
			FixtureTransport::new(knows_records()),
		);
		block_on(viz.render()).unwrap();
		assert!(!viz.dataset().is_empty());
		viz.clear_network();
		assert!(viz.dataset().is_empty());
		assert_eq!(viz.phase(), RenderPhase::Idle);
		// idempotent
		viz.clear_network();
		assert!(viz.dataset().is_empty());
	}

	#[test]
	fn later_records_overwrite_earlier_builds() {
		let mut config = VizConfig::default();
		config.labels.insert(
			"Person".to_string(),
			LabelConfig {
				caption: Some("name".to_string()),
				..LabelConfig::default()
			},
		);
		let transport = FixtureTransport::new(vec![
			Record::single(GraphValue::Node(
				NodeRecord::new(1, &["Person"]).with_property("name", "first"),
			)),
			Record::single(GraphValue::Node(
				NodeRecord::new(1, &["Person"]).with_property("name", "second"),
			)),
		]);
		let viz = CypherViz::new(config, transport);
		let snapshot = block_on(viz.render()).unwrap();
		assert_eq!(snapshot.nodes.len(), 1);
		assert_eq!(snapshot.nodes[0].label, "second");
	}

	#[test]
	fn caption_false_keeps_type_in_tooltip_end_to_end() {
		let mut config = VizConfig::default();
		config.relationships.insert(
			"KNOWS".to_string(),
			RelTypeConfig {
				caption: Some(CaptionSetting::Toggle(false)),
				..RelTypeConfig::default()
			},
		);
		let viz = CypherViz::new(config, FixtureTransport::new(knows_records()));
		let snapshot = block_on(viz.render()).unwrap();
		for edge in &snapshot.edges {
			assert_eq!(edge.label, "");
			assert!(edge.title.contains("<strong>name:</strong> KNOWS<br>"));
		}
	}
}
