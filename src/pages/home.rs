use std::rc::Rc;

use leptos::prelude::*;

use crate::components::force_graph::{ForceGraphCanvas, NetworkHandle};
use crate::viz::{
	CypherViz, FixtureTransport, GraphValue, LabelConfig, NodeRecord, Record, RelRecord,
	RelTypeConfig, ScaleSetting, VizConfig,
};

/// A canned social graph replayed through the full pipeline, standing in
/// for a live query endpoint. Alice and Bob know each other both ways so
/// the anti-parallel pair renders as opposite bows.
fn sample_records() -> Vec<Record> {
	let alice = NodeRecord::new(1, &["Person"])
		.with_property("name", "Alice")
		.with_property("pagerank", 4.0)
		.with_property("community", 1i64);
	let bob = NodeRecord::new(2, &["Person"])
		.with_property("name", "Bob")
		.with_property("pagerank", 2.5)
		.with_property("community", 1i64);
	let carol = NodeRecord::new(3, &["Person"])
		.with_property("name", "Carol")
		.with_property("pagerank", 1.5)
		.with_property("community", 2i64);
	let matrix = NodeRecord::new(4, &["Movie"])
		.with_property("title", "The Matrix")
		.with_property("released", 1999i64);

	vec![
		Record::new(vec![
			GraphValue::Node(alice.clone()),
			GraphValue::Relationship(
				RelRecord::new(10, "KNOWS", 1, 2).with_property("weight", 2.0),
			),
			GraphValue::Node(bob.clone()),
		]),
		Record::new(vec![
			GraphValue::Node(bob.clone()),
			GraphValue::Relationship(
				RelRecord::new(11, "KNOWS", 2, 1).with_property("weight", 1.0),
			),
			GraphValue::Node(alice.clone()),
		]),
		Record::new(vec![
			GraphValue::Node(alice),
			GraphValue::Relationship(
				RelRecord::new(12, "KNOWS", 1, 3).with_property("weight", 1.0),
			),
			GraphValue::Node(carol.clone()),
		]),
		Record::new(vec![
			GraphValue::Node(carol),
			GraphValue::Relationship(
				RelRecord::new(13, "ACTED_IN", 3, 4).with_property("roles", "Trinity"),
			),
			GraphValue::Node(matrix),
		]),
		// Bob appears again in a later record; the upsert keeps one entry
		Record::single(GraphValue::Node(bob)),
	]
}

fn sample_config() -> VizConfig {
	VizConfig {
		arrows: true,
		labels: [
			(
				"Person".to_string(),
				LabelConfig {
					caption: Some("name".to_string()),
					size: Some(ScaleSetting::Property("pagerank".to_string())),
					community: Some("community".to_string()),
					..LabelConfig::default()
				},
			),
			(
				"Movie".to_string(),
				LabelConfig {
					caption: Some("title".to_string()),
					shape: Some("box".to_string()),
					..LabelConfig::default()
				},
			),
		]
		.into(),
		relationships: [
			(
				"KNOWS".to_string(),
				RelTypeConfig {
					thickness: Some(ScaleSetting::Property("weight".to_string())),
					..RelTypeConfig::default()
				},
			),
			(
				"ACTED_IN".to_string(),
				RelTypeConfig {
					caption: Some(crate::viz::CaptionSetting::Property("roles".to_string())),
					..RelTypeConfig::default()
				},
			),
		]
		.into(),
		..VizConfig::default()
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let handle = NetworkHandle::new();

	let viz = Rc::new(CypherViz::new(
		sample_config(),
		FixtureTransport::new(sample_records()),
	));
	viz.attach_network(Rc::new(handle.clone()));
	viz.set_on_graph_fetched(|_| log::info!("graph fetched"));

	{
		let viz = viz.clone();
		leptos::task::spawn_local(async move {
			if let Err(err) = viz.render().await {
				log::error!("render failed: {err}");
			}
		});
	}

	// view children closures must be Send; the Rc-backed handle rides in
	// thread-local storage and is cloned out at render time
	let handle = StoredValue::new_local(handle);

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph">
				<ForceGraphCanvas handle=Some(handle.get_value()) fullscreen=true />
				<div class="graph-overlay">
					<h1>"Cypher Graph Canvas"</h1>
					<p class="subtitle">
						"Drag nodes to reposition. Scroll to zoom. Drag background to pan."
					</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
