//! Record classification and node/edge attribute resolution.

use log::warn;
use thiserror::Error;

use super::config::{CaptionSetting, ScaleSetting, VizConfig};
use super::dataset::{DatasetStore, Group, Smooth, VisEdge, VisNode};
use super::record::{CypherValue, GraphValue, NodeRecord, Properties, RelRecord};

/// Size/thickness applied when nothing usable is configured or resolvable.
pub const DEFAULT_SIZE: f64 = 1.0;
/// Shape applied when the label mapping does not configure one.
pub const DEFAULT_SHAPE: &str = "dot";

#[derive(Debug, Error)]
pub enum BuildError {
	#[error("node {0} has no labels")]
	MissingLabel(i64),
}

/// Deferred size resolution: run `cypher` with the node id bound as
/// parameter `id`, then materialize the node's value from the first
/// numeric result.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeLookup {
	pub node_id: i64,
	pub cypher: String,
}

/// Hover tooltip: every property as an HTML line. The exact format is
/// part of the dataset contract.
pub fn format_title(properties: &Properties) -> String {
	let mut title = String::new();
	for (key, value) in properties.iter() {
		title.push_str(&format!("<strong>{key}:</strong> {value}<br>"));
	}
	title
}

/// Route one record value into the store. Build failures are logged and
/// skipped so ingestion of later values continues; values of no known
/// graph variant are ignored without error.
pub fn ingest_value(
	value: &GraphValue,
	config: &VizConfig,
	store: &mut DatasetStore,
	pending: &mut Vec<SizeLookup>,
) {
	match value {
		GraphValue::Node(node) => ingest_node(node, config, store, pending),
		GraphValue::Relationship(rel) => {
			let edge = build_edge(rel, config, store);
			store.upsert_edge(edge);
		}
		GraphValue::Path(path) => {
			// endpoints are re-covered by the segments below; upserts make
			// the re-resolution idempotent
			ingest_node(&path.start, config, store, pending);
			ingest_node(&path.end, config, store, pending);
			for segment in &path.segments {
				ingest_node(&segment.start, config, store, pending);
				ingest_node(&segment.end, config, store, pending);
				let edge = build_edge(&segment.relationship, config, store);
				store.upsert_edge(edge);
			}
		}
		GraphValue::Collection(elements) => {
			for element in elements {
				match element {
					GraphValue::Node(node) => ingest_node(node, config, store, pending),
					GraphValue::Relationship(rel) => {
						let edge = build_edge(rel, config, store);
						store.upsert_edge(edge);
					}
					// nested paths and collections are skipped silently
					_ => {}
				}
			}
		}
		GraphValue::Unknown(_) => {}
	}
}

fn ingest_node(
	record: &NodeRecord,
	config: &VizConfig,
	store: &mut DatasetStore,
	pending: &mut Vec<SizeLookup>,
) {
	match build_node(record, config) {
		Ok((node, lookup)) => {
			store.upsert_node(node);
			pending.extend(lookup);
		}
		Err(err) => warn!("skipping node record: {err}"),
	}
}

/// Resolve a node record into a render-ready entry. A configured
/// sizeCypher takes priority over every other size source and leaves the
/// value as a placeholder until the returned lookup resolves.
pub fn build_node(
	record: &NodeRecord,
	config: &VizConfig,
) -> Result<(VisNode, Option<SizeLookup>), BuildError> {
	let label = record
		.labels
		.first()
		.ok_or(BuildError::MissingLabel(record.id))?
		.clone();
	let mapping = config.label_config(&label);

	let (value, lookup) = match mapping.size_cypher {
		Some(cypher) => (
			None,
			Some(SizeLookup {
				node_id: record.id,
				cypher,
			}),
		),
		None => (
			Some(resolve_scale(&record.properties, mapping.size.as_ref())),
			None,
		),
	};

	let caption = mapping
		.caption
		.as_deref()
		.and_then(|key| record.properties.get(key))
		.map(CypherValue::to_string)
		.unwrap_or_default();

	let node = VisNode {
		id: record.id,
		label: caption,
		value,
		group: resolve_group(record, &label, mapping.community.as_deref()),
		shape: mapping
			.shape
			.unwrap_or_else(|| DEFAULT_SHAPE.to_string()),
		title: format_title(&record.properties),
	};
	Ok((node, lookup))
}

fn resolve_scale(properties: &Properties, setting: Option<&ScaleSetting>) -> f64 {
	match setting {
		Some(ScaleSetting::Literal(value)) => *value,
		Some(ScaleSetting::Property(key)) => properties
			.get(key)
			.and_then(CypherValue::as_render_number)
			.unwrap_or(DEFAULT_SIZE),
		None => DEFAULT_SIZE,
	}
}

fn resolve_group(record: &NodeRecord, label: &str, community: Option<&str>) -> Group {
	let Some(key) = community else {
		return Group::Label(label.to_string());
	};
	match record.properties.get(key) {
		Some(value) => match value.as_group_number() {
			// a zero community is treated as unset and falls back to the label
			Some(0) if !label.is_empty() => Group::Label(label.to_string()),
			Some(number) => Group::Id(number),
			None => Group::Id(0),
		},
		None => Group::Id(0),
	}
}

/// Resolve a relationship record into a render-ready edge. Every call
/// registers `from → to` adjacency in the store's neighbour index,
/// independent of what happens to the returned edge.
pub fn build_edge(record: &RelRecord, config: &VizConfig, store: &mut DatasetStore) -> VisEdge {
	let mapping = config.relationship_config(&record.rel_type);

	store.register_adjacency(record.start, record.end);

	let mut title = format_title(&record.properties);

	// property-named thickness gets the same numeric validation and 1.0
	// fallback as node size
	let value = resolve_scale(&record.properties, mapping.thickness.as_ref());

	let label = match mapping.caption {
		Some(CaptionSetting::Toggle(false)) => {
			title.push_str(&format!("<strong>name:</strong> {}<br>", record.rel_type));
			String::new()
		}
		Some(CaptionSetting::Toggle(true)) => record.rel_type.clone(),
		Some(CaptionSetting::Property(key)) => record
			.properties
			.get(&key)
			.map(CypherValue::to_string)
			.unwrap_or_default(),
		None => record.rel_type.clone(),
	};

	VisEdge {
		id: record.id,
		from: record.start,
		to: record.end,
		label,
		value,
		title,
		smooth: Smooth::STRAIGHT,
	}
}
