//! Render-ready dataset accumulation and the anti-parallel edge
//! smoothing pass.

use std::collections::HashMap;

use serde::Serialize;

/// Grouping key for node colouring: a community number or the primary
/// label (the string-or-number union of the dataset contract).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Group {
	Label(String),
	Id(i64),
}

impl Default for Group {
	fn default() -> Self {
		Group::Id(0)
	}
}

/// A deduplicated, render-ready node entry. `value` is `None` while a
/// sizeCypher lookup is pending; it materializes during finalization.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VisNode {
	pub id: i64,
	pub label: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<f64>,
	pub group: Group,
	pub shape: String,
	pub title: String,
}

/// Curve style assigned by the smoothing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SmoothKind {
	#[serde(rename = "diagonalCross")]
	DiagonalCross,
	#[serde(rename = "curvedCW")]
	CurvedCw,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Smooth {
	pub enabled: bool,
	#[serde(rename = "type")]
	pub kind: SmoothKind,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub roundness: Option<f64>,
}

impl Smooth {
	/// A straight line; the default for every edge.
	pub const STRAIGHT: Smooth = Smooth {
		enabled: false,
		kind: SmoothKind::DiagonalCross,
		roundness: None,
	};

	/// Clockwise bow applied when an opposite-direction counterpart exists.
	pub const ANTI_PARALLEL: Smooth = Smooth {
		enabled: true,
		kind: SmoothKind::CurvedCw,
		roundness: Some(0.1),
	};
}

impl Default for Smooth {
	fn default() -> Self {
		Smooth::STRAIGHT
	}
}

/// A deduplicated, render-ready edge entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisEdge {
	pub id: i64,
	pub from: i64,
	pub to: i64,
	pub label: String,
	pub value: f64,
	pub title: String,
	pub smooth: Smooth,
}

#[derive(Clone, Debug, Default)]
struct DirectedNeighbours {
	incoming: Vec<i64>,
	outgoing: Vec<i64>,
}

/// Per-node one-hop neighbours, split by direction. Ordered and not
/// deduplicated: parallel edges contribute one entry each.
#[derive(Clone, Debug, Default)]
pub struct NeighbourIndex {
	entries: HashMap<i64, DirectedNeighbours>,
}

impl NeighbourIndex {
	fn register_edge(&mut self, from: i64, to: i64) {
		self.entries.entry(from).or_default().outgoing.push(to);
		self.entries.entry(to).or_default().incoming.push(from);
	}

	/// Does `node` have `neighbour` as an inbound one-hop neighbour?
	pub fn has_incoming(&self, node: i64, neighbour: i64) -> bool {
		self.entries
			.get(&node)
			.is_some_and(|n| n.incoming.contains(&neighbour))
	}

	/// Does `node` have `neighbour` as an outbound one-hop neighbour?
	pub fn has_outgoing(&self, node: i64, neighbour: i64) -> bool {
		self.entries
			.get(&node)
			.is_some_and(|n| n.outgoing.contains(&neighbour))
	}

	fn clear(&mut self) {
		self.entries.clear();
	}
}

/// The node and edge collections handed to the rendering engine, sorted
/// by id for deterministic output.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphSnapshot {
	pub nodes: Vec<VisNode>,
	pub edges: Vec<VisEdge>,
}

impl GraphSnapshot {
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty() && self.edges.is_empty()
	}
}

/// Accumulation target of record ingestion. Upserts overwrite by id:
/// last write wins, an explicit contract relied on when a node appears
/// in several records of one result.
#[derive(Clone, Debug, Default)]
pub struct DatasetStore {
	nodes: HashMap<i64, VisNode>,
	edges: HashMap<i64, VisEdge>,
	neighbours: NeighbourIndex,
}

impl DatasetStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn upsert_node(&mut self, node: VisNode) {
		self.nodes.insert(node.id, node);
	}

	pub fn upsert_edge(&mut self, edge: VisEdge) {
		self.edges.insert(edge.id, edge);
	}

	/// Materialize a node's deferred size. A lookup landing after the node
	/// was overwritten (or never stored) is dropped silently.
	pub fn set_node_value(&mut self, id: i64, value: f64) {
		if let Some(node) = self.nodes.get_mut(&id) {
			node.value = Some(value);
		}
	}

	/// Record `from → to` adjacency in both directions of the index.
	pub fn register_adjacency(&mut self, from: i64, to: i64) {
		self.neighbours.register_edge(from, to);
	}

	pub fn neighbours(&self) -> &NeighbourIndex {
		&self.neighbours
	}

	pub fn node(&self, id: i64) -> Option<&VisNode> {
		self.nodes.get(&id)
	}

	pub fn edge(&self, id: i64) -> Option<&VisEdge> {
		self.edges.get(&id)
	}

	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}

	/// Post-ingestion smoothing pass: every edge gets a straight line
	/// unless an anti-parallel counterpart exists, which gets a clockwise
	/// curve so the pair does not overlap. Same-direction duplicates stay
	/// straight and overlapping; the pass does not detect them.
	pub fn apply_smoothing(&mut self) {
		let neighbours = &self.neighbours;
		for edge in self.edges.values_mut() {
			edge.smooth = if neighbours.has_incoming(edge.from, edge.to)
				|| neighbours.has_outgoing(edge.to, edge.from)
			{
				Smooth::ANTI_PARALLEL
			} else {
				Smooth::STRAIGHT
			};
		}
	}

	/// Current node and edge collections, sorted by id.
	pub fn snapshot(&self) -> GraphSnapshot {
		let mut nodes: Vec<VisNode> = self.nodes.values().cloned().collect();
		let mut edges: Vec<VisEdge> = self.edges.values().cloned().collect();
		nodes.sort_by_key(|n| n.id);
		edges.sort_by_key(|e| e.id);
		GraphSnapshot { nodes, edges }
	}

	/// Discard everything: node map, edge map and neighbour index together.
	/// Join point between one render cycle and the next.
	pub fn reset(&mut self) {
		self.nodes.clear();
		self.edges.clear();
		self.neighbours.clear();
	}
}
