use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};

use crate::viz::config::NetworkOptions;
use crate::viz::dataset::{GraphSnapshot, Group, VisNode};

const COLORS: &[&str] = &[
	"#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
	"#bcbd22", "#17becf",
];

pub const NODE_RADIUS: f64 = 5.0;
pub const HIT_RADIUS: f64 = 12.0;

/// Per-node drawing attributes derived from a [`VisNode`].
#[derive(Clone, Debug, Default)]
pub struct NodeVisual {
	pub label: Option<String>,
	pub color: String,
	pub shape: String,
	pub radius: f64,
	pub tooltip: Vec<String>,
}

/// Per-edge drawing attributes derived from a [`VisEdge`].
///
/// [`VisEdge`]: crate::viz::dataset::VisEdge
#[derive(Clone, Debug)]
pub struct EdgeVisual {
	pub source: DefaultNodeIdx,
	pub target: DefaultNodeIdx,
	pub label: Option<String>,
	pub width: f64,
	pub curved: bool,
	pub roundness: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node_idx: Option<DefaultNodeIdx>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f32,
	pub node_start_y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<DefaultNodeIdx>,
	pub neighbors: HashSet<DefaultNodeIdx>,
	pub highlight_t: f64,
	pub prev_node: Option<DefaultNodeIdx>,
	pub prev_neighbors: HashSet<DefaultNodeIdx>,
	delay_t: f64,
}

pub struct ForceGraphState {
	pub graph: ForceGraph<NodeVisual, ()>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
	pub simulation_running: bool,
	pub arrows_enabled: bool,
	pub label_font: f64,
	edges: Vec<EdgeVisual>,
	stabilization_remaining: Option<u32>,
	fit_on_stabilize: bool,
}

fn simulation_parameters(options: &NetworkOptions) -> SimulationParameters {
	// Barnes-Hut constants assume a larger coordinate scale; fold them
	// into force_graph's parameter space
	SimulationParameters {
		force_charge: (-options.physics.barnes_hut.gravitational_constant / 53.0) as f32,
		force_spring: options.physics.barnes_hut.spring_constant as f32,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	}
}

fn group_color(group: &Group) -> String {
	let index = match group {
		Group::Id(number) => number.rem_euclid(COLORS.len() as i64) as usize,
		Group::Label(label) => {
			label
				.bytes()
				.fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
				% COLORS.len()
		}
	};
	COLORS[index].to_string()
}

fn node_radius(node: &VisNode) -> f64 {
	// value scales area, like the engine's value-based scaling
	NODE_RADIUS * node.value.unwrap_or(1.0).max(1.0).sqrt()
}

/// Tooltip lines from the dataset's HTML title contract.
fn tooltip_lines(title: &str) -> Vec<String> {
	title
		.split("<br>")
		.filter(|line| !line.is_empty())
		.map(|line| line.replace("<strong>", "").replace("</strong>", ""))
		.collect()
}

impl ForceGraphState {
	pub fn new(data: &GraphSnapshot, options: &NetworkOptions, width: f64, height: f64) -> Self {
		let mut graph = ForceGraph::new(simulation_parameters(options));
		let mut id_to_idx = HashMap::new();
		let mut edges = Vec::new();

		let positions = if options.layout.hierarchical.enabled {
			hierarchical_positions(data, &options.layout.hierarchical.sort_method, width, height)
		} else {
			ring_positions(data.nodes.len(), width, height)
		};

		for (node, (x, y)) in data.nodes.iter().zip(positions) {
			let idx = graph.add_node(NodeData {
				x,
				y,
				mass: 10.0,
				is_anchor: false,
				user_data: NodeVisual {
					label: (!node.label.is_empty()).then(|| node.label.clone()),
					color: group_color(&node.group),
					shape: node.shape.clone(),
					radius: node_radius(node),
					tooltip: tooltip_lines(&node.title),
				},
			});
			id_to_idx.insert(node.id, idx);
		}

		for edge in &data.edges {
			// an edge may reference nodes the query never returned; skip it
			if let (Some(&source), Some(&target)) =
				(id_to_idx.get(&edge.from), id_to_idx.get(&edge.to))
			{
				graph.add_edge(source, target, EdgeData::default());
				edges.push(EdgeVisual {
					source,
					target,
					label: (!edge.label.is_empty()).then(|| edge.label.clone()),
					width: edge.value.max(0.25),
					curved: edge.smooth.enabled,
					roundness: edge.smooth.roundness.unwrap_or(0.0),
				});
			}
		}

		Self {
			graph,
			edges,
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			simulation_running: true,
			arrows_enabled: options.edges.arrows_to_enabled,
			// configured font sizes assume DOM pixels; scale down for canvas
			label_font: options.nodes.font.size * 0.4,
			stabilization_remaining: Some(options.physics.stabilization.iterations),
			fit_on_stabilize: options.physics.stabilization.fit,
		}
	}

	/// Rebuild from a fresh dataset, keeping the viewport.
	pub fn set_data(&mut self, data: &GraphSnapshot, options: &NetworkOptions) {
		let transform = self.transform.clone();
		let (width, height) = (self.width, self.height);
		*self = Self::new(data, options, width, height);
		self.transform = transform;
	}

	pub fn edges(&self) -> &[EdgeVisual] {
		&self.edges
	}

	pub fn stop_simulation(&mut self) {
		self.simulation_running = false;
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<DefaultNodeIdx> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		self.graph.visit_nodes(|node| {
			let (dx, dy) = (node.x() as f64 - gx, node.y() as f64 - gy);
			// hit radius is in world-space, scales with zoom like nodes
			let hit = HIT_RADIUS.max(node.data.user_data.radius);
			if (dx * dx + dy * dy).sqrt() < hit {
				found = Some(node.index());
			}
		});
		found
	}

	pub fn set_hover(&mut self, node: Option<DefaultNodeIdx>) {
		if self.hover.node == node {
			return;
		}
		let was_hovering = self.hover.node.is_some();

		// Save previous state for fade-out
		if was_hovering && node.is_none() {
			self.hover.prev_node = self.hover.node.take();
			self.hover.prev_neighbors = std::mem::take(&mut self.hover.neighbors);
		} else {
			self.hover.prev_node = None;
			self.hover.prev_neighbors.clear();
		}

		self.hover.node = node;
		self.hover.neighbors.clear();

		if let Some(idx) = node {
			if !was_hovering {
				self.hover.delay_t = 0.0;
			}
			for edge in &self.edges {
				if edge.source == idx {
					self.hover.neighbors.insert(edge.target);
				} else if edge.target == idx {
					self.hover.neighbors.insert(edge.source);
				}
			}
		}
	}

	pub fn is_highlighted(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx)
			|| self.hover.neighbors.contains(&idx)
			|| self.hover.prev_node == Some(idx)
			|| self.hover.prev_neighbors.contains(&idx)
	}

	pub fn is_hovered(&self, idx: DefaultNodeIdx) -> bool {
		self.hover.node == Some(idx) || self.hover.prev_node == Some(idx)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() || self.hover.prev_node.is_some()
	}

	pub fn tick(&mut self, dt: f32) {
		if self.simulation_running {
			self.graph.update(dt);
			if let Some(remaining) = self.stabilization_remaining.as_mut() {
				*remaining = remaining.saturating_sub(1);
				if *remaining == 0 {
					self.stabilization_remaining = None;
					self.simulation_running = false;
					if self.fit_on_stabilize {
						self.fit_view();
					}
				}
			}
		}

		let (target, delay, speed) = if self.hover.node.is_some() {
			(1.0, 0.08, 1.8)
		} else {
			(0.0, 0.0, 1.26)
		};

		if self.hover.node.is_some() {
			self.hover.delay_t = (self.hover.delay_t + dt as f64).min(delay);
			if self.hover.delay_t >= delay {
				self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			}
		} else {
			self.hover.highlight_t += (target - self.hover.highlight_t) * speed * dt as f64;
			if self.hover.highlight_t < 0.01 {
				self.hover.highlight_t = 0.0;
				self.hover.prev_node = None;
				self.hover.prev_neighbors.clear();
			}
		}
	}

	/// Zoom the viewport so every node is visible, with a margin.
	pub fn fit_view(&mut self) {
		let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
		let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
		self.graph.visit_nodes(|node| {
			min_x = min_x.min(node.x() as f64);
			min_y = min_y.min(node.y() as f64);
			max_x = max_x.max(node.x() as f64);
			max_y = max_y.max(node.y() as f64);
		});
		if !min_x.is_finite() {
			return;
		}
		let (span_x, span_y) = ((max_x - min_x).max(1.0), (max_y - min_y).max(1.0));
		let k = ((self.width - 80.0) / span_x)
			.min((self.height - 80.0) / span_y)
			.clamp(0.1, 10.0);
		self.transform.k = k;
		self.transform.x = self.width / 2.0 - k * (min_x + max_x) / 2.0;
		self.transform.y = self.height / 2.0 - k * (min_y + max_y) / 2.0;
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}
}

fn ring_positions(count: usize, width: f64, height: f64) -> Vec<(f32, f32)> {
	(0..count)
		.map(|i| {
			let angle = (i as f64) * 2.0 * PI / count.max(1) as f64;
			(
				(width / 2.0 + 100.0 * angle.cos()) as f32,
				(height / 2.0 + 100.0 * angle.sin()) as f32,
			)
		})
		.collect()
}

/// Initial row layout for hierarchical mode: `hubsize` orders rows by
/// degree, anything else keeps dataset order. The simulation refines
/// positions from there.
fn hierarchical_positions(
	data: &GraphSnapshot,
	sort_method: &str,
	width: f64,
	height: f64,
) -> Vec<(f32, f32)> {
	let mut degree: HashMap<i64, usize> = HashMap::new();
	for edge in &data.edges {
		*degree.entry(edge.from).or_default() += 1;
		*degree.entry(edge.to).or_default() += 1;
	}

	let mut order: Vec<usize> = (0..data.nodes.len()).collect();
	if sort_method == "hubsize" {
		order.sort_by_key(|&i| {
			std::cmp::Reverse(degree.get(&data.nodes[i].id).copied().unwrap_or(0))
		});
	}

	let per_row = (data.nodes.len() as f64).sqrt().ceil().max(1.0) as usize;
	let mut positions = vec![(0.0, 0.0); data.nodes.len()];
	for (rank, &i) in order.iter().enumerate() {
		let (row, col) = (rank / per_row, rank % per_row);
		positions[i] = (
			(width / 2.0 + (col as f64 - per_row as f64 / 2.0) * 60.0) as f32,
			(height / 4.0 + row as f64 * 80.0) as f32,
		);
	}
	positions
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::viz::dataset::{Smooth, VisEdge};

	fn snapshot() -> GraphSnapshot {
		GraphSnapshot {
			nodes: vec![
				VisNode {
					id: 1,
					label: "Alice".to_string(),
					value: Some(4.0),
					group: Group::Label("Person".to_string()),
					shape: "dot".to_string(),
					title: "<strong>name:</strong> Alice<br>".to_string(),
				},
				VisNode {
					id: 2,
					label: String::new(),
					value: Some(1.0),
					group: Group::Id(3),
					shape: "box".to_string(),
					title: String::new(),
				},
			],
			edges: vec![
				VisEdge {
					id: 10,
					from: 1,
					to: 2,
					label: "KNOWS".to_string(),
					value: 1.0,
					title: String::new(),
					smooth: Smooth::ANTI_PARALLEL,
				},
				// dangling endpoint: must be skipped
				VisEdge {
					id: 11,
					from: 1,
					to: 99,
					label: String::new(),
					value: 1.0,
					title: String::new(),
					smooth: Smooth::STRAIGHT,
				},
			],
		}
	}

	#[test]
	fn builds_visuals_from_the_dataset_contract() {
		let state = ForceGraphState::new(&snapshot(), &NetworkOptions::default(), 800.0, 600.0);
		let mut count = 0;
		state.graph.visit_nodes(|node| {
			count += 1;
			if node.data.user_data.label.as_deref() == Some("Alice") {
				// value 4.0 doubles the radius
				assert_eq!(node.data.user_data.radius, NODE_RADIUS * 2.0);
				assert_eq!(node.data.user_data.tooltip, vec!["name: Alice"]);
			} else {
				assert_eq!(node.data.user_data.shape, "box");
			}
		});
		assert_eq!(count, 2);

		assert_eq!(state.edges().len(), 1);
		let edge = &state.edges()[0];
		assert!(edge.curved);
		assert_eq!(edge.roundness, 0.1);
		assert_eq!(edge.label.as_deref(), Some("KNOWS"));
	}

	#[test]
	fn stabilization_cap_stops_the_simulation() {
		let mut options = NetworkOptions::default();
		options.physics.stabilization.iterations = 2;
		let mut state = ForceGraphState::new(&snapshot(), &options, 800.0, 600.0);
		assert!(state.simulation_running);
		state.tick(0.016);
		assert!(state.simulation_running);
		state.tick(0.016);
		assert!(!state.simulation_running);
		// fit adjusted the transform to the node bounds
		assert!(state.transform.k > 0.0);
	}

	#[test]
	fn group_colors_are_stable() {
		assert_eq!(group_color(&Group::Id(0)), COLORS[0]);
		assert_eq!(group_color(&Group::Id(13)), COLORS[3]);
		assert_eq!(
			group_color(&Group::Label("Person".to_string())),
			group_color(&Group::Label("Person".to_string()))
		);
	}
}
