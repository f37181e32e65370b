//! Mapping configuration and rendering-engine options.

use std::collections::HashMap;

use serde::Deserialize;

/// A numeric literal applied to every node/edge of the mapping, or the
/// name of a property to read the number from.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScaleSetting {
	Literal(f64),
	Property(String),
}

/// Relationship caption: toggle the type string on/off, or name a property.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CaptionSetting {
	Toggle(bool),
	Property(String),
}

/// Per-label attribute mapping.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelConfig {
	pub caption: Option<String>,
	pub size: Option<ScaleSetting>,
	#[serde(rename = "sizeCypher")]
	pub size_cypher: Option<String>,
	pub community: Option<String>,
	pub shape: Option<String>,
}

/// Per-relationship-type attribute mapping.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelTypeConfig {
	pub thickness: Option<ScaleSetting>,
	pub caption: Option<CaptionSetting>,
}

/// Visualization and server configuration. Immutable for the lifetime of
/// one render cycle.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct VizConfig {
	pub container_id: String,
	pub server_url: String,
	pub server_user: String,
	pub server_password: String,
	pub encrypted: bool,
	pub trust: String,
	pub initial_cypher: String,
	pub labels: HashMap<String, LabelConfig>,
	pub relationships: HashMap<String, RelTypeConfig>,
	pub arrows: bool,
	pub hierarchical: bool,
	pub hierarchical_sort_method: String,
}

impl Default for VizConfig {
	fn default() -> Self {
		Self {
			container_id: "viz".to_string(),
			server_url: "http://localhost:7474".to_string(),
			server_user: "neo4j".to_string(),
			server_password: "neo4j".to_string(),
			encrypted: false,
			trust: "TRUST_ALL_CERTIFICATES".to_string(),
			initial_cypher: "MATCH (n)-[r]->(m) RETURN n, r, m LIMIT 30".to_string(),
			labels: HashMap::new(),
			relationships: HashMap::new(),
			arrows: false,
			hierarchical: false,
			hierarchical_sort_method: "hubsize".to_string(),
		}
	}
}

impl VizConfig {
	/// Mapping for one label; unconfigured labels get the defaults.
	pub fn label_config(&self, label: &str) -> LabelConfig {
		self.labels.get(label).cloned().unwrap_or_default()
	}

	/// Mapping for one relationship type; unconfigured types get defaults.
	pub fn relationship_config(&self, rel_type: &str) -> RelTypeConfig {
		self.relationships.get(rel_type).cloned().unwrap_or_default()
	}
}

/// Node label font.
#[derive(Clone, Debug, PartialEq)]
pub struct FontOptions {
	pub size: f64,
	pub stroke_width: f64,
}

/// Node-level renderer options.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeOptions {
	pub font: FontOptions,
	pub scaling_label: bool,
}

/// Edge-level renderer options.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeOptions {
	pub arrows_to_enabled: bool,
	pub length: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HierarchicalOptions {
	pub enabled: bool,
	pub sort_method: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutOptions {
	pub improved_layout: bool,
	pub hierarchical: HierarchicalOptions,
}

/// Barnes-Hut charge/spring parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct BarnesHutOptions {
	pub gravitational_constant: f64,
	pub spring_constant: f64,
	pub spring_length: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StabilizationOptions {
	pub iterations: u32,
	pub fit: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsOptions {
	pub adaptive_timestep: bool,
	pub barnes_hut: BarnesHutOptions,
	pub stabilization: StabilizationOptions,
}

/// Options handed to the rendering engine alongside the dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkOptions {
	pub nodes: NodeOptions,
	pub edges: EdgeOptions,
	pub layout: LayoutOptions,
	pub physics: PhysicsOptions,
}

impl NetworkOptions {
	pub fn from_config(config: &VizConfig) -> Self {
		Self {
			nodes: NodeOptions {
				font: FontOptions {
					size: 26.0,
					stroke_width: 7.0,
				},
				scaling_label: true,
			},
			edges: EdgeOptions {
				arrows_to_enabled: config.arrows,
				length: 200.0,
			},
			layout: LayoutOptions {
				improved_layout: false,
				hierarchical: HierarchicalOptions {
					enabled: config.hierarchical,
					sort_method: config.hierarchical_sort_method.clone(),
				},
			},
			physics: PhysicsOptions {
				adaptive_timestep: true,
				barnes_hut: BarnesHutOptions {
					gravitational_constant: -8000.0,
					spring_constant: 0.04,
					spring_length: 95.0,
				},
				stabilization: StabilizationOptions {
					iterations: 970,
					fit: true,
				},
			},
		}
	}
}

impl Default for NetworkOptions {
	fn default() -> Self {
		Self::from_config(&VizConfig::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deserializes_mapping_configuration() {
		let config: VizConfig = serde_json::from_str(
			r#"{
				"container_id": "graph",
				"server_url": "http://db:7474",
				"initial_cypher": "MATCH (n) RETURN n",
				"labels": {
					"Person": {
						"caption": "name",
						"size": "pagerank",
						"community": "community"
					},
					"Movie": {
						"size": 3.5,
						"sizeCypher": "MATCH (n) WHERE id(n) = {id} RETURN 5",
						"shape": "box"
					}
				},
				"relationships": {
					"KNOWS": { "thickness": "weight", "caption": false },
					"ACTED_IN": { "thickness": 2.0, "caption": "roles" }
				},
				"arrows": true
			}"#,
		)
		.unwrap();

		assert_eq!(config.container_id, "graph");
		assert!(config.arrows);
		// unset fields fall back to defaults
		assert_eq!(config.hierarchical_sort_method, "hubsize");
		assert!(!config.hierarchical);

		let person = config.label_config("Person");
		assert_eq!(person.caption.as_deref(), Some("name"));
		assert_eq!(person.size, Some(ScaleSetting::Property("pagerank".into())));
		let movie = config.label_config("Movie");
		assert_eq!(movie.size, Some(ScaleSetting::Literal(3.5)));
		assert!(movie.size_cypher.is_some());
		assert_eq!(movie.shape.as_deref(), Some("box"));

		let knows = config.relationship_config("KNOWS");
		assert_eq!(knows.caption, Some(CaptionSetting::Toggle(false)));
		let acted = config.relationship_config("ACTED_IN");
		assert_eq!(acted.thickness, Some(ScaleSetting::Literal(2.0)));
		assert_eq!(acted.caption, Some(CaptionSetting::Property("roles".into())));
	}

	#[test]
	fn unconfigured_mappings_are_defaults() {
		let config = VizConfig::default();
		assert_eq!(config.label_config("Anything"), LabelConfig::default());
		assert_eq!(config.relationship_config("REL"), RelTypeConfig::default());
	}

	#[test]
	fn network_options_carry_config_toggles() {
		let config = VizConfig {
			arrows: true,
			hierarchical: true,
			hierarchical_sort_method: "directed".to_string(),
			..VizConfig::default()
		};
		let options = NetworkOptions::from_config(&config);
		assert!(options.edges.arrows_to_enabled);
		assert!(options.layout.hierarchical.enabled);
		assert_eq!(options.layout.hierarchical.sort_method, "directed");
		assert_eq!(options.physics.stabilization.iterations, 970);
		assert!(options.physics.stabilization.fit);
	}
}
