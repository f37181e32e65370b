//! Value model for records delivered by a Cypher query transport.

use std::fmt;

/// Largest integer magnitude that survives an exact `f64` round-trip.
/// Integers outside this range are not numerically usable for rendering.
pub const SAFE_INTEGER_MAX: i64 = (1 << 53) - 1;

/// A scalar or structured property value as produced by the query engine.
#[derive(Clone, Debug, PartialEq)]
pub enum CypherValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	List(Vec<CypherValue>),
	Map(Vec<(String, CypherValue)>),
}

impl CypherValue {
	/// Numeric view used by size/thickness resolution: floats pass through,
	/// integers convert only inside the safe range, everything else is not
	/// a usable number.
	pub fn as_render_number(&self) -> Option<f64> {
		match self {
			CypherValue::Float(value) => Some(*value),
			CypherValue::Int(value) if value.unsigned_abs() <= SAFE_INTEGER_MAX as u64 => {
				Some(*value as f64)
			}
			_ => None,
		}
	}

	/// Community-group conversion: only integer values convert.
	pub fn as_group_number(&self) -> Option<i64> {
		match self {
			CypherValue::Int(value) => Some(*value),
			_ => None,
		}
	}
}

impl fmt::Display for CypherValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CypherValue::Null => f.write_str("null"),
			CypherValue::Bool(value) => write!(f, "{value}"),
			CypherValue::Int(value) => write!(f, "{value}"),
			CypherValue::Float(value) => write!(f, "{value}"),
			CypherValue::String(value) => f.write_str(value),
			CypherValue::List(items) => {
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{item}")?;
				}
				Ok(())
			}
			CypherValue::Map(entries) => {
				f.write_str("{")?;
				for (i, (key, value)) in entries.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{key}: {value}")?;
				}
				f.write_str("}")
			}
		}
	}
}

impl From<&str> for CypherValue {
	fn from(value: &str) -> Self {
		CypherValue::String(value.to_string())
	}
}

impl From<String> for CypherValue {
	fn from(value: String) -> Self {
		CypherValue::String(value)
	}
}

impl From<i64> for CypherValue {
	fn from(value: i64) -> Self {
		CypherValue::Int(value)
	}
}

impl From<f64> for CypherValue {
	fn from(value: f64) -> Self {
		CypherValue::Float(value)
	}
}

impl From<bool> for CypherValue {
	fn from(value: bool) -> Self {
		CypherValue::Bool(value)
	}
}

/// Insertion-ordered property map. Tooltip text is built by iterating
/// properties in the order the transport delivered them, so ordering is
/// part of the contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties(Vec<(String, CypherValue)>);

impl Properties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert or replace, keeping the original position on replacement.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<CypherValue>) {
		let key = key.into();
		let value = value.into();
		if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
			entry.1 = value;
		} else {
			self.0.push((key, value));
		}
	}

	pub fn get(&self, key: &str) -> Option<&CypherValue> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &CypherValue)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl FromIterator<(String, CypherValue)> for Properties {
	fn from_iter<I: IntoIterator<Item = (String, CypherValue)>>(iter: I) -> Self {
		let mut properties = Properties::new();
		for (key, value) in iter {
			properties.insert(key, value);
		}
		properties
	}
}

/// A graph node as delivered by the query engine.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRecord {
	pub id: i64,
	pub labels: Vec<String>,
	pub properties: Properties,
}

impl NodeRecord {
	pub fn new(id: i64, labels: &[&str]) -> Self {
		Self {
			id,
			labels: labels.iter().map(|l| l.to_string()).collect(),
			properties: Properties::new(),
		}
	}

	pub fn with_property(mut self, key: &str, value: impl Into<CypherValue>) -> Self {
		self.properties.insert(key, value);
		self
	}
}

/// A relationship as delivered by the query engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RelRecord {
	pub id: i64,
	pub rel_type: String,
	pub start: i64,
	pub end: i64,
	pub properties: Properties,
}

impl RelRecord {
	pub fn new(id: i64, rel_type: &str, start: i64, end: i64) -> Self {
		Self {
			id,
			rel_type: rel_type.to_string(),
			start,
			end,
			properties: Properties::new(),
		}
	}

	pub fn with_property(mut self, key: &str, value: impl Into<CypherValue>) -> Self {
		self.properties.insert(key, value);
		self
	}
}

/// One hop of a path.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
	pub start: NodeRecord,
	pub relationship: RelRecord,
	pub end: NodeRecord,
}

/// A path as delivered by the query engine.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRecord {
	pub start: NodeRecord,
	pub end: NodeRecord,
	pub segments: Vec<Segment>,
}

/// One value of a query-result record, classified at the transport
/// boundary into an explicit tagged union. `Unknown` carries the raw
/// value so scalar results (e.g. size lookups) stay inspectable.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphValue {
	Node(NodeRecord),
	Relationship(RelRecord),
	Path(PathRecord),
	Collection(Vec<GraphValue>),
	Unknown(CypherValue),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn render_number_uses_floats_and_safe_integers() {
		assert_eq!(CypherValue::Float(2.5).as_render_number(), Some(2.5));
		assert_eq!(CypherValue::Int(42).as_render_number(), Some(42.0));
		assert_eq!(
			CypherValue::Int(SAFE_INTEGER_MAX).as_render_number(),
			Some(SAFE_INTEGER_MAX as f64)
		);
	}

	#[test]
	fn render_number_rejects_unsafe_and_non_numeric() {
		assert_eq!(CypherValue::Int(SAFE_INTEGER_MAX + 1).as_render_number(), None);
		assert_eq!(CypherValue::Int(i64::MIN).as_render_number(), None);
		assert_eq!(CypherValue::String("12".into()).as_render_number(), None);
		assert_eq!(CypherValue::Bool(true).as_render_number(), None);
	}

	#[test]
	fn group_number_converts_integers_only() {
		assert_eq!(CypherValue::Int(3).as_group_number(), Some(3));
		assert_eq!(CypherValue::Float(3.0).as_group_number(), None);
		assert_eq!(CypherValue::String("3".into()).as_group_number(), None);
	}

	#[test]
	fn properties_keep_insertion_order() {
		let mut properties = Properties::new();
		properties.insert("b", 1i64);
		properties.insert("a", 2i64);
		properties.insert("b", 3i64);
		let keys: Vec<&str> = properties.iter().map(|(k, _)| k).collect();
		assert_eq!(keys, vec!["b", "a"]);
		assert_eq!(properties.get("b"), Some(&CypherValue::Int(3)));
	}

	#[test]
	fn display_matches_tooltip_expectations() {
		assert_eq!(CypherValue::from("Alice").to_string(), "Alice");
		assert_eq!(CypherValue::Int(7).to_string(), "7");
		assert_eq!(CypherValue::Float(1.5).to_string(), "1.5");
		assert_eq!(
			CypherValue::List(vec![1i64.into(), 2i64.into()]).to_string(),
			"1,2"
		);
	}
}
