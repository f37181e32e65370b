//! Cypher over the Neo4j HTTP transactional endpoint.
//!
//! Queries are POSTed to the transactional-commit API with the `graph`
//! result format requested, so every row arrives pre-classified into
//! node and relationship sets; plain `row` columns are carried along for
//! scalar results such as size lookups. Runs in the browser via `fetch`;
//! response parsing is pure and testable on any target.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::stream::{self, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

use super::config::VizConfig;
use super::record::{CypherValue, GraphValue, NodeRecord, Properties, RelRecord};
use super::transport::{CypherTransport, Params, Record, RecordStream, TransportError};

/// Transport speaking the HTTP transactional-commit API.
#[derive(Clone, Debug)]
pub struct HttpCypherTransport {
	endpoint: String,
	authorization: Option<String>,
}

impl HttpCypherTransport {
	pub fn from_config(config: &VizConfig) -> Self {
		let endpoint = format!(
			"{}/db/data/transaction/commit",
			config.server_url.trim_end_matches('/')
		);
		let authorization = basic_auth(&config.server_user, &config.server_password);
		Self {
			endpoint,
			authorization,
		}
	}
}

impl CypherTransport for HttpCypherTransport {
	fn run(
		&self,
		query: &str,
		params: Params,
	) -> LocalBoxFuture<'static, Result<RecordStream, TransportError>> {
		let body = match serde_json::to_string(&CommitRequest::new(query, &params)) {
			Ok(body) => body,
			Err(err) => {
				return async move { Err(TransportError::Submit(err.to_string())) }.boxed_local();
			}
		};
		let endpoint = self.endpoint.clone();
		let authorization = self.authorization.clone();
		async move {
			let text = fetch_text(&endpoint, authorization.as_deref(), &body).await?;
			let records = parse_commit_response(&text)?;
			debug!("transactional endpoint returned {} records", records.len());
			Ok(stream::iter(records.into_iter().map(Ok)).boxed_local())
		}
		.boxed_local()
	}
}

fn basic_auth(user: &str, password: &str) -> Option<String> {
	let window = web_sys::window()?;
	let encoded = window.btoa(&format!("{user}:{password}")).ok()?;
	Some(format!("Basic {encoded}"))
}

async fn fetch_text(
	endpoint: &str,
	authorization: Option<&str>,
	body: &str,
) -> Result<String, TransportError> {
	let window = web_sys::window().ok_or(TransportError::NoWindow)?;

	let init = RequestInit::new();
	init.set_method("POST");
	init.set_body(&JsValue::from_str(body));
	let request =
		Request::new_with_str_and_init(endpoint, &init).map_err(submit_error)?;
	let headers = request.headers();
	headers
		.set("Content-Type", "application/json")
		.map_err(submit_error)?;
	headers.set("Accept", "application/json").map_err(submit_error)?;
	if let Some(authorization) = authorization {
		headers
			.set("Authorization", authorization)
			.map_err(submit_error)?;
	}

	let response: Response = JsFuture::from(window.fetch_with_request(&request))
		.await
		.map_err(submit_error)?
		.dyn_into()
		.map_err(|_| TransportError::Malformed("fetch did not yield a response".to_string()))?;
	if !response.ok() {
		return Err(TransportError::Status(response.status()));
	}
	let text = JsFuture::from(response.text().map_err(submit_error)?)
		.await
		.map_err(submit_error)?;
	text.as_string()
		.ok_or_else(|| TransportError::Malformed("response body is not text".to_string()))
}

fn submit_error(value: JsValue) -> TransportError {
	TransportError::Submit(
		value
			.as_string()
			.unwrap_or_else(|| format!("{value:?}")),
	)
}

#[derive(Serialize)]
struct CommitRequest<'a> {
	statements: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
	statement: &'a str,
	parameters: serde_json::Map<String, JsonValue>,
	#[serde(rename = "resultDataContents")]
	result_data_contents: [&'a str; 2],
}

impl<'a> CommitRequest<'a> {
	fn new(statement: &'a str, params: &Params) -> Self {
		let parameters = params
			.iter()
			.map(|(key, value)| (key.clone(), cypher_to_json(value)))
			.collect();
		Self {
			statements: [Statement {
				statement,
				parameters,
				result_data_contents: ["row", "graph"],
			}],
		}
	}
}

#[derive(Deserialize)]
struct CommitResponse {
	#[serde(default)]
	results: Vec<StatementResult>,
	#[serde(default)]
	errors: Vec<ServerError>,
}

#[derive(Deserialize)]
struct ServerError {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

#[derive(Deserialize)]
struct StatementResult {
	#[serde(default)]
	data: Vec<Row>,
}

#[derive(Deserialize)]
struct Row {
	#[serde(default)]
	row: Vec<JsonValue>,
	#[serde(default)]
	graph: GraphRow,
}

#[derive(Default, Deserialize)]
struct GraphRow {
	#[serde(default)]
	nodes: Vec<JsonNode>,
	#[serde(default)]
	relationships: Vec<JsonRelationship>,
}

#[derive(Deserialize)]
struct JsonNode {
	id: String,
	#[serde(default)]
	labels: Vec<String>,
	#[serde(default)]
	properties: serde_json::Map<String, JsonValue>,
}

#[derive(Deserialize)]
struct JsonRelationship {
	id: String,
	#[serde(rename = "type")]
	rel_type: String,
	#[serde(rename = "startNode")]
	start: String,
	#[serde(rename = "endNode")]
	end: String,
	#[serde(default)]
	properties: serde_json::Map<String, JsonValue>,
}

/// Parse a transactional-commit response body into records. The scalar
/// `row` columns come first in each record (size lookups scan them for
/// the first numeric value), followed by the row's graph content.
pub fn parse_commit_response(body: &str) -> Result<Vec<Record>, TransportError> {
	let response: CommitResponse =
		serde_json::from_str(body).map_err(|err| TransportError::Malformed(err.to_string()))?;
	if let Some(error) = response.errors.into_iter().next() {
		return Err(TransportError::Cypher {
			code: error.code,
			message: error.message,
		});
	}

	let mut records = Vec::new();
	for result in response.results {
		for row in result.data {
			let mut values: Vec<GraphValue> = row
				.row
				.iter()
				.map(|value| GraphValue::Unknown(json_to_cypher(value)))
				.collect();
			for node in row.graph.nodes {
				values.push(GraphValue::Node(parse_node(node)?));
			}
			for relationship in row.graph.relationships {
				values.push(GraphValue::Relationship(parse_relationship(relationship)?));
			}
			records.push(Record::new(values));
		}
	}
	Ok(records)
}

fn parse_node(node: JsonNode) -> Result<NodeRecord, TransportError> {
	Ok(NodeRecord {
		id: parse_id(&node.id)?,
		labels: node.labels,
		properties: json_properties(node.properties),
	})
}

fn parse_relationship(relationship: JsonRelationship) -> Result<RelRecord, TransportError> {
	Ok(RelRecord {
		id: parse_id(&relationship.id)?,
		rel_type: relationship.rel_type,
		start: parse_id(&relationship.start)?,
		end: parse_id(&relationship.end)?,
		properties: json_properties(relationship.properties),
	})
}

fn parse_id(id: &str) -> Result<i64, TransportError> {
	id.parse()
		.map_err(|_| TransportError::Malformed(format!("non-numeric entity id {id:?}")))
}

fn json_properties(map: serde_json::Map<String, JsonValue>) -> Properties {
	map.into_iter()
		.map(|(key, value)| (key, json_to_cypher(&value)))
		.collect()
}

fn json_to_cypher(value: &JsonValue) -> CypherValue {
	match value {
		JsonValue::Null => CypherValue::Null,
		JsonValue::Bool(b) => CypherValue::Bool(*b),
		JsonValue::Number(n) => {
			if let Some(i) = n.as_i64() {
				CypherValue::Int(i)
			} else {
				CypherValue::Float(n.as_f64().unwrap_or(f64::NAN))
			}
		}
		JsonValue::String(s) => CypherValue::String(s.clone()),
		JsonValue::Array(items) => CypherValue::List(items.iter().map(json_to_cypher).collect()),
		JsonValue::Object(map) => CypherValue::Map(
			map.iter()
				.map(|(key, value)| (key.clone(), json_to_cypher(value)))
				.collect(),
		),
	}
}

fn cypher_to_json(value: &CypherValue) -> JsonValue {
	match value {
		CypherValue::Null => JsonValue::Null,
		CypherValue::Bool(b) => JsonValue::Bool(*b),
		CypherValue::Int(i) => JsonValue::Number((*i).into()),
		CypherValue::Float(f) => serde_json::Number::from_f64(*f)
			.map(JsonValue::Number)
			.unwrap_or(JsonValue::Null),
		CypherValue::String(s) => JsonValue::String(s.clone()),
		CypherValue::List(items) => JsonValue::Array(items.iter().map(cypher_to_json).collect()),
		CypherValue::Map(entries) => JsonValue::Object(
			entries
				.iter()
				.map(|(key, value)| (key.clone(), cypher_to_json(value)))
				.collect(),
		),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_graph_rows_into_records() {
		let body = r#"{
			"results": [{
				"columns": ["n", "r", "m"],
				"data": [{
					"row": [{"name": "Alice"}, {}, {"name": "Bob"}],
					"graph": {
						"nodes": [
							{"id": "1", "labels": ["Person"], "properties": {"name": "Alice", "age": 33}},
							{"id": "2", "labels": ["Person"], "properties": {"name": "Bob"}}
						],
						"relationships": [
							{"id": "10", "type": "KNOWS", "startNode": "1", "endNode": "2", "properties": {"since": 2011}}
						]
					}
				}]
			}],
			"errors": []
		}"#;

		let records = parse_commit_response(body).unwrap();
		assert_eq!(records.len(), 1);
		let nodes: Vec<&NodeRecord> = records[0]
			.values
			.iter()
			.filter_map(|value| match value {
				GraphValue::Node(node) => Some(node),
				_ => None,
			})
			.collect();
		assert_eq!(nodes.len(), 2);
		assert_eq!(nodes[0].id, 1);
		assert_eq!(nodes[0].labels, vec!["Person"]);
		assert_eq!(
			nodes[0].properties.get("age"),
			Some(&CypherValue::Int(33))
		);
		let rels: Vec<&RelRecord> = records[0]
			.values
			.iter()
			.filter_map(|value| match value {
				GraphValue::Relationship(rel) => Some(rel),
				_ => None,
			})
			.collect();
		assert_eq!(rels.len(), 1);
		assert_eq!((rels[0].start, rels[0].end), (1, 2));
		assert_eq!(rels[0].rel_type, "KNOWS");
	}

	#[test]
	fn scalar_rows_become_unknown_values() {
		let body = r#"{"results": [{"columns": ["size"], "data": [{"row": [42]}]}], "errors": []}"#;
		let records = parse_commit_response(body).unwrap();
		assert_eq!(
			records[0].values,
			vec![GraphValue::Unknown(CypherValue::Int(42))]
		);
	}

	#[test]
	fn server_errors_surface_as_cypher_errors() {
		let body = r#"{"results": [], "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad query"}]}"#;
		match parse_commit_response(body) {
			Err(TransportError::Cypher { code, message }) => {
				assert!(code.ends_with("SyntaxError"));
				assert_eq!(message, "bad query");
			}
			other => panic!("expected cypher error, got {other:?}"),
		}
	}

	#[test]
	fn malformed_ids_are_rejected() {
		let body = r#"{"results": [{"data": [{"graph": {"nodes": [{"id": "abc"}]}}]}], "errors": []}"#;
		assert!(matches!(
			parse_commit_response(body),
			Err(TransportError::Malformed(_))
		));
	}

	#[test]
	fn request_body_carries_parameters_and_graph_format() {
		let request = CommitRequest::new(
			"MATCH (n) WHERE id(n) = $id RETURN n",
			&vec![("id".to_string(), CypherValue::Int(7))],
		);
		let json = serde_json::to_string(&request).unwrap();
		assert!(json.contains(r#""parameters":{"id":7}"#));
		assert!(json.contains(r#""resultDataContents":["row","graph"]"#));
	}
}
