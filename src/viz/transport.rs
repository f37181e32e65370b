//! Query-transport seam: a Cypher query in, an ordered record stream out.
//!
//! The stream replaces the original three-callback subscription: records
//! arrive in delivery order, exhaustion means completion, and an `Err`
//! item is the terminal transport failure. Dropping the stream releases
//! the underlying session.

use std::collections::HashMap;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::stream::{self, LocalBoxStream, StreamExt};
use thiserror::Error;

use super::record::{CypherValue, GraphValue};

/// One result row: the heterogeneous values of a single record.
#[derive(Clone, Debug, Default)]
pub struct Record {
	pub values: Vec<GraphValue>,
}

impl Record {
	pub fn new(values: Vec<GraphValue>) -> Self {
		Self { values }
	}

	pub fn single(value: GraphValue) -> Self {
		Self { values: vec![value] }
	}
}

/// Query parameters, bound by name.
pub type Params = Vec<(String, CypherValue)>;

/// The push stream of one query execution.
pub type RecordStream = LocalBoxStream<'static, Result<Record, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("query submission failed: {0}")]
	Submit(String),
	#[error("record stream failed: {0}")]
	Stream(String),
	#[error("server returned HTTP status {0}")]
	Status(u16),
	#[error("malformed server response: {0}")]
	Malformed(String),
	#[error("cypher error {code}: {message}")]
	Cypher { code: String, message: String },
	#[error("no browser window available")]
	NoWindow,
}

/// External query-execution collaborator. Single-threaded: futures and
/// streams are local, records are handled strictly in delivery order.
pub trait CypherTransport {
	fn run(
		&self,
		query: &str,
		params: Params,
	) -> LocalBoxFuture<'static, Result<RecordStream, TransportError>>;
}

/// Replays canned records; serves the demo page and the tests. Responses
/// can be keyed by exact query text (size lookups run different queries
/// than the main cycle), with `main` as the fallback.
#[derive(Clone, Debug, Default)]
pub struct FixtureTransport {
	main: Vec<Record>,
	responses: HashMap<String, Vec<Record>>,
	submit_error: Option<String>,
	stream_error: Option<String>,
}

impl FixtureTransport {
	pub fn new(main: Vec<Record>) -> Self {
		Self {
			main,
			..Self::default()
		}
	}

	/// Records returned for one exact query text.
	pub fn with_response(mut self, query: &str, records: Vec<Record>) -> Self {
		self.responses.insert(query.to_string(), records);
		self
	}

	/// Fail every submission (connectivity-style failure).
	pub fn failing(message: &str) -> Self {
		Self {
			submit_error: Some(message.to_string()),
			..Self::default()
		}
	}

	/// Deliver the main records, then fail mid-stream.
	pub fn with_stream_error(mut self, message: &str) -> Self {
		self.stream_error = Some(message.to_string());
		self
	}
}

impl CypherTransport for FixtureTransport {
	fn run(
		&self,
		query: &str,
		_params: Params,
	) -> LocalBoxFuture<'static, Result<RecordStream, TransportError>> {
		if let Some(message) = self.submit_error.clone() {
			return async move { Err(TransportError::Submit(message)) }.boxed_local();
		}
		let records = self
			.responses
			.get(query)
			.cloned()
			.unwrap_or_else(|| self.main.clone());
		let stream_error = self.stream_error.clone();
		async move {
			let delivered = records.into_iter().map(Ok);
			let terminal = stream_error
				.map(|message| Err(TransportError::Stream(message)))
				.into_iter();
			Ok(stream::iter(delivered.chain(terminal)).boxed_local())
		}
		.boxed_local()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::viz::record::NodeRecord;

	use futures::executor::block_on;

	#[test]
	fn fixture_replays_records_then_completes() {
		let transport = FixtureTransport::new(vec![Record::single(GraphValue::Node(
			NodeRecord::new(1, &["Person"]),
		))]);
		block_on(async {
			let mut stream = transport.run("MATCH (n) RETURN n", vec![]).await.unwrap();
			assert!(matches!(
				stream.next().await,
				Some(Ok(record)) if record.values.len() == 1
			));
			assert!(stream.next().await.is_none());
		});
	}

	#[test]
	fn fixture_keyed_response_overrides_main() {
		let transport = FixtureTransport::new(vec![Record::default()])
			.with_response("RETURN 1", vec![Record::default(), Record::default()]);
		block_on(async {
			let stream = transport.run("RETURN 1", vec![]).await.unwrap();
			assert_eq!(stream.count().await, 2);
		});
	}

	#[test]
	fn fixture_failure_modes() {
		let transport = FixtureTransport::failing("no route to host");
		block_on(async {
			assert!(matches!(
				transport.run("RETURN 1", vec![]).await,
				Err(TransportError::Submit(_))
			));
		});

		let transport =
			FixtureTransport::new(vec![Record::default()]).with_stream_error("connection reset");
		block_on(async {
			let mut stream = transport.run("RETURN 1", vec![]).await.unwrap();
			assert!(stream.next().await.unwrap().is_ok());
			assert!(matches!(
				stream.next().await,
				Some(Err(TransportError::Stream(_)))
			));
		});
	}
}
