//! Core pipeline: classify query-result records, resolve render
//! attributes under the mapping configuration, accumulate the
//! deduplicated dataset, smooth anti-parallel edges, and drive the
//! render lifecycle.

pub mod build;
pub mod config;
pub mod dataset;
pub mod http;
pub mod orchestrator;
pub mod record;
pub mod transport;

pub use build::{BuildError, SizeLookup};
pub use config::{
	CaptionSetting, LabelConfig, NetworkOptions, RelTypeConfig, ScaleSetting, VizConfig,
};
pub use dataset::{DatasetStore, GraphSnapshot, Group, Smooth, SmoothKind, VisEdge, VisNode};
pub use http::HttpCypherTransport;
pub use orchestrator::{CypherViz, NetworkView, RenderPhase, VizError};
pub use record::{
	CypherValue, GraphValue, NodeRecord, PathRecord, Properties, RelRecord, Segment,
};
pub use transport::{
	CypherTransport, FixtureTransport, Params, Record, RecordStream, TransportError,
};
