//! Starvers: valid-time versioning for RDF-star triple stores.
//!
//! Every fact in the store is kept as a nested (RDF-star) statement annotated
//! with a validity interval:
//!
//! ```text
//! << :alice :worksAt :acme >> vers:valid_from  "2024-01-01T00:00:00.000+01:00"^^xsd:dateTime .
//! << :alice :worksAt :acme >> vers:valid_until "9999-12-31T00:00:00.000+01:00"^^xsd:dateTime .
//! ```
//!
//! Facts are never mutated in place. Inserting opens a fact at an instant,
//! outdating closes it, and the full history stays queryable: any read query
//! can be rewritten so that it only sees the facts valid at a given instant.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use starvers::{EngineConfig, TripleStoreEngine};
//!
//! let config = EngineConfig::new("http://localhost:7200/repositories/kg");
//! let engine = TripleStoreEngine::connect(&config).unwrap();
//!
//! let triples = vec!["<http://ex.org/alice> <http://ex.org/worksAt> <http://ex.org/acme> .".to_string()];
//! engine.insert(&triples, None, None, config.chunk_size).unwrap();
//!
//! // Point-in-time query
//! let at = "2024-03-01T00:00:00+01:00".parse().unwrap();
//! let rows = engine
//!     .query("SELECT ?who WHERE { ?who <http://ex.org/worksAt> ?org }", Some(at), true)
//!     .unwrap();
//! println!("{} rows", rows.len());
//! ```
//!
//! # Rewriting without a store
//!
//! [`timestamp_query`] runs the rewrite pipeline on its own: property paths
//! are resolved into plain triple patterns, every basic graph pattern is
//! replaced by a block binding and constraining each fact's validity
//! interval, and the query is serialized back to SPARQL.

pub mod config;
pub mod engine;
pub mod path_resolver;
pub mod prefixes;
pub mod results;
pub mod rewrite;
pub mod temporal_block;
pub mod templates;
pub mod timestamp;
pub mod transport;
pub mod versioning;
pub mod visit;

pub use config::{Credentials, EngineConfig};
pub use engine::{TripleStoreEngine, DEFAULT_CHUNK_SIZE};
pub use prefixes::{split_prefixes_query, versioning_prefixes, Prefixes};
pub use results::ResultTable;
pub use rewrite::timestamp_query;
pub use templates::Templates;
pub use transport::{HttpTransport, SparqlTransport};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StarversError {
    /// The query text is not valid SPARQL.
    #[error("query could not be parsed: {0}")]
    Parse(String),
    /// The query uses a construct the rewriter cannot version.
    #[error("query will not be timestamped: {0}")]
    ExpressionNotCovered(String),
    #[error("wrong input format: {0}")]
    WrongInputFormat(String),
    #[error("the prefix \"{0}\" is reserved, please choose another one")]
    ReservedPrefix(String),
    #[error("no connection to the RDF-star store could be established: {0}")]
    NoConnection(String),
    #[error("the store does not seem to support RDF-star statements: {0}")]
    RdfStarNotSupported(String),
    /// The store answered with a non-success status.
    #[error("store responded with status {status}: {body}")]
    Store { status: u16, body: String },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("template error: {0}")]
    Template(String),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StarversError>;
