//! SPARQL 1.1 protocol transport.
//!
//! The engine talks to the store only through [`SparqlTransport`], so the
//! HTTP client can be swapped for an in-process store in tests.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::config::{Credentials, EngineConfig};
use crate::{Result, StarversError};

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
const N_TRIPLES: &str = "application/n-triples";

/// The three exchanges the engine needs from a store.
pub trait SparqlTransport {
    /// Run a SELECT or ASK query; returns the SPARQL JSON results document.
    fn select(&self, query: &str) -> Result<String>;

    /// Run a CONSTRUCT query; returns the graph as N-Triples (N-Triples-star
    /// for quoted triples).
    fn construct(&self, query: &str) -> Result<String>;

    /// Run an update statement.
    fn update(&self, statement: &str) -> Result<()>;
}

/// Blocking HTTP client for a store's read and write endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    query_endpoint: String,
    update_endpoint: String,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("starvers/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            query_endpoint: config.query_endpoint.clone(),
            update_endpoint: config.update_endpoint.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn query_endpoint(&self) -> &str {
        &self.query_endpoint
    }

    pub fn update_endpoint(&self) -> &str {
        &self.update_endpoint
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(c) => request.basic_auth(&c.user, Some(&c.password)),
            None => request,
        }
    }

    fn read(&self, query: &str, accept: &str) -> Result<String> {
        debug!(endpoint = %self.query_endpoint, accept, "sending query");
        let request = self
            .client
            .post(&self.query_endpoint)
            .header(ACCEPT, accept)
            .form(&[("query", query)]);
        let response = self.authorized(request).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(StarversError::Store {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl SparqlTransport for HttpTransport {
    fn select(&self, query: &str) -> Result<String> {
        self.read(query, SPARQL_RESULTS_JSON)
    }

    fn construct(&self, query: &str) -> Result<String> {
        self.read(query, N_TRIPLES)
    }

    fn update(&self, statement: &str) -> Result<()> {
        debug!(endpoint = %self.update_endpoint, bytes = statement.len(), "sending update");
        let request = self
            .client
            .post(&self.update_endpoint)
            .form(&[("update", statement)]);
        let response = self.authorized(request).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(StarversError::Store {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }
}

impl<T: SparqlTransport + ?Sized> SparqlTransport for &T {
    fn select(&self, query: &str) -> Result<String> {
        (**self).select(query)
    }

    fn construct(&self, query: &str) -> Result<String> {
        (**self).construct(query)
    }

    fn update(&self, statement: &str) -> Result<()> {
        (**self).update(statement)
    }
}
