#![allow(dead_code)]

use std::cell::Cell;

use chrono::{DateTime, FixedOffset};
use oxigraph::model::Term;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use serde_json::{json, Map, Value};
use starvers::{Result, SparqlTransport, StarversError};

/// An in-memory RDF-star store speaking the engine's transport protocol.
pub struct MemoryTransport {
    pub store: Store,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            store: Store::new().unwrap(),
        }
    }

    /// Load plain (unversioned) data straight into the store.
    pub fn load(&self, update: &str) {
        self.store.update(update).unwrap();
    }
}

fn store_error(e: impl std::fmt::Display) -> StarversError {
    StarversError::Store {
        status: 400,
        body: e.to_string(),
    }
}

fn term_json(term: &Term) -> Value {
    match term {
        Term::NamedNode(n) => json!({ "type": "uri", "value": n.as_str() }),
        Term::BlankNode(b) => json!({ "type": "bnode", "value": b.as_str() }),
        Term::Literal(l) => {
            let mut obj = json!({ "type": "literal", "value": l.value() });
            if let Some(lang) = l.language() {
                obj["xml:lang"] = json!(lang);
            } else {
                obj["datatype"] = json!(l.datatype().as_str());
            }
            obj
        }
        Term::Triple(t) => json!({
            "type": "triple",
            "value": {
                "subject": term_json(&Term::from(t.subject.clone())),
                "predicate": term_json(&Term::from(t.predicate.clone())),
                "object": term_json(&t.object),
            }
        }),
    }
}

impl SparqlTransport for MemoryTransport {
    fn select(&self, query: &str) -> Result<String> {
        match self.store.query(query).map_err(store_error)? {
            QueryResults::Boolean(answer) => Ok(json!({ "head": {}, "boolean": answer }).to_string()),
            QueryResults::Solutions(solutions) => {
                let vars: Vec<String> = solutions
                    .variables()
                    .iter()
                    .map(|v| v.as_str().to_string())
                    .collect();
                let mut bindings = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(store_error)?;
                    let mut row = Map::new();
                    for (var, term) in solution.iter() {
                        row.insert(var.as_str().to_string(), term_json(term));
                    }
                    bindings.push(Value::Object(row));
                }
                Ok(json!({ "head": { "vars": vars }, "results": { "bindings": bindings } })
                    .to_string())
            }
            QueryResults::Graph(_) => Err(store_error("graph result for a select request")),
        }
    }

    fn construct(&self, query: &str) -> Result<String> {
        match self.store.query(query).map_err(store_error)? {
            QueryResults::Graph(triples) => {
                let mut out = String::new();
                for triple in triples {
                    out.push_str(&format!("{} .\n", triple.map_err(store_error)?));
                }
                Ok(out)
            }
            _ => Err(store_error("tabular result for a construct request")),
        }
    }

    fn update(&self, statement: &str) -> Result<()> {
        self.store.update(statement).map_err(store_error)
    }
}

/// Counts round trips to an inner transport.
pub struct CountingTransport<T> {
    pub inner: T,
    pub reads: Cell<usize>,
    pub writes: Cell<usize>,
}

impl<T> CountingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
            writes: Cell::new(0),
        }
    }
}

impl<T: SparqlTransport> SparqlTransport for CountingTransport<T> {
    fn select(&self, query: &str) -> Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.inner.select(query)
    }

    fn construct(&self, query: &str) -> Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.inner.construct(query)
    }

    fn update(&self, statement: &str) -> Result<()> {
        self.writes.set(self.writes.get() + 1);
        self.inner.update(statement)
    }
}

pub fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

/// Instant of a `dateTime` result cell (`"<lexical> [<datatype>]"`).
pub fn instant(cell: &str) -> DateTime<FixedOffset> {
    let lexical = cell.split(" [").next().unwrap();
    DateTime::parse_from_rfc3339(lexical).unwrap()
}

pub fn n3(s: &str, p: &str, o: &str) -> String {
    format!("<http://ex.org/{s}> <http://ex.org/{p}> {o} .")
}
