//! Tabular query results.
//!
//! Converts a SPARQL 1.1 JSON results document into rows of display strings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

/// Query results as named columns and rows of optional cells.
///
/// A cell is `None` when its variable is unbound in that solution. Literal
/// cells carry their language tag (`"chat@fr"`) or datatype
/// (`"42 [http://www.w3.org/2001/XMLSchema#integer]"`); IRIs and blank nodes
/// are their bare value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultTable {
    /// Parse a SPARQL JSON results document (SELECT or ASK).
    pub fn from_sparql_json(body: &str) -> Result<Self> {
        let doc: SparqlJson = serde_json::from_str(body)?;
        if let Some(answer) = doc.boolean {
            return Ok(Self {
                columns: vec!["boolean".to_string()],
                rows: vec![vec![Some(answer.to_string())]],
            });
        }
        let columns = doc.head.vars;
        let rows: Vec<Vec<Option<String>>> = doc
            .results
            .map(|r| r.bindings)
            .unwrap_or_default()
            .into_iter()
            .map(|mut solution| {
                columns
                    .iter()
                    .map(|var| solution.remove(var).map(|term| term.display()))
                    .collect()
            })
            .collect();
        debug!(columns = columns.len(), rows = rows.len(), "results converted");
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All cells of column `name`, or `None` if there is no such column.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).and_then(|cell| cell.as_deref()))
                .collect(),
        )
    }

    /// The single boolean of an ASK result.
    pub fn as_boolean(&self) -> Option<bool> {
        match (self.columns.as_slice(), self.rows.as_slice()) {
            ([column], [row]) if column == "boolean" => {
                row.first()?.as_deref().and_then(|v| v.parse().ok())
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SparqlJson {
    #[serde(default)]
    head: Head,
    #[serde(default)]
    results: Option<Bindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Default, Deserialize)]
struct Head {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Deserialize)]
struct Bindings {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum JsonTerm {
    Uri {
        value: String,
    },
    #[serde(alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(rename = "xml:lang", default)]
        lang: Option<String>,
        #[serde(default)]
        datatype: Option<String>,
    },
    Bnode {
        value: String,
    },
    Triple {
        value: Box<JsonTriple>,
    },
}

#[derive(Deserialize)]
struct JsonTriple {
    subject: JsonTerm,
    predicate: JsonTerm,
    object: JsonTerm,
}

impl JsonTerm {
    /// Cell text.
    fn display(&self) -> String {
        match self {
            JsonTerm::Uri { value } | JsonTerm::Bnode { value } => value.clone(),
            JsonTerm::Literal {
                value,
                lang: Some(lang),
                ..
            } => format!("{value}@{lang}"),
            JsonTerm::Literal {
                value,
                datatype: Some(datatype),
                ..
            } if datatype != XSD_STRING && datatype != RDF_LANG_STRING => {
                format!("{value} [{datatype}]")
            }
            JsonTerm::Literal { value, .. } => value.clone(),
            JsonTerm::Triple { value } => format!(
                "<< {} {} {} >>",
                value.subject.n3(),
                value.predicate.n3(),
                value.object.n3()
            ),
        }
    }

    /// N-Triples-style text, used inside quoted triples.
    fn n3(&self) -> String {
        match self {
            JsonTerm::Uri { value } => format!("<{value}>"),
            JsonTerm::Bnode { value } => format!("_:{value}"),
            JsonTerm::Literal {
                value,
                lang: Some(lang),
                ..
            } => format!("{value:?}@{lang}"),
            JsonTerm::Literal {
                value,
                datatype: Some(datatype),
                ..
            } if datatype != XSD_STRING && datatype != RDF_LANG_STRING => {
                format!("{value:?}^^<{datatype}>")
            }
            JsonTerm::Literal { value, .. } => format!("{value:?}"),
            JsonTerm::Triple { .. } => self.display(),
        }
    }
}
