//! Namespace prefixes for versioned statements.
//!
//! Every statement the engine sends carries the `vers:` namespace used by the
//! `valid_from` / `valid_until` annotation predicates, plus `xsd:` for typed
//! timestamps. `vers` is reserved: a caller can never rebind it. `xsd` is only
//! added when the caller does not declare it already.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Result, StarversError};

/// Reserved prefix name of the versioning vocabulary.
pub const VERS_PREFIX: &str = "vers";
/// Namespace of the versioning vocabulary.
pub const VERS_NAMESPACE: &str = "https://github.com/GreenfishK/DataCitation/versioning/";
/// Annotation predicate holding the start of a fact's validity interval.
pub const VALID_FROM: &str = "https://github.com/GreenfishK/DataCitation/versioning/valid_from";
/// Annotation predicate holding the end of a fact's validity interval.
pub const VALID_UNTIL: &str = "https://github.com/GreenfishK/DataCitation/versioning/valid_until";

/// Conventional prefix name for XML Schema datatypes.
pub const XSD_PREFIX: &str = "xsd";
/// XML Schema datatype namespace.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";

/// A prefix table: short name to namespace IRI.
///
/// Backed by an ordered map so rendering is deterministic; the insertion
/// order of declarations carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prefixes(BTreeMap<String, String>);

impl Prefixes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.insert(name, namespace);
        self
    }

    /// Bind `name` to `namespace`, replacing any previous binding.
    ///
    /// Binding the reserved `vers` name is accepted here and rejected when the
    /// table is rendered for a statement; see [`versioning_prefixes`].
    pub fn insert(&mut self, name: impl Into<String>, namespace: impl Into<String>) {
        self.0.insert(name.into(), namespace.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render the table as a SPARQL prologue, one `PREFIX` line per entry.
    pub fn to_sparql(&self) -> String {
        self.iter()
            .map(|(name, ns)| format!("PREFIX {name}: <{ns}>\n"))
            .collect()
    }

    /// Collect the `PREFIX` declarations of a query prologue. `BASE`
    /// declarations and comments between them are skipped.
    pub fn from_prologue(prologue: &str) -> Self {
        scan_prologue(prologue).0.into_iter().collect()
    }

    /// Fail with [`StarversError::ReservedPrefix`] if `vers` is bound.
    pub fn check_reserved(&self) -> Result<()> {
        if self.contains(VERS_PREFIX) {
            return Err(StarversError::ReservedPrefix(VERS_PREFIX.to_string()));
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Prefixes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One prologue item at the head of the text: a comment, a `BASE`
/// declaration or a `PREFIX` declaration, with trailing whitespace.
fn prologue_item_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:#[^\n]*|BASE\s*<[^>\s]*>|PREFIX\s*(?P<name>[\w.\-]*):\s*<(?P<ns>[^>\s]*)>)\s*",
        )
        .expect("prologue item pattern")
    })
}

/// Walk the prologue at the head of `text`. Returns the `PREFIX` bindings in
/// order and the byte length of the prologue.
fn scan_prologue(text: &str) -> (Vec<(&str, &str)>, usize) {
    let re = prologue_item_regex();
    let mut bindings = Vec::new();
    let mut end = 0;
    while let Some(item) = re.captures(&text[end..]) {
        if let (Some(name), Some(ns)) = (item.name("name"), item.name("ns")) {
            bindings.push((name.as_str(), ns.as_str()));
        }
        let len = item.get(0).map_or(0, |m| m.end());
        if len == 0 {
            break;
        }
        end += len;
    }
    (bindings, end)
}

/// Merge the caller's prefixes with the versioning vocabulary.
///
/// Returns the complete prologue for a statement. Fails before producing any
/// text if the caller binds the reserved `vers` name.
pub fn versioning_prefixes(user: Option<&Prefixes>) -> Result<String> {
    let mut prologue = String::new();
    let mut declares_xsd = false;
    if let Some(user) = user {
        user.check_reserved()?;
        declares_xsd = user.contains(XSD_PREFIX);
        prologue.push_str(&user.to_sparql());
    }
    prologue.push_str(&format!("PREFIX {VERS_PREFIX}: <{VERS_NAMESPACE}>\n"));
    if !declares_xsd {
        prologue.push_str(&format!("PREFIX {XSD_PREFIX}: <{XSD_NAMESPACE}>\n"));
    }
    Ok(prologue)
}

/// Split a query into its prologue and the rest.
///
/// The prologue is every leading `PREFIX` and `BASE` declaration together
/// with interleaved comments, exactly as written (empty when there is none);
/// the second element is the remaining query.
pub fn split_prefixes_query(query: &str) -> (String, String) {
    let (_, end) = scan_prologue(query);
    (query[..end].to_string(), query[end..].to_string())
}
