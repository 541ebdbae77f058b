//! Statement templates.
//!
//! Every SPARQL statement the engine sends is rendered from a text template
//! with named `{placeholder}` slots. The templates are configuration rather
//! than code: the compiled-in defaults can be overridden file by file from a
//! directory, and the resulting table is installed once per process and never
//! mutated afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::{Result, StarversError};

/// The complete set of statement templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    /// Per-triple temporal block spliced into rewritten queries.
    ///
    /// Slots: `{triple}`, `{valid_from}`, `{valid_until}`, `{bgp_id}`.
    pub temporal_block: String,
    /// Plain read used to prove the store is reachable.
    pub connection_select: String,
    /// Nested-triple write used to prove RDF-star support.
    pub connection_nested_insert: String,
    /// Removes what `connection_nested_insert` wrote.
    pub connection_nested_delete: String,
    pub insert_triples: String,
    pub outdate_triples: String,
    pub update_triples: String,
    pub version_all_rows: String,
    pub construct_snapshot: String,
    pub delete_triples: String,
    pub reset_all_versions: String,
    /// Directory the overrides were read from, if any.
    pub source: Option<PathBuf>,
}

/// Template file names, relative to a template directory.
const TEMPORAL_BLOCK: &str = "versioning_query_extensions.txt";
const CONNECTION_SELECT: &str = "test_connection/test_connection_select.txt";
const CONNECTION_NESTED_INSERT: &str = "test_connection/test_connection_nested_insert.txt";
const CONNECTION_NESTED_DELETE: &str = "test_connection/test_connection_nested_delete.txt";
const INSERT_TRIPLES: &str = "insert_triples.txt";
const OUTDATE_TRIPLES: &str = "outdate_triples.txt";
const UPDATE_TRIPLES: &str = "update_triples.txt";
const VERSION_ALL_ROWS: &str = "version_all_rows.txt";
const CONSTRUCT_SNAPSHOT: &str = "construct_snapshot.txt";
const DELETE_TRIPLES: &str = "_delete_triples.txt";
const RESET_ALL_VERSIONS: &str = "_reset_all_versions.txt";

impl Default for Templates {
    fn default() -> Self {
        Self {
            temporal_block: include_str!("../templates/versioning_query_extensions.txt")
                .to_string(),
            connection_select: include_str!(
                "../templates/test_connection/test_connection_select.txt"
            )
            .to_string(),
            connection_nested_insert: include_str!(
                "../templates/test_connection/test_connection_nested_insert.txt"
            )
            .to_string(),
            connection_nested_delete: include_str!(
                "../templates/test_connection/test_connection_nested_delete.txt"
            )
            .to_string(),
            insert_triples: include_str!("../templates/insert_triples.txt").to_string(),
            outdate_triples: include_str!("../templates/outdate_triples.txt").to_string(),
            update_triples: include_str!("../templates/update_triples.txt").to_string(),
            version_all_rows: include_str!("../templates/version_all_rows.txt").to_string(),
            construct_snapshot: include_str!("../templates/construct_snapshot.txt").to_string(),
            delete_triples: include_str!("../templates/_delete_triples.txt").to_string(),
            reset_all_versions: include_str!("../templates/_reset_all_versions.txt").to_string(),
            source: None,
        }
    }
}

impl Templates {
    /// Start from the defaults and replace every template for which `dir`
    /// holds a file of the same relative name.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(StarversError::Template(format!(
                "template directory {} does not exist",
                dir.display()
            )));
        }
        let mut templates = Self::default();
        {
            let slots: [(&str, &mut String); 11] = [
                (TEMPORAL_BLOCK, &mut templates.temporal_block),
                (CONNECTION_SELECT, &mut templates.connection_select),
                (CONNECTION_NESTED_INSERT, &mut templates.connection_nested_insert),
                (CONNECTION_NESTED_DELETE, &mut templates.connection_nested_delete),
                (INSERT_TRIPLES, &mut templates.insert_triples),
                (OUTDATE_TRIPLES, &mut templates.outdate_triples),
                (UPDATE_TRIPLES, &mut templates.update_triples),
                (VERSION_ALL_ROWS, &mut templates.version_all_rows),
                (CONSTRUCT_SNAPSHOT, &mut templates.construct_snapshot),
                (DELETE_TRIPLES, &mut templates.delete_triples),
                (RESET_ALL_VERSIONS, &mut templates.reset_all_versions),
            ];
            for (name, slot) in slots {
                let path = dir.join(name);
                if path.is_file() {
                    *slot = fs::read_to_string(&path)?;
                    debug!(template = name, path = %path.display(), "template overridden");
                }
            }
        }
        templates.source = Some(dir.to_path_buf());
        Ok(templates)
    }
}

/// Fill the named `{slot}`s of `template`.
///
/// Braces that do not form one of the given slot names are left untouched,
/// so SPARQL group syntax needs no escaping.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{name}}}"), value)
        })
}

static GLOBAL: OnceLock<Templates> = OnceLock::new();

/// Install the process-wide template table.
///
/// The first call wins. Later calls return the installed table; a later call
/// asking for a different directory is logged and ignored rather than
/// reloading, since the table is immutable once in use.
pub fn init(dir: Option<&Path>) -> Result<&'static Templates> {
    if let Some(existing) = GLOBAL.get() {
        if dir.is_some() && existing.source.as_deref() != dir {
            warn!(
                requested = ?dir,
                installed = ?existing.source,
                "template table already installed, keeping it"
            );
        }
        return Ok(existing);
    }
    let loaded = match dir {
        Some(dir) => Templates::load_dir(dir)?,
        None => Templates::default(),
    };
    Ok(GLOBAL.get_or_init(|| loaded))
}

/// The process-wide template table, falling back to the defaults if
/// [`init`] was never called.
pub fn global() -> &'static Templates {
    GLOBAL.get_or_init(Templates::default)
}
