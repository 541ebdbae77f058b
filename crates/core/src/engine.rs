//! The store protocol client.
//!
//! [`TripleStoreEngine`] maintains the versioning invariants on the store:
//! a fact is opened by `insert` with `valid_until` set to the sentinel,
//! closed by `outdate`, and never otherwise touched. Reads are rewritten to a
//! point in time before they are sent.
//!
//! Bulk writes are split into chunks of `chunk_size` facts, one statement
//! per chunk. Chunks are not transactional as a group: if chunk *k* fails,
//! chunks before it stay committed and the error is returned.

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::prefixes::{versioning_prefixes, Prefixes};
use crate::results::ResultTable;
use crate::rewrite::timestamp_query_with;
use crate::templates::{self, render, Templates};
use crate::timestamp::{resolve, sentinel_for, versioning_timestamp_format};
use crate::transport::{HttpTransport, SparqlTransport};
use crate::{Result, StarversError};

/// Facts per write statement unless the caller says otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Marker for a component an `update` leaves unchanged.
const UNDEF: &str = "UNDEF";

pub struct TripleStoreEngine<T = HttpTransport> {
    transport: T,
    templates: &'static Templates,
}

impl TripleStoreEngine<HttpTransport> {
    /// Connect to the store described by `config`.
    ///
    /// Installs the process-wide template table and, unless
    /// `skip_connection_test` is set, runs [`Self::test_connection`].
    pub fn connect(config: &EngineConfig) -> Result<Self> {
        let templates = templates::init(config.template_dir.as_deref())?;
        let engine = Self {
            transport: HttpTransport::new(config)?,
            templates,
        };
        if config.skip_connection_test {
            debug!("connection test skipped");
        } else {
            engine.test_connection()?;
        }
        info!(
            query_endpoint = %config.query_endpoint,
            update_endpoint = %config.update_endpoint,
            "connected to store"
        );
        Ok(engine)
    }
}

impl<T: SparqlTransport> TripleStoreEngine<T> {
    /// An engine over any transport, using the process-wide templates.
    ///
    /// No connection test is run.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            templates: templates::global(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn templates(&self) -> &Templates {
        self.templates
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Prove the store is reachable and accepts nested-triple statements.
    ///
    /// A failing read is [`StarversError::NoConnection`]; a failing nested
    /// insert or delete is [`StarversError::RdfStarNotSupported`].
    pub fn test_connection(&self) -> Result<()> {
        self.transport
            .select(&self.templates.connection_select)
            .map_err(|e| StarversError::NoConnection(e.to_string()))?;
        debug!("store is reachable");

        let prefixes = versioning_prefixes(None)?;
        let insert = render(
            &self.templates.connection_nested_insert,
            &[("prefixes", &prefixes)],
        );
        let delete = render(
            &self.templates.connection_nested_delete,
            &[("prefixes", &prefixes)],
        );
        self.transport
            .update(&insert)
            .and_then(|()| self.transport.update(&delete))
            .map_err(|e| StarversError::RdfStarNotSupported(e.to_string()))?;
        info!("connection test passed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Annotate every fact that has no `valid_from` yet as valid from
    /// `initial_timestamp` (or now) until further notice.
    pub fn version_all_triples(&self, initial_timestamp: Option<DateTime<FixedOffset>>) -> Result<()> {
        let at = resolve(initial_timestamp);
        let statement = render(
            &self.templates.version_all_rows,
            &[
                ("prefixes", &versioning_prefixes(None)?),
                ("timestamp", &versioning_timestamp_format(&at)),
                ("sentinel", &sentinel_for(&at)),
            ],
        );
        self.transport.update(&statement)?;
        info!(timestamp = %versioning_timestamp_format(&at), "all triples versioned");
        Ok(())
    }

    /// Open each fact at `timestamp` (or now).
    ///
    /// `triples` are n3 lines (`<s> <p> "o" .`). A fact that is already open
    /// is left alone, so no fact ever has two open versions.
    pub fn insert(
        &self,
        triples: &[String],
        prefixes: Option<&Prefixes>,
        timestamp: Option<DateTime<FixedOffset>>,
        chunk_size: usize,
    ) -> Result<()> {
        let prologue = versioning_prefixes(prefixes)?;
        if triples.is_empty() {
            info!("insert called without triples, nothing to do");
            return Ok(());
        }
        let rows = values_rows(triples)?;
        let at = resolve(timestamp);
        self.write_chunked(
            "insert",
            &self.templates.insert_triples,
            &rows,
            chunk_size,
            &prologue,
            &at,
        )
    }

    /// Close each currently open fact at `timestamp` (or now).
    ///
    /// Facts that are not open are skipped without error.
    pub fn outdate(
        &self,
        triples: &[String],
        prefixes: Option<&Prefixes>,
        timestamp: Option<DateTime<FixedOffset>>,
        chunk_size: usize,
    ) -> Result<()> {
        let prologue = versioning_prefixes(prefixes)?;
        if triples.is_empty() {
            info!("outdate called without triples, nothing to do");
            return Ok(());
        }
        let rows = values_rows(triples)?;
        let at = resolve(timestamp);
        self.write_chunked(
            "outdate",
            &self.templates.outdate_triples,
            &rows,
            chunk_size,
            &prologue,
            &at,
        )
    }

    /// Replace facts component-wise.
    ///
    /// `old_triples[i]` is closed and its replacement opened at the same
    /// instant. The replacement takes each component of `new_triples[i]`
    /// that is `Some` and keeps the old component where it is `None`.
    /// Both lists must be equally long and every entry must have exactly
    /// three components; otherwise nothing is written.
    pub fn update(
        &self,
        old_triples: &[Vec<String>],
        new_triples: &[Vec<Option<String>>],
        prefixes: Option<&Prefixes>,
        timestamp: Option<DateTime<FixedOffset>>,
        chunk_size: usize,
    ) -> Result<()> {
        let prologue = versioning_prefixes(prefixes)?;
        if old_triples.len() != new_triples.len() {
            return Err(StarversError::WrongInputFormat(format!(
                "{} old triples but {} new triples, the lists must be equally long",
                old_triples.len(),
                new_triples.len()
            )));
        }
        let mut rows = Vec::with_capacity(old_triples.len());
        for (i, (old, new)) in old_triples.iter().zip(new_triples).enumerate() {
            if old.len() != 3 || new.len() != 3 {
                return Err(StarversError::WrongInputFormat(format!(
                    "update entry {i} must have three components in both lists, got {} and {}",
                    old.len(),
                    new.len()
                )));
            }
            let components = old
                .iter()
                .map(|c| update_component(i, c))
                .chain(new.iter().map(|c| match c {
                    Some(c) => update_component(i, c),
                    None => Ok(UNDEF.to_string()),
                }))
                .collect::<Result<Vec<_>>>()?;
            rows.push(format!("({})", components.join(" ")));
        }
        if rows.is_empty() {
            info!("update called without triples, nothing to do");
            return Ok(());
        }
        let at = resolve(timestamp);
        self.write_chunked(
            "update",
            &self.templates.update_triples,
            &rows,
            chunk_size,
            &prologue,
            &at,
        )
    }

    /// Physically remove facts together with all their annotations.
    ///
    /// Destroys history; meant for maintenance, not for ordinary deletes
    /// (use [`Self::outdate`] for those).
    pub fn delete_triples(&self, triples: &[String], prefixes: Option<&Prefixes>) -> Result<()> {
        let prologue = versioning_prefixes(prefixes)?;
        if triples.is_empty() {
            info!("delete called without triples, nothing to do");
            return Ok(());
        }
        let rows = values_rows(triples)?;
        let at = resolve(None);
        self.write_chunked(
            "delete",
            &self.templates.delete_triples,
            &rows,
            DEFAULT_CHUNK_SIZE,
            &prologue,
            &at,
        )
    }

    /// Remove every `valid_from` / `valid_until` annotation.
    pub fn reset_all_versions(&self) -> Result<()> {
        let statement = render(
            &self.templates.reset_all_versions,
            &[("prefixes", &versioning_prefixes(None)?)],
        );
        self.transport.update(&statement)?;
        warn!("all version annotations removed");
        Ok(())
    }

    fn write_chunked(
        &self,
        operation: &str,
        template: &str,
        rows: &[String],
        chunk_size: usize,
        prologue: &str,
        at: &DateTime<FixedOffset>,
    ) -> Result<()> {
        if chunk_size == 0 {
            return Err(StarversError::WrongInputFormat(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        let timestamp = versioning_timestamp_format(at);
        let sentinel = sentinel_for(at);
        let chunks = rows.len().div_ceil(chunk_size);
        for (i, chunk) in rows.chunks(chunk_size).enumerate() {
            let batch = chunk.join("\n");
            let statement = render(
                template,
                &[
                    ("prefixes", prologue),
                    ("batch", &batch),
                    ("timestamp", &timestamp),
                    ("sentinel", &sentinel),
                ],
            );
            self.transport.update(&statement)?;
            debug!(operation, chunk = i + 1, of = chunks, triples = chunk.len(), "chunk written");
        }
        info!(operation, triples = rows.len(), chunks, timestamp = %timestamp, "write finished");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Run a read query as of `timestamp` (or now).
    ///
    /// With `as_rewritten` set the query is rewritten first; unsupported
    /// constructs fail here without contacting the store. With it unset the
    /// text is sent as is, for queries that were rewritten already.
    pub fn query(
        &self,
        query: &str,
        timestamp: Option<DateTime<FixedOffset>>,
        as_rewritten: bool,
    ) -> Result<ResultTable> {
        let text = if as_rewritten {
            let (text, at) = timestamp_query_with(query, timestamp, self.templates)?;
            debug!(timestamp = %at, "query rewritten");
            text
        } else {
            query.to_string()
        };
        ResultTable::from_sparql_json(&self.transport.select(&text)?)
    }

    /// Every fact valid at `timestamp` (or now), as N-Triples.
    pub fn retrieve_snapshot(&self, timestamp: Option<DateTime<FixedOffset>>) -> Result<String> {
        let at = resolve(timestamp);
        let query = render(
            &self.templates.construct_snapshot,
            &[
                ("prefixes", &versioning_prefixes(None)?),
                ("timestamp", &versioning_timestamp_format(&at)),
            ],
        );
        let snapshot = self.transport.construct(&query)?;
        info!(
            timestamp = %versioning_timestamp_format(&at),
            triples = snapshot.lines().filter(|l| !l.trim().is_empty()).count(),
            "snapshot retrieved"
        );
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Input lines
// ---------------------------------------------------------------------------

/// Turn n3 lines into `VALUES` rows: `( <s> <p> "o" )`.
///
/// Every line must hold exactly three terms; the whole batch is rejected
/// before any write otherwise.
fn values_rows(triples: &[String]) -> Result<Vec<String>> {
    triples
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let tokens = tokenize(strip_terminator(line));
            let terms = top_level_terms(&tokens);
            if terms != 3 {
                return Err(StarversError::WrongInputFormat(format!(
                    "triple {i} must have three components, got {terms}: {line}"
                )));
            }
            Ok(format!("( {} )", render_tokens(&tokens)))
        })
        .collect()
}

/// One component of an `update` entry, rendered for a `VALUES` row.
fn update_component(entry: usize, text: &str) -> Result<String> {
    let tokens = tokenize(text.trim());
    if top_level_terms(&tokens) != 1 {
        return Err(StarversError::WrongInputFormat(format!(
            "update entry {entry} has a component that is not a single term: {text}"
        )));
    }
    Ok(render_tokens(&tokens))
}

fn strip_terminator(line: &str) -> &str {
    let trimmed = line.trim();
    trimmed.strip_suffix('.').unwrap_or(trimmed).trim_end()
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    /// `<<`
    Open,
    /// `>>`
    Close,
    Term(&'a str),
}

/// Split an n3 fragment into terms and quoted-triple brackets. Literals
/// are kept whole, with their language tag or datatype.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            c if c.is_ascii_whitespace() => i += 1,
            b'<' if bytes.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Open);
                depth += 1;
                i += 2;
            }
            b'>' if depth > 0 && bytes.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::Close);
                depth -= 1;
                i += 2;
            }
            _ => {
                let end = term_end(bytes, i);
                tokens.push(Token::Term(&text[i..end]));
                i = end;
            }
        }
    }
    tokens
}

/// Terms outside any quoted triple; a quoted triple counts as one.
fn top_level_terms(tokens: &[Token<'_>]) -> usize {
    let mut depth = 0usize;
    let mut count = 0;
    for token in tokens {
        match token {
            Token::Open => {
                if depth == 0 {
                    count += 1;
                }
                depth += 1;
            }
            Token::Close => depth = depth.saturating_sub(1),
            Token::Term(_) if depth == 0 => count += 1,
            Token::Term(_) => {}
        }
    }
    count
}

/// Blank node terms are written as `<_:id>`; quoted triples in `VALUES`
/// rows reject bare blank node labels on common stores.
fn render_tokens(tokens: &[Token<'_>]) -> String {
    tokens
        .iter()
        .map(|token| match token {
            Token::Open => "<<".to_string(),
            Token::Close => ">>".to_string(),
            Token::Term(t) if t.starts_with("_:") => format!("<{t}>"),
            Token::Term(t) => (*t).to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte offset just past the term starting at `start`. Every delimiter is
/// ASCII, so the offset is always a char boundary.
fn term_end(bytes: &[u8], start: usize) -> usize {
    let len = bytes.len();
    let mut i = start;
    match bytes[i] {
        b'<' => {
            while i < len && bytes[i] != b'>' {
                i += 1;
            }
            (i + 1).min(len)
        }
        quote @ (b'"' | b'\'') => {
            i += 1;
            while i < len && bytes[i] != quote {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(len);
            if bytes.get(i) == Some(&b'@') {
                while i < len && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
            } else if bytes.get(i) == Some(&b'^') && bytes.get(i + 1) == Some(&b'^') && i + 2 < len {
                i = term_end(bytes, i + 2);
            }
            i
        }
        _ => {
            while i < len && !bytes[i].is_ascii_whitespace() {
                if bytes[i] == b'>' && bytes.get(i + 1) == Some(&b'>') {
                    break;
                }
                i += 1;
            }
            i.max(start + 1)
        }
    }
}
