//! Point-in-time query rewriting.
//!
//! `parse → resolve paths → inject placeholders → serialize → expand`.
//! Everything here is pure: unsupported constructs are reported before the
//! caller gets a chance to send anything to a store.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use spargebra::Query;
use tracing::debug;

use crate::path_resolver::PathResolver;
use crate::prefixes::{split_prefixes_query, versioning_prefixes, Prefixes};
use crate::temporal_block::TemporalBlockExpander;
use crate::templates::{self, Templates};
use crate::timestamp::{resolve, versioning_timestamp_format};
use crate::versioning::inject_versioning;
use crate::{Result, StarversError};

/// Rewrite `query` so it only sees facts valid at `timestamp` (or now).
///
/// Returns the rewritten query text and the wire-format timestamp it was
/// bound to. Uses the process-wide template table.
pub fn timestamp_query(
    query: &str,
    timestamp: Option<DateTime<FixedOffset>>,
) -> Result<(String, String)> {
    timestamp_query_with(query, timestamp, templates::global())
}

/// [`timestamp_query`] with an explicit template table.
pub fn timestamp_query_with(
    query: &str,
    timestamp: Option<DateTime<FixedOffset>>,
    templates: &Templates,
) -> Result<(String, String)> {
    let (prologue, _) = split_prefixes_query(query);
    let user_prefixes = Prefixes::from_prologue(&prologue);
    user_prefixes.check_reserved()?;

    let timestamp = versioning_timestamp_format(&resolve(timestamp));

    let mut parsed = Query::from_str(query).map_err(|e| StarversError::Parse(e.to_string()))?;
    let mut resolver = PathResolver::for_query_text(query);
    resolver.resolve(&mut parsed)?;
    let bgps = inject_versioning(&mut parsed)?;
    debug!(bgps = bgps.len(), timestamp = %timestamp, "query versioned");

    let serialized = parsed.to_string();
    let body = TemporalBlockExpander::new(&templates.temporal_block, |name| {
        resolver.is_taken(name)
    })
    .expand(&serialized, &bgps, &timestamp)?;

    let mut rewritten = versioning_prefixes(Some(&user_prefixes))?;
    rewritten.push_str(&body);
    Ok((rewritten, timestamp))
}
