//! Temporal block expansion.
//!
//! Works on the serialized query text. Each placeholder left by the
//! injector is located and replaced by one rendered temporal block per
//! original triple, followed by a binding of the pattern's timestamp
//! variable. Interval variables are numbered across the whole query.
//!
//! A fact closed and later opened again carries two `valid_from` and two
//! `valid_until` annotations on the same quoted triple. The block only
//! accepts a pairing with no other `valid_until` strictly inside it.

use regex::{NoExpand, Regex};

use crate::templates::render;
use crate::versioning::VersionedBgp;
use crate::{Result, StarversError};

/// Replaces placeholders with temporal blocks.
pub struct TemporalBlockExpander<'a, F> {
    template: &'a str,
    is_taken: F,
    counter: usize,
}

impl<'a, F> TemporalBlockExpander<'a, F>
where
    F: Fn(&str) -> bool,
{
    /// `is_taken` reports variable names already used in the query; interval
    /// variable numbers that would clash with one are skipped.
    pub fn new(template: &'a str, is_taken: F) -> Self {
        Self {
            template,
            is_taken,
            counter: 0,
        }
    }

    /// Expand every placeholder of `serialized`.
    ///
    /// `timestamp` must already be in wire format. Fails if a placeholder
    /// cannot be found, which means the serializer produced a form the
    /// expander does not recognise.
    pub fn expand(
        &mut self,
        serialized: &str,
        bgps: &[VersionedBgp],
        timestamp: &str,
    ) -> Result<String> {
        let mut text = serialized.to_string();
        for bgp in bgps {
            let locator = placeholder_regex(bgp)?;
            if !locator.is_match(&text) {
                return Err(StarversError::ExpressionNotCovered(format!(
                    "placeholder for {} not found in the serialized query",
                    bgp.id
                )));
            }
            let block = self.block_for(bgp, timestamp);
            text = locator.replace(&text, NoExpand(&block)).into_owned();
        }
        Ok(text)
    }

    fn block_for(&mut self, bgp: &VersionedBgp, timestamp: &str) -> String {
        let mut block = String::from("\n");
        for triple in &bgp.triples {
            let n = self.next_index();
            let valid_from = format!("?valid_from_{n}");
            let valid_until = format!("?valid_until_{n}");
            let closed_between = format!("?closed_between_{n}");
            let triple = format!("{} {} {}", triple.subject, triple.predicate, triple.object);
            block.push_str(&render(
                self.template,
                &[
                    ("triple", &triple),
                    ("valid_from", &valid_from),
                    ("valid_until", &valid_until),
                    ("closed_between", &closed_between),
                    ("bgp_id", &bgp.id),
                ],
            ));
            if !block.ends_with('\n') {
                block.push('\n');
            }
        }
        block.push_str(&format!(
            "bind(\"{timestamp}\"^^xsd:dateTime as ?ts{})\n",
            bgp.id
        ));
        block
    }

    fn next_index(&mut self) -> usize {
        loop {
            self.counter += 1;
            let n = self.counter;
            let taken = ["valid_from", "valid_until", "closed_between"]
                .iter()
                .any(|stem| (self.is_taken)(&format!("{stem}_{n}")));
            if !taken {
                return n;
            }
        }
    }
}

/// Matches the placeholder of `bgp` with any whitespace between components
/// and an optional trailing `.`.
fn placeholder_regex(bgp: &VersionedBgp) -> Result<Regex> {
    let placeholder = bgp.placeholder();
    let pattern = format!(
        r"{}\s+{}\s+{}(?:\s*\.)?",
        regex::escape(&placeholder.subject.to_string()),
        regex::escape(&placeholder.predicate.to_string()),
        regex::escape(&placeholder.object.to_string()),
    );
    Regex::new(&pattern).map_err(|e| StarversError::Template(e.to_string()))
}
