//! Host index for rule sets
//!
//! Rules of the form `||host^` make up most of every block-list. They are
//! keyed by their literal host so a request only verifies the rules whose
//! host is a label suffix of some host-like run in the request. All other
//! rules go through an ordered scan.
//!
//! Lookup keys over-approximate what the `||` regex can match: each run of
//! non-separator characters at the start of the request (and after a
//! leading `scheme:` / `scheme://` / `//`) contributes itself and every
//! parent domain. Candidates are still verified with the full rule, so the
//! index never changes a verdict.

use std::collections::HashMap;

use crate::psl::walk_host_suffixes;
use crate::types::{FilterRule, RuleAction, RuleFlags};
use crate::url::is_scheme;

/// Rule ids by host, split by action, plus the ids that need scanning.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    block_hosts: HashMap<String, Vec<u32>>,
    allow_hosts: HashMap<String, Vec<u32>>,
    scan_block: Vec<u32>,
    scan_allow: Vec<u32>,
}

impl RuleIndex {
    pub fn build(rules: &[FilterRule]) -> Self {
        let mut index = Self::default();
        for (id, rule) in rules.iter().enumerate() {
            let id = id as u32;
            match (rule.action, indexed_host(rule)) {
                (RuleAction::Block, Some(host)) => index.block_hosts.entry(host).or_default().push(id),
                (RuleAction::Allow, Some(host)) => index.allow_hosts.entry(host).or_default().push(id),
                (RuleAction::Block, None) => index.scan_block.push(id),
                (RuleAction::Allow, None) => index.scan_allow.push(id),
            }
        }
        log::trace!(
            "indexed {} block and {} allow hosts, {} rules scanned",
            index.block_hosts.len(),
            index.allow_hosts.len(),
            index.scan_block.len() + index.scan_allow.len()
        );
        index
    }

    /// Ids of `action` rules indexed under `host`, ascending.
    pub fn candidates(&self, action: RuleAction, host: &str) -> &[u32] {
        let hosts = match action {
            RuleAction::Block => &self.block_hosts,
            RuleAction::Allow => &self.allow_hosts,
        };
        hosts.get(host).map(Vec::as_slice).unwrap_or_default()
    }

    /// Ids of `action` rules outside the index, ascending.
    pub fn scanned(&self, action: RuleAction) -> &[u32] {
        match action {
            RuleAction::Block => &self.scan_block,
            RuleAction::Allow => &self.scan_allow,
        }
    }

    pub fn indexed_len(&self) -> usize {
        self.block_hosts.values().chain(self.allow_hosts.values()).map(Vec::len).sum()
    }
}

/// Literal host of a case-insensitive `||host^` rule.
pub fn indexed_host(rule: &FilterRule) -> Option<String> {
    if rule
        .flags
        .intersects(RuleFlags::IS_REGEX | RuleFlags::MATCH_CASE)
    {
        return None;
    }
    let host = rule.pattern.strip_prefix("||")?.strip_suffix('^')?;
    let plain = !host.is_empty()
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-');
    if plain {
        Some(host.to_ascii_lowercase())
    } else {
        None
    }
}

/// Lowercased index keys for a request string, without duplicates.
pub fn host_keys(request: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for start in anchor_starts(request) {
        let rest = &request[start..];
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        for run in rest[..end].split(is_separator) {
            let run = run.to_lowercase();
            for suffix in walk_host_suffixes(&run) {
                if !keys.iter().any(|k| k == suffix) {
                    keys.push(suffix.to_string());
                }
            }
        }
    }
    keys
}

/// Where a `||` anchor may start matching: the start of the request, after
/// a leading `scheme:` or `scheme://`, or after a leading `//`.
fn anchor_starts(request: &str) -> Vec<usize> {
    let mut starts = vec![0];
    if request.starts_with("//") {
        starts.push(2);
    }
    if let Some(colon) = request.find(':') {
        if is_scheme(&request[..colon]) {
            starts.push(colon + 1);
            if request[colon + 1..].starts_with("//") {
                starts.push(colon + 3);
            }
        }
    }
    starts
}

/// Characters that end a host, as `^` sees them.
fn is_separator(c: char) -> bool {
    !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '%'))
}
