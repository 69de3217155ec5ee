//! GdC Filter List Compiler
//!
//! This crate compiles ABP-syntax filter lists (EasyList, EasyPrivacy,
//! Fanboy's Annoyance) into immutable rule sets for the matcher.

pub mod optimizer;
pub mod parser;

use gdc_core::types::{RuleSet, SourceList};

pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_filter_list, parse_rule_line, ParseError, ParseErrorKind, ParsedList};

/// Result of compiling one list end to end.
#[derive(Debug, Clone)]
pub struct CompiledList {
    pub rule_set: RuleSet,
    pub errors: Vec<ParseError>,
    pub lines: usize,
    pub stats: OptimizeStats,
}

/// Parse and optimize a list into a rule set.
pub fn compile_list(text: &str, source: SourceList) -> CompiledList {
    let mut parsed = parse_filter_list(text, source);
    let stats = optimize_rules(&mut parsed.rules);
    log::info!(
        "{}: {} lines -> {} rules ({} skipped)",
        source,
        parsed.lines,
        stats.after,
        parsed.errors.len()
    );

    CompiledList {
        rule_set: RuleSet::new(source, parsed.rules),
        errors: parsed.errors,
        lines: parsed.lines,
        stats,
    }
}
