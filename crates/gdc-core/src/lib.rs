//! GdC Core Library
//!
//! This crate provides the rule model and matching engine used to classify
//! cookies and web beacons as tracking resources.
//!
//! # Architecture
//!
//! Filter lists are compiled (by `gdc-compiler`) into [`RuleSet`]s whose
//! patterns are anchored regular expressions. Rule sets are immutable after
//! construction and are only ever read by the matcher.
//!
//! # Modules
//!
//! - `index`: host index over `||host^` rules
//! - `pattern`: pattern ops and their regex rendering
//! - `psl`: eTLD+1 extraction and domain suffix walking
//! - `url`: host extraction for URLs and bare domains
//! - `matcher`: rule and rule-set evaluation
//! - `types`: shared type definitions

pub mod index;
pub mod matcher;
pub mod pattern;
pub mod psl;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use index::RuleIndex;
pub use matcher::{matches, should_block, Matcher};
pub use pattern::{CompiledPattern, PatternError, PatternOp};
pub use psl::{get_etld1, is_third_party};
pub use types::{
    DomainConstraint, FilterRule, MatchDecision, MatchResult, PartyMask, RequestType,
    ResourceRequest, RuleAction, RuleFlags, RuleSet, SourceList,
};
