//! Core type definitions for the GdC classification engine
//!
//! These types are shared by the compiler (which produces rules), the
//! matcher (which evaluates them) and the analysis layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::RuleIndex;
use crate::pattern::CompiledPattern;

// =============================================================================
// Source Lists
// =============================================================================

/// The block-list a rule was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceList {
    EasyList,
    EasyPrivacy,
    FanboyAnnoyance,
}

impl SourceList {
    /// All lists, in evaluation order.
    pub const ALL: [SourceList; 3] = [
        SourceList::EasyList,
        SourceList::EasyPrivacy,
        SourceList::FanboyAnnoyance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::EasyList => "easylist",
            Self::EasyPrivacy => "easyprivacy",
            Self::FanboyAnnoyance => "fanboy-annoyance",
        }
    }
}

impl fmt::Display for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Rule Actions
// =============================================================================

/// Action to take for a matched rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RuleAction {
    /// Exception rule (@@...) - allows the request
    Allow = 0,
    /// Block rule - flags the request
    Block = 1,
}

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u16 {
        /// Pattern is a raw regex (/.../)
        const IS_REGEX = 1 << 1;
        /// Case-sensitive matching ($match-case)
        const MATCH_CASE = 1 << 2;
        /// $badfilter - disables the identical rule
        const BADFILTER = 1 << 3;
        /// Rule has right anchor (ends with |)
        const HAS_RIGHT_ANCHOR = 1 << 7;
        /// Rule has hostname anchor (||)
        const HAS_HOST_ANCHOR = 1 << 8;
        /// Rule has left anchor (starts with |)
        const HAS_LEFT_ANCHOR = 1 << 9;
    }
}

// =============================================================================
// Request Types (bit mask for type filtering)
// =============================================================================

bitflags::bitflags! {
    /// Request type bit mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u32 {
        const OTHER = 1 << 0;
        const SCRIPT = 1 << 1;
        const IMAGE = 1 << 2;
        const STYLESHEET = 1 << 3;
        const OBJECT = 1 << 4;
        const SUBDOCUMENT = 1 << 5;  // iframe/frame
        const MAIN_FRAME = 1 << 6;   // main document
        const XMLHTTPREQUEST = 1 << 7;
        const WEBSOCKET = 1 << 8;
        const FONT = 1 << 9;
        const MEDIA = 1 << 10;
        const PING = 1 << 11;
        const CSP_REPORT = 1 << 12;
        const BEACON = 1 << 13;
        const FETCH = 1 << 14;

        /// All request types
        const ALL = 0x7FFF;
    }
}

impl RequestType {
    /// Map a filter option name (`script`, `image`, ...) to its type bit.
    pub fn from_option_name(name: &str) -> Option<Self> {
        match name {
            "script" => Some(Self::SCRIPT),
            "image" => Some(Self::IMAGE),
            "stylesheet" => Some(Self::STYLESHEET),
            "object" => Some(Self::OBJECT),
            "subdocument" => Some(Self::SUBDOCUMENT),
            "document" | "main_frame" => Some(Self::MAIN_FRAME),
            "xmlhttprequest" | "xhr" => Some(Self::XMLHTTPREQUEST),
            "media" => Some(Self::MEDIA),
            "font" => Some(Self::FONT),
            "ping" => Some(Self::PING),
            "websocket" => Some(Self::WEBSOCKET),
            "beacon" => Some(Self::BEACON),
            "fetch" => Some(Self::FETCH),
            "csp_report" => Some(Self::CSP_REPORT),
            "other" => Some(Self::OTHER),
            _ => None,
        }
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Party (first-party / third-party) mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartyMask: u8 {
        /// Matches first-party requests
        const FIRST_PARTY = 1 << 0;
        /// Matches third-party requests
        const THIRD_PARTY = 1 << 1;
        /// Matches both
        const ALL = Self::FIRST_PARTY.bits() | Self::THIRD_PARTY.bits();
    }
}

impl PartyMask {
    pub fn from_option_name(name: &str) -> Option<Self> {
        match name {
            "third-party" | "thirdparty" | "3p" => Some(Self::THIRD_PARTY),
            "first-party" | "firstparty" | "1p" => Some(Self::FIRST_PARTY),
            _ => None,
        }
    }
}

// =============================================================================
// Filter Rules
// =============================================================================

/// `$domain=` restriction. Entries are lowercase domains matched by label suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DomainConstraint {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl DomainConstraint {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// A compiled network filter rule. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRule {
    pub action: RuleAction,
    pub flags: RuleFlags,
    /// Pattern text as written in the list, without `@@` and options.
    pub pattern: String,
    pub compiled: CompiledPattern,
    /// Empty mask means any request type.
    pub type_mask: RequestType,
    /// Empty mask means either party.
    pub party_mask: PartyMask,
    pub domain_constraints: Option<DomainConstraint>,
    pub source: SourceList,
    /// 1-based line number in the source list.
    pub line: usize,
}

impl FilterRule {
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.action == RuleAction::Allow
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exception() {
            f.write_str("@@")?;
        }
        write!(f, "{} ({}:{})", self.pattern, self.source, self.line)
    }
}

/// Ordered rules compiled from one filter list, with their host index.
#[derive(Debug, Clone)]
pub struct RuleSet {
    source: SourceList,
    rules: Vec<FilterRule>,
    index: RuleIndex,
}

impl RuleSet {
    pub fn new(source: SourceList, rules: Vec<FilterRule>) -> Self {
        let index = RuleIndex::build(&rules);
        Self {
            source,
            rules,
            index,
        }
    }

    pub fn empty(source: SourceList) -> Self {
        Self::new(source, Vec::new())
    }

    pub fn source(&self) -> SourceList {
        self.source
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn exception_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_exception()).count()
    }
}

// =============================================================================
// Resource Request
// =============================================================================

/// A concrete string to match plus the context it was observed in.
///
/// `None` context fields are "unknown" and satisfy any rule restriction on
/// that dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest<'a> {
    /// URL, file name or bare domain
    pub url: &'a str,
    /// Top-level domain of the page the resource was observed on
    pub page_domain: Option<&'a str>,
    pub is_third_party: Option<bool>,
    pub request_type: Option<RequestType>,
}

impl<'a> ResourceRequest<'a> {
    /// A request with fully unknown context.
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            page_domain: None,
            is_third_party: None,
            request_type: None,
        }
    }

    pub fn with_page_domain(mut self, domain: &'a str) -> Self {
        self.page_domain = Some(domain);
        self
    }

    pub fn with_third_party(mut self, third_party: bool) -> Self {
        self.is_third_party = Some(third_party);
        self
    }

    /// `true` marks the request as a script; `false` as a known non-script.
    pub fn with_script(mut self, script: bool) -> Self {
        self.request_type = Some(if script {
            RequestType::SCRIPT
        } else {
            RequestType::OTHER
        });
        self
    }

    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = Some(request_type);
        self
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// Final decision for a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// No block rule matched, or an exception matched
    Allow,
    /// A block rule matched and no exception did
    Block,
}

/// Result of matching a request against one rule set.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult<'r> {
    pub decision: MatchDecision,
    /// Rule that determined the decision, if any rule matched
    pub rule: Option<&'r FilterRule>,
}

impl MatchResult<'_> {
    pub fn is_block(&self) -> bool {
        self.decision == MatchDecision::Block
    }
}

impl Default for MatchResult<'_> {
    fn default() -> Self {
        Self {
            decision: MatchDecision::Allow,
            rule: None,
        }
    }
}
