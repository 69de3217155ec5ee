//! Pattern compilation
//!
//! Filter patterns are lowered to a short op sequence by the compiler and then
//! rendered into one anchored regular expression per rule. Special tokens map
//! to regex constructs; everything else is escaped.

use regex::{Regex, RegexBuilder};

/// Prefix matched by `||`: optional scheme, optional `//`, optional subdomains.
/// Bare domains (cookie domains) have neither scheme nor `//`.
const HOST_ANCHOR_RE: &str = r"^(?:[a-z][a-z0-9+.\-]*:(?://)?)?(?:[^/?#]*\.)?";

/// `^`: one char that is not a letter, digit or `_ - . %`, or end of input.
const SEPARATOR_RE: &str = r"(?:[^a-zA-Z0-9_\-.%]|$)";

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Pattern op sequence produced by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternOp {
    /// Literal text
    Literal(String),
    /// `*`
    Wildcard,
    /// `^`
    Separator,
    /// Leading `|`
    AssertStart,
    /// Trailing `|`
    AssertEnd,
    /// Leading `||`
    HostAnchor,
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
}

/// A rule pattern ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    match_case: bool,
}

impl CompiledPattern {
    /// Compile a pattern op sequence.
    pub fn from_ops(ops: &[PatternOp], match_case: bool) -> Result<Self, PatternError> {
        Self::from_regex(&ops_to_regex(ops), match_case)
    }

    /// Compile a raw regular expression (`/.../` rules).
    pub fn from_regex(source: &str, match_case: bool) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(!match_case)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()?;
        Ok(Self { regex, match_case })
    }

    #[inline]
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn match_case(&self) -> bool {
        self.match_case
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.match_case == other.match_case && self.as_str() == other.as_str()
    }
}

/// Render an op sequence as regex source.
pub fn ops_to_regex(ops: &[PatternOp]) -> String {
    let mut out = String::with_capacity(ops.len() * 8);
    for op in ops {
        match op {
            PatternOp::Literal(text) => out.push_str(&regex::escape(text)),
            PatternOp::Wildcard => out.push_str(".*"),
            PatternOp::Separator => out.push_str(SEPARATOR_RE),
            PatternOp::AssertStart => out.push('^'),
            PatternOp::AssertEnd => out.push('$'),
            PatternOp::HostAnchor => out.push_str(HOST_ANCHOR_RE),
        }
    }
    out
}
