use std::net::IpAddr;

use gdc_core::pattern::{CompiledPattern, PatternOp};
use gdc_core::types::{
    DomainConstraint, FilterRule, PartyMask, RequestType, RuleAction, RuleFlags, RuleSet,
    SourceList,
};

/// Why a single filter line could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("empty pattern")]
    EmptyPattern,
    #[error("'|' anchor inside pattern body")]
    MisplacedAnchor,
    #[error("empty domain= option")]
    EmptyDomainOption,
    #[error("invalid domain '{0}' in domain= option")]
    InvalidDomain(String),
    #[error("options exclude every request")]
    ContradictoryOptions,
    #[error("pattern does not compile: {0}")]
    Pattern(String),
}

/// A filter line that was skipped because it could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_list} line {line}: {kind} (`{text}`)")]
pub struct ParseError {
    pub source_list: SourceList,
    pub line: usize,
    pub text: String,
    pub kind: ParseErrorKind,
}

/// Output of compiling one filter list.
#[derive(Debug, Clone)]
pub struct ParsedList {
    pub source: SourceList,
    pub rules: Vec<FilterRule>,
    pub errors: Vec<ParseError>,
    /// Lines ignored on purpose: blanks, comments, cosmetic rules.
    pub ignored: usize,
    pub lines: usize,
}

impl ParsedList {
    pub fn into_rule_set(self) -> RuleSet {
        RuleSet::new(self.source, self.rules)
    }
}

/// Compile every line of a filter list. Bad lines are recorded and skipped.
pub fn parse_filter_list(text: &str, source: SourceList) -> ParsedList {
    let mut rules = Vec::new();
    let mut errors = Vec::new();
    let mut ignored = 0usize;
    let mut lines = 0usize;

    for (idx, raw_line) in text.lines().enumerate() {
        lines += 1;
        let line_no = idx + 1;
        match parse_rule_line(raw_line, source, line_no) {
            Ok(Some(rule)) => rules.push(rule),
            Ok(None) => ignored += 1,
            Err(kind) => {
                let err = ParseError {
                    source_list: source,
                    line: line_no,
                    text: raw_line.trim().to_string(),
                    kind,
                };
                log::debug!("skipping rule: {}", err);
                errors.push(err);
            }
        }
    }

    if !errors.is_empty() {
        log::warn!("{}: {} line(s) could not be compiled", source, errors.len());
    }

    ParsedList {
        source,
        rules,
        errors,
        ignored,
        lines,
    }
}

/// Compile one line. `Ok(None)` means the line carries no network rule.
pub fn parse_rule_line(
    raw_line: &str,
    source: SourceList,
    line_no: usize,
) -> Result<Option<FilterRule>, ParseErrorKind> {
    let mut line = raw_line.trim();
    if line.is_empty() || is_comment_line(line) || is_cosmetic_line(line) {
        return Ok(None);
    }

    let mut action = RuleAction::Block;
    if let Some(rest) = line.strip_prefix("@@") {
        action = RuleAction::Allow;
        line = rest.trim_start();
    }

    if let Some(domain) = parse_hosts_file_domain(line) {
        return build_rule(
            action,
            format!("||{}^", domain),
            host_ops(&domain),
            RuleFlags::HAS_HOST_ANCHOR,
            ParsedOptions::default(),
            source,
            line_no,
        )
        .map(Some);
    }

    let (pattern_part, options_text) = split_rule_options(line);
    let options = match options_text {
        Some(options_text) => parse_options(options_text)?,
        None => ParsedOptions::default(),
    };

    let pattern_str = pattern_part.trim();

    if let Some(regex_src) = raw_regex_body(pattern_str) {
        let match_case = options.flags.contains(RuleFlags::MATCH_CASE);
        let compiled = CompiledPattern::from_regex(regex_src, match_case)
            .map_err(|e| ParseErrorKind::Pattern(e.to_string()))?;
        return Ok(Some(FilterRule {
            action,
            flags: options.flags | RuleFlags::IS_REGEX,
            pattern: pattern_str.to_string(),
            compiled,
            type_mask: options.type_mask,
            party_mask: options.party_mask,
            domain_constraints: options.domain_constraints,
            source,
            line: line_no,
        }));
    }

    let (ops, anchor_flags) = parse_pattern(pattern_str)?;
    build_rule(
        action,
        pattern_str.to_string(),
        ops,
        anchor_flags,
        options,
        source,
        line_no,
    )
    .map(Some)
}

fn build_rule(
    action: RuleAction,
    pattern: String,
    ops: Vec<PatternOp>,
    anchor_flags: RuleFlags,
    options: ParsedOptions,
    source: SourceList,
    line_no: usize,
) -> Result<FilterRule, ParseErrorKind> {
    let match_case = options.flags.contains(RuleFlags::MATCH_CASE);
    let compiled = CompiledPattern::from_ops(&ops, match_case)
        .map_err(|e| ParseErrorKind::Pattern(e.to_string()))?;

    Ok(FilterRule {
        action,
        flags: options.flags | anchor_flags,
        pattern,
        compiled,
        type_mask: options.type_mask,
        party_mask: options.party_mask,
        domain_constraints: options.domain_constraints,
        source,
        line: line_no,
    })
}

// =============================================================================
// Options
// =============================================================================

#[derive(Clone)]
struct ParsedOptions {
    flags: RuleFlags,
    type_mask: RequestType,
    party_mask: PartyMask,
    domain_constraints: Option<DomainConstraint>,
}

impl Default for ParsedOptions {
    fn default() -> Self {
        Self {
            flags: RuleFlags::empty(),
            type_mask: RequestType::empty(),
            party_mask: PartyMask::empty(),
            domain_constraints: None,
        }
    }
}

/// Split at the last `$` whose tail looks like an option list.
fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.rfind('$') {
        Some(pos) if looks_like_options(&line[pos + 1..]) => (&line[..pos], Some(&line[pos + 1..])),
        _ => (line, None),
    }
}

fn looks_like_options(text: &str) -> bool {
    text.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '~')
        && text.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(b, b'~' | b'=' | b',' | b'|' | b'.' | b'_' | b'-' | b'*' | b'/' | b':')
        })
}

fn parse_options(text: &str) -> Result<ParsedOptions, ParseErrorKind> {
    let mut flags = RuleFlags::empty();
    let mut type_include = 0u32;
    let mut type_exclude = 0u32;
    let mut party_include = 0u8;
    let mut party_exclude = 0u8;
    let mut domain_constraints: Option<DomainConstraint> = None;
    let mut in_domain_list = false;

    for raw in text.trim().split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let raw_lower = raw.to_ascii_lowercase();
        let raw_lower = raw_lower.as_str();

        if let Some(domain_value) = raw_lower.strip_prefix("domain=") {
            let parsed = parse_domain_option(domain_value)?;
            domain_constraints = Some(merge_constraints(domain_constraints, parsed));
            in_domain_list = true;
            continue;
        }

        let (negated, name) = match raw_lower.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw_lower),
        };

        if name == "match-case" || name == "match_case" {
            flags |= RuleFlags::MATCH_CASE;
            in_domain_list = false;
            continue;
        }

        if name == "badfilter" {
            flags |= RuleFlags::BADFILTER;
            in_domain_list = false;
            continue;
        }

        if let Some(mask) = RequestType::from_option_name(name) {
            if negated {
                type_exclude |= mask.bits();
            } else {
                type_include |= mask.bits();
            }
            in_domain_list = false;
            continue;
        }

        if let Some(mask) = PartyMask::from_option_name(name) {
            if negated {
                party_exclude |= mask.bits();
            } else {
                party_include |= mask.bits();
            }
            in_domain_list = false;
            continue;
        }

        // `domain=a.com,b.com` continuation
        if in_domain_list && normalize_domain(name).map_or(false, |d| d.contains('.')) {
            let parsed = parse_domain_option(raw_lower)?;
            domain_constraints = Some(merge_constraints(domain_constraints, parsed));
            continue;
        }

        in_domain_list = false;
        log::trace!("ignoring unsupported option '{}'", raw_lower);
    }

    let type_bits = finalize_mask_u32(type_include, type_exclude, RequestType::ALL.bits())
        .ok_or(ParseErrorKind::ContradictoryOptions)?;
    let party_bits = finalize_mask_u8(party_include, party_exclude, PartyMask::ALL.bits())
        .ok_or(ParseErrorKind::ContradictoryOptions)?;

    Ok(ParsedOptions {
        flags,
        type_mask: RequestType::from_bits_truncate(type_bits),
        party_mask: PartyMask::from_bits_truncate(party_bits),
        domain_constraints,
    })
}

fn merge_constraints(existing: Option<DomainConstraint>, incoming: DomainConstraint) -> DomainConstraint {
    match existing {
        Some(mut current) => {
            current.include.extend(incoming.include);
            current.exclude.extend(incoming.exclude);
            current
        }
        None => incoming,
    }
}

fn parse_domain_option(value: &str) -> Result<DomainConstraint, ParseErrorKind> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let (is_exclude, domain_raw) = match raw.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let domain = normalize_domain_entry(domain_raw)
            .ok_or_else(|| ParseErrorKind::InvalidDomain(domain_raw.to_string()))?;

        if is_exclude {
            exclude.push(domain);
        } else {
            include.push(domain);
        }
    }

    if include.is_empty() && exclude.is_empty() {
        return Err(ParseErrorKind::EmptyDomainOption);
    }

    Ok(DomainConstraint { include, exclude })
}

/// `None` when the options rule out every value; 0 means unrestricted.
fn finalize_mask_u32(include: u32, exclude: u32, all: u32) -> Option<u32> {
    let include = include & all;
    let exclude = exclude & all;
    let mut mask = if include != 0 { include & !exclude } else { all & !exclude };
    if mask == 0 {
        return None;
    }
    if mask == all {
        mask = 0;
    }
    Some(mask)
}

fn finalize_mask_u8(include: u8, exclude: u8, all: u8) -> Option<u8> {
    let include = include & all;
    let exclude = exclude & all;
    let mut mask = if include != 0 { include & !exclude } else { all & !exclude };
    if mask == 0 {
        return None;
    }
    if mask == all {
        mask = 0;
    }
    Some(mask)
}

// =============================================================================
// Line classification
// =============================================================================

fn is_comment_line(line: &str) -> bool {
    line.starts_with('!') || line.starts_with('[') || line.starts_with('#')
}

fn is_cosmetic_line(line: &str) -> bool {
    ["##", "#@#", "#?#", "#@?#", "#$#", "#@$#", "#%#", "#@%#"]
        .iter()
        .any(|marker| line.contains(marker))
}

fn parse_hosts_file_domain(line: &str) -> Option<String> {
    let mut parts = line.split_whitespace();
    let first = parts.next()?;
    let second = parts.next()?;

    if first.parse::<IpAddr>().is_ok() {
        return normalize_domain(second);
    }

    None
}

fn normalize_domain(host: &str) -> Option<String> {
    let trimmed = host.trim().trim_matches('.');
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return None;
    }

    Some(trimmed.to_ascii_lowercase())
}

/// `$domain=` entry: a domain, or an entity `name.*` matching `name` under
/// any public suffix.
fn normalize_domain_entry(entry: &str) -> Option<String> {
    match entry.trim().strip_suffix(".*") {
        Some(name) => normalize_domain(name).map(|name| format!("{}.*", name)),
        None => normalize_domain(entry),
    }
}

// =============================================================================
// Patterns
// =============================================================================

fn raw_regex_body(pattern: &str) -> Option<&str> {
    if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        Some(&pattern[1..pattern.len() - 1])
    } else {
        None
    }
}

fn host_ops(domain: &str) -> Vec<PatternOp> {
    vec![
        PatternOp::HostAnchor,
        PatternOp::Literal(domain.to_string()),
        PatternOp::Separator,
    ]
}

/// Lower pattern text to ops plus the anchor flags it carries.
fn parse_pattern(pattern: &str) -> Result<(Vec<PatternOp>, RuleFlags), ParseErrorKind> {
    let mut flags = RuleFlags::empty();
    let mut ops = Vec::new();

    let mut rest = if let Some(rest) = pattern.strip_prefix("||") {
        flags |= RuleFlags::HAS_HOST_ANCHOR;
        ops.push(PatternOp::HostAnchor);
        rest
    } else if let Some(rest) = pattern.strip_prefix('|') {
        flags |= RuleFlags::HAS_LEFT_ANCHOR;
        ops.push(PatternOp::AssertStart);
        rest
    } else {
        pattern
    };

    let right_anchor = rest.ends_with('|');
    if right_anchor {
        flags |= RuleFlags::HAS_RIGHT_ANCHOR;
        rest = &rest[..rest.len() - 1];
    }

    if rest.is_empty() {
        return Err(ParseErrorKind::EmptyPattern);
    }
    if rest.contains('|') {
        return Err(ParseErrorKind::MisplacedAnchor);
    }

    let mut literal = String::new();
    for ch in rest.chars() {
        match ch {
            '*' => {
                flush_literal(&mut literal, &mut ops);
                if ops.last() != Some(&PatternOp::Wildcard) {
                    ops.push(PatternOp::Wildcard);
                }
            }
            '^' => {
                flush_literal(&mut literal, &mut ops);
                ops.push(PatternOp::Separator);
            }
            _ => literal.push(ch),
        }
    }
    flush_literal(&mut literal, &mut ops);

    if right_anchor {
        ops.push(PatternOp::AssertEnd);
    }

    Ok((ops, flags))
}

fn flush_literal(literal: &mut String, ops: &mut Vec<PatternOp>) {
    if !literal.is_empty() {
        ops.push(PatternOp::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdc_core::types::ResourceRequest;
    use gdc_core::{matches, should_block};

    fn rule(line: &str) -> FilterRule {
        parse_rule_line(line, SourceList::EasyList, 1)
            .expect("line should parse")
            .expect("line should produce a rule")
    }

    #[test]
    fn skips_comments_blanks_and_cosmetics() {
        let text = "[Adblock Plus 2.0]\n! Title: EasyList\n\n##.ad-banner\nexample.com#@#.sponsor\nsite.com#?#div:has(> a)\n||ads.example^";
        let parsed = parse_filter_list(text, SourceList::EasyList);
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.ignored, 6);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rules[0].line, 7);
    }

    #[test]
    fn parses_exception_prefix() {
        let r = rule("@@||cdn.example^$script");
        assert!(r.is_exception());
        assert_eq!(r.pattern, "||cdn.example^");
        assert_eq!(r.type_mask, RequestType::SCRIPT);
    }

    #[test]
    fn host_anchor_rule_matches_domains() {
        let r = rule("||track.example^");
        assert!(r.flags.contains(RuleFlags::HAS_HOST_ANCHOR));
        assert!(matches(&r, &ResourceRequest::new("sub.track.example")));
        assert!(matches(&r, &ResourceRequest::new("https://track.example/p.gif")));
        assert!(!matches(&r, &ResourceRequest::new("nottrack.example")));
    }

    #[test]
    fn plain_and_anchored_patterns() {
        let plain = rule("/analytics.js");
        assert!(matches(&plain, &ResourceRequest::new("https://cdn.example.com/analytics.js?v=2")));

        let left = rule("|https://ads.");
        assert!(matches(&left, &ResourceRequest::new("https://ads.example.com/")));
        assert!(!matches(&left, &ResourceRequest::new("http://x.com/?u=https://ads.x")));

        let both = rule("|https://x.com/pixel.gif|");
        assert!(both.flags.contains(RuleFlags::HAS_LEFT_ANCHOR | RuleFlags::HAS_RIGHT_ANCHOR));
        assert!(matches(&both, &ResourceRequest::new("https://x.com/pixel.gif")));
        assert!(!matches(&both, &ResourceRequest::new("https://x.com/pixel.gif?a")));

        let wild = rule("/ads/*/banner^");
        assert!(matches(&wild, &ResourceRequest::new("https://x.com/ads/top/banner?x")));
        assert!(!matches(&wild, &ResourceRequest::new("https://x.com/ads/top/banners")));
    }

    #[test]
    fn raw_regex_rules() {
        let r = rule(r"/^https?://[a-z]+\.tracker\.net//");
        assert!(r.flags.contains(RuleFlags::IS_REGEX));
        assert!(matches(&r, &ResourceRequest::new("https://abc.tracker.net/x")));
        assert!(!matches(&r, &ResourceRequest::new("https://abc.tracker.org/x")));
    }

    #[test]
    fn parses_options() {
        let r = rule("||ads.example^$third-party,script,domain=news.com|~sport.news.com");
        assert_eq!(r.party_mask, PartyMask::THIRD_PARTY);
        assert_eq!(r.type_mask, RequestType::SCRIPT);
        let dc = r.domain_constraints.as_ref().unwrap();
        assert_eq!(dc.include, vec!["news.com".to_string()]);
        assert_eq!(dc.exclude, vec!["sport.news.com".to_string()]);
    }

    #[test]
    fn comma_separated_domain_continuation() {
        let r = rule("||ads.example^$domain=a.com,~b.a.com,script");
        let dc = r.domain_constraints.as_ref().unwrap();
        assert_eq!(dc.include, vec!["a.com".to_string()]);
        assert_eq!(dc.exclude, vec!["b.a.com".to_string()]);
        assert_eq!(r.type_mask, RequestType::SCRIPT);
    }

    #[test]
    fn entity_domains_in_domain_option() {
        let r = rule("||ads.example^$domain=Google.*|news.com|~maps.google.*");
        let dc = r.domain_constraints.as_ref().unwrap();
        assert_eq!(dc.include, vec!["google.*".to_string(), "news.com".to_string()]);
        assert_eq!(dc.exclude, vec!["maps.google.*".to_string()]);

        let req = ResourceRequest::new("https://ads.example/x.js");
        assert!(matches(&r, &req.with_page_domain("www.google.es")));
        assert!(matches(&r, &req.with_page_domain("google.co.uk")));
        assert!(!matches(&r, &req.with_page_domain("maps.google.es")));
        assert!(!matches(&r, &req.with_page_domain("google.evil.com")));
    }

    #[test]
    fn negated_options() {
        let r = rule("||ads.example^$~third-party,~script");
        assert_eq!(r.party_mask, PartyMask::FIRST_PARTY);
        assert!(!r.type_mask.contains(RequestType::SCRIPT));
        assert!(r.type_mask.contains(RequestType::IMAGE));
    }

    #[test]
    fn unknown_options_are_ignored() {
        let r = rule("||ads.example^$popup,rewrite=abp-resource:blank-js,important");
        assert!(r.type_mask.is_empty());
        assert!(r.party_mask.is_empty());
        assert!(r.domain_constraints.is_none());
    }

    #[test]
    fn match_case_option() {
        let r = rule("/Banner/$match-case");
        assert!(matches(&r, &ResourceRequest::new("https://x.com/Banner/1")));
        assert!(!matches(&r, &ResourceRequest::new("https://x.com/banner/1")));
        let ci = rule("/Banner/");
        assert!(matches(&ci, &ResourceRequest::new("https://x.com/banner/1")));
    }

    #[test]
    fn dollar_inside_pattern_is_not_options() {
        let r = rule("/ad.php?price=$");
        assert!(r.domain_constraints.is_none());
        assert!(matches(&r, &ResourceRequest::new("https://x.com/ad.php?price=$")));
    }

    #[test]
    fn hosts_file_lines() {
        let r = rule("0.0.0.0 tracker.example");
        assert_eq!(r.pattern, "||tracker.example^");
        assert!(matches(&r, &ResourceRequest::new("cdn.tracker.example")));
    }

    #[test]
    fn bad_lines_are_skipped_not_fatal() {
        let text = "||\n|a|b|\n||x.com^$domain=\n||x.com^$third-party,~third-party\n/re(/\n||good.example^";
        let parsed = parse_filter_list(text, SourceList::FanboyAnnoyance);
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.errors.len(), 5);
        assert_eq!(parsed.errors[0].kind, ParseErrorKind::EmptyPattern);
        assert_eq!(parsed.errors[1].kind, ParseErrorKind::MisplacedAnchor);
        assert_eq!(parsed.errors[2].kind, ParseErrorKind::EmptyDomainOption);
        assert_eq!(parsed.errors[3].kind, ParseErrorKind::ContradictoryOptions);
        assert!(matches!(parsed.errors[4].kind, ParseErrorKind::Pattern(_)));
        assert_eq!(parsed.errors[0].line, 1);
        assert_eq!(parsed.rules[0].source, SourceList::FanboyAnnoyance);
    }

    #[test]
    fn scenario_exception_overrides_block() {
        let set = parse_filter_list("||track.example^", SourceList::EasyPrivacy).into_rule_set();
        let req = ResourceRequest::new("sub.track.example");
        assert!(should_block(&set, &req));

        let set = parse_filter_list("||track.example^\n@@||sub.track.example^", SourceList::EasyPrivacy)
            .into_rule_set();
        assert!(!should_block(&set, &req));
    }
}
