//! Core Matching Engine
//!
//! Evaluates compiled rule sets against resource requests. Verdicts are pure:
//! for a fixed rule set and request the result never depends on rule order.

use crate::index::host_keys;
use crate::psl::domain_within;
use crate::types::{
    DomainConstraint, FilterRule, MatchDecision, MatchResult, PartyMask, ResourceRequest,
    RuleAction, RuleSet,
};

// =============================================================================
// Matcher
// =============================================================================

/// Read-only view over one rule set.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    rule_set: &'a RuleSet,
}

impl<'a> Matcher<'a> {
    pub fn new(rule_set: &'a RuleSet) -> Self {
        Self { rule_set }
    }

    pub fn rule_set(&self) -> &'a RuleSet {
        self.rule_set
    }

    /// Whether the rule set blocks the request.
    pub fn should_block(&self, req: &ResourceRequest<'_>) -> bool {
        self.match_request(req).is_block()
    }

    /// Match a request and return the decision with the deciding rule.
    ///
    /// Any matching exception beats any matching block rule.
    pub fn match_request(&self, req: &ResourceRequest<'_>) -> MatchResult<'a> {
        let keys = host_keys(req.url);

        let Some(block) = self.first_match(RuleAction::Block, &keys, req) else {
            return MatchResult::default();
        };

        if let Some(allow) = self.first_match(RuleAction::Allow, &keys, req) {
            log::trace!("{} overridden by {} for {}", block, allow, req.url);
            return MatchResult {
                decision: MatchDecision::Allow,
                rule: Some(allow),
            };
        }

        MatchResult {
            decision: MatchDecision::Block,
            rule: Some(block),
        }
    }

    /// First exception rule matching the request, if any.
    pub fn find_exception(&self, req: &ResourceRequest<'_>) -> Option<&'a FilterRule> {
        self.first_match(RuleAction::Allow, &host_keys(req.url), req)
    }

    /// First block rule matching the request, ignoring exceptions.
    pub fn find_block(&self, req: &ResourceRequest<'_>) -> Option<&'a FilterRule> {
        self.first_match(RuleAction::Block, &host_keys(req.url), req)
    }

    /// Earliest matching rule with `action`, in list order.
    ///
    /// Indexed candidates are looked up by host key; the scanned rules only
    /// need checking up to the best indexed hit.
    fn first_match(
        &self,
        action: RuleAction,
        keys: &[String],
        req: &ResourceRequest<'_>,
    ) -> Option<&'a FilterRule> {
        let rules = self.rule_set.rules();
        let index = self.rule_set.index();

        let mut best: Option<u32> = None;
        for key in keys {
            for &id in index.candidates(action, key) {
                if best.map_or(true, |b| id < b) && matches(&rules[id as usize], req) {
                    best = Some(id);
                }
            }
        }

        for &id in index.scanned(action) {
            if best.is_some_and(|b| id > b) {
                break;
            }
            if matches(&rules[id as usize], req) {
                best = Some(id);
                break;
            }
        }

        best.map(|id| &rules[id as usize])
    }
}

/// Whether the rule set blocks the request.
pub fn should_block(rule_set: &RuleSet, req: &ResourceRequest<'_>) -> bool {
    Matcher::new(rule_set).should_block(req)
}

/// Whether a single rule matches: pattern plus every restriction.
pub fn matches(rule: &FilterRule, req: &ResourceRequest<'_>) -> bool {
    check_rule_options(rule, req)
        && check_domain_constraints(rule.domain_constraints.as_ref(), req)
        && rule.compiled.is_match(req.url)
}

/// Check type and party masks. Unknown context satisfies either.
fn check_rule_options(rule: &FilterRule, req: &ResourceRequest<'_>) -> bool {
    if !rule.type_mask.is_empty() {
        if let Some(request_type) = req.request_type {
            if !rule.type_mask.intersects(request_type) {
                return false;
            }
        }
    }

    if !rule.party_mask.is_empty() {
        if let Some(is_third_party) = req.is_third_party {
            let request_party = if is_third_party {
                PartyMask::THIRD_PARTY
            } else {
                PartyMask::FIRST_PARTY
            };
            if !rule.party_mask.intersects(request_party) {
                return false;
            }
        }
    }

    true
}

/// Check `$domain=` against the page domain. Unknown page domain satisfies it.
fn check_domain_constraints(constraints: Option<&DomainConstraint>, req: &ResourceRequest<'_>) -> bool {
    let Some(constraints) = constraints else {
        return true;
    };
    let Some(page) = req.page_domain else {
        return true;
    };

    if !constraints.include.is_empty()
        && !constraints.include.iter().any(|d| domain_within(page, d))
    {
        return false;
    }

    !constraints.exclude.iter().any(|d| domain_within(page, d))
}
