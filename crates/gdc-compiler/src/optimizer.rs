use std::collections::HashSet;

use gdc_core::types::{FilterRule, RuleFlags};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Apply `$badfilter` and drop exact duplicates, keeping first occurrences.
pub fn optimize_rules(rules: &mut Vec<FilterRule>) -> OptimizeStats {
    let before = rules.len();
    let mut badfilter_keys: HashSet<RuleKey> = HashSet::new();
    let mut badfilter_rules = 0usize;

    for rule in rules.iter() {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            badfilter_rules += 1;
            badfilter_keys.insert(RuleKey::from(rule));
        }
    }

    let mut badfiltered_rules = 0usize;
    rules.retain(|rule| {
        if rule.flags.contains(RuleFlags::BADFILTER) {
            return false;
        }
        if !badfilter_keys.is_empty() && badfilter_keys.contains(&RuleKey::from(rule)) {
            badfiltered_rules += 1;
            return false;
        }
        true
    });

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::from(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let after = rules.len();
    if badfiltered_rules > 0 || deduped > 0 {
        log::debug!(
            "optimized {} -> {} rules (dedupe {}, badfilter {})",
            before,
            after,
            deduped,
            badfiltered_rules
        );
    }

    OptimizeStats {
        before,
        after,
        deduped,
        badfilter_rules,
        badfiltered_rules,
    }
}

/// Identity of a rule, ignoring its `$badfilter` flag and list position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    action: u8,
    flags: u16,
    type_mask: u32,
    party_mask: u8,
    pattern: String,
    constraint_include: Vec<String>,
    constraint_exclude: Vec<String>,
}

impl From<&FilterRule> for RuleKey {
    fn from(rule: &FilterRule) -> Self {
        let (mut include, mut exclude) = match &rule.domain_constraints {
            Some(dc) => (dc.include.clone(), dc.exclude.clone()),
            None => (Vec::new(), Vec::new()),
        };
        include.sort();
        exclude.sort();

        Self {
            action: rule.action as u8,
            flags: (rule.flags - RuleFlags::BADFILTER).bits(),
            type_mask: rule.type_mask.bits(),
            party_mask: rule.party_mask.bits(),
            pattern: rule.pattern.clone(),
            constraint_include: include,
            constraint_exclude: exclude,
        }
    }
}
