use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gdc_core::pattern::{CompiledPattern, PatternOp};
use gdc_core::types::{FilterRule, PartyMask, RequestType, ResourceRequest, RuleAction, RuleFlags, RuleSet, SourceList};
use gdc_core::Matcher;

fn host_rule(domain: &str, line: usize) -> FilterRule {
    let ops = [
        PatternOp::HostAnchor,
        PatternOp::Literal(domain.to_string()),
        PatternOp::Separator,
    ];
    FilterRule {
        action: RuleAction::Block,
        flags: RuleFlags::HAS_HOST_ANCHOR,
        pattern: format!("||{}^", domain),
        compiled: CompiledPattern::from_ops(&ops, false).expect("pattern compiles"),
        type_mask: RequestType::empty(),
        party_mask: PartyMask::THIRD_PARTY,
        domain_constraints: None,
        source: SourceList::EasyPrivacy,
        line,
    }
}

fn bench_should_block(c: &mut Criterion) {
    let rules = (0..50_000)
        .map(|i| host_rule(&format!("tracker{}.example", i), i + 1))
        .collect();
    let set = RuleSet::new(SourceList::EasyPrivacy, rules);
    let matcher = Matcher::new(&set);

    let hit = ResourceRequest::new("https://tracker49999.example/pixel.gif").with_third_party(true);
    let miss = ResourceRequest::new("https://cdn.news.example/app.js").with_third_party(true);

    c.bench_function("should_block_hit", |b| b.iter(|| matcher.should_block(black_box(&hit))));
    c.bench_function("should_block_miss", |b| b.iter(|| matcher.should_block(black_box(&miss))));
}

criterion_group!(benches, bench_should_block);
criterion_main!(benches);
