//! Evidence Aggregator
//!
//! Turns per-website classifications into corpus statistics: per-website
//! counts, mean and standard deviation, rankings, and the usage breakdown.

use serde::{Deserialize, Serialize};

use crate::classifier::WebsiteClassification;
use crate::error::AnalysisError;
use crate::stats::{count_occurrences, mean, sample_std_dev, top_n, RankedEntry};

/// Counts for one website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteCounts {
    pub website: String,
    pub cookies: usize,
    pub tracking_cookies: usize,
    pub beacons: usize,
    pub tracking_beacons: usize,
    pub first_party_cookie_hosts: usize,
    pub third_party_cookie_hosts: usize,
    pub first_party_beacon_hosts: usize,
    pub third_party_beacon_hosts: usize,
    pub has_tracking: bool,
}

impl WebsiteCounts {
    pub fn tracking_resources(&self) -> usize {
        self.tracking_cookies + self.tracking_beacons
    }

    /// Cookies were observed, either directly or through the host lists.
    pub fn uses_cookies(&self) -> bool {
        self.cookies > 0 || self.first_party_cookie_hosts > 0 || self.third_party_cookie_hosts > 0
    }
}

impl From<&WebsiteClassification> for WebsiteCounts {
    fn from(c: &WebsiteClassification) -> Self {
        Self {
            website: c.website.clone(),
            cookies: c.cookies.len(),
            tracking_cookies: c.tracking_cookie_count(),
            beacons: c.beacons.len(),
            tracking_beacons: c.tracking_beacon_count(),
            first_party_cookie_hosts: c.cookie_hosts.first_party.len(),
            third_party_cookie_hosts: c.cookie_hosts.third_party.len(),
            first_party_beacon_hosts: c.beacon_hosts.first_party.len(),
            third_party_beacon_hosts: c.beacon_hosts.third_party.len(),
            has_tracking: c.has_tracking(),
        }
    }
}

/// Distribution of one per-website count.
///
/// `mean` and `std_dev` are `None` when undefined for the corpus; the
/// rankings are always filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSummary {
    pub total: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    /// Largest website, if any website has a non-zero count
    pub max_website: Option<RankedEntry>,
    pub top_websites: Vec<RankedEntry>,
}

impl CountSummary {
    /// Summarize `entries`, returning any `DegenerateInput` for the mean or
    /// standard deviation next to the summary.
    pub fn from_counts(entries: &[RankedEntry], top: usize) -> (Self, Vec<AnalysisError>) {
        let values: Vec<f64> = entries.iter().map(|e| e.count as f64).collect();
        let mut errors = Vec::new();
        let mean = mean(&values).map_err(|e| errors.push(e)).ok();
        // an empty sample already failed the mean
        let std_dev = if values.is_empty() {
            None
        } else {
            sample_std_dev(&values).map_err(|e| errors.push(e)).ok()
        };

        let top_websites = top_n(entries, top);
        let max_website = top_websites.first().filter(|e| e.count > 0).cloned();

        let summary = Self {
            total: entries.iter().map(|e| e.count).sum(),
            mean,
            std_dev,
            max_website,
            top_websites,
        };
        (summary, errors)
    }
}

/// How many websites use cookies, and of which kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBreakdown {
    pub websites: usize,
    pub with_tracking_cookies: usize,
    pub with_third_party_cookies: usize,
    pub with_cookies: usize,
    pub without_cookies: usize,
}

impl UsageBreakdown {
    pub fn from_counts(counts: &[WebsiteCounts]) -> Self {
        let mut usage = Self {
            websites: counts.len(),
            ..Self::default()
        };
        for c in counts {
            if c.tracking_cookies > 0 {
                usage.with_tracking_cookies += 1;
            }
            if c.third_party_cookie_hosts > 0 {
                usage.with_third_party_cookies += 1;
            }
            if c.uses_cookies() {
                usage.with_cookies += 1;
            } else {
                usage.without_cookies += 1;
            }
        }
        usage
    }

    /// Share of websites in percent; `None` for an empty corpus.
    pub fn percent(&self, count: usize) -> Option<f64> {
        if self.websites == 0 {
            None
        } else {
            Some(count as f64 * 100.0 / self.websites as f64)
        }
    }
}

/// Corpus-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusSummary {
    pub websites: usize,
    pub usage: UsageBreakdown,
    pub per_website: Vec<WebsiteCounts>,
    pub tracking_cookies: CountSummary,
    pub beacons: CountSummary,
    pub tracking_resources: CountSummary,
    pub top_cookie_domains: Vec<RankedEntry>,
    pub top_beacon_domains: Vec<RankedEntry>,
    /// Statistics that are undefined for this corpus, one message each
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degenerate: Vec<String>,
}

/// Aggregate classified websites, in input order.
///
/// An undefined mean or standard deviation only blanks that statistic and is
/// recorded in `degenerate`; counts and rankings are still produced.
pub fn summarize(classifications: &[WebsiteClassification], top: usize) -> CorpusSummary {
    let per_website: Vec<WebsiteCounts> = classifications.iter().map(WebsiteCounts::from).collect();
    let mut degenerate = Vec::new();

    let mut count_summary = |metric: &str, entries: Vec<RankedEntry>| {
        let (summary, errors) = CountSummary::from_counts(&entries, top);
        for err in errors {
            log::warn!("{}: {}", metric, err);
            degenerate.push(format!("{}: {}", metric, err));
        }
        summary
    };
    let tracking_cookies =
        count_summary("tracking cookies", ranked(&per_website, |c| c.tracking_cookies));
    let beacons = count_summary("beacons", ranked(&per_website, |c| c.beacons));
    let tracking_resources = count_summary(
        "tracking resources",
        ranked(&per_website, WebsiteCounts::tracking_resources),
    );

    let cookie_domains = count_occurrences(
        classifications
            .iter()
            .flat_map(|c| c.cookie_hosts.third_party.iter()),
    );
    let beacon_domains = count_occurrences(
        classifications
            .iter()
            .flat_map(|c| c.beacon_hosts.third_party.iter()),
    );

    let summary = CorpusSummary {
        websites: per_website.len(),
        usage: UsageBreakdown::from_counts(&per_website),
        per_website,
        tracking_cookies,
        beacons,
        tracking_resources,
        top_cookie_domains: top_n(&cookie_domains, top),
        top_beacon_domains: top_n(&beacon_domains, top),
        degenerate,
    };

    log::info!(
        "{} websites, {} tracking cookies, {} beacons",
        summary.websites,
        summary.tracking_cookies.total,
        summary.beacons.total
    );
    summary
}

fn ranked<F>(counts: &[WebsiteCounts], count: F) -> Vec<RankedEntry>
where
    F: Fn(&WebsiteCounts) -> usize,
{
    counts
        .iter()
        .map(|c| RankedEntry::new(c.website.clone(), count(c)))
        .collect()
}
