//! Tracking classifier
//!
//! A resource is tracking if any of the three block-lists blocks any of the
//! request strings associated with it. Only resources cleared by every list on
//! every observed origin are considered innocent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gdc_compiler::{compile_list, ParseError};
use gdc_core::psl::is_third_party;
use gdc_core::types::{FilterRule, MatchDecision, ResourceRequest, RuleSet, SourceList};
use gdc_core::url::request_host;
use gdc_core::Matcher;

use crate::error::AnalysisError;
use crate::evidence::{Beacon, Cookie, PartyHosts, WebsiteEvidence};

// =============================================================================
// Rule catalogue
// =============================================================================

/// The three block-lists of a run. Built once, then only read.
#[derive(Debug, Clone)]
pub struct RuleCatalogue {
    sets: Vec<RuleSet>,
}

/// Paths of the three filter lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPaths {
    pub easylist: PathBuf,
    pub easyprivacy: PathBuf,
    pub fanboy_annoyance: PathBuf,
}

impl ListPaths {
    pub fn iter(&self) -> impl Iterator<Item = (SourceList, &Path)> {
        [
            (SourceList::EasyList, self.easylist.as_path()),
            (SourceList::EasyPrivacy, self.easyprivacy.as_path()),
            (SourceList::FanboyAnnoyance, self.fanboy_annoyance.as_path()),
        ]
        .into_iter()
    }
}

impl Default for ListPaths {
    fn default() -> Self {
        Self {
            easylist: PathBuf::from("assets/easylist.txt"),
            easyprivacy: PathBuf::from("assets/easyprivacy.txt"),
            fanboy_annoyance: PathBuf::from("assets/fanboy-annoyance.txt"),
        }
    }
}

impl RuleCatalogue {
    pub fn new(easylist: RuleSet, easyprivacy: RuleSet, fanboy_annoyance: RuleSet) -> Self {
        Self {
            sets: vec![easylist, easyprivacy, fanboy_annoyance],
        }
    }

    /// Compile the three lists from their text, in `SourceList::ALL` order.
    pub fn from_texts(easylist: &str, easyprivacy: &str, fanboy_annoyance: &str) -> (Self, Vec<ParseError>) {
        let mut errors = Vec::new();
        let mut sets = Vec::with_capacity(3);
        for (source, text) in SourceList::ALL
            .into_iter()
            .zip([easylist, easyprivacy, fanboy_annoyance])
        {
            let compiled = compile_list(text, source);
            errors.extend(compiled.errors);
            sets.push(compiled.rule_set);
        }
        (Self { sets }, errors)
    }

    /// Read and compile the three lists.
    pub fn load(paths: &ListPaths) -> Result<(Self, Vec<ParseError>), AnalysisError> {
        let mut texts = Vec::with_capacity(3);
        for (_, path) in paths.iter() {
            let text = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            texts.push(text);
        }
        Ok(Self::from_texts(&texts[0], &texts[1], &texts[2]))
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.sets
    }

    pub fn get(&self, source: SourceList) -> Option<&RuleSet> {
        self.sets.iter().find(|s| s.source() == source)
    }

    pub fn rule_count(&self) -> usize {
        self.sets.iter().map(RuleSet::len).sum()
    }
}

// =============================================================================
// Options
// =============================================================================

/// How request context is derived for matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextMode {
    /// Party and type from the evidence; unknown where the evidence is silent.
    #[default]
    Derived,
    /// Every request is treated as a third-party script.
    AssumeThirdPartyScript,
}

/// Which exceptions may clear a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExceptionScope {
    /// Exceptions only override blocks of their own list.
    #[default]
    PerList,
    /// An exception in any list overrides a block in any list.
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierOptions {
    pub context: ContextMode,
    pub exception_scope: ExceptionScope,
}

// =============================================================================
// Resources
// =============================================================================

/// Something observed on a page that maps to request strings to match.
pub trait Resource {
    fn requests<'e>(&'e self, site: &'e WebsiteEvidence, mode: ContextMode) -> Vec<ResourceRequest<'e>>;
}

impl Resource for Cookie {
    /// The cookie domain plus every distinct file that set it.
    fn requests<'e>(&'e self, site: &'e WebsiteEvidence, mode: ContextMode) -> Vec<ResourceRequest<'e>> {
        let page = site.page_domain();
        let mut out = Vec::with_capacity(1 + self.files.len());

        let domain = self.domain.trim().trim_start_matches('.');
        let mut req = base_request(domain, page);
        match mode {
            ContextMode::AssumeThirdPartyScript => req = req.with_third_party(true).with_script(true),
            ContextMode::Derived => {
                req.is_third_party = site
                    .cookie_hosts
                    .party_of(domain)
                    .or_else(|| derive_party(domain, page));
            }
        }
        out.push(req);

        for file in &self.files {
            let mut req = base_request(file, page).with_script(true);
            match mode {
                ContextMode::AssumeThirdPartyScript => req = req.with_third_party(true),
                ContextMode::Derived => req.is_third_party = derive_party(file, page),
            }
            out.push(req);
        }

        out
    }
}

impl Resource for Beacon {
    fn requests<'e>(&'e self, site: &'e WebsiteEvidence, mode: ContextMode) -> Vec<ResourceRequest<'e>> {
        let page = site.page_domain();
        let mut req = base_request(&self.url, page);
        match mode {
            ContextMode::AssumeThirdPartyScript => req = req.with_third_party(true).with_script(true),
            ContextMode::Derived => {
                req.is_third_party = request_host(&self.url).and_then(|host| {
                    site.beacon_hosts
                        .party_of(host)
                        .or_else(|| derive_party(host, page))
                });
            }
        }
        vec![req]
    }
}

fn base_request<'e>(url: &'e str, page: Option<&'e str>) -> ResourceRequest<'e> {
    let req = ResourceRequest::new(url);
    match page {
        Some(page) => req.with_page_domain(page),
        None => req,
    }
}

fn derive_party(request: &str, page: Option<&str>) -> Option<bool> {
    let host = request_host(request)?;
    Some(is_third_party(page?, host))
}

// =============================================================================
// Classified resources
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCookie {
    #[serde(flatten)]
    pub cookie: Cookie,
    pub tracking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedBeacon {
    #[serde(flatten)]
    pub beacon: Beacon,
    /// Absent in beacon results written by older collectors
    #[serde(default)]
    pub tracking: bool,
}

/// Classification of everything observed on one website.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteClassification {
    pub website: String,
    pub cookies: Vec<ClassifiedCookie>,
    pub beacons: Vec<ClassifiedBeacon>,
    pub cookie_hosts: PartyHosts,
    pub beacon_hosts: PartyHosts,
}

impl WebsiteClassification {
    pub fn tracking_cookie_count(&self) -> usize {
        self.cookies.iter().filter(|c| c.tracking).count()
    }

    pub fn tracking_beacon_count(&self) -> usize {
        self.beacons.iter().filter(|b| b.tracking).count()
    }

    pub fn has_tracking_cookies(&self) -> bool {
        self.cookies.iter().any(|c| c.tracking)
    }

    /// Any classified cookie or beacon is tracking.
    pub fn has_tracking(&self) -> bool {
        self.has_tracking_cookies() || self.beacons.iter().any(|b| b.tracking)
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// Verdict for one request string, with the rule that decided it.
#[derive(Debug, Clone, Copy)]
pub struct Verdict<'r> {
    pub tracking: bool,
    pub rule: Option<&'r FilterRule>,
}

#[derive(Debug, Clone, Copy)]
pub struct Classifier<'c> {
    catalogue: &'c RuleCatalogue,
    options: ClassifierOptions,
}

impl<'c> Classifier<'c> {
    pub fn new(catalogue: &'c RuleCatalogue, options: ClassifierOptions) -> Self {
        Self { catalogue, options }
    }

    pub fn options(&self) -> ClassifierOptions {
        self.options
    }

    /// Evaluate one request against all lists.
    pub fn check(&self, req: &ResourceRequest<'_>) -> Verdict<'c> {
        match self.options.exception_scope {
            ExceptionScope::PerList => {
                let mut allowed_by = None;
                for set in self.catalogue.rule_sets() {
                    let result = Matcher::new(set).match_request(req);
                    match result.decision {
                        MatchDecision::Block => {
                            return Verdict {
                                tracking: true,
                                rule: result.rule,
                            }
                        }
                        MatchDecision::Allow => allowed_by = allowed_by.or(result.rule),
                    }
                }
                Verdict {
                    tracking: false,
                    rule: allowed_by,
                }
            }
            ExceptionScope::Global => {
                let matchers: Vec<Matcher<'c>> =
                    self.catalogue.rule_sets().iter().map(Matcher::new).collect();
                let Some(block) = matchers.iter().find_map(|m| m.find_block(req)) else {
                    return Verdict {
                        tracking: false,
                        rule: None,
                    };
                };
                match matchers.iter().find_map(|m| m.find_exception(req)) {
                    Some(allow) => Verdict {
                        tracking: false,
                        rule: Some(allow),
                    },
                    None => Verdict {
                        tracking: true,
                        rule: Some(block),
                    },
                }
            }
        }
    }

    pub fn is_tracking_request(&self, req: &ResourceRequest<'_>) -> bool {
        self.check(req).tracking
    }

    /// OR over every request string of the resource.
    pub fn is_tracking<R: Resource>(&self, resource: &R, site: &WebsiteEvidence) -> bool {
        resource
            .requests(site, self.options.context)
            .iter()
            .any(|req| self.is_tracking_request(req))
    }

    pub fn classify_cookie(&self, cookie: &Cookie, site: &WebsiteEvidence) -> ClassifiedCookie {
        ClassifiedCookie {
            cookie: cookie.clone(),
            tracking: self.is_tracking(cookie, site),
        }
    }

    pub fn classify_beacon(&self, beacon: &Beacon, site: &WebsiteEvidence) -> ClassifiedBeacon {
        ClassifiedBeacon {
            beacon: beacon.clone(),
            tracking: self.is_tracking(beacon, site),
        }
    }

    pub fn classify_website(&self, site: &WebsiteEvidence) -> WebsiteClassification {
        let cookies = site
            .cookies
            .iter()
            .map(|c| self.classify_cookie(c, site))
            .collect();
        let beacons = site
            .beacons
            .iter()
            .map(|b| self.classify_beacon(b, site))
            .collect();

        let result = WebsiteClassification {
            website: site.website.clone(),
            cookies,
            beacons,
            cookie_hosts: site.cookie_hosts.clone(),
            beacon_hosts: site.beacon_hosts.clone(),
        };
        log::debug!(
            "{}: {}/{} tracking cookies, {}/{} tracking beacons",
            result.website,
            result.tracking_cookie_count(),
            result.cookies.len(),
            result.tracking_beacon_count(),
            result.beacons.len()
        );
        result
    }

    /// Sequential classification, preserving input order.
    pub fn classify_corpus(&self, sites: &[WebsiteEvidence]) -> Vec<WebsiteClassification> {
        sites.iter().map(|s| self.classify_website(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue(easylist: &str, easyprivacy: &str, fanboy: &str) -> RuleCatalogue {
        RuleCatalogue::from_texts(easylist, easyprivacy, fanboy).0
    }

    fn cookie(domain: &str, files: &[&str]) -> Cookie {
        Cookie {
            name: "c".to_string(),
            domain: domain.to_string(),
            expires: -1.0,
            expires_days: None,
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn scenario_cookie_domain_and_exception() {
        let site = WebsiteEvidence::new("news.example");
        let c = cookie("sub.track.example", &[]);

        let cat = catalogue("", "||track.example^", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        assert!(classifier.is_tracking(&c, &site));

        let cat = catalogue("", "||track.example^\n@@||sub.track.example^", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        assert!(!classifier.is_tracking(&c, &site));
    }

    #[test]
    fn any_list_any_origin() {
        let site = WebsiteEvidence::new("news.example");
        let cat = catalogue("", "", "/gtag/js");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());

        let clean = cookie("news.example", &["https://news.example/app.js"]);
        assert!(!classifier.is_tracking(&clean, &site));

        let tagged = cookie(
            "news.example",
            &["https://news.example/app.js", "https://www.googletagmanager.com/gtag/js"],
        );
        assert!(classifier.is_tracking(&tagged, &site));
    }

    #[test]
    fn adding_origins_is_monotonic() {
        let site = WebsiteEvidence::new("news.example");
        let cat = catalogue("||ads.example^", "||metrics.example^", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());

        let mut c = cookie("ads.example", &[]);
        assert!(classifier.is_tracking(&c, &site));
        for extra in ["https://cdn.news.example/a.js", "https://metrics.example/m.js", "x"] {
            c.files.push(extra.to_string());
            assert!(classifier.is_tracking(&c, &site));
        }
    }

    #[test]
    fn derived_party_context() {
        let cat = catalogue("||cdn.example^$third-party", "", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        let c = cookie(".cdn.example", &[]);

        let mut first = WebsiteEvidence::new("cdn.example");
        first.cookie_hosts = PartyHosts {
            first_party: vec!["cdn.example".to_string()],
            third_party: Vec::new(),
        };
        assert!(!classifier.is_tracking(&c, &first));

        let third = WebsiteEvidence::new("news.example");
        assert!(classifier.is_tracking(&c, &third));

        // unknown page and no host lists
        let unknown = WebsiteEvidence::new("site_42");
        assert!(classifier.is_tracking(&c, &unknown));

        let assume = Classifier::new(
            &cat,
            ClassifierOptions {
                context: ContextMode::AssumeThirdPartyScript,
                ..ClassifierOptions::default()
            },
        );
        assert!(assume.is_tracking(&c, &first));
    }

    #[test]
    fn beacon_context_from_host_lists() {
        let cat = catalogue("", "||pixel.example^$third-party", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        let beacon = Beacon {
            list_name: "easyprivacy.txt".to_string(),
            url: "https://pixel.example/p.gif?id=3".to_string(),
        };

        let mut site = WebsiteEvidence::new("pixel.example");
        assert!(!classifier.is_tracking(&beacon, &site));
        site.beacon_hosts.third_party.push("pixel.example".to_string());
        assert!(classifier.is_tracking(&beacon, &site));
    }

    #[test]
    fn script_restriction_applies_to_origin_files_only() {
        let cat = catalogue("/tag.js$script", "", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        let site = WebsiteEvidence::new("news.example");

        assert!(classifier.is_tracking(&cookie("news.example", &["https://t.example/tag.js"]), &site));
        let beacon = Beacon {
            list_name: "l".to_string(),
            url: "https://t.example/tag.js".to_string(),
        };
        // unknown type satisfies the restriction
        assert!(classifier.is_tracking(&beacon, &site));
    }

    #[test]
    fn exception_scope() {
        let cat = catalogue("||track.example^", "@@||track.example^", "");
        let req = ResourceRequest::new("track.example");

        let per_list = Classifier::new(&cat, ClassifierOptions::default());
        let verdict = per_list.check(&req);
        assert!(verdict.tracking);
        assert_eq!(verdict.rule.unwrap().source, SourceList::EasyList);

        let global = Classifier::new(
            &cat,
            ClassifierOptions {
                exception_scope: ExceptionScope::Global,
                ..ClassifierOptions::default()
            },
        );
        let verdict = global.check(&req);
        assert!(!verdict.tracking);
        assert!(verdict.rule.unwrap().is_exception());
    }

    #[test]
    fn classify_website_counts() {
        let cat = catalogue("||ads.example^", "", "");
        let classifier = Classifier::new(&cat, ClassifierOptions::default());
        let mut site = WebsiteEvidence::new("news.example");
        site.cookies = vec![cookie("ads.example", &[]), cookie("news.example", &[])];
        site.beacons = vec![Beacon {
            list_name: "l".to_string(),
            url: "https://ads.example/b.gif".to_string(),
        }];

        let result = classifier.classify_website(&site);
        assert_eq!(result.tracking_cookie_count(), 1);
        assert_eq!(result.tracking_beacon_count(), 1);
        assert!(result.has_tracking());
        assert!(result.cookies[0].tracking);
        assert!(!result.cookies[1].tracking);
    }
}
