//! Website evidence records
//!
//! One `inspection.json` per website, as written by the evidence collector,
//! lives at `<evidence_dir>/<website>/inspection.json`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gdc_core::url::looks_like_domain;

use crate::error::{AnalysisError, Diagnostic};

pub const INSPECTION_FILE: &str = "inspection.json";

// =============================================================================
// Collector format
// =============================================================================

/// Raw inspection record. Unknown fields are ignored.
///
/// A section that is absent means the inspection did not finish; see
/// [`WebsiteEvidence::from_inspection`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectionRecord {
    pub cookies: Option<Vec<RawCookie>>,
    pub beacons: Option<Vec<Beacon>>,
    pub hosts: Option<InspectionHosts>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCookie {
    pub name: String,
    pub domain: String,
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub expires_days: Option<f64>,
    #[serde(default)]
    pub log: Option<CookieLog>,
}

fn session_expiry() -> f64 {
    -1.0
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CookieLog {
    #[serde(default)]
    pub stack: Vec<StackFrame>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectionHosts {
    pub cookies: Option<PartyHosts>,
    pub beacons: Option<PartyHosts>,
}

// =============================================================================
// Evidence model
// =============================================================================

/// First-party and third-party hosts observed for one resource kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyHosts {
    #[serde(default)]
    pub first_party: Vec<String>,
    #[serde(default)]
    pub third_party: Vec<String>,
}

impl PartyHosts {
    pub fn is_empty(&self) -> bool {
        self.first_party.is_empty() && self.third_party.is_empty()
    }

    /// `Some(true)` if listed as third-party, `Some(false)` if first-party.
    pub fn party_of(&self, host: &str) -> Option<bool> {
        let host = host.trim_start_matches('.');
        let listed = |list: &[String]| {
            list.iter()
                .any(|h| h.trim_start_matches('.').eq_ignore_ascii_case(host))
        };
        if listed(&self.third_party) {
            Some(true)
        } else if listed(&self.first_party) {
            Some(false)
        } else {
            None
        }
    }
}

/// A cookie observed on a website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub domain: String,
    pub expires: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_days: Option<f64>,
    /// Distinct script files that set the cookie, in first-seen order.
    #[serde(default)]
    pub files: Vec<String>,
}

impl From<RawCookie> for Cookie {
    fn from(raw: RawCookie) -> Self {
        let mut files: Vec<String> = Vec::new();
        if let Some(log) = raw.log {
            for frame in log.stack {
                if let Some(name) = frame.file_name {
                    if !files.contains(&name) {
                        files.push(name);
                    }
                }
            }
        }

        // session cookies carry no meaningful day count
        let expires_days = if raw.expires != -1.0 { raw.expires_days } else { None };

        Self {
            name: raw.name,
            domain: raw.domain,
            expires: raw.expires,
            expires_days,
            files,
        }
    }
}

/// A web beacon observed on a website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beacon {
    pub list_name: String,
    pub url: String,
}

/// Everything collected for one successfully inspected website.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteEvidence {
    pub website: String,
    pub cookies: Vec<Cookie>,
    pub beacons: Vec<Beacon>,
    pub cookie_hosts: PartyHosts,
    pub beacon_hosts: PartyHosts,
}

impl WebsiteEvidence {
    pub fn new(website: impl Into<String>) -> Self {
        Self {
            website: website.into(),
            cookies: Vec::new(),
            beacons: Vec::new(),
            cookie_hosts: PartyHosts::default(),
            beacon_hosts: PartyHosts::default(),
        }
    }

    /// Evidence from a finished inspection.
    ///
    /// Fails with `MissingEvidence` naming the first absent section.
    pub fn from_inspection(
        website: impl Into<String>,
        record: InspectionRecord,
    ) -> Result<Self, AnalysisError> {
        let website = website.into();
        let missing = |section: &str| AnalysisError::missing(website.as_str(), section);

        let cookies = record.cookies.ok_or_else(|| missing("cookies"))?;
        let beacons = record.beacons.ok_or_else(|| missing("beacons"))?;
        let hosts = record.hosts.ok_or_else(|| missing("hosts"))?;
        let cookie_hosts = hosts.cookies.ok_or_else(|| missing("hosts.cookies"))?;
        let beacon_hosts = hosts.beacons.ok_or_else(|| missing("hosts.beacons"))?;

        Ok(Self {
            website,
            cookies: cookies.into_iter().map(Cookie::from).collect(),
            beacons,
            cookie_hosts,
            beacon_hosts,
        })
    }

    /// The website id as a page domain, when it is one.
    pub fn page_domain(&self) -> Option<&str> {
        let domain = self.website.trim().trim_end_matches('/');
        if looks_like_domain(domain) {
            Some(domain)
        } else {
            None
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Websites loaded from an evidence directory, in website-name order.
#[derive(Debug, Clone, Default)]
pub struct EvidenceCorpus {
    pub websites: Vec<WebsiteEvidence>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_inspection(json: &str) -> Result<InspectionRecord, serde_json::Error> {
    serde_json::from_str(json)
}

/// Load one `inspection.json`.
pub fn load_inspection(path: &Path) -> Result<InspectionRecord, AnalysisError> {
    let content = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_inspection(&content).map_err(|source| AnalysisError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every website directory under `dir`.
///
/// A directory without a readable, complete inspection is excluded and
/// reported as a diagnostic; only failing to list `dir` itself is an error.
pub fn load_evidence_dir(dir: &Path) -> Result<EvidenceCorpus, AnalysisError> {
    let entries = fs::read_dir(dir).map_err(|source| AnalysisError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut site_dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| AnalysisError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            site_dirs.push(path);
        }
    }
    site_dirs.sort();

    let mut corpus = EvidenceCorpus::default();
    for site_dir in site_dirs {
        let website = match site_dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        let inspection_path = site_dir.join(INSPECTION_FILE);
        if !inspection_path.is_file() {
            let err = AnalysisError::missing(&website, INSPECTION_FILE);
            log::warn!("{}", err);
            corpus.diagnostics.push(Diagnostic::from_error(&website, &err));
            continue;
        }

        let evidence = load_inspection(&inspection_path)
            .and_then(|record| WebsiteEvidence::from_inspection(website.as_str(), record));
        match evidence {
            Ok(evidence) => corpus.websites.push(evidence),
            Err(err) => {
                log::warn!("excluding {}: {}", website, err);
                corpus.diagnostics.push(Diagnostic::from_error(&website, &err));
            }
        }
    }

    log::info!(
        "loaded evidence for {} website(s), {} excluded",
        corpus.websites.len(),
        corpus.diagnostics.len()
    );
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSPECTION: &str = r#"{
        "uri_ins": "https://news.example/",
        "cookies": [
            {
                "name": "_ga",
                "domain": ".news.example",
                "expires": 1700000000.5,
                "expiresDays": 730,
                "log": {"stack": [
                    {"fileName": "https://www.googletagmanager.com/gtag/js", "lineNumber": 1},
                    {"fileName": "https://www.googletagmanager.com/gtag/js"},
                    {"lineNumber": 3}
                ]}
            },
            {"name": "sid", "domain": "news.example", "expires": -1, "expiresDays": 0}
        ],
        "beacons": [
            {"listName": "easyprivacy.txt", "url": "https://www.facebook.com/tr?id=1", "occurrances": 2}
        ],
        "hosts": {
            "cookies": {"firstParty": ["news.example"], "thirdParty": []},
            "beacons": {"firstParty": [], "thirdParty": ["www.facebook.com"]}
        }
    }"#;

    #[test]
    fn parses_collector_output() {
        let record = parse_inspection(INSPECTION).unwrap();
        let evidence = WebsiteEvidence::from_inspection("news.example", record).unwrap();

        assert_eq!(evidence.cookies.len(), 2);
        let ga = &evidence.cookies[0];
        assert_eq!(ga.files, vec!["https://www.googletagmanager.com/gtag/js".to_string()]);
        assert_eq!(ga.expires_days, Some(730.0));

        let sid = &evidence.cookies[1];
        assert_eq!(sid.expires_days, None);
        assert!(sid.files.is_empty());

        assert_eq!(evidence.beacons[0].list_name, "easyprivacy.txt");
        assert_eq!(evidence.beacon_hosts.third_party, vec!["www.facebook.com".to_string()]);
        assert_eq!(evidence.page_domain(), Some("news.example"));
    }

    #[test]
    fn unfinished_inspection_is_missing_evidence() {
        for (json, section) in [
            ("{}", "cookies"),
            (r#"{"cookies": []}"#, "beacons"),
            (r#"{"cookies": [], "beacons": []}"#, "hosts"),
            (r#"{"cookies": [], "beacons": [], "hosts": {}}"#, "hosts.cookies"),
            (
                r#"{"cookies": [], "beacons": [], "hosts": {"cookies": {}}}"#,
                "hosts.beacons",
            ),
        ] {
            let record = parse_inspection(json).unwrap();
            match WebsiteEvidence::from_inspection("x.example", record) {
                Err(AnalysisError::MissingEvidence { website, missing }) => {
                    assert_eq!(website, "x.example");
                    assert_eq!(missing, section);
                }
                other => panic!("expected missing {} for {}, got {:?}", section, json, other),
            }
        }
    }

    #[test]
    fn empty_sections_are_valid_evidence() {
        let json = r#"{"cookies": [], "beacons": [], "hosts": {"cookies": {}, "beacons": {}}}"#;
        let evidence = WebsiteEvidence::from_inspection("x.example", parse_inspection(json).unwrap()).unwrap();
        assert!(evidence.cookies.is_empty());
        assert!(evidence.beacons.is_empty());
        assert!(evidence.cookie_hosts.is_empty());
    }

    #[test]
    fn unfinished_inspections_are_excluded_from_corpus() {
        let mut root = std::env::temp_dir();
        root.push("gdc_evidence_unfinished");
        let _ = fs::remove_dir_all(&root);
        for (website, json) in [
            ("empty.example", "{}"),
            ("half.example", r#"{"cookies": []}"#),
            (
                "done.example",
                r#"{"cookies": [], "beacons": [], "hosts": {"cookies": {}, "beacons": {}}}"#,
            ),
        ] {
            let dir = root.join(website);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(INSPECTION_FILE), json).unwrap();
        }

        let corpus = load_evidence_dir(&root).unwrap();
        let loaded: Vec<&str> = corpus.websites.iter().map(|w| w.website.as_str()).collect();
        assert_eq!(loaded, vec!["done.example"]);
        let excluded: Vec<&str> = corpus.diagnostics.iter().map(|d| d.website.as_str()).collect();
        assert_eq!(excluded, vec!["empty.example", "half.example"]);
    }

    #[test]
    fn party_of_uses_host_lists() {
        let hosts = PartyHosts {
            first_party: vec!["news.example".to_string()],
            third_party: vec!["ads.tracker.net".to_string()],
        };
        assert_eq!(hosts.party_of(".news.example"), Some(false));
        assert_eq!(hosts.party_of("ads.tracker.net"), Some(true));
        assert_eq!(hosts.party_of("cdn.other.org"), None);
    }

    #[test]
    fn page_domain_requires_domain_shape() {
        assert_eq!(WebsiteEvidence::new("shop.example.es").page_domain(), Some("shop.example.es"));
        assert_eq!(WebsiteEvidence::new("site_1").page_domain(), None);
    }
}
