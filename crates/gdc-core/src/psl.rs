//! Registrable domains and domain suffixes
//!
//! A built-in suffix table stands in for the public suffix list. Besides the
//! usual two-label suffixes it carries the Spanish second-level zones, so
//! `sede.gob.es` and `www.uv.edu.es`-style hosts resolve to their own sites.
//!
//! # Examples
//!
//! ```
//! use gdc_core::psl::get_etld1;
//!
//! assert_eq!(get_etld1("sub.example.com"), "example.com");
//! assert_eq!(get_etld1("sub.example.co.uk"), "example.co.uk");
//! assert_eq!(get_etld1("www.sede.gob.es"), "sede.gob.es");
//! ```

/// Public suffixes made of two labels.
const TWO_LABEL_SUFFIXES: &[&str] = &[
    // .es second level
    "com.es", "nom.es", "org.es", "gob.es", "edu.es",
    "co.uk", "org.uk", "gov.uk", "ac.uk",
    "co.jp", "ne.jp", "or.jp", "ac.jp",
    "co.nz", "net.nz", "co.za", "co.in", "co.kr",
    "com.au", "net.au", "org.au", "gov.au",
    "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "com.ar", "com.tr", "com.pl",
];

/// A single label, or a listed two-label suffix.
pub fn is_public_suffix(suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    !suffix.contains('.')
        || TWO_LABEL_SUFFIXES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(suffix))
}

/// Registrable domain (eTLD+1), lowercased. A host that is itself a public
/// suffix is returned as is.
pub fn get_etld1(host: &str) -> String {
    let host = host.trim_matches('.').to_ascii_lowercase();
    let mut registrable = host.as_str();
    for suffix in walk_host_suffixes(&host) {
        if is_public_suffix(suffix) {
            break;
        }
        registrable = suffix;
    }
    registrable.to_string()
}

pub fn is_same_site(a: &str, b: &str) -> bool {
    get_etld1(a) == get_etld1(b)
}

/// `req_host` belongs to a different site than `site_host`.
pub fn is_third_party(site_host: &str, req_host: &str) -> bool {
    !is_same_site(site_host, req_host)
}

/// Drop the leftmost label.
pub fn get_parent_domain(host: &str) -> Option<&str> {
    host.split_once('.')
        .map(|(_, parent)| parent)
        .filter(|parent| !parent.is_empty())
}

/// The host and each parent domain, most specific first.
pub fn walk_host_suffixes(host: &str) -> impl Iterator<Item = &str> + '_ {
    let host = host.trim_matches('.');
    let first = if host.is_empty() { None } else { Some(host) };
    std::iter::successors(first, |h| get_parent_domain(*h))
}

/// `$domain=` entry match by label suffix: `ads.example.com` is within
/// `example.com`, `notexample.com` is not. An entity entry `name.*` matches
/// `name` under any public suffix.
pub fn domain_within(host: &str, domain: &str) -> bool {
    match domain.strip_suffix(".*") {
        Some(name) => walk_host_suffixes(host).any(|suffix| is_entity(suffix, name)),
        None => walk_host_suffixes(host).any(|suffix| suffix.eq_ignore_ascii_case(domain)),
    }
}

/// `host` is `name.<public suffix>`.
fn is_entity(host: &str, name: &str) -> bool {
    let Some(head) = host.get(..name.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(name)
        && host[name.len()..]
            .strip_prefix('.')
            .is_some_and(is_public_suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etld1_generic_and_two_label() {
        assert_eq!(get_etld1("example.com"), "example.com");
        assert_eq!(get_etld1("a.b.example.com"), "example.com");
        assert_eq!(get_etld1("example.co.uk"), "example.co.uk");
        assert_eq!(get_etld1("co.uk"), "co.uk");
        assert_eq!(get_etld1("com"), "com");
    }

    #[test]
    fn test_etld1_spanish_zones() {
        assert_eq!(get_etld1("www.sede.gob.es"), "sede.gob.es");
        assert_eq!(get_etld1("campus.uv.edu.es"), "uv.edu.es");
        assert_eq!(get_etld1("tienda.com.es"), "tienda.com.es");
        assert_eq!(get_etld1("www.elpais.es"), "elpais.es");
    }

    #[test]
    fn test_public_sector_sites_are_distinct() {
        assert!(is_third_party("www.hacienda.gob.es", "sede.seg-social.gob.es"));
        assert!(!is_third_party("www.hacienda.gob.es", "sede.hacienda.gob.es"));
    }

    #[test]
    fn test_get_etld1_strips_dots_and_case() {
        assert_eq!(get_etld1(".Tracker.Example.COM"), "example.com");
    }

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn test_walk_host_suffixes() {
        let suffixes: Vec<&str> = walk_host_suffixes(".a.b.example.com").collect();
        assert_eq!(suffixes, vec!["a.b.example.com", "b.example.com", "example.com", "com"]);
        assert_eq!(walk_host_suffixes("").count(), 0);
    }

    #[test]
    fn test_domain_within_is_label_based() {
        assert!(domain_within("ads.example.com", "example.com"));
        assert!(domain_within("example.com", "example.com"));
        assert!(!domain_within("notexample.com", "example.com"));
        assert!(!domain_within("example.com", "ads.example.com"));
    }

    #[test]
    fn test_entity_domains() {
        assert!(domain_within("google.com", "google.*"));
        assert!(domain_within("www.google.es", "google.*"));
        assert!(domain_within("www.google.co.uk", "google.*"));
        assert!(!domain_within("notgoogle.com", "google.*"));
        assert!(!domain_within("google.evil.com", "google.*"));
        assert!(!domain_within("google", "google.*"));
    }

    #[test]
    fn test_is_third_party() {
        assert!(!is_third_party("www.news.com", "cdn.news.com"));
        assert!(is_third_party("news.com", "tracker.net"));
    }
}
