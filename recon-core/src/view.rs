use std::{fmt, str::FromStr};

use recon_model::{JobDetail, Subdomain, UnknownVariant};

/// Subdomain table filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubdomainFilter {
    #[default]
    All,
    Live,
    Dead,
}

impl SubdomainFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubdomainFilter::All => "all",
            SubdomainFilter::Live => "live",
            SubdomainFilter::Dead => "dead",
        }
    }

    pub fn matches(&self, sub: &Subdomain) -> bool {
        match self {
            SubdomainFilter::All => true,
            SubdomainFilter::Live => sub.is_live,
            SubdomainFilter::Dead => !sub.is_live,
        }
    }
}

impl fmt::Display for SubdomainFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubdomainFilter {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(SubdomainFilter::All),
            "live" => Ok(SubdomainFilter::Live),
            "dead" => Ok(SubdomainFilter::Dead),
            _ => Err(UnknownVariant::new("subdomain filter", raw)),
        }
    }
}

/// Subdomains matching the filter whose hostname contains `search`,
/// case-insensitively. Order is preserved.
pub fn filter_subdomains<'a>(
    detail: &'a JobDetail,
    filter: SubdomainFilter,
    search: &str,
) -> Vec<&'a Subdomain> {
    let needle = search.trim().to_lowercase();
    detail
        .subdomains
        .iter()
        .filter(|sub| filter.matches(sub))
        .filter(|sub| {
            needle.is_empty() || sub.hostname.to_lowercase().contains(&needle)
        })
        .collect()
}
