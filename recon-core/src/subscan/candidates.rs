use std::collections::{BTreeSet, HashSet};

use recon_model::{JobDetail, Subdomain};

use crate::error::{NoEligibleReason, ValidationError};

/// A live, non-WAF-protected host offered for a selective scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub subdomain_id: i64,
    pub http_status: Option<u16>,
}

fn normalize_origin(url: &str) -> &str {
    url.trim().trim_end_matches('/')
}

/// Origins with a positive WAF fingerprint.
pub fn waf_protected(detail: &JobDetail) -> HashSet<&str> {
    detail
        .waf_detections
        .iter()
        .filter(|waf| waf.has_waf)
        .map(|waf| normalize_origin(&waf.url))
        .collect()
}

fn is_protected(sub: &Subdomain, protected: &HashSet<&str>) -> bool {
    protected.contains(sub.https_url().as_str())
        || protected.contains(sub.http_url().as_str())
}

/// Live subdomains whose `https://` and `http://` origins are both free of
/// WAF detections, as `https://` URLs in subdomain order.
pub fn derive_candidates(
    detail: &JobDetail,
) -> Result<Vec<Candidate>, ValidationError> {
    let live: Vec<&Subdomain> = detail.live_subdomains().collect();
    if live.is_empty() {
        return Err(ValidationError::NoEligibleUrls {
            reason: NoEligibleReason::NoLiveHosts,
        });
    }

    let protected = waf_protected(detail);
    let candidates: Vec<Candidate> = live
        .into_iter()
        .filter(|sub| !is_protected(sub, &protected))
        .map(|sub| Candidate {
            url: sub.https_url(),
            subdomain_id: sub.id,
            http_status: sub.http_status,
        })
        .collect();

    if candidates.is_empty() {
        return Err(ValidationError::NoEligibleUrls {
            reason: NoEligibleReason::AllBehindWaf,
        });
    }
    Ok(candidates)
}

/// Operator's pick among the candidates. Holds indices into the candidate
/// list, so it can never name a URL outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet {
    candidates: Vec<Candidate>,
    selected: BTreeSet<usize>,
}

impl SelectionSet {
    /// Nothing is selected initially.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            selected: BTreeSet::new(),
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn position(&self, url: &str) -> Result<usize, ValidationError> {
        self.candidates
            .iter()
            .position(|candidate| candidate.url == url)
            .ok_or_else(|| ValidationError::NotACandidate(url.to_string()))
    }

    pub fn select(&mut self, url: &str) -> Result<(), ValidationError> {
        let idx = self.position(url)?;
        self.selected.insert(idx);
        Ok(())
    }

    pub fn deselect(&mut self, url: &str) -> Result<(), ValidationError> {
        let idx = self.position(url)?;
        self.selected.remove(&idx);
        Ok(())
    }

    /// Returns whether the URL is selected afterwards.
    pub fn toggle(&mut self, url: &str) -> Result<bool, ValidationError> {
        let idx = self.position(url)?;
        if self.selected.remove(&idx) {
            Ok(false)
        } else {
            self.selected.insert(idx);
            Ok(true)
        }
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.candidates.len()).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, url: &str) -> bool {
        self.position(url)
            .is_ok_and(|idx| self.selected.contains(&idx))
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected URLs in candidate order.
    pub fn selected_urls(&self) -> Vec<String> {
        self.selected
            .iter()
            .filter_map(|idx| self.candidates.get(*idx))
            .map(|candidate| candidate.url.clone())
            .collect()
    }
}
