//! Cross-company relationship aggregation
//!
//! For candidates of a target company, reports the other companies of the
//! same client where each candidate is already a shareholder or a
//! representative. Read-only enrichment for badge display; never feeds into
//! validation.

use std::collections::{BTreeMap, HashSet};

use cap_table_types::{Company, CompanyId, HolderRef, RelationshipBadges};

use crate::resolver::CandidatePurpose;

/// Per-candidate badges
pub type RelationshipMap = BTreeMap<HolderRef, RelationshipBadges>;

/// Second half of the `(client, scope)` cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BadgeScope {
    pub target: CompanyId,
    pub purpose: CandidatePurpose,
}

/// Holder sets of one company, built once per scan
struct CompanyIndex<'a> {
    name: &'a str,
    shareholders: HashSet<HolderRef>,
    representatives: HashSet<HolderRef>,
}

impl<'a> CompanyIndex<'a> {
    fn build(company: &'a Company) -> Self {
        Self {
            name: &company.name,
            shareholders: company
                .holdings
                .iter()
                .filter(|h| !h.allocation.is_zero())
                .map(|h| h.holder)
                .collect(),
            representatives: company
                .representation
                .iter()
                .filter(|r| r.is_representative())
                .map(|r| r.representative)
                .collect(),
        }
    }
}

pub struct CrossCompanyAggregator;

impl CrossCompanyAggregator {
    /// Badges for `candidates` across every client company except `target`.
    ///
    /// One pass over the company list builds the holder sets; each
    /// candidate is then looked up against them. Candidates with no
    /// relationship elsewhere get an empty entry.
    pub fn badges(
        client_companies: &[Company],
        target: CompanyId,
        candidates: &[HolderRef],
    ) -> RelationshipMap {
        let index: Vec<CompanyIndex<'_>> = client_companies
            .iter()
            .filter(|c| c.id != target)
            .map(CompanyIndex::build)
            .collect();

        let map: RelationshipMap = candidates
            .iter()
            .map(|candidate| {
                let mut badges = RelationshipBadges::default();
                for company in &index {
                    if company.shareholders.contains(candidate) {
                        badges.shareholder_in.push(company.name.to_string());
                    }
                    if company.representatives.contains(candidate) {
                        badges.representative_in.push(company.name.to_string());
                    }
                }
                (*candidate, badges)
            })
            .collect();

        tracing::debug!(
            target_company = %target,
            companies = index.len(),
            candidates = candidates.len(),
            with_badges = map.values().filter(|b| !b.is_empty()).count(),
            "Aggregated cross-company relationships"
        );
        map
    }

    /// Names of every company where `holder` has a holding or a
    /// representation entry of any kind (target included)
    pub fn relationships_of(client_companies: &[Company], holder: &HolderRef) -> Vec<String> {
        client_companies
            .iter()
            .filter(|c| c.references(holder))
            .map(|c| c.name.clone())
            .collect()
    }
}
