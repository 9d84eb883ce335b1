//! Presentation views
//!
//! Normalized, display-ready rows handed to callers. Percentages stay
//! `Decimal` (rounded to two places) rather than `f64` so the UI renders the
//! same value the engine ranked on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::holder::{HolderKind, HolderRef};
use crate::ids::CompanyId;
use crate::roles::RoleSet;
use crate::shares::{AllocationMode, ShareClass};

// =============================================================================
// SHAREHOLDER / REPRESENTATIVE LISTS
// =============================================================================

/// Shares held in one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassShare {
    pub class: ShareClass,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareholderRow {
    pub holder: HolderRef,
    pub kind: HolderKind,
    pub name: String,
    pub mode: AllocationMode,
    /// Per-class shares; empty for legacy percentage holdings
    pub classes: Vec<ClassShare>,
    /// Class label for legacy percentage holdings
    #[serde(default)]
    pub percentage_class: Option<ShareClass>,
    pub percentage: Decimal,
    pub is_ubo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentativeRow {
    pub holder: HolderRef,
    pub kind: HolderKind,
    pub name: String,
    /// Governance roles only; `Shareholder` is never listed here
    pub roles: RoleSet,
    pub role_labels: Vec<String>,
    /// Also holds shares in the same company
    pub is_shareholder: bool,
    #[serde(default)]
    pub source_company_id: Option<CompanyId>,
    #[serde(default)]
    pub source_company_name: Option<String>,
    pub is_ubo: bool,
}

/// The single largest beneficial owner of a company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UboSummary {
    pub holder: HolderRef,
    pub name: String,
    pub percentage: Decimal,
    pub ranking_class: ShareClass,
}

// =============================================================================
// CANDIDATES
// =============================================================================

/// Path through which a candidate was reached, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Filed directly under the target company
    Direct,
    /// Filed under a company that holds shares in the target
    Subsidiary,
    /// Only known as a recorded shareholder of the target
    Shareholder,
    /// Another company of the same client
    ClientCompany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub holder: HolderRef,
    pub name: String,
    pub source: CandidateSource,
    #[serde(default)]
    pub source_company_id: Option<CompanyId>,
    #[serde(default)]
    pub source_company_name: Option<String>,
    /// Roles already held in the target company
    pub roles: RoleSet,
}

/// Where else a candidate already has a relationship within the client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipBadges {
    pub shareholder_in: Vec<String>,
    pub representative_in: Vec<String>,
}

impl RelationshipBadges {
    pub fn is_empty(&self) -> bool {
        self.shareholder_in.is_empty() && self.representative_in.is_empty()
    }
}

// =============================================================================
// VALIDATION ERROR MAP
// =============================================================================

/// Field a validation message attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorKey {
    Class { class: ShareClass },
    Holder { holder: HolderRef },
    Company,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub key: ErrorKey,
    pub messages: Vec<String>,
}

// =============================================================================
// SEARCH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub holder: HolderRef,
    pub name: String,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
}

/// One page of results (1-indexed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_items.div_ceil(u64::from(self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_key_tagged_correctly() {
        let key = ErrorKey::Class {
            class: ShareClass::A,
        };
        let json = serde_json::to_string(&key).unwrap();
        assert!(json.contains(r#""type":"class""#));
    }

    #[test]
    fn page_count_rounds_up() {
        let page: Page<SearchHit> = Page {
            items: vec![],
            page: 1,
            page_size: 20,
            total_items: 41,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
