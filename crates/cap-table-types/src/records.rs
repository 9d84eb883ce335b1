//! Persisted records
//!
//! A [`Company`] document is the unit the persistence service stores and
//! replaces: it carries its own share totals, every holding in it, and every
//! representation entry in it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::holder::HolderRef;
use crate::ids::{ClientId, CompanyId, PersonId};
use crate::roles::RoleSet;
use crate::shares::{ShareAllocation, ShareTotals};

// ============================================================================
// PERSON
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact: ContactDetails,
    /// Company this person record is filed under ("directly owned by")
    #[serde(default)]
    pub company_id: Option<CompanyId>,
    /// Roles recorded on the person document
    #[serde(default)]
    pub roles: RoleSet,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PersonId::new(),
            name: name.into(),
            nationality: None,
            address: None,
            contact: ContactDetails::default(),
            company_id: None,
            roles: RoleSet::new(),
        }
    }

    pub fn filed_under(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    pub fn holder(&self) -> HolderRef {
        HolderRef::Person(self.id)
    }
}

// ============================================================================
// HOLDINGS AND REPRESENTATION
// ============================================================================

/// One holder's stake in one target company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareHolding {
    pub holder: HolderRef,
    /// Display name captured when the holding was written
    pub holder_name: String,
    pub allocation: ShareAllocation,
}

impl ShareHolding {
    pub fn new(
        holder: HolderRef,
        holder_name: impl Into<String>,
        allocation: ShareAllocation,
    ) -> Self {
        Self {
            holder,
            holder_name: holder_name.into(),
            allocation,
        }
    }

    pub fn percent_of(&self, totals: &ShareTotals) -> Decimal {
        self.allocation.percent_of(totals)
    }
}

/// Governance roles a holder exercises in one target company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationEntry {
    pub representative: HolderRef,
    pub representative_name: String,
    pub roles: RoleSet,
    /// Set when the representative originates from a subsidiary
    #[serde(default)]
    pub source_company_id: Option<CompanyId>,
}

impl RepresentationEntry {
    pub fn new(representative: HolderRef, name: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            representative,
            representative_name: name.into(),
            roles,
            source_company_id: None,
        }
    }

    pub fn from_subsidiary(mut self, company_id: CompanyId) -> Self {
        self.source_company_id = Some(company_id);
        self
    }

    /// An entry whose roles are exactly `{Shareholder}` is not a representative
    pub fn is_representative(&self) -> bool {
        self.roles.has_governance_role()
    }
}

// ============================================================================
// COMPANY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub client_id: ClientId,
    pub name: String,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub share_totals: ShareTotals,
    #[serde(default)]
    pub holdings: Vec<ShareHolding>,
    #[serde(default)]
    pub representation: Vec<RepresentationEntry>,
    /// Optimistic concurrency token, bumped by the store on every replace
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn new(client_id: ClientId, name: impl Into<String>, share_totals: ShareTotals) -> Self {
        Self {
            id: CompanyId::new(),
            client_id,
            name: name.into(),
            registration_number: None,
            address: None,
            share_totals,
            holdings: Vec::new(),
            representation: Vec::new(),
            version: 0,
            updated_at: None,
        }
    }

    pub fn holder(&self) -> HolderRef {
        HolderRef::Company(self.id)
    }

    pub fn holding(&self, holder: &HolderRef) -> Option<&ShareHolding> {
        self.holdings.iter().find(|h| &h.holder == holder)
    }

    pub fn representation_of(&self, holder: &HolderRef) -> Option<&RepresentationEntry> {
        self.representation
            .iter()
            .find(|r| &r.representative == holder)
    }

    /// True when `holder` has a holding or representation entry here
    pub fn references(&self, holder: &HolderRef) -> bool {
        self.holding(holder).is_some() || self.representation_of(holder).is_some()
    }

    /// Companies holding shares in this company
    pub fn shareholding_companies(&self) -> impl Iterator<Item = CompanyId> + '_ {
        self.holdings.iter().filter_map(|h| h.holder.as_company())
    }
}
