//! Wire format of the persistence service
//!
//! The service is loose about shapes: a holder may arrive as a bare id or as
//! an embedded object with an `id`, share values are flat per-class fields,
//! and a company may carry per-class totals, legacy percentages, or both.
//! Everything is normalized here, once, into the engine's records.
//!
//! ## Scheme resolution
//!
//! 1. An explicit `scheme` field on the document wins.
//! 2. Otherwise any non-zero per-class total makes the company per-class.
//! 3. Otherwise a company whose holdings carry percentages is legacy.
//! 4. Otherwise the company is per-class with no totals yet.
//!
//! A holding in the other scheme is a decode error naming the holder.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cap_table_types::{
    ClientId, Company, CompanyId, ContactDetails, HolderKind, HolderRef, Page, Person, PersonId,
    RepresentationEntry, Role, RoleSet, SearchHit, ShareAllocation, ShareClass, ShareCounts,
    ShareHolding, ShareTotals,
};

use crate::error::{PersistenceError, PersistenceResult};

// ============================================================================
// REFERENCES
// ============================================================================

/// A reference that is either a bare id or an embedded object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRef {
    Id(Uuid),
    Embedded { id: Uuid },
}

impl WireRef {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Id(id) | Self::Embedded { id } => *id,
        }
    }

    fn holder(&self, kind: HolderKind) -> HolderRef {
        match kind {
            HolderKind::Person => HolderRef::Person(PersonId::from_uuid(self.id())),
            HolderKind::Company => HolderRef::Company(CompanyId::from_uuid(self.id())),
        }
    }

    fn of(holder: &HolderRef) -> (Self, HolderKind) {
        let id = match holder {
            HolderRef::Person(id) => *id.as_uuid(),
            HolderRef::Company(id) => *id.as_uuid(),
        };
        (Self::Id(id), holder.kind())
    }
}

// ============================================================================
// SHARES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireShares {
    #[serde(default, alias = "a")]
    pub class_a: u64,
    #[serde(default, alias = "b")]
    pub class_b: u64,
    #[serde(default, alias = "c")]
    pub class_c: u64,
    #[serde(default)]
    pub ordinary: u64,
    #[serde(default)]
    pub general: u64,
}

impl WireShares {
    fn counts(&self) -> ShareCounts {
        ShareCounts::new()
            .with(ShareClass::A, self.class_a)
            .with(ShareClass::B, self.class_b)
            .with(ShareClass::C, self.class_c)
            .with(ShareClass::Ordinary, self.ordinary)
            .with(ShareClass::General, self.general)
    }

    fn from_counts(counts: &ShareCounts) -> Self {
        Self {
            class_a: counts.get(ShareClass::A),
            class_b: counts.get(ShareClass::B),
            class_c: counts.get(ShareClass::C),
            ordinary: counts.get(ShareClass::Ordinary),
            general: counts.get(ShareClass::General),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireScheme {
    PerClass,
    LegacyPercentage,
}

// ============================================================================
// DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireHolding {
    #[serde(alias = "shareholder")]
    pub holder: WireRef,
    #[serde(default = "default_kind")]
    pub holder_type: HolderKind,
    #[serde(default)]
    pub holder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<WireShares>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_class: Option<ShareClass>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRepresentative {
    pub representative: WireRef,
    #[serde(default = "default_kind")]
    pub representative_type: HolderKind,
    #[serde(default, alias = "name")]
    pub representative_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_company: Option<WireRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCompany {
    pub id: Uuid,
    #[serde(alias = "client_id")]
    pub client: WireRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<WireScheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_totals: Option<WireShares>,
    #[serde(default, alias = "holdings")]
    pub shareholders: Vec<WireHolding>,
    #[serde(default, alias = "representation")]
    pub representatives: Vec<WireRepresentative>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePerson {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, alias = "company_id", skip_serializing_if = "Option::is_none")]
    pub company: Option<WireRef>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSearchItem {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: HolderKind,
    pub name: String,
    #[serde(default, alias = "company_id")]
    pub company: Option<WireRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSearchPage {
    #[serde(default)]
    pub items: Vec<WireSearchItem>,
    pub page: u32,
    pub page_size: u32,
    #[serde(alias = "total_items")]
    pub total: u64,
}

fn default_kind() -> HolderKind {
    HolderKind::Person
}

// ============================================================================
// DECODE
// ============================================================================

fn decode_error(message: impl Into<String>) -> PersistenceError {
    PersistenceError::Decode {
        message: message.into(),
    }
}

fn parse_roles(labels: &[String]) -> RoleSet {
    labels
        .iter()
        .filter_map(|label| {
            let role = Role::from_label(label);
            if role.is_none() {
                tracing::warn!(label = %label, "Skipping unknown role label");
            }
            role
        })
        .collect()
}

impl WireCompany {
    fn resolve_scheme(&self) -> WireScheme {
        if let Some(scheme) = self.scheme {
            return scheme;
        }
        let has_totals = self
            .share_totals
            .as_ref()
            .is_some_and(|t| !t.counts().is_zero());
        let has_percentages = self
            .shareholders
            .iter()
            .any(|h| h.percentage.is_some_and(|p| !p.is_zero()));
        if has_totals || !has_percentages {
            WireScheme::PerClass
        } else {
            WireScheme::LegacyPercentage
        }
    }

    pub fn into_company(self) -> PersistenceResult<Company> {
        let scheme = self.resolve_scheme();
        let share_totals = match scheme {
            WireScheme::PerClass => ShareTotals::per_class(
                self.share_totals
                    .as_ref()
                    .map(WireShares::counts)
                    .unwrap_or_default(),
            ),
            WireScheme::LegacyPercentage => ShareTotals::LegacyPercentage,
        };

        let holdings = self
            .shareholders
            .iter()
            .map(|h| h.to_holding(scheme))
            .collect::<PersistenceResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let representation = self
            .representatives
            .iter()
            .map(|r| RepresentationEntry {
                representative: r.representative.holder(r.representative_type),
                representative_name: r.representative_name.clone(),
                roles: parse_roles(&r.roles),
                source_company_id: r.source_company.map(|c| CompanyId::from_uuid(c.id())),
            })
            .collect();

        Ok(Company {
            id: CompanyId::from_uuid(self.id),
            client_id: ClientId::from_uuid(self.client.id()),
            name: self.name,
            registration_number: self.registration_number,
            address: self.address,
            share_totals,
            holdings,
            representation,
            version: self.version,
            updated_at: self.updated_at,
        })
    }

    pub fn from_company(company: &Company) -> Self {
        let (scheme, share_totals) = match &company.share_totals {
            ShareTotals::PerClass { authorized } => {
                (WireScheme::PerClass, Some(WireShares::from_counts(authorized)))
            }
            ShareTotals::LegacyPercentage => (WireScheme::LegacyPercentage, None),
        };
        Self {
            id: *company.id.as_uuid(),
            client: WireRef::Id(*company.client_id.as_uuid()),
            name: company.name.clone(),
            registration_number: company.registration_number.clone(),
            address: company.address.clone(),
            scheme: Some(scheme),
            share_totals,
            shareholders: company.holdings.iter().map(WireHolding::from_holding).collect(),
            representatives: company
                .representation
                .iter()
                .map(|r| {
                    let (representative, representative_type) = WireRef::of(&r.representative);
                    WireRepresentative {
                        representative,
                        representative_type,
                        representative_name: r.representative_name.clone(),
                        roles: r.roles.labels().into_iter().map(str::to_string).collect(),
                        source_company: r
                            .source_company_id
                            .map(|id| WireRef::Id(*id.as_uuid())),
                    }
                })
                .collect(),
            version: company.version,
            updated_at: company.updated_at,
        }
    }
}

impl WireHolding {
    /// `Ok(None)` for a holding with nothing in it
    fn to_holding(&self, scheme: WireScheme) -> PersistenceResult<Option<ShareHolding>> {
        let holder = self.holder.holder(self.holder_type);
        let counts = self.shares.as_ref().map(WireShares::counts).unwrap_or_default();
        let percent = self.percentage.filter(|p| !p.is_zero());

        let allocation = match (scheme, counts.is_zero(), percent) {
            (_, true, None) => return Ok(None),
            (WireScheme::PerClass, false, _) => counts_allocation(holder, counts)?,
            (WireScheme::LegacyPercentage, true, Some(percent)) => ShareAllocation::percentage(
                percent,
                self.share_class.unwrap_or(ShareClass::Unclassified),
            ),
            (WireScheme::PerClass, true, Some(_)) => {
                return Err(decode_error(format!(
                    "holding of {holder} is a legacy percentage on a per-class company"
                )))
            }
            (WireScheme::LegacyPercentage, false, _) => {
                return Err(decode_error(format!(
                    "holding of {holder} carries share counts on a legacy percentage company"
                )))
            }
        };

        Ok(Some(ShareHolding::new(
            holder,
            self.holder_name.clone(),
            allocation,
        )))
    }

    fn from_holding(holding: &ShareHolding) -> Self {
        let (holder, holder_type) = WireRef::of(&holding.holder);
        let (shares, percentage, share_class) = match &holding.allocation {
            ShareAllocation::Percentage { percent, class } => (None, Some(*percent), Some(*class)),
            other => (Some(WireShares::from_counts(&other.counts())), None, None),
        };
        Self {
            holder,
            holder_type,
            holder_name: holding.holder_name.clone(),
            shares,
            percentage,
            share_class,
        }
    }
}

fn counts_allocation(holder: HolderRef, counts: ShareCounts) -> PersistenceResult<ShareAllocation> {
    let ordinary = counts.get(ShareClass::Ordinary);
    if ordinary == 0 {
        return Ok(ShareAllocation::classes(counts));
    }
    if counts.total() == ordinary {
        return Ok(ShareAllocation::ordinary(ordinary));
    }
    Err(decode_error(format!(
        "holding of {holder} mixes class and ordinary values"
    )))
}

impl WirePerson {
    pub fn into_person(self) -> Person {
        Person {
            id: PersonId::from_uuid(self.id),
            name: self.name,
            nationality: self.nationality,
            address: self.address,
            contact: ContactDetails {
                email: self.email,
                phone: self.phone,
            },
            company_id: self.company.map(|c| CompanyId::from_uuid(c.id())),
            roles: parse_roles(&self.roles),
        }
    }

    pub fn from_person(person: &Person) -> Self {
        Self {
            id: *person.id.as_uuid(),
            name: person.name.clone(),
            nationality: person.nationality.clone(),
            address: person.address.clone(),
            email: person.contact.email.clone(),
            phone: person.contact.phone.clone(),
            company: person.company_id.map(|id| WireRef::Id(*id.as_uuid())),
            roles: person.roles.labels().into_iter().map(str::to_string).collect(),
        }
    }
}

impl WireSearchPage {
    pub fn into_page(self) -> Page<SearchHit> {
        Page {
            items: self
                .items
                .into_iter()
                .map(|item| SearchHit {
                    holder: WireRef::Id(item.id).holder(item.kind),
                    name: item.name,
                    company_id: item.company.map(|c| CompanyId::from_uuid(c.id())),
                })
                .collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total,
        }
    }
}
