//! Shared Cap Table Types
//!
//! This crate is the SINGLE SOURCE OF TRUTH for types crossing a boundary:
//! the reconciliation engine, the persistence adapters, and the CLI.
//!
//! ## Boundaries
//!
//! ```text
//! ┌──────────────────┐  records  ┌──────────────────┐  views  ┌──────────┐
//! │  Persistence     │ ◄───────► │  Engine          │ ──────► │  Caller  │
//! │  service         │           │  (cap-table)     │         │  (UI)    │
//! └──────────────────┘           └──────────────────┘         └──────────┘
//! ```
//!
//! ## Rules
//!
//! 1. Holder identity is always [`HolderRef`], never a raw id
//! 2. Tagged enums only: `#[serde(tag = "...")]`
//! 3. Percentages are `rust_decimal::Decimal`

pub mod holder;
pub mod ids;
pub mod records;
pub mod roles;
pub mod shares;
pub mod views;

pub use holder::{HolderKind, HolderRef};
pub use ids::{ClientId, CompanyId, PersonId};
pub use records::{Company, ContactDetails, Person, RepresentationEntry, ShareHolding};
pub use roles::{Role, RoleSet};
pub use shares::{
    AllocationDraft, AllocationMode, DraftMode, MixedModeDraft, ShareAllocation, ShareClass,
    ShareCounts, ShareTotals,
};
pub use views::{
    Candidate, CandidateSource, ClassShare, ErrorKey, FieldError, Page, RelationshipBadges,
    RepresentativeRow, SearchHit, ShareholderRow, UboSummary,
};
