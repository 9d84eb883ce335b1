//! Cap table reconciliation engine
//!
//! Maintains who owns and who represents a client's companies: validates
//! share allocations against authorized totals, deduplicates candidates
//! reachable through several relationship paths, determines the ultimate
//! beneficial owner, and aggregates a holder's relationships across every
//! company of the client.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ service    CapTableService (async, snapshot swap, writes)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ mutation   (snapshot, command) -> snapshot | errors (pure)   │
//! │ allocation  resolver  ubo  aggregator  views                 │
//! │ graph      OwnershipGraph snapshot                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ persistence (CompanyStore: memory, http)   session           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above `persistence` except `service` is synchronous and free
//! of I/O.

pub mod aggregator;
pub mod allocation;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod graph;
pub mod mutation;
pub mod persistence;
pub mod resolver;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod ubo;
pub mod views;

pub use aggregator::{BadgeScope, CrossCompanyAggregator, RelationshipMap};
pub use allocation::{AllocationSummary, ProposedAllocation, ShareAllocationValidator};
pub use config::EngineConfig;
pub use dedupe::{FetchTicket, RequestCache, RequestScope};
pub use error::{
    EngineError, EngineResult, PersistenceError, PersistenceResult, ValidationError,
    ValidationErrors, ValidationResult,
};
pub use graph::{HolderPosition, OwnershipGraph, SubsidiarySnapshot};
pub use mutation::{
    AllocationChange, AllocationValue, BulkStep, Command, MutationCoordinator, MutationOutcome,
};
pub use persistence::{CompanyStore, Fixture, HttpStore, MemoryStore, PageRequest};
pub use resolver::{CandidatePurpose, RelationshipResolver};
pub use service::CapTableService;
pub use session::{Credential, EnvSessionProvider, SessionProvider, StaticSession};
pub use ubo::UboDeterminer;

pub use cap_table_types as types;
