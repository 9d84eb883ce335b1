//! Persistence collaborator
//!
//! The engine owns no storage format. Company documents, persons and search
//! live in an external service reached through [`CompanyStore`]; updates are
//! full-document replacements, never partial patches.

mod http;
mod memory;
pub mod wire;

pub use http::HttpStore;
pub use memory::{Fixture, MemoryStore};

use async_trait::async_trait;
use cap_table_types::{ClientId, Company, CompanyId, Page, Person, PersonId, SearchHit};

use crate::error::PersistenceResult;
use crate::session::Credential;

/// Requested page of a search (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Number of items before this page
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.page_size as usize
    }
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    // ── Companies ──

    /// Full company document including holdings, representation and totals
    async fn fetch_company(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> PersistenceResult<Company>;

    /// Every company owned by `client`
    async fn fetch_client_companies(
        &self,
        credential: &Credential,
        client: ClientId,
    ) -> PersistenceResult<Vec<Company>>;

    async fn create_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company>;

    /// Replace the whole document. Returns the stored version.
    async fn update_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company>;

    async fn delete_company(&self, credential: &Credential, id: CompanyId) -> PersistenceResult<()>;

    // ── Persons ──

    /// Persons filed under `company`
    async fn fetch_persons_by_company(
        &self,
        credential: &Credential,
        company: CompanyId,
    ) -> PersistenceResult<Vec<Person>>;

    async fn create_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person>;

    async fn update_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person>;

    async fn delete_person(&self, credential: &Credential, id: PersonId) -> PersistenceResult<()>;

    // ── Search ──

    /// Free-text search over person and company names
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        page: PageRequest,
    ) -> PersistenceResult<Page<SearchHit>>;
}
