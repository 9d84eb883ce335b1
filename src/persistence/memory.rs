//! In-memory CompanyStore for tests, fixtures and the CLI.
//!
//! Behaves like the real service where the engine can observe it:
//! - unknown ids are `NotFound`
//! - `update_company` with a stale `version` is a `Conflict`
//! - a configured token must match, otherwise `NotAuthenticated`

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use cap_table_types::{ClientId, Company, CompanyId, Page, Person, PersonId, SearchHit};

use super::{CompanyStore, PageRequest};
use crate::error::{PersistenceError, PersistenceResult};
use crate::session::Credential;

/// A client's companies and persons, as loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub persons: Vec<Person>,
}

impl Fixture {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Default)]
struct Records {
    companies: BTreeMap<CompanyId, Company>,
    persons: BTreeMap<PersonId, Person>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Records>,
    token: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let records = Records {
            companies: fixture.companies.into_iter().map(|c| (c.id, c)).collect(),
            persons: fixture.persons.into_iter().map(|p| (p.id, p)).collect(),
        };
        Self {
            inner: RwLock::new(records),
            token: None,
        }
    }

    /// Only accept `token`
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Current state, for inspection in tests and the CLI
    pub async fn snapshot(&self) -> Fixture {
        let records = self.inner.read().await;
        Fixture {
            companies: records.companies.values().cloned().collect(),
            persons: records.persons.values().cloned().collect(),
        }
    }

    fn authorize(&self, credential: &Credential) -> PersistenceResult<()> {
        match &self.token {
            Some(expected) if expected != credential.token() => {
                Err(PersistenceError::NotAuthenticated)
            }
            _ => Ok(()),
        }
    }
}

fn not_found(entity: &str, id: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::NotFound {
        entity: format!("{entity} {id}"),
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn fetch_company(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> PersistenceResult<Company> {
        self.authorize(credential)?;
        let records = self.inner.read().await;
        records
            .companies
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("company", id))
    }

    async fn fetch_client_companies(
        &self,
        credential: &Credential,
        client: ClientId,
    ) -> PersistenceResult<Vec<Company>> {
        self.authorize(credential)?;
        let records = self.inner.read().await;
        Ok(records
            .companies
            .values()
            .filter(|c| c.client_id == client)
            .cloned()
            .collect())
    }

    async fn create_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        if records.companies.contains_key(&company.id) {
            return Err(PersistenceError::Conflict {
                message: format!("company {} already exists", company.id),
            });
        }
        let mut stored = company.clone();
        stored.version = 1;
        stored.updated_at = Some(Utc::now());
        records.companies.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        let current = records
            .companies
            .get(&company.id)
            .ok_or_else(|| not_found("company", company.id))?;
        if current.version != company.version {
            return Err(PersistenceError::Conflict {
                message: format!(
                    "company {} is at version {}, update was based on {}",
                    company.id, current.version, company.version
                ),
            });
        }
        let mut stored = company.clone();
        stored.version = current.version + 1;
        stored.updated_at = Some(Utc::now());
        records.companies.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_company(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> PersistenceResult<()> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        records
            .companies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("company", id))
    }

    async fn fetch_persons_by_company(
        &self,
        credential: &Credential,
        company: CompanyId,
    ) -> PersistenceResult<Vec<Person>> {
        self.authorize(credential)?;
        let records = self.inner.read().await;
        Ok(records
            .persons
            .values()
            .filter(|p| p.company_id == Some(company))
            .cloned()
            .collect())
    }

    async fn create_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        if records.persons.contains_key(&person.id) {
            return Err(PersistenceError::Conflict {
                message: format!("person {} already exists", person.id),
            });
        }
        records.persons.insert(person.id, person.clone());
        Ok(person.clone())
    }

    async fn update_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        let slot = records
            .persons
            .get_mut(&person.id)
            .ok_or_else(|| not_found("person", person.id))?;
        *slot = person.clone();
        Ok(person.clone())
    }

    async fn delete_person(&self, credential: &Credential, id: PersonId) -> PersistenceResult<()> {
        self.authorize(credential)?;
        let mut records = self.inner.write().await;
        records
            .persons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("person", id))
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        page: PageRequest,
    ) -> PersistenceResult<Page<SearchHit>> {
        self.authorize(credential)?;
        let needle = query.trim().to_lowercase();
        let records = self.inner.read().await;

        let persons = records.persons.values().map(|p| SearchHit {
            holder: p.holder(),
            name: p.name.clone(),
            company_id: p.company_id,
        });
        let companies = records.companies.values().map(|c| SearchHit {
            holder: c.holder(),
            name: c.name.clone(),
            company_id: None,
        });
        let hits: Vec<SearchHit> = persons
            .chain(companies)
            .filter(|hit| hit.name.to_lowercase().contains(&needle))
            .collect();

        let total_items = hits.len() as u64;
        let items = hits
            .into_iter()
            .skip(page.offset())
            .take(page.page_size as usize)
            .collect();
        Ok(Page {
            items,
            page: page.page,
            page_size: page.page_size,
            total_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_table_types::ShareTotals;

    fn credential() -> Credential {
        Credential::new("t")
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let company = Company::new(ClientId::new(), "X", ShareTotals::default());
        let store = MemoryStore::from_fixture(Fixture {
            companies: vec![company.clone()],
            persons: vec![],
        });

        let stored = store.update_company(&credential(), &company).await.unwrap();
        assert_eq!(stored.version, 1);

        let error = store.update_company(&credential(), &company).await.unwrap_err();
        assert!(matches!(error, PersistenceError::Conflict { .. }));
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let store = MemoryStore::new().with_token("right");
        let error = store
            .fetch_company(&Credential::new("wrong"), CompanyId::new())
            .await
            .unwrap_err();
        assert!(matches!(error, PersistenceError::NotAuthenticated));
    }

    #[tokio::test]
    async fn search_pages_case_insensitively() {
        let client = ClientId::new();
        let fixture = Fixture {
            companies: vec![Company::new(client, "Annex Holdings", ShareTotals::default())],
            persons: vec![Person::new("Anna"), Person::new("Bob"), Person::new("Joanne")],
        };
        let store = MemoryStore::from_fixture(fixture);

        let page = store
            .search(&credential(), "AN", PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total_items, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages(), 2);

        let second = store
            .search(&credential(), "an", PageRequest::new(2, 2))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
    }

    #[test]
    fn fixture_parses_from_yaml() {
        let fixture = Fixture::from_yaml("companies: []\npersons: []\n").unwrap();
        assert!(fixture.companies.is_empty());
    }
}
