//! REST client for the persistence service

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use cap_table_types::{ClientId, Company, CompanyId, Page, Person, PersonId, SearchHit};

use super::wire::{WireCompany, WirePerson, WireSearchPage};
use super::{CompanyStore, PageRequest};
use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, PersistenceResult};
use crate::session::Credential;

pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("Invalid service URL {base_url}"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &PersistenceConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn url(&self, path: &str) -> PersistenceResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PersistenceError::Transport {
                message: format!("bad path {path}: {e}"),
            })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        credential: &Credential,
        entity: &str,
    ) -> PersistenceResult<Response> {
        let response = request
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(|e| PersistenceError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), entity, "Persistence request failed");
        Err(match status {
            StatusCode::NOT_FOUND => PersistenceError::NotFound {
                entity: entity.to_string(),
            },
            StatusCode::CONFLICT => PersistenceError::Conflict { message: body },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PersistenceError::NotAuthenticated,
            _ => PersistenceError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credential: &Credential,
        entity: &str,
    ) -> PersistenceResult<T> {
        self.send(request, credential, entity)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PersistenceError::Decode {
                message: format!("{entity}: {e}"),
            })
    }
}

#[async_trait]
impl CompanyStore for HttpStore {
    async fn fetch_company(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> PersistenceResult<Company> {
        let url = self.url(&format!("companies/{}", id.as_uuid()))?;
        let entity = format!("company {id}");
        let wire: WireCompany = self
            .send_json(self.client.get(url), credential, &entity)
            .await?;
        wire.into_company()
    }

    async fn fetch_client_companies(
        &self,
        credential: &Credential,
        client: ClientId,
    ) -> PersistenceResult<Vec<Company>> {
        let url = self.url(&format!("clients/{}/companies", client.as_uuid()))?;
        let entity = format!("client {client}");
        let wire: Vec<WireCompany> = self
            .send_json(self.client.get(url), credential, &entity)
            .await?;
        wire.into_iter().map(WireCompany::into_company).collect()
    }

    async fn create_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company> {
        let url = self.url("companies")?;
        let body = WireCompany::from_company(company);
        let wire: WireCompany = self
            .send_json(self.client.post(url).json(&body), credential, "company")
            .await?;
        wire.into_company()
    }

    async fn update_company(
        &self,
        credential: &Credential,
        company: &Company,
    ) -> PersistenceResult<Company> {
        let url = self.url(&format!("companies/{}", company.id.as_uuid()))?;
        let entity = format!("company {}", company.id);
        let body = WireCompany::from_company(company);
        let wire: WireCompany = self
            .send_json(self.client.put(url).json(&body), credential, &entity)
            .await?;
        wire.into_company()
    }

    async fn delete_company(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> PersistenceResult<()> {
        let url = self.url(&format!("companies/{}", id.as_uuid()))?;
        let entity = format!("company {id}");
        self.send(self.client.delete(url), credential, &entity).await?;
        Ok(())
    }

    async fn fetch_persons_by_company(
        &self,
        credential: &Credential,
        company: CompanyId,
    ) -> PersistenceResult<Vec<Person>> {
        let url = self.url(&format!("companies/{}/persons", company.as_uuid()))?;
        let entity = format!("company {company}");
        let wire: Vec<WirePerson> = self
            .send_json(self.client.get(url), credential, &entity)
            .await?;
        Ok(wire.into_iter().map(WirePerson::into_person).collect())
    }

    async fn create_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person> {
        let url = self.url("persons")?;
        let body = WirePerson::from_person(person);
        let wire: WirePerson = self
            .send_json(self.client.post(url).json(&body), credential, "person")
            .await?;
        Ok(wire.into_person())
    }

    async fn update_person(
        &self,
        credential: &Credential,
        person: &Person,
    ) -> PersistenceResult<Person> {
        let url = self.url(&format!("persons/{}", person.id.as_uuid()))?;
        let entity = format!("person {}", person.id);
        let body = WirePerson::from_person(person);
        let wire: WirePerson = self
            .send_json(self.client.put(url).json(&body), credential, &entity)
            .await?;
        Ok(wire.into_person())
    }

    async fn delete_person(&self, credential: &Credential, id: PersonId) -> PersistenceResult<()> {
        let url = self.url(&format!("persons/{}", id.as_uuid()))?;
        let entity = format!("person {id}");
        self.send(self.client.delete(url), credential, &entity).await?;
        Ok(())
    }

    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        page: PageRequest,
    ) -> PersistenceResult<Page<SearchHit>> {
        let url = self.url("search")?;
        let request = self.client.get(url).query(&[
            ("q", query.to_string()),
            ("page", page.page.to_string()),
            ("page_size", page.page_size.to_string()),
        ]);
        let wire: WireSearchPage = self.send_json(request, credential, "search").await?;
        Ok(wire.into_page())
    }
}
