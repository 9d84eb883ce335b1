//! HttpStore against a mock persistence service
//!
//! Covers route shapes, bearer auth, status mapping and the loose wire
//! format (embedded references, flat per-class shares).

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cap_table::error::PersistenceError;
use cap_table::persistence::PageRequest;
use cap_table::types::{
    ClientId, Company, CompanyId, HolderRef, PersonId, Role, ShareClass, ShareCounts, ShareTotals,
};
use cap_table::{CompanyStore, Credential, HttpStore};

const TOKEN: &str = "test-token";

fn credential() -> Credential {
    Credential::new(TOKEN)
}

async fn store_for(server: &MockServer) -> HttpStore {
    HttpStore::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetch_company_normalizes_embedded_references() {
    let server = MockServer::start().await;
    let company_id = Uuid::now_v7();
    let client_id = Uuid::now_v7();
    let person_id = Uuid::now_v7();
    let holder_co = Uuid::now_v7();

    Mock::given(method("GET"))
        .and(path(format!("/api/companies/{company_id}")))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": company_id,
            "client": { "id": client_id, "name": "Client" },
            "name": "Company X",
            "share_totals": { "class_a": 1000 },
            "shareholders": [
                {
                    "shareholder": { "id": person_id },
                    "holder_name": "Ann",
                    "shares": { "a": 400 }
                },
                {
                    "holder": holder_co,
                    "holder_type": "company",
                    "holder_name": "Holder Co",
                    "shares": { "class_a": 350 }
                }
            ],
            "representatives": [
                {
                    "representative": { "id": person_id },
                    "name": "Ann",
                    "roles": ["Shareholder", "Director", "Chief Vibes Officer"]
                }
            ],
            "version": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let company = store
        .fetch_company(&credential(), CompanyId::from_uuid(company_id))
        .await
        .unwrap();

    assert_eq!(company.client_id, ClientId::from_uuid(client_id));
    assert_eq!(
        company.share_totals,
        ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, 1000))
    );
    assert_eq!(company.holdings.len(), 2);
    assert_eq!(
        company.holdings[0].holder,
        HolderRef::Person(PersonId::from_uuid(person_id))
    );
    assert_eq!(
        company.holdings[1].holder,
        HolderRef::Company(CompanyId::from_uuid(holder_co))
    );
    assert_eq!(company.holdings[1].allocation.counts().get(ShareClass::A), 350);

    let entry = &company.representation[0];
    assert_eq!(entry.representative_name, "Ann");
    assert!(entry.roles.contains(Role::Director));
    assert!(entry.roles.contains(Role::Shareholder));
    assert_eq!(company.version, 7);
}

#[tokio::test]
async fn missing_company_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let error = store
        .fetch_company(&credential(), CompanyId::new())
        .await
        .unwrap_err();
    assert!(matches!(error, PersistenceError::NotFound { .. }));
}

#[tokio::test]
async fn rejected_token_is_not_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let error = store
        .fetch_client_companies(&credential(), ClientId::new())
        .await
        .unwrap_err();
    assert!(matches!(error, PersistenceError::NotAuthenticated));
}

#[tokio::test]
async fn update_sends_full_document_and_maps_conflict() {
    let server = MockServer::start().await;
    let company = Company::new(
        ClientId::new(),
        "Company X",
        ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, 1000)),
    );

    Mock::given(method("PUT"))
        .and(path(format!("/api/companies/{}", company.id.as_uuid())))
        .and(body_partial_json(json!({
            "name": "Company X",
            "scheme": "per_class",
            "share_totals": { "class_a": 1000 }
        })))
        .respond_with(ResponseTemplate::new(409).set_body_string("stale version"))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let error = store
        .update_company(&credential(), &company)
        .await
        .unwrap_err();
    match error {
        PersistenceError::Conflict { message } => assert_eq!(message, "stale version"),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn unexpected_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let error = store
        .delete_person(&credential(), PersonId::new())
        .await
        .unwrap_err();
    match error {
        PersistenceError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_document_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let error = store
        .fetch_company(&credential(), CompanyId::new())
        .await
        .unwrap_err();
    assert!(matches!(error, PersistenceError::Decode { .. }));
}

#[tokio::test]
async fn persons_are_fetched_per_company() {
    let server = MockServer::start().await;
    let company_id = Uuid::now_v7();
    let person_id = Uuid::now_v7();

    Mock::given(method("GET"))
        .and(path(format!("/api/companies/{company_id}/persons")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": person_id,
                "name": "Ann",
                "email": "ann@example.com",
                "company_id": company_id,
                "roles": ["legal_representative"]
            }
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let persons = store
        .fetch_persons_by_company(&credential(), CompanyId::from_uuid(company_id))
        .await
        .unwrap();

    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].company_id, Some(CompanyId::from_uuid(company_id)));
    assert_eq!(persons[0].contact.email.as_deref(), Some("ann@example.com"));
    assert!(persons[0].roles.contains(Role::LegalRepresentative));
}

#[tokio::test]
async fn search_passes_query_and_paging() {
    let server = MockServer::start().await;
    let person_id = Uuid::now_v7();

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("q", "ann"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": person_id, "type": "person", "name": "Ann" }],
            "page": 2,
            "page_size": 5,
            "total_items": 6
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let page = store
        .search(&credential(), "ann", PageRequest::new(2, 5))
        .await
        .unwrap();

    assert_eq!(page.total_items, 6);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(
        page.items[0].holder,
        HolderRef::Person(PersonId::from_uuid(person_id))
    );
}
