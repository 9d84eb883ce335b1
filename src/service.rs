//! Cap table service
//!
//! Async orchestration around the pure engine. Owns the current
//! [`OwnershipGraph`] snapshot for one target company and talks to the
//! persistence and session collaborators.
//!
//! Ordering within one call:
//! 1. Credential check (nothing is fetched or written without one)
//! 2. Pure validation against the current snapshot
//! 3. Writes, sequential, one full company document at a time
//! 4. Snapshot swap, only to a document the store has acknowledged
//!
//! A failed write leaves the snapshot at the last persisted document.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};

use cap_table_types::{
    Candidate, ClientId, Company, CompanyId, HolderRef, Page, PersonId, RepresentativeRow,
    SearchHit, ShareholderRow, UboSummary,
};

use crate::aggregator::{BadgeScope, CrossCompanyAggregator, RelationshipMap};
use crate::dedupe::{RequestCache, RequestScope};
use crate::error::{EngineError, EngineResult, PersistenceError};
use crate::graph::{OwnershipGraph, SubsidiarySnapshot};
use crate::mutation::{AllocationChange, Command, MutationCoordinator};
use crate::persistence::{CompanyStore, PageRequest};
use crate::resolver::{CandidatePurpose, RelationshipResolver};
use crate::session::{Credential, SessionProvider};
use crate::ubo::UboDeterminer;
use crate::views;

type BadgeCache = RequestCache<(ClientId, BadgeScope), RelationshipMap>;

pub struct CapTableService<S, P> {
    store: S,
    session: P,
    snapshot: RwLock<Option<Arc<OwnershipGraph>>>,
    /// Serializes mutations so writes never interleave
    writes: Mutex<()>,
    badges: BadgeCache,
}

impl<S, P> CapTableService<S, P>
where
    S: CompanyStore,
    P: SessionProvider,
{
    pub fn new(store: S, session: P) -> Self {
        Self {
            store,
            session,
            snapshot: RwLock::new(None),
            writes: Mutex::new(()),
            badges: BadgeCache::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn credential(&self) -> EngineResult<Credential> {
        self.session
            .credential()
            .await
            .ok_or(EngineError::NotAuthenticated)
    }

    async fn install(&self, graph: OwnershipGraph) -> Arc<OwnershipGraph> {
        let graph = Arc::new(graph);
        *self.snapshot.write().await = Some(Arc::clone(&graph));
        graph
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    /// Fetch a company, its persons and one level of shareholding
    /// subsidiaries, and install the result as the current snapshot
    pub async fn load(&self, company_id: CompanyId) -> EngineResult<Arc<OwnershipGraph>> {
        let credential = self.credential().await?;
        let company = self.store.fetch_company(&credential, company_id).await?;
        let persons = self
            .store
            .fetch_persons_by_company(&credential, company_id)
            .await?;

        let subsidiary_ids = RelationshipResolver::subsidiary_ids(&company);
        let fetches = subsidiary_ids
            .iter()
            .map(|id| self.fetch_subsidiary(&credential, *id));
        let mut subsidiaries = Vec::with_capacity(subsidiary_ids.len());
        for result in join_all(fetches).await {
            if let Some(subsidiary) = result? {
                subsidiaries.push(subsidiary);
            }
        }

        tracing::info!(
            company_id = %company_id,
            holdings = company.holdings.len(),
            persons = persons.len(),
            subsidiaries = subsidiaries.len(),
            "Loaded ownership snapshot"
        );
        let graph = OwnershipGraph::new(company, persons, subsidiaries);
        Ok(self.install(graph).await)
    }

    async fn fetch_subsidiary(
        &self,
        credential: &Credential,
        id: CompanyId,
    ) -> EngineResult<Option<SubsidiarySnapshot>> {
        let company = match self.store.fetch_company(credential, id).await {
            Ok(company) => company,
            Err(PersistenceError::NotFound { .. }) => {
                tracing::warn!(company_id = %id, "Shareholding company not found, skipping");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let persons = self.store.fetch_persons_by_company(credential, id).await?;
        Ok(Some(SubsidiarySnapshot {
            id,
            name: company.name,
            persons,
        }))
    }

    pub async fn snapshot(&self) -> EngineResult<Arc<OwnershipGraph>> {
        self.snapshot
            .read()
            .await
            .clone()
            .ok_or(EngineError::NotLoaded)
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Validate and persist one command. Bulk allocations are routed to
    /// [`Self::execute_bulk`].
    pub async fn execute(&self, command: Command) -> EngineResult<Arc<OwnershipGraph>> {
        if let Command::BulkAllocate { changes } = command {
            return self.execute_bulk(changes).await;
        }

        let credential = self.credential().await?;
        let _guard = self.writes.lock().await;
        let graph = self.snapshot().await?;

        let outcome = MutationCoordinator::apply(&graph, &command)?;
        let stored = self
            .store
            .update_company(&credential, outcome.graph.company())
            .await
            .map_err(|e| {
                tracing::warn!(
                    company_id = %graph.company_id(),
                    command = command.name(),
                    error = %e,
                    "Write failed, keeping last persisted snapshot"
                );
                EngineError::from(e)
            })?;

        self.badges.invalidate_client(stored.client_id);
        tracing::info!(
            company_id = %stored.id,
            command = command.name(),
            version = stored.version,
            "Committed change"
        );
        Ok(self.install(outcome.graph.with_company(stored)).await)
    }

    /// Validate a batch against the cumulative proposed state, then write it
    /// holder by holder, stopping at the first failure.
    pub async fn execute_bulk(
        &self,
        changes: Vec<AllocationChange>,
    ) -> EngineResult<Arc<OwnershipGraph>> {
        let credential = self.credential().await?;
        let _guard = self.writes.lock().await;
        let graph = self.snapshot().await?;

        let steps = MutationCoordinator::plan_bulk(&graph, &changes)?;
        let total = steps.len();
        let mut persisted: Option<Company> = None;
        let mut succeeded: Vec<HolderRef> = Vec::with_capacity(total);

        for step in steps {
            let mut document = step.company;
            document.version = persisted
                .as_ref()
                .map_or(graph.company().version, |c| c.version);

            match self.store.update_company(&credential, &document).await {
                Ok(stored) => {
                    succeeded.push(step.holder);
                    persisted = Some(stored);
                }
                Err(e) => {
                    tracing::warn!(
                        company_id = %graph.company_id(),
                        succeeded = succeeded.len(),
                        total,
                        failed = %step.holder,
                        error = %e,
                        "Bulk update stopped"
                    );
                    if let Some(stored) = persisted {
                        self.badges.invalidate_client(stored.client_id);
                        self.install(graph.with_company(stored)).await;
                    }
                    return Err(EngineError::PartialBulkFailure {
                        succeeded,
                        total,
                        failed: step.holder,
                        source: Box::new(e.into()),
                    });
                }
            }
        }

        let Some(stored) = persisted else {
            return Ok(graph);
        };
        self.badges.invalidate_client(stored.client_id);
        tracing::info!(
            company_id = %stored.id,
            holders = total,
            version = stored.version,
            "Committed bulk change"
        );
        Ok(self.install(graph.with_company(stored)).await)
    }

    /// Delete a person record. Refused while any company of the client still
    /// has a holding or entry for the person.
    pub async fn delete_person(&self, person_id: PersonId) -> EngineResult<()> {
        let credential = self.credential().await?;
        let _guard = self.writes.lock().await;
        let graph = self.snapshot().await?;

        let companies = self
            .store
            .fetch_client_companies(&credential, graph.company().client_id)
            .await?;
        MutationCoordinator::ensure_deletable(&companies, &HolderRef::Person(person_id))?;
        self.store.delete_person(&credential, person_id).await?;

        tracing::info!(person_id = %person_id, "Deleted person");
        self.badges.invalidate_client(graph.company().client_id);
        self.install(graph.without_person(person_id)).await;
        Ok(())
    }

    /// Delete a company record under the same rule as persons. Deleting the
    /// loaded company clears the snapshot.
    pub async fn delete_company(&self, company_id: CompanyId) -> EngineResult<()> {
        let credential = self.credential().await?;
        let _guard = self.writes.lock().await;
        let graph = self.snapshot().await?;

        let companies = self
            .store
            .fetch_client_companies(&credential, graph.company().client_id)
            .await?;
        MutationCoordinator::ensure_deletable(&companies, &HolderRef::Company(company_id))?;
        self.store.delete_company(&credential, company_id).await?;

        tracing::info!(company_id = %company_id, "Deleted company");
        self.badges.invalidate_client(graph.company().client_id);
        if company_id == graph.company_id() {
            *self.snapshot.write().await = None;
        }
        Ok(())
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub async fn ubo(&self) -> EngineResult<Option<UboSummary>> {
        Ok(UboDeterminer::determine(&*self.snapshot().await?))
    }

    pub async fn shareholder_view(&self) -> EngineResult<Vec<ShareholderRow>> {
        let graph = self.snapshot().await?;
        let ubo = UboDeterminer::determine(&graph);
        Ok(views::shareholder_list(&graph, ubo.as_ref()))
    }

    pub async fn representative_view(&self) -> EngineResult<Vec<RepresentativeRow>> {
        let graph = self.snapshot().await?;
        let ubo = UboDeterminer::determine(&graph);
        Ok(views::representative_list(&graph, ubo.as_ref()))
    }

    /// Person candidates followed by company candidates
    pub async fn candidates(&self, purpose: CandidatePurpose) -> EngineResult<Vec<Candidate>> {
        let credential = self.credential().await?;
        let graph = self.snapshot().await?;
        let companies = self
            .store
            .fetch_client_companies(&credential, graph.company().client_id)
            .await?;
        Ok(candidates_of(&graph, &companies, purpose))
    }

    /// Cross-company badges for the candidates of `purpose`.
    ///
    /// Returns `Ok(None)` when an identical fetch is already in flight, or
    /// when the result arrived after `scope` was dropped or the entry was
    /// invalidated.
    pub async fn relationship_badges(
        &self,
        purpose: CandidatePurpose,
        scope: &RequestScope,
    ) -> EngineResult<Option<Arc<RelationshipMap>>> {
        let graph = self.snapshot().await?;
        let key = badge_key(&graph, purpose);
        if let Some(cached) = self.badges.get(&key) {
            return Ok(Some(cached));
        }

        let credential = self.credential().await?;
        let Some(ticket) = self.badges.begin(key, scope) else {
            return Ok(None);
        };

        let companies = match self
            .store
            .fetch_client_companies(&credential, graph.company().client_id)
            .await
        {
            Ok(companies) => companies,
            Err(e) => {
                self.badges.fail(ticket);
                return Err(e.into());
            }
        };

        let holders: Vec<HolderRef> = candidates_of(&graph, &companies, purpose)
            .into_iter()
            .map(|c| c.holder)
            .collect();
        let map = CrossCompanyAggregator::badges(&companies, graph.company_id(), &holders);

        if self.badges.complete(ticket, map) {
            Ok(self.badges.get(&key))
        } else {
            Ok(None)
        }
    }

    /// Force the next badge fetch for `purpose` to go to the store
    pub async fn invalidate_badges(&self, purpose: CandidatePurpose) -> EngineResult<()> {
        let graph = self.snapshot().await?;
        self.badges.invalidate(&badge_key(&graph, purpose));
        Ok(())
    }

    pub async fn search(&self, query: &str, page: PageRequest) -> EngineResult<Page<SearchHit>> {
        let credential = self.credential().await?;
        Ok(self.store.search(&credential, query, page).await?)
    }
}

fn badge_key(graph: &OwnershipGraph, purpose: CandidatePurpose) -> (ClientId, BadgeScope) {
    (
        graph.company().client_id,
        BadgeScope {
            target: graph.company_id(),
            purpose,
        },
    )
}

fn candidates_of(
    graph: &OwnershipGraph,
    companies: &[Company],
    purpose: CandidatePurpose,
) -> Vec<Candidate> {
    let mut candidates = RelationshipResolver::person_candidates(graph, purpose);
    candidates.extend(RelationshipResolver::company_candidates(
        graph, companies, purpose,
    ));
    candidates
}
