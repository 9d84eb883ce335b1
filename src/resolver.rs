//! Candidate resolution
//!
//! Builds the deduplicated list of persons and companies that can be added
//! to a target company as shareholders or representatives.
//!
//! Persons are merged from three paths, in precedence order:
//!
//! 1. `Direct` - filed under the target company
//! 2. `Subsidiary` - filed under a company holding shares in the target
//! 3. `Shareholder` - recorded as a shareholder of the target
//!
//! The first path that reaches an identity wins, and with it the source
//! company shown next to the name. Companies are resolved one level deep
//! only; a subsidiary's own shareholders are never expanded.

use std::collections::HashSet;

use cap_table_types::{Candidate, CandidateSource, Company, CompanyId, HolderRef, RoleSet};

use crate::graph::OwnershipGraph;

/// What the candidate list is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidatePurpose {
    /// Excludes holders that already carry a governance role in the target
    Representative,
    /// Excludes holders that already hold shares in the target
    Shareholder,
    /// No eligibility filter
    Any,
}

impl CandidatePurpose {
    fn admits(&self, roles: &RoleSet, has_holding: bool) -> bool {
        match self {
            Self::Representative => !roles.has_governance_role(),
            Self::Shareholder => !has_holding,
            Self::Any => true,
        }
    }
}

pub struct RelationshipResolver;

impl RelationshipResolver {
    /// Person candidates for the target company
    pub fn person_candidates(graph: &OwnershipGraph, purpose: CandidatePurpose) -> Vec<Candidate> {
        let target = graph.company();
        let mut merged = CandidateSet::default();

        for person in graph.persons() {
            merged.offer(Candidate {
                holder: person.holder(),
                name: person.name.clone(),
                source: CandidateSource::Direct,
                source_company_id: Some(target.id),
                source_company_name: Some(target.name.clone()),
                roles: RoleSet::new(),
            });
        }

        for subsidiary in graph.subsidiaries() {
            for person in &subsidiary.persons {
                merged.offer(Candidate {
                    holder: person.holder(),
                    name: person.name.clone(),
                    source: CandidateSource::Subsidiary,
                    source_company_id: Some(subsidiary.id),
                    source_company_name: Some(subsidiary.name.clone()),
                    roles: RoleSet::new(),
                });
            }
        }

        for holding in graph.holdings() {
            if holding.holder.as_person().is_none() {
                continue;
            }
            merged.offer(Candidate {
                holder: holding.holder,
                name: holding.holder_name.clone(),
                source: CandidateSource::Shareholder,
                source_company_id: Some(target.id),
                source_company_name: Some(target.name.clone()),
                roles: RoleSet::new(),
            });
        }

        let candidates = merged.finish(graph, purpose);
        tracing::debug!(
            company_id = %target.id,
            ?purpose,
            candidates = candidates.len(),
            "Resolved person candidates"
        );
        candidates
    }

    /// Company candidates for the target company.
    ///
    /// Companies already holding shares in the target come first, then the
    /// rest of the client's companies. The target never lists itself.
    pub fn company_candidates(
        graph: &OwnershipGraph,
        client_companies: &[Company],
        purpose: CandidatePurpose,
    ) -> Vec<Candidate> {
        let target_id = graph.company_id();
        let mut merged = CandidateSet::default();

        for holding in graph.holdings() {
            let Some(company_id) = holding.holder.as_company() else {
                continue;
            };
            if company_id == target_id {
                continue;
            }
            merged.offer(Candidate {
                holder: holding.holder,
                name: holding.holder_name.clone(),
                source: CandidateSource::Shareholder,
                source_company_id: None,
                source_company_name: None,
                roles: RoleSet::new(),
            });
        }

        for company in client_companies.iter().filter(|c| c.id != target_id) {
            merged.offer(Candidate {
                holder: company.holder(),
                name: company.name.clone(),
                source: CandidateSource::ClientCompany,
                source_company_id: None,
                source_company_name: None,
                roles: RoleSet::new(),
            });
        }

        let candidates = merged.finish(graph, purpose);
        tracing::debug!(
            company_id = %target_id,
            ?purpose,
            candidates = candidates.len(),
            "Resolved company candidates"
        );
        candidates
    }

    /// Ids of the companies one level below the target (its company holders)
    pub fn subsidiary_ids(company: &Company) -> Vec<CompanyId> {
        let mut seen = HashSet::new();
        company
            .shareholding_companies()
            .filter(|id| *id != company.id && seen.insert(*id))
            .collect()
    }
}

/// First-come dedup keyed by holder identity
#[derive(Default)]
struct CandidateSet {
    seen: HashSet<HolderRef>,
    items: Vec<Candidate>,
}

impl CandidateSet {
    fn offer(&mut self, candidate: Candidate) {
        if self.seen.insert(candidate.holder) {
            self.items.push(candidate);
        }
    }

    fn finish(self, graph: &OwnershipGraph, purpose: CandidatePurpose) -> Vec<Candidate> {
        self.items
            .into_iter()
            .filter_map(|mut candidate| {
                let roles = graph.roles_of(&candidate.holder);
                let has_holding = graph.holding(&candidate.holder).is_some();
                if !purpose.admits(&roles, has_holding) {
                    return None;
                }
                candidate.roles = roles;
                Some(candidate)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubsidiarySnapshot;
    use cap_table_types::{
        ClientId, Person, RepresentationEntry, Role, ShareAllocation, ShareClass, ShareCounts,
        ShareHolding, ShareTotals,
    };

    fn class_a(shares: u64) -> ShareAllocation {
        ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, shares))
    }

    fn target(client: ClientId) -> Company {
        Company::new(
            client,
            "Target Co",
            ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, 1000)),
        )
    }

    #[test]
    fn person_reached_by_every_path_is_listed_once_as_direct() {
        let client = ClientId::new();
        let mut x = target(client);
        let y = Company::new(client, "Sub Y", ShareTotals::default());

        let ann = Person::new("Ann")
            .filed_under(x.id)
            .with_roles(RoleSet::shareholder());
        x.holdings
            .push(ShareHolding::new(ann.holder(), "Ann", class_a(100)));
        x.holdings
            .push(ShareHolding::new(y.holder(), "Sub Y", class_a(200)));

        let subsidiary = SubsidiarySnapshot {
            id: y.id,
            name: y.name.clone(),
            persons: vec![ann.clone()],
        };
        let graph = OwnershipGraph::new(x.clone(), vec![ann.clone()], vec![subsidiary]);

        let candidates = RelationshipResolver::person_candidates(&graph, CandidatePurpose::Any);
        let hits: Vec<_> = candidates
            .iter()
            .filter(|c| c.holder == ann.holder())
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, CandidateSource::Direct);
        assert_eq!(hits[0].source_company_name.as_deref(), Some("Target Co"));
    }

    #[test]
    fn first_subsidiary_name_is_retained() {
        let client = ClientId::new();
        let x = target(client);
        let bob = Person::new("Bob");
        let first = SubsidiarySnapshot {
            id: CompanyId::new(),
            name: "First Sub".into(),
            persons: vec![bob.clone()],
        };
        let second = SubsidiarySnapshot {
            id: CompanyId::new(),
            name: "Second Sub".into(),
            persons: vec![bob.clone()],
        };
        let graph = OwnershipGraph::new(x, vec![], vec![first, second]);

        let candidates = RelationshipResolver::person_candidates(&graph, CandidatePurpose::Any);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].source, CandidateSource::Subsidiary);
        assert_eq!(candidates[0].source_company_name.as_deref(), Some("First Sub"));
    }

    #[test]
    fn representative_list_excludes_existing_governance_roles() {
        let client = ClientId::new();
        let mut x = target(client);
        let director = Person::new("Dana").filed_under(x.id);
        let holder_only = Person::new("Hal").filed_under(x.id);
        let blank = Person::new("Bea").filed_under(x.id);
        x.representation.push(RepresentationEntry::new(
            director.holder(),
            "Dana",
            [Role::Director].into_iter().collect(),
        ));
        x.holdings
            .push(ShareHolding::new(holder_only.holder(), "Hal", class_a(5)));

        let graph = OwnershipGraph::new(
            x,
            vec![director, holder_only.clone(), blank.clone()],
            vec![],
        );
        let names: Vec<_> = RelationshipResolver::person_candidates(
            &graph,
            CandidatePurpose::Representative,
        )
        .into_iter()
        .map(|c| c.name)
        .collect();
        assert_eq!(names, vec!["Hal".to_string(), "Bea".to_string()]);
    }

    #[test]
    fn company_candidates_exclude_target_and_stay_one_level() {
        let client = ClientId::new();
        let mut x = target(client);
        let holder_co = Company::new(client, "Holder Co", ShareTotals::default());
        let mut sibling = Company::new(client, "Sibling Co", ShareTotals::default());
        let deep = Company::new(client, "Deep Co", ShareTotals::default());
        sibling
            .holdings
            .push(ShareHolding::new(deep.holder(), "Deep Co", class_a(1)));
        x.holdings
            .push(ShareHolding::new(holder_co.holder(), "Holder Co", class_a(10)));

        let all = vec![x.clone(), holder_co.clone(), sibling.clone()];
        let graph = OwnershipGraph::new(x.clone(), vec![], vec![]);
        let candidates =
            RelationshipResolver::company_candidates(&graph, &all, CandidatePurpose::Any);

        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Holder Co", "Sibling Co"]);
        assert_eq!(candidates[0].source, CandidateSource::Shareholder);
        assert!(!candidates.iter().any(|c| c.holder == x.holder()));
    }

    #[test]
    fn subsidiary_ids_skip_self_and_duplicates() {
        let client = ClientId::new();
        let mut x = target(client);
        let sub = CompanyId::new();
        x.holdings.push(ShareHolding::new(
            HolderRef::Company(sub),
            "Sub",
            class_a(1),
        ));
        x.holdings.push(ShareHolding::new(x.holder(), "Self", class_a(1)));
        assert_eq!(RelationshipResolver::subsidiary_ids(&x), vec![sub]);
    }
}
