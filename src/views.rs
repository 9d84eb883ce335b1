//! Presentation views over an ownership snapshot
//!
//! Both lists carry the UBO flag, since the same holder can show up as a
//! shareholder and as a representative.

use cap_table_types::{
    ClassShare, RepresentativeRow, ShareAllocation, ShareholderRow, UboSummary,
};

use crate::graph::OwnershipGraph;
use crate::ubo::UboDeterminer;

/// Display precision for percentages
pub const PERCENT_DP: u32 = 2;

/// Every holder with per-class shares and percentage, in document order
pub fn shareholder_list(graph: &OwnershipGraph, ubo: Option<&UboSummary>) -> Vec<ShareholderRow> {
    graph
        .shareholders()
        .into_iter()
        .map(|position| {
            let (classes, percentage_class) = match &position.allocation {
                ShareAllocation::Percentage { class, .. } => (Vec::new(), Some(*class)),
                other => (
                    other
                        .counts()
                        .iter()
                        .map(|(class, shares)| ClassShare { class, shares })
                        .collect(),
                    None,
                ),
            };
            ShareholderRow {
                holder: position.holder,
                kind: position.holder.kind(),
                name: position.name,
                mode: position.allocation.mode(),
                classes,
                percentage_class,
                percentage: position.percentage.round_dp(PERCENT_DP),
                is_ubo: UboDeterminer::is_ubo(ubo, &position.holder),
            }
        })
        .collect()
}

/// Holders with at least one governance role
pub fn representative_list(
    graph: &OwnershipGraph,
    ubo: Option<&UboSummary>,
) -> Vec<RepresentativeRow> {
    graph
        .representatives()
        .into_iter()
        .map(|entry| {
            let roles = entry.roles.governance();
            let source_company_name = entry
                .source_company_id
                .and_then(|id| graph.subsidiary(id))
                .map(|s| s.name.clone());
            RepresentativeRow {
                holder: entry.representative,
                kind: entry.representative.kind(),
                name: entry.representative_name.clone(),
                role_labels: roles.labels().into_iter().map(str::to_string).collect(),
                roles,
                is_shareholder: graph.holding(&entry.representative).is_some(),
                source_company_id: entry.source_company_id,
                source_company_name,
                is_ubo: UboDeterminer::is_ubo(ubo, &entry.representative),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubsidiarySnapshot;
    use cap_table_types::{
        ClientId, Company, HolderRef, PersonId, RepresentationEntry, Role, RoleSet, ShareClass,
        ShareCounts, ShareHolding, ShareTotals,
    };
    use rust_decimal::Decimal;

    #[test]
    fn ubo_flag_appears_in_both_lists() {
        let mut company = Company::new(
            ClientId::new(),
            "X",
            ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, 300)),
        );
        let sub = SubsidiarySnapshot {
            id: cap_table_types::CompanyId::new(),
            name: "Sub Co".into(),
            persons: vec![],
        };
        let ann = HolderRef::Person(PersonId::new());
        let bob = HolderRef::Person(PersonId::new());
        company.holdings.push(ShareHolding::new(
            ann,
            "Ann",
            ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, 200)),
        ));
        company.holdings.push(ShareHolding::new(
            bob,
            "Bob",
            ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, 100)),
        ));
        company.representation.push(
            RepresentationEntry::new(
                ann,
                "Ann",
                [Role::Shareholder, Role::Director].into_iter().collect(),
            )
            .from_subsidiary(sub.id),
        );
        company
            .representation
            .push(RepresentationEntry::new(bob, "Bob", RoleSet::shareholder()));

        let graph = OwnershipGraph::new(company, vec![], vec![sub]);
        let ubo = UboDeterminer::determine(&graph);

        let shareholders = shareholder_list(&graph, ubo.as_ref());
        assert!(shareholders[0].is_ubo);
        assert!(!shareholders[1].is_ubo);
        assert_eq!(shareholders[1].percentage, Decimal::new(3333, 2));

        let reps = representative_list(&graph, ubo.as_ref());
        assert_eq!(reps.len(), 1);
        assert!(reps[0].is_ubo);
        assert!(reps[0].is_shareholder);
        assert_eq!(reps[0].role_labels, vec!["Director".to_string()]);
        assert_eq!(reps[0].source_company_name.as_deref(), Some("Sub Co"));
    }
}
