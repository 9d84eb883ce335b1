//! Ultimate beneficial owner determination
//!
//! Ranks every holder of a company by ownership percentage. Per-class and
//! legacy percentage holdings are normalized to the same `Decimal` scale
//! before ranking.
//!
//! Tie-break order:
//! 1. Higher percentage
//! 2. Class priority: A, unclassified, B, C, General/Ordinary
//! 3. Display name, alphabetical
//! 4. Holder identity (keeps ranking total on identical names)

use std::cmp::Ordering;

use cap_table_types::{HolderRef, ShareHolding, ShareTotals, UboSummary};

use crate::graph::OwnershipGraph;

pub struct UboDeterminer;

impl UboDeterminer {
    /// The single largest holder, or `None` when nobody holds anything
    pub fn determine(graph: &OwnershipGraph) -> Option<UboSummary> {
        let ubo = Self::rank(graph.share_totals(), graph.holdings())
            .into_iter()
            .next();
        tracing::debug!(
            company_id = %graph.company_id(),
            ubo = ?ubo.as_ref().map(|u| u.holder),
            "Determined UBO"
        );
        ubo
    }

    /// Every non-zero holder, best first
    pub fn rank(totals: &ShareTotals, holdings: &[ShareHolding]) -> Vec<UboSummary> {
        let mut ranked: Vec<UboSummary> = holdings
            .iter()
            .filter(|h| !h.allocation.is_zero())
            .map(|h| UboSummary {
                holder: h.holder,
                name: h.holder_name.clone(),
                percentage: h.percent_of(totals),
                ranking_class: h.allocation.ranking_class(),
            })
            .filter(|s| s.percentage > rust_decimal::Decimal::ZERO)
            .collect();
        ranked.sort_by(compare);
        ranked
    }

    pub fn is_ubo(ubo: Option<&UboSummary>, holder: &HolderRef) -> bool {
        ubo.is_some_and(|u| &u.holder == holder)
    }
}

fn compare(left: &UboSummary, right: &UboSummary) -> Ordering {
    right
        .percentage
        .cmp(&left.percentage)
        .then_with(|| {
            left.ranking_class
                .tie_break_rank()
                .cmp(&right.ranking_class.tie_break_rank())
        })
        .then_with(|| left.name.cmp(&right.name))
        .then_with(|| left.holder.cmp(&right.holder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_table_types::{
        ClientId, Company, CompanyId, PersonId, ShareAllocation, ShareClass, ShareCounts,
    };
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn person() -> HolderRef {
        HolderRef::Person(PersonId::new())
    }

    fn legacy(holdings: Vec<ShareHolding>) -> OwnershipGraph {
        let mut company = Company::new(ClientId::new(), "X", ShareTotals::LegacyPercentage);
        company.holdings = holdings;
        OwnershipGraph::new(company, vec![], vec![])
    }

    #[test]
    fn largest_percentage_wins() {
        let a = person();
        let b = HolderRef::Company(CompanyId::new());
        let graph = legacy(vec![
            ShareHolding::new(
                a,
                "Person A",
                ShareAllocation::percentage(Decimal::from(40), ShareClass::General),
            ),
            ShareHolding::new(
                b,
                "Company B",
                ShareAllocation::percentage(Decimal::from(35), ShareClass::A),
            ),
        ]);

        let ubo = UboDeterminer::determine(&graph).unwrap();
        assert_eq!(ubo.holder, a);
        assert_eq!(ubo.percentage, Decimal::from(40));
    }

    #[test]
    fn tie_prefers_class_a_then_name() {
        let general = person();
        let class_a = person();
        let also_a = person();
        let graph = legacy(vec![
            ShareHolding::new(
                general,
                "Aaron",
                ShareAllocation::percentage(Decimal::from(30), ShareClass::General),
            ),
            ShareHolding::new(
                also_a,
                "Zed",
                ShareAllocation::percentage(Decimal::from(30), ShareClass::A),
            ),
            ShareHolding::new(
                class_a,
                "Mia",
                ShareAllocation::percentage(Decimal::from(30), ShareClass::A),
            ),
        ]);

        let ranked = UboDeterminer::rank(graph.share_totals(), graph.holdings());
        let names: Vec<_> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Mia", "Zed", "Aaron"]);
    }

    #[test]
    fn unclassified_outranks_class_b() {
        let graph = legacy(vec![
            ShareHolding::new(
                person(),
                "B holder",
                ShareAllocation::percentage(Decimal::from(10), ShareClass::B),
            ),
            ShareHolding::new(
                person(),
                "U holder",
                ShareAllocation::percentage(Decimal::from(10), ShareClass::Unclassified),
            ),
        ]);
        assert_eq!(UboDeterminer::determine(&graph).unwrap().name, "U holder");
    }

    #[test]
    fn empty_or_zero_holdings_have_no_ubo() {
        let graph = legacy(vec![ShareHolding::new(
            person(),
            "Zero",
            ShareAllocation::percentage(Decimal::ZERO, ShareClass::A),
        )]);
        assert!(UboDeterminer::determine(&graph).is_none());
        assert!(UboDeterminer::determine(&legacy(vec![])).is_none());
    }

    #[test]
    fn per_class_percentages_span_all_classes() {
        let mut company = Company::new(
            ClientId::new(),
            "X",
            ShareTotals::per_class(
                ShareCounts::new()
                    .with(ShareClass::A, 500)
                    .with(ShareClass::B, 500),
            ),
        );
        let big_b = person();
        company.holdings.push(ShareHolding::new(
            big_b,
            "Bea",
            ShareAllocation::classes(ShareCounts::new().with(ShareClass::B, 450)),
        ));
        company.holdings.push(ShareHolding::new(
            person(),
            "Al",
            ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, 300)),
        ));
        let graph = OwnershipGraph::new(company, vec![], vec![]);

        let ubo = UboDeterminer::determine(&graph).unwrap();
        assert_eq!(ubo.holder, big_b);
        assert_eq!(ubo.percentage, Decimal::from(45));
    }

    proptest! {
        #[test]
        fn ranking_is_order_independent(
            percents in prop::collection::vec((0u32..=100, 0usize..4), 1..8),
            rotate in 0usize..8,
        ) {
            let classes = [
                ShareClass::A,
                ShareClass::B,
                ShareClass::General,
                ShareClass::Unclassified,
            ];
            let holdings: Vec<ShareHolding> = percents
                .iter()
                .enumerate()
                .map(|(i, (pct, class))| {
                    ShareHolding::new(
                        HolderRef::Person(PersonId::new()),
                        format!("holder-{}", i % 3),
                        ShareAllocation::percentage(Decimal::from(*pct), classes[*class]),
                    )
                })
                .collect();

            let mut rotated = holdings.clone();
            let len = rotated.len();
            rotated.rotate_left(rotate % len);

            let first = UboDeterminer::rank(&ShareTotals::LegacyPercentage, &holdings);
            let second = UboDeterminer::rank(&ShareTotals::LegacyPercentage, &rotated);
            prop_assert_eq!(first.first(), second.first());
            if let Some(top) = first.first() {
                prop_assert!(first.iter().all(|s| s.percentage <= top.percentage));
            }
        }
    }
}
