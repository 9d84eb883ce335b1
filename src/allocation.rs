//! Share allocation validation
//!
//! Checks a proposed change (one holder or a whole batch) against the target
//! company's authorized totals. Proposals are validated against the
//! *cumulative* proposed state: every holder named in the batch is removed
//! from the existing allocation and the batch's values are summed before any
//! class is compared with what is available.
//!
//! ## Schemes
//!
//! - Per-class companies: `available[class] = authorized[class] - allocated[class]`
//!   where `allocated` excludes every holder under edit. A class fails when the
//!   batch requests more than is available.
//! - Legacy percentage companies: the sum of all percentages must not exceed
//!   100.
//!
//! A proposal in the wrong scheme for its company is rejected rather than
//! converted.

use std::collections::{BTreeSet, HashSet};

use cap_table_types::{
    AllocationDraft, AllocationMode, HolderRef, ShareAllocation, ShareClass, ShareCounts,
    ShareHolding, ShareTotals,
};
use rust_decimal::Decimal;

use crate::error::{ValidationError, ValidationErrors, ValidationResult};

const PER_CLASS: &str = "per-class";
const LEGACY_PERCENTAGE: &str = "legacy percentage";

/// Intended allocation for one holder. `None` removes the holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedAllocation {
    pub holder: HolderRef,
    pub allocation: Option<ShareAllocation>,
}

impl ProposedAllocation {
    pub fn set(holder: HolderRef, allocation: ShareAllocation) -> Self {
        Self {
            holder,
            allocation: (!allocation.is_zero()).then_some(allocation),
        }
    }

    pub fn remove(holder: HolderRef) -> Self {
        Self {
            holder,
            allocation: None,
        }
    }
}

/// Allocation state after a successful validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationSummary {
    /// Allocated per class including the proposal
    pub allocated: ShareCounts,
    /// Still available per class after the proposal
    pub remaining: ShareCounts,
    /// Total percentage after the proposal (legacy companies only)
    pub total_percentage: Option<Decimal>,
}

pub struct ShareAllocationValidator;

impl ShareAllocationValidator {
    /// Validate a batch of proposals against a company's totals and holdings
    pub fn validate(
        totals: &ShareTotals,
        existing: &[ShareHolding],
        proposals: &[ProposedAllocation],
    ) -> ValidationResult<AllocationSummary> {
        let mut errors = ValidationErrors::new();

        let mut edited: HashSet<HolderRef> = HashSet::new();
        for proposal in proposals {
            if !edited.insert(proposal.holder) {
                errors.push(ValidationError::DuplicateHolder {
                    holder: proposal.holder,
                });
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let summary = match totals {
            ShareTotals::PerClass { authorized } => {
                Self::validate_per_class(authorized, existing, proposals, &edited, &mut errors)
            }
            ShareTotals::LegacyPercentage => {
                Self::validate_percentage(existing, proposals, &edited, &mut errors)
            }
        };

        if errors.is_empty() {
            tracing::debug!(
                proposals = proposals.len(),
                legacy = totals.is_legacy(),
                "Allocation batch accepted"
            );
        } else {
            tracing::debug!(
                proposals = proposals.len(),
                errors = errors.len(),
                "Allocation batch rejected"
            );
        }
        errors.into_result(summary)
    }

    /// Shares still available per class if `excluding` gave up its holding
    pub fn available(
        totals: &ShareTotals,
        existing: &[ShareHolding],
        excluding: Option<&HolderRef>,
    ) -> ShareCounts {
        let ShareTotals::PerClass { authorized } = totals else {
            return ShareCounts::new();
        };
        let allocated = allocated_excluding(existing, |h| Some(h) == excluding);
        authorized
            .iter()
            .map(|(class, total)| (class, total.saturating_sub(allocated.get(class))))
            .collect()
    }

    /// Percentage still available on a legacy company
    pub fn available_percentage(
        existing: &[ShareHolding],
        excluding: Option<&HolderRef>,
    ) -> Decimal {
        let used: Decimal = existing
            .iter()
            .filter(|h| Some(&h.holder) != excluding)
            .filter_map(|h| match &h.allocation {
                ShareAllocation::Percentage { percent, .. } => Some(*percent),
                _ => None,
            })
            .sum();
        (Decimal::ONE_HUNDRED - used).max(Decimal::ZERO)
    }

    /// Turn an edited draft into a proposal for `holder`
    pub fn proposal_from_draft(
        holder: HolderRef,
        draft: &AllocationDraft,
    ) -> Result<ProposedAllocation, ValidationError> {
        let allocation = draft
            .to_allocation()
            .map_err(|_| ValidationError::ModeMixing { holder })?;
        Ok(ProposedAllocation { holder, allocation })
    }

    fn validate_per_class(
        authorized: &ShareCounts,
        existing: &[ShareHolding],
        proposals: &[ProposedAllocation],
        edited: &HashSet<HolderRef>,
        errors: &mut ValidationErrors,
    ) -> AllocationSummary {
        let allocated = allocated_excluding(existing, |h| edited.contains(h));

        let mut proposed = ShareCounts::new();
        for proposal in proposals {
            let Some(allocation) = &proposal.allocation else {
                continue;
            };
            if allocation.mode() == AllocationMode::Percentage {
                errors.push(ValidationError::SchemeMismatch {
                    holder: proposal.holder,
                    expected: PER_CLASS,
                    found: LEGACY_PERCENTAGE,
                });
                continue;
            }
            proposed.add_all(&allocation.counts());
        }

        let classes: BTreeSet<ShareClass> = proposed.classes().collect();
        for class in classes {
            let requested = proposed.get(class);
            let available = authorized.get(class).saturating_sub(allocated.get(class));
            if requested > available {
                errors.push(ValidationError::OverAllocation {
                    class,
                    requested,
                    available,
                    exceeded_by: requested - available,
                });
            }
        }

        let mut after = allocated;
        after.add_all(&proposed);
        let remaining = authorized
            .iter()
            .map(|(class, total)| (class, total.saturating_sub(after.get(class))))
            .collect();

        AllocationSummary {
            allocated: after,
            remaining,
            total_percentage: None,
        }
    }

    fn validate_percentage(
        existing: &[ShareHolding],
        proposals: &[ProposedAllocation],
        edited: &HashSet<HolderRef>,
        errors: &mut ValidationErrors,
    ) -> AllocationSummary {
        let mut total: Decimal = existing
            .iter()
            .filter(|h| !edited.contains(&h.holder))
            .filter_map(|h| match &h.allocation {
                ShareAllocation::Percentage { percent, .. } => Some(*percent),
                _ => None,
            })
            .sum();

        for proposal in proposals {
            let Some(allocation) = &proposal.allocation else {
                continue;
            };
            match allocation {
                ShareAllocation::Percentage { percent, .. } => {
                    if percent.is_sign_negative() || *percent > Decimal::ONE_HUNDRED {
                        errors.push(ValidationError::PercentageOutOfRange {
                            holder: proposal.holder,
                        });
                        continue;
                    }
                    total += *percent;
                }
                other => errors.push(ValidationError::SchemeMismatch {
                    holder: proposal.holder,
                    expected: LEGACY_PERCENTAGE,
                    found: mode_label(other.mode()),
                }),
            }
        }

        if total > Decimal::ONE_HUNDRED {
            errors.push(ValidationError::PercentageExceeded {
                total,
                exceeded_by: total - Decimal::ONE_HUNDRED,
            });
        }

        AllocationSummary {
            allocated: ShareCounts::new(),
            remaining: ShareCounts::new(),
            total_percentage: Some(total),
        }
    }
}

fn allocated_excluding<F>(existing: &[ShareHolding], skip: F) -> ShareCounts
where
    F: Fn(&HolderRef) -> bool,
{
    let mut allocated = ShareCounts::new();
    for holding in existing.iter().filter(|h| !skip(&h.holder)) {
        if holding.allocation.mode() == AllocationMode::Percentage {
            tracing::warn!(
                holder = %holding.holder,
                "Ignoring percentage holding on a per-class company"
            );
            continue;
        }
        allocated.add_all(&holding.allocation.counts());
    }
    allocated
}

fn mode_label(mode: AllocationMode) -> &'static str {
    match mode {
        AllocationMode::Class => "class",
        AllocationMode::Ordinary => "ordinary",
        AllocationMode::Percentage => LEGACY_PERCENTAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_table_types::{CompanyId, PersonId};
    use proptest::prelude::*;

    fn person() -> HolderRef {
        HolderRef::Person(PersonId::new())
    }

    fn class_a(shares: u64) -> ShareAllocation {
        ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, shares))
    }

    fn totals_a(authorized: u64) -> ShareTotals {
        ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, authorized))
    }

    #[test]
    fn bulk_batch_is_checked_cumulatively() {
        let p1 = person();
        let existing = vec![ShareHolding::new(p1, "P1", class_a(400))];
        let batch = vec![
            ProposedAllocation::set(person(), class_a(400)),
            ProposedAllocation::set(person(), class_a(300)),
        ];

        let errors = ShareAllocationValidator::validate(&totals_a(1000), &existing, &batch)
            .unwrap_err();
        assert_eq!(
            errors.errors,
            vec![ValidationError::OverAllocation {
                class: ShareClass::A,
                requested: 700,
                available: 600,
                exceeded_by: 100,
            }]
        );
    }

    #[test]
    fn each_proposal_alone_fits() {
        let existing = vec![ShareHolding::new(person(), "P1", class_a(400))];
        for shares in [400, 300] {
            let batch = vec![ProposedAllocation::set(person(), class_a(shares))];
            assert!(ShareAllocationValidator::validate(&totals_a(1000), &existing, &batch).is_ok());
        }
    }

    #[test]
    fn edited_holder_is_excluded_from_allocated() {
        let p1 = person();
        let existing = vec![ShareHolding::new(p1, "P1", class_a(900))];
        let batch = vec![ProposedAllocation::set(p1, class_a(1000))];

        let summary =
            ShareAllocationValidator::validate(&totals_a(1000), &existing, &batch).unwrap();
        assert_eq!(summary.remaining.get(ShareClass::A), 0);
    }

    #[test]
    fn unauthorized_class_has_nothing_available() {
        let batch = vec![ProposedAllocation::set(
            person(),
            ShareAllocation::classes(ShareCounts::new().with(ShareClass::B, 1)),
        )];
        let errors = ShareAllocationValidator::validate(&totals_a(1000), &[], &batch).unwrap_err();
        assert!(matches!(
            errors.errors[0],
            ValidationError::OverAllocation {
                class: ShareClass::B,
                available: 0,
                ..
            }
        ));
    }

    #[test]
    fn zero_value_means_no_holding() {
        let proposal = ProposedAllocation::set(person(), class_a(0));
        assert_eq!(proposal.allocation, None);
        assert!(ShareAllocationValidator::validate(&totals_a(0), &[], &[proposal]).is_ok());
    }

    #[test]
    fn ordinary_mode_checks_ordinary_total() {
        let totals = ShareTotals::per_class(ShareCounts::new().with(ShareClass::Ordinary, 100));
        let batch = vec![ProposedAllocation::set(person(), ShareAllocation::ordinary(101))];
        let errors = ShareAllocationValidator::validate(&totals, &[], &batch).unwrap_err();
        assert!(matches!(
            errors.errors[0],
            ValidationError::OverAllocation {
                class: ShareClass::Ordinary,
                exceeded_by: 1,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_holder_in_batch_is_rejected() {
        let p = person();
        let batch = vec![
            ProposedAllocation::set(p, class_a(1)),
            ProposedAllocation::set(p, class_a(2)),
        ];
        let errors = ShareAllocationValidator::validate(&totals_a(10), &[], &batch).unwrap_err();
        assert_eq!(errors.errors, vec![ValidationError::DuplicateHolder { holder: p }]);
    }

    #[test]
    fn legacy_company_sums_percentages() {
        let existing = vec![ShareHolding::new(
            person(),
            "P1",
            ShareAllocation::percentage(Decimal::from(60), ShareClass::General),
        )];
        let batch = vec![ProposedAllocation::set(
            HolderRef::Company(CompanyId::new()),
            ShareAllocation::percentage(Decimal::from(45), ShareClass::General),
        )];
        let errors =
            ShareAllocationValidator::validate(&ShareTotals::LegacyPercentage, &existing, &batch)
                .unwrap_err();
        assert_eq!(
            errors.errors,
            vec![ValidationError::PercentageExceeded {
                total: Decimal::from(105),
                exceeded_by: Decimal::from(5),
            }]
        );
    }

    #[test]
    fn schemes_are_never_mixed() {
        let p = person();
        let on_legacy = ShareAllocationValidator::validate(
            &ShareTotals::LegacyPercentage,
            &[],
            &[ProposedAllocation::set(p, class_a(1))],
        )
        .unwrap_err();
        assert!(matches!(on_legacy.errors[0], ValidationError::SchemeMismatch { .. }));

        let on_per_class = ShareAllocationValidator::validate(
            &totals_a(10),
            &[],
            &[ProposedAllocation::set(
                p,
                ShareAllocation::percentage(Decimal::from(5), ShareClass::A),
            )],
        )
        .unwrap_err();
        assert!(matches!(on_per_class.errors[0], ValidationError::SchemeMismatch { .. }));
    }

    #[test]
    fn mixed_draft_reports_mode_mixing() {
        let p = person();
        let draft = AllocationDraft {
            a: 5,
            ordinary: 5,
            ..AllocationDraft::default()
        };
        assert_eq!(
            ShareAllocationValidator::proposal_from_draft(p, &draft),
            Err(ValidationError::ModeMixing { holder: p })
        );
    }

    #[test]
    fn available_reports_remaining_per_class() {
        let p1 = person();
        let existing = vec![ShareHolding::new(p1, "P1", class_a(400))];
        let available = ShareAllocationValidator::available(&totals_a(1000), &existing, None);
        assert_eq!(available.get(ShareClass::A), 600);
        let excluding = ShareAllocationValidator::available(&totals_a(1000), &existing, Some(&p1));
        assert_eq!(excluding.get(ShareClass::A), 1000);
    }

    proptest! {
        #[test]
        fn rejects_exactly_when_cumulative_exceeds_available(
            authorized in 0u64..2_000,
            existing_shares in proptest::collection::vec(0u64..500, 0..4),
            proposed_shares in proptest::collection::vec(0u64..800, 1..4),
        ) {
            let existing: Vec<ShareHolding> = existing_shares
                .iter()
                .map(|s| ShareHolding::new(person(), "existing", class_a(*s)))
                .filter(|h| !h.allocation.is_zero())
                .collect();
            let batch: Vec<ProposedAllocation> = proposed_shares
                .iter()
                .map(|s| ProposedAllocation::set(person(), class_a(*s)))
                .collect();

            let allocated: u64 = existing_shares.iter().sum();
            let requested: u64 = proposed_shares.iter().sum();
            let available = authorized.saturating_sub(allocated);

            let result =
                ShareAllocationValidator::validate(&totals_a(authorized), &existing, &batch);
            if requested > available {
                let errors = result.unwrap_err();
                prop_assert_eq!(
                    errors.errors[0].key(),
                    cap_table_types::ErrorKey::Class { class: ShareClass::A }
                );
            } else {
                prop_assert!(result.is_ok());
            }
        }
    }
}
