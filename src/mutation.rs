//! Mutation coordination
//!
//! Pure `(snapshot, command) -> new snapshot | validation errors`. Nothing in
//! here performs I/O; the async service persists the resulting company
//! document and swaps the snapshot.
//!
//! Every command is all-or-nothing: either the whole change validates and a
//! new snapshot is returned, or the input snapshot is left untouched and the
//! collected errors come back.

use serde::{Deserialize, Serialize};

use cap_table_types::{
    AllocationDraft, Company, CompanyId, HolderRef, RepresentationEntry, Role, RoleSet,
    ShareAllocation, ShareHolding,
};

use crate::aggregator::CrossCompanyAggregator;
use crate::allocation::{AllocationSummary, ProposedAllocation, ShareAllocationValidator};
use crate::error::{EngineError, EngineResult, ValidationError, ValidationErrors, ValidationResult};
use crate::graph::OwnershipGraph;

// ============================================================================
// COMMANDS
// ============================================================================

/// New allocation value for one holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AllocationValue {
    /// A complete allocation
    Allocation(ShareAllocation),
    /// Editable form state; rejected when it mixes modes
    Draft(AllocationDraft),
    /// Drop the holding
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationChange {
    pub holder: HolderRef,
    /// Display name to record; falls back to the best known name
    #[serde(default)]
    pub name: Option<String>,
    pub value: AllocationValue,
}

impl AllocationChange {
    pub fn set(holder: HolderRef, name: impl Into<String>, allocation: ShareAllocation) -> Self {
        Self {
            holder,
            name: Some(name.into()),
            value: AllocationValue::Allocation(allocation),
        }
    }

    pub fn draft(holder: HolderRef, name: impl Into<String>, draft: AllocationDraft) -> Self {
        Self {
            holder,
            name: Some(name.into()),
            value: AllocationValue::Draft(draft),
        }
    }

    pub fn remove(holder: HolderRef) -> Self {
        Self {
            holder,
            name: None,
            value: AllocationValue::Remove,
        }
    }

    fn proposal(&self) -> Result<ProposedAllocation, ValidationError> {
        match &self.value {
            AllocationValue::Allocation(allocation) => {
                Ok(ProposedAllocation::set(self.holder, allocation.clone()))
            }
            AllocationValue::Draft(draft) => {
                ShareAllocationValidator::proposal_from_draft(self.holder, draft)
            }
            AllocationValue::Remove => Ok(ProposedAllocation::remove(self.holder)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Create, replace or (on zero) remove one holding
    SetAllocation(AllocationChange),
    /// Several holdings validated against the cumulative proposed state
    BulkAllocate { changes: Vec<AllocationChange> },
    /// Remove a holding outright
    RemoveHolding { holder: HolderRef },
    /// Add governance roles, creating the entry when needed
    GrantRoles {
        holder: HolderRef,
        #[serde(default)]
        name: Option<String>,
        roles: RoleSet,
        #[serde(default)]
        source_company_id: Option<CompanyId>,
    },
    /// Replace the governance roles of an existing or new entry
    SetRoles {
        holder: HolderRef,
        #[serde(default)]
        name: Option<String>,
        roles: RoleSet,
        #[serde(default)]
        source_company_id: Option<CompanyId>,
    },
    /// Drop one role; the entry goes when its last governance role does
    RevokeRole { holder: HolderRef, role: Role },
    /// Drop the representation entry, leaving any holding in place
    RemoveRepresentative { holder: HolderRef },
}

impl Command {
    /// Holders named by the command, in order
    pub fn holders(&self) -> Vec<HolderRef> {
        match self {
            Self::SetAllocation(change) => vec![change.holder],
            Self::BulkAllocate { changes } => changes.iter().map(|c| c.holder).collect(),
            Self::RemoveHolding { holder }
            | Self::GrantRoles { holder, .. }
            | Self::SetRoles { holder, .. }
            | Self::RevokeRole { holder, .. }
            | Self::RemoveRepresentative { holder } => vec![*holder],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetAllocation(_) => "set_allocation",
            Self::BulkAllocate { .. } => "bulk_allocate",
            Self::RemoveHolding { .. } => "remove_holding",
            Self::GrantRoles { .. } => "grant_roles",
            Self::SetRoles { .. } => "set_roles",
            Self::RevokeRole { .. } => "revoke_role",
            Self::RemoveRepresentative { .. } => "remove_representative",
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub graph: OwnershipGraph,
    /// Holders whose holding or entry changed
    pub touched: Vec<HolderRef>,
    /// Allocation state after an allocation command
    pub allocation: Option<AllocationSummary>,
}

/// One sequential write of a bulk change
#[derive(Debug, Clone)]
pub struct BulkStep {
    pub holder: HolderRef,
    /// Full company document with changes up to and including this one
    pub company: Company,
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct MutationCoordinator;

impl MutationCoordinator {
    /// Validate and apply `command` to a copy of `graph`
    pub fn apply(graph: &OwnershipGraph, command: &Command) -> ValidationResult<MutationOutcome> {
        let result = match command {
            Command::SetAllocation(change) => {
                Self::apply_allocations(graph, std::slice::from_ref(change))
            }
            Command::BulkAllocate { changes } => Self::apply_allocations(graph, changes),
            Command::RemoveHolding { holder } => Self::remove_holding(graph, holder),
            Command::GrantRoles {
                holder,
                name,
                roles,
                source_company_id,
            } => Self::write_roles(graph, holder, name.as_deref(), roles, *source_company_id, true),
            Command::SetRoles {
                holder,
                name,
                roles,
                source_company_id,
            } => Self::write_roles(
                graph,
                holder,
                name.as_deref(),
                roles,
                *source_company_id,
                false,
            ),
            Command::RevokeRole { holder, role } => Self::revoke_role(graph, holder, *role),
            Command::RemoveRepresentative { holder } => Self::remove_representative(graph, holder),
        };

        match &result {
            Ok(outcome) => tracing::debug!(
                company_id = %graph.company_id(),
                command = command.name(),
                touched = outcome.touched.len(),
                "Command applied to snapshot"
            ),
            Err(errors) => tracing::warn!(
                company_id = %graph.company_id(),
                command = command.name(),
                errors = %errors,
                "Command rejected"
            ),
        }
        result
    }

    /// Validate a bulk change cumulatively and split it into the sequence of
    /// full documents to persist, one per holder, in submission order.
    pub fn plan_bulk(
        graph: &OwnershipGraph,
        changes: &[AllocationChange],
    ) -> ValidationResult<Vec<BulkStep>> {
        let proposals = Self::proposals(graph, changes)?;
        ShareAllocationValidator::validate(graph.share_totals(), graph.holdings(), &proposals)?;

        let mut working = graph.clone();
        let steps = changes
            .iter()
            .zip(&proposals)
            .map(|(change, proposal)| {
                Self::write_allocation(&mut working, change, proposal);
                BulkStep {
                    holder: change.holder,
                    company: working.company().clone(),
                }
            })
            .collect();
        Ok(steps)
    }

    /// A person or company record may be deleted only when no company of the
    /// client still holds a holding or entry for it
    pub fn ensure_deletable(client_companies: &[Company], holder: &HolderRef) -> EngineResult<()> {
        let companies = CrossCompanyAggregator::relationships_of(client_companies, holder);
        if companies.is_empty() {
            Ok(())
        } else {
            Err(EngineError::StillReferenced {
                holder: *holder,
                companies,
            })
        }
    }

    // ------------------------------------------------------------------
    // Allocations
    // ------------------------------------------------------------------

    fn proposals(
        graph: &OwnershipGraph,
        changes: &[AllocationChange],
    ) -> ValidationResult<Vec<ProposedAllocation>> {
        let mut errors = ValidationErrors::new();
        let mut proposals = Vec::with_capacity(changes.len());
        for change in changes {
            if change.holder == HolderRef::Company(graph.company_id()) {
                errors.push(ValidationError::SelfReference);
                continue;
            }
            match change.proposal() {
                Ok(proposal) => proposals.push(proposal),
                Err(error) => errors.push(error),
            }
        }
        errors.into_result(proposals)
    }

    fn apply_allocations(
        graph: &OwnershipGraph,
        changes: &[AllocationChange],
    ) -> ValidationResult<MutationOutcome> {
        let proposals = Self::proposals(graph, changes)?;
        let summary =
            ShareAllocationValidator::validate(graph.share_totals(), graph.holdings(), &proposals)?;

        let mut next = graph.clone();
        for (change, proposal) in changes.iter().zip(&proposals) {
            Self::write_allocation(&mut next, change, proposal);
        }
        Ok(MutationOutcome {
            graph: next,
            touched: changes.iter().map(|c| c.holder).collect(),
            allocation: Some(summary),
        })
    }

    fn write_allocation(
        graph: &mut OwnershipGraph,
        change: &AllocationChange,
        proposal: &ProposedAllocation,
    ) {
        match &proposal.allocation {
            Some(allocation) => {
                let name = resolve_name(graph, &change.holder, change.name.as_deref());
                graph.replace_holding(ShareHolding::new(change.holder, name, allocation.clone()));
            }
            None => {
                graph.remove_holding(&change.holder);
                drop_shareholder_role(graph, &change.holder);
            }
        }
    }

    fn remove_holding(
        graph: &OwnershipGraph,
        holder: &HolderRef,
    ) -> ValidationResult<MutationOutcome> {
        if graph.holding(holder).is_none() {
            return Err(ValidationError::UnknownHolder { holder: *holder }.into());
        }
        let mut next = graph.clone();
        next.remove_holding(holder);
        drop_shareholder_role(&mut next, holder);
        Ok(MutationOutcome {
            graph: next,
            touched: vec![*holder],
            allocation: None,
        })
    }

    // ------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------

    fn write_roles(
        graph: &OwnershipGraph,
        holder: &HolderRef,
        name: Option<&str>,
        roles: &RoleSet,
        source_company_id: Option<CompanyId>,
        merge: bool,
    ) -> ValidationResult<MutationOutcome> {
        if *holder == HolderRef::Company(graph.company_id()) {
            return Err(ValidationError::SelfReference.into());
        }
        let requested = roles.governance();
        if requested.is_empty() {
            return Err(ValidationError::MissingRole { holder: *holder }.into());
        }

        let existing = graph.representation_of(holder);
        let mut granted = match (existing, merge) {
            (Some(entry), true) => entry.roles.union(&requested),
            _ => requested,
        };
        let keeps_shareholder = existing.is_some_and(|e| e.roles.contains(Role::Shareholder));
        if keeps_shareholder || graph.holding(holder).is_some() {
            granted.insert(Role::Shareholder);
        }

        let name = resolve_name(graph, holder, name);
        let mut entry = RepresentationEntry::new(*holder, name, granted);
        entry.source_company_id = source_company_id.or(existing.and_then(|e| e.source_company_id));

        let mut next = graph.clone();
        next.replace_representation(entry);
        Ok(MutationOutcome {
            graph: next,
            touched: vec![*holder],
            allocation: None,
        })
    }

    fn revoke_role(
        graph: &OwnershipGraph,
        holder: &HolderRef,
        role: Role,
    ) -> ValidationResult<MutationOutcome> {
        let Some(existing) = graph.representation_of(holder) else {
            return Err(ValidationError::UnknownHolder { holder: *holder }.into());
        };
        let mut entry = existing.clone();
        entry.roles.remove(role);

        let mut next = graph.clone();
        if entry.is_representative() {
            next.replace_representation(entry);
        } else {
            next.remove_representation(holder);
        }
        Ok(MutationOutcome {
            graph: next,
            touched: vec![*holder],
            allocation: None,
        })
    }

    fn remove_representative(
        graph: &OwnershipGraph,
        holder: &HolderRef,
    ) -> ValidationResult<MutationOutcome> {
        let is_representative = graph
            .representation_of(holder)
            .is_some_and(RepresentationEntry::is_representative);
        if !is_representative {
            return Err(ValidationError::UnknownHolder { holder: *holder }.into());
        }
        let mut next = graph.clone();
        next.remove_representation(holder);
        Ok(MutationOutcome {
            graph: next,
            touched: vec![*holder],
            allocation: None,
        })
    }
}

fn resolve_name(graph: &OwnershipGraph, holder: &HolderRef, name: Option<&str>) -> String {
    name.map(str::to_string)
        .or_else(|| graph.holder_name(holder))
        .unwrap_or_else(|| holder.to_string())
}

/// Strip `Shareholder` from a holder's entry once the holding is gone; an
/// entry left without any role is dropped
fn drop_shareholder_role(graph: &mut OwnershipGraph, holder: &HolderRef) {
    let Some(existing) = graph.representation_of(holder) else {
        return;
    };
    let mut entry = existing.clone();
    if !entry.roles.remove(Role::Shareholder) {
        return;
    }
    if entry.roles.is_empty() {
        graph.remove_representation(holder);
    } else {
        graph.replace_representation(entry);
    }
}
