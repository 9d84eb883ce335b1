//! Ownership graph snapshot
//!
//! One company's canonical in-memory view: its own document (holdings,
//! representation entries, share totals), the persons filed directly under
//! it, and one level of shareholding subsidiaries with their persons.
//!
//! Snapshots are values. A mutation clones, edits and hands back a new
//! snapshot; nothing patches a shared snapshot in place.

use std::collections::HashSet;

use cap_table_types::{
    Company, CompanyId, HolderRef, Person, PersonId, RepresentationEntry, Role, RoleSet,
    ShareAllocation, ShareHolding, ShareTotals,
};
use rust_decimal::Decimal;

/// A shareholding company one level below the target, with its persons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsidiarySnapshot {
    pub id: CompanyId,
    pub name: String,
    pub persons: Vec<Person>,
}

/// A holder's position in the target company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderPosition {
    pub holder: HolderRef,
    pub name: String,
    pub allocation: ShareAllocation,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipGraph {
    company: Company,
    persons: Vec<Person>,
    subsidiaries: Vec<SubsidiarySnapshot>,
}

impl OwnershipGraph {
    /// Build a snapshot. Duplicate holdings or representation entries for one
    /// holder collapse to the last occurrence.
    pub fn new(
        mut company: Company,
        persons: Vec<Person>,
        subsidiaries: Vec<SubsidiarySnapshot>,
    ) -> Self {
        let holdings_before = company.holdings.len();
        company.holdings = keep_last_by(company.holdings, |h| h.holder);
        let entries_before = company.representation.len();
        company.representation = keep_last_by(company.representation, |r| r.representative);

        if company.holdings.len() != holdings_before
            || company.representation.len() != entries_before
        {
            tracing::warn!(
                company_id = %company.id,
                dropped_holdings = holdings_before - company.holdings.len(),
                dropped_entries = entries_before - company.representation.len(),
                "Collapsed duplicate holder entries in company document"
            );
        }

        Self {
            company,
            persons,
            subsidiaries,
        }
    }

    pub fn company(&self) -> &Company {
        &self.company
    }

    pub fn company_id(&self) -> CompanyId {
        self.company.id
    }

    pub fn share_totals(&self) -> &ShareTotals {
        &self.company.share_totals
    }

    /// Persons filed directly under the target company
    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn subsidiaries(&self) -> &[SubsidiarySnapshot] {
        &self.subsidiaries
    }

    pub fn holdings(&self) -> &[ShareHolding] {
        &self.company.holdings
    }

    pub fn holding(&self, holder: &HolderRef) -> Option<&ShareHolding> {
        self.company.holding(holder)
    }

    pub fn representation_of(&self, holder: &HolderRef) -> Option<&RepresentationEntry> {
        self.company.representation_of(holder)
    }

    pub fn person(&self, holder: &HolderRef) -> Option<&Person> {
        let id = holder.as_person()?;
        self.persons.iter().find(|p| p.id == id).or_else(|| {
            self.subsidiaries
                .iter()
                .flat_map(|s| s.persons.iter())
                .find(|p| p.id == id)
        })
    }

    pub fn subsidiary(&self, id: CompanyId) -> Option<&SubsidiarySnapshot> {
        self.subsidiaries.iter().find(|s| s.id == id)
    }

    /// Every holder with its allocation and derived percentage
    pub fn shareholders(&self) -> Vec<HolderPosition> {
        let totals = self.share_totals();
        self.company
            .holdings
            .iter()
            .map(|h| HolderPosition {
                holder: h.holder,
                name: h.holder_name.clone(),
                allocation: h.allocation.clone(),
                percentage: h.percent_of(totals),
            })
            .collect()
    }

    /// Entries with at least one governance role
    pub fn representatives(&self) -> Vec<&RepresentationEntry> {
        self.company
            .representation
            .iter()
            .filter(|r| r.is_representative())
            .collect()
    }

    /// Roles `holder` holds in the target company.
    ///
    /// Derived from the company document only (representation entry plus
    /// holding). Roles on the person record are not per-company and are
    /// never consulted.
    pub fn roles_of(&self, holder: &HolderRef) -> RoleSet {
        let mut roles = self
            .representation_of(holder)
            .map(|r| r.roles.clone())
            .unwrap_or_default();
        if self.holding(holder).is_some() {
            roles.insert(Role::Shareholder);
        }
        roles
    }

    /// Best known display name for a holder
    pub fn holder_name(&self, holder: &HolderRef) -> Option<String> {
        if let Some(holding) = self.holding(holder) {
            return Some(holding.holder_name.clone());
        }
        if let Some(entry) = self.representation_of(holder) {
            return Some(entry.representative_name.clone());
        }
        if let Some(person) = self.person(holder) {
            return Some(person.name.clone());
        }
        holder
            .as_company()
            .and_then(|id| self.subsidiary(id))
            .map(|s| s.name.clone())
    }

    // ------------------------------------------------------------------
    // Writes (whole-value replacement, never field merges)
    // ------------------------------------------------------------------

    pub(crate) fn replace_holding(&mut self, holding: ShareHolding) {
        match self
            .company
            .holdings
            .iter_mut()
            .find(|h| h.holder == holding.holder)
        {
            Some(existing) => *existing = holding,
            None => self.company.holdings.push(holding),
        }
    }

    pub(crate) fn remove_holding(&mut self, holder: &HolderRef) -> Option<ShareHolding> {
        let index = self
            .company
            .holdings
            .iter()
            .position(|h| &h.holder == holder)?;
        Some(self.company.holdings.remove(index))
    }

    pub(crate) fn replace_representation(&mut self, entry: RepresentationEntry) {
        match self
            .company
            .representation
            .iter_mut()
            .find(|r| r.representative == entry.representative)
        {
            Some(existing) => *existing = entry,
            None => self.company.representation.push(entry),
        }
    }

    pub(crate) fn remove_representation(
        &mut self,
        holder: &HolderRef,
    ) -> Option<RepresentationEntry> {
        let index = self
            .company
            .representation
            .iter()
            .position(|r| &r.representative == holder)?;
        Some(self.company.representation.remove(index))
    }

    /// Replace the company document, keeping persons and subsidiaries
    pub(crate) fn with_company(&self, company: Company) -> Self {
        Self::new(company, self.persons.clone(), self.subsidiaries.clone())
    }

    /// Drop a deleted person record from every person list
    pub(crate) fn without_person(&self, id: PersonId) -> Self {
        let persons = self.persons.iter().filter(|p| p.id != id).cloned().collect();
        let subsidiaries = self
            .subsidiaries
            .iter()
            .map(|s| SubsidiarySnapshot {
                id: s.id,
                name: s.name.clone(),
                persons: s.persons.iter().filter(|p| p.id != id).cloned().collect(),
            })
            .collect();
        Self::new(self.company.clone(), persons, subsidiaries)
    }
}

/// Keep only the last element for each key, preserving first-seen order
fn keep_last_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items.into_iter().rev() {
        if seen.insert(key(&item)) {
            kept.push(item);
        }
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_table_types::{ClientId, ShareClass, ShareCounts};

    fn company() -> Company {
        Company::new(
            ClientId::new(),
            "Acme Holdings",
            ShareTotals::per_class(ShareCounts::new().with(ShareClass::A, 1000)),
        )
    }

    fn class_a(shares: u64) -> ShareAllocation {
        ShareAllocation::classes(ShareCounts::new().with(ShareClass::A, shares))
    }

    #[test]
    fn duplicate_holdings_collapse_to_last() {
        let mut doc = company();
        let holder = HolderRef::Person(cap_table_types::PersonId::new());
        doc.holdings.push(ShareHolding::new(holder, "Ann", class_a(100)));
        doc.holdings.push(ShareHolding::new(holder, "Ann", class_a(300)));

        let graph = OwnershipGraph::new(doc, vec![], vec![]);
        assert_eq!(graph.holdings().len(), 1);
        assert_eq!(graph.holdings()[0].allocation, class_a(300));
    }

    #[test]
    fn shareholders_carry_percentage() {
        let mut doc = company();
        let holder = HolderRef::Person(cap_table_types::PersonId::new());
        doc.holdings.push(ShareHolding::new(holder, "Ann", class_a(250)));

        let graph = OwnershipGraph::new(doc, vec![], vec![]);
        let positions = graph.shareholders();
        assert_eq!(positions[0].percentage, Decimal::from(25));
    }

    #[test]
    fn pure_shareholder_entries_are_not_representatives() {
        let mut doc = company();
        let ann = HolderRef::Person(cap_table_types::PersonId::new());
        let bob = HolderRef::Person(cap_table_types::PersonId::new());
        doc.representation
            .push(RepresentationEntry::new(ann, "Ann", RoleSet::shareholder()));
        doc.representation.push(RepresentationEntry::new(
            bob,
            "Bob",
            [Role::Director].into_iter().collect(),
        ));

        let graph = OwnershipGraph::new(doc, vec![], vec![]);
        let reps = graph.representatives();
        assert_eq!(reps.len(), 1);
        assert_eq!(reps[0].representative, bob);
    }

    #[test]
    fn roles_of_reads_entry_and_holding_but_not_person_record() {
        let mut doc = company();
        let person = Person::new("Ann")
            .filed_under(doc.id)
            .with_roles([Role::Secretary].into_iter().collect());
        let holder = person.holder();
        doc.holdings.push(ShareHolding::new(holder, "Ann", class_a(10)));
        doc.representation.push(RepresentationEntry::new(
            holder,
            "Ann",
            [Role::Director].into_iter().collect(),
        ));

        let graph = OwnershipGraph::new(doc, vec![person], vec![]);
        let roles = graph.roles_of(&holder);
        assert!(roles.contains(Role::Shareholder));
        assert!(roles.contains(Role::Director));
        assert!(!roles.contains(Role::Secretary));
    }

    #[test]
    fn replace_holding_never_appends_duplicate() {
        let mut doc = company();
        let holder = HolderRef::Person(cap_table_types::PersonId::new());
        doc.holdings.push(ShareHolding::new(holder, "Ann", class_a(100)));
        let mut graph = OwnershipGraph::new(doc, vec![], vec![]);

        graph.replace_holding(ShareHolding::new(holder, "Ann", class_a(200)));
        assert_eq!(graph.holdings().len(), 1);
        assert_eq!(graph.holdings()[0].allocation, class_a(200));
    }
}
