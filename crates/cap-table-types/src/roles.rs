//! Governance roles
//!
//! `Shareholder` is the only ownership role. Every other role is a governance
//! role and is what makes a holder a representative.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Shareholder,
    Director,
    JudicialRepresentative,
    LegalRepresentative,
    Secretary,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Shareholder,
        Role::Director,
        Role::JudicialRepresentative,
        Role::LegalRepresentative,
        Role::Secretary,
    ];

    pub fn is_governance(&self) -> bool {
        !matches!(self, Role::Shareholder)
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shareholder => "Shareholder",
            Self::Director => "Director",
            Self::JudicialRepresentative => "Judicial Representative",
            Self::LegalRepresentative => "Legal Representative",
            Self::Secretary => "Secretary",
        }
    }

    /// Parse from a label, case-insensitive, accepting snake_case as well
    pub fn from_label(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .into_iter()
            .find(|role| role.label().to_ascii_lowercase() == normalized)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered set of roles held by one holder in one company
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shareholder() -> Self {
        Self::from_iter([Role::Shareholder])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn insert(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn remove(&mut self, role: Role) -> bool {
        self.0.remove(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }

    /// Roles minus `Shareholder`
    pub fn governance(&self) -> RoleSet {
        self.iter().filter(Role::is_governance).collect()
    }

    pub fn has_governance_role(&self) -> bool {
        self.iter().any(|r| r.is_governance())
    }

    /// Exactly `{Shareholder}`
    pub fn is_pure_shareholder(&self) -> bool {
        self.0.len() == 1 && self.contains(Role::Shareholder)
    }

    pub fn union(&self, other: &RoleSet) -> RoleSet {
        self.0.union(&other.0).copied().collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.iter().map(|r| r.label()).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::collections::btree_set::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
