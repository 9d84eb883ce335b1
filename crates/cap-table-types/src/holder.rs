//! Holder identity
//!
//! A holder is either a natural person or a company. Every place in the engine
//! that talks about "who" uses [`HolderRef`]; raw ids and embedded objects are
//! normalized into it at the persistence boundary.

use serde::{Deserialize, Serialize};

use crate::ids::{CompanyId, PersonId};

/// Tagged holder identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum HolderRef {
    Person(PersonId),
    Company(CompanyId),
}

/// Kind of holder, without identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderKind {
    Person,
    Company,
}

impl HolderRef {
    pub fn kind(&self) -> HolderKind {
        match self {
            Self::Person(_) => HolderKind::Person,
            Self::Company(_) => HolderKind::Company,
        }
    }

    pub fn as_person(&self) -> Option<PersonId> {
        match self {
            Self::Person(id) => Some(*id),
            Self::Company(_) => None,
        }
    }

    pub fn as_company(&self) -> Option<CompanyId> {
        match self {
            Self::Company(id) => Some(*id),
            Self::Person(_) => None,
        }
    }
}

impl From<PersonId> for HolderRef {
    fn from(id: PersonId) -> Self {
        Self::Person(id)
    }
}

impl From<CompanyId> for HolderRef {
    fn from(id: CompanyId) -> Self {
        Self::Company(id)
    }
}

impl std::fmt::Display for HolderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person(id) => id.fmt(f),
            Self::Company(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_ref_tagged_correctly() {
        let holder = HolderRef::Company(CompanyId::new());
        let json = serde_json::to_string(&holder).unwrap();
        assert!(json.contains(r#""type":"company""#));
    }
}
