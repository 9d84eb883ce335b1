//! Share classes, authorized totals and allocations
//!
//! Two schemes exist side by side:
//!
//! - **Per-class**: a company stores an authorized total for each class and a
//!   holder's allocation is a share count, either per class A/B/C ("class
//!   mode") or one pooled ordinary value ("ordinary mode").
//! - **Legacy percentage**: a company stores no totals and a holder's
//!   allocation is a flat percentage tagged with a class label.
//!
//! Which scheme governs a company is recorded on the company itself in
//! [`ShareTotals`]; it is never inferred from what the holdings look like.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// SHARE CLASS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareClass {
    A,
    B,
    C,
    Ordinary,
    General,
    Unclassified,
}

impl ShareClass {
    /// Classes editable in class mode
    pub const CLASS_MODE: [ShareClass; 3] = [ShareClass::A, ShareClass::B, ShareClass::C];

    pub fn label(&self) -> &'static str {
        match self {
            Self::A => "Class A",
            Self::B => "Class B",
            Self::C => "Class C",
            Self::Ordinary => "Ordinary",
            Self::General => "General",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Presentation rank used to break percentage ties (lower wins).
    ///
    /// A > unclassified > B > C > General/Ordinary.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            Self::A => 0,
            Self::Unclassified => 1,
            Self::B => 2,
            Self::C => 3,
            Self::General | Self::Ordinary => 4,
        }
    }
}

impl std::fmt::Display for ShareClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SHARE COUNTS
// ============================================================================

/// Share count per class. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareCounts(BTreeMap<ShareClass, u64>);

impl ShareCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: ShareClass) -> u64 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    /// Set a class value; zero means "no shares in that class"
    pub fn set(&mut self, class: ShareClass, value: u64) {
        if value == 0 {
            self.0.remove(&class);
        } else {
            self.0.insert(class, value);
        }
    }

    pub fn with(mut self, class: ShareClass, value: u64) -> Self {
        self.set(class, value);
        self
    }

    pub fn add(&mut self, class: ShareClass, value: u64) {
        let current = self.get(class);
        self.set(class, current.saturating_add(value));
    }

    pub fn add_all(&mut self, other: &ShareCounts) {
        for (class, value) in other.iter() {
            self.add(class, value);
        }
    }

    /// Sum over all classes, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShareClass, u64)> + '_ {
        self.0.iter().map(|(class, value)| (*class, *value))
    }

    pub fn classes(&self) -> impl Iterator<Item = ShareClass> + '_ {
        self.0.keys().copied()
    }
}

impl FromIterator<(ShareClass, u64)> for ShareCounts {
    fn from_iter<I: IntoIterator<Item = (ShareClass, u64)>>(iter: I) -> Self {
        let mut counts = ShareCounts::new();
        for (class, value) in iter {
            counts.add(class, value);
        }
        counts
    }
}

// ============================================================================
// AUTHORIZED TOTALS (company side)
// ============================================================================

/// How a company's share capital is recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum ShareTotals {
    /// Authorized share count per class
    PerClass { authorized: ShareCounts },
    /// No totals; holdings are flat percentages summing to at most 100
    LegacyPercentage,
}

impl Default for ShareTotals {
    fn default() -> Self {
        Self::PerClass {
            authorized: ShareCounts::new(),
        }
    }
}

impl ShareTotals {
    pub fn per_class(authorized: ShareCounts) -> Self {
        Self::PerClass { authorized }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyPercentage)
    }

    pub fn authorized(&self, class: ShareClass) -> u64 {
        match self {
            Self::PerClass { authorized } => authorized.get(class),
            Self::LegacyPercentage => 0,
        }
    }

    pub fn total_authorized(&self) -> u64 {
        match self {
            Self::PerClass { authorized } => authorized.total(),
            Self::LegacyPercentage => 0,
        }
    }
}

// ============================================================================
// ALLOCATION (holder side)
// ============================================================================

/// Allocation mode of a single holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Independent A/B/C values
    Class,
    /// One pooled ordinary value
    Ordinary,
    /// Legacy flat percentage
    Percentage,
}

/// A holder's stake in one company. Exactly one mode by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ShareAllocation {
    Classes { shares: ShareCounts },
    Ordinary { shares: u64 },
    Percentage { percent: Decimal, class: ShareClass },
}

impl ShareAllocation {
    pub fn classes(shares: ShareCounts) -> Self {
        Self::Classes { shares }
    }

    pub fn ordinary(shares: u64) -> Self {
        Self::Ordinary { shares }
    }

    pub fn percentage(percent: Decimal, class: ShareClass) -> Self {
        Self::Percentage { percent, class }
    }

    pub fn mode(&self) -> AllocationMode {
        match self {
            Self::Classes { .. } => AllocationMode::Class,
            Self::Ordinary { .. } => AllocationMode::Ordinary,
            Self::Percentage { .. } => AllocationMode::Percentage,
        }
    }

    /// Share counts per class; empty for percentage allocations
    pub fn counts(&self) -> ShareCounts {
        match self {
            Self::Classes { shares } => shares.clone(),
            Self::Ordinary { shares } => ShareCounts::new().with(ShareClass::Ordinary, *shares),
            Self::Percentage { .. } => ShareCounts::new(),
        }
    }

    /// True when the allocation holds nothing in any class
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Classes { shares } => shares.is_zero(),
            Self::Ordinary { shares } => *shares == 0,
            Self::Percentage { percent, .. } => percent.is_zero(),
        }
    }

    /// Ownership percentage of the target company
    pub fn percent_of(&self, totals: &ShareTotals) -> Decimal {
        match self {
            Self::Percentage { percent, .. } => *percent,
            _ => {
                let total = totals.total_authorized();
                if total == 0 {
                    return Decimal::ZERO;
                }
                Decimal::from(self.counts().total()) * Decimal::ONE_HUNDRED / Decimal::from(total)
            }
        }
    }

    /// The class a holding is ranked under when percentages tie.
    ///
    /// For multi-class holdings this is the best-ranked non-zero class.
    pub fn ranking_class(&self) -> ShareClass {
        match self {
            Self::Percentage { class, .. } => *class,
            Self::Ordinary { .. } => ShareClass::Ordinary,
            Self::Classes { shares } => shares
                .classes()
                .min_by_key(|c| c.tie_break_rank())
                .unwrap_or(ShareClass::Unclassified),
        }
    }
}

// ============================================================================
// ALLOCATION DRAFT (editable form state)
// ============================================================================

/// Draft-level mode toggle; percentage allocations are not editable as drafts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftMode {
    #[default]
    Class,
    Ordinary,
}

/// Editable allocation values for one holder.
///
/// Switching mode zeroes the other mode's fields so a holder never straddles
/// both schemes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDraft {
    pub mode: DraftMode,
    #[serde(default)]
    pub a: u64,
    #[serde(default)]
    pub b: u64,
    #[serde(default)]
    pub c: u64,
    #[serde(default)]
    pub ordinary: u64,
}

/// A draft carried non-zero values in both class and ordinary fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("allocation draft mixes class and ordinary values")]
pub struct MixedModeDraft;

impl AllocationDraft {
    pub fn class_mode(a: u64, b: u64, c: u64) -> Self {
        Self {
            mode: DraftMode::Class,
            a,
            b,
            c,
            ordinary: 0,
        }
    }

    pub fn ordinary_mode(ordinary: u64) -> Self {
        Self {
            mode: DraftMode::Ordinary,
            ordinary,
            ..Self::default()
        }
    }

    /// Seed a draft from a stored allocation; percentage allocations start empty
    pub fn from_allocation(allocation: &ShareAllocation) -> Self {
        match allocation {
            ShareAllocation::Classes { shares } => Self::class_mode(
                shares.get(ShareClass::A),
                shares.get(ShareClass::B),
                shares.get(ShareClass::C),
            ),
            ShareAllocation::Ordinary { shares } => Self::ordinary_mode(*shares),
            ShareAllocation::Percentage { .. } => Self::default(),
        }
    }

    pub fn switch_mode(&mut self, mode: DraftMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        match mode {
            DraftMode::Class => self.ordinary = 0,
            DraftMode::Ordinary => {
                self.a = 0;
                self.b = 0;
                self.c = 0;
            }
        }
    }

    /// Set a field; setting a field of the other mode switches mode first
    pub fn set(&mut self, class: ShareClass, value: u64) {
        match class {
            ShareClass::A | ShareClass::B | ShareClass::C => {
                self.switch_mode(DraftMode::Class);
                match class {
                    ShareClass::A => self.a = value,
                    ShareClass::B => self.b = value,
                    _ => self.c = value,
                }
            }
            _ => {
                self.switch_mode(DraftMode::Ordinary);
                self.ordinary = value;
            }
        }
    }

    pub fn is_mixed(&self) -> bool {
        let class_values = self.a > 0 || self.b > 0 || self.c > 0;
        class_values && self.ordinary > 0
    }

    /// Convert to an allocation. `Ok(None)` means "no holding".
    pub fn to_allocation(&self) -> Result<Option<ShareAllocation>, MixedModeDraft> {
        if self.is_mixed() {
            return Err(MixedModeDraft);
        }
        let allocation = match self.mode {
            DraftMode::Class => ShareAllocation::classes(
                ShareCounts::new()
                    .with(ShareClass::A, self.a)
                    .with(ShareClass::B, self.b)
                    .with(ShareClass::C, self.c),
            ),
            DraftMode::Ordinary => ShareAllocation::ordinary(self.ordinary),
        };
        Ok((!allocation.is_zero()).then_some(allocation))
    }
}
