//! Upgrade definitions, patterns and carriers.
//!
//! An [`Upgrade`] is one concrete placeable unit: a stable id, a display name,
//! a rarity and a shared [`Pattern`] footprint. Upgrades are attached to a
//! [`Carrier`], which owns the grid they are equipped on.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::{all_rotations, NUM_ROTATIONS};
use crate::grid::GridMap;

/// Stable identity of an upgrade instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpgradeId(pub u32);

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Upgrade rarity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Exotic,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "Common"),
            Rarity::Rare => write!(f, "Rare"),
            Rarity::Epic => write!(f, "Epic"),
            Rarity::Exotic => write!(f, "Exotic"),
        }
    }
}

/// An immutable footprint with all six rotations precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    rotations: [GridMap; NUM_ROTATIONS as usize],
}

impl Pattern {
    pub fn new(map: GridMap) -> Self {
        Self {
            rotations: all_rotations(&map),
        }
    }

    /// The pattern as authored (rotation 0).
    #[inline]
    pub fn base(&self) -> &GridMap {
        &self.rotations[0]
    }

    /// Returns the rotated shape. Rotations wrap modulo six.
    #[inline]
    pub fn rotated(&self, rotation: u8) -> &GridMap {
        &self.rotations[(rotation % NUM_ROTATIONS) as usize]
    }

    /// Number of enabled cells; identical for every rotation.
    #[inline]
    pub fn enabled_cell_count(&self) -> usize {
        self.rotations[0].enabled_count()
    }
}

/// A concrete upgrade instance.
///
/// Name and rarity only feed [`solve_order`]; the solver keys everything on
/// [`UpgradeId`].
#[derive(Debug, Clone)]
pub struct Upgrade {
    id: UpgradeId,
    name: String,
    rarity: Rarity,
    pattern: Arc<Pattern>,
}

impl Upgrade {
    pub fn new(
        id: UpgradeId,
        name: impl Into<String>,
        rarity: Rarity,
        pattern: impl Into<Arc<Pattern>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            rarity,
            pattern: pattern.into(),
        }
    }

    #[inline]
    pub fn id(&self) -> UpgradeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rarity(&self) -> Rarity {
        self.rarity
    }

    #[inline]
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }
}

impl fmt::Display for Upgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.rarity, self.name, self.id)
    }
}

/// Sorts upgrades into the conventional solve order: rarest first, then by name.
///
/// The order only decides which solution the search finds first.
pub fn solve_order(upgrades: &mut [Upgrade]) {
    upgrades.sort_by(|a, b| b.rarity.cmp(&a.rarity).then_with(|| a.name.cmp(&b.name)));
}

/// Kind of gear an upgrade grid belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearKind {
    #[default]
    Equipment,
    /// The character grid also shows globally equipped upgrades.
    Character,
}

/// The entity that owns an equipped upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Carrier {
    Gear { id: u32, kind: GearKind },
    Global,
}

impl Carrier {
    /// Carriers whose upgrades occupy this carrier's grid.
    ///
    /// A character grid is shared with the global carrier.
    pub fn grid_owners(self) -> Vec<Carrier> {
        match self {
            Carrier::Gear {
                kind: GearKind::Character,
                ..
            } => vec![self, Carrier::Global],
            _ => vec![self],
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Carrier::Gear { id, kind } => write!(f, "gear {id} ({kind:?})"),
            Carrier::Global => write!(f, "global"),
        }
    }
}

/// Progression gate deciding whether upgrades may be rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationGate {
    pub unlock_level: u32,
    pub player_level: u32,
}

impl RotationGate {
    /// Returns 6 once the player reaches the unlock level, otherwise 1.
    pub fn max_rotations(&self) -> u8 {
        if self.player_level >= self.unlock_level {
            NUM_ROTATIONS
        } else {
            1
        }
    }
}
