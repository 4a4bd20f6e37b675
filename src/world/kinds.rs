//! Named things that live in grid cells: ground colours, pickups and hazards

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ground and mineral colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mineral {
    White,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    Pink,
    Red,
    Black,
}

impl Mineral {
    pub const ALL: [Mineral; 10] = [
        Mineral::White,
        Mineral::Orange,
        Mineral::Yellow,
        Mineral::Green,
        Mineral::Teal,
        Mineral::Blue,
        Mineral::Purple,
        Mineral::Pink,
        Mineral::Red,
        Mineral::Black,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mineral::White => "white",
            Mineral::Orange => "orange",
            Mineral::Yellow => "yellow",
            Mineral::Green => "green",
            Mineral::Teal => "teal",
            Mineral::Blue => "blue",
            Mineral::Purple => "purple",
            Mineral::Pink => "pink",
            Mineral::Red => "red",
            Mineral::Black => "black",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Uniform pick among the other nine colours
    pub fn random_other<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let others: Vec<Mineral> = Self::ALL.into_iter().filter(|m| *m != self).collect();
        others.choose(rng).copied().unwrap_or(self)
    }
}

impl fmt::Display for Mineral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mineral {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Hazards embedded in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    Lava,
    RedMonster,
    PurpleMonster,
    PoisonousGas,
    NoxiousGas,
}

impl HazardKind {
    pub const ALL: [HazardKind; 5] = [
        HazardKind::Lava,
        HazardKind::RedMonster,
        HazardKind::PurpleMonster,
        HazardKind::PoisonousGas,
        HazardKind::NoxiousGas,
    ];
    pub const GASES: [HazardKind; 2] = [HazardKind::PoisonousGas, HazardKind::NoxiousGas];
    pub const MONSTERS: [HazardKind; 2] = [HazardKind::RedMonster, HazardKind::PurpleMonster];

    pub fn is_gas(self) -> bool {
        Self::GASES.contains(&self)
    }

    pub fn is_monster(self) -> bool {
        Self::MONSTERS.contains(&self)
    }

    /// Lava and gas are the kinds that flow
    pub fn is_fluid(self) -> bool {
        self == HazardKind::Lava || self.is_gas()
    }

    /// Damage dealt to a player sharing the cell
    pub fn damage(self) -> f64 {
        3.0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HazardKind::Lava => "lava",
            HazardKind::RedMonster => "red_monster",
            HazardKind::PurpleMonster => "purple_monster",
            HazardKind::PoisonousGas => "poisonous_gas",
            HazardKind::NoxiousGas => "noxious_gas",
        }
    }
}

impl FromStr for HazardKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// Items a player can carry and use
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consumable {
    Teleporter,
    RepairNanites,
    TimedCharge,
}

impl Consumable {
    pub const ALL: [Consumable; 3] = [
        Consumable::Teleporter,
        Consumable::RepairNanites,
        Consumable::TimedCharge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Consumable::Teleporter => "teleporter",
            Consumable::RepairNanites => "repair_nanites",
            Consumable::TimedCharge => "timed_charge",
        }
    }
}

impl FromStr for Consumable {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

const MINERAL_PREFIX: &str = "mineral_";

/// Pickup lying in a cell; serialized as its item name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ItemKind {
    Mineral(Mineral),
    Consumable(Consumable),
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Mineral(m) => write!(f, "{MINERAL_PREFIX}{m}"),
            ItemKind::Consumable(c) => f.write_str(c.as_str()),
        }
    }
}

impl FromStr for ItemKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(MINERAL_PREFIX) {
            Some(color) => color.parse().map(ItemKind::Mineral),
            None => s.parse().map(ItemKind::Consumable),
        }
    }
}

impl From<ItemKind> for String {
    fn from(item: ItemKind) -> Self {
        item.to_string()
    }
}

impl TryFrom<String> for ItemKind {
    type Error = UnknownName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Key of a hull tally: raw ground or a refined mineral pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum HullKey {
    Ground(Mineral),
    Mineral(Mineral),
}

impl HullKey {
    pub fn color(self) -> Mineral {
        match self {
            HullKey::Ground(m) | HullKey::Mineral(m) => m,
        }
    }

    pub fn is_mineral(self) -> bool {
        matches!(self, HullKey::Mineral(_))
    }
}

impl fmt::Display for HullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HullKey::Ground(m) => write!(f, "{m}"),
            HullKey::Mineral(m) => write!(f, "{MINERAL_PREFIX}{m}"),
        }
    }
}

impl FromStr for HullKey {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(MINERAL_PREFIX) {
            Some(color) => color.parse().map(HullKey::Mineral),
            None => s.parse().map(HullKey::Ground),
        }
    }
}

impl From<HullKey> for String {
    fn from(key: HullKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for HullKey {
    type Error = UnknownName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0}")]
pub struct UnknownName(pub String);
