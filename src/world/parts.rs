//! Equipment parts sold by the outpost and fitted to players

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Equipment slot on a player's rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Drill,
    Hull,
    FuelTank,
    CargoBay,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Drill, Slot::Hull, Slot::FuelTank, Slot::CargoBay];

    fn price(self) -> u32 {
        match self {
            Slot::Drill => 30,
            Slot::Hull => 40,
            Slot::FuelTank => 20,
            Slot::CargoBay => 25,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Drill => "drill",
            Slot::Hull => "hull",
            Slot::FuelTank => "fuel_tank",
            Slot::CargoBay => "cargo_bay",
        }
    }
}

/// Material tier, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Tin,
    Bronze,
    Iron,
    Steel,
    Titanium,
    Diamond,
}

impl Material {
    pub const ALL: [Material; 6] = [
        Material::Tin,
        Material::Bronze,
        Material::Iron,
        Material::Steel,
        Material::Titanium,
        Material::Diamond,
    ];

    pub fn tier(self) -> u32 {
        self as u32 + 1
    }

    fn price(self) -> u32 {
        match self {
            Material::Tin => 10,
            Material::Bronze => 25,
            Material::Iron => 50,
            Material::Steel => 100,
            Material::Titanium => 200,
            Material::Diamond => 400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Material::Tin => "tin",
            Material::Bronze => "bronze",
            Material::Iron => "iron",
            Material::Steel => "steel",
            Material::Titanium => "titanium",
            Material::Diamond => "diamond",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtype {
    Light,
    Standard,
    Heavy,
}

impl Subtype {
    pub const ALL: [Subtype; 3] = [Subtype::Light, Subtype::Standard, Subtype::Heavy];

    fn factor(self) -> f64 {
        match self {
            Subtype::Light => 0.8,
            Subtype::Standard => 1.0,
            Subtype::Heavy => 1.3,
        }
    }

    fn price(self) -> u32 {
        match self {
            Subtype::Light => 0,
            Subtype::Standard => 15,
            Subtype::Heavy => 40,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::Light => "light",
            Subtype::Standard => "standard",
            Subtype::Heavy => "heavy",
        }
    }
}

/// One piece of equipment: slot x material x subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Part {
    pub slot: Slot,
    pub material: Material,
    pub subtype: Subtype,
}

impl Part {
    pub const fn new(slot: Slot, material: Material, subtype: Subtype) -> Self {
        Self {
            slot,
            material,
            subtype,
        }
    }

    pub const fn starter(slot: Slot) -> Self {
        Self::new(slot, Material::Tin, Subtype::Standard)
    }

    /// Every distinct part, one per slot, material and subtype
    pub fn all() -> Vec<Part> {
        Slot::ALL
            .into_iter()
            .flat_map(|slot| {
                Material::ALL.into_iter().flat_map(move |material| {
                    Subtype::ALL
                        .into_iter()
                        .map(move |subtype| Part::new(slot, material, subtype))
                })
            })
            .collect()
    }

    /// `count` distinct parts drawn without replacement; `None` when fewer exist
    pub fn catalog<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Option<Vec<Part>> {
        let all = Self::all();
        if count > all.len() {
            return None;
        }
        Some(all.choose_multiple(rng, count).copied().collect())
    }

    pub fn price(&self) -> u32 {
        self.slot.price() + self.material.price() + self.subtype.price()
    }

    /// Slot-specific capability: drill strength, max health, max fuel or max cargo
    pub fn rating(&self) -> f64 {
        let tier = f64::from(self.material.tier());
        let base = match self.slot {
            Slot::Drill => 200.0 + 100.0 * (tier - 1.0),
            Slot::Hull | Slot::FuelTank | Slot::CargoBay => 10.0 * tier,
        };
        base * self.subtype.factor()
    }

    /// Catalog key, `subtype:material:slot`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.subtype.as_str(),
            self.material.as_str(),
            self.slot.as_str()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed part key: {0}")]
pub struct PartKeyError(pub String);

impl FromStr for Part {
    type Err = PartKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PartKeyError(s.to_string());
        let mut pieces = s.split(':');
        let (Some(subtype), Some(material), Some(slot), None) =
            (pieces.next(), pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(err());
        };

        Ok(Part {
            slot: Slot::ALL
                .into_iter()
                .find(|v| v.as_str() == slot)
                .ok_or_else(err)?,
            material: Material::ALL
                .into_iter()
                .find(|v| v.as_str() == material)
                .ok_or_else(err)?,
            subtype: Subtype::ALL
                .into_iter()
                .find(|v| v.as_str() == subtype)
                .ok_or_else(err)?,
        })
    }
}
