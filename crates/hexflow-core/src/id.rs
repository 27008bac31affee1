use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::str::FromStr;

new_key_type! {
    /// Identifies a placed tile in the engine's tile arena.
    pub struct TileId;
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// The closed vocabulary of named (non-numeric) item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Material {
    IronOre,
    CopperOre,
    Coal,
    Stone,
    IronPlate,
    CopperPlate,
    Gear,
    Wire,
    Circuit,
}

impl Material {
    pub const ALL: [Material; 9] = [
        Material::IronOre,
        Material::CopperOre,
        Material::Coal,
        Material::Stone,
        Material::IronPlate,
        Material::CopperPlate,
        Material::Gear,
        Material::Wire,
        Material::Circuit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Material::IronOre => "iron_ore",
            Material::CopperOre => "copper_ore",
            Material::Coal => "coal",
            Material::Stone => "stone",
            Material::IronPlate => "iron_plate",
            Material::CopperPlate => "copper_plate",
            Material::Gear => "gear",
            Material::Wire => "wire",
            Material::Circuit => "circuit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Base economic value from the legacy value table.
    pub fn base_value(self) -> u64 {
        match self {
            Material::IronOre | Material::CopperOre | Material::Coal | Material::Stone => 1,
            Material::IronPlate | Material::CopperPlate => 3,
            Material::Wire => 4,
            Material::Gear => 5,
            Material::Circuit => 12,
        }
    }

    /// Largest stack a single item of this material may grow to.
    pub fn max_stack_size(self) -> u32 {
        match self {
            Material::IronOre | Material::CopperOre | Material::Coal | Material::Stone => 50,
            Material::IronPlate | Material::CopperPlate => 100,
            Material::Gear | Material::Wire => 50,
            Material::Circuit => 20,
        }
    }
}

// ---------------------------------------------------------------------------
// Item types
// ---------------------------------------------------------------------------

/// Highest numeric item type that has a dedicated stack size entry.
pub const MAX_TABLED_NUMBER: u32 = 10;

/// Stack size for numeric items inside the tabled range.
const NUMBER_STACK_SIZE: u32 = 20;

/// Stack size for anything outside the closed lookup tables.
pub const DEFAULT_MAX_STACK_SIZE: u32 = 5;

/// Identifies what an item is. Numbers are written as their decimal token
/// ("7"), materials by their snake_case name ("iron_plate").
///
/// Serialized through its string form so data files and tile records read
/// naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemType {
    Number(u32),
    Material(Material),
}

impl ItemType {
    /// The numeric payload, if this is a number item.
    pub fn number(self) -> Option<u32> {
        match self {
            ItemType::Number(n) => Some(n),
            ItemType::Material(_) => None,
        }
    }

    pub fn is_number(self) -> bool {
        matches!(self, ItemType::Number(_))
    }

    /// Intrinsic value of an item of this type: the number itself, or the
    /// legacy table value for materials.
    pub fn base_value(self) -> u64 {
        match self {
            ItemType::Number(n) => n as u64,
            ItemType::Material(m) => m.base_value(),
        }
    }

    /// Max stack size lookup. Unknown types fall back to a small stack.
    pub fn max_stack_size(self) -> u32 {
        match self {
            ItemType::Number(n) if (1..=MAX_TABLED_NUMBER).contains(&n) => NUMBER_STACK_SIZE,
            ItemType::Number(_) => DEFAULT_MAX_STACK_SIZE,
            ItemType::Material(m) => m.max_stack_size(),
        }
    }
}

impl From<Material> for ItemType {
    fn from(m: Material) -> Self {
        ItemType::Material(m)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Number(n) => write!(f, "{n}"),
            ItemType::Material(m) => f.write_str(m.name()),
        }
    }
}

/// Returned when a string names no item type in the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown item type '{0}'")]
pub struct UnknownItemType(pub String);

impl FromStr for ItemType {
    type Err = UnknownItemType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u32>() {
            if n == 0 {
                return Err(UnknownItemType(s.to_string()));
            }
            return Ok(ItemType::Number(n));
        }
        Material::from_name(s)
            .map(ItemType::Material)
            .ok_or_else(|| UnknownItemType(s.to_string()))
    }
}

impl TryFrom<String> for ItemType {
    type Error = UnknownItemType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_parses_numbers_and_materials() {
        assert_eq!("7".parse::<ItemType>(), Ok(ItemType::Number(7)));
        assert_eq!(
            "iron_plate".parse::<ItemType>(),
            Ok(ItemType::Material(Material::IronPlate))
        );
        assert!("0".parse::<ItemType>().is_err());
        assert!("unobtainium".parse::<ItemType>().is_err());
    }

    #[test]
    fn item_type_display_round_trips() {
        for m in Material::ALL {
            let t = ItemType::Material(m);
            assert_eq!(t.to_string().parse::<ItemType>(), Ok(t));
        }
        assert_eq!(ItemType::Number(10).to_string(), "10");
    }

    #[test]
    fn numbers_sort_before_materials() {
        let mut v = vec![
            ItemType::Material(Material::Gear),
            ItemType::Number(3),
            ItemType::Number(1),
        ];
        v.sort();
        assert_eq!(v[0], ItemType::Number(1));
        assert_eq!(v[2], ItemType::Material(Material::Gear));
    }

    #[test]
    fn untabled_numbers_get_default_stack() {
        assert_eq!(ItemType::Number(5).max_stack_size(), 20);
        assert_eq!(ItemType::Number(40).max_stack_size(), DEFAULT_MAX_STACK_SIZE);
    }

    #[test]
    fn item_type_serde_uses_string_form() {
        let json = serde_json::to_string(&ItemType::Material(Material::Wire)).unwrap();
        assert_eq!(json, "\"wire\"");
        let back: ItemType = serde_json::from_str("\"4\"").unwrap();
        assert_eq!(back, ItemType::Number(4));
    }
}
