//! Items: the units that flow between tiles.
//!
//! An [`Item`] carries a type, a per-unit value, a quality multiplier and a
//! stack size. Quality and stack size are private so their invariants
//! (quality clamped to `[0.1, 3.0]`, stack size at least one) always hold.

use crate::fixed::{Fixed64, floor_to_u64};
use crate::id::ItemType;
use serde::{Deserialize, Serialize};

/// Lower clamp applied to every item quality.
pub fn min_quality() -> Fixed64 {
    Fixed64::from_num(0.1)
}

/// Upper clamp applied to every item quality.
pub fn max_quality() -> Fixed64 {
    Fixed64::from_num(3)
}

/// Two items whose qualities differ by this much or more never stack.
pub fn stack_quality_tolerance() -> Fixed64 {
    Fixed64::from_num(0.1)
}

#[inline]
fn clamp_quality(q: Fixed64) -> Fixed64 {
    q.clamp(min_quality(), max_quality())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("cannot split {requested} from a stack of {available}")]
    InvalidAmount { requested: u32, available: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_type: ItemType,
    /// Value of a single unit in the stack.
    pub value: u64,
    quality: Fixed64,
    stack_size: u32,
    /// How many transformations produced this item.
    pub processing_count: u32,
    pub stackable: bool,
}

impl Item {
    /// A single stackable unit. Quality is clamped into range.
    pub fn new(item_type: ItemType, value: u64, quality: Fixed64) -> Self {
        Self {
            item_type,
            value,
            quality: clamp_quality(quality),
            stack_size: 1,
            processing_count: 0,
            stackable: true,
        }
    }

    /// A unit of the given type at its base value and quality 1.
    pub fn of(item_type: ItemType) -> Self {
        Self::new(item_type, item_type.base_value(), Fixed64::from_num(1))
    }

    pub fn with_stack_size(mut self, stack_size: u32) -> Self {
        self.stack_size = stack_size.max(1);
        self
    }

    pub fn with_processing_count(mut self, count: u32) -> Self {
        self.processing_count = count;
        self
    }

    pub fn quality(&self) -> Fixed64 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Fixed64) {
        self.quality = clamp_quality(quality);
    }

    pub fn stack_size(&self) -> u32 {
        self.stack_size
    }

    pub fn max_stack_size(&self) -> u32 {
        self.item_type.max_stack_size()
    }

    /// Value of the whole stack.
    pub fn total_value(&self) -> u64 {
        self.value.saturating_mul(self.stack_size as u64)
    }

    /// Whether `other` could merge into this stack right now.
    ///
    /// Requires equal type and unit value, qualities within tolerance, both
    /// stackable, and room left in this stack.
    pub fn can_stack_with(&self, other: &Item) -> bool {
        self.stackable
            && other.stackable
            && self.item_type == other.item_type
            && self.value == other.value
            && (self.quality - other.quality).abs() < stack_quality_tolerance()
            && self.stack_size < self.max_stack_size()
    }

    /// Merge `other` into this stack, up to the max stack size.
    ///
    /// Returns `None` when `other` was fully absorbed, otherwise the
    /// remainder (or `other` untouched when the two cannot stack).
    pub fn stack_with(&mut self, mut other: Item) -> Option<Item> {
        if !self.can_stack_with(&other) {
            return Some(other);
        }
        let room = self.max_stack_size() - self.stack_size;
        let moved = room.min(other.stack_size);

        // Weighted average keeps quality within the band of the two inputs.
        let total = Fixed64::from_num(self.stack_size + moved);
        let weighted = self.quality * Fixed64::from_num(self.stack_size)
            + other.quality * Fixed64::from_num(moved);
        self.quality = clamp_quality(weighted / total);
        self.stack_size += moved;
        self.processing_count = self.processing_count.max(other.processing_count);

        if moved == other.stack_size {
            None
        } else {
            other.stack_size -= moved;
            Some(other)
        }
    }

    /// Split `amount` units off into a new item with the same attributes.
    pub fn split(&mut self, amount: u32) -> Result<Item, ItemError> {
        if amount == 0 || amount >= self.stack_size {
            return Err(ItemError::InvalidAmount {
                requested: amount,
                available: self.stack_size,
            });
        }
        self.stack_size -= amount;
        let mut part = self.clone();
        part.stack_size = amount;
        Ok(part)
    }

    /// The result of one transformation step applied to this item.
    ///
    /// Stack size carries over, processing count increments.
    pub fn transformed(&self, output: ItemType, value: u64, quality: Fixed64) -> Item {
        Item {
            item_type: output,
            value,
            quality: clamp_quality(quality),
            stack_size: self.stack_size,
            processing_count: self.processing_count.saturating_add(1),
            stackable: self.stackable,
        }
    }

    /// Per-unit value scaled by `factor`, floored.
    pub fn scaled_value(&self, factor: Fixed64) -> u64 {
        floor_to_u64(Fixed64::saturating_from_num(self.value).saturating_mul(factor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Material;

    fn q(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn ore() -> Item {
        Item::new(ItemType::Material(Material::IronOre), 1, q(1.0))
    }

    #[test]
    fn quality_is_clamped_on_construction() {
        let low = Item::new(ItemType::Number(1), 1, q(-5.0));
        let high = Item::new(ItemType::Number(1), 1, q(9.0));
        assert_eq!(low.quality(), min_quality());
        assert_eq!(high.quality(), max_quality());
    }

    #[test]
    fn stack_size_never_drops_below_one() {
        assert_eq!(ore().with_stack_size(0).stack_size(), 1);
    }

    #[test]
    fn total_value_multiplies_stack() {
        let item = Item::new(ItemType::Number(7), 7, q(1.0)).with_stack_size(3);
        assert_eq!(item.total_value(), 21);
    }

    #[test]
    fn can_stack_requires_matching_type_and_close_quality() {
        let a = ore();
        let mut b = ore();
        assert!(a.can_stack_with(&b));

        b.set_quality(q(1.2));
        assert!(!a.can_stack_with(&b));

        let plate = Item::new(ItemType::Material(Material::IronPlate), 1, q(1.0));
        assert!(!a.can_stack_with(&plate));
    }

    #[test]
    fn unequal_unit_values_do_not_stack() {
        // A merged stack has one unit value, so mixing values would change
        // the combined total.
        let mut cheap = ore().with_stack_size(2);
        let rich = Item::new(ItemType::Material(Material::IronOre), 3, q(1.0));
        assert!(!cheap.can_stack_with(&rich));
        let back = cheap.stack_with(rich.clone());
        assert_eq!(back, Some(rich));
        assert_eq!(cheap.total_value(), 2);
    }

    #[test]
    fn can_stack_refuses_full_stack() {
        let full = ore().with_stack_size(50);
        assert!(!full.can_stack_with(&ore()));
    }

    #[test]
    fn non_stackable_items_never_stack() {
        let mut a = ore();
        a.stackable = false;
        assert!(!a.can_stack_with(&ore()));
        assert!(!ore().can_stack_with(&a));
    }

    #[test]
    fn stack_with_full_absorption_conserves_value() {
        let mut a = ore().with_stack_size(10);
        let b = ore().with_stack_size(5);
        let before = a.total_value() + b.total_value();
        assert!(a.stack_with(b).is_none());
        assert_eq!(a.stack_size(), 15);
        assert_eq!(a.total_value(), before);
    }

    #[test]
    fn stack_with_partial_leaves_remainder() {
        let mut a = ore().with_stack_size(45);
        let b = ore().with_stack_size(10);
        let rest = a.stack_with(b).expect("remainder expected");
        assert_eq!(a.stack_size(), 50);
        assert_eq!(rest.stack_size(), 5);
    }

    #[test]
    fn stack_with_incompatible_returns_other_unchanged() {
        let mut a = ore();
        let b = Item::new(ItemType::Number(3), 3, q(1.0));
        let back = a.stack_with(b.clone()).expect("should be returned");
        assert_eq!(back, b);
        assert_eq!(a.stack_size(), 1);
    }

    #[test]
    fn split_moves_units_out() {
        let mut a = ore().with_stack_size(8);
        let part = a.split(3).unwrap();
        assert_eq!(part.stack_size(), 3);
        assert_eq!(a.stack_size(), 5);
        assert_eq!(part.item_type, a.item_type);
        assert_eq!(part.quality(), a.quality());
    }

    #[test]
    fn split_rejects_zero_and_whole_stack() {
        let mut a = ore().with_stack_size(4);
        assert_eq!(
            a.split(0),
            Err(ItemError::InvalidAmount {
                requested: 0,
                available: 4
            })
        );
        assert!(a.split(4).is_err());
        assert!(a.split(9).is_err());
        assert_eq!(a.stack_size(), 4);
    }

    #[test]
    fn transformed_increments_processing_and_keeps_stack() {
        let a = ore().with_stack_size(3);
        let out = a.transformed(ItemType::Material(Material::IronPlate), 2, q(1.2));
        assert_eq!(out.stack_size(), 3);
        assert_eq!(out.processing_count, 1);
        assert_eq!(out.value, 2);
    }

    #[test]
    fn scaled_value_floors() {
        let a = Item::new(ItemType::Number(3), 3, q(1.0));
        assert_eq!(a.scaled_value(q(1.5)), 4);
    }
}
