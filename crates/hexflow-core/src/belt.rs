//! Conveyor belts: directional FIFO carriers.
//!
//! A belt owns a bounded buffer instead of separate input and output queues.
//! Its timer gates how often the front item may leave; the actual hand-off to
//! the next tile happens in the engine's belt phase, which looks up the
//! neighbors from the grid on every tick.

use crate::fixed::Fixed64;
use crate::grid::{HexCoord, HexDirection};
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_MAX_ITEMS_ON_BELT: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConveyorBelt {
    pub direction: HexDirection,
    pub transport_interval: Fixed64,
    pub max_items_on_belt: usize,
    pub(crate) buffer: VecDeque<Item>,
    pub(crate) elapsed: Fixed64,
    pub items_moved: u64,
}

impl ConveyorBelt {
    pub fn new(direction: HexDirection) -> Self {
        Self {
            direction,
            transport_interval: Fixed64::from_num(1),
            max_items_on_belt: DEFAULT_MAX_ITEMS_ON_BELT,
            buffer: VecDeque::new(),
            elapsed: Fixed64::ZERO,
            items_moved: 0,
        }
    }

    pub fn with_interval(mut self, transport_interval: Fixed64) -> Self {
        self.transport_interval = transport_interval;
        self
    }

    pub fn with_capacity(mut self, max_items_on_belt: usize) -> Self {
        self.max_items_on_belt = max_items_on_belt;
        self
    }

    /// Cell this belt delivers into. `None` past the edge of the coordinate
    /// range.
    pub fn next_position(&self, from: HexCoord) -> Option<HexCoord> {
        from.checked_neighbor(self.direction)
    }

    /// Cell this belt pulls from.
    pub fn previous_position(&self, from: HexCoord) -> Option<HexCoord> {
        from.checked_neighbor(self.direction.opposite())
    }

    pub fn has_room(&self) -> bool {
        self.buffer.len() < self.max_items_on_belt
    }

    /// Append an item. An item landing on an empty belt restarts the
    /// timer, so it spends a full interval here before moving on.
    pub fn push(&mut self, item: Item) -> Result<(), Item> {
        if !self.has_room() {
            return Err(item);
        }
        if self.buffer.is_empty() {
            self.elapsed = Fixed64::ZERO;
        }
        self.buffer.push_back(item);
        Ok(())
    }

    pub fn front(&self) -> Option<&Item> {
        self.buffer.front()
    }

    pub fn pop_front(&mut self) -> Option<Item> {
        self.buffer.pop_front()
    }

    pub(crate) fn push_front(&mut self, item: Item) {
        self.buffer.push_front(item);
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The front item may move this tick.
    pub fn is_ready(&self) -> bool {
        self.elapsed >= self.transport_interval
    }

    /// Record a hand-off out of this belt.
    pub(crate) fn mark_moved(&mut self) {
        self.elapsed = Fixed64::ZERO;
        self.items_moved += 1;
    }

    pub(crate) fn tick(&mut self, dt: Fixed64) {
        if self.is_ready() {
            return;
        }
        self.elapsed = self.elapsed.saturating_add(dt).min(self.transport_interval);
    }

    pub fn rotate_clockwise(&mut self) -> HexDirection {
        self.direction = self.direction.rotate_clockwise();
        self.direction
    }

    pub fn rotate_counter_clockwise(&mut self) -> HexDirection {
        self.direction = self.direction.rotate_counter_clockwise();
        self.direction
    }

    /// Whether this belt, sitting at `at`, delivers into `target`.
    pub fn points_at(&self, at: HexCoord, target: HexCoord) -> bool {
        self.next_position(at) == Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ItemType;

    fn one() -> Item {
        Item::of(ItemType::Number(1))
    }

    #[test]
    fn buffer_respects_capacity() {
        let mut belt = ConveyorBelt::new(HexDirection::East).with_capacity(2);
        assert!(belt.push(one()).is_ok());
        assert!(belt.push(one()).is_ok());
        assert!(belt.push(one()).is_err());
        assert_eq!(belt.len(), 2);
    }

    #[test]
    fn fifo_order() {
        let mut belt = ConveyorBelt::new(HexDirection::East);
        belt.push(Item::of(ItemType::Number(1))).unwrap();
        belt.push(Item::of(ItemType::Number(2))).unwrap();
        assert_eq!(belt.pop_front().map(|i| i.item_type), Some(ItemType::Number(1)));
        assert_eq!(belt.pop_front().map(|i| i.item_type), Some(ItemType::Number(2)));
    }

    #[test]
    fn timer_caps_at_interval() {
        let mut belt = ConveyorBelt::new(HexDirection::East).with_interval(Fixed64::from_num(2));
        belt.tick(Fixed64::from_num(1));
        assert!(!belt.is_ready());
        belt.tick(Fixed64::from_num(5));
        assert!(belt.is_ready());
        assert_eq!(belt.elapsed, Fixed64::from_num(2));
        belt.mark_moved();
        assert!(!belt.is_ready());
        assert_eq!(belt.items_moved, 1);
    }

    #[test]
    fn arrival_on_empty_belt_restarts_timer() {
        let mut belt = ConveyorBelt::new(HexDirection::East);
        belt.tick(Fixed64::from_num(1));
        assert!(belt.is_ready());
        belt.push(one()).unwrap();
        assert!(!belt.is_ready());
        belt.tick(Fixed64::from_num(1));
        belt.push(one()).unwrap();
        assert!(belt.is_ready(), "queued behind the front item");
    }

    #[test]
    fn rotation_changes_next_position() {
        let mut belt = ConveyorBelt::new(HexDirection::East);
        let here = HexCoord::ORIGIN;
        assert_eq!(belt.next_position(here), Some(HexCoord::new(1, 0)));
        assert_eq!(belt.previous_position(here), Some(HexCoord::new(-1, 0)));
        belt.rotate_counter_clockwise();
        assert_eq!(belt.next_position(here), Some(HexCoord::new(1, -1)));
        belt.rotate_clockwise();
        belt.rotate_clockwise();
        assert_eq!(belt.direction, HexDirection::SouthEast);
        assert!(belt.points_at(here, HexCoord::new(0, 1)));
    }
}
