//! The central receiver: the factory's sink and win-condition tracker.
//!
//! Items are drained from the input queue one per accept interval. Every
//! consumed item feeds two progress trackers: set collection (numbers reaching
//! the completion threshold) and the legacy per-level requirement lists.

use crate::fixed::Fixed64;
use crate::id::ItemType;
use crate::item::Item;
use crate::tile::TileEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::info;

pub const DEFAULT_COMPLETION_THRESHOLD: u64 = 10;
pub const DEFAULT_FINAL_VALUE: u32 = 10;

/// One legacy level: item counts that must all be delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementLevel {
    pub requirements: BTreeMap<ItemType, u64>,
}

impl RequirementLevel {
    pub fn new(requirements: impl IntoIterator<Item = (ItemType, u64)>) -> Self {
        Self {
            requirements: requirements.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralReceiver {
    pub accept_interval: Fixed64,
    pub completion_threshold: u64,
    /// Completing the set of this number finishes the game.
    pub final_value: u32,
    pub(crate) elapsed: Fixed64,
    pub(crate) stored_counts: BTreeMap<ItemType, u64>,
    pub(crate) completed_sets: BTreeSet<ItemType>,
    pub(crate) available_boosts: u32,
    pub(crate) game_completed: bool,
    pub(crate) total_items: u64,
    pub(crate) total_value: u64,
    pub(crate) levels: Vec<RequirementLevel>,
    pub(crate) current_level: usize,
    /// Outstanding counts for the current level. Goes negative on surplus.
    pub(crate) remaining: BTreeMap<ItemType, i64>,
}

impl Default for CentralReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralReceiver {
    pub fn new() -> Self {
        Self {
            accept_interval: Fixed64::from_num(0.5),
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            final_value: DEFAULT_FINAL_VALUE,
            elapsed: Fixed64::ZERO,
            stored_counts: BTreeMap::new(),
            completed_sets: BTreeSet::new(),
            available_boosts: 0,
            game_completed: false,
            total_items: 0,
            total_value: 0,
            levels: Vec::new(),
            current_level: 0,
            remaining: BTreeMap::new(),
        }
    }

    pub fn with_accept_interval(mut self, interval: Fixed64) -> Self {
        self.accept_interval = interval;
        self
    }

    /// Install the legacy level list and load the first level.
    pub fn with_levels(mut self, levels: Vec<RequirementLevel>) -> Self {
        self.levels = levels;
        self.current_level = 0;
        self.load_level();
        self
    }

    fn load_level(&mut self) {
        self.remaining = self
            .levels
            .get(self.current_level)
            .map(|level| {
                level
                    .requirements
                    .iter()
                    .map(|(t, n)| (*t, i64::try_from(*n).unwrap_or(i64::MAX)))
                    .collect()
            })
            .unwrap_or_default();
    }

    pub fn stored_count(&self, item_type: ItemType) -> u64 {
        self.stored_counts.get(&item_type).copied().unwrap_or(0)
    }

    pub fn stored_counts(&self) -> &BTreeMap<ItemType, u64> {
        &self.stored_counts
    }

    pub fn completed_sets(&self) -> &BTreeSet<ItemType> {
        &self.completed_sets
    }

    pub fn available_boosts(&self) -> u32 {
        self.available_boosts
    }

    pub fn is_game_completed(&self) -> bool {
        self.game_completed
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_value(&self) -> u64 {
        self.total_value
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[RequirementLevel] {
        &self.levels
    }

    /// Outstanding count for `item_type` on the current level.
    pub fn remaining(&self, item_type: ItemType) -> Option<i64> {
        self.remaining.get(&item_type).copied()
    }

    pub fn remaining_requirements(&self) -> &BTreeMap<ItemType, i64> {
        &self.remaining
    }

    /// Spend one earned speed boost.
    pub fn use_speed_boost(&mut self) -> bool {
        if self.available_boosts == 0 {
            return false;
        }
        self.available_boosts -= 1;
        true
    }

    pub(crate) fn tick(&mut self, dt: Fixed64, input: &mut VecDeque<Item>, events: &mut Vec<TileEvent>) {
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < self.accept_interval {
            return;
        }
        match input.pop_front() {
            Some(item) => {
                self.elapsed = Fixed64::ZERO;
                self.consume(item, events);
            }
            None => self.elapsed = self.accept_interval,
        }
    }

    /// Book one delivered item and report any progress it completes.
    pub fn consume(&mut self, item: Item, events: &mut Vec<TileEvent>) {
        let units = item.stack_size() as u64;
        let count = self.stored_counts.entry(item.item_type).or_insert(0);
        *count += units;
        let count = *count;
        self.total_items += units;
        self.total_value = self.total_value.saturating_add(item.total_value());

        if item.item_type.is_number()
            && count >= self.completion_threshold
            && self.completed_sets.insert(item.item_type)
        {
            self.available_boosts += 1;
            info!(item = %item.item_type, boosts = self.available_boosts, "set completed");
            events.push(TileEvent::SetCompleted(item.item_type));
            if item.item_type.number() == Some(self.final_value) {
                self.finish_game(events);
            }
        }

        self.track_requirements(&item, units, events);
        events.push(TileEvent::Consumed(item));
    }

    fn track_requirements(&mut self, item: &Item, units: u64, events: &mut Vec<TileEvent>) {
        // A level with nothing outstanding is already satisfied.
        self.advance_satisfied_levels(events);

        let level = self.current_level;
        let Some(left) = self.remaining.get_mut(&item.item_type) else {
            return;
        };
        let before = *left;
        *left = left.saturating_sub(i64::try_from(units).unwrap_or(i64::MAX));
        if before > 0 && *left <= 0 {
            events.push(TileEvent::RequirementCompleted {
                item_type: item.item_type,
                level,
            });
        }
        self.advance_satisfied_levels(events);
    }

    fn advance_satisfied_levels(&mut self, events: &mut Vec<TileEvent>) {
        while self.current_level < self.levels.len()
            && self.remaining.values().all(|left| *left <= 0)
        {
            let level = self.current_level;
            info!(level, "level completed");
            events.push(TileEvent::LevelCompleted { level });
            self.current_level += 1;
            self.load_level();
            if self.current_level >= self.levels.len() {
                self.finish_game(events);
            }
        }
    }

    fn finish_game(&mut self, events: &mut Vec<TileEvent>) {
        if self.game_completed {
            return;
        }
        self.game_completed = true;
        info!(total_items = self.total_items, "game completed");
        events.push(TileEvent::GameCompleted);
    }
}
