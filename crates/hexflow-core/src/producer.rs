//! Producer tiles: emit a fixed item type on a timer.

use crate::fixed::{Fixed64, floor_to_u64, scaled_interval};
use crate::id::ItemType;
use crate::item::Item;
use crate::rng::SimRng;
use crate::tile::TileEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why a producer did not emit on its last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProducerStatus {
    Idle,
    OutputFull,
    Unpowered,
}

impl ProducerStatus {
    pub fn name(self) -> &'static str {
        match self {
            ProducerStatus::Idle => "idle",
            ProducerStatus::OutputFull => "output_full",
            ProducerStatus::Unpowered => "unpowered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub item_type: ItemType,
    /// Base time between emissions at efficiency, power and boost of 1.
    pub production_interval: Fixed64,
    pub efficiency: Fixed64,
    pub power_level: Fixed64,
    pub requires_power: bool,
    pub speed_boost: Fixed64,
    pub(crate) elapsed: Fixed64,
    pub(crate) rng: SimRng,
    pub items_produced: u64,
}

impl Producer {
    pub fn new(item_type: ItemType, production_interval: Fixed64) -> Self {
        let one = Fixed64::from_num(1);
        Self {
            item_type,
            production_interval,
            efficiency: one,
            power_level: one,
            requires_power: false,
            speed_boost: one,
            elapsed: Fixed64::ZERO,
            rng: SimRng::default(),
            items_produced: 0,
        }
    }

    pub fn with_efficiency(mut self, efficiency: Fixed64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn with_power(mut self, power_level: Fixed64) -> Self {
        self.requires_power = true;
        self.power_level = power_level;
        self
    }

    /// Power contributes only when the producer needs it.
    pub fn power_factor(&self) -> Fixed64 {
        if self.requires_power {
            self.power_level
        } else {
            Fixed64::from_num(1)
        }
    }

    pub fn is_powered(&self) -> bool {
        !self.requires_power || self.power_level > Fixed64::ZERO
    }

    /// Interval after efficiency, power and boost. `None` if any factor is
    /// non-positive.
    pub fn effective_interval(&self) -> Option<Fixed64> {
        let divisor = self
            .efficiency
            .saturating_mul(self.power_factor())
            .saturating_mul(self.speed_boost);
        scaled_interval(self.production_interval, divisor)
    }

    pub fn elapsed(&self) -> Fixed64 {
        self.elapsed
    }

    pub(crate) fn reseed(&mut self, seed: u64) {
        self.rng = SimRng::new(seed);
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    /// Status as of the current timer and queue state.
    pub fn status(&self, output_len: usize, output_capacity: usize) -> ProducerStatus {
        if !self.is_powered() {
            return ProducerStatus::Unpowered;
        }
        match self.effective_interval() {
            Some(interval) if self.elapsed >= interval && output_len >= output_capacity => {
                ProducerStatus::OutputFull
            }
            _ => ProducerStatus::Idle,
        }
    }

    /// Advance the timer and emit at most one item into `output`.
    pub(crate) fn tick(
        &mut self,
        dt: Fixed64,
        output: &mut VecDeque<Item>,
        output_capacity: usize,
        events: &mut Vec<TileEvent>,
    ) {
        if !self.is_powered() {
            return;
        }
        let Some(interval) = self.effective_interval() else {
            return;
        };
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < interval {
            return;
        }
        if output.len() >= output_capacity {
            // Blocked: hold at the threshold instead of banking extra time.
            self.elapsed = interval;
            return;
        }
        let item = self.make_item();
        self.elapsed = Fixed64::ZERO;
        self.items_produced += 1;
        events.push(TileEvent::Produced(item.clone()));
        output.push_back(item);
    }

    fn make_item(&mut self) -> Item {
        let factor = self.efficiency.saturating_mul(self.power_factor());
        let value = match self.item_type {
            ItemType::Number(n) => n as u64,
            ItemType::Material(m) => {
                floor_to_u64(Fixed64::saturating_from_num(m.base_value()).saturating_mul(factor))
            }
        };
        let roll = self
            .rng
            .range(Fixed64::from_num(0.8), Fixed64::from_num(1.2));
        let quality = factor
            .saturating_mul(roll)
            .clamp(Fixed64::from_num(0.1), Fixed64::from_num(2));
        Item::new(self.item_type, value, quality)
    }
}
