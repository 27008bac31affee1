//! Transformer tiles: turn input items into output items after a delay.
//!
//! Unary kinds consume one item per operation, binary kinds consume a pair
//! found anywhere in the input queue. A transformer processes one operation
//! at a time and only starts when its output queue has room.

use crate::fixed::{Fixed64, scaled_interval};
use crate::item::Item;
use crate::recipe::{RecipeBook, TransformKind};
use crate::tile::TileEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Items held while an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InFlight {
    Single(Item),
    Pair(Item, Item),
}

impl InFlight {
    pub fn items(&self) -> Vec<&Item> {
        match self {
            InFlight::Single(a) => vec![a],
            InFlight::Pair(a, b) => vec![a, b],
        }
    }
}

/// Mutable view of a transformer tile's queues for one tick.
pub(crate) struct Queues<'a> {
    pub input: &'a mut VecDeque<Item>,
    pub input_capacity: usize,
    pub output: &'a mut VecDeque<Item>,
    pub output_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformerState {
    Idle,
    /// Binary transformer holding exactly one usable operand.
    AwaitingSecondInput,
    Processing {
        elapsed: Fixed64,
        in_flight: InFlight,
    },
}

impl TransformerState {
    pub fn name(&self) -> &'static str {
        match self {
            TransformerState::Idle => "idle",
            TransformerState::AwaitingSecondInput => "awaiting_second_input",
            TransformerState::Processing { .. } => "processing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub kind: TransformKind,
    pub processing_time: Fixed64,
    pub efficiency: Fixed64,
    pub speed_boost: Fixed64,
    pub(crate) state: TransformerState,
    pub items_transformed: u64,
    /// Operations that finished without a matching recipe.
    pub degraded: u64,
    /// Operands waiting for room to go back into the input queue.
    pub(crate) held_back: Vec<Item>,
}

impl Transformer {
    pub fn new(kind: TransformKind, processing_time: Fixed64) -> Self {
        Self {
            kind,
            processing_time,
            efficiency: Fixed64::from_num(1),
            speed_boost: Fixed64::from_num(1),
            state: TransformerState::Idle,
            items_transformed: 0,
            degraded: 0,
            held_back: Vec::new(),
        }
    }

    pub fn with_efficiency(mut self, efficiency: Fixed64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn state(&self) -> &TransformerState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, TransformerState::Processing { .. })
    }

    pub fn items_in_flight(&self) -> Vec<&Item> {
        match &self.state {
            TransformerState::Processing { in_flight, .. } => in_flight.items(),
            _ => Vec::new(),
        }
    }

    pub fn held_back(&self) -> &[Item] {
        &self.held_back
    }

    pub fn progress_elapsed(&self) -> Fixed64 {
        match &self.state {
            TransformerState::Processing { elapsed, .. } => *elapsed,
            _ => Fixed64::ZERO,
        }
    }

    pub fn effective_processing_time(&self) -> Option<Fixed64> {
        scaled_interval(
            self.processing_time,
            self.efficiency.saturating_mul(self.speed_boost),
        )
    }

    /// Gate for incoming items: only types some recipe of this kind uses.
    pub fn accepts(&self, item: &Item, recipes: &RecipeBook) -> bool {
        recipes.accepts(self.kind, item.item_type)
    }

    pub(crate) fn tick(
        &mut self,
        dt: Fixed64,
        queues: Queues<'_>,
        recipes: &RecipeBook,
        events: &mut Vec<TileEvent>,
    ) {
        self.release_held_back(queues.input, queues.input_capacity);
        if self.is_busy() {
            let Some(duration) = self.effective_processing_time() else {
                return;
            };
            let TransformerState::Processing { elapsed, .. } = &mut self.state else {
                return;
            };
            *elapsed = elapsed.saturating_add(dt);
            if *elapsed < duration {
                return;
            }
            if queues.output.len() >= queues.output_capacity {
                *elapsed = duration;
                return;
            }
            self.complete(queues, recipes, events);
            return;
        }

        if queues.output.len() >= queues.output_capacity {
            return;
        }
        self.try_start(queues.input, recipes);
    }

    fn try_start(&mut self, input: &mut VecDeque<Item>, recipes: &RecipeBook) {
        match self.kind.binary_op() {
            None => {
                let Some(front) = input.front() else {
                    self.state = TransformerState::Idle;
                    return;
                };
                if recipes.unary_output(self.kind, front.item_type).is_some() {
                    if let Some(item) = input.pop_front() {
                        self.state = TransformerState::Processing {
                            elapsed: Fixed64::ZERO,
                            in_flight: InFlight::Single(item),
                        };
                    }
                } else if input.len() > 1 {
                    // Unusable item at the head: rotate it to the back.
                    if let Some(item) = input.pop_front() {
                        debug!(kind = %self.kind, item = %item.item_type, "requeued unmatched input");
                        input.push_back(item);
                    }
                }
            }
            Some(op) => {
                let types: Vec<_> = input.iter().map(|i| i.item_type).collect();
                match recipes.find_pair(op, &types) {
                    Some((i, j, _)) => {
                        // j > i, so removing j first leaves i in place.
                        let second = input.remove(j);
                        let first = input.remove(i);
                        if let (Some(a), Some(b)) = (first, second) {
                            self.state = TransformerState::Processing {
                                elapsed: Fixed64::ZERO,
                                in_flight: InFlight::Pair(a, b),
                            };
                        }
                    }
                    None => {
                        let waiting = input.len() == 1
                            && input
                                .front()
                                .is_some_and(|i| recipes.accepts(self.kind, i.item_type));
                        self.state = if waiting {
                            TransformerState::AwaitingSecondInput
                        } else {
                            TransformerState::Idle
                        };
                    }
                }
            }
        }
    }

    fn complete(&mut self, queues: Queues<'_>, recipes: &RecipeBook, events: &mut Vec<TileEvent>) {
        let Queues {
            input,
            input_capacity,
            output,
            ..
        } = queues;
        let state = std::mem::replace(&mut self.state, TransformerState::Idle);
        let TransformerState::Processing { in_flight, .. } = state else {
            return;
        };

        match (self.kind.binary_op(), in_flight) {
            (None, InFlight::Single(item)) => match recipes.unary_output(self.kind, item.item_type) {
                Some(out_type) => {
                    let value = item.scaled_value(self.kind.type_multiplier() * self.efficiency);
                    let quality = item.quality() + Fixed64::from_num(0.2) * self.efficiency;
                    let made = item.transformed(out_type, value, quality);
                    self.items_transformed += 1;
                    events.push(TileEvent::Produced(made.clone()));
                    output.push_back(made);
                }
                None => self.degrade(item, output),
            },
            (Some(op), InFlight::Pair(a, b)) => match recipes.binary_output(op, a.item_type, b.item_type) {
                Some(out_type) => {
                    let quality = (a.quality() + b.quality()) / Fixed64::from_num(2);
                    let made = Item::new(out_type, out_type.base_value(), quality)
                        .with_processing_count(a.processing_count.max(b.processing_count) + 1);
                    self.items_transformed += 1;
                    events.push(TileEvent::Produced(made.clone()));
                    output.push_back(made);
                }
                None => {
                    debug!(kind = %self.kind, lhs = %a.item_type, rhs = %b.item_type, "pair no longer matches");
                    output.push_back(a);
                    self.return_to_input(b, input, input_capacity);
                }
            },
            (None, InFlight::Pair(a, b)) => {
                self.degrade(a, output);
                self.return_to_input(b, input, input_capacity);
            }
            (Some(_), InFlight::Single(item)) => self.degrade(item, output),
        }
    }

    /// Pass an item through untransformed.
    fn degrade(&mut self, item: Item, output: &mut VecDeque<Item>) {
        warn!(kind = %self.kind, item = %item.item_type, "operation finished without a recipe; passing item through");
        self.degraded += 1;
        output.push_back(item);
    }

    fn return_to_input(&mut self, item: Item, input: &mut VecDeque<Item>, input_capacity: usize) {
        if input.len() < input_capacity {
            input.push_front(item);
        } else {
            debug!(kind = %self.kind, item = %item.item_type, "input full; holding returned operand");
            self.held_back.push(item);
        }
    }

    /// Put held operands back at the head of the input queue, oldest in front.
    fn release_held_back(&mut self, input: &mut VecDeque<Item>, input_capacity: usize) {
        while input.len() < input_capacity {
            let Some(item) = self.held_back.pop() else {
                break;
            };
            input.push_front(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ItemType, Material};

    fn fx(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn num(n: u32) -> Item {
        Item::of(ItemType::Number(n))
    }

    struct Rig {
        t: Transformer,
        input: VecDeque<Item>,
        output: VecDeque<Item>,
        in_cap: usize,
        out_cap: usize,
        book: RecipeBook,
        events: Vec<TileEvent>,
    }

    impl Rig {
        fn new(kind: TransformKind, time: f64) -> Self {
            Self {
                t: Transformer::new(kind, fx(time)),
                input: VecDeque::new(),
                output: VecDeque::new(),
                in_cap: 6,
                out_cap: 3,
                book: RecipeBook::standard(),
                events: Vec::new(),
            }
        }

        fn tick(&mut self, dt: f64) {
            let queues = Queues {
                input: &mut self.input,
                input_capacity: self.in_cap,
                output: &mut self.output,
                output_capacity: self.out_cap,
            };
            self.t.tick(fx(dt), queues, &self.book, &mut self.events);
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: unary happy path
    // -----------------------------------------------------------------------
    #[test]
    fn smelter_turns_ore_into_plate() {
        let mut rig = Rig::new(TransformKind::Smelter, 2.0);
        rig.input.push_back(Item::of(Material::IronOre.into()));

        rig.tick(1.0); // start; this tick's dt does not count
        assert!(rig.t.is_busy());
        rig.tick(1.0);
        assert!(rig.output.is_empty());
        rig.tick(1.0);

        assert_eq!(rig.output.len(), 1);
        let plate = &rig.output[0];
        assert_eq!(plate.item_type, ItemType::Material(Material::IronPlate));
        assert_eq!(plate.value, 2);
        assert_eq!(plate.processing_count, 1);
        assert_eq!(plate.quality(), fx(1.2));
        assert_eq!(rig.t.items_transformed, 1);
        assert!(!rig.t.is_busy());
    }

    // -----------------------------------------------------------------------
    // Test 2: binary pairs from anywhere in the queue
    // -----------------------------------------------------------------------
    #[test]
    fn adder_pairs_first_matching_items() {
        let mut rig = Rig::new(TransformKind::Adder, 1.0);
        rig.input.extend([num(9), num(9), num(1)]);

        rig.tick(1.0);
        assert_eq!(rig.t.items_in_flight().len(), 2);
        assert_eq!(rig.input.len(), 1);
        assert_eq!(rig.input[0].item_type, ItemType::Number(9));

        rig.tick(1.0);
        assert_eq!(rig.output.len(), 1);
        assert_eq!(rig.output[0].item_type, ItemType::Number(10));
        assert_eq!(rig.output[0].value, 10);
        assert_eq!(rig.output[0].stack_size(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: waiting for a partner
    // -----------------------------------------------------------------------
    #[test]
    fn binary_with_one_operand_awaits_second() {
        let mut rig = Rig::new(TransformKind::Adder, 1.0);
        rig.input.push_back(num(4));
        rig.tick(1.0);
        assert_eq!(rig.t.state(), &TransformerState::AwaitingSecondInput);

        rig.input.push_back(num(5));
        rig.tick(1.0);
        assert!(rig.t.is_busy());
    }

    // -----------------------------------------------------------------------
    // Test 4: full output blocks start and completion
    // -----------------------------------------------------------------------
    #[test]
    fn full_output_blocks_start() {
        let mut rig = Rig::new(TransformKind::Smelter, 1.0);
        rig.out_cap = 1;
        rig.output.push_back(num(1));
        rig.input.push_back(Item::of(Material::IronOre.into()));
        rig.tick(1.0);
        assert!(!rig.t.is_busy());
        assert_eq!(rig.input.len(), 1);
    }

    #[test]
    fn full_output_holds_finished_operation() {
        let mut rig = Rig::new(TransformKind::Smelter, 1.0);
        rig.out_cap = 1;
        rig.input.push_back(Item::of(Material::IronOre.into()));
        rig.tick(1.0);
        rig.output.push_back(num(1));
        rig.tick(5.0);
        assert!(rig.t.is_busy());
        assert_eq!(rig.t.progress_elapsed(), fx(1.0));

        rig.output.clear();
        rig.tick(0.0);
        assert_eq!(rig.output.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 5: degraded completions never lose items
    // -----------------------------------------------------------------------
    #[test]
    fn binary_holding_single_passes_it_through() {
        let mut rig = Rig::new(TransformKind::Multiplier, 1.0);
        rig.t.state = TransformerState::Processing {
            elapsed: fx(0.0),
            in_flight: InFlight::Single(num(7)),
        };
        rig.tick(1.0);
        assert_eq!(rig.output.len(), 1);
        assert_eq!(rig.output[0].item_type, ItemType::Number(7));
        assert_eq!(rig.t.degraded, 1);
    }

    #[test]
    fn stale_pair_returns_second_to_input() {
        let mut rig = Rig::new(TransformKind::Adder, 1.0);
        rig.book = RecipeBook::empty();
        rig.t.state = TransformerState::Processing {
            elapsed: fx(0.0),
            in_flight: InFlight::Pair(num(2), num(3)),
        };
        rig.input.push_back(num(8));
        rig.tick(1.0);
        assert_eq!(rig.output.len(), 1);
        assert_eq!(rig.output[0].item_type, ItemType::Number(2));
        assert_eq!(rig.input.front().map(|i| i.item_type), Some(ItemType::Number(3)));
        assert_eq!(rig.input.len(), 2);
    }

    #[test]
    fn returned_operand_waits_for_input_room() {
        let mut rig = Rig::new(TransformKind::Adder, 1.0);
        rig.book = RecipeBook::empty();
        rig.in_cap = 1;
        rig.t.state = TransformerState::Processing {
            elapsed: fx(0.0),
            in_flight: InFlight::Pair(num(2), num(3)),
        };
        rig.input.push_back(num(8));
        rig.tick(1.0);
        assert_eq!(rig.output.len(), 1);
        assert_eq!(rig.input.len(), 1);
        assert_eq!(rig.t.held_back().len(), 1);

        // Still no room: the operand stays held, nothing is passed through.
        rig.tick(1.0);
        assert_eq!(rig.output.len(), 1);
        assert_eq!(rig.t.degraded, 0);

        rig.input.clear();
        rig.tick(0.0);
        assert!(rig.t.held_back().is_empty());
        assert_eq!(rig.input.front().map(|i| i.item_type), Some(ItemType::Number(3)));
        assert_eq!(rig.output.len(), 1);
    }

    #[test]
    fn unmatched_head_rotates_to_back() {
        let mut rig = Rig::new(TransformKind::Smelter, 1.0);
        rig.input.push_back(Item::of(Material::Coal.into()));
        rig.input.push_back(Item::of(Material::CopperOre.into()));
        rig.tick(1.0);
        assert!(!rig.t.is_busy());
        assert_eq!(
            rig.input.front().map(|i| i.item_type),
            Some(ItemType::Material(Material::CopperOre))
        );
        rig.tick(1.0);
        assert!(rig.t.is_busy());
    }

    #[test]
    fn efficiency_speeds_processing() {
        let mut t = Transformer::new(TransformKind::Crusher, fx(4.0)).with_efficiency(fx(2.0));
        t.speed_boost = fx(2.0);
        assert_eq!(t.effective_processing_time(), Some(fx(1.0)));
    }
}
