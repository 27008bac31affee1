//! Typed event system with pre-allocated ring buffers.
//!
//! Events are emitted while the engine ticks tiles, routes items and moves
//! belts, and are delivered in batch once the tick's item movement is done.
//! Each event kind has its own [`EventBuffer`] with a configurable capacity.
//!
//! # Subscriber Types
//!
//! - **Passive listeners**: read-only, used for UI updates and analytics.
//! - **Reactive handlers**: return [`EventMutation`]s that the engine applies
//!   at the start of the next tick, never during the current one.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`]. Suppressed kinds
//! are never buffered.

use crate::fixed::{Fixed64, Ticks};
use crate::grid::HexCoord;
use crate::id::{ItemType, TileId};
use crate::item::Item;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Items --
    ItemProduced {
        tile: TileId,
        item: Item,
        tick: Ticks,
    },
    ItemConsumed {
        tile: TileId,
        item: Item,
        tick: Ticks,
    },
    ItemRouted {
        from: TileId,
        to: TileId,
        item_type: ItemType,
        tick: Ticks,
    },

    // -- Progress --
    SetCompleted {
        item_type: ItemType,
        tick: Ticks,
    },
    RequirementCompleted {
        item_type: ItemType,
        level: usize,
        tick: Ticks,
    },
    LevelCompleted {
        level: usize,
        tick: Ticks,
    },
    GameCompleted {
        tick: Ticks,
    },

    // -- Tiles --
    TilePlaced {
        tile: TileId,
        position: HexCoord,
        tick: Ticks,
    },
    TileRemoved {
        tile: TileId,
        position: HexCoord,
        tick: Ticks,
    },
    TileDestroyed {
        tile: TileId,
        position: HexCoord,
        discarded: usize,
        tick: Ticks,
    },

    // -- Boosts --
    SpeedBoostActivated {
        multiplier: Fixed64,
        duration: Fixed64,
        tick: Ticks,
    },
    SpeedBoostExpired {
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemProduced,
    ItemConsumed,
    ItemRouted,
    SetCompleted,
    RequirementCompleted,
    LevelCompleted,
    GameCompleted,
    TilePlaced,
    TileRemoved,
    TileDestroyed,
    SpeedBoostActivated,
    SpeedBoostExpired,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 12;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ItemProduced { .. } => EventKind::ItemProduced,
            Event::ItemConsumed { .. } => EventKind::ItemConsumed,
            Event::ItemRouted { .. } => EventKind::ItemRouted,
            Event::SetCompleted { .. } => EventKind::SetCompleted,
            Event::RequirementCompleted { .. } => EventKind::RequirementCompleted,
            Event::LevelCompleted { .. } => EventKind::LevelCompleted,
            Event::GameCompleted { .. } => EventKind::GameCompleted,
            Event::TilePlaced { .. } => EventKind::TilePlaced,
            Event::TileRemoved { .. } => EventKind::TileRemoved,
            Event::TileDestroyed { .. } => EventKind::TileDestroyed,
            Event::SpeedBoostActivated { .. } => EventKind::SpeedBoostActivated,
            Event::SpeedBoostExpired { .. } => EventKind::SpeedBoostExpired,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::ItemProduced { tick, .. }
            | Event::ItemConsumed { tick, .. }
            | Event::ItemRouted { tick, .. }
            | Event::SetCompleted { tick, .. }
            | Event::RequirementCompleted { tick, .. }
            | Event::LevelCompleted { tick, .. }
            | Event::GameCompleted { tick }
            | Event::TilePlaced { tick, .. }
            | Event::TileRemoved { tick, .. }
            | Event::TileDestroyed { tick, .. }
            | Event::SpeedBoostActivated { tick, .. }
            | Event::SpeedBoostExpired { tick } => *tick,
        }
    }
}

impl EventKind {
    /// Convert to usize index for array lookups.
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Mutations (returned by reactive handlers)
// ---------------------------------------------------------------------------

/// A change a reactive handler asks for. Collected during delivery and
/// applied before anything else on the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMutation {
    /// Remove whatever tile sits at `position`.
    RemoveTile { position: HexCoord },
    /// Switch a tile on or off.
    SetActive { position: HexCoord, active: bool },
    /// Spend one of the receiver's earned speed boosts.
    ActivateSpeedBoost,
}

// ---------------------------------------------------------------------------
// EventBuffer -- pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer for events. Fixed capacity; when full, the
/// oldest events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    /// Events overwritten before they were read.
    dropped: u64,
}

impl EventBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an event into the ring buffer. If full, the oldest event is dropped.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        } else {
            self.dropped += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate over events in order from oldest to newest.
    pub fn iter(&self) -> EventBufferIter<'_> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head points to the next write position, which is the oldest entry
            self.head
        };
        EventBufferIter {
            buffer: self,
            index: start,
            remaining: self.len,
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over events in an [`EventBuffer`], from oldest to newest.
pub struct EventBufferIter<'a> {
    buffer: &'a EventBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventBufferIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.buffer.events[self.index].as_ref();
        self.index = (self.index + 1) % self.buffer.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventBufferIter<'_> {}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// A reactive handler receives an event and returns zero or more mutations
/// to apply on the next tick.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<EventMutation>>;

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Passive(_) => write!(f, "Passive(<fn>)"),
            Subscriber::Reactive(_) => write!(f, "Reactive(<fn>)"),
        }
    }
}

/// Priority level for event subscribers. Lower priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

struct SubscriberEntry {
    subscriber: Subscriber,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    insertion_order: u64,
}

impl std::fmt::Debug for SubscriberEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberEntry")
            .field("subscriber", &self.subscriber)
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .field("insertion_order", &self.insertion_order)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The central event bus. Holds one ring buffer per event kind, subscriber
/// lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<SubscriberEntry>; EVENT_KIND_COUNT],
    /// Drained by the engine at the start of the next tick.
    pending_mutations: Vec<EventMutation>,
    default_capacity: usize,
    /// Monotonically increasing counter for stable sort ordering.
    next_insertion_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("pending_mutations", &self.pending_mutations)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a new event bus with the given default buffer capacity per kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: std::array::from_fn(|_| Vec::new()),
            pending_mutations: Vec::new(),
            default_capacity,
            next_insertion_order: 0,
        }
    }

    /// Suppress an event kind and drop its buffer.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event. No-ops if the event kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a passive listener with Normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.on_passive_filtered(kind, SubscriberPriority::Normal, None, listener);
    }

    /// Register a reactive handler with Normal priority and no filter.
    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.on_reactive_filtered(kind, SubscriberPriority::Normal, None, handler);
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) {
        self.subscribe(kind, priority, filter, Subscriber::Passive(listener));
    }

    pub fn on_reactive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        handler: ReactiveHandler,
    ) {
        self.subscribe(kind, priority, filter, Subscriber::Reactive(handler));
    }

    fn subscribe(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        subscriber: Subscriber,
    ) {
        let order = self.next_insertion_order;
        self.next_insertion_order += 1;
        self.subscribers[kind.index()].push(SubscriberEntry {
            subscriber,
            priority,
            filter,
            insertion_order: order,
        });
    }

    /// Deliver all buffered events to subscribers, then clear the buffers.
    ///
    /// Within a kind, subscribers run in `(priority, registration)` order and
    /// see events oldest first. Reactive mutations accumulate until
    /// [`EventBus::drain_mutations`].
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }
            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            let events: Vec<Event> = buffer.iter().cloned().collect();
            self.subscribers[idx].sort_by_key(|entry| (entry.priority as u8, entry.insertion_order));

            for entry in &mut self.subscribers[idx] {
                for event in &events {
                    if let Some(ref filter) = entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    match &mut entry.subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_mutations.extend(handler(event));
                        }
                    }
                }
            }

            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Queue a mutation directly, as if a reactive handler had returned it.
    pub fn enqueue_mutation(&mut self, mutation: EventMutation) {
        self.pending_mutations.push(mutation);
    }

    pub fn drain_mutations(&mut self) -> Vec<EventMutation> {
        std::mem::take(&mut self.pending_mutations)
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events of `kind` currently waiting for delivery.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffers[kind.index()].as_ref().map_or(0, |b| b.len())
    }

    /// Events of `kind` ever emitted, including dropped and delivered ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffers[kind.index()]
            .as_ref()
            .map_or(0, |b| b.total_written())
    }

    /// Clear all buffers. Keeps subscribers and suppression settings.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        self.pending_mutations.clear();
    }

    pub fn pending_mutation_count(&self) -> usize {
        self.pending_mutations.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tile_id() -> TileId {
        use slotmap::SlotMap;
        let mut sm = SlotMap::<TileId, ()>::with_key();
        sm.insert(())
    }

    fn produced(tile: TileId, n: u32, tick: Ticks) -> Event {
        Event::ItemProduced {
            tile,
            item: Item::of(ItemType::Number(n)),
            tick,
        }
    }

    // -----------------------------------------------------------------------
    // Test 1: ring buffer keeps the newest events
    // -----------------------------------------------------------------------
    #[test]
    fn event_buffer_ring_wraps_and_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        let tile = tile_id();
        for i in 0..5u64 {
            buf.push(produced(tile, 1, i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        assert_eq!(buf.dropped_count(), 2);
        let ticks: Vec<Ticks> = buf.iter().map(Event::tick).collect();
        assert_eq!(ticks, vec![2, 3, 4]);
        assert_eq!(buf.iter().len(), 3);
    }

    #[test]
    fn cleared_buffer_reports_no_phantom_drops() {
        let mut buf = EventBuffer::new(3);
        let tile = tile_id();
        for tick in 0..4u64 {
            buf.push(produced(tile, 1, tick));
            buf.push(produced(tile, 2, tick));
            buf.clear();
        }
        assert_eq!(buf.total_written(), 8);
        assert_eq!(buf.dropped_count(), 0);

        for tick in 0..4u64 {
            buf.push(produced(tile, 3, tick));
        }
        assert_eq!(buf.dropped_count(), 1);
    }

    #[test]
    fn event_buffer_zero_capacity_clamped() {
        let mut buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(Event::GameCompleted { tick: 1 });
        buf.push(Event::GameCompleted { tick: 2 });
        assert_eq!(buf.iter().next().map(Event::tick), Some(2));
    }

    // -----------------------------------------------------------------------
    // Test 2: suppression
    // -----------------------------------------------------------------------
    #[test]
    fn suppressed_kind_is_never_buffered() {
        let mut bus = EventBus::new(16);
        bus.emit(Event::SpeedBoostExpired { tick: 0 });
        bus.suppress(EventKind::SpeedBoostExpired);
        assert!(bus.buffer(EventKind::SpeedBoostExpired).is_none());
        bus.emit(Event::SpeedBoostExpired { tick: 1 });
        assert_eq!(bus.buffered_count(EventKind::SpeedBoostExpired), 0);
        assert!(bus.is_suppressed(EventKind::SpeedBoostExpired));
    }

    // -----------------------------------------------------------------------
    // Test 3: delivery
    // -----------------------------------------------------------------------
    #[test]
    fn passive_listener_sees_events_then_buffer_clears() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        bus.on_passive(
            EventKind::SetCompleted,
            Box::new(move |e| sink.borrow_mut().push(e.clone())),
        );

        bus.emit(Event::SetCompleted {
            item_type: ItemType::Number(3),
            tick: 7,
        });
        bus.emit(produced(tile_id(), 3, 7));
        bus.deliver();

        assert_eq!(
            *seen.borrow(),
            vec![Event::SetCompleted {
                item_type: ItemType::Number(3),
                tick: 7
            }]
        );
        assert_eq!(bus.buffered_count(EventKind::SetCompleted), 0);
        assert_eq!(bus.total_emitted(EventKind::SetCompleted), 1);
    }

    #[test]
    fn reactive_handler_mutations_wait_for_drain() {
        let mut bus = EventBus::new(16);
        bus.on_reactive(
            EventKind::SetCompleted,
            Box::new(|_| vec![EventMutation::ActivateSpeedBoost]),
        );
        bus.emit(Event::SetCompleted {
            item_type: ItemType::Number(1),
            tick: 0,
        });
        bus.emit(Event::SetCompleted {
            item_type: ItemType::Number(2),
            tick: 0,
        });
        assert_eq!(bus.pending_mutation_count(), 0);
        bus.deliver();
        assert_eq!(bus.pending_mutation_count(), 2);
        assert_eq!(bus.drain_mutations().len(), 2);
        assert_eq!(bus.pending_mutation_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 4: priorities and filters
    // -----------------------------------------------------------------------
    #[test]
    fn priorities_order_subscribers() {
        let mut bus = EventBus::new(16);
        let log = Rc::new(RefCell::new(Vec::new()));
        for (priority, label) in [
            (SubscriberPriority::Post, "post"),
            (SubscriberPriority::Normal, "normal"),
            (SubscriberPriority::Pre, "pre"),
        ] {
            let log = log.clone();
            bus.on_passive_filtered(
                EventKind::GameCompleted,
                priority,
                None,
                Box::new(move |_| log.borrow_mut().push(label)),
            );
        }
        bus.emit(Event::GameCompleted { tick: 3 });
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["pre", "normal", "post"]);
    }

    #[test]
    fn filter_skips_non_matching_events() {
        let mut bus = EventBus::new(16);
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        bus.on_passive_filtered(
            EventKind::ItemProduced,
            SubscriberPriority::Normal,
            Some(Box::new(|e| {
                matches!(e, Event::ItemProduced { item, .. } if item.item_type == ItemType::Number(10))
            })),
            Box::new(move |_| *c.borrow_mut() += 1),
        );
        let tile = tile_id();
        bus.emit(produced(tile, 9, 0));
        bus.emit(produced(tile, 10, 0));
        bus.emit(produced(tile, 10, 1));
        bus.deliver();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn clear_all_drops_buffers_and_mutations() {
        let mut bus = EventBus::new(16);
        bus.emit(Event::GameCompleted { tick: 0 });
        bus.enqueue_mutation(EventMutation::ActivateSpeedBoost);
        bus.clear_all();
        assert_eq!(bus.buffered_count(EventKind::GameCompleted), 0);
        assert_eq!(bus.pending_mutation_count(), 0);
    }

    #[test]
    fn every_event_maps_to_its_kind() {
        let tile = tile_id();
        let pos = HexCoord::ORIGIN;
        let one = Fixed64::from_num(1);
        let cases = [
            (produced(tile, 1, 0), EventKind::ItemProduced),
            (
                Event::ItemConsumed { tile, item: Item::of(ItemType::Number(1)), tick: 0 },
                EventKind::ItemConsumed,
            ),
            (
                Event::ItemRouted { from: tile, to: tile, item_type: ItemType::Number(1), tick: 0 },
                EventKind::ItemRouted,
            ),
            (
                Event::RequirementCompleted { item_type: ItemType::Number(1), level: 0, tick: 0 },
                EventKind::RequirementCompleted,
            ),
            (Event::LevelCompleted { level: 0, tick: 0 }, EventKind::LevelCompleted),
            (Event::TilePlaced { tile, position: pos, tick: 0 }, EventKind::TilePlaced),
            (Event::TileRemoved { tile, position: pos, tick: 0 }, EventKind::TileRemoved),
            (
                Event::TileDestroyed { tile, position: pos, discarded: 0, tick: 0 },
                EventKind::TileDestroyed,
            ),
            (
                Event::SpeedBoostActivated { multiplier: one, duration: one, tick: 0 },
                EventKind::SpeedBoostActivated,
            ),
        ];
        for (event, kind) in cases {
            assert_eq!(event.kind(), kind);
        }
    }
}
