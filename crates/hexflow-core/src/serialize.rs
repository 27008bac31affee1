//! Whole-engine snapshots.
//!
//! Provides binary serialization via `bitcode` behind a magic-number header,
//! and a snapshot ring buffer for undo. Snapshots carry no format version:
//! a snapshot is only expected to load into the build that wrote it.

use crate::engine::{ActiveBoost, Engine};
use crate::event::EventBus;
use crate::grid::HexGrid;
use crate::id::TileId;
use crate::recipe::RecipeBook;
use crate::sim::{EngineConfig, SimState, SimStats, SimulationStrategy};
use crate::tile::Tile;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::warn;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a hexflow engine snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x4E3F_0001;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("no snapshot at index {0}")]
    NoSnapshot(usize),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every serialized snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    /// Tick at which the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        Ok(())
    }
}

/// Read only the header of a snapshot.
///
/// bitcode has no partial decoding, so the whole payload is decoded.
pub fn read_snapshot_header(data: &[u8]) -> Result<SnapshotHeader, DeserializeError> {
    let snapshot: EngineSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    Ok(snapshot.header)
}

// ---------------------------------------------------------------------------
// Serializable engine state
// ---------------------------------------------------------------------------

/// Everything in the engine except the EventBus, which holds closures.
#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    grid: HexGrid,
    tiles: SlotMap<TileId, Tile>,
    recipes: RecipeBook,
    receiver: Option<TileId>,
    strategy: SimulationStrategy,
    sim_state: SimState,
    config: EngineConfig,
    paused: bool,
    stats: SimStats,
    boost: Option<ActiveBoost>,
    last_state_hash: u64,
}

// ---------------------------------------------------------------------------
// SnapshotRingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer of serialized engine snapshots.
///
/// When the buffer is full, the oldest snapshot is evicted.
#[derive(Debug)]
pub struct SnapshotRingBuffer {
    entries: Vec<Option<SnapshotEntry>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total snapshots ever taken (including evicted).
    total_taken: u64,
}

#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub tick: u64,
    /// Serialized engine state (bitcode bytes).
    pub data: Vec<u8>,
}

impl SnapshotRingBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_taken: 0,
        }
    }

    pub fn push(&mut self, entry: SnapshotEntry) {
        self.entries[self.head] = Some(entry);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_taken += 1;
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_taken(&self) -> u64 {
        self.total_taken
    }

    /// Get a snapshot by index (0 = oldest, len-1 = newest).
    pub fn get(&self, index: usize) -> Option<&SnapshotEntry> {
        if index >= self.len {
            return None;
        }
        let start = if self.len < self.capacity() {
            0
        } else {
            self.head
        };
        self.entries[(start + index) % self.capacity()].as_ref()
    }

    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Engine serialization methods
// ---------------------------------------------------------------------------

impl Engine {
    /// Serialize the engine state to a binary blob via bitcode.
    ///
    /// The EventBus is excluded. On deserialize, a fresh EventBus is created.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(self.sim_state.tick),
            grid: self.grid.clone(),
            tiles: self.tiles.clone(),
            recipes: self.recipes.clone(),
            receiver: self.receiver,
            strategy: self.strategy.clone(),
            sim_state: self.sim_state.clone(),
            config: self.config.clone(),
            paused: self.paused,
            stats: self.stats.clone(),
            boost: self.boost.clone(),
            last_state_hash: self.last_state_hash,
        };

        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Deserialize an engine from a binary blob.
    ///
    /// The EventBus is recreated empty. Subscribers and suppressions must be
    /// registered again.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: EngineSnapshot = bitcode::deserialize(data).map_err(|e| {
            warn!(error = %e, "snapshot decode failed");
            DeserializeError::Decode(e.to_string())
        })?;
        snapshot.header.validate()?;

        Ok(Engine {
            grid: snapshot.grid,
            tiles: snapshot.tiles,
            recipes: snapshot.recipes,
            receiver: snapshot.receiver,
            strategy: snapshot.strategy,
            sim_state: snapshot.sim_state,
            event_bus: EventBus::new(snapshot.config.event_buffer_capacity),
            config: snapshot.config,
            paused: snapshot.paused,
            stats: snapshot.stats,
            boost: snapshot.boost,
            last_state_hash: snapshot.last_state_hash,
        })
    }

    /// Serialize into `ring`, evicting the oldest entry when full.
    pub fn take_snapshot(&self, ring: &mut SnapshotRingBuffer) -> Result<(), SerializeError> {
        let data = self.serialize()?;
        ring.push(SnapshotEntry {
            tick: self.sim_state.tick,
            data,
        });
        Ok(())
    }

    /// Rebuild the engine stored at `index` in `ring` (0 = oldest).
    pub fn restore_snapshot(ring: &SnapshotRingBuffer, index: usize) -> Result<Self, DeserializeError> {
        let entry = ring.get(index).ok_or(DeserializeError::NoSnapshot(index))?;
        Self::deserialize(&entry.data)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
