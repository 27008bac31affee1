//! Number chain: two producers feed an adder whose sums ride a belt into the
//! receiver. Completing a set of fives spends the earned boost right away and
//! finishes the game.
//!
//! Run with: `RUST_LOG=debug cargo run -p hexflow-core --example number_chain`

use hexflow_core::belt::ConveyorBelt;
use hexflow_core::engine::Engine;
use hexflow_core::event::{Event, EventKind, EventMutation};
use hexflow_core::fixed::Fixed64;
use hexflow_core::grid::{HexCoord, HexDirection};
use hexflow_core::id::ItemType;
use hexflow_core::producer::Producer;
use hexflow_core::receiver::CentralReceiver;
use hexflow_core::recipe::TransformKind;
use hexflow_core::sim::{EngineConfig, SimulationStrategy};
use hexflow_core::tile::Tile;
use hexflow_core::transformer::Transformer;
use std::error::Error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig {
        final_value: 5,
        ..EngineConfig::default()
    };
    let mut engine = Engine::with_config(
        SimulationStrategy::Tick {
            dt: Fixed64::from_num(1),
        },
        config,
    );

    // --- Layout ---
    engine.place_tile(
        HexCoord::ORIGIN,
        Tile::producer(Producer::new(ItemType::Number(2), Fixed64::from_num(2))),
    )?;
    engine.place_tile(
        HexCoord::new(0, 1),
        Tile::producer(Producer::new(ItemType::Number(3), Fixed64::from_num(2))),
    )?;
    engine.place_tile(
        HexCoord::new(1, 0),
        Tile::transformer(Transformer::new(TransformKind::Adder, Fixed64::from_num(1))),
    )?;
    for q in 2..5 {
        engine.place_tile(
            HexCoord::new(q, 0),
            Tile::belt(ConveyorBelt::new(HexDirection::East)),
        )?;
    }
    engine.place_tile(
        HexCoord::new(5, 0),
        Tile::receiver(CentralReceiver::new().with_accept_interval(Fixed64::from_num(1))),
    )?;

    // --- Events ---
    engine.on_passive(
        EventKind::SetCompleted,
        Box::new(|e| {
            if let Event::SetCompleted { item_type, tick } = e {
                println!("tick {tick}: set of {item_type} complete");
            }
        }),
    );
    engine.on_passive(
        EventKind::GameCompleted,
        Box::new(|e| println!("tick {}: game complete", e.tick())),
    );
    engine.on_reactive(
        EventKind::SetCompleted,
        Box::new(|_| vec![EventMutation::ActivateSpeedBoost]),
    );

    // --- Run ---
    let mut ticks = 0;
    while !engine.receiver().is_some_and(|r| r.is_game_completed()) && ticks < 500 {
        engine.step();
        ticks += 1;
    }

    println!("\nafter {ticks} ticks:");
    for snap in engine.snapshot_all() {
        println!(
            "  {:<12} at {:<8} held={} progress={:.2}",
            snap.kind.to_string(),
            snap.position.to_string(),
            snap.held_items,
            snap.progress.to_num::<f64>(),
        );
    }
    let stats = engine.stats();
    println!(
        "produced={} transformed={} consumed={} routed={} blocked={}",
        stats.items_produced,
        stats.items_transformed,
        stats.items_consumed,
        stats.items_routed,
        stats.blocked_handoffs,
    );
    Ok(())
}
