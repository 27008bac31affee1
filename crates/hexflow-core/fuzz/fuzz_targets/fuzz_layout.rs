#![no_main]
use arbitrary::Arbitrary;
use hexflow_core::belt::ConveyorBelt;
use hexflow_core::grid::{HexCoord, HexDirection};
use hexflow_core::producer::Producer;
use hexflow_core::receiver::CentralReceiver;
use hexflow_core::recipe::TransformKind;
use hexflow_core::test_utils::*;
use hexflow_core::tile::Tile;
use hexflow_core::transformer::Transformer;
use libfuzzer_sys::fuzz_target;

/// A structured layout edit for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Producer { q: i8, r: i8, value: u8 },
    Transformer { q: i8, r: i8, kind: u8 },
    Belt { q: i8, r: i8, dir: u8 },
    Receiver { q: i8, r: i8 },
    Remove { q: i8, r: i8 },
    Rotate { q: i8, r: i8, clockwise: bool },
    Damage { q: i8, r: i8, amount: u8 },
    Boost,
    Step,
}

fn at(q: i8, r: i8) -> HexCoord {
    HexCoord::new((q % 8) as i32, (r % 8) as i32)
}

fuzz_target!(|ops: Vec<FuzzOp>| {
    let mut engine = tick_engine();

    // Limit operations to prevent timeouts.
    for op in ops.iter().take(300) {
        match *op {
            FuzzOp::Producer { q, r, value } => {
                let _ = engine.place_tile(
                    at(q, r),
                    Tile::producer(Producer::new(
                        num(1 + value as u32 % 20),
                        fixed(1.0),
                    )),
                );
            }
            FuzzOp::Transformer { q, r, kind } => {
                let kind = TransformKind::ALL[kind as usize % TransformKind::ALL.len()];
                let _ = engine.place_tile(
                    at(q, r),
                    Tile::transformer(Transformer::new(
                        kind,
                        fixed(1.0),
                    )),
                );
            }
            FuzzOp::Belt { q, r, dir } => {
                let _ = engine.place_tile(
                    at(q, r),
                    Tile::belt(ConveyorBelt::new(
                        HexDirection::ALL[dir as usize % 6],
                    )),
                );
            }
            FuzzOp::Receiver { q, r } => {
                let _ = engine.place_tile(
                    at(q, r),
                    Tile::receiver(CentralReceiver::new()),
                );
            }
            FuzzOp::Remove { q, r } => {
                engine.remove_tile(at(q, r));
            }
            FuzzOp::Rotate { q, r, clockwise } => {
                if let Some(id) = engine.tile_id_at(at(q, r)) {
                    let _ = engine.rotate_belt(id, clockwise);
                }
            }
            FuzzOp::Damage { q, r, amount } => {
                if let Some(id) = engine.tile_id_at(at(q, r)) {
                    let _ = engine.damage_tile(id, amount as u32);
                }
            }
            FuzzOp::Boost => {
                let _ = engine.activate_speed_boost();
            }
            FuzzOp::Step => {
                engine.step();
            }
        }
        assert_eq!(engine.tile_count(), engine.grid().len());
    }
});
