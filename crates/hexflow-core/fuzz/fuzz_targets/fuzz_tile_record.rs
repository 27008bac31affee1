#![no_main]
use hexflow_core::record::TileRecord;
use hexflow_core::tile::Tile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|fields: Vec<(String, String)>| {
    let record: TileRecord = fields.into_iter().collect();
    if let Ok(tile) = Tile::from_record(&record) {
        // Whatever was read back must write and read again.
        let again = Tile::from_record(&tile.to_record());
        assert!(again.is_ok());
        let _ = tile.info();
    }
});
