//! Criterion benchmarks for the query protocol codec.
//!
//! A LAN search decodes one response per server per round, so decode cost
//! bounds how many responders a single poll loop can keep up with.
//!
//! Run with:
//! ```bash
//! cargo bench --package netquery-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use netquery_core::protocol::codec::{decode_packet, encode_packet};
use netquery_core::{GameMission, GameMode, Packet, QueryData};

fn make_response() -> Packet {
    Packet::QueryResponse(QueryData {
        version: "Chocolate Doom 3.1.0".to_string(),
        server_running: false,
        num_players: 2,
        max_players: 8,
        game_mode: GameMode::Commercial,
        game_mission: GameMission::Doom2,
        description: "Friday night deathmatch".to_string(),
    })
}

fn bench_encode(c: &mut Criterion) {
    let query = Packet::Query;
    let response = make_response();
    c.bench_function("encode_query", |b| b.iter(|| encode_packet(black_box(&query))));
    c.bench_function("encode_query_response", |b| {
        b.iter(|| encode_packet(black_box(&response)))
    });
}

fn bench_decode(c: &mut Criterion) {
    let bytes = encode_packet(&make_response());
    c.bench_function("decode_query_response", |b| {
        b.iter(|| decode_packet(black_box(&bytes)))
    });
    let noise = [0x00, 0x06, 0x01, 0x02];
    c.bench_function("decode_foreign_packet", |b| {
        b.iter(|| decode_packet(black_box(&noise)))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
