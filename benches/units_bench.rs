//! Conversion Benchmarks — Balance Display Hot Path
//!
//! Benchmarks the functions that run on every balance response.
//!
//! Run with: cargo bench --bench units_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;

use wallet_injection::domain::session::Session;
use wallet_injection::domain::units::{ETHER_DECIMALS, parse_quantity, to_display_units};

/// Benchmark decimal-string conversion (1.5 ETH).
fn bench_decimal_conversion(c: &mut Criterion) {
    c.bench_function("to_display_units_decimal", |b| {
        b.iter(|| {
            let _value = to_display_units(black_box("1500000000000000000"), ETHER_DECIMALS);
        });
    });
}

/// Benchmark hex-quantity conversion, as returned by `eth_getBalance`.
fn bench_hex_conversion(c: &mut Criterion) {
    c.bench_function("to_display_units_hex", |b| {
        b.iter(|| {
            let _value = to_display_units(black_box("0x14d1120d7b160000"), ETHER_DECIMALS);
        });
    });
}

/// Benchmark parsing a 256-bit quantity.
fn bench_parse_max(c: &mut Criterion) {
    let max = format!("0x{}", "f".repeat(64));
    c.bench_function("parse_quantity_u256_max", |b| {
        b.iter(|| {
            let _value = parse_quantity(black_box(&max));
        });
    });
}

/// Benchmark decoding an accounts payload and switching the session.
fn bench_account_switch(c: &mut Criterion) {
    let payload = json!(["0x00000000000000000000000000000000000000aa"]);

    c.bench_function("accounts_changed_switch", |b| {
        b.iter(|| {
            let accounts: Vec<String> = serde_json::from_value(black_box(payload.clone())).unwrap_or_default();
            let mut session = Session::new();
            if let Some(first) = accounts.first() {
                session.apply_account(first);
            }
            session.view()
        });
    });
}

criterion_group!(
    benches,
    bench_decimal_conversion,
    bench_hex_conversion,
    bench_parse_max,
    bench_account_switch,
);
criterion_main!(benches);
