use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, black_box};
use bigdecimal::BigDecimal;
use std::str::FromStr;

use common_money::{floor_to_cents, round_money, RoundingMode};

// tax-engine style amounts: mostly three or four fractional digits, some negative included tax
fn tax_amounts(n: usize) -> Vec<BigDecimal> {
    (0..n)
        .map(|i| {
            let sign = if i % 7 == 0 { "-" } else { "" };
            BigDecimal::from_str(&format!("{sign}{}.{:04}", i % 250, (i * 37) % 10_000)).unwrap()
        })
        .collect()
}

fn bench_floor(c: &mut Criterion) {
    let samples = tax_amounts(1_000);
    c.bench_function("floor_to_cents_1000", |b| {
        b.iter(|| {
            for v in &samples {
                black_box(floor_to_cents(v));
            }
        })
    });
}

fn bench_modes(c: &mut Criterion) {
    let samples = tax_amounts(500);
    let mut group = c.benchmark_group("round_money");
    for mode in [RoundingMode::Floor, RoundingMode::Truncate, RoundingMode::HalfUp, RoundingMode::Bankers] {
        group.bench_with_input(BenchmarkId::from_parameter(mode.as_str()), &mode, |b, &mode| {
            b.iter(|| {
                for v in &samples {
                    black_box(round_money(v, mode));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(rounding, bench_floor, bench_modes);
criterion_main!(rounding);
