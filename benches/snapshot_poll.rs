//! Benchmarks for the polling hot path against a simulated region
//!
//! Covers:
//! - Row copy with tick verification
//! - Variable offset lookup across a full-size descriptor table
//! - Typed reads from a copied row
//! - Session document queries
//!
//! Platform: Cross-platform (simulated producer, CI-safe)

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use irsdk_poll::simulator::{Producer, RegionLayout};
use irsdk_poll::types::{VarData, VariableType};
use irsdk_poll::{Connection, MemoryEvent, MemoryRegion, ReaderConfig, SessionMetadata, SessionPath};
use std::fmt::Write;
use std::hint::black_box;

/// Roughly the size of a live variable table.
const VARIABLE_COUNT: usize = 300;

fn producer() -> Producer {
    let mut layout = RegionLayout::new(3).tick_rate(60);
    for index in 0..VARIABLE_COUNT {
        let (ty, count) = match index % 4 {
            0 => (VariableType::Float, 1),
            1 => (VariableType::Int, 1),
            2 => (VariableType::Double, 1),
            _ => (VariableType::Float, 64),
        };
        layout = layout.variable(&format!("Var{index:03}"), ty, count, "", "benchmark variable");
    }
    layout.build().expect("valid layout")
}

fn connect(producer: &Producer) -> Connection<MemoryRegion, MemoryEvent> {
    Connection::from_parts(producer.region(), producer.event(), ReaderConfig::default())
        .expect("attach to simulated region")
}

fn session_document(drivers: usize) -> String {
    let mut doc = String::from("WeekendInfo:\n TrackName: spa up\nDriverInfo:\n Drivers:\n");
    for car in 0..drivers {
        let rating = 1000 + car;
        let _ = write!(doc, " - CarIdx: {car}\n   UserName: Driver {car}\n   IRating: {rating}\n");
    }
    doc
}

fn bench_poll(c: &mut Criterion) {
    let mut producer = producer();
    let mut connection = connect(&producer);
    let row = producer.row().build();
    let mut dst = vec![0u8; connection.row_len().expect("row length")];

    let mut group = c.benchmark_group("poll");
    group.bench_function("copy_new_row", |b| {
        b.iter(|| {
            producer.publish(&row).expect("publish");
            black_box(connection.poll(Some(&mut dst)).expect("poll"))
        })
    });
    group.bench_function("no_change", |b| {
        b.iter(|| black_box(connection.poll(None).expect("poll")))
    });
    group.finish();
}

fn bench_variable_lookup(c: &mut Criterion) {
    let producer = producer();
    let connection = connect(&producer);

    let mut group = c.benchmark_group("variable_offset");
    for index in [0, VARIABLE_COUNT / 2, VARIABLE_COUNT - 1] {
        let name = format!("Var{index:03}");
        group.bench_with_input(BenchmarkId::from_parameter(index), &name, |b, name| {
            b.iter(|| black_box(connection.variable_offset(name).expect("lookup")))
        });
    }
    group.bench_function("missing", |b| {
        b.iter(|| black_box(connection.variable_offset("Throttle").expect("lookup")))
    });
    group.finish();
}

fn bench_typed_reads(c: &mut Criterion) {
    let mut producer = producer();
    let mut connection = connect(&producer);
    let row = producer.row().build();
    producer.publish(&row).expect("publish");
    let snapshot = connection.try_snapshot().expect("read").expect("row published");
    let scalar = connection.variable_by_name("Var000").expect("table").expect("scalar");
    let array = connection.variable_by_name("Var003").expect("table").expect("array");

    let mut group = c.benchmark_group("typed_read");
    group.bench_function("f32_scalar", |b| {
        b.iter(|| black_box(f32::from_row(&snapshot.data, &scalar).expect("read")))
    });
    group.bench_function("f32_array_64", |b| {
        b.iter(|| black_box(Vec::<f32>::from_row(&snapshot.data, &array).expect("read")))
    });
    group.finish();
}

fn bench_session_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_lookup");
    for drivers in [8, 64] {
        let meta = SessionMetadata::new(session_document(drivers).into_bytes(), 1);
        let path = SessionPath::new()
            .key("DriverInfo")
            .key("Drivers")
            .key_eq("CarIdx", drivers - 1)
            .key("IRating");
        group.bench_with_input(BenchmarkId::new("last_driver", drivers), &path, |b, path| {
            b.iter(|| black_box(meta.int(path)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_poll,
    bench_variable_lookup,
    bench_typed_reads,
    bench_session_lookup
);
criterion_main!(benches);
