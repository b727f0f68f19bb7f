use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use zonewarden::clock::FixedClock;
use zonewarden::config::EngineConfig;
use zonewarden::coordinator::{RequestContext, ZoneMutationCoordinator};
use zonewarden::serial::{next_serial, serial_gt};
use zonewarden::store::MemoryZoneRepository;
use zonewarden::zone::SoaRecord;

fn bench_next_serial(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2011, 5, 26).unwrap();

    c.bench_function("next serial same day", |b| {
        b.iter(|| next_serial(black_box(2011052600), black_box(today)));
    });
    c.bench_function("next serial counter", |b| {
        b.iter(|| next_serial(black_box(123_456), black_box(today)));
    });
    c.bench_function("serial gt", |b| {
        b.iter(|| serial_gt(black_box(5), black_box(u32::MAX)));
    });
}

fn bench_serial_bump(c: &mut Criterion) {
    let repository = Arc::new(MemoryZoneRepository::new());
    let soa = SoaRecord {
        mname: "ns1.example.com.".to_string(),
        rname: "hostmaster.example.com.".to_string(),
        serial: 1,
        refresh: 3600,
        retry: 900,
        expire: 604800,
        minimum: 300,
        ttl: 3600,
    };
    let zone = repository.create_zone("example.com.", soa).unwrap();
    let clock = FixedClock::new(NaiveDate::from_ymd_opt(2011, 5, 26).unwrap());
    let coordinator = ZoneMutationCoordinator::new(repository, clock, &EngineConfig::default());
    let ctx = RequestContext::new("bench");

    c.bench_function("bump serial", |b| {
        b.iter(|| coordinator.bump_serial(black_box(zone.id), &ctx));
    });
}

criterion_group!(benches, bench_next_serial, bench_serial_bump);
criterion_main!(benches);
