use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lockdown_core::version::{satisfies_any, AppVersion, VersionRestriction};

/// Build a restriction list of the given size, only the last entry matching.
fn create_restrictions(count: u32) -> Vec<VersionRestriction> {
    let mut restrictions: Vec<VersionRestriction> = (0..count.saturating_sub(1))
        .map(|i| VersionRestriction::exact(100 + i, 0))
        .collect();
    restrictions.push(VersionRestriction::minimum(3, 5, 0));
    restrictions
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_version", |b| {
        b.iter(|| {
            let version = AppVersion::parse(black_box("3.5.1.2468-alliance")).unwrap();
            black_box(version);
        });
    });
}

fn bench_satisfies_any(c: &mut Criterion) {
    let mut group = c.benchmark_group("satisfies_any");
    let installed = AppVersion::parse("3.6.0").unwrap();

    for count in [1u32, 8, 64].iter() {
        let restrictions = create_restrictions(*count);

        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &restrictions,
            |b, r| {
                b.iter(|| {
                    let satisfied = satisfies_any(black_box(r), black_box(&installed));
                    black_box(satisfied);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_satisfies_any);
criterion_main!(benches);
