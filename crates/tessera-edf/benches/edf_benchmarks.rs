//! Definition pipeline benchmarks.
//!
//! Measures parsing and linking of a generated definition set with one
//! property family per ten entities and a parent chain for every other entity.
//!
//! Run with: `cargo bench --bench edf_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tessera_edf::chain::DependencyChain;
use tessera_edf::linker::link;
use tessera_edf::parser::parse_edf;
use tessera_edf::sink::CollectingSink;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_edf(entity_count: usize) -> String {
    let mut text = String::new();
    for f in 0..entity_count.div_ceil(10) {
        text.push_str(&format!("[*Family{f}]\nspeed = {f}\ntag = \"family\"\n\n"));
    }
    for i in 0..entity_count {
        let family = i / 10;
        if i % 2 == 1 {
            text.push_str(&format!("[Entity{i}(Entity{})]\nhp = {i}\n\n", i - 1));
        } else {
            text.push_str(&format!(
                "[Entity{i}:Family{family}]\n@Transform\n@Sprite\nhp = {i}\npos = [1, 2]\n\n"
            ));
        }
    }
    text
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("edf_parse");
    for count in [100usize, 1000] {
        let text = generate_edf(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| black_box(parse_edf("bench.edf", text).unwrap()));
        });
    }
    group.finish();
}

fn bench_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("edf_link");
    for count in [100usize, 1000] {
        let parsed = parse_edf("bench.edf", &generate_edf(count)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &parsed, |b, parsed| {
            b.iter(|| {
                let mut sink = CollectingSink::new();
                let linked = link(&parsed.entries, &mut sink);
                black_box(linked.len());
            });
        });
    }
    group.finish();
}

fn bench_dependency_chain(c: &mut Criterion) {
    c.bench_function("dependency_chain_1k_linear", |b| {
        b.iter(|| {
            let mut chain = DependencyChain::new();
            for i in 0..1000u32 {
                chain.add_node(i);
                if i > 0 {
                    chain.connect_ab(i, i - 1);
                }
            }
            black_box(chain.resolve_chain_to_list());
        });
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_parse, bench_link, bench_dependency_chain);
criterion_main!(benches);
