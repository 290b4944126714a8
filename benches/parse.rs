use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use markly::{parse, parse_with_config, ParseConfig};

fn prose(paragraphs: usize) -> String {
    let mut out = String::new();
    for i in 0..paragraphs {
        out.push_str(&format!(
            "Paragraph number {i} with plain readable words and nothing else.\n\
             A second line keeps the block from being trivial.\n\n"
        ));
    }
    out
}

fn mixed_document(sections: usize) -> String {
    let mut out = String::new();
    for i in 0..sections {
        out.push_str(&format!("## Section {i}\n\n"));
        out.push_str("Some *emphasized* text with a [link](/url) and `code`.\n\n");
        out.push_str("- item one\n- item two\n- item three\n\n");
        out.push_str("```rust\nfn demo() -> u32 { 42 }\n```\n\n");
        out.push_str("> A quoted remark spanning\n> two lines.\n\n");
    }
    out
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");
    for sections in [10usize, 100, 1000] {
        let source = mixed_document(sections);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("mixed", sections),
            &source,
            |b, source| b.iter(|| parse(black_box(source)).unwrap()),
        );
    }
    group.finish();
}

fn bench_fast_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("fast_paths");
    let plain = prose(200);
    group.throughput(Throughput::Bytes(plain.len() as u64));
    group.bench_function("ultra_fast_prose", |b| {
        b.iter(|| parse(black_box(&plain)).unwrap())
    });

    let headings: String = (0..200).map(|i| format!("## Heading {i}\n\n")).collect();
    group.bench_function("heading_pattern", |b| {
        b.iter(|| parse(black_box(&headings)).unwrap())
    });
    group.finish();
}

fn bench_pathological(c: &mut Criterion) {
    let mut group = c.benchmark_group("pathological");
    group.sample_size(20);

    let brackets = "[".repeat(10_000);
    group.bench_function("open_brackets", |b| {
        b.iter(|| parse(black_box(&brackets)).unwrap())
    });

    let asterisks = "*".repeat(10_000);
    group.bench_function("asterisk_run", |b| {
        b.iter(|| parse(black_box(&asterisks)).unwrap())
    });

    let quotes = "> ".repeat(64) + "deep";
    group.bench_function("nested_quotes", |b| {
        b.iter(|| parse(black_box(&quotes)).unwrap())
    });
    group.finish();
}

fn bench_gfm_tables(c: &mut Criterion) {
    let config = ParseConfig::gfm();
    let mut table = String::from("| a | b | c |\n|---|---|---|\n");
    for i in 0..500 {
        table.push_str(&format!("| {i} | *{i}* | `{i}` |\n"));
    }
    c.bench_function("gfm_table_500_rows", |b| {
        b.iter(|| parse_with_config(black_box(&table), &config, None).unwrap())
    });
}

criterion_group!(
    benches,
    bench_scaling,
    bench_fast_paths,
    bench_pathological,
    bench_gfm_tables
);
criterion_main!(benches);
