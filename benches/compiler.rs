//! Compiler benchmarks: parse + lowering, and rendering
//!
//! Run with: cargo bench --bench compiler

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use datajs::{Machine, Options, compile, dialect, parser};

const ARITHMETIC: &str = r#"
let total = 0;
for (let i = 0; i < 8; i++) {
    total = total + i * 2;
}
console.log(total);
"#;

const OBJECTS: &str = r#"
const config = {
    name: "pack",
    version: 3,
    settings: { debug: true, level: "info" },
};
config.settings.level = "warn";
console.log(config.name, config.settings.level);
"#;

const CLASSES: &str = r#"
class Animal {
    constructor(name) { this.name = name; }
    speak() { return this.name + " makes a sound"; }
}
class Dog extends Animal {
    speak() { return this.name + " barks"; }
}
console.log(new Dog("Rex").speak());
"#;

const ASYNC: &str = r#"
async function later(value) {
    await new Promise((resolve) => setTimeout(resolve, 5));
    return value;
}
later(1).then((v) => console.log(v));
"#;

const CASES: [(&str, &str); 4] = [
    ("arithmetic", ARITHMETIC),
    ("objects", OBJECTS),
    ("classes", CLASSES),
    ("async", ASYNC),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler/parse");
    for (name, source) in CASES {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, s| {
            b.iter(|| black_box(parser::parse(black_box(s))));
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler/compile");
    let options = Options::default();
    for (name, source) in CASES {
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, s| {
            b.iter(|| black_box(compile(black_box(s), &options)));
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler/render");
    let options = Options::default();
    for (name, source) in CASES {
        let program = compile(source, &options).program;
        group.bench_with_input(BenchmarkId::from_parameter(name), &program, |b, p| {
            b.iter(|| black_box(dialect::render(black_box(p))));
        });
    }
    group.finish();
}

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("compiler/simulate");
    let options = Options::default();
    for (name, source) in CASES {
        let program = compile(source, &options).program;
        group.bench_with_input(BenchmarkId::from_parameter(name), &program, |b, p| {
            b.iter(|| {
                let mut machine = Machine::new(p.clone());
                let _ = machine.run_entry();
                let _ = machine.advance_ticks(10);
                black_box(machine.output().len())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_compile, bench_render, bench_simulate);
criterion_main!(benches);
