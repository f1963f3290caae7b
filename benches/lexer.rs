//! Lexer benchmarks
//!
//! Run with: cargo bench --bench lexer

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use datajs::lexer::{Lexer, TokenKind};

/// Simple expression
const SIMPLE_EXPR: &str = "1 + 2 * 3 - 4 / 5";

/// Variable declarations
const VARIABLES: &str = r#"
let x = 1;
const y = 2;
var z = 3;
let a = x + y + z;
const b = a * 2;
"#;

/// String literals with escapes
const STRINGS: &str = r#"
const hello = "Hello, World!";
const escaped = "Line1\nLine2\tTabbed";
const single = 'it\'s';
const template = `Hello ${name}!`;
"#;

/// Operators stress test
const OPERATORS: &str = r#"
a + b - c * d / e % f ** g
x === y !== z == w != v
a && b || c ?? d
a += b -= c *= d /= e %= f
a < b <= c > d >= e
++x --y x++ y--
"#;

/// Class with an async method
const CLASS_DEF: &str = r#"
class Counter extends Base {
    constructor(name, initial) {
        super();
        this.name = name;
        this.count = initial;
    }

    increment() {
        this.count++;
        return this;
    }

    async settle() {
        await new Promise((resolve) => setTimeout(resolve, 20));
        return this.count;
    }
}
"#;

/// Control flow
const CONTROL_FLOW: &str = r#"
if (condition) {
    run("say yes");
} else if (other) {
    run("say maybe");
} else {
    run("say no");
}

for (let i = 0; i < 10; i++) {
    console.log(i);
}

for (const item of items) {
    process(item);
}

while (running) {
    tick();
}

switch (value) {
    case 1:
        handleOne();
        break;
    default:
        handleDefault();
}
"#;

fn generate_large_source(size: usize) -> String {
    let patterns = [VARIABLES, STRINGS, CLASS_DEF, CONTROL_FLOW];
    let mut source = String::with_capacity(size);
    for pattern in patterns.iter().cycle() {
        if source.len() >= size {
            break;
        }
        source.push_str(pattern);
        source.push_str("\n\n");
    }
    source
}

fn drain(source: &str) {
    let mut lexer = Lexer::new(black_box(source));
    loop {
        let token = lexer.next_token();
        if token.kind == TokenKind::Eof {
            break;
        }
        black_box(&token);
    }
}

fn bench_lexer_individual(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer/individual");

    let cases = [
        ("simple_expr", SIMPLE_EXPR),
        ("variables", VARIABLES),
        ("strings", STRINGS),
        ("operators", OPERATORS),
        ("class_def", CLASS_DEF),
        ("control_flow", CONTROL_FLOW),
    ];

    for (name, source) in cases {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), source, |b, s| {
            b.iter(|| drain(s));
        });
    }

    group.finish();
}

fn bench_lexer_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer/throughput");

    for size in [1_000, 10_000, 100_000] {
        let source = generate_large_source(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("large_source", format!("{}KB", source.len() / 1024)),
            &source,
            |b, s| b.iter(|| drain(s)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lexer_individual, bench_lexer_throughput);
criterion_main!(benches);
