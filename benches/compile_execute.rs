use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use exp_eval::context::{EvalConfiguration, EvalFunction};
use exp_eval::engine::{compile, execute};
use exp_eval::value::Value;
use futures::executor::block_on;
use tokio_util::sync::CancellationToken;

const EXPRESSIONS: &[(&str, &str)] = &[
    ("simple", "12+45*10"),
    ("variables", "x * 27 + (8>>2) / x"),
    ("functions", "max(sin(x), cos(x)) + sqrt(abs(x - 10))"),
    ("strings", "'total: ' + (x * 2)"),
    ("logic", "-5&&2==7&&-4>=-5>>-8*-5"),
];

fn bench_config() -> Arc<EvalConfiguration> {
    let mut cfg = EvalConfiguration::double();
    cfg.set_constant("x", 5.9);
    cfg.set_function("DoNothing", EvalFunction::lazy(|_, _| Ok(Value::Null)));
    Arc::new(cfg)
}

fn bench_compile(c: &mut Criterion) {
    let cfg = bench_config();
    let mut group = c.benchmark_group("compile");
    for (name, text) in EXPRESSIONS {
        group.bench_function(*name, |b| b.iter(|| compile(black_box(text), &cfg)));
    }
    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let cfg = bench_config();
    let mut group = c.benchmark_group("execute");
    for (name, text) in EXPRESSIONS {
        let Ok(expr) = compile(text, &cfg) else {
            panic!("benchmark expression {:?} does not compile", text);
        };
        group.bench_function(*name, |b| b.iter(|| black_box(expr.execute())));
    }
    group.finish();
}

fn bench_one_shot_vs_compiled(c: &mut Criterion) {
    let cfg = bench_config();
    let text = "x * 27 + (8>>2) / x";
    let mut group = c.benchmark_group("one_shot_vs_compiled");
    group.bench_function("execute", |b| b.iter(|| execute(black_box(text), &cfg)));
    if let Ok(expr) = compile(text, &cfg) {
        group.bench_function("compiled", |b| b.iter(|| black_box(expr.execute())));
    }
    group.finish();
}

fn bench_async(c: &mut Criterion) {
    let cfg = bench_config();
    let cancel = CancellationToken::new();
    let mut group = c.benchmark_group("async");
    for (name, text) in EXPRESSIONS {
        let Ok(expr) = compile(text, &cfg) else {
            continue;
        };
        group.bench_function(*name, |b| b.iter(|| black_box(block_on(expr.execute_async(&cancel)))));
    }
    if let Ok(expr) = compile("DoNothing(x * 2, 1/0)", &cfg) {
        group.bench_function("lazy_skip", |b| b.iter(|| black_box(block_on(expr.execute_async(&cancel)))));
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_execute,
    bench_one_shot_vs_compiled,
    bench_async
);
criterion_main!(benches);
