//! Benchmarks the message scheduler's dependency-tag gating (§4.1):
//! throughput of document-requests against the same URI (expected to
//! run concurrently) versus document-updates against the same URI
//! (expected to serialize), plus the cost of classifying a method name.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use polyglot_lsp::document::DocumentUri;
use polyglot_lsp::scheduler::{classify, DependencyTag, Scheduler};

fn uri(n: usize) -> DocumentUri {
    DocumentUri::parse(&format!("file:///workspace/file_{n}.swift")).unwrap()
}

fn bench_classify(c: &mut Criterion) {
    let methods = ["initialize", "textDocument/didChange", "textDocument/hover", "$/cancelRequest"];
    c.bench_function("classify/method_names", |b| {
        b.iter(|| {
            for m in methods {
                black_box(classify(m));
            }
        });
    });
}

fn bench_concurrent_document_requests(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let concurrencies = [1usize, 8, 64];

    let mut group = c.benchmark_group("document_requests_same_uri");
    for n in concurrencies {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.to_async(&rt).iter(|| async move {
                let scheduler = Scheduler::new();
                let u = uri(0);
                let mut handles = Vec::with_capacity(n);
                for _ in 0..n {
                    let u = u.clone();
                    handles.push(scheduler.schedule(DependencyTag::DocumentRequest(u), || async { black_box(1 + 1) }));
                }
                for h in handles {
                    h.await.unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_interleaved_updates_and_requests(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("document_updates_and_requests/interleaved", |b| {
        b.to_async(&rt).iter(|| async move {
            let scheduler = Scheduler::new();
            let u = uri(0);
            let mut handles = Vec::with_capacity(20);
            for i in 0..20 {
                let u = u.clone();
                let tag = if i % 5 == 0 { DependencyTag::DocumentUpdate(u) } else { DependencyTag::DocumentRequest(u) };
                handles.push(scheduler.schedule(tag, || async { black_box(1 + 1) }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });
}

fn bench_many_distinct_uris(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("document_requests/distinct_uris", |b| {
        b.to_async(&rt).iter(|| async move {
            let scheduler = Scheduler::new();
            let mut handles = Vec::with_capacity(256);
            for i in 0..256 {
                handles.push(scheduler.schedule(DependencyTag::DocumentRequest(uri(i)), || async { black_box(1 + 1) }));
            }
            for h in handles {
                h.await.unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_concurrent_document_requests,
    bench_interleaved_updates_and_requests,
    bench_many_distinct_uris
);
criterion_main!(benches);
