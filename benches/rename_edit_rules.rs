//! Benchmarks the per-piece rename edit rules (§4.7) and the compound
//! name parser they depend on, since a rename touches every occurrence
//! of a symbol across a workspace and the per-piece dispatch runs once
//! per occurrence per file.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tower_lsp::lsp_types::{Position, Range};

use polyglot_lsp::rename::{edit_for_piece, CompoundDeclName, PieceCategory, RenamePieceKind, SyntacticRenamePiece};

fn range(line: u32, start: u32, end: u32) -> Range {
    Range::new(Position::new(line, start), Position::new(line, end))
}

fn piece(kind: RenamePieceKind, r: Range, parameter_index: Option<usize>) -> SyntacticRenamePiece {
    SyntacticRenamePiece { range: r, kind, category: PieceCategory::ActiveCode, parameter_index }
}

fn bench_compound_name_parse(c: &mut Criterion) {
    let names = ["foo", "foo(bar:)", "bar(x:y:z:)", "subscript(_:)", "make(withLabel:andAnother:andYetAnother:)"];
    let mut group = c.benchmark_group("compound_name_parse");
    for name in names {
        group.bench_with_input(BenchmarkId::from_parameter(name), &name, |b, name| {
            b.iter(|| black_box(CompoundDeclName::parse(name)));
        });
    }
    group.finish();
}

fn bench_edit_for_piece(c: &mut Criterion) {
    let old = CompoundDeclName::parse("make(withLabel:andAnother:andYetAnother:)");
    let new = CompoundDeclName::parse("build(label:other:extra:)");

    let pieces = vec![
        piece(RenamePieceKind::BaseName, range(0, 0, 4), None),
        piece(RenamePieceKind::DeclArgLabel, range(0, 5, 15), Some(0)),
        piece(RenamePieceKind::CallArgLabel, range(1, 5, 15), Some(1)),
        piece(RenamePieceKind::CallArgColon, range(1, 15, 16), Some(1)),
        piece(RenamePieceKind::CallArgCombined, range(2, 0, 0), Some(2)),
        piece(RenamePieceKind::SelectorArgLabel, range(3, 0, 10), Some(0)),
    ];

    c.bench_function("edit_for_piece/mixed_kinds", |b| {
        b.iter(|| {
            for p in &pieces {
                black_box(edit_for_piece(p, &old, &new));
            }
        });
    });
}

fn bench_edit_rules_over_many_occurrences(c: &mut Criterion) {
    let old = CompoundDeclName::parse("connect(to:via:)");
    let new = CompoundDeclName::parse("connect(destination:route:)");
    let occurrence_counts = [10usize, 100, 1_000];

    let mut group = c.benchmark_group("edit_rules_over_occurrences");
    for count in occurrence_counts {
        let pieces: Vec<SyntacticRenamePiece> = (0..count)
            .map(|i| piece(RenamePieceKind::CallArgLabel, range(i as u32, 0, 2), Some(0)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &pieces, |b, pieces| {
            b.iter(|| {
                let mut edits = Vec::with_capacity(pieces.len());
                for p in pieces {
                    if let Some(edit) = edit_for_piece(p, &old, &new) {
                        edits.push(edit);
                    }
                }
                black_box(edits);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compound_name_parse, bench_edit_for_piece, bench_edit_rules_over_many_occurrences);
criterion_main!(benches);
