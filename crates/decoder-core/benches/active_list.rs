use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use decoder_core::graph::WordLoop;
use decoder_core::logmath::LogMath;
use decoder_core::search::{ActiveListFactory, PurgeStrategy, StateRef, Token, TokenArena, TokenId};

/// Word-end and unit states from a small word loop, so the word strategy
/// has real words to cap.
fn bench_states() -> Vec<StateRef> {
    let graph = WordLoop::new()
        .word("one", &[1, 2, 3])
        .word("two", &[4, 5])
        .word("three", &[6, 7, 8, 9])
        .word("four", &[10, 11])
        .build()
        .expect("bench graph");
    (0..graph.len()).filter_map(|i| graph.state(i)).collect()
}

/// `n` tokens with scores spread pseudo-randomly over a wide range.
fn bench_tokens(n: usize) -> (TokenArena, Vec<TokenId>) {
    let states = bench_states();
    let mut arena = TokenArena::new();
    let mut seed: u32 = 0x9e37_79b9;
    let ids = (0..n)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let score = -((seed % 100_000) as f32) / 10.0;
            let state = states[i % states.len()].clone();
            arena.alloc(Token::new(None, state, score, 0.0, 0.0, 0))
        })
        .collect();
    (arena, ids)
}

static SIZES: &[usize] = &[1_000, 20_000, 100_000];

fn bench_purge(c: &mut Criterion) {
    let log_math = LogMath::new(1.0001);
    let strategies = [
        ("simple", PurgeStrategy::Simple),
        ("sorting", PurgeStrategy::Sorting),
        ("partition", PurgeStrategy::Partition),
        ("word", PurgeStrategy::Word),
    ];
    for (label, strategy) in strategies {
        let factory = ActiveListFactory::new(strategy, 500, 1e-80, &log_math).with_word_caps(20, 1);
        let mut group = c.benchmark_group(format!("active_list/purge/{label}"));
        for &n in SIZES {
            let (arena, ids) = bench_tokens(n);
            group.bench_with_input(BenchmarkId::from_parameter(n), &ids, |b, ids| {
                b.iter(|| {
                    let mut list = factory.new_instance();
                    for &id in ids {
                        list.add(&arena, id);
                    }
                    list.purge(&arena);
                    list.len()
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_purge);
criterion_main!(benches);
