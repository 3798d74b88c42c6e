use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use bot::identity::ResolvedIdentity;
use bot::prompt::chain::ChainMessage;
use bot::prompt::{collect_participants, compile, CompileContext, GenerationParams};

const BOT_ID: u64 = 98765432109876543;

fn generate_chain(length: usize) -> Vec<ChainMessage> {
    (0..length)
        .map(|i| {
            let author_id = if i % 3 == 2 {
                BOT_ID
            } else {
                11111111111111111 + (i % 5) as u64
            };
            ChainMessage {
                id: i as u64,
                author_id,
                content: format!(
                    "message {i} mentioning <@{}> usetemp 1.2 and some longer text to substitute",
                    11111111111111111u64 + ((i + 1) % 5) as u64
                ),
                referenced: if i == 0 { None } else { Some(i as u64 - 1) },
                images: vec![],
            }
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("prompt_compile");
    for length in [4usize, 16, 64].iter() {
        let chain = generate_chain(*length);
        let participants = collect_participants(&chain, BOT_ID);
        let identities: HashMap<u64, ResolvedIdentity> = participants
            .iter()
            .map(|&id| {
                (
                    id,
                    ResolvedIdentity {
                        name: format!("user{}", id % 100),
                        description: Some("remembers things".to_string()),
                    },
                )
            })
            .collect();
        let abbreviations = HashMap::new();

        group.bench_function(BenchmarkId::new("compile", length), |b| {
            b.iter(|| {
                compile(
                    &chain,
                    &CompileContext {
                        bot_id: BOT_ID,
                        personality: "You are a bot.",
                        participants: &participants,
                        identities: &identities,
                        abbreviations: &abbreviations,
                        include_directory: true,
                    },
                    GenerationParams::default(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
