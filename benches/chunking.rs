use content_engine::embeddings::chunking::{ChunkingConfig, chunk_text};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn sample_document() -> String {
    let paragraph = "Retrieval-augmented generation pairs a search step with a language model. \
        Documents are split into overlapping windows, embedded, and stored in a vector index.\n\
        At question time the closest windows are placed in the prompt as context. ";
    paragraph.repeat(400)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| {
            chunk_text(
                black_box(&content),
                black_box(config.chunk_size),
                black_box(config.overlap),
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
