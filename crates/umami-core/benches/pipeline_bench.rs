use criterion::{Criterion, black_box, criterion_group, criterion_main};
use umami_core::{Annotation, Example, Losses, NerConfig, Pipeline};

fn trained_pipeline() -> Pipeline {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let ner = nlp.ensure_entity_recognizer(NerConfig::default()).unwrap();
    ner.add_label("TASTE").unwrap();
    let mut sgd = ner.create_optimizer(0.05, 0.0, 1).unwrap();

    let example = Example::new(
        "The food was delicious but do not come here on a empty stomach.",
        vec![Annotation::new(13, 22, "TASTE")],
    )
    .unwrap();
    let mut guard = nlp.select_stages(&["ner"]);
    for _ in 0..10 {
        guard.update(&example, 0.35, &mut sgd, &mut Losses::new()).unwrap();
    }
    drop(guard);
    nlp
}

fn bench_pipeline(c: &mut Criterion) {
    let nlp = trained_pipeline();

    let inputs = vec![
        "The food always tastes fresh and served promptly.",
        "Not only was the food outstanding, but the little 'perks' were great.",
        "It is very overpriced and not very tasty.",
        "To be completely fair, the only redeeming factor was the food, which was above average.",
    ];

    c.bench_function("process_single", |b| {
        b.iter(|| nlp.process(black_box(inputs[0])).unwrap());
    });

    c.bench_function("process_batch_4", |b| {
        b.iter(|| {
            for input in &inputs {
                let _ = nlp.process(black_box(input)).unwrap();
            }
        });
    });

    c.bench_function("tokenize_single", |b| {
        b.iter(|| nlp.tokenizer().tokenize(black_box(inputs[1])));
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
