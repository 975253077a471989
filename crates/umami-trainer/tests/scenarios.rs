//! End-to-end training runs over small fixtures.

use umami_core::{Annotation, Example, NerConfig, Pipeline, UmamiError};
use umami_trainer::{TrainConfig, Trainer, data, evaluate};

const PICKLES: &str = "The pickles were great addition.";
const STAFF: &str = "Staff forgot our drinks.";

fn small_config() -> TrainConfig {
    TrainConfig::new()
        .with_seed(7)
        .with_ner(NerConfig::new().with_buckets(1 << 12))
}

fn pickles() -> Example {
    Example::new(PICKLES, vec![Annotation::new(17, 22, "TASTE")]).unwrap()
}

fn staff() -> Example {
    Example::new(STAFF, vec![Annotation::new(0, 5, "SERVICE")]).unwrap()
}

fn data_error(err: &anyhow::Error) -> &UmamiError {
    err.downcast_ref::<UmamiError>()
        .unwrap_or_else(|| panic!("expected an UmamiError, got {err:#}"))
}

#[test]
fn single_epoch_on_one_example() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let report = Trainer::new(small_config().with_n_iter(1))
        .train(&mut nlp, &[pickles()])
        .unwrap();

    assert_eq!(report.total_updates(), 1);
    assert!(report.final_loss().unwrap() > 0.0);
    assert_eq!(nlp.entity_recognizer().unwrap().labels(), ["TASTE"]);
}

#[test]
fn trained_model_detects_taste() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(30).with_dropout(0.0).with_learn_rate(0.05))
        .train(&mut nlp, &[pickles()])
        .unwrap();

    let doc = nlp.process(PICKLES).unwrap();
    assert!(
        doc.ents().any(|s| s.text == "great" && s.label == "TASTE"),
        "entities: {:?}",
        doc.ent_pairs()
    );
}

#[test]
fn empty_training_set_fails_before_any_epoch() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let mut epochs = 0;
    let err = Trainer::new(small_config().with_n_iter(5))
        .train_with(&mut nlp, &[], |_| epochs += 1)
        .unwrap_err();

    assert!(data_error(&err).is_data_validation());
    assert_eq!(epochs, 0);
}

#[test]
fn untrimmed_label_is_rejected_before_training() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let padded = Example::unchecked(PICKLES, vec![Annotation::new(17, 22, "TASTE ")]);
    let mut epochs = 0;

    let err = Trainer::new(small_config().with_n_iter(2))
        .train_with(&mut nlp, &[padded], |_| epochs += 1)
        .unwrap_err();

    let err = data_error(&err);
    assert!(matches!(err, UmamiError::InvalidLabel(l) if l == "TASTE "));
    assert!(err.is_data_validation());
    assert_eq!(epochs, 0);
    assert!(nlp.entity_recognizer().unwrap().labels().is_empty());
}

#[test]
fn reversed_span_is_rejected_and_stages_restored() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let bad = Example::unchecked("Tasty food", vec![Annotation::new(5, 3, "TASTE")]);

    let err = Trainer::new(small_config().with_n_iter(2))
        .train(&mut nlp, &[pickles(), bad])
        .unwrap_err();

    let err = data_error(&err);
    assert!(matches!(err, UmamiError::InvalidSpan { .. }));
    assert!(err.is_data_validation());
    assert_eq!(nlp.enabled_stage_names(), ["sentencizer", "shaper", "ner"]);
}

#[test]
fn loading_missing_snapshot_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Pipeline::from_disk(dir.path().join("en_rev_taste")).err().unwrap();
    assert!(err.is_not_found());
}

#[test]
fn sequential_runs_keep_both_labels() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(30).with_dropout(0.0).with_learn_rate(0.1))
        .train(&mut nlp, &[pickles()])
        .unwrap();
    Trainer::new(small_config().with_n_iter(10).with_dropout(0.0).with_learn_rate(0.05).with_seed(8))
        .train(&mut nlp, &[staff()])
        .unwrap();

    assert_eq!(nlp.entity_recognizer().unwrap().labels(), ["TASTE", "SERVICE"]);
    assert_eq!(
        nlp.process(PICKLES).unwrap().ent_pairs(),
        [("great".to_string(), "TASTE".to_string())]
    );
    assert_eq!(
        nlp.process(STAFF).unwrap().ent_pairs(),
        [("Staff".to_string(), "SERVICE".to_string())]
    );
}

#[test]
fn update_count_matches_epochs_times_examples() {
    let examples = data::taste_reviews().unwrap();
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let mut per_epoch = Vec::new();

    let report = Trainer::new(small_config().with_n_iter(2))
        .train_with(&mut nlp, &examples, |e| per_epoch.push(e.updates))
        .unwrap();

    assert_eq!(per_epoch, [examples.len(), examples.len()]);
    assert_eq!(report.total_updates(), 2 * examples.len());
}

#[test]
fn well_formed_bundled_data_trains() {
    let examples = data::basic_reviews().unwrap();
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(3).with_dropout(0.5))
        .train(&mut nlp, &examples)
        .unwrap();

    let scores = evaluate(&nlp, &examples).unwrap();
    assert_eq!(scores.examples, examples.len());
    assert!(scores.per_label.contains_key("TASTE"));
}

#[test]
fn label_registration_is_idempotent_across_runs() {
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    let trainer = Trainer::new(small_config().with_n_iter(1).with_label("TASTE"));
    trainer.train(&mut nlp, &[pickles()]).unwrap();
    trainer.train(&mut nlp, &[pickles()]).unwrap();

    assert_eq!(nlp.entity_recognizer().unwrap().labels(), ["TASTE"]);
    assert_eq!(nlp.stage_names(), ["sentencizer", "shaper", "ner"]);
}

#[test]
fn other_stages_behave_the_same_after_training() {
    let fresh = Pipeline::with_defaults("en").unwrap();
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(2))
        .train(&mut nlp, &[pickles()])
        .unwrap();

    let text = "Great food. Rude waiter!";
    let (a, b) = (fresh.process(text).unwrap(), nlp.process(text).unwrap());
    for i in 0..a.len() {
        assert_eq!(a.shape(i), b.shape(i));
        assert_eq!(a.is_sent_start(i), b.is_sent_start(i));
    }
}

#[test]
fn saved_model_reloads_with_same_entities() {
    let examples = data::taste_reviews().unwrap();
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(3))
        .train(&mut nlp, &examples)
        .unwrap();
    nlp.meta_mut().name = "animal".to_string();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("en_rev_taste");
    nlp.to_disk(&out).unwrap();
    let loaded = Pipeline::from_disk(&out).unwrap();

    assert_eq!(loaded.meta().name, "animal");
    for example in &examples {
        assert_eq!(
            loaded.process(&example.text).unwrap().ent_pairs(),
            nlp.process(&example.text).unwrap().ent_pairs()
        );
    }
}

#[test]
fn training_resumes_from_a_loaded_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut nlp = Pipeline::with_defaults("en").unwrap();
    Trainer::new(small_config().with_n_iter(1))
        .train(&mut nlp, &[pickles()])
        .unwrap();
    nlp.to_disk(dir.path()).unwrap();

    let mut loaded = Pipeline::from_disk(dir.path()).unwrap();
    let report = Trainer::new(small_config().with_n_iter(2))
        .train(&mut loaded, &[staff()])
        .unwrap();

    assert_eq!(report.total_updates(), 2);
    assert_eq!(loaded.entity_recognizer().unwrap().labels(), ["TASTE", "SERVICE"]);
}
