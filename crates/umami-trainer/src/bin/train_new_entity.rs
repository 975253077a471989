//! Teach the entity recognizer a new label from a small set of reviews.

use anyhow::Result;
use clap::Parser;
use umami_core::Doc;
use umami_trainer::cli::{self, TrainArgs};
use umami_trainer::{TrainConfig, Trainer, data, evaluate};

const TEST_TEXT: &str = "The food always tastes fresh and served promptly.";

#[derive(Parser)]
#[command(name = "train-new-entity")]
#[command(about = "Add a new entity label and train it on annotated reviews")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,

    /// Entity label to add
    #[arg(short, long, env = "UMAMI_LABEL", default_value = "TASTE")]
    label: String,

    /// Name recorded in the saved model's meta.json
    #[arg(long, default_value = "animal")]
    new_model_name: String,
}

fn print_entities(doc: &Doc) {
    println!("Entities in '{}'", doc.text());
    for ent in doc.ents() {
        println!("{} {}", ent.label, ent.text);
    }
}

fn main() -> Result<()> {
    cli::init_tracing();
    let cli = Cli::parse();
    let args = &cli.train;

    let examples = args.examples(data::taste_reviews)?;
    let config = args.train_config(
        TrainConfig::new()
            .with_n_iter(20)
            .with_dropout(0.35)
            .with_label(cli.label.as_str()),
    );
    let mut nlp = cli::load_or_create_pipeline(args.model.as_deref())?;

    Trainer::new(config).train_with(&mut nlp, &examples, |epoch| {
        println!("{:?}", epoch.losses);
    })?;

    print_entities(&nlp.process(TEST_TEXT)?);
    println!("{}", evaluate(&nlp, &examples)?);

    nlp.meta_mut().name = cli.new_model_name.clone();
    cli::save_pipeline(&nlp, &args.output_dir)?;

    let nlp2 = cli::reload_pipeline(&args.output_dir)?;
    print_entities(&nlp2.process(TEST_TEXT)?);

    Ok(())
}
