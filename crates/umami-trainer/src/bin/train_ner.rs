//! Update the entity recognizer with every label found in the training data.

use anyhow::Result;
use clap::Parser;
use umami_trainer::cli::{self, TrainArgs};
use umami_trainer::{TrainConfig, Trainer, data, evaluate};

#[derive(Parser)]
#[command(name = "train-ner")]
#[command(about = "Train or update the entity recognizer on annotated reviews")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,
}

fn main() -> Result<()> {
    cli::init_tracing();
    let args = Cli::parse().train;

    let examples = args.examples(data::basic_reviews)?;
    let config = args.train_config(TrainConfig::new().with_n_iter(100).with_dropout(0.5));
    let mut nlp = cli::load_or_create_pipeline(args.model.as_deref())?;

    Trainer::new(config).train_with(&mut nlp, &examples, |epoch| {
        println!("{:?}", epoch.losses);
    })?;

    for example in &examples {
        let doc = nlp.process(&example.text)?;
        println!("Entities {}", cli::format_entities(&doc));
    }
    println!("{}", evaluate(&nlp, &examples)?);

    cli::save_pipeline(&nlp, &args.output_dir)?;

    let nlp2 = cli::reload_pipeline(&args.output_dir)?;
    for example in &examples {
        let doc = nlp2.process(&example.text)?;
        println!("Entities {}", cli::format_entities(&doc));
    }

    Ok(())
}
