/// Put the pipeline stages together: load battles, build features, train, predict, write the submission.
use std::path::Path;

use clap::{Parser, Subcommand};

mod config;
mod error;
mod features;
mod io;
mod model;
mod preprocess;
mod report;
mod submission;
mod vocabulary;

use config::Config;
use error::Result;

#[derive(Parser)]
#[command(name = "battle-predictor")]
#[command(about = "Predicts battle winners from turn-by-turn battle logs", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on train.jsonl, predict test.jsonl and write the submission
    Run {
        /// Directory containing input/<competition>/
        #[arg(long)]
        input_prefix: Option<String>,
        /// Submission csv path
        #[arg(long)]
        output: Option<String>,
        /// Skip the coefficient chart
        #[arg(long)]
        no_plot: bool,
    },
    /// Export the prepared feature table of one jsonl file as csv
    Features {
        input: String,
        output: String,
        /// Build the vocabulary from this file instead of the input
        #[arg(long)]
        vocabulary_from: Option<String>,
    },
    /// Print the vocabularies found in a jsonl file
    Vocab { input: String },
    /// Write a default config file
    Init,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Run {
            input_prefix,
            output,
            no_plot,
        } => commands::run(config, input_prefix, output, no_plot),
        Commands::Features {
            input,
            output,
            vocabulary_from,
        } => commands::features(&config, &input, &output, vocabulary_from.as_deref()),
        Commands::Vocab { input } => commands::vocab(&input),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use crate::io::{get_train_test, load_jsonl, BattleRecord};
    use crate::model::{holdout_accuracy, train_classifier};
    use crate::preprocess::{prepare, scaled_columns, FeatureTable, ScalerFit};
    use crate::report::{plot_importances, print_importances};
    use crate::submission::{build_submission, write_submission, SubmissionRow};
    use crate::vocabulary::Vocabulary;

    pub fn init(config_path: &str) -> Result<()> {
        Config::default().save(config_path)?;
        println!("Created default config at {}", config_path);
        Ok(())
    }

    /// Vocabulary comes from the training battles only and is applied to both tables.
    pub fn build_tables(
        config: &Config,
        train: &[BattleRecord],
        test: &[BattleRecord],
    ) -> Result<(FeatureTable, FeatureTable)> {
        let vocab = Vocabulary::from_battles(train);
        let options = config.features.options();
        let columns = scaled_columns(config.features.scale_damage);

        let (train_df, scaler) = prepare(train, &vocab, &options, &columns, None)?;
        let reuse = match config.features.scaler_fit {
            ScalerFit::Train => Some(&scaler),
            ScalerFit::PerTable => None,
        };
        let (test_df, _) = prepare(test, &vocab, &options, &columns, reuse)?;
        Ok((train_df, test_df))
    }

    /// Fit on the training table and pair every test battle with its predicted winner.
    pub fn predict_submission(
        config: &Config,
        train_df: &FeatureTable,
        test_df: &FeatureTable,
    ) -> Result<(Vec<SubmissionRow>, Vec<(String, f64)>, f64)> {
        if train_df.is_empty() {
            return Err(crate::error::BattleError::Classifier(
                "training set is empty".to_string(),
            ));
        }
        // hold-out is only reported; a failed split falls through to the full fit
        if let Err(e) = holdout_accuracy(train_df, &config.model) {
            log::warn!("Skipping hold-out accuracy: {}", e);
        }
        let clf = train_classifier(train_df, &config.model)?;
        let predictions = clf.predict(test_df);
        let rows = build_submission(test_df, &predictions)?;
        Ok((rows, clf.coefficients(), clf.intercept()))
    }

    pub fn run(
        mut config: Config,
        input_prefix: Option<String>,
        output: Option<String>,
        no_plot: bool,
    ) -> Result<()> {
        if let Some(prefix) = input_prefix {
            config.data.input_prefix = prefix;
        }
        if let Some(output) = output {
            config.data.output = output;
        }

        let (train, test) = get_train_test(&config.data.input_prefix, &config.data.competition)?;
        let (train_df, test_df) = build_tables(&config, &train, &test)?;
        let (rows, coefs, intercept) = predict_submission(&config, &train_df, &test_df)?;
        write_submission(&config.data.output, &rows)?;

        print_importances(&coefs, intercept);
        if !no_plot {
            plot_importances(
                &coefs,
                config.model.top_features,
                Path::new(&config.model.plot_path),
            )?;
        }
        Ok(())
    }

    pub fn features(
        config: &Config,
        input: &str,
        output: &str,
        vocabulary_from: Option<&str>,
    ) -> Result<()> {
        let battles = load_jsonl(input)?;
        let vocab = match vocabulary_from {
            Some(path) => Vocabulary::from_battles(&load_jsonl(path)?),
            None => Vocabulary::from_battles(&battles),
        };
        let columns = scaled_columns(config.features.scale_damage);
        let (table, _) = prepare(&battles, &vocab, &config.features.options(), &columns, None)?;
        table.write_csv(output)
    }

    pub fn vocab(input: &str) -> Result<()> {
        let vocab = Vocabulary::from_battles(&load_jsonl(input)?);
        for (name, values) in vocab.sections() {
            println!("{} ({}):", name, values.len());
            for value in values {
                println!("  {}", value);
            }
        }
        Ok(())
    }
}
