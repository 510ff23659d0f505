//! AutoML - Main Entry Point

use automl_core::cli::{cmd_analyze, cmd_compare, cmd_info, cmd_predict, cmd_train, cmd_tune, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "automl=info,automl_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.session_config()?;

    match &cli.command {
        Commands::Info { data } => cmd_info(data)?,
        Commands::Analyze { data, target, learning_curve, points } => {
            cmd_analyze(config, data, target, learning_curve.as_deref(), *points)?;
        }
        Commands::Train { data, target, models, params, test_fraction, no_imbalance, save } => {
            cmd_train(
                config,
                data,
                target,
                models,
                params.as_deref(),
                *test_fraction,
                *no_imbalance,
                save.as_deref(),
            )?;
        }
        Commands::Compare { data, target, models } => cmd_compare(config, data, target, models)?,
        Commands::Tune { data, target, model, trials, cv_folds, strategy } => {
            cmd_tune(config, data, target, model, *trials, *cv_folds, strategy)?;
        }
        Commands::Predict { model, data, output } => cmd_predict(model, data, output.as_deref())?,
    }

    Ok(())
}
