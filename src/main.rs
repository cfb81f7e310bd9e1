use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info};
use orchestrator::{Outcome, Result, cli::Args, configs::create_full_options, logger, run};

fn main() -> ExitCode {
    logger::init();

    match train(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn train(args: Args) -> Result<()> {
    let options = create_full_options(args.into_layers()?)?;
    let load_model = options
        .get("load_model")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);

    if let Outcome::Trained(report) = run(options, load_model.as_deref(), false)? {
        info!(
            best_epoch = report.best_epoch,
            test_loss = report.test_loss_free_run;
            "run finished"
        );
    }

    Ok(())
}
