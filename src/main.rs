mod cli;

use anyhow::Context;
use chapipe::pipeline::{load_pipeline, run_pipeline_file, validate_pipeline_file};
use chapipe::{plugins, util, Builtin, Pipeline, Records, Registry};
use cli::Command;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = cli::get_opts();

    let mut registry = Registry::new();
    plugins::register_defaults(&mut registry)?;

    match opts.command {
        Command::Run { path, save } => {
            let file = load_pipeline(&path)?;
            let records = run_pipeline_file(&file, &registry)
                .await
                .context("pipeline run failed")?;
            print_records(&records)?;
            if let Some(base) = save {
                let name = file.name.as_deref().unwrap_or("<unnamed>");
                let dir = util::save_run(&base, name, &file.expressions, &records)?;
                tracing::info!("saved run to {}", dir.display());
            }
        }
        Command::Exec { exprs, steps } => {
            let records = Pipeline::new(&registry)
                .run_with_steps(exprs, steps)
                .await
                .context("pipeline run failed")?;
            print_records(&records)?;
        }
        Command::Validate { path } => {
            validate_pipeline_file(&path, &registry)?;
            println!("Pipeline validated");
        }
        Command::Tasks => {
            for name in registry.names() {
                println!("{name}");
            }
            for builtin in Builtin::ALL {
                println!("{builtin} (builtin)");
            }
        }
    }

    Ok(())
}

/// One JSON document per line on stdout.
fn print_records(records: &Records) -> anyhow::Result<()> {
    for record in records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}
