use std::time::Duration;

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use dbtest::cli::Cli;
use dbtest::config::{Config, FileProvider, Resolver};
use dbtest::databricks::JobsService;
use dbtest::session::Session;
use dbtest::ExecutionResult;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Cli::parse();

    let cfg = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };
    let resolver = Resolver::from_process(args.flag_provider(), FileProvider::new(cfg.clone()));
    let mut session = Session::from_sources(&resolver, &cfg);
    if let Some(secs) = args.poll_interval {
        session = session.with_poll_interval(Duration::from_secs(secs));
    }
    args.apply_to(session.client_settings_mut());

    // Smoke test: list a DBFS directory and stop
    if let Some(path) = &args.dbfs_ls {
        let conn = session.connection()?;
        for file in conn.dbfs_ls(path).await.context("listing DBFS")? {
            let kind = if file.is_dir { "dir " } else { "file" };
            println!("{} {:>12} {}", kind, file.file_size, file.path);
        }
        return Ok(());
    }

    let color = std::io::stdout().is_terminal();
    let prefix = args.run_name_prefix.as_deref();
    let client = session.client()?;
    let mut failed = 0;
    for notebook in &args.notebooks {
        let result = client
            .execute(notebook, prefix)
            .await
            .with_context(|| format!("running {}", notebook))?;
        print_verdict(&result, color);
        if !result.was_successful {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} notebook runs failed", failed, args.notebooks.len());
    }
    Ok(())
}

fn print_verdict(result: &ExecutionResult, color: bool) {
    let verdict = match (result.was_successful, color) {
        (true, true) => format!("{}", "PASS".green()),
        (false, true) => format!("{}", "FAIL".red()),
        (true, false) => "PASS".to_string(),
        (false, false) => "FAIL".to_string(),
    };
    println!(
        "{} {} ({}): {} passed, {} failed, {} errors, {} skipped in {:.3}s\n     {}",
        verdict,
        result.notebook_name(),
        result.run_name(),
        result.num_successes,
        result.num_failures,
        result.num_errors,
        result.num_skipped,
        result.execution_time,
        result.run_page_url
    );
}
