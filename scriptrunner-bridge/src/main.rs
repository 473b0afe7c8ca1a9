use anyhow::{Context, Result};
use clap::Parser;

use scriptrunner_bridge::app::ScriptRunnerApp;
use scriptrunner_bridge::cli::Cli;
use scriptrunner_bridge::session::{interactive, run_once};
use scriptrunner_bridge::util::{init_tracing, install_panic_hook};
use scriptrunner_core::RunController;

use std::io::IsTerminal;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    install_panic_hook();

    let cli = Cli::parse();
    let config = cli.resolve_config().context("could not load configuration")?;
    let controller =
        RunController::from_config(&config).context("could not set up the script runner")?;

    let mut app = ScriptRunnerApp::new(controller);
    if let Some(path) = &cli.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        app.buffer.set_text(text);
        app.source_path = Some(path.clone());
    }

    let stdout = std::io::stdout();
    let color = !cli.no_color && std::env::var_os("NO_COLOR").is_none() && stdout.is_terminal();
    let mut out = stdout.lock();

    if cli.interactive {
        let input = tokio::io::BufReader::new(tokio::io::stdin());
        interactive(&mut app, input, &mut out, color).await?;
        return Ok(ExitCode::SUCCESS);
    }

    if cli.file.is_none() {
        anyhow::bail!("no script given; pass a FILE or use --interactive");
    }

    let verdict = run_once(&mut app, cli.goto_error, &mut out, color).await?;
    Ok(ExitCode::from(verdict.exit_code()))
}
