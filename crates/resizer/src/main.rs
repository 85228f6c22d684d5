//! resizer: HTTP image resizing service with a persistent LRU cache

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use resizer::cli::{self, CliError, Commands, EXIT_OK, OutputFormat, ServeArgs, exit_code_for};
use resizer::server::{self, AppState};
use resizer::shutdown::install_signal_handlers;
use resizer::tracing::{TracingConfig, init_tracing, level_for};
use resizer::version::VersionInfo;

fn main() {
    // Tracing may not be initialised (or may be broken) during a panic
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    let result = match cli.command {
        Commands::Version { output } => print_version(output),
        Commands::Serve(args) => run_with_tokio(&args),
    };

    match result {
        Ok(()) => std::process::exit(EXIT_OK),
        Err(err) => {
            cli::render_error(&err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn print_version(output: OutputFormat) -> Result<(), CliError> {
    let info = VersionInfo::current();
    match output {
        OutputFormat::Text => println!("{info}"),
        OutputFormat::Json => {
            let json = serde_json::to_string(&info)
                .map_err(|e| CliError::runtime(format!("failed to serialize version: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Create the tokio runtime and run the service
fn run_with_tokio(args: &ServeArgs) -> Result<(), CliError> {
    let config = args.load_config()?;

    init_tracing(TracingConfig {
        format: args.tracing_format(),
        level: level_for(config.logger.level),
        ..TracingConfig::default()
    })
    .map_err(|e| CliError::config(e.to_string()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::runtime(format!("failed to create tokio runtime: {e}")))?;

    runtime.block_on(async {
        let state = AppState::from_config(&config)?;
        let shutdown = install_signal_handlers();
        server::serve(&config, state, shutdown).await?;
        Ok::<(), CliError>(())
    })
}
