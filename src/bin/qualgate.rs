//! qualgate CLI: coverage and static-analysis quality gate.

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::PrintDefaultConfig => cli::print_default_config()?,
        Commands::InitConfig(args) => cli::init_config(args)?,
        Commands::ValidateConfig => cli::validate_config(&cli.config)?,
        Commands::Run(args) => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::run_command(args, loaded.config).await?
        }
        Commands::Measure(args) => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::measure_command(args, loaded.config).await?
        }
        Commands::Baseline => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::baseline_command(loaded.config).await?
        }
        Commands::Clean(args) => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::clean_command(args, loaded.config)?
        }
        Commands::Stats(args) => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::stats_command(args, loaded.config)?
        }
        Commands::CheckEnv => {
            let loaded = cli::setup(&cli.config, cli.verbose)?;
            cli::check_env_command(&loaded).await?
        }
    };

    std::process::exit(code);
}
