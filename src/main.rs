mod app;
mod cli;

use clap::Parser;
use cli::{Cli, Command, ConfigArgs, RunArgs};
use grok_bridge_core::config::Config;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => cmd_run(args),
        Command::CheckConfig(args) => cmd_check_config(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    // Peek at config for logging options before the subscriber exists
    let peek = Config::load(&args.config).ok();
    let to_file = peek.as_ref().is_some_and(|c| c.logging_to_file);
    let log_dir = peek.and_then(|c| c.log_dir);
    let _guard = grok_bridge_core::lifecycle::logging::init_logging(
        &args.log_level,
        to_file,
        log_dir.as_deref(),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let application = app::Application::build(&args)?;
        application.serve().await
    })
}

fn cmd_check_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)
        .map_err(|e| anyhow::anyhow!("invalid config '{}': {e}", args.config))?;

    println!("Config '{}' is valid.", args.config);
    println!("  listen:        {}:{}", config.host, config.port);
    println!("  upstream:      {}", config.upstream.url);
    println!("  default model: {}", config.upstream.default_model);
    println!(
        "  retry:         {} attempts, factor {}, base {}ms, timeout {}s",
        config.retry.max_attempts,
        config.retry.backoff_factor,
        config.retry.base_delay_ms,
        config.retry.attempt_timeout_secs,
    );
    println!(
        "  proxy:         {}",
        if config.proxy_url.is_some() { "configured" } else { "none" }
    );
    println!(
        "  rate limit:    {}",
        if config.rate_limit.enabled {
            format!("{} rpm", config.rate_limit.requests_per_minute)
        } else {
            "disabled".to_string()
        }
    );
    Ok(())
}
