use clap::Parser;

use shortener::cli::Cli;
use shortener::config::{StaticConfig, init_config};
use shortener::errors::ShortenerError;
use shortener::runtime::modes::run_server;
use shortener::system::init_logging;

fn load_config(cli: &Cli) -> Result<StaticConfig, ShortenerError> {
    let mut config = StaticConfig::load(cli.config.as_deref());
    config.apply_legacy_env()?;
    config.apply_cli(cli)?;
    config.validate()?;
    Ok(config)
}

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", StaticConfig::generate_sample_config());
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => init_config(config),
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    // guard 必须存活到进程结束
    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server().await {
        match e.downcast_ref::<ShortenerError>() {
            Some(err) => eprintln!("{}", err.format_colored()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}
