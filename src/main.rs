use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use databuddy::api::HttpJobService;
use databuddy::cli;
use databuddy::config::{self, ClientConfig, Launch};
use databuddy::session::SessionController;

fn main() -> Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "databuddy".to_string() } else { args.remove(0) };

    let mut cfg = ClientConfig::from_env()?;
    match cfg.apply_args(&args) {
        Ok(Launch::Run) => {}
        Ok(Launch::Help) => {
            println!("{}", config::usage(&program));
            return Ok(());
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, config::usage(&program));
            std::process::exit(2);
        }
    }

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "databuddy",
        "databuddy starting: RUST_LOG='{}', api='{}', page_size={}, export_path='{}'",
        rust_log, cfg.api_base, cfg.page_size, cfg.export_path.display()
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    let service = HttpJobService::new(&cfg.api_base)?;
    let mut ctl = SessionController::new(service, cfg.page_size, cfg.export_path.clone());

    match rt.block_on(ctl.health()) {
        Ok(status) => info!(target: "databuddy", "job service reachable (status={})", status),
        Err(e) => warn!(target: "databuddy", "job service health check failed: {}", e),
    }

    if let Some(path) = cfg.upload.as_deref() {
        match rt.block_on(ctl.upload_file(path)) {
            Ok(()) => println!("{}", cli::render_view(&ctl, cli::outputformatter::terminal_width())),
            Err(e) => eprintln!("{}", cli::describe_failure(&ctl, &e)),
        }
    }

    cli::run_repl(&rt, &mut ctl)
}
