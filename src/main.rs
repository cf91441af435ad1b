//! Process entry point (§6). `accounts-server <port> <data_dir>` loads the
//! data directory, then serves the HTTP surface until a shutdown signal.
//! With zero or one argument, runs the internal self-check suite and prints
//! `OK` on success instead of starting a server — the historical contract
//! this codebase's process arguments preserve.

use std::path::PathBuf;
use std::process::ExitCode;

use accounts_engine::{config::Config, http, loader, Engine};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Runs the invariant/property checks the test suite exercises through
/// `#[test]`, a second time, against a throwaway in-memory engine — the
/// `tests/OK` self-check the zero/one-argument process contract promises.
fn run_self_checks() -> Result<(), String> {
    use accounts_engine::model::{get_phone_code, year_from_timestamp, Sex};

    if get_phone_code("8(974)1210264") != "974" {
        return Err("phone code extraction regressed".into());
    }
    if !get_phone_code("8()1210264").is_empty() {
        return Err("empty phone code parens should yield empty code".into());
    }
    if year_from_timestamp(893_884_157) != 1998 {
        return Err("year_from_timestamp regressed".into());
    }
    if Sex::Male.opposite() != Sex::Female || Sex::Female.opposite() != Sex::Male {
        return Err("opposite_sex regressed".into());
    }

    let engine = Engine::new(0);
    accounts_engine::mutation::apply_create(
        &engine,
        1,
        &serde_json::from_str(
            r#"{"email":"a@b.com","sex":"m","status":"свободны","birth":0,"joined":0}"#,
        )
        .map_err(|e| e.to_string())?,
    )
    .map_err(|e| e.to_string())?;
    if !engine.store.exists(1) {
        return Err("create did not populate the account slot".into());
    }

    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        return match run_self_checks() {
            Ok(()) => {
                println!("OK");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("self-check failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let port: u16 = match args[1].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid port: {}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let data_dir = PathBuf::from(&args[2]);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    let config = config.with_cli_overrides(Some(port), Some(data_dir));

    init_tracing(&config);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        tracing::info!(
            data_dir = %config.storage.data_dir.display(),
            port = config.server.port,
            "loading accounts",
        );
        let start = std::time::Instant::now();
        let engine = match loader::load(&config.storage.data_dir) {
            Ok(engine) => engine,
            Err(e) => {
                eprintln!("failed to load data directory: {e}");
                return ExitCode::FAILURE;
            }
        };
        tracing::info!(
            accounts = engine.store.len_live(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "load_complete",
        );

        let engine = std::sync::Arc::new(engine);
        if let Err(e) = http::start_http_server(engine, &config).await {
            eprintln!("server error: {e}");
            return ExitCode::FAILURE;
        }
        ExitCode::SUCCESS
    })
}
