//! Terminal player for gamebook stories.
//!
//! ```bash
//! cargo run -p gamebook -- --story books/castle.gb --save-dir saves --session alice
//! ```
//!
//! Settings can also come from a `.env` file or the environment
//! (`GAMEBOOK_STORY`, `GAMEBOOK_SAVE_DIR`, `GAMEBOOK_SESSION`). Log output goes
//! to stderr and is filtered by `GAMEBOOK_LOG` (default `warn`).

mod headless;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "GAMEBOOK_LOG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let Some(config) = headless::parse_config_from_args(&args) else {
        eprintln!("Error: no story given.");
        eprintln!("Pass --story <FILE> or set {}.", headless::STORY_ENV);
        std::process::exit(1);
    };

    if let Err(e) = headless::run_headless(config).await {
        tracing::error!(error = %e, "Game stopped");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!("Gamebook - play a branching story in the terminal");
    println!();
    println!("USAGE:");
    println!("  gamebook --story <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help          Show this help message");
    println!("  --story <FILE>      Story file (.json for JSON stories)");
    println!("  --save-dir <DIR>    Autosave progress into this directory");
    println!("  --session <ID>      Session to resume (default: a new id)");
    println!("  --fresh             Ignore saved progress and start over");
    println!();
    println!("ENVIRONMENT:");
    println!("  GAMEBOOK_STORY, GAMEBOOK_SAVE_DIR, GAMEBOOK_SESSION, GAMEBOOK_LOG");
}
