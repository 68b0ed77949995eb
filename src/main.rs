#[cfg(feature = "cli")]
mod cli;

#[cfg(feature = "cli")]
fn main() {
    if let Err(err) = cli::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(all(not(feature = "cli"), feature = "web"))]
#[tokio::main]
async fn main() {
    use gapfill_rs::web::{self, WebConfig};

    web::init_tracing();
    if let Err(err) = web::serve(WebConfig::default()).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(any(feature = "cli", feature = "web")))]
fn main() {
    eprintln!("Both the CLI and the web service are disabled. Rebuild with `--features cli` or `--features web`.");
}
