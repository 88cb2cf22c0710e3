// src/main.rs

use procvisor::{cli, logging, run};

#[tokio::main]
async fn main() {
    // Exit explicitly: a pending blocking read on stdin would otherwise
    // hold up runtime shutdown until the next line of input.
    match run_main().await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("procvisor error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
