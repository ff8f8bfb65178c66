use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = ols_client::cli::Cli::parse();
    match ols_client::cli::run(cli).await {
        Ok(outcome) => {
            println!("{}", outcome.output);
            if outcome.success {
                std::process::ExitCode::SUCCESS
            } else {
                std::process::ExitCode::from(1)
            }
        }
        Err(err) => {
            if let Some(ols_err) = err.downcast_ref::<ols_client::OlsError>() {
                eprintln!("Error: {ols_err}");
            } else {
                eprintln!("Error: {err:#}");
            }
            std::process::ExitCode::from(1)
        }
    }
}
