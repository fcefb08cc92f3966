use clap::Parser;
use maildump_viewer::app;
use maildump_viewer::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = app::run(cli).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}
