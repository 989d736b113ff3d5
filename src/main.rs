mod app;
mod cli;

fn main() {
    let cli = cli::parse();

    // Respect TRACKMUX_LOG if set, otherwise pick a level from --verbose
    let env_filter = std::env::var("TRACKMUX_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "trackmux=debug".to_string()
        } else {
            "trackmux=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    app::run(cli);
}
