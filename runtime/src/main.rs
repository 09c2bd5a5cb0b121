use anyhow::Result;
use clap::{Parser, Subcommand};
use webaudit_runtime::cli::crawl_cmd::CrawlArgs;
use webaudit_runtime::cli::robots_cmd::RobotsArgs;
use webaudit_runtime::cli::{crawl_cmd, output, robots_cmd, visit_cmd, AuditArgs};

#[derive(Parser)]
#[command(name = "webaudit", version, about = "Robots.txt-compliant web site auditor")]
struct Cli {
    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress and summary output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More detail in summaries and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Audit a single URL
    Visit {
        url: String,
        #[command(flatten)]
        args: AuditArgs,
    },
    /// Audit a site, page by page
    Crawl {
        url: String,
        #[command(flatten)]
        args: CrawlArgs,
    },
    /// Check robots.txt for a URL without visiting it
    Robots {
        url: String,
        #[command(flatten)]
        args: RobotsArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    for (set, var) in [
        (cli.json, output::ENV_JSON),
        (cli.quiet, output::ENV_QUIET),
        (cli.verbose, output::ENV_VERBOSE),
        (cli.no_color, output::ENV_NO_COLOR),
    ] {
        if set {
            std::env::set_var(var, "1");
        }
    }

    let level = if cli.verbose { "webaudit=debug" } else { "webaudit=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(output::color_enabled())
        .init();

    match &cli.command {
        Command::Visit { url, args } => visit_cmd::run(url, args).await,
        Command::Crawl { url, args } => crawl_cmd::run(url, args).await,
        Command::Robots { url, args } => robots_cmd::run(url, args).await,
    }
}
