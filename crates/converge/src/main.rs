mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use converge_transfer::{GroupId, LinkOption, TransferBehavior};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "converge")]
#[command(about = "Converge machines and files toward their declared state", long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage the files matching a pattern into a destination directory
    Stage {
        /// Directory the pattern is matched in
        base_dir: PathBuf,
        /// Glob pattern, relative to BASE_DIR
        pattern: String,
        /// Directory the matches are copied into
        destination: PathBuf,
        /// Worker count (capped at 10); defaults to transfer.max_parallel
        #[arg(long, env = "CONVERGE_MAX_PAR")]
        max_par: Option<usize>,
        /// Render the matched files as Tera templates
        #[arg(long)]
        template: bool,
        /// Template variable, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = commands::stage::parse_var)]
        vars: Vec<(String, String)>,
        /// keep-links, copy-links or copy-unsafe-links
        #[arg(long, default_value = "copy-unsafe-links")]
        link_option: LinkOption,
        /// force-overwrite, skip-if-exists or fail-if-exists
        #[arg(long, default_value = "force-overwrite")]
        behavior: TransferBehavior,
        /// Octal mode of the copied files (e.g. 644)
        #[arg(long, value_parser = commands::stage::parse_mode)]
        mode: Option<u32>,
        /// Octal mode of the copied directories (e.g. 755)
        #[arg(long, value_parser = commands::stage::parse_mode)]
        dir_mode: Option<u32>,
        /// Owning group of the copies, by name or gid
        #[arg(long)]
        group: Option<GroupId>,
    },
    /// Show the effective settings and where they come from
    Config,
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let filter = if verbose {
        filter.add_directive(tracing::Level::DEBUG.into())
    } else {
        filter
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Version => {
            println!("converge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Config => commands::config::handle(),
        Commands::Stage {
            base_dir,
            pattern,
            destination,
            max_par,
            template,
            vars,
            link_option,
            behavior,
            mode,
            dir_mode,
            group,
        } => {
            let (settings, _) = converge_config::Settings::load()?;
            let args = commands::stage::StageArgs {
                base_dir,
                pattern,
                destination,
                max_par: max_par.unwrap_or(settings.transfer.max_parallel),
                template,
                vars,
                link_option,
                behavior,
                mode,
                dir_mode,
                group,
            };
            commands::stage::handle(args).await
        }
    }
}
