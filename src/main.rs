use anyhow::Result;
use clap::Parser;
use langpack::commands::{self, BuildOverrides};
use std::path::PathBuf;

/// langpack - Language Package Builder
///
/// Package the translation files of every extension in a repository into one
/// installable archive per language, optionally upload them and generate a
/// download page.
///
/// If the LANGPACK_TRANSLATION_TOKEN environment variable is set, it is used to
/// authenticate against the translation service. Uploads use the standard AWS
/// credentials (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY or a profile).
///
/// Examples:
///   langpack codes                   # List the languages found in the repository
///   langpack build --min-percent 50  # Package languages translated at least 50%
#[derive(Parser, Debug)]
#[command(author, version = env!("LANGPACK_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository root (defaults to the current directory; also via LANGPACK_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "LANGPACK_ROOT",
        value_name = "PATH",
        default_value = ".",
        global = true
    )]
    pub root: PathBuf,

    /// Configuration file (defaults to langpack.json in the repository root)
    #[arg(
        long = "config",
        short = 'c',
        env = "LANGPACK_CONFIG",
        value_name = "FILE",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Do not print progress
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build the packages of all languages and the download index
    Build(BuildArgs),

    /// Build the package of one language
    Package(PackageArgs),

    /// List the language codes found in the repository
    Codes,

    /// Show translation completion per language
    Progress,
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Skip languages translated below this percentage (0 disables the filter)
    #[arg(long, value_name = "PERCENT")]
    pub min_percent: Option<f64>,

    /// Upload packages and index to object storage
    #[arg(long)]
    pub upload: bool,

    /// Delete local archives after uploading and do not write index.html
    #[arg(long)]
    pub discard_output: bool,
}

#[derive(clap::Args, Debug)]
pub struct PackageArgs {
    /// Language code, e.g. "en-GB"
    #[arg(value_name = "CODE")]
    pub code: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = langpack::runtime::RealRuntime;

    match cli.command {
        Commands::Build(args) => {
            let overrides = BuildOverrides {
                min_percent: args.min_percent,
                upload: args.upload,
                discard_output: args.discard_output,
            };
            commands::build(runtime, &cli.root, cli.config, cli.quiet, overrides).await?
        }
        Commands::Package(args) => {
            commands::package(runtime, &cli.root, cli.config, cli.quiet, &args.code).await?
        }
        Commands::Codes => commands::codes(runtime, &cli.root, cli.config).await?,
        Commands::Progress => commands::progress(runtime, &cli.root, cli.config).await?,
    }
    Ok(())
}
