use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// bpm - policy bundle manager
///
/// Build, fetch and link bundles of policy modules.
///
/// Examples:
///   bpm build ./policies ./dist          # Write bundle.lock and dist/<name>.tar.gz
///   bpm get ./dist/acme_authz.tar.gz     # Install into ~/.bpm/<name>/<version>
///   bpm get https://host/acme.git --tag v1.0.0
#[derive(Parser, Debug)]
#[command(author, version = env!("BPM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Bundle root directory (overrides defaults; also via BPM_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "BPM_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Build a bundle archive from a source directory
    Build(BuildArgs),

    /// Install a bundle from an archive or a git repository
    Get(GetArgs),

    /// Validate the bundle.toml of a source directory
    Validate(ValidateArgs),

    /// Resolve the imports of one module in a bundle archive
    Link(LinkArgs),
}

#[derive(clap::Args, Debug)]
pub struct BuildArgs {
    /// Directory containing bundle.toml and the modules
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Directory the archive is written to
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    /// Path to a .tar.gz bundle or a git repository URL
    #[arg(value_name = "BUNDLE")]
    pub source: String,

    /// Git tag to fetch (defaults to HEAD)
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct LinkArgs {
    /// Path to a .tar.gz bundle
    #[arg(value_name = "BUNDLE")]
    pub bundle: PathBuf,

    /// Module path inside the bundle, e.g. policies/authz.rego
    #[arg(value_name = "MODULE")]
    pub module: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = bpm::runtime::RealRuntime;

    match cli.command {
        Commands::Build(args) => {
            let archive = bpm::application::build(runtime, &args.source, &args.dest, cli.root)?;
            println!("Built {}", archive.display());
        }
        Commands::Get(args) => {
            bpm::application::get(runtime, &args.source, args.tag, cli.root)?;
        }
        Commands::Validate(args) => {
            let package = bpm::application::validate(&runtime, &args.source)?;
            println!("{} {} is valid", package.name, package.version);
        }
        Commands::Link(args) => {
            let linked = bpm::application::link(&runtime, &args.bundle, &args.module, cli.root)?;
            println!("{} ({})", linked.module.path, linked.module.package());
            for (path, dependency) in &linked.dependencies {
                println!("  {} ({})", path, dependency.module.package());
            }
        }
    }
    Ok(())
}
