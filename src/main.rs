//! Reads a coil document and prints either its nested or flattened form.

use std::process::ExitCode;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use coil_core::Options;
use coil_fs::DiskFileSource;

/// Dumps a parsed and expanded coil document back to source syntax.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CommandLineArgs {
    /// The coil document to read
    path: Utf8PathBuf,

    /// Print dotted top-level keys (`a.b.c: 1`) instead of nested braces
    #[arg(long)]
    flat: bool,

    /// Allow repeated sets/deletes within a single struct body
    #[arg(long)]
    permissive: bool,

    /// Filesystem roots searched for `@package` includes
    #[arg(long = "package-root")]
    package_roots: Vec<String>,

    /// Increase logging verbosity (0: warn; 1: info; 2: debug; 3: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> ExitCode {
    let args = CommandLineArgs::parse();
    init_logger(args.verbose);

    match run(&args) {
        Ok(text) => {
            print!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CommandLineArgs) -> Result<String> {
    let file_source = DiskFileSource;
    let options = Options {
        permissive: args.permissive,
        file_source: Some(&file_source),
        package_roots: &args.package_roots,
        package_marker: "__init__.coil",
        ..Options::new()
    };

    let tree = coil_core::parse_file(args.path.as_str(), &options)?;

    Ok(if args.flat {
        coil_core::serialize_flat(&tree)
    } else {
        coil_core::serialize_nested(&tree)
    })
}
