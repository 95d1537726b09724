use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tracing_log::log::debug;

#[derive(Parser, Debug)]
#[command(version, about = "MiniJava to Vapor/VaporM compiler")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Type check a MiniJava program (phases A-C)")]
    Check {
        #[arg(help = "MiniJava source file; stdin when omitted")]
        file: Option<PathBuf>,
    },
    #[command(about = "Compile MiniJava to Vapor on stdout (phases A-D)")]
    Vapor {
        #[arg(help = "MiniJava source file; stdin when omitted")]
        file: Option<PathBuf>,
    },
    #[command(about = "Allocate registers: Vapor in, VaporM on stdout (phase E)")]
    Vaporm {
        #[arg(help = "Vapor source file; stdin when omitted")]
        file: Option<PathBuf>,
    },
    #[command(about = "Compile MiniJava all the way to VaporM on stdout")]
    Compile {
        #[arg(help = "MiniJava source file; stdin when omitted")]
        file: Option<PathBuf>,
    },
}

fn init_tracing() {
    let _ = tracing_log::LogTracer::init();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_input(file: &Option<PathBuf>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn main() {
    init_tracing();
    let args = Args::parse();
    debug!("provided command line arguments: {:?}", args);

    let (file, run): (_, fn(&str) -> Result<Option<String>, vaporc_compiler::CompileError>) =
        match &args.command {
            Command::Check { file } => (file, |src| vaporc_compiler::check(src).map(|_| None)),
            Command::Vapor { file } => (
                file,
                |src| vaporc_compiler::compile_to_vapor(src).map(Some),
            ),
            Command::Vaporm { file } => (
                file,
                |src| vaporc_compiler::vapor_to_vaporm(src).map(Some),
            ),
            Command::Compile { file } => (
                file,
                |src| vaporc_compiler::compile_to_vaporm(src).map(Some),
            ),
        };

    let source = match read_input(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read input: {e}");
            std::process::exit(1);
        }
    };

    match run(&source) {
        Ok(Some(output)) => print!("{output}"),
        Ok(None) => eprintln!("Program type checked successfully"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
