//! Skald compiler CLI.
//!
//! `compile` reads a source file (or stdin) and writes a native executable;
//! `run` evaluates a program in the interpreter; `serve` starts the TCP
//! compile service.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use skaldc::LinkOptions;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "skaldc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Skald compiler - compile Skald programs to native executables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program to a native x86-64 Linux executable
    Compile {
        /// Input source file (standard input when omitted)
        input: Option<PathBuf>,

        /// Output executable path
        #[arg(short, long)]
        output: PathBuf,

        /// Link with cc so the C runtime provides _start
        #[arg(long)]
        link_with_c: bool,

        /// Extra -l libraries for the linker
        #[arg(long = "lib", value_name = "NAME")]
        libraries: Vec<String>,
    },

    /// Run a program in the tree-walking interpreter (development tool)
    Run {
        /// Input source file (standard input when omitted)
        input: Option<PathBuf>,
    },

    /// Serve compile requests over TCP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    match cli.command {
        Commands::Compile {
            input,
            output,
            link_with_c,
            libraries,
        } => {
            let options = LinkOptions {
                link_with_c,
                extra_libraries: libraries,
            };
            run_compile(input.as_deref(), &output, &options);
        }
        Commands::Run { input } => run_interpreter(input.as_deref()),
        Commands::Serve { host, port } => run_serve(&host, port),
        Commands::Completions { shell } => run_completions(shell),
    }
}

/// Read the source and its display name; stdin shows as `(source code)`.
fn read_source(input: Option<&Path>) -> (String, String) {
    let result = match input {
        Some(path) => std::fs::read_to_string(path)
            .map(|source| (source, path.display().to_string())),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .map(|_| (source, "(source code)".to_string()))
        }
    };
    match result {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: failed to read source: {}", e);
            process::exit(1);
        }
    }
}

fn run_compile(input: Option<&Path>, output: &Path, options: &LinkOptions) {
    let (source, filename) = read_source(input);
    if let Err(e) = skaldc::compile_to_file(&source, &filename, output, options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_interpreter(input: Option<&Path>) {
    let (source, filename) = read_source(input);
    let result = skaldc::tokenizer::tokenize(&source, &filename)
        .and_then(|tokens| skaldc::parser::parse(&tokens))
        .and_then(|mut module| {
            skaldc::typechecker::typecheck_module(&mut module)?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            skaldc::interpreter::run_module(&module, stdin.lock(), stdout.lock())
        });
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_serve(host: &str, port: u16) {
    println!("Starting TCP server at {}:{}", host, port);
    if let Err(e) = skaldc::server::run_server(host, port) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "skaldc", &mut io::stdout());
}
