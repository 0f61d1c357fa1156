use anyhow::{anyhow, Result};
use std::env;


/// Which stages to dump and which backend runs the program
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub show_ast: bool,
    pub show_lir: bool,
    pub native: bool,
    /// Assembly destination; stdout when unset
    pub output_path: Option<String>,
}

/// Parsed command line arguments
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub file_path: String,
    pub output_config: OutputConfig,
}

impl CliArgs {
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        let program_name = args.first().map(String::as_str).unwrap_or("ember");

        if args.iter().skip(1).any(|arg| arg == "--help" || arg == "-h") {
            Self::print_usage(program_name);
            std::process::exit(0);
        }

        Self::parse_from(&args).inspect_err(|_| Self::print_usage(program_name))
    }

    /// Parses an argument list whose first entry is the program name
    pub fn parse_from(args: &[String]) -> Result<Self> {
        let Some(file_path) = args.get(1).cloned() else {
            return Err(anyhow!("Please provide a .em file to compile"));
        };

        if !file_path.ends_with(".em") {
            return Err(anyhow!("File must have .em extension"));
        }

        let mut output_config = OutputConfig::default();
        let mut flags = args.iter().skip(2);

        while let Some(arg) = flags.next() {
            match arg.as_str() {
                "--ast" => output_config.show_ast = true,
                "--lir" => output_config.show_lir = true,
                "--native" => output_config.native = true,
                "-o" => match flags.next() {
                    Some(path) => output_config.output_path = Some(path.clone()),
                    None => return Err(anyhow!("`-o` expects an output path")),
                },
                flag => return Err(anyhow!("Unknown command line flag: {}", flag)),
            }
        }

        if output_config.output_path.is_some() {
            output_config.native = true;
        }

        Ok(Self { file_path, output_config })
    }

    fn print_usage(program_name: &str) {
        eprintln!("Usage: {} <file.em> [OPTIONS]", program_name);
        eprintln!();
        eprintln!("OPTIONS:");
        eprintln!("  --ast                 Show the resolved AST");
        eprintln!("  --lir                 Show LIR before lowering");
        eprintln!("  --native              Compile to x86-64 assembly instead of evaluating");
        eprintln!("  -o <file.s>           Write assembly to a file (implies --native)");
        eprintln!("  --help, -h            Show this help message");
        eprintln!();
        eprintln!("EXAMPLES:");
        eprintln!("  {} program.em                     # Run on the evaluator", program_name);
        eprintln!("  {} program.em --native -o out.s   # Emit assembly", program_name);
        eprintln!("  {} program.em --lir --native      # Show LIR, then assembly", program_name);
    }
}
