use std::rc::Rc;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ember_common::diagnostics::DiagnosticsReportCell;
use ember_common::text::SourceText;
use ember_front::compilation_unit::CompilationUnit;
use ember_middle::ir::lir::builder::LIRBuilder;
use ember_middle::ir::lir::writer::LIRWriter;

mod cli;
use cli::CliArgs;


fn failure(stage: &str, file_path: &str, report: &DiagnosticsReportCell) -> anyhow::Error {
    let error_count = report.borrow().errors.len();
    if error_count == 1 {
        anyhow!("Could not {} `{}` due to {} previous error", stage, file_path, error_count)
    } else {
        anyhow!("Could not {} `{}` due to {} previous errors", stage, file_path, error_count)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse()?;
    let config = &args.output_config;

    let input = std::fs::read_to_string(&args.file_path)
        .map_err(|e| anyhow!("Failed to read file '{}': {}", args.file_path, e))?;
    let text = SourceText::new(input.clone());

    let mut compilation_unit = CompilationUnit::compile(&input).map_err(|report| {
        CompilationUnit::output_errors(&text, &report);
        CompilationUnit::output_warnings(&text, &report);
        failure("compile", &args.file_path, &report)
    })?;
    CompilationUnit::output_warnings(&text, &compilation_unit.diagnostics_report);

    if config.show_ast {
        println!("=== AST ===");
        println!("{}", compilation_unit.ast.visualise(true));
    }

    if !config.native {
        let value = compilation_unit.run_evaluator(std::io::stdout()).map_err(|report| {
            CompilationUnit::output_errors(&text, &report);
            failure("run", &args.file_path, &report)
        })?;
        info!(%value, "program finished");
        return Ok(());
    }

    let lir_builder = LIRBuilder::new(&compilation_unit.global_scope, Rc::clone(&compilation_unit.diagnostics_report));
    let mut lir = lir_builder.build(&mut compilation_unit.ast).map_err(|_| {
        CompilationUnit::output_errors(&text, &compilation_unit.diagnostics_report);
        failure("generate code for", &args.file_path, &compilation_unit.diagnostics_report)
    })?;

    if config.show_lir {
        println!("=== LIR ===");
        let mut lir_output = String::new();
        LIRWriter::write_txt(&mut lir_output, &lir)?;
        println!("{}", lir_output);
    }

    let asm = ember_codegen::compile_to_asm(&mut lir)?;

    match &config.output_path {
        Some(path) => {
            std::fs::write(path, &asm)?;
            println!("Assembly written to: {}", path);
        }
        None => print!("{}", asm),
    }

    Ok(())
}
