use ariadne::Source;
use chumsky::prelude::*;
use codegen::{CompilationContext, GenError, Options};
use std::io::Write;
use tracing_subscriber::EnvFilter;

pub mod config;

fn main() {
    let matches = compile_args(
        clap::command!("cilgen")
            .about("Compile Brainfuck programs to CIL assembly")
            .subcommand_required(false)
            .subcommand(compile_args(
                clap::Command::new("compile").about("Compile a Brainfuck program to CIL assembly"),
            )),
    )
    .get_matches();

    // Dispatch the appropriate action based on the subcommand. If no subcommand
    // is provided, we default to the "compile" action.
    if let Some(args) = matches.subcommand_matches("compile") {
        compile(args);
    } else if matches.subcommand_name().is_none() {
        compile(&matches);
    }
}

/// Add the arguments of the compile action to a command. They are accepted both by the
/// `compile` subcommand and at the top level.
fn compile_args(command: clap::Command) -> clap::Command {
    command
        .arg(clap::arg!([file] "The file to compile"))
        .arg(clap::arg!(-o --output <output> "The output file"))
        .arg(
            clap::arg!(--"dump-ast" "Dump the AST to the console")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(--"dump-il" "Dump the generated CIL assembly to the console")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(--"trace-time" "Trace the time taken by each compilation phase")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(--"no-peephole" "Disable the peephole rewrites of the emitter")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::arg!(--checked "Check cell arithmetic for overflow")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(clap::arg!(--"assembly-name" <name> "The name of the generated assembly"))
        .arg(
            clap::arg!(-v --verbose "Log what the backend does on the standard error")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Install the log subscriber. The filter comes from `RUST_LOG` when it is set, and
/// defaults to the debug level with `--verbose`. Without either, nothing is logged.
fn init_tracing(verbose: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => return,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("tracing initialized");
}

fn compile(args: &clap::ArgMatches) {
    init_tracing(args.get_flag("verbose"));

    let default_output_name = String::from(config::DEFAULT_OUTPUT_NAME);
    let default_input_name = String::from(config::DEFAULT_INPUT_NAME);
    let default_assembly_name = String::from(config::DEFAULT_ASSEMBLY_NAME);
    let output = args
        .get_one::<String>("output")
        .unwrap_or(&default_output_name);
    let path = args
        .get_one::<String>("file")
        .unwrap_or(&default_input_name);
    let assembly_name = args
        .get_one::<String>("assembly-name")
        .unwrap_or(&default_assembly_name);

    let program = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) => {
            eprintln!("Error reading file {}: {}", path, error);
            return;
        }
    };

    let source = Source::from(program.as_str());
    let (parsing_time, (commands, errors)) =
        trace_time(|| bf::parser().parse(&program).into_output_errors());

    // If there were syntax errors, report them against the source and exit early.
    if !errors.is_empty() {
        let open = bf::error::unclosed_bracket(&program);
        for error in &errors {
            let report = bf::SyntaxError::from_rich(error).report(path.as_str(), open);
            if let Err(e) = report.eprint((path.as_str(), &source)) {
                eprintln!("Error printing a diagnostic: {e}");
            }
        }
        return;
    }
    let commands = commands.unwrap_or_default();

    let mut ctx = CompilationContext::new(Options {
        peephole: !args.get_flag("no-peephole"),
        checked: args.get_flag("checked"),
        assembly_name: assembly_name.clone(),
    });
    let (codegen_time, ast) =
        trace_time(|| bf::compile(&mut ctx, path, &program, &commands));

    let ast = match ast {
        Ok(ast) => ast,
        Err(error) => {
            fatal(&mut ctx, path, &error);
            return;
        }
    };

    // Dump the AST if the flag is set. It is only built once the program parsed
    // successfully.
    if args.get_flag("dump-ast") {
        println!("AST:");
        for (id, node) in ast.iter() {
            println!(" {id} {node:?}");
        }
    }

    if ctx.reporter.has_errors() {
        return;
    }
    let warnings = ctx.reporter.warning_count();
    let assembly = ctx.finish();

    let (writing_time, written) = trace_time(|| -> codegen::Result<()> {
        let mut file = std::io::BufWriter::new(std::fs::File::create(output)?);
        assembly.write_to(&mut file)?;
        file.flush()?;
        Ok(())
    });
    if let Err(error) = written {
        eprintln!("Error writing file {}: {}", output, error);
        return;
    }
    if args.get_flag("dump-il") {
        println!("Generated CIL assembly:");
        print!("{assembly}");
    }
    tracing::info!(output = %output, warnings, "compilation finished");

    // If the 'trace-time' flag is set, print the time taken by each compilation phase
    if args.get_flag("trace-time") {
        println!("Compilation time breakdown:");
        println!(" - Parsing time:     {}", readable_duration(parsing_time));
        println!(" - Codegen time:     {}", readable_duration(codegen_time));
        println!(" - Writing time:     {}", readable_duration(writing_time));
    }
}

/// Report a backend error as a single fatal diagnostic. There is no node to attach it
/// to, so it goes on the first line of the file.
fn fatal(ctx: &mut CompilationContext, path: &str, error: &GenError) {
    ctx.reporter
        .error_on_line(path, 1, &format!("fatal: {error}"));
}

/// Utility function to trace the execution time of a given closure, returning the
/// duration along with the result of the closure.
fn trace_time<T, F: FnOnce() -> T>(f: F) -> (std::time::Duration, T) {
    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();
    (duration, result)
}

/// Format a `Duration` into a human-readable string, with appropriate units and precision. This
/// function converts the duration into seconds, milliseconds, microseconds, or nanoseconds
/// based on its magnitude.
fn readable_duration(duration: std::time::Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos >= 1_000_000_000 {
        format!("{:.3} s", nanos as f64 / 1_000_000_000.0)
    } else if nanos >= 1_000_000 {
        format!("{:.3} ms", nanos as f64 / 1_000_000.0)
    } else if nanos >= 1_000 {
        format!("{:.3} µs", nanos as f64 / 1_000.0)
    } else {
        format!("{} ns", nanos)
    }
}
