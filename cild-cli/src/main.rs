use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use cild_decompiler::MethodContext;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "cild", about = "Best-effort CIL listing decompiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompile an instruction listing to structured source text
    Decompile {
        /// Path to the listing file
        input: PathBuf,
        /// Method name used in the emitted signature
        #[arg(long, default_value = "Method")]
        name: String,
        /// Return type used in the emitted signature
        #[arg(long, default_value = "void")]
        ret: String,
        /// Parameter type, repeatable, in slot order
        #[arg(long = "param")]
        params: Vec<String>,
        /// Local variable type, repeatable, in slot order
        #[arg(long = "local")]
        locals: Vec<String>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print diagnostics to stderr after the source
        #[arg(long)]
        show_diagnostics: bool,
    },
    /// Parse a listing and print the normalized instruction stream
    Parse {
        /// Path to the listing file
        input: PathBuf,
    },
    /// Print the basic block layout recovered from a listing
    Blocks {
        /// Path to the listing file
        input: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Decompile {
            input,
            name,
            ret,
            params,
            locals,
            output,
            show_diagnostics,
        } => cmd_decompile(
            &input,
            &name,
            &ret,
            &params,
            &locals,
            output.as_deref(),
            show_diagnostics,
        ),
        Commands::Parse { input } => cmd_parse(&input),
        Commands::Blocks { input } => cmd_blocks(&input),
    }
}

fn read_listing(path: &PathBuf) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_decompile(
    input: &PathBuf,
    name: &str,
    ret: &str,
    params: &[String],
    locals: &[String],
    output: Option<&std::path::Path>,
    show_diagnostics: bool,
) {
    let listing = read_listing(input);
    let params: Vec<&str> = params.iter().map(String::as_str).collect();
    let locals: Vec<&str> = locals.iter().map(String::as_str).collect();
    let ctx = MethodContext::new(name, ret, &params, &locals);

    let result = cild_decompiler::decompile_with_diagnostics(&listing, &ctx);

    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, &result.source) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
            log::info!("wrote {}", path.display());
        }
        None => print!("{}", result.source),
    }

    if show_diagnostics {
        for diag in &result.diagnostics {
            eprintln!("warning: {diag}");
        }
    }
}

fn cmd_parse(input: &PathBuf) {
    let listing = read_listing(input);
    let parsed = cild_decompiler::parse_listing(&listing);

    for insn in &parsed.instructions {
        let label = insn.label.as_deref().unwrap_or("");
        match &insn.operand {
            Some(op) => println!("{:4}  {label}: {} {op}", insn.index, insn.mnemonic),
            None => println!("{:4}  {label}: {}", insn.index, insn.mnemonic),
        }
    }
    for diag in &parsed.diagnostics {
        eprintln!("warning: {diag}");
    }
}

fn cmd_blocks(input: &PathBuf) {
    let listing = read_listing(input);
    let parsed = cild_decompiler::parse_listing(&listing);
    let mut cfg = cild_ir::cfg::Cfg::build(&parsed.instructions, &parsed.labels);
    cild_decompiler::structure::analyze(&mut cfg, &parsed.instructions, &parsed.labels);

    for block in &cfg.blocks {
        let mut notes = Vec::new();
        if block.is_loop_header {
            match block.loop_kind {
                Some(k) => notes.push(format!("loop header ({k:?})")),
                None => notes.push("loop header".to_owned()),
            }
        }
        if block.is_loop_end {
            notes.push("loop end".to_owned());
        }
        if block.is_switch {
            notes.push(format!("switch ({} targets)", block.switch_targets.len()));
        }
        if block.is_try_block {
            notes.push("try".to_owned());
        }
        if block.is_finally_block {
            notes.push("finally".to_owned());
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!("  [{}]", notes.join(", "))
        };
        println!(
            "block {}: insns {}..{}  succs {:?}{notes}",
            block.id, block.first, block.last, block.succs
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decompile_args_parse_with_defaults() {
        let cli = Cli::try_parse_from(["cild", "decompile", "in.il"]).unwrap();
        match cli.command {
            Commands::Decompile {
                input,
                name,
                ret,
                params,
                locals,
                output,
                show_diagnostics,
            } => {
                assert_eq!(input, PathBuf::from("in.il"));
                assert_eq!(name, "Method");
                assert_eq!(ret, "void");
                assert!(params.is_empty());
                assert!(locals.is_empty());
                assert!(output.is_none());
                assert!(!show_diagnostics);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn param_and_local_flags_are_repeatable() {
        let cli = Cli::try_parse_from([
            "cild",
            "decompile",
            "in.il",
            "--name",
            "Add",
            "--ret",
            "int",
            "--param",
            "int",
            "--param",
            "string",
            "--local",
            "int",
            "--show-diagnostics",
        ])
        .unwrap();
        match cli.command {
            Commands::Decompile {
                name,
                ret,
                params,
                locals,
                show_diagnostics,
                ..
            } => {
                assert_eq!(name, "Add");
                assert_eq!(ret, "int");
                assert_eq!(params, ["int", "string"]);
                assert_eq!(locals, ["int"]);
                assert!(show_diagnostics);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(Cli::try_parse_from(["cild", "decompile"]).is_err());
        assert!(Cli::try_parse_from(["cild"]).is_err());
    }
}
