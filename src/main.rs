use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use ward::field::{Field, U256};
use ward::r1cs::Lc;
use ward::symbol::Slot;
use ward::{render_diagnostics, CompilationResult, QapCompiler};

#[derive(Parser)]
#[command(
    name = "ward",
    version,
    about = "ward compiler: declarative rules to quadratic arithmetic programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a .ward file and print the constraint system and QAP shape
    Compile {
        /// Input .ward file
        input: PathBuf,
        /// Field modulus: 'bn254', 'test' (2^31 - 1) or a decimal prime
        #[arg(long, default_value = "bn254")]
        field: String,
        /// Dump all artifacts as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },
    /// Compile and check a witness for the given inputs
    Check {
        /// Input .ward file
        input: PathBuf,
        /// Field modulus: 'bn254', 'test' (2^31 - 1) or a decimal prime
        #[arg(long, default_value = "bn254")]
        field: String,
        /// Input assignment, repeatable: --set name=value
        #[arg(long = "set", value_name = "NAME=VALUE")]
        assignments: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile { input, field, json } => cmd_compile(input, &field, json),
        Command::Check {
            input,
            field,
            assignments,
        } => cmd_check(input, &field, &assignments),
    }
}

fn cmd_compile(input: PathBuf, field: &str, json: bool) {
    let result = compile_file(&input, field);

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(dump) => println!("{}", dump),
            Err(e) => {
                eprintln!("error: cannot serialize artifacts: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("field modulus: {}", result.field.modulus());
    println!();

    println!("witness layout ({} slots):", result.symbols.num_witness());
    for (index, slot) in result.symbols.slots().iter().enumerate() {
        match slot {
            Slot::One => println!("  w[{}] = 1 (constant)", index),
            Slot::Input { name, public } => println!(
                "  w[{}] = {} ({})",
                index,
                name,
                if *public { "public" } else { "private" }
            ),
            Slot::Aux { label } => println!("  w[{}] = {} (aux)", index, label),
        }
    }
    println!();

    println!("constraints ({}):", result.r1cs.constraints.len());
    for (k, constraint) in result.r1cs.constraints.iter().enumerate() {
        println!(
            "  [{}] ({}) * ({}) = ({})   # {}",
            k,
            fmt_lc(&constraint.a),
            fmt_lc(&constraint.b),
            fmt_lc(&constraint.c),
            constraint.label
        );
    }
    println!();

    println!(
        "qap: {} polynomial triples over {} points, vanishing degree {}",
        result.qap.a_polys.len(),
        result.qap.points.len(),
        result.qap.vanishing.degree().unwrap_or(0)
    );
}

fn cmd_check(input: PathBuf, field: &str, assignments: &[String]) {
    let result = compile_file(&input, field);

    let mut inputs = BTreeMap::new();
    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            eprintln!("error: malformed --set '{}', expected NAME=VALUE", assignment);
            process::exit(1);
        };
        let Ok(value) = value.parse::<u64>() else {
            eprintln!("error: '{}' is not an unsigned integer", value);
            process::exit(1);
        };
        inputs.insert(name.to_string(), value);
    }

    let witness = match result.evaluate_witness(&inputs) {
        Ok(witness) => witness,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    // evaluate_witness already enforces each assertion; the divisibility
    // test cross-checks the interpolated form
    if result.qap.check_witness(&witness) {
        println!("ok: all {} constraints satisfied", result.r1cs.constraints.len());
    } else {
        eprintln!("error: witness fails the divisibility check");
        process::exit(1);
    }
}

fn compile_file(input: &PathBuf, field: &str) -> CompilationResult {
    let field = parse_field(field);
    let source = match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", input.display(), e);
            process::exit(1);
        }
    };

    match QapCompiler::new(field).compile(&source) {
        Ok(result) => result,
        Err(diagnostics) => {
            render_diagnostics(&diagnostics, &input.to_string_lossy(), &source);
            process::exit(1);
        }
    }
}

fn parse_field(arg: &str) -> Field {
    match arg {
        "bn254" => Field::bn254(),
        "test" => Field::test_prime(),
        decimal => {
            let Some(modulus) = U256::from_dec(decimal) else {
                eprintln!(
                    "error: '{}' is not 'bn254', 'test' or a decimal number below 2^256",
                    decimal
                );
                process::exit(1);
            };
            match Field::new(modulus) {
                Ok(field) => field,
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            }
        }
    }
}

fn fmt_lc(lc: &Lc) -> String {
    if lc.0.is_empty() {
        return "0".to_string();
    }
    lc.0.iter()
        .map(|(index, coeff)| {
            if *index == 0 {
                format!("{}", coeff)
            } else {
                format!("{}*w[{}]", coeff, index)
            }
        })
        .collect::<Vec<_>>()
        .join(" + ")
}
