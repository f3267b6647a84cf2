use std::process;

use bcode::bytecode::check_program;
use bcode::bytecode::disasm::{listing, print_program};
use bcode::bytecode::op::InstructionSet;
use bcode::isa::{Basic, Narrow, Registers, narrow, select};
use bcode::{CheckError, MachineConfig, Program};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "bcode", about = "Build and run threaded bytecode demo programs")]
struct Cli {
    #[command(subcommand)]
    demo: Demo,

    /// Print the disassembly before running
    #[arg(long, global = true)]
    disasm: bool,

    /// Print the listing as JSON and exit without running
    #[arg(long, global = true)]
    json: bool,

    /// Number of general registers
    #[arg(long, global = true, default_value_t = 7)]
    registers: usize,
}

#[derive(Subcommand)]
enum Demo {
    /// r0 = 0 + 1 + ... + (limit - 1)
    Sum {
        #[arg(long, default_value_t = 1_000_000)]
        limit: u64,

        /// Build for the 32-bit integer-only instruction set; the total wraps at 32 bits
        #[arg(long)]
        narrow: bool,
    },
    /// r0 = fib(n), wrapping on overflow
    Fib {
        #[arg(long, default_value_t = 50)]
        n: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let machine = MachineConfig::integer_only(cli.registers);

    match cli.demo {
        Demo::Sum {
            limit,
            narrow: true,
        } => {
            let limit = match u32::try_from(limit) {
                Ok(limit) => limit,
                Err(_) => {
                    eprintln!("--limit {} does not fit a 32-bit immediate", limit);
                    process::exit(1);
                }
            };
            execute(build_narrow_sum(limit), &cli, &machine);
        }
        Demo::Sum { limit, .. } => execute(build_sum(limit), &cli, &machine),
        Demo::Fib { n } => execute(build_fib(n), &cli, &machine),
    }
}

/// Print, validate and run one demo program, exiting non-zero on a check
/// failure.
fn execute<I>(program: Program<I>, cli: &Cli, machine: &MachineConfig)
where
    I: InstructionSet<State = Registers, Output = Option<u64>>,
{
    if cli.json {
        match serde_json::to_string_pretty(&listing(&program)) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to encode listing: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if cli.disasm {
        print_program(&program);
    }

    match check_and_run(&program, machine) {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => println!("(no result register)"),
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("  hint: {}", e.hint());
            process::exit(1);
        }
    }

    program.destroy();
}

/// Validate `program` against the register file it will get, then run it.
fn check_and_run<I>(program: &Program<I>, machine: &MachineConfig) -> Result<Option<u64>, CheckError>
where
    I: InstructionSet<State = Registers, Output = Option<u64>>,
{
    check_program(program, machine)?;

    let mut regs = Registers::new(machine);
    let result = program.run(&mut regs);
    info!(instructions = program.len(), "demo finished");

    // the calling convention returns general register 0
    Ok(result)
}

/// The classic counting loop: i in r2, limit in r1, total in r0.
fn build_sum(limit: u64) -> Program<Basic> {
    let mut p = Program::new();

    select::movi(&mut p, 2, 0);
    select::movi(&mut p, 1, limit);
    select::movi(&mut p, 0, 0);

    let top = p.label();
    select::addr(&mut p, 0, 0, 2);
    select::addi(&mut p, 2, 2, 1);
    let r = select::bltr(&mut p, 2, 1, 0);
    p.append_halt();

    p.patch_label(r, top);
    p
}

/// The counting loop again, built for the 32-bit instruction set.
fn build_narrow_sum(limit: u32) -> Program<Narrow> {
    let mut p = Program::new();

    narrow::select::movi(&mut p, 2, 0);
    narrow::select::movi(&mut p, 1, limit);
    narrow::select::movi(&mut p, 0, 0);

    let top = p.label();
    narrow::select::addr(&mut p, 0, 0, 2);
    narrow::select::addi(&mut p, 2, 2, 1);
    let r = narrow::select::bltr(&mut p, 2, 1, 0);
    p.append_halt();

    p.patch_label(r, top);
    p
}

/// a in r1, b in r2, n in r3, counter in r4; result copied to r0.
fn build_fib(n: u64) -> Program<Basic> {
    let mut p = Program::new();

    select::movi(&mut p, 1, 0);
    select::movi(&mut p, 2, 1);
    select::movi(&mut p, 3, n);
    select::movi(&mut p, 4, 0);

    let top = p.label();
    let done = select::beqr(&mut p, 4, 3, 0);
    select::addr(&mut p, 5, 1, 2);
    select::movr(&mut p, 1, 2);
    select::movr(&mut p, 2, 5);
    select::addi(&mut p, 4, 4, 1);
    let back = select::jmp(&mut p, 0);

    let exit = p.label();
    select::movr(&mut p, 0, 1);
    p.append_halt();

    p.patch_label(done, exit);
    p.patch_label(back, top);
    p
}
