//! Headless runner: assembles a `.asm` file, loads it into a CPU with a
//! sample peripheral, and runs it to completion or trap.

use runner::SamplePeripheral;
use std::fs;
use std::process::ExitCode;
use vm_asm::Assembler;
use vm_core::{Cpu, Memory, MemoryConfig, Observable};

const DEFAULT_MEMORY_SIZE: usize = 4096;
const DEFAULT_BUDGET: u32 = 100_000;
const PERIPHERAL_BASE: u32 = 0x8000_0000;

struct Config {
    path: String,
    budget: u32,
    memory_size: usize,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Result<Config, String> {
    let mut path = None;
    let mut budget = DEFAULT_BUDGET;
    let mut memory_size = DEFAULT_MEMORY_SIZE;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "--budget" => {
                let value = iter.next().ok_or("--budget requires a value")?;
                budget = value.parse().map_err(|_| format!("invalid --budget value '{value}'"))?;
            }
            "--memory" => {
                let value = iter.next().ok_or("--memory requires a value")?;
                memory_size = value.parse().map_err(|_| format!("invalid --memory value '{value}'"))?;
            }
            other if path.is_none() => path = Some(other.to_string()),
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    let path = path.ok_or("missing source file")?;
    Ok(Config { path, budget, memory_size, verbose })
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Usage: runner <source.asm> [--budget N] [--memory BYTES] [-v|--verbose]");
            return ExitCode::FAILURE;
        }
    };

    let source = match fs::read_to_string(&config.path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to read '{}': {e}", config.path);
            return ExitCode::FAILURE;
        }
    };

    let image = match Assembler::new(config.memory_size as u32).assemble(&source) {
        Ok(image) => image,
        Err(errors) => {
            for error in errors {
                eprintln!("{error}");
            }
            return ExitCode::FAILURE;
        }
    };

    let memory = Memory::new(
        MemoryConfig { size: config.memory_size, peripheral_base: PERIPHERAL_BASE },
        SamplePeripheral::default(),
    );
    let mut cpu = Cpu::new(memory);
    cpu.load(image.instructions, &image.data);
    cpu.set_pc(image.entry as usize);

    let status = run(&mut cpu, config.budget, config.verbose);

    println!("status: {status}");
    print_registers(&cpu);

    if status.is_trap() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cpu: &mut Cpu<SamplePeripheral>, budget: u32, verbose: bool) -> vm_core::Status {
    if !verbose {
        let (status, _completed) = cpu.cycle(budget);
        return status;
    }

    // Retrace one instruction at a time so each retired instruction's
    // address and decode can be reported before it executes.
    let mut remaining = budget;
    loop {
        if remaining == 0 {
            return vm_core::Status::Success;
        }
        let pc = cpu.pc();
        let decoded = cpu.peek_instruction().map(vm_core::encoding::describe);
        let (status, completed) = cpu.cycle(1);
        match &decoded {
            Some(line) => eprintln!("{pc:#06x}: {line}"),
            None => eprintln!("{pc:#06x}: <no instruction>"),
        }
        if status != vm_core::Status::Success {
            eprintln!("  -> {status}");
        }
        remaining -= 1;
        if !completed {
            return status;
        }
    }
}

fn print_registers(cpu: &Cpu<SamplePeripheral>) {
    for path in cpu.query_paths() {
        if let Some(value) = cpu.query(&path) {
            println!("  {path} = {value}");
        }
    }
}
