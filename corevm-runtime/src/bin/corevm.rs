//! Host VM command-line entry point.
//!
//! Usage: `corevm <program.bin> [debug]`. Exits 0 on normal termination,
//! 1 on load failure or when execution ends in a fault.

use corevm_runtime::{loader, Vm};
use std::path::Path;
use std::time::Instant;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <program.bin> [debug]", args[0]);
        return 1;
    }

    let mut vm = match Vm::new() {
        Ok(vm) => vm,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };
    if args.len() > 2 && args[2] == "debug" {
        vm.debug = true;
    }

    let size = match loader::load_file(&mut vm, Path::new(&args[1])) {
        Ok(size) => size,
        Err(err) => {
            eprintln!("{}", err);
            return 1;
        }
    };
    println!("Loaded program of {} bytes", size);

    let start = Instant::now();
    vm.run();
    let elapsed = start.elapsed().as_secs_f64();

    if vm.error_occurred {
        println!("\nExecution finished with an ERROR.");
        1
    } else if vm.running {
        println!("\nExecution interrupted unexpectedly.");
        0
    } else {
        println!(
            "\nExecution finished successfully. Time: {:.6} seconds",
            elapsed
        );
        0
    }
}
