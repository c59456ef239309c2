//! Assembler command-line entry point.
//!
//! Usage: `corevm-asm <input.asm> <output.bin>`.

use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let name = Path::new(&args[0])
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "corevm-asm".to_string());
        println!("Usage: {} <input.asm> <output.bin>", name);
        std::process::exit(1);
    }

    match corevm_assembler::compile_file(Path::new(&args[1]), Path::new(&args[2])) {
        Ok(size) => {
            println!("Compilation finished. Bytecode ({} bytes) written to {}", size, args[2]);
        }
        Err(err) => {
            eprintln!("Compilation error: {}", err);
            std::process::exit(1);
        }
    }
}
