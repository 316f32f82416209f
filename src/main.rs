//! Designc Compiler Binary

use designc::EnhancedCli;
use std::process;

fn main() {
    let mut cli = EnhancedCli::new();

    if let Err(e) = cli.run() {
        if e.is_model_defect() {
            eprintln!("Compilation failed: {}", e);
        } else {
            eprintln!("Error: {}", e);
        }
        process::exit(1);
    }
}
