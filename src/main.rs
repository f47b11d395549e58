//! ccheck CLI entry point: tracing bootstrap, a worker thread with a
//! large stack for deep token/AST recursion, and dispatch into the CLI
//! layer.

use anyhow::Result;

/// Deeply nested expressions recurse through the AST builder and the
/// value-flow fold; the default main-thread stack is too small for
/// pathological inputs.
const MAIN_STACK_SIZE: usize = 16 * 1024 * 1024;

fn main() -> Result<()> {
    ccheck::observability::init_tracing();

    let code = std::thread::Builder::new()
        .stack_size(MAIN_STACK_SIZE)
        .spawn(run)?
        .join()
        .map_err(|_| anyhow::anyhow!("analysis thread panicked"))?;
    std::process::exit(code);
}

fn run() -> i32 {
    match ccheck::cli::run_from_args() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ccheck: {err:#}");
            1
        }
    }
}
