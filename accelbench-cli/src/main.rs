//! Command line entry point of the accelerator benchmark.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    accelbench_cli::cli::execute()
}
