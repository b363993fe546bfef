//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `stepsync_core` linkage.
//! - Given `<db_path> <assembly_name>`, print a summary of the registered tree.

use std::error::Error;
use std::process::ExitCode;
use stepsync_core::{open_db, RegistryAdapter, SqliteRegistry};

fn main() -> ExitCode {
    println!("stepsync_core ping={}", stepsync_core::ping());
    println!("stepsync_core version={}", stepsync_core::core_version());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [db_path, assembly_name] = args.as_slice() else {
        return ExitCode::SUCCESS;
    };

    match summarize(db_path, assembly_name) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(db_path: &str, assembly_name: &str) -> Result<String, Box<dyn Error>> {
    let conn = open_db(db_path)?;
    let adapter = RegistryAdapter::new(SqliteRegistry::new(&conn));
    let summary = match adapter.load_by_name(assembly_name)? {
        Some(assembly) => {
            let images: usize = assembly
                .handlers()
                .iter()
                .flat_map(|handler| handler.steps())
                .map(|step| step.images().len())
                .sum();
            format!(
                "assembly={} id={} version={} handlers={} steps={} images={}",
                assembly.name(),
                assembly.id(),
                assembly.version,
                assembly.handlers().len(),
                assembly.step_count(),
                images
            )
        }
        None => format!("assembly={assembly_name} registered=false"),
    };
    Ok(summary)
}
