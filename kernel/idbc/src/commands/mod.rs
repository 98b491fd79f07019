//! Command handlers.

use std::io::Write;
use std::path::Path;

use idb_lib::blend::{read_main, write_main, MemFile};
use idb_lib::Main;
use idb_types::builtin_main;

use crate::{CliError, Command, Options};

mod demo;
mod dump;
mod verify;

pub use demo::demo_main;
pub use dump::dump_main;
pub use verify::{verify_main, Problem};

/// Run the command of `options`, printing to `out`.
pub fn run(options: &Options, out: &mut impl Write) -> Result<(), CliError> {
    match options.command {
        Command::Help => Ok(()),
        Command::Demo => {
            let mut main = demo_main()?;
            dump_main(&mut main, options.verbose, out)?;
            if let Some(path) = &options.output {
                let bytes = write_main(&main)?.to_bytes()?;
                std::fs::write(path, bytes).map_err(|source| CliError::Io {
                    path: path.clone(),
                    source,
                })?;
                writeln!(out, "saved {} IDs to {}", main.len(), path.display())?;
            }
            Ok(())
        }
        Command::Dump => {
            let mut main = load(input(options)?)?;
            dump_main(&mut main, options.verbose, out)
        }
        Command::Verify => {
            let mut main = load(input(options)?)?;
            let problems = verify_main(&mut main);
            for problem in &problems {
                writeln!(out, "{problem}")?;
            }
            if problems.is_empty() {
                writeln!(out, "{} IDs, no problems", main.len())?;
                Ok(())
            } else {
                Err(CliError::Invalid(problems.len()))
            }
        }
    }
}

fn input(options: &Options) -> Result<&Path, CliError> {
    options
        .input
        .as_deref()
        .ok_or_else(|| CliError::Usage("missing memfile path".to_owned()))
}

/// Read a memfile from disk into a new database of built-in types.
pub fn load(path: &Path) -> Result<Main, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Io {
        path: path.to_owned(),
        source,
    })?;
    load_bytes(&bytes)
}

pub fn load_bytes(bytes: &[u8]) -> Result<Main, CliError> {
    let memfile = MemFile::from_bytes(bytes)?;
    let mut main = builtin_main();
    read_main(&mut main, &memfile)?;
    tracing::debug!(ids = main.len(), "loaded memfile");
    Ok(main)
}
