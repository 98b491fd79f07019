//! Command-line driver for the ID database.
//!
//! `idb demo` builds a small scene from the built-in types, `idb dump` prints
//! the content of a memfile and `idb verify` checks a memfile's user counts,
//! references and names.

use std::path::PathBuf;
use std::sync::Once;

use idb_lib::IdError;

pub mod commands;

/// Errors reported by the driver.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("cannot access `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Id(#[from] IdError),

    /// Verification found this many problems.
    #[error("{0} problem(s) found")]
    Invalid(usize),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Command {
    #[default]
    Help,
    Demo,
    Dump,
    Verify,
}

impl Command {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "help" | "--help" | "-h" => Some(Self::Help),
            "demo" => Some(Self::Demo),
            "dump" => Some(Self::Dump),
            "verify" => Some(Self::Verify),
            _ => None,
        }
    }
}

/// Parsed command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub command: Command,
    /// Memfile to read (`dump`, `verify`).
    pub input: Option<PathBuf>,
    /// Memfile to write (`demo -o`).
    pub output: Option<PathBuf>,
    /// Also list the references of each ID.
    pub verbose: bool,
}

impl Options {
    /// Parse the arguments following the program name.
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut options = Options::default();
        let Some((command, rest)) = args.split_first() else {
            return Ok(options);
        };
        options.command =
            Command::parse(command).ok_or_else(|| CliError::Usage(format!("unknown command `{command}`")))?;

        let mut i = 0;
        while i < rest.len() {
            let arg = &rest[i];
            if arg == "-o" || arg == "--output" {
                let path = rest
                    .get(i + 1)
                    .ok_or_else(|| CliError::Usage(format!("`{arg}` needs a path")))?;
                options.output = Some(PathBuf::from(path));
                i += 2;
                continue;
            }
            if let Some(path) = arg.strip_prefix("--output=") {
                options.output = Some(PathBuf::from(path));
            } else if arg == "-v" || arg == "--verbose" {
                options.verbose = true;
            } else if arg.starts_with('-') {
                return Err(CliError::Usage(format!("unknown option `{arg}`")));
            } else if options.input.is_none() {
                options.input = Some(PathBuf::from(arg));
            } else {
                return Err(CliError::Usage(format!("unexpected argument `{arg}`")));
            }
            i += 1;
        }

        if matches!(options.command, Command::Dump | Command::Verify) && options.input.is_none() {
            return Err(CliError::Usage("missing memfile path".to_owned()));
        }
        Ok(options)
    }
}

pub const USAGE: &str = "\
Usage: idb <command> [options]

Commands:
  demo [-o <file>]       Build a demo database, optionally save it
  dump <file> [-v]       List the IDs of a memfile
  verify <file>          Check user counts, references and names
  help                   Show this message

Logging: set RUST_LOG (e.g. RUST_LOG=idb_lib=debug), IDB_LOG_TREE=1 for
hierarchical output.";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        let tree = std::env::var("IDB_LOG_TREE").is_ok_and(|value| value == "1");
        let tree_layer = tree.then(|| {
            tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_writer(std::io::stderr)
        });
        let fmt_layer = (!tree).then(|| {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr)
        });
        tracing_subscriber::registry()
            .with(filter)
            .with(tree_layer)
            .with(fmt_layer)
            .init();
    });
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
