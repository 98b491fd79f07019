//! ID database CLI.

use idbc::{commands, init_tracing, CliError, Command, Options, USAGE};

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    if options.command == Command::Help {
        println!("{USAGE}");
        return;
    }

    let mut stdout = std::io::stdout().lock();
    match commands::run(&options, &mut stdout) {
        Ok(()) => {}
        Err(CliError::Invalid(count)) => {
            eprintln!("verification failed: {count} problem(s)");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
