//! `json-knot`: apply, compose, rebase, and invert serialized operations.
//!
//! Usage:
//!   json-knot apply '<op>'               (document on stdin)
//!   json-knot compose '<a>' '<b>'
//!   json-knot rebase '<a>' '<b>' [--conflictless] [--document '<json>']
//!   json-knot inverse '<op>'             (document on stdin)
//!
//! A strict rebase conflict prints `null` and exits with status 2.

use std::io::{self, Read, Write};
use std::process;

use json_knot::cli::{self, CliError, RebaseArgs};

const USAGE: &str = "usage: json-knot <apply|compose|rebase|inverse> <op> [<op>] [flags]";

fn read_stdin() -> Result<String, CliError> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| CliError::Usage(e.to_string()))?;
    Ok(buf.trim().to_string())
}

fn arg(args: &[String], i: usize) -> Result<&str, CliError> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| CliError::Usage(USAGE.into()))
}

fn run(args: &[String]) -> Result<Option<String>, CliError> {
    match arg(args, 1)? {
        "apply" => cli::apply(arg(args, 2)?, &read_stdin()?).map(Some),
        "compose" => cli::compose(arg(args, 2)?, arg(args, 3)?).map(Some),
        "rebase" => {
            let flags = RebaseArgs::parse(args.get(4..).unwrap_or_default())?;
            cli::rebase(arg(args, 2)?, arg(args, 3)?, &flags)
        }
        "inverse" => cli::inverse(arg(args, 2)?, &read_stdin()?).map(Some),
        _ => Err(CliError::Usage(USAGE.into())),
    }
}

fn main() {
    cli::init_logging();
    let args: Vec<String> = std::env::args().collect();

    let (out, code) = match run(&args) {
        Ok(Some(out)) => (out, 0),
        Ok(None) => ("null".to_string(), 2),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };
    let mut stdout = io::stdout();
    if writeln!(stdout, "{out}").is_err() {
        process::exit(1);
    }
    process::exit(code);
}
