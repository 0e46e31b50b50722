//! Native engine artifact entry point.
//!
//! `mdx-hybrid-native --probe` prints the handshake. Without arguments a single
//! request is read from stdin and the response written to stdout. Stdout only
//! ever carries protocol JSON; diagnostics go to stderr.

use mdx_hybrid_core::wire::{NativeRequest, PROBE_FLAG};
use mdx_hybrid_native::{compile_request, probe};
use std::io::{self, Read, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => respond(),
        Some(PROBE_FLAG) => emit(&probe()),
        Some(other) => {
            eprintln!("mdx-hybrid-native: unknown argument `{}`", other);
            ExitCode::from(2)
        }
    }
}

fn respond() -> ExitCode {
    let mut input = Vec::new();
    if let Err(err) = io::stdin().read_to_end(&mut input) {
        eprintln!("mdx-hybrid-native: failed to read request: {}", err);
        return ExitCode::FAILURE;
    }

    let request: NativeRequest = match serde_json::from_slice(&input) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("mdx-hybrid-native: malformed request: {}", err);
            return ExitCode::FAILURE;
        }
    };

    emit(&compile_request(&request))
}

fn emit(value: &impl serde::Serialize) -> ExitCode {
    let mut stdout = io::stdout().lock();
    let written = serde_json::to_writer(&mut stdout, value)
        .map_err(io::Error::from)
        .and_then(|()| stdout.flush());
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mdx-hybrid-native: failed to write response: {}", err);
            ExitCode::FAILURE
        }
    }
}
