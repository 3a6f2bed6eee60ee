use std::io::Write;

use clap::ValueEnum;
use cmdmux_client::CommandResult;
use serde::Serialize;

use crate::exit::{io_error, CliResult};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Relay the worker's stdout/stderr bytes verbatim.
    Raw,
    /// One JSON object with status and lossily-decoded streams.
    Json,
    /// Human-oriented summary with labelled sections.
    Pretty,
}

#[derive(Serialize)]
struct ResultOutput<'a> {
    status: i32,
    stdout: &'a str,
    stderr: &'a str,
}

pub fn print_result(result: &CommandResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Raw => {
            let mut out = std::io::stdout().lock();
            out.write_all(&result.stdout)
                .and_then(|()| out.flush())
                .map_err(|e| io_error("failed writing stdout", e))?;
            let mut err = std::io::stderr().lock();
            err.write_all(&result.stderr)
                .and_then(|()| err.flush())
                .map_err(|e| io_error("failed writing stderr", e))?;
        }
        OutputFormat::Json => {
            let stdout = String::from_utf8_lossy(&result.stdout);
            let stderr = String::from_utf8_lossy(&result.stderr);
            let out = ResultOutput {
                status: result.status,
                stdout: &stdout,
                stderr: &stderr,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Pretty => {
            println!("status: {}", result.status);
            println!("stdout ({} bytes):", result.stdout.len());
            println!("{}", String::from_utf8_lossy(&result.stdout));
            println!("stderr ({} bytes):", result.stderr.len());
            println!("{}", String::from_utf8_lossy(&result.stderr));
        }
    }
    Ok(())
}
