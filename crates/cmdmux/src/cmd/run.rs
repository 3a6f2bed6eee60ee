use cmdmux_client::Session;

use crate::cmd::RunArgs;
use crate::exit::{client_error, CliResult};
use crate::output::{print_result, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut session = Session::new(&args.workspace);
    let result = session
        .execute_command(&args.argv)
        .map_err(|err| client_error("command failed", err))?;

    print_result(&result, format)?;
    Ok(exit_code_for_status(result.status))
}

/// Map the worker's status onto a process exit code. Statuses wider than
/// a byte are clamped; negative statuses follow the shell convention for
/// signal deaths (128 + N).
fn exit_code_for_status(status: i32) -> i32 {
    if status >= 0 {
        status.min(255)
    } else {
        128 + status.saturating_neg().min(126)
    }
}
