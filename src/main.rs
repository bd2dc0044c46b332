//! CLI entry point for the code sandbox (csbx).

use std::io::{Read, Write};
use std::process::ExitCode;

use anyhow::Context;

use code_sandbox::cli::{Cli, Commands};
use code_sandbox::manager::{ExecutionRequest, Sandbox};
use code_sandbox::utils::init_debug_logging;
use code_sandbox::verdict::ExecutionResult;

/// Exit status for usage errors, shared with policy rejections.
const USAGE_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_debug_logging(cli.debug);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let sandbox = Sandbox::from_settings(cli.settings.as_deref());

    if let Some(profile) = cli.profile() {
        if let Err(e) = sandbox.ensure_profile(profile) {
            eprintln!("{}", e);
            return Ok(ExitCode::from(USAGE_EXIT));
        }
    }

    let check = sandbox.check_dependencies();
    for warning in &check.warnings {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Commands::RunFile { path, profile } => {
            let result = sandbox
                .run_file(&path, profile.as_deref())
                .await
                .context("failed to prepare the run")?;
            Ok(report(&result))
        }
        Commands::RunStdin {
            profile,
            prompt,
            json,
        } => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read code from stdin")?;

            let request = ExecutionRequest::snippet(source)
                .with_profile(profile.as_deref())
                .with_prompt(prompt.as_deref());
            let result = sandbox
                .run(request)
                .await
                .context("failed to prepare the run")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(exit_code(result.return_code))
            } else {
                Ok(report(&result))
            }
        }
        Commands::Env { profile } => {
            let environment = sandbox.detect_environment();
            let selected = sandbox.resolve_profile(profile.as_deref(), None);
            let out = serde_json::json!({
                "env": environment,
                "profile": &*selected,
                "profiles": sandbox.profile_names(),
                "dependencies": check,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Echo the script's streams and mirror its return code.
fn report(result: &ExecutionResult) -> ExitCode {
    print_stream(&mut std::io::stdout(), &result.stdout);
    print_stream(&mut std::io::stderr(), &result.stderr);
    if let Some(hint) = &result.hint {
        tracing::info!("Hint: {}", hint);
    }
    exit_code(result.return_code)
}

fn print_stream<W: Write>(out: &mut W, text: &str) {
    if text.is_empty() {
        return;
    }
    let _ = out.write_all(text.as_bytes());
    if !text.ends_with('\n') {
        let _ = out.write_all(b"\n");
    }
    let _ = out.flush();
}

fn exit_code(return_code: i32) -> ExitCode {
    ExitCode::from(return_code.clamp(0, 255) as u8)
}
