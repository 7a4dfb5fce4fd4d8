use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use zimage_comfyui::error::JobError;
use zimage_comfyui::job::{GenerationOutcome, JobRunner};
use zimage_comfyui::log::{JobLog, MemorySink};
use zimage_core::request::GenerationRequest;

use crate::cmd::{client_config, load_template};
use crate::exit_codes;
use crate::output::{print_error, print_result, print_trail};
use crate::{OutputArgs, PollArgs, RelayArgs, TemplateArgs};

#[derive(Serialize)]
struct GenerateResult {
    prompt_id: String,
    seed: u64,
    file: String,
    bytes: usize,
    content_type: String,
    elapsed_secs: f64,
    removed_nodes: Vec<String>,
}

pub async fn generate_cmd(
    prompt: &str,
    seed: Option<u64>,
    out: Option<PathBuf>,
    relay: RelayArgs,
    poll: PollArgs,
    template: TemplateArgs,
    output: OutputArgs,
) -> i32 {
    let request = match GenerationRequest::new(prompt, seed) {
        Ok(request) => request,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let config = match client_config(&relay, Some(&poll)) {
        Ok(config) => config,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let template = match load_template(&template).await {
        Ok(template) => template,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let sink = Arc::new(MemorySink::new());
    let api = match config.build_api(JobLog::new(Some(sink.clone()))) {
        Ok(api) => api,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    // Ctrl-C abandons the job at whatever step it is in, then prints the trail.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    tracing::info!(relay = %config.relay_url, seed = request.seed(), "Starting generation");

    let mut runner = JobRunner::new(api)
        .with_policy(config.poll)
        .with_template(template)
        .with_cancellation(cancel.clone());

    let outcome = match run_until_cancelled(&mut runner, &request, &cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            print_trail(output.format, output.quiet, &sink.lines());
            return exit_code_for(&e);
        }
    };

    let path = out.unwrap_or_else(|| PathBuf::from(outcome.artifact_ref.suggested_file_name()));
    if let Err(e) = tokio::fs::write(&path, &outcome.artifact.bytes).await {
        print_error(
            output.format,
            output.quiet,
            &format!("failed to write {}: {e}", path.display()),
        );
        return exit_codes::RUNTIME_ERROR;
    }

    print_result(output.format, output.quiet, &summarize(&outcome, &path));
    exit_codes::SUCCESS
}

/// Run the job, abandoning it as soon as `cancel` fires.
///
/// The runner only watches the token between poll attempts; this also cuts
/// short an in-flight submission or download.
async fn run_until_cancelled(
    runner: &mut JobRunner,
    request: &GenerationRequest,
    cancel: &CancellationToken,
) -> Result<GenerationOutcome, JobError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            tracing::warn!("Generation interrupted");
            Err(JobError::Cancelled)
        }
        result = runner.run(request) => result,
    }
}

fn summarize(outcome: &GenerationOutcome, path: &std::path::Path) -> GenerateResult {
    GenerateResult {
        prompt_id: outcome.prompt_id.to_string(),
        seed: outcome.seed,
        file: path.display().to_string(),
        bytes: outcome.artifact.len(),
        content_type: outcome.artifact.content_type.clone(),
        elapsed_secs: outcome.elapsed.as_secs_f64(),
        removed_nodes: outcome.report.removed.clone(),
    }
}

fn exit_code_for(err: &JobError) -> i32 {
    match err {
        JobError::Core(_) => exit_codes::VALIDATION_FAILED,
        JobError::InvalidState { .. } => exit_codes::RUNTIME_ERROR,
        _ => exit_codes::JOB_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use zimage_comfyui::api::RelayApi;
    use zimage_core::error::CoreError;

    #[test]
    fn job_failures_map_to_job_failed() {
        assert_eq!(
            exit_code_for(&JobError::SubmissionFailed("x".into())),
            exit_codes::JOB_FAILED
        );
        assert_eq!(exit_code_for(&JobError::Cancelled), exit_codes::JOB_FAILED);
        assert_eq!(
            exit_code_for(&JobError::Core(CoreError::Validation("x".into()))),
            exit_codes::VALIDATION_FAILED
        );
    }

    #[tokio::test]
    async fn cancellation_interrupts_stalled_submission() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let cancel = CancellationToken::new();
        let mut runner = JobRunner::new(RelayApi::new(format!("http://{addr}")))
            .with_cancellation(cancel.clone());
        let request = GenerationRequest::new("a red fox", Some(42)).unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_until_cancelled(&mut runner, &request, &cancel),
        )
        .await
        .expect("cancellation did not interrupt the submission");
        assert!(matches!(result, Err(JobError::Cancelled)));
        assert_eq!(exit_code_for(&JobError::Cancelled), exit_codes::JOB_FAILED);
    }

    #[tokio::test]
    async fn blank_prompt_is_validation_failure() {
        let code = generate_cmd(
            "   ",
            None,
            None,
            RelayArgs { relay: None },
            PollArgs {
                poll_interval_ms: None,
                max_attempts: None,
            },
            TemplateArgs {
                template_path: None,
            },
            OutputArgs {
                format: crate::output::OutputFormat::Text,
                quiet: true,
            },
        )
        .await;
        assert_eq!(code, exit_codes::VALIDATION_FAILED);
    }
}
