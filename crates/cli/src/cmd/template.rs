use zimage_core::request::GenerationRequest;

use crate::cmd::load_template;
use crate::exit_codes;
use crate::output::{print_error, print_result};
use crate::{OutputArgs, TemplateArgs};

/// Print the template as submitted for `prompt`, or untouched without one.
pub async fn template_cmd(
    prompt: Option<&str>,
    seed: Option<u64>,
    template: TemplateArgs,
    output: OutputArgs,
) -> i32 {
    let template = match load_template(&template).await {
        Ok(template) => template,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let Some(prompt) = prompt else {
        print_result(output.format, output.quiet, &template.to_json());
        return exit_codes::SUCCESS;
    };

    let request = match GenerationRequest::new(prompt, seed) {
        Ok(request) => request,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let job = request.apply(&template);
    let report = job.report();
    tracing::info!(
        seed = request.seed(),
        nodes_before = report.nodes_before,
        nodes_after = report.nodes_after,
        removed = ?report.removed,
        "Sanitized template"
    );
    for dangling in &report.dangling {
        tracing::warn!(
            node = %dangling.node_id,
            input = %dangling.input,
            target = %dangling.target,
            "Input references a removed node"
        );
    }

    print_result(output.format, output.quiet, &job.to_json());
    exit_codes::SUCCESS
}
