use serde::Serialize;
use zimage_comfyui::log::JobLog;

use crate::cmd::client_config;
use crate::exit_codes;
use crate::output::{print_error, print_result};
use crate::{OutputArgs, RelayArgs};

#[derive(Serialize)]
struct HealthResult {
    relay: String,
    reachable: bool,
}

pub async fn health_cmd(relay: RelayArgs, output: OutputArgs) -> i32 {
    let config = match client_config(&relay, None) {
        Ok(config) => config,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let api = match config.build_api(JobLog::default()) {
        Ok(api) => api,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let reachable = api.check_reachability().await;
    tracing::info!(relay = %config.relay_url, reachable, "Relay health checked");

    print_result(
        output.format,
        output.quiet,
        &HealthResult {
            relay: config.relay_url,
            reachable,
        },
    );

    if reachable {
        exit_codes::SUCCESS
    } else {
        exit_codes::UNREACHABLE
    }
}
