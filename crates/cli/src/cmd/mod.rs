pub mod generate;
pub mod health;
pub mod template;

use std::time::Duration;

use zimage_comfyui::config::ClientConfig;
use zimage_core::template::{default_template, JobTemplate};

use crate::{PollArgs, RelayArgs, TemplateArgs};

/// Client configuration from the environment, overridden by flags.
pub fn client_config(relay: &RelayArgs, poll: Option<&PollArgs>) -> Result<ClientConfig, String> {
    let mut config = ClientConfig::from_env().map_err(|e| e.to_string())?;

    if let Some(url) = relay.relay.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        config.relay_url = url.to_string();
    }
    if let Some(poll) = poll {
        if let Some(ms) = poll.poll_interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = poll.max_attempts {
            config.poll.max_attempts = attempts;
        }
    }
    Ok(config)
}

/// The template named on the command line, or the built-in one.
pub async fn load_template(args: &TemplateArgs) -> Result<JobTemplate, String> {
    match &args.template_path {
        None => Ok(default_template().clone()),
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("failed to read template {}: {e}", path.display()))?;
            JobTemplate::from_json_str(&text)
                .map_err(|e| format!("template {}: {e}", path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_poll_policy() {
        let relay = RelayArgs {
            relay: Some("http://relay.local/".into()),
        };
        let poll = PollArgs {
            poll_interval_ms: Some(5),
            max_attempts: Some(3),
        };
        let config = client_config(&relay, Some(&poll)).unwrap();
        assert_eq!(config.relay_url, "http://relay.local/");
        assert_eq!(config.poll.interval, Duration::from_millis(5));
        assert_eq!(config.poll.max_attempts, 3);
    }

    #[tokio::test]
    async fn builtin_template_when_no_path() {
        let template = load_template(&TemplateArgs { template_path: None })
            .await
            .unwrap();
        assert!(template.contains("34"));
    }

    #[tokio::test]
    async fn missing_template_file_is_reported() {
        let args = TemplateArgs {
            template_path: Some("/definitely/not/here.json".into()),
        };
        let err = load_template(&args).await.unwrap_err();
        assert!(err.contains("failed to read template"));
    }
}
