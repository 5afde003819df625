use std::sync::Arc;

use loa_core::config::{AppConfig, LoadOptions};
use loa_discord::channels::{ChannelResolver, GuildChannelDirectory};
use loa_discord::http::DiscordHttpClient;
use secrecy::ExposeSecret;
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_token_shape(config.discord.token.expose_secret()));
            checks.extend(check_discord_channels(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["token_shape", "review_channel", "log_channel"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    // A missing optional channel is reported as skipped and does not fail the run.
    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if any_fail {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_token_shape(token: &str) -> DoctorCheck {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty()) {
        DoctorCheck {
            name: "token_shape",
            status: CheckStatus::Pass,
            details: "token has the three-segment bot token shape".to_string(),
        }
    } else {
        DoctorCheck {
            name: "token_shape",
            status: CheckStatus::Fail,
            details: "token does not look like a bot token (expected three dot-separated segments)"
                .to_string(),
        }
    }
}

fn check_discord_channels(config: &AppConfig) -> Vec<DoctorCheck> {
    let failed = |details: String| {
        vec![
            DoctorCheck { name: "review_channel", status: CheckStatus::Fail, details },
            DoctorCheck {
                name: "log_channel",
                status: CheckStatus::Skipped,
                details: "skipped because the Discord client did not start".to_string(),
            },
        ]
    };

    let client =
        match DiscordHttpClient::new(&config.discord.api_base_url, config.discord.token.clone()) {
            Ok(client) => client,
            Err(error) => return failed(format!("failed to build Discord client: {error}")),
        };
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return failed(format!("failed to initialize async runtime: {error}")),
    };

    let directory = GuildChannelDirectory::new(Arc::new(client));
    runtime.block_on(check_channels(
        &directory,
        &config.discord.guild_ids,
        &config.loa.review_channel,
        &config.loa.log_channel,
    ))
}

async fn check_channels(
    resolver: &dyn ChannelResolver,
    guild_ids: &[String],
    review_channel: &str,
    log_channel: &str,
) -> Vec<DoctorCheck> {
    let mut review_problems = Vec::new();
    let mut log_missing = Vec::new();
    let mut log_errors = Vec::new();

    for guild_id in guild_ids {
        match resolver.resolve(guild_id, review_channel).await {
            Ok(Some(_)) => {}
            Ok(None) => review_problems.push(format!("#{review_channel} missing in {guild_id}")),
            Err(error) => review_problems.push(format!("{guild_id}: {error}")),
        }
        match resolver.resolve(guild_id, log_channel).await {
            Ok(Some(_)) => {}
            Ok(None) => log_missing.push(guild_id.as_str()),
            Err(error) => log_errors.push(format!("{guild_id}: {error}")),
        }
    }

    let review = if review_problems.is_empty() {
        DoctorCheck {
            name: "review_channel",
            status: CheckStatus::Pass,
            details: format!("#{review_channel} found in {} guild(s)", guild_ids.len()),
        }
    } else {
        DoctorCheck {
            name: "review_channel",
            status: CheckStatus::Fail,
            details: review_problems.join("; "),
        }
    };

    let log = if !log_errors.is_empty() {
        DoctorCheck { name: "log_channel", status: CheckStatus::Fail, details: log_errors.join("; ") }
    } else if !log_missing.is_empty() {
        DoctorCheck {
            name: "log_channel",
            status: CheckStatus::Skipped,
            details: format!(
                "#{log_channel} missing in {}; submissions will not be mirrored there",
                log_missing.join(", ")
            ),
        }
    } else {
        DoctorCheck {
            name: "log_channel",
            status: CheckStatus::Pass,
            details: format!("#{log_channel} found in {} guild(s)", guild_ids.len()),
        }
    };

    vec![review, log]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
