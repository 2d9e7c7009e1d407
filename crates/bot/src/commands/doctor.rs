use chrono::Utc;
use dividy_core::config::{AppConfig, LoadOptions};
use dividy_discord::rest::DiscordRestClient;
use secrecy::ExposeSecret;
use serde::Serialize;

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
    generated_at: String,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
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
            checks.push(check_token_shape(&config));
            checks.push(check_api_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "bot_token_shape",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "api_reachability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, generated_at: Utc::now().to_rfc3339(), summary, checks }
}

fn check_token_shape(config: &AppConfig) -> DoctorCheck {
    let token = config.discord.bot_token.expose_secret();
    let segments: Vec<&str> = token.split('.').collect();
    let well_formed = segments.len() == 3 && segments.iter().all(|segment| !segment.is_empty());

    if well_formed {
        DoctorCheck {
            name: "bot_token_shape",
            status: CheckStatus::Pass,
            details: "token has the expected three dot-separated segments".to_string(),
        }
    } else {
        DoctorCheck {
            name: "bot_token_shape",
            status: CheckStatus::Fail,
            details: "bot tokens issued by the Developer Portal have three dot-separated segments"
                .to_string(),
        }
    }
}

fn check_api_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "api_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let client = DiscordRestClient::from_config(&config.discord);
    let result = runtime.block_on(async { client.fetch_gateway_info().await });

    match result {
        Ok(info) => DoctorCheck {
            name: "api_reachability",
            status: CheckStatus::Pass,
            details: format!(
                "`{}` reachable; recommended shards: {}",
                config.discord.api_base_url, info.shards
            ),
        },
        Err(error) => DoctorCheck {
            name: "api_reachability",
            status: CheckStatus::Fail,
            details: format!("failed to reach the Discord API: {error}"),
        },
    }
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
