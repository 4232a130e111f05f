use std::fmt::Write;

use orchestrator::runner::{EnvironmentReport, OperationSummary};
use orchestrator::{ProvisionOutcome, RunSummary};

/// One block per environment, in run order.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for report in &summary.reports {
        render_report(&mut out, report);
    }
    out
}

fn label(report: &EnvironmentReport) -> String {
    match &report.environment {
        Some(env) => format!("{} [{env}]", report.service),
        None => report.service.clone(),
    }
}

fn render_report(out: &mut String, report: &EnvironmentReport) {
    let label = label(report);
    let summary = match &report.result {
        Ok(summary) => summary,
        Err(error) => {
            let _ = writeln!(out, "{label}: failed: {error}");
            return;
        }
    };
    match summary {
        OperationSummary::Deployed { uri, load_balancer } => {
            let _ = writeln!(out, "{label}: serving at {uri}");
            match load_balancer {
                Some(ProvisionOutcome::Created { address, names }) => {
                    let _ = writeln!(
                        out,
                        "  load balancer {} listening on http://{address}",
                        names.forwarding_rule
                    );
                }
                Some(ProvisionOutcome::Attached {
                    forwarding_rule,
                    url_map,
                    names,
                }) => {
                    let _ = writeln!(
                        out,
                        "  backend {} attached to {forwarding_rule} (url map {url_map})",
                        names.backend
                    );
                }
                None => {}
            }
        }
        OperationSummary::RolledBack { revision } => {
            let _ = writeln!(out, "{label}: all traffic on {revision}");
        }
        OperationSummary::Destroyed { teardown } => {
            let _ = writeln!(out, "{label}: deleted");
            if let Some(report) = teardown {
                let _ = writeln!(
                    out,
                    "  removed {} load balancer resources",
                    report.removed.len()
                );
                for warning in &report.warnings {
                    let _ = writeln!(
                        out,
                        "  warning: {} {} left in place: {}",
                        warning.step, warning.resource, warning.error
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::TeardownReport;
    use orchestrator::load_balancer::TeardownWarning;

    fn report(
        environment: Option<&str>,
        result: Result<OperationSummary, String>,
    ) -> EnvironmentReport {
        EnvironmentReport {
            environment: environment.map(str::to_string),
            service: match environment {
                Some(env) => format!("api-{env}"),
                None => "api".into(),
            },
            result,
        }
    }

    #[test]
    fn renders_each_environment() {
        let summary = RunSummary {
            reports: vec![
                report(
                    Some("dev"),
                    Ok(OperationSummary::Deployed {
                        uri: "https://api-dev.run.app".into(),
                        load_balancer: None,
                    }),
                ),
                report(Some("prod"), Err("deployment of api-prod failed: boom".into())),
            ],
        };
        assert_eq!(
            render_summary(&summary),
            "api-dev [dev]: serving at https://api-dev.run.app\n\
             api-prod [prod]: failed: deployment of api-prod failed: boom\n"
        );
    }

    #[test]
    fn renders_teardown_warnings() {
        let summary = RunSummary {
            reports: vec![report(
                None,
                Ok(OperationSummary::Destroyed {
                    teardown: Some(TeardownReport {
                        removed: vec!["a".into(), "b".into()],
                        warnings: vec![TeardownWarning {
                            step: "delete network endpoint group",
                            resource: "api-neg".into(),
                            error: "in use".into(),
                        }],
                    }),
                }),
            )],
        };
        let rendered = render_summary(&summary);
        assert!(rendered.starts_with("api: deleted\n"), "{rendered}");
        assert!(rendered.contains("removed 2 load balancer resources"));
        assert!(rendered.contains("warning: delete network endpoint group api-neg left in place: in use"));
    }

    #[test]
    fn renders_rollback() {
        let summary = RunSummary {
            reports: vec![report(
                None,
                Ok(OperationSummary::RolledBack {
                    revision: "api-00002".into(),
                }),
            )],
        };
        assert_eq!(render_summary(&summary), "api: all traffic on api-00002\n");
    }
}
