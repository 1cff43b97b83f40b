use anyhow::{anyhow, Result};
use serde_json::json;
use sftrace_engine::{ProvisionPolicy, TargetIdentity, TraceError, TraceReport, TraceRequest};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::{RuntimeContext, TraceArgs};

pub fn trace_request(args: &TraceArgs) -> TraceRequest {
    TraceRequest {
        target: TargetIdentity::from_flags(args.target_user.as_deref(), args.is_autoproc_trace),
        debug_level_name: args.debug_level_name.clone(),
        duration: args.trace_duration.clone(),
        provision: if args.no_provision {
            ProvisionPolicy::RequireExisting
        } else {
            ProvisionPolicy::AutoProvision
        },
    }
}

pub async fn run_trace(ctx: &RuntimeContext, args: &TraceArgs) -> Result<()> {
    let request = trace_request(args);
    let report = ctx
        .engine
        .trace(&request)
        .await
        .map_err(|err| explain(&ctx.org_alias, err))?;

    let rows = report_rows(&ctx.org_alias, &report)?;
    ctx.output.emit_report(
        &json!({ "org": ctx.org_alias, "trace": report }),
        "trace flag",
        &rows,
    )
}

pub fn report_rows(org: &str, report: &TraceReport) -> Result<Vec<(&'static str, String)>> {
    let level = report.debug_level.level();
    let session = report.outcome.session();
    Ok(vec![
        ("org", org.to_string()),
        ("user", report.user.username.clone()),
        ("user id", report.user.id.clone()),
        ("debug level", level.developer_name.clone()),
        (
            "debug level id",
            format!(
                "{} ({})",
                level.id,
                if report.debug_level.was_created() { "created" } else { "existing" }
            ),
        ),
        (
            "trace flag",
            format!(
                "{} ({})",
                session.id,
                if report.outcome.was_created() { "created" } else { "extended" }
            ),
        ),
        ("start", display_instant(session.start)?),
        ("expiration", display_instant(session.expiration)?),
    ])
}

fn display_instant(instant: OffsetDateTime) -> Result<String> {
    Ok(instant.format(&Rfc3339)?)
}

/// Add a hint to errors that mean the stored token is no longer usable.
pub fn explain(org: &str, err: TraceError) -> anyhow::Error {
    match &err {
        TraceError::Remote(api) if api.is_auth_failure() => anyhow!(
            "{err}\nThe access token for org \"{org}\" was rejected; refresh it and try again."
        ),
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftrace_engine::{DebugLevel, DebugLevelResolution, ResolvedUser, TraceSession, UpsertOutcome};
    use sftrace_tooling::ApiError;
    use time::macros::datetime;

    fn args() -> TraceArgs {
        TraceArgs {
            target_org: None,
            target_user: None,
            debug_level_name: "SFDC_DevConsole".into(),
            is_autoproc_trace: false,
            trace_duration: "1hr".into(),
            no_provision: false,
        }
    }

    #[test]
    fn flags_map_onto_a_request() {
        let request = trace_request(&TraceArgs {
            is_autoproc_trace: true,
            no_provision: true,
            trace_duration: "15m".into(),
            ..args()
        });
        assert_eq!(request.target, TargetIdentity::AutomatedProcess);
        assert_eq!(request.provision, ProvisionPolicy::RequireExisting);
        assert_eq!(request.duration, "15m");

        let request = trace_request(&TraceArgs {
            target_user: Some("other@example.com".into()),
            ..args()
        });
        assert_eq!(
            request.target,
            TargetIdentity::Username("other@example.com".into())
        );
        assert_eq!(request.provision, ProvisionPolicy::AutoProvision);
    }

    #[test]
    fn rows_describe_the_outcome() {
        let report = TraceReport {
            user: ResolvedUser {
                id: "005".into(),
                username: "dev@example.com".into(),
            },
            debug_level: DebugLevelResolution::Created(DebugLevel {
                id: "7dl".into(),
                developer_name: "SFDC_DevConsole".into(),
                apex_code: Some("FINE".into()),
                master_label: None,
            }),
            outcome: UpsertOutcome::Extended(TraceSession {
                id: "7tf".into(),
                traced_entity_id: "005".into(),
                debug_level_id: "7dl".into(),
                start: datetime!(2024-03-01 12:00 UTC),
                expiration: datetime!(2024-03-01 13:00 UTC),
                log_type: "USER_DEBUG".into(),
            }),
        };

        let rows = report_rows("dev", &report).expect("rows");
        assert!(rows.contains(&("debug level id", "7dl (created)".to_string())));
        assert!(rows.contains(&("trace flag", "7tf (extended)".to_string())));
        assert!(rows.contains(&("expiration", "2024-03-01T13:00:00Z".to_string())));
    }

    #[test]
    fn auth_failures_get_a_hint() {
        let err = explain(
            "dev",
            TraceError::Remote(ApiError::Status {
                status: 401,
                message: "unauthorized".into(),
            }),
        );
        assert!(err.to_string().contains("refresh it"));

        let err = explain(
            "dev",
            TraceError::InvalidDuration {
                expression: "xyz".into(),
            },
        );
        assert_eq!(err.to_string(), "Invalid duration \"xyz\" supplied");
    }
}
