use serde::{Deserialize, Serialize};
use serde_json::Value;
use sftrace_tooling::{
    Record, Select, Surface, ToolingApi, TraceFlagRow, TRACE_FLAG_SOBJECT,
};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::debug_level::DebugLevel;
use crate::duration::TraceDuration;
use crate::error::TraceError;
use crate::user::ResolvedUser;

/// Log type tagging the trace flags this tool manages.
pub const TRACE_LOG_TYPE: &str = "USER_DEBUG";

const API_DATETIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// A trace flag as last written by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSession {
    pub id: String,
    pub traced_entity_id: String,
    pub debug_level_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expiration: OffsetDateTime,
    pub log_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "session", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created(TraceSession),
    Extended(TraceSession),
}

impl UpsertOutcome {
    pub fn session(&self) -> &TraceSession {
        match self {
            Self::Created(session) | Self::Extended(session) => session,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// The most recently created trace flag of ours for `user_id`, if any.
pub async fn find_latest_session(
    api: &dyn ToolingApi,
    user_id: &str,
) -> Result<Option<TraceFlagRow>, TraceError> {
    let query = Select::from(TRACE_FLAG_SOBJECT)
        .fields(["Id", "DebugLevelId"])
        .where_eq("LogType", TRACE_LOG_TYPE)?
        .where_eq("TracedEntityId", user_id)?
        .order_by_desc("CreatedDate")
        .limit(1);
    log::debug!("looking up existing trace flag: {query}");

    let result = api.query(Surface::Tooling, &query).await?;
    Ok(result.first_as::<TraceFlagRow>()?.filter(|row| !row.id.is_empty()))
}

/// Extend the user's latest trace flag, or create one when none exists.
///
/// Issues one read and one write. The read and the write are not atomic with
/// respect to other clients of the org.
pub async fn upsert_session(
    api: &dyn ToolingApi,
    user: &ResolvedUser,
    level: &DebugLevel,
    duration: &TraceDuration,
    now: &(dyn Fn() -> OffsetDateTime + Send + Sync),
) -> Result<UpsertOutcome, TraceError> {
    let existing = find_latest_session(api, &user.id).await?;

    let start = now();
    let expiration = duration.expiration_from(start);

    let mut fields = Record::new();
    fields.insert("StartDate".into(), Value::String(api_timestamp("StartDate", start)?));
    fields.insert(
        "ExpirationDate".into(),
        Value::String(api_timestamp("ExpirationDate", expiration)?),
    );

    match existing {
        Some(flag) => {
            // Renewal keeps whatever verbosity the flag already had.
            let debug_level_id = flag
                .debug_level_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| level.id.clone());
            fields.insert("DebugLevelId".into(), Value::String(debug_level_id.clone()));

            log::info!(
                "updating TraceFlag {} for {}, expires: {expiration}",
                flag.id,
                user.username
            );
            api.update(Surface::Tooling, TRACE_FLAG_SOBJECT, &flag.id, fields)
                .await?;

            Ok(UpsertOutcome::Extended(TraceSession {
                id: flag.id,
                traced_entity_id: user.id.clone(),
                debug_level_id,
                start,
                expiration,
                log_type: TRACE_LOG_TYPE.to_string(),
            }))
        }
        None => {
            fields.insert("DebugLevelId".into(), Value::String(level.id.clone()));
            fields.insert("LogType".into(), Value::String(TRACE_LOG_TYPE.to_string()));
            fields.insert("TracedEntityId".into(), Value::String(user.id.clone()));

            log::info!(
                "no matching TraceFlag for {}, creating one with debug level {}, expires: {expiration}",
                user.username,
                level.developer_name
            );
            let saved = api
                .create(Surface::Tooling, TRACE_FLAG_SOBJECT, fields)
                .await?;

            Ok(UpsertOutcome::Created(TraceSession {
                id: saved.id,
                traced_entity_id: user.id.clone(),
                debug_level_id: level.id.clone(),
                start,
                expiration,
                log_type: TRACE_LOG_TYPE.to_string(),
            }))
        }
    }
}

/// Format an instant the way the REST API expects datetime fields.
pub fn api_timestamp(field: &str, instant: OffsetDateTime) -> Result<String, TraceError> {
    instant
        .to_offset(UtcOffset::UTC)
        .format(API_DATETIME)
        .map_err(|err| TraceError::Timestamp {
            field: field.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_are_utc_with_millisecond_precision() {
        let instant = datetime!(2024-03-01 14:30:15.123456789 +02:00);
        assert_eq!(
            api_timestamp("StartDate", instant).expect("format"),
            "2024-03-01T12:30:15.123Z"
        );
    }

    #[test]
    fn timestamp_errors_name_the_field_not_a_response() {
        let err = TraceError::Timestamp {
            field: "ExpirationDate".into(),
            message: "invalid component".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to format ExpirationDate timestamp: invalid component"
        );
        assert!(!matches!(err, TraceError::Remote(_)));
    }

    #[test]
    fn outcome_serializes_with_action_tag() {
        let session = TraceSession {
            id: "7tf".into(),
            traced_entity_id: "005".into(),
            debug_level_id: "7dl".into(),
            start: datetime!(2024-03-01 12:00:00 UTC),
            expiration: datetime!(2024-03-01 13:00:00 UTC),
            log_type: TRACE_LOG_TYPE.into(),
        };
        let json = serde_json::to_value(UpsertOutcome::Extended(session)).expect("serialize");
        assert_eq!(json["action"], "extended");
        assert_eq!(json["session"]["id"], "7tf");
        assert_eq!(json["session"]["expiration"], "2024-03-01T13:00:00Z");
    }
}
