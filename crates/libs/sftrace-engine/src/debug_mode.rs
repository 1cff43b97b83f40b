use serde::{Deserialize, Serialize};
use serde_json::Value;
use sftrace_tooling::{
    decode_record, ApiError, Record, Select, Surface, ToolingApi, UserRow, USER_SOBJECT,
};

use crate::error::TraceError;
use crate::user::{ResolvedUser, TargetIdentity};

const DEBUG_MODE_FIELD: &str = "UserPreferencesUserDebugModePref";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugModeChange {
    pub user: ResolvedUser,
    /// Value written back.
    pub enabled: bool,
}

/// Flip the Lightning debug-mode preference for `target_user`, or for the
/// caller when no user is named.
pub async fn toggle_debug_mode(
    api: &dyn ToolingApi,
    target_user: Option<&str>,
) -> Result<DebugModeChange, TraceError> {
    let target = TargetIdentity::from_flags(target_user, false);
    let (field, value) = target.lookup_key(api.username());
    let query = Select::from(USER_SOBJECT)
        .fields(["Id", DEBUG_MODE_FIELD])
        .where_eq(field, value)?;

    let record = match api.single_record_query(Surface::Data, &query).await {
        Ok(record) => record,
        Err(ApiError::UnexpectedRowCount { found: 0, .. }) => {
            return Err(TraceError::UserNotFound {
                identity: value.to_string(),
            })
        }
        Err(err) => return Err(err.into()),
    };
    let row: UserRow = decode_record(&record)?;
    let enabled = !row.user_preferences_user_debug_mode_pref.unwrap_or(false);

    log::info!("toggling Lightning Debug Mode to {enabled} for {value}");
    let mut fields = Record::new();
    fields.insert(DEBUG_MODE_FIELD.into(), Value::Bool(enabled));
    api.update(Surface::Data, USER_SOBJECT, &row.id, fields).await?;

    Ok(DebugModeChange {
        user: ResolvedUser {
            id: row.id,
            username: value.to_string(),
        },
        enabled,
    })
}
