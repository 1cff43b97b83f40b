use serde::{Deserialize, Serialize};
use sftrace_tooling::{Select, Surface, ToolingApi, UserRow, USER_SOBJECT};

use crate::error::TraceError;

/// Alias of the org's Automated Process user.
pub const AUTOMATED_PROCESS_ALIAS: &str = "autoproc";

/// Who a trace (or debug-mode toggle) applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TargetIdentity {
    /// The user the connection is authenticated as.
    #[default]
    CurrentCaller,
    /// A user named by username.
    Username(String),
    /// The Automated Process system user, looked up by alias.
    AutomatedProcess,
}

impl TargetIdentity {
    /// Build from CLI-style flags. The automation flag wins; an empty
    /// username falls back to the caller.
    pub fn from_flags(target_user: Option<&str>, automated_process: bool) -> Self {
        if automated_process {
            return Self::AutomatedProcess;
        }
        match target_user {
            Some(name) if !name.is_empty() => Self::Username(name.to_string()),
            _ => Self::CurrentCaller,
        }
    }

    /// The `User` field compared and the value it is compared against.
    pub fn lookup_key<'a>(&'a self, caller: &'a str) -> (&'static str, &'a str) {
        match self {
            Self::AutomatedProcess => ("Alias", AUTOMATED_PROCESS_ALIAS),
            Self::Username(name) => ("Username", name.as_str()),
            Self::CurrentCaller => ("Username", caller),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUser {
    pub id: String,
    /// The value the user was looked up by.
    pub username: String,
}

/// Look up the single `User` a target refers to.
///
/// Exactly one query is issued. When several rows match, the first wins.
pub async fn resolve_user(
    api: &dyn ToolingApi,
    target: &TargetIdentity,
) -> Result<ResolvedUser, TraceError> {
    let (field, value) = target.lookup_key(api.username());
    let query = Select::from(USER_SOBJECT).field("Id").where_eq(field, value)?;
    log::debug!("resolving user: {query}");

    let result = api.query(Surface::Data, &query).await?;
    match result.first_as::<UserRow>()? {
        Some(row) if !row.id.is_empty() => Ok(ResolvedUser {
            id: row.id,
            username: value.to_string(),
        }),
        _ => Err(TraceError::UserNotFound {
            identity: value.to_string(),
        }),
    }
}
