use serde::{Deserialize, Serialize};
use sftrace_tooling::{
    encode_record, DebugLevelRow, Select, Surface, ToolingApi, DEBUG_LEVEL_SOBJECT,
};

use crate::error::TraceError;

/// One `SFDC_DevConsole` debug level is shared by every developer-console
/// trace flag in an org.
pub const DEFAULT_DEBUG_LEVEL_NAME: &str = "SFDC_DevConsole";
pub const DEFAULT_APEX_CODE_LEVEL: &str = "FINE";
pub const PROVISIONED_DEBUG_LEVEL_LABEL: &str = "Created by sf-trace-plugin";

/// A `DebugLevel` that exists in the org.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLevel {
    pub id: String,
    pub developer_name: String,
    pub apex_code: Option<String>,
    pub master_label: Option<String>,
}

impl From<DebugLevelRow> for DebugLevel {
    fn from(row: DebugLevelRow) -> Self {
        Self {
            id: row.id,
            developer_name: row.developer_name,
            apex_code: row.apex_code,
            master_label: row.master_label,
        }
    }
}

/// How a debug level was obtained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", content = "debug_level", rename_all = "snake_case")]
pub enum DebugLevelResolution {
    Found(DebugLevel),
    Created(DebugLevel),
}

impl DebugLevelResolution {
    pub fn level(&self) -> &DebugLevel {
        match self {
            Self::Found(level) | Self::Created(level) => level,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// What to do when no debug level exists under the requested name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPolicy {
    #[default]
    AutoProvision,
    RequireExisting,
}

/// Find a debug level by developer name.
pub async fn find_debug_level(
    api: &dyn ToolingApi,
    name: &str,
) -> Result<Option<DebugLevel>, TraceError> {
    let query = Select::from(DEBUG_LEVEL_SOBJECT)
        .fields(["Id", "DeveloperName"])
        .where_eq("DeveloperName", name)?;
    log::debug!("resolving debug level: {query}");

    let result = api.query(Surface::Tooling, &query).await?;
    Ok(result
        .first_as::<DebugLevelRow>()?
        .filter(|row| !row.id.is_empty())
        .map(DebugLevel::from))
}

/// Create the default debug level under `name`.
pub async fn provision_debug_level(
    api: &dyn ToolingApi,
    name: &str,
) -> Result<DebugLevel, TraceError> {
    let draft = DebugLevelRow {
        id: String::new(),
        developer_name: name.to_string(),
        apex_code: Some(DEFAULT_APEX_CODE_LEVEL.to_string()),
        master_label: Some(PROVISIONED_DEBUG_LEVEL_LABEL.to_string()),
    };
    let mut fields = encode_record(&draft)?;
    fields.remove("Id");

    log::debug!(
        "creating DebugLevel {name}: {}",
        serde_json::Value::Object(fields.clone())
    );
    let saved = api.create(Surface::Tooling, DEBUG_LEVEL_SOBJECT, fields).await?;

    Ok(DebugLevel {
        id: saved.id,
        ..DebugLevel::from(draft)
    })
}

/// Settle a lookup result against the provisioning policy.
pub async fn settle_debug_level(
    api: &dyn ToolingApi,
    name: &str,
    found: Option<DebugLevel>,
    policy: ProvisionPolicy,
) -> Result<DebugLevelResolution, TraceError> {
    match (found, policy) {
        (Some(level), _) => Ok(DebugLevelResolution::Found(level)),
        (None, ProvisionPolicy::RequireExisting) => Err(TraceError::DebugLevelNotFound {
            name: name.to_string(),
        }),
        (None, ProvisionPolicy::AutoProvision) => provision_debug_level(api, name)
            .await
            .map(DebugLevelResolution::Created),
    }
}

/// Find a debug level by name, provisioning it when allowed.
pub async fn resolve_or_create_debug_level(
    api: &dyn ToolingApi,
    name: &str,
    policy: ProvisionPolicy,
) -> Result<DebugLevelResolution, TraceError> {
    let found = find_debug_level(api, name).await?;
    settle_debug_level(api, name, found, policy).await
}
