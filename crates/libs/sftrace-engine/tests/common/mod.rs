#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use sftrace_engine::TraceEngine;
use sftrace_tooling::{
    InMemoryOrg, Record, DEBUG_LEVEL_SOBJECT, TRACE_FLAG_SOBJECT, USER_SOBJECT,
};
use time::macros::datetime;
use time::OffsetDateTime;

pub const CALLER: &str = "current@auth.com";
pub const NOW: OffsetDateTime = datetime!(2024-03-01 12:00:00 UTC);

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn org() -> Arc<InMemoryOrg> {
    Arc::new(InMemoryOrg::new(CALLER))
}

pub fn engine(org: &Arc<InMemoryOrg>) -> TraceEngine {
    TraceEngine::new(org.clone()).with_clock(|| NOW)
}

pub fn seed_user(org: &InMemoryOrg, id: &str, username: &str) {
    org.insert(USER_SOBJECT, record(json!({ "Id": id, "Username": username })));
}

pub fn seed_autoproc(org: &InMemoryOrg, id: &str) {
    org.insert(
        USER_SOBJECT,
        record(json!({ "Id": id, "Username": "autoproc@00d.example", "Alias": "autoproc" })),
    );
}

pub fn seed_debug_level(org: &InMemoryOrg, id: &str, name: &str) {
    org.insert(
        DEBUG_LEVEL_SOBJECT,
        record(json!({ "Id": id, "DeveloperName": name, "ApexCode": "FINEST" })),
    );
}

pub fn seed_trace_flag(org: &InMemoryOrg, id: &str, user_id: &str, debug_level_id: Option<&str>) {
    let mut fields = record(json!({
        "Id": id,
        "TracedEntityId": user_id,
        "LogType": "USER_DEBUG",
    }));
    if let Some(debug_level_id) = debug_level_id {
        fields.insert("DebugLevelId".into(), json!(debug_level_id));
    }
    org.insert(TRACE_FLAG_SOBJECT, fields);
}
