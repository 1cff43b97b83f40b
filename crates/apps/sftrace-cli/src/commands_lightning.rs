use anyhow::Result;
use serde_json::json;

use crate::app::{DebugArgs, RuntimeContext};
use crate::commands_apex::explain;

pub async fn run_debug(ctx: &RuntimeContext, args: &DebugArgs) -> Result<()> {
    let change = ctx
        .engine
        .toggle_debug_mode(args.target_user.as_deref())
        .await
        .map_err(|err| explain(&ctx.org_alias, err))?;

    let state = if change.enabled { "enabled" } else { "disabled" };
    ctx.output.emit_report(
        &json!({ "org": ctx.org_alias, "debug_mode": change }),
        &format!("Lightning Debug Mode {state}"),
        &[
            ("org", ctx.org_alias.clone()),
            ("user", change.user.username.clone()),
            ("user id", change.user.id.clone()),
            ("debug mode", state.to_string()),
        ],
    )
}
