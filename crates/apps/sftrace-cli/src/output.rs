use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool) -> Self {
        Self { json, quiet }
    }

    /// Print `value` as JSON, or `rows` as a field/value table.
    pub fn emit_report<T: Serialize>(
        &self,
        value: &T,
        title: &str,
        rows: &[(&str, String)],
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
            return Ok(());
        }
        println!("{title}");
        println!("{}", kv_table(rows));
        Ok(())
    }
}

fn kv_table(rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["field", "value"]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}
