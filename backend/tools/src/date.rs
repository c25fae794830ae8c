use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use confab_core::{Tool, ToolOutput};
use serde_json::Value;

/// Today's date as "Month DD, YYYY".
pub struct DateTool;

pub const DATE_TOOL_NAME: &str = "get_today_date";

pub fn format_date<D: Datelike>(date: &D) -> String {
    match NaiveDate::from_ymd_opt(date.year(), date.month(), date.day()) {
        Some(d) => d.format("%B %d, %Y").to_string(),
        None => String::new(),
    }
}

pub fn today() -> String {
    format_date(&Local::now())
}

#[async_trait]
impl Tool for DateTool {
    fn name(&self) -> &str {
        DATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "A simple function to get today's date"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
        })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<ToolOutput> {
        Ok(ToolOutput::text(today()))
    }
}
