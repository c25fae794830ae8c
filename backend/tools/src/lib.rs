pub mod calculator;
pub mod date;
pub mod image;
pub mod web;

pub use calculator::{calculate, CalculatorTool, CALCULATOR_TOOL_NAME};
pub use date::{format_date, today, DateTool, DATE_TOOL_NAME};
pub use image::{ImageGeneratorTool, IMAGE_TOOL_NAME};
pub use web::{SearchHit, WebSearchTool, WEB_SEARCH_TOOL_NAME};

/// What a remote-backed tool does when its upstream call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Return the error to the dispatcher.
    #[default]
    Propagate,
    /// Return an empty result and surface the error as a notice.
    ReportEmpty,
}
