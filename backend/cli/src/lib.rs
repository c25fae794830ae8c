//! Confab shell: the HTTP API and web page, the offline analysis step, and
//! terminal helpers shared by the `confab` binary.

pub mod analysis;
pub mod api;
pub mod terminal_output;
pub mod ui;

pub use analysis::{analyze, Analysis, EMPTY_SUMMARY_MESSAGE};
pub use api::{build_router, AppState, ProfileSlot};
