//! CLI domain: parse, route, output, and presentation only.
//! The orchestration core does not depend on anything here.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_config, format_expansion, format_pack_summary, PackSummaryRow};
pub use route::RunContext;
