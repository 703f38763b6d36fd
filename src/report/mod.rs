pub mod exec;
pub mod markdown;
pub mod output;

pub use exec::{build_report, exec, resolve_as_of, ReportFormat, ReportOptions};
pub use markdown::render_markdown;
pub use output::{output_json, output_ndjson, output_table};
