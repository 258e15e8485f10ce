//! Report rendering contract
//!
//! The renderer knows the report layout; sinks know the output medium.

use crate::classify::{Category, ClassifiedReport};
use crate::error::SinkError;
use crate::model::{Scalar, Value};

pub const REPORT_TITLE: &str = "System Information Report";

/// A destination for a rendered report (console stream, paginated document)
pub trait ReportSink {
    fn write_title(&mut self, text: &str) -> Result<(), SinkError>;

    fn write_section_header(&mut self, category: Category) -> Result<(), SinkError>;

    fn write_key_value(&mut self, key: &str, value: &Scalar) -> Result<(), SinkError>;

    /// One entry of a nested block under `parent_key`
    fn write_nested_key_value(
        &mut self,
        parent_key: &str,
        sub_key: &str,
        value: &Value,
    ) -> Result<(), SinkError>;

    /// Flush and close; no writes are accepted afterwards
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Render with the default title
pub fn render(report: &ClassifiedReport, sink: &mut dyn ReportSink) -> Result<(), SinkError> {
    render_with_title(report, REPORT_TITLE, sink)
}

/// Title, then every non-empty category in order, then `finish`.
/// The first sink error stops rendering.
pub fn render_with_title(
    report: &ClassifiedReport,
    title: &str,
    sink: &mut dyn ReportSink,
) -> Result<(), SinkError> {
    sink.write_title(title)?;

    for (category, facts) in report.non_empty() {
        sink.write_section_header(*category)?;
        for fact in facts {
            match &fact.value {
                Value::Scalar(scalar) => sink.write_key_value(&fact.key, scalar)?,
                Value::Group(entries) => {
                    for entry in entries {
                        sink.write_nested_key_value(&fact.key, &entry.key, &entry.value)?;
                    }
                }
            }
        }
    }

    sink.finish()
}
