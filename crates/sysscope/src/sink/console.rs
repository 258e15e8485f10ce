//! Console sink: the report as coloured, indented text on a stream

use owo_colors::OwoColorize;
use std::io::Write;
use sysscope_common::{Category, ReportSink, Scalar, SinkError, Value};

/// Colour only when stdout is a terminal and `NO_COLOR` is unset
pub fn color_enabled() -> bool {
    console::user_attended() && std::env::var_os("NO_COLOR").is_none()
}

pub struct ConsoleSink<W: Write> {
    out: W,
    color: bool,
    /// Parent key of the nested block currently being written
    open_group: Option<String>,
    finished: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            color,
            open_group: None,
            finished: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.finished {
            Err(SinkError::Finished)
        } else {
            Ok(())
        }
    }

    fn key(&self, key: &str) -> String {
        if self.color {
            key.cyan().bold().to_string()
        } else {
            key.to_string()
        }
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn write_title(&mut self, text: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        let rule = "=".repeat(text.chars().count());
        if self.color {
            writeln!(self.out, "{}\n{}", text.bold(), rule.dimmed())?;
        } else {
            writeln!(self.out, "{}\n{}", text, rule)?;
        }
        Ok(())
    }

    fn write_section_header(&mut self, category: Category) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.open_group = None;
        let name = category.as_str();
        if self.color {
            writeln!(self.out, "\n{}", name.bold().underline())?;
        } else {
            writeln!(self.out, "\n{}\n{}", name, "-".repeat(name.chars().count()))?;
        }
        Ok(())
    }

    fn write_key_value(&mut self, key: &str, value: &Scalar) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.open_group = None;
        writeln!(self.out, "  {}: {}", self.key(key), value)?;
        Ok(())
    }

    fn write_nested_key_value(
        &mut self,
        parent_key: &str,
        sub_key: &str,
        value: &Value,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;
        if self.open_group.as_deref() != Some(parent_key) {
            writeln!(self.out, "  {}:", self.key(parent_key))?;
            self.open_group = Some(parent_key.to_string());
        }
        writeln!(self.out, "    {}: {}", sub_key, value)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.out.flush()?;
        self.finished = true;
        Ok(())
    }
}
