//! Document sink: a paginated plain-text report written to a file
//!
//! Every page is exactly `page_lines` lines: a header with the title, a
//! rule, the body (padded), a blank line and a `Page N` footer. Pages are
//! separated by a form feed. Output goes to a hidden temporary file beside
//! the target and is renamed into place on `finish()`; an unfinished sink
//! removes its temporary file when dropped.

use chrono::Local;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use sysscope_common::config::ReportConfig;
use sysscope_common::{Category, ReportSink, Scalar, SinkError, Value};
use tracing::debug;

/// Header, rule, blank before the footer, footer
const CHROME_LINES: usize = 4;

const FORM_FEED: char = '\u{0c}';

pub struct DocumentSink {
    target: PathBuf,
    temp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    title: String,
    page_lines: usize,
    page_width: usize,
    pages_written: usize,
    body: Vec<String>,
    /// Lines that must land on the same page as the next entry
    keep_with_next: Vec<String>,
    open_group: Option<String>,
}

impl DocumentSink {
    /// Create the temporary file next to `target`
    pub fn create(target: impl AsRef<Path>, layout: &ReportConfig) -> Result<Self, SinkError> {
        let target = target.as_ref().to_path_buf();
        let temp_path = temp_path_for(&target);
        let file = File::create(&temp_path).map_err(|source| SinkError::Open {
            path: target.clone(),
            source,
        })?;
        debug!("Writing document to {}", temp_path.display());

        Ok(Self {
            target,
            temp_path,
            writer: Some(BufWriter::new(file)),
            title: layout.title.clone(),
            page_lines: layout.page_lines,
            page_width: layout.page_width,
            pages_written: 0,
            body: Vec::new(),
            keep_with_next: Vec::new(),
            open_group: None,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn capacity(&self) -> usize {
        self.page_lines.saturating_sub(CHROME_LINES).max(1)
    }

    fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.body.len())
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.writer.is_none() {
            Err(SinkError::Finished)
        } else {
            Ok(())
        }
    }

    /// Wrap one logical line to the page width, indenting continuations
    fn wrap(&self, indent: usize, text: &str) -> Vec<String> {
        let first = " ".repeat(indent);
        let rest = " ".repeat(indent + 4);
        let options = textwrap::Options::new(self.page_width)
            .initial_indent(&first)
            .subsequent_indent(&rest);
        textwrap::wrap(text, options)
            .into_iter()
            .map(|line| line.into_owned())
            .collect()
    }

    /// Place an entry (and anything kept with it) on the current page,
    /// breaking first if it would not fit on a partly filled page
    fn place(&mut self, entry: Vec<String>) -> Result<(), SinkError> {
        let mut block = std::mem::take(&mut self.keep_with_next);
        block.extend(entry);

        if block.len() > self.remaining() && !self.body.is_empty() {
            self.flush_page()?;
        }
        for line in block {
            if self.body.is_empty() && line.is_empty() {
                continue;
            }
            if self.remaining() == 0 {
                self.flush_page()?;
            }
            self.body.push(line);
        }
        Ok(())
    }

    fn flush_page(&mut self) -> Result<(), SinkError> {
        let capacity = self.capacity();
        let width = self.page_width;
        let number = self.pages_written + 1;
        let header: String = self.title.chars().take(width).collect();
        let body = std::mem::take(&mut self.body);
        let writer = self.writer.as_mut().ok_or(SinkError::Finished)?;

        if number > 1 {
            write!(writer, "{}", FORM_FEED)?;
        }
        writeln!(writer, "{}", header)?;
        writeln!(writer, "{}", "=".repeat(width))?;
        for line in &body {
            writeln!(writer, "{}", line)?;
        }
        for _ in body.len()..capacity {
            writeln!(writer)?;
        }
        writeln!(writer)?;
        writeln!(writer, "{:>width$}", format!("Page {}", number), width = width)?;

        self.pages_written = number;
        Ok(())
    }
}

fn commit(writer: BufWriter<File>, temp_path: &Path, target: &Path) -> Result<(), SinkError> {
    let file = writer.into_inner().map_err(|e| SinkError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, target)?;
    Ok(())
}

fn temp_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    target.with_file_name(format!(".{}.partial", name))
}

impl ReportSink for DocumentSink {
    fn write_title(&mut self, text: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.title = text.to_string();
        let generated = format!("Generated on {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let mut lines = self.wrap(0, text);
        lines.extend(self.wrap(0, &generated));
        self.place(lines)
    }

    fn write_section_header(&mut self, category: Category) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.open_group = None;
        let name = category.as_str();
        self.keep_with_next.extend([
            String::new(),
            name.to_string(),
            "-".repeat(name.chars().count()),
        ]);
        Ok(())
    }

    fn write_key_value(&mut self, key: &str, value: &Scalar) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.open_group = None;
        let lines = self.wrap(2, &format!("{}: {}", key, value));
        self.place(lines)
    }

    fn write_nested_key_value(
        &mut self,
        parent_key: &str,
        sub_key: &str,
        value: &Value,
    ) -> Result<(), SinkError> {
        self.ensure_open()?;
        if self.open_group.as_deref() != Some(parent_key) {
            let parent = self.wrap(2, &format!("{}:", parent_key));
            self.keep_with_next.extend(parent);
            self.open_group = Some(parent_key.to_string());
        }
        let lines = self.wrap(4, &format!("{}: {}", sub_key, value));
        self.place(lines)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.ensure_open()?;
        if !self.keep_with_next.is_empty() {
            self.place(Vec::new())?;
        }
        if !self.body.is_empty() || self.pages_written == 0 {
            self.flush_page()?;
        }

        let writer = self.writer.take().ok_or(SinkError::Finished)?;
        if let Err(e) = commit(writer, &self.temp_path, &self.target) {
            let _ = fs::remove_file(&self.temp_path);
            return Err(e);
        }
        debug!(
            "Document complete: {} page(s) at {}",
            self.pages_written,
            self.target.display()
        );
        Ok(())
    }
}

impl Drop for DocumentSink {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}
