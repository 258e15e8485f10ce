//! Paginated document output through the public renderer

use std::fs;
use std::path::Path;
use sysscope::sink::DocumentSink;
use sysscope_common::config::ReportConfig;
use sysscope_common::{render_with_title, Category, Classifier, Fact, ReportSink, Scalar, SinkError, Snapshot};

const FORM_FEED: char = '\u{0c}';

fn layout(page_lines: usize, page_width: usize) -> ReportConfig {
    ReportConfig {
        page_lines,
        page_width,
        title: "Test Report".to_string(),
    }
}

fn busy_snapshot() -> Snapshot {
    let mut facts = vec![
        Fact::new("OS Name", "Linux"),
        Fact::new("Hostname", "build-01"),
        Fact::new("CPU Usage (%)", 12.5),
        Fact::group(
            "Development Tools",
            vec![
                Fact::new("Git", "Installed"),
                Fact::new("Rust", "Installed"),
                Fact::new("Docker", "Not detected"),
            ],
        ),
        Fact::new(
            "Installed Programs Sample",
            "bash, coreutils, curl, git, glibc, linux, openssh, pacman, python, systemd",
        ),
    ];
    facts.extend((0..40).map(|i| Fact::new(format!("Extra Metric {}", i), i as i64)));
    Snapshot::from_facts(facts)
}

fn read_pages(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .split(FORM_FEED)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_every_page_is_bounded_and_numbered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let report = Classifier::default().classify(&busy_snapshot());

    let mut sink = DocumentSink::create(&path, &layout(12, 50)).unwrap();
    render_with_title(&report, "Test Report", &mut sink).unwrap();

    let pages = read_pages(&path);
    assert!(pages.len() > 3, "expected several pages, got {}", pages.len());

    for (i, page) in pages.iter().enumerate() {
        let lines: Vec<&str> = page.lines().collect();
        assert!(lines.len() <= 12, "page {} has {} lines", i + 1, lines.len());
        assert_eq!(lines[0], "Test Report");
        assert_eq!(lines.last().unwrap().trim(), format!("Page {}", i + 1));
        assert!(lines.iter().all(|l| l.chars().count() <= 50));
    }
}

#[test]
fn test_section_header_never_ends_a_page() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let report = Classifier::default().classify(&busy_snapshot());

    let mut sink = DocumentSink::create(&path, &layout(10, 60)).unwrap();
    render_with_title(&report, "Test Report", &mut sink).unwrap();

    let headers: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    for page in read_pages(&path) {
        let lines: Vec<&str> = page.lines().collect();
        // body sits between the header rule and the blank line above the footer
        let body = &lines[2..lines.len() - 2];
        let last = body.iter().rev().find(|l| !l.trim().is_empty()).unwrap();
        assert!(!last.chars().all(|c| c == '-'), "page ends on a section rule");
        assert!(!headers.contains(last), "page ends on section header {}", last);
    }
}

#[test]
fn test_title_page_has_generated_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let report = Classifier::default().classify(&Snapshot::from_facts(vec![Fact::new("Kernel", "6.1")]));

    let mut sink = DocumentSink::create(&path, &layout(20, 60)).unwrap();
    render_with_title(&report, "Test Report", &mut sink).unwrap();

    let pages = read_pages(&path);
    assert_eq!(pages.len(), 1);
    assert!(pages[0].contains("Generated on "));
    assert!(pages[0].contains("  Kernel: 6.1"));
}

// ============================================================================
// File handling
// ============================================================================

#[test]
fn test_no_temporary_file_left_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");
    let report = Classifier::default().classify(&busy_snapshot());

    let mut sink = DocumentSink::create(&path, &layout(60, 100)).unwrap();
    render_with_title(&report, "Test Report", &mut sink).unwrap();
    drop(sink);

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["report.txt".to_string()]);
}

#[test]
fn test_missing_directory_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no/such/dir/report.txt");
    let result = DocumentSink::create(&path, &layout(60, 100));
    assert!(matches!(result, Err(SinkError::Open { .. })));
}

#[test]
fn test_writes_after_finish_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = DocumentSink::create(dir.path().join("r.txt"), &layout(60, 100)).unwrap();
    sink.finish().unwrap();

    assert!(matches!(
        sink.write_key_value("Kernel", &Scalar::Text("6.1".into())),
        Err(SinkError::Finished)
    ));
    assert!(matches!(sink.finish(), Err(SinkError::Finished)));
    // an empty document is still one valid page
    assert_eq!(read_pages(&dir.path().join("r.txt")).len(), 1);
}
