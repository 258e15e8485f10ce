//! Software probes: Python, developer tools, packages, browsers, environment

use crate::util::exec;
use chrono::{DateTime, Local};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use sysscope_common::{Fact, FnProbe, Platform, ProbeContext, ProbeFailure, ProbeGroup, Requirement};

const PYTHON_TOOLS: &[&str] = &["python3", "python"];
const PACKAGE_TOOLS: &[&str] = &["pacman", "dpkg-query", "rpm"];

/// Display name → executables that count as "installed"
const DEV_TOOLS: &[(&str, &[&str])] = &[
    ("Python", &["python3", "python"]),
    ("Java", &["java"]),
    ("GCC", &["gcc"]),
    ("Node.js", &["node"]),
    ("Git", &["git"]),
    ("Docker", &["docker"]),
    ("VS Code", &["code"]),
    ("Rust", &["cargo", "rustc"]),
];

const SAMPLE_SIZE: usize = 10;

pub fn group(ctx: &ProbeContext) -> ProbeGroup {
    ProbeGroup::new("software", ctx)
        .with(FnProbe::new("Python", python_info).requires(Requirement::AnyTool(PYTHON_TOOLS)))
        .with(FnProbe::new("Development Tools", dev_tools_info))
        .with(
            FnProbe::new("Installed Programs", installed_programs)
                .requires(Requirement::AnyTool(PACKAGE_TOOLS)),
        )
        .with(FnProbe::new("Browser History", browser_info))
        .with(FnProbe::new("Environment", environment_info))
}

pub fn python_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let python = PYTHON_TOOLS
        .iter()
        .find(|t| ctx.capabilities.has_tool(t))
        .ok_or_else(|| ProbeFailure::missing("python not found"))?;

    let out = exec(ctx).stdout(
        python,
        &[
            "-c",
            "import platform; print(platform.python_version()); print(platform.python_implementation()); print(platform.python_compiler())",
        ],
    )?;
    Ok(parse_python_report(&out))
}

/// One line each: version, implementation, compiler
fn parse_python_report(out: &str) -> Vec<Fact> {
    let mut lines = out.lines().map(str::trim);
    let mut next = || lines.next().filter(|v| !v.is_empty()).unwrap_or("Unknown");
    let version = next();
    let implementation = next();
    let compiler = next();

    vec![
        Fact::new("Python Version", version),
        Fact::new("Python Implementation", implementation),
        Fact::new("Python Compiler", compiler),
    ]
}

pub fn dev_tools_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let tools = DEV_TOOLS
        .iter()
        .map(|(name, executables)| {
            let found = executables.iter().any(|exe| which::which(exe).is_ok());
            Fact::new(*name, if found { "Installed" } else { "Not detected" })
        })
        .collect();
    Ok(vec![Fact::group("Development Tools", tools)])
}

pub fn installed_programs(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let caps = &ctx.capabilities;
    let runner = exec(ctx);

    let out = if caps.has_tool("pacman") {
        runner.stdout("pacman", &["-Qq"])?
    } else if caps.has_tool("dpkg-query") {
        runner.stdout("dpkg-query", &["-W", "-f", "${Package}\\n"])?
    } else if caps.has_tool("rpm") {
        runner.stdout("rpm", &["-qa", "--qf", "%{NAME}\\n"])?
    } else {
        return Err(ProbeFailure::missing(format!(
            "none of {} found",
            PACKAGE_TOOLS.join(", ")
        )));
    };

    Ok(program_facts(&out))
}

pub fn program_facts(listing: &str) -> Vec<Fact> {
    let names: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let sample = names
        .iter()
        .take(SAMPLE_SIZE)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        Fact::new("Installed Programs Count", names.len()),
        Fact::new(
            "Installed Programs Sample",
            if sample.is_empty() { "None".to_string() } else { sample },
        ),
    ]
}

/// Where a browser keeps its history database
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub name: &'static str,
    pub kind: ProfileKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Chromium-family `History` file
    HistoryFile,
    /// Firefox profiles root; each profile holds `places.sqlite`
    FirefoxProfiles,
}

fn browser_profiles(platform: Platform) -> Vec<BrowserProfile> {
    let chromium = |name: &'static str, path: Option<PathBuf>| {
        path.map(|path| BrowserProfile {
            name,
            kind: ProfileKind::HistoryFile,
            path,
        })
    };
    let firefox = |path: Option<PathBuf>| {
        path.map(|path| BrowserProfile {
            name: "Firefox",
            kind: ProfileKind::FirefoxProfiles,
            path,
        })
    };
    let config = dirs::config_dir();
    let local = dirs::data_local_dir();
    let under = |base: &Option<PathBuf>, rel: &str| base.as_ref().map(|b| b.join(rel));

    let candidates = match platform {
        Platform::Windows => vec![
            firefox(under(&config, "Mozilla/Firefox/Profiles")),
            chromium("Chrome", under(&local, "Google/Chrome/User Data/Default/History")),
            chromium("Chromium", under(&local, "Chromium/User Data/Default/History")),
            chromium("Brave", under(&local, "BraveSoftware/Brave-Browser/User Data/Default/History")),
            chromium("Edge", under(&local, "Microsoft/Edge/User Data/Default/History")),
        ],
        Platform::MacOs => vec![
            firefox(under(&config, "Firefox/Profiles")),
            chromium("Chrome", under(&config, "Google/Chrome/Default/History")),
            chromium("Chromium", under(&config, "Chromium/Default/History")),
            chromium("Brave", under(&config, "BraveSoftware/Brave-Browser/Default/History")),
            chromium("Edge", under(&config, "Microsoft Edge/Default/History")),
        ],
        _ => vec![
            firefox(dirs::home_dir().map(|h| h.join(".mozilla/firefox"))),
            chromium("Chrome", under(&config, "google-chrome/Default/History")),
            chromium("Chromium", under(&config, "chromium/Default/History")),
            chromium("Brave", under(&config, "BraveSoftware/Brave-Browser/Default/History")),
            chromium("Edge", under(&config, "microsoft-edge/Default/History")),
        ],
    };
    candidates.into_iter().flatten().collect()
}

/// Modification time of the newest history database, if any exists
pub fn last_activity(profile: &BrowserProfile) -> Option<SystemTime> {
    match profile.kind {
        ProfileKind::HistoryFile => modified(&profile.path),
        ProfileKind::FirefoxProfiles => fs::read_dir(&profile.path)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| modified(&entry.path().join("places.sqlite")))
            .max(),
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn browser_info(ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    Ok(browser_facts(&browser_profiles(ctx.capabilities.platform)))
}

/// Never opens the databases; only file timestamps are reported
pub fn browser_facts(profiles: &[BrowserProfile]) -> Vec<Fact> {
    let stats: Vec<Fact> = profiles
        .iter()
        .filter_map(|p| {
            let when: DateTime<Local> = last_activity(p)?.into();
            Some(Fact::new(
                format!("{} Last Activity", p.name),
                when.format("%Y-%m-%d %H:%M:%S").to_string(),
            ))
        })
        .collect();

    if stats.is_empty() {
        vec![Fact::new("Browser History", "No browser profiles found")]
    } else {
        vec![Fact::group("Browser History Stats", stats)]
    }
}

pub fn environment_info(_ctx: &ProbeContext) -> Result<Vec<Fact>, ProbeFailure> {
    let shell = env::var("SHELL")
        .or_else(|_| env::var("COMSPEC"))
        .unwrap_or_else(|_| "Unknown".to_string());

    Ok(vec![
        Fact::new("Environment Variables Count", env::vars_os().count()),
        Fact::new("Shell", shell),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysscope_common::Value;

    #[test]
    fn test_program_facts_sample_is_capped() {
        let listing: String = (0..25).map(|i| format!("pkg{}\n", i)).collect();
        let facts = program_facts(&listing);
        assert_eq!(facts[0], Fact::new("Installed Programs Count", 25usize));
        let sample = facts[1].value.as_text().unwrap();
        assert_eq!(sample.split(", ").count(), SAMPLE_SIZE);
        assert!(sample.starts_with("pkg0, pkg1"));
    }

    #[test]
    fn test_program_facts_empty() {
        let facts = program_facts("\n\n");
        assert_eq!(facts[1], Fact::new("Installed Programs Sample", "None"));
    }

    #[test]
    fn test_python_report_includes_compiler() {
        let facts = parse_python_report("3.12.1\nCPython\nGCC 13.2.1 20230801\n");
        assert_eq!(facts[0], Fact::new("Python Version", "3.12.1"));
        assert_eq!(facts[2], Fact::new("Python Compiler", "GCC 13.2.1 20230801"));

        let short = parse_python_report("3.8.0\n");
        assert_eq!(short[1], Fact::new("Python Implementation", "Unknown"));
        assert_eq!(short[2], Fact::new("Python Compiler", "Unknown"));
    }

    #[test]
    fn test_dev_tools_is_a_group_of_all_tools() {
        let facts = dev_tools_info(&ProbeContext::new(
            sysscope_common::CapabilitySet::minimal(Platform::current()),
            sysscope_common::Config::default(),
        ))
        .unwrap();
        match &facts[0].value {
            Value::Group(entries) => {
                let names: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
                assert_eq!(
                    names,
                    vec!["Python", "Java", "GCC", "Node.js", "Git", "Docker", "VS Code", "Rust"]
                );
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_browser_facts_from_profiles() {
        let root = tempfile::tempdir().unwrap();
        let chrome = root.path().join("History");
        fs::write(&chrome, b"").unwrap();
        let ff_root = root.path().join("firefox");
        fs::create_dir_all(ff_root.join("abcd.default")).unwrap();
        fs::write(ff_root.join("abcd.default/places.sqlite"), b"").unwrap();

        let profiles = vec![
            BrowserProfile {
                name: "Firefox",
                kind: ProfileKind::FirefoxProfiles,
                path: ff_root,
            },
            BrowserProfile {
                name: "Chrome",
                kind: ProfileKind::HistoryFile,
                path: chrome,
            },
            BrowserProfile {
                name: "Edge",
                kind: ProfileKind::HistoryFile,
                path: root.path().join("missing/History"),
            },
        ];

        let facts = browser_facts(&profiles);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].key, "Browser History Stats");
        match &facts[0].value {
            Value::Group(entries) => {
                let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
                assert_eq!(keys, vec!["Firefox Last Activity", "Chrome Last Activity"]);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_no_profiles() {
        assert_eq!(
            browser_facts(&[]),
            vec![Fact::new("Browser History", "No browser profiles found")]
        );
    }
}
