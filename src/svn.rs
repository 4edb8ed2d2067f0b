use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use url::Url;
use walkdir::WalkDir;

pub(crate) const SVN_BINARY: &str = "svn";

const SUPPORTED_CHECKOUT_SCHEMES: [&str; 5] = ["http", "https", "svn", "svn+ssh", "file"];

#[derive(Debug, Clone)]
pub(crate) struct SvnCapture {
    pub(crate) exit_code: Option<i32>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) error: Option<String>,
}

impl SvnCapture {
    pub(crate) fn failure_message(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        if self.exit_code != Some(0) {
            if let Some(line) = first_non_empty_line(&self.stderr) {
                return Some(line);
            }
            return Some(match self.exit_code {
                Some(code) => format!("svn exited with status {code}."),
                None => "svn was terminated before it could exit.".to_string(),
            });
        }
        None
    }
}

pub(crate) fn run_svn(cwd: &Path, args: &[String], stdin: Option<&str>) -> SvnCapture {
    let mut command = Command::new(SVN_BINARY);
    command
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            return SvnCapture {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("Failed to execute {SVN_BINARY}: {error}")),
            }
        }
    };

    if let Some(input) = stdin {
        if let Some(mut handle) = child.stdin.take() {
            let _ = handle.write_all(input.as_bytes());
        }
    }

    match child.wait_with_output() {
        Ok(output) => SvnCapture {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            error: None,
        },
        Err(error) => SvnCapture {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(format!("Failed to collect {SVN_BINARY} output: {error}")),
        },
    }
}

pub(crate) fn display_command(args: &[String]) -> String {
    let mut rendered = SVN_BINARY.to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

pub(crate) fn status_args() -> Vec<String> {
    vec!["status".to_string()]
}

pub(crate) fn info_args() -> Vec<String> {
    vec!["info".to_string()]
}

pub(crate) fn add_args(targets: &[String]) -> Vec<String> {
    let mut args = vec![
        "add".to_string(),
        "--force".to_string(),
        "--depth=empty".to_string(),
    ];
    args.extend(targets.iter().cloned());
    args
}

pub(crate) fn remove_args(targets: &[String]) -> Vec<String> {
    let mut args = vec!["delete".to_string(), "--force".to_string()];
    args.extend(targets.iter().cloned());
    args
}

pub(crate) fn revert_args(targets: &[String]) -> Vec<String> {
    let mut args = vec!["revert".to_string()];
    args.extend(targets.iter().cloned());
    args
}

pub(crate) fn checkout_args(url: &str, username: &str) -> Vec<String> {
    let mut args = vec!["checkout".to_string(), url.to_string(), ".".to_string()];
    args.extend(non_interactive_auth_args(username));
    args
}

pub(crate) fn commit_args(message: &str, username: &str, targets: &[String]) -> Vec<String> {
    let mut args = vec![
        "commit".to_string(),
        "--force-log".to_string(),
        "-m".to_string(),
        message.to_string(),
    ];
    args.extend(non_interactive_auth_args(username));
    args.extend(targets.iter().cloned());
    args
}

pub(crate) fn log_args(username: &str) -> Vec<String> {
    let mut args = vec!["log".to_string(), "--xml".to_string()];
    args.extend(non_interactive_auth_args(username));
    args
}

fn non_interactive_auth_args(username: &str) -> Vec<String> {
    vec![
        "--non-interactive".to_string(),
        "--username".to_string(),
        username.to_string(),
        "--password-from-stdin".to_string(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusRow {
    pub(crate) info: String,
    pub(crate) path: String,
    pub(crate) is_dir: bool,
}

pub(crate) fn parse_status_rows(stdout: &str, working_copy: &Path) -> Vec<StatusRow> {
    let mut rows = Vec::new();

    for line in stdout.lines() {
        let Some(info) = line.get(..7) else { continue };
        let Some(raw_path) = line.get(8..) else {
            continue;
        };
        let path = raw_path.trim();
        if path.is_empty() {
            continue;
        }

        let full_path = working_copy.join(path);

        if info.starts_with('?') {
            rows.extend(expand_unversioned_entry(info, path, &full_path, working_copy));
        } else if !info.starts_with(' ') {
            rows.push(StatusRow {
                info: info.to_string(),
                path: path.to_string(),
                is_dir: full_path.is_dir(),
            });
        }
    }

    rows
}

// An unversioned directory is reported as a single row by svn; the UI wants
// one row per contained entry so each can be staged individually.
fn expand_unversioned_entry(
    info: &str,
    path: &str,
    full_path: &Path,
    working_copy: &Path,
) -> Vec<StatusRow> {
    if !full_path.is_dir() {
        return vec![StatusRow {
            info: info.to_string(),
            path: path.to_string(),
            is_dir: false,
        }];
    }

    let mut rows = Vec::new();
    for entry in WalkDir::new(full_path).into_iter().flatten() {
        let relative = entry
            .path()
            .strip_prefix(working_copy)
            .map(|value| value.display().to_string())
            .unwrap_or_else(|_| entry.path().display().to_string());
        rows.push(StatusRow {
            info: info.to_string(),
            path: relative,
            is_dir: entry.file_type().is_dir(),
        });
    }
    rows
}

pub(crate) fn parse_info_repository_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("URL:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogEntry {
    pub(crate) revision: String,
    pub(crate) author: String,
    pub(crate) date: String,
    pub(crate) message: String,
}

pub(crate) fn parse_log_entries(xml: &str) -> Result<Vec<LogEntry>, String> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current = LogEntry::default();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Err(error) => return Err(format!("Failed to parse svn log output: {error}")),
            Ok(Event::Eof) => break,
            Ok(Event::Start(tag)) => {
                if tag.name().as_ref() == b"logentry" {
                    current = LogEntry::default();
                    match tag.try_get_attribute("revision") {
                        Ok(Some(attribute)) => {
                            current.revision = String::from_utf8_lossy(&attribute.value).to_string();
                        }
                        Ok(None) => {}
                        Err(error) => {
                            return Err(format!("Failed to parse svn log output: {error}"))
                        }
                    }
                }
                text.clear();
            }
            Ok(Event::Text(value)) => {
                text = value
                    .unescape()
                    .map_err(|error| format!("Failed to parse svn log output: {error}"))?
                    .into_owned();
            }
            Ok(Event::End(tag)) => match tag.name().as_ref() {
                b"author" => current.author = text.clone(),
                b"date" => current.date = text.clone(),
                b"msg" => current.message = text.clone(),
                b"logentry" => entries.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(_) => {}
        }
    }

    Ok(entries)
}

pub(crate) fn validate_working_copy_path(path: &str) -> Result<PathBuf, String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("path must be a non-empty string.".to_string());
    }

    let candidate = PathBuf::from(trimmed);
    if !candidate.is_absolute() {
        return Err("path must be an absolute path.".to_string());
    }
    if !candidate.is_dir() {
        return Err(format!(
            "path \"{}\" is not an existing directory.",
            candidate.display()
        ));
    }

    Ok(candidate)
}

pub(crate) fn validate_target_paths(targets: &[String]) -> Result<Vec<String>, String> {
    let mut normalized = Vec::new();
    let mut seen = HashSet::new();

    for target in targets {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err("targets entries must be non-empty strings.".to_string());
        }
        if trimmed.contains('\0') {
            return Err("targets entries cannot contain null bytes.".to_string());
        }
        if seen.insert(trimmed.to_string()) {
            normalized.push(trimmed.to_string());
        }
    }

    if normalized.is_empty() {
        return Err("targets must include at least one path.".to_string());
    }

    Ok(normalized)
}

pub(crate) fn validate_checkout_url(url: &str) -> Result<String, String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err("url must be a non-empty string.".to_string());
    }

    let parsed =
        Url::parse(trimmed).map_err(|error| format!("url is not a valid URL: {error}."))?;
    if !SUPPORTED_CHECKOUT_SCHEMES.contains(&parsed.scheme()) {
        return Err(format!(
            "url scheme must be one of: {}.",
            SUPPORTED_CHECKOUT_SCHEMES.join(", ")
        ));
    }

    Ok(trimmed.to_string())
}

pub(crate) fn validate_commit_message(message: &str) -> Result<String, String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err("message must be a non-empty string.".to_string());
    }
    Ok(trimmed.to_string())
}

pub(crate) fn first_non_empty_line(value: &str) -> Option<String> {
    value
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_status_rows_and_skips_clean_lines() {
        let working_copy = Path::new("/nonexistent-working-copy");
        let output = "M       src/main.c\nA       docs/guide.md\n?       notes.txt\n        clean.txt\n";
        let rows = parse_status_rows(output, working_copy);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].info, "M      ");
        assert_eq!(rows[0].path, "src/main.c");
        assert!(!rows[0].is_dir);
        assert_eq!(rows[1].path, "docs/guide.md");
        assert_eq!(rows[2].info, "?      ");
        assert_eq!(rows[2].path, "notes.txt");
    }

    #[test]
    fn expands_unversioned_directory_into_contained_entries() {
        let working_copy =
            std::env::temp_dir().join(format!("svn-desktop-test-{}", uuid::Uuid::new_v4()));
        let unversioned = working_copy.join("newdir");
        fs::create_dir_all(&unversioned).unwrap();
        fs::write(unversioned.join("inner.txt"), "x").unwrap();

        let rows = parse_status_rows("?       newdir\n", &working_copy);

        let paths = rows.iter().map(|row| row.path.as_str()).collect::<Vec<_>>();
        assert!(paths.contains(&"newdir"));
        assert!(paths
            .iter()
            .any(|path| path.ends_with("inner.txt") && path.starts_with("newdir")));
        assert!(rows
            .iter()
            .find(|row| row.path == "newdir")
            .is_some_and(|row| row.is_dir));

        fs::remove_dir_all(&working_copy).unwrap();
    }

    #[test]
    fn parses_repository_url_from_info_output() {
        let output = "Path: .\nWorking Copy Root Path: /home/user/project\nURL: https://svn.example.com/repo/trunk\nRelative URL: ^/trunk\n";
        assert_eq!(
            parse_info_repository_url(output).as_deref(),
            Some("https://svn.example.com/repo/trunk")
        );
        assert_eq!(parse_info_repository_url("Path: .\n"), None);
    }

    #[test]
    fn parses_log_xml_into_entries() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry revision="42">
<author>alice</author>
<date>2024-05-01T10:00:00.000000Z</date>
<msg>Fix build &amp; tests</msg>
</logentry>
<logentry revision="41">
<author>bob</author>
<date>2024-04-30T09:00:00.000000Z</date>
<msg>Initial import</msg>
</logentry>
</log>"#;

        let entries = parse_log_entries(xml).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].revision, "42");
        assert_eq!(entries[0].author, "alice");
        assert_eq!(entries[0].message, "Fix build & tests");
        assert_eq!(entries[1].revision, "41");
    }

    #[test]
    fn rejects_unparseable_log_xml() {
        assert!(parse_log_entries("<log><logentry>").is_err());
    }

    #[test]
    fn validates_checkout_urls() {
        assert!(validate_checkout_url("https://svn.example.com/repo/trunk").is_ok());
        assert!(validate_checkout_url("svn+ssh://host/repo").is_ok());
        assert!(validate_checkout_url("file:///srv/svn/repo").is_ok());
        assert!(validate_checkout_url("ftp://host/repo").is_err());
        assert!(validate_checkout_url("not a url").is_err());
        assert!(validate_checkout_url("   ").is_err());
    }

    #[test]
    fn validates_target_paths() {
        assert!(validate_target_paths(&[]).is_err());
        assert!(validate_target_paths(&["  ".to_string()]).is_err());
        assert!(validate_target_paths(&["a\0b".to_string()]).is_err());

        let normalized = validate_target_paths(&[
            " a.txt ".to_string(),
            "b.txt".to_string(),
            "a.txt".to_string(),
        ])
        .unwrap();
        assert_eq!(normalized, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn password_never_appears_in_constructed_args() {
        let commit = commit_args("message", "alice", &["a.txt".to_string()]);
        let checkout = checkout_args("https://svn.example.com/repo", "alice");
        let log = log_args("alice");

        for args in [&commit, &checkout, &log] {
            assert!(args.contains(&"--password-from-stdin".to_string()));
            assert!(!args.iter().any(|arg| arg.contains("secret")));
            assert!(!args.iter().any(|arg| arg == "--password"));
        }

        assert_eq!(commit[0], "commit");
        assert_eq!(checkout[..3], ["checkout", "https://svn.example.com/repo", "."]);
    }

    #[test]
    fn renders_display_command() {
        assert_eq!(
            display_command(&["status".to_string()]),
            "svn status".to_string()
        );
    }
}
