//! Backup log parsing
//!
//! The backup controller writes one logfmt record per line:
//!
//! ```text
//! time="2024-01-02T03:04:05Z" level=error msg="Error backing up item" backup=velero/b1 error="pods \"web\" not found" namespace=app
//! ```
//!
//! Error and warning records become [`SnapshotIssue`]s. Records carrying a
//! `hookName` are folded into one [`HookExecution`] per hook and pod.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use lifeboat_core::models::{HookExecution, ParsedBackupLogs, SnapshotIssue};
use lifeboat_core::SnapshotResult;

use crate::collaborators::BackupLogParser;

/// Default [`BackupLogParser`] for the controller's logfmt output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogfmtBackupLogParser;

impl BackupLogParser for LogfmtBackupLogParser {
    fn parse(&self, raw: &[u8]) -> SnapshotResult<ParsedBackupLogs> {
        let text = String::from_utf8_lossy(raw);
        let mut parsed = ParsedBackupLogs::default();
        let mut hooks: HashMap<(String, String), usize> = HashMap::new();

        for line in text.lines() {
            let record = parse_record(line);
            let Some(level) = record.get("level") else {
                continue;
            };

            if let Some(hook_name) = record.get("hookName") {
                track_hook(&mut parsed.hook_executions, &mut hooks, hook_name, level, &record);
            }

            match level.as_str() {
                "error" | "fatal" => parsed.errors.push(issue(&record)),
                "warning" | "warn" => parsed.warnings.push(issue(&record)),
                _ => {}
            }
        }

        tracing::debug!(
            errors = parsed.errors.len(),
            warnings = parsed.warnings.len(),
            hooks = parsed.hook_executions.len(),
            "Parsed backup logs"
        );
        Ok(parsed)
    }
}

fn issue(record: &BTreeMap<String, String>) -> SnapshotIssue {
    let msg = record.get("msg").cloned().unwrap_or_default();
    SnapshotIssue {
        message: error_text(record).unwrap_or_else(|| msg.clone()),
        title: msg,
        namespace: record
            .get("namespace")
            .cloned()
            .or_else(|| record.get("pod").and_then(|pod| split_pod(pod).0)),
    }
}

fn error_text(record: &BTreeMap<String, String>) -> Option<String> {
    record
        .get("error")
        .or_else(|| record.get("error.message"))
        .cloned()
}

fn track_hook(
    executions: &mut Vec<HookExecution>,
    index: &mut HashMap<(String, String), usize>,
    hook_name: &str,
    level: &str,
    record: &BTreeMap<String, String>,
) {
    let pod = record.get("pod").cloned().unwrap_or_default();
    let key = (hook_name.to_string(), pod.clone());

    let position = *index.entry(key).or_insert_with(|| {
        let (namespace, pod_name) = split_pod(&pod);
        executions.push(HookExecution {
            name: hook_name.to_string(),
            namespace,
            pod_name,
            container_name: None,
            phase: None,
            command: None,
            started: record.get("time").map(String::as_str).and_then(parse_time),
            failed: false,
            error: None,
        });
        executions.len() - 1
    });

    let execution = &mut executions[position];
    if execution.container_name.is_none() {
        execution.container_name = record.get("hookContainer").cloned();
    }
    if execution.phase.is_none() {
        execution.phase = record.get("hookPhase").cloned();
    }
    if execution.command.is_none() {
        execution.command = record.get("hookCommand").cloned();
    }
    if level == "error" {
        execution.failed = true;
        execution.error = error_text(record).or_else(|| record.get("msg").cloned());
    }
}

/// `namespace/name` into its parts; a bare name has no namespace.
fn split_pod(pod: &str) -> (Option<String>, Option<String>) {
    match pod.split_once('/') {
        Some((namespace, name)) => (Some(namespace.to_string()), Some(name.to_string())),
        None if pod.is_empty() => (None, None),
        None => (None, Some(pod.to_string())),
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Split one logfmt line into key/value pairs. Values may be double-quoted
/// with backslash escapes; a bare key has an empty value.
fn parse_record(line: &str) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }

        let mut value = String::new();
        if chars.next_if_eq(&'=').is_some() {
            if chars.next_if_eq(&'"').is_some() {
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => value.push(other),
                            None => break,
                        },
                        c => value.push(c),
                    }
                }
            } else {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
        }

        if !key.is_empty() {
            record.insert(key, value);
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGS: &str = r#"time="2024-01-02T03:04:05Z" level=info msg="Setting up backup log" backup=velero/b1
time="2024-01-02T03:04:06Z" level=info msg="running exec hook" backup=velero/b1 hookCommand="[/bin/sh -c pg_dump]" hookContainer=db hookName=dump hookPhase=pre pod=app/db-0
time="2024-01-02T03:04:07Z" level=error msg="Error executing hook" backup=velero/b1 error="command terminated with exit code 1" hookName=dump pod=app/db-0
time="2024-01-02T03:04:08Z" level=warning msg="Skipping volume" backup=velero/b1 namespace=app
time="2024-01-02T03:04:09Z" level=error msg="Error backing up item" backup=velero/b1 error="pods \"web\" not found" pod=app/web
not a logfmt line at all
"#;

    #[test]
    fn test_parse_record_handles_quotes_and_escapes() {
        let record = parse_record(r#"level=error msg="a \"quoted\" word" flag error.message=x"#);
        assert_eq!(record["level"], "error");
        assert_eq!(record["msg"], "a \"quoted\" word");
        assert_eq!(record["flag"], "");
        assert_eq!(record["error.message"], "x");
    }

    #[test]
    fn test_errors_and_warnings() {
        let parsed = LogfmtBackupLogParser.parse(LOGS.as_bytes()).unwrap();

        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[1].title, "Error backing up item");
        assert_eq!(parsed.errors[1].message, "pods \"web\" not found");
        assert_eq!(parsed.errors[1].namespace.as_deref(), Some("app"));

        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].message, "Skipping volume");
        assert_eq!(parsed.warnings[0].namespace.as_deref(), Some("app"));
    }

    #[test]
    fn test_hook_executions_are_folded() {
        let parsed = LogfmtBackupLogParser.parse(LOGS.as_bytes()).unwrap();

        assert_eq!(parsed.hook_executions.len(), 1);
        let hook = &parsed.hook_executions[0];
        assert_eq!(hook.name, "dump");
        assert_eq!(hook.namespace.as_deref(), Some("app"));
        assert_eq!(hook.pod_name.as_deref(), Some("db-0"));
        assert_eq!(hook.container_name.as_deref(), Some("db"));
        assert_eq!(hook.phase.as_deref(), Some("pre"));
        assert_eq!(hook.command.as_deref(), Some("[/bin/sh -c pg_dump]"));
        assert!(hook.failed);
        assert_eq!(hook.error.as_deref(), Some("command terminated with exit code 1"));
        assert!(hook.started.is_some());
    }

    #[test]
    fn test_empty_input() {
        let parsed = LogfmtBackupLogParser.parse(b"").unwrap();
        assert_eq!(parsed, ParsedBackupLogs::default());
    }
}
