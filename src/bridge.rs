use serde_json::Value;

use crate::svn::{LogEntry, StatusRow};

#[derive(Debug, Clone, Default)]
pub(crate) struct WorkingCopyContext {
    pub(crate) path: String,
    pub(crate) repo: Option<String>,
    pub(crate) epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathChangeEvent {
    pub(crate) path: String,
    pub(crate) repo: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) enum OutcomePayload {
    Status(Vec<StatusRow>),
    Log(Vec<LogEntry>),
    Silent,
}

#[derive(Debug, Clone)]
pub(crate) struct CommandOutcome {
    pub(crate) request_id: String,
    pub(crate) intent_epoch: u64,
    pub(crate) ok: bool,
    pub(crate) payload: OutcomePayload,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutcomeGate {
    Forward,
    DiscardStale,
    AheadOfContext,
}

pub(crate) fn gate_outcome(context: &WorkingCopyContext, intent_epoch: u64) -> OutcomeGate {
    if intent_epoch == context.epoch {
        OutcomeGate::Forward
    } else if intent_epoch < context.epoch {
        OutcomeGate::DiscardStale
    } else {
        OutcomeGate::AheadOfContext
    }
}

pub(crate) fn apply_path_change(context: &mut WorkingCopyContext, event: PathChangeEvent) -> u64 {
    context.path = event.path;
    context.repo = event.repo;
    context.epoch += 1;
    context.epoch
}

pub(crate) fn normalize_path_change(raw: &Value) -> Result<PathChangeEvent, String> {
    let Some(object) = raw.as_object() else {
        return Err("path change payload must be an object.".to_string());
    };

    let path = match object.get("path") {
        Some(Value::String(path)) => Some(path.as_str()),
        Some(Value::Null) | None => None,
        Some(_) => return Err("path change payload has a non-string path field.".to_string()),
    };

    // Legacy payload shape carried the path in a lone msg field.
    let path = match path {
        Some(path) => path,
        None => match object.get("msg") {
            Some(Value::String(msg)) => msg.as_str(),
            _ => return Err("path change payload carries neither path nor msg.".to_string()),
        },
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("path change payload has an empty path.".to_string());
    }

    let repo = match object.get("repo") {
        Some(Value::String(repo)) => {
            let repo = repo.trim();
            if repo.is_empty() {
                None
            } else {
                Some(repo.to_string())
            }
        }
        _ => None,
    };

    Ok(PathChangeEvent {
        path: trimmed.to_string(),
        repo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_at(path: &str, epoch: u64) -> WorkingCopyContext {
        WorkingCopyContext {
            path: path.to_string(),
            repo: None,
            epoch,
        }
    }

    #[test]
    fn forwards_outcome_stamped_at_current_epoch() {
        let context = context_at("/a", 2);
        assert_eq!(gate_outcome(&context, 2), OutcomeGate::Forward);
    }

    #[test]
    fn discards_outcome_after_path_change() {
        let mut context = context_at("/a", 0);
        let new_epoch = apply_path_change(
            &mut context,
            PathChangeEvent {
                path: "/b".to_string(),
                repo: None,
            },
        );
        assert_eq!(new_epoch, 1);
        assert_eq!(context.path, "/b");
        assert_eq!(gate_outcome(&context, 0), OutcomeGate::DiscardStale);
    }

    #[test]
    fn flags_outcome_ahead_of_context() {
        let context = context_at("/a", 1);
        assert_eq!(gate_outcome(&context, 5), OutcomeGate::AheadOfContext);
    }

    #[test]
    fn duplicate_path_changes_each_bump_the_epoch() {
        let mut context = WorkingCopyContext::default();
        let event = PathChangeEvent {
            path: "/same".to_string(),
            repo: Some("https://svn.example.com/repo".to_string()),
        };

        let mut previous = context.epoch;
        for _ in 0..3 {
            let next = apply_path_change(&mut context, event.clone());
            assert!(next > previous);
            previous = next;
        }
        assert_eq!(context.epoch, 3);
    }

    #[test]
    fn outcome_stamped_before_change_stays_stale_forever() {
        let mut context = context_at("/a", 0);
        apply_path_change(
            &mut context,
            PathChangeEvent {
                path: "/b".to_string(),
                repo: None,
            },
        );
        apply_path_change(
            &mut context,
            PathChangeEvent {
                path: "/a".to_string(),
                repo: None,
            },
        );

        // Returning to the original path is a new context, not the old one.
        assert_eq!(context.path, "/a");
        assert_eq!(gate_outcome(&context, 0), OutcomeGate::DiscardStale);
        assert_eq!(gate_outcome(&context, 2), OutcomeGate::Forward);
    }

    #[test]
    fn normalizes_current_payload_shape() {
        let event = normalize_path_change(&json!({
            "path": "/home/user/project",
            "repo": "https://svn.example.com/trunk"
        }))
        .unwrap();
        assert_eq!(event.path, "/home/user/project");
        assert_eq!(
            event.repo.as_deref(),
            Some("https://svn.example.com/trunk")
        );
    }

    #[test]
    fn normalizes_legacy_msg_payload_shape() {
        let event = normalize_path_change(&json!({ "msg": "/home/user/project" })).unwrap();
        assert_eq!(event.path, "/home/user/project");
        assert_eq!(event.repo, None);
    }

    #[test]
    fn defaults_missing_or_blank_repo_to_none() {
        let event = normalize_path_change(&json!({ "path": "/p", "repo": "  " })).unwrap();
        assert_eq!(event.repo, None);

        let event = normalize_path_change(&json!({ "path": "/p" })).unwrap();
        assert_eq!(event.repo, None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(normalize_path_change(&json!("just a string")).is_err());
        assert!(normalize_path_change(&json!({ "repo": "x" })).is_err());
        assert!(normalize_path_change(&json!({ "path": 42 })).is_err());
        assert!(normalize_path_change(&json!({ "path": "   " })).is_err());
    }
}
