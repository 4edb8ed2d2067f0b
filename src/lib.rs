use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::thread;
use tauri::{AppHandle, Emitter, Manager, State};
use uuid::Uuid;

mod bridge;
mod credentials;
mod logging;
mod os_probe;
mod svn;

use os_probe::OsKind;

#[derive(Default)]
struct BridgeState {
    context: Mutex<bridge::WorkingCopyContext>,
    path_events: Mutex<Option<mpsc::Sender<serde_json::Value>>>,
}

#[derive(Default)]
struct OsProbeState {
    cached: Mutex<Option<OsKind>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeEntry {
    path: String,
    add: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitPayload {
    path: String,
    message: String,
    #[serde(default)]
    changes: Vec<ChangeEntry>,
    username: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetsPayload {
    path: String,
    #[serde(default)]
    targets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutPayload {
    url: String,
    path: String,
    username: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogPayload {
    path: String,
    username: String,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSavePayload {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthUserPayload {
    username: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SvnDispatchResponse {
    request_id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_epoch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkingCopyContextResponse {
    request_id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    epoch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SvnAuthResponse {
    request_id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdate {
    request_id: String,
    ok: bool,
    rows: Vec<svn::StatusRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogUpdate {
    request_id: String,
    ok: bool,
    entries: Vec<svn::LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Clone)]
enum SvnIntent {
    Status {
        path: String,
    },
    Commit {
        path: String,
        message: String,
        changes: Vec<ChangeEntry>,
        username: String,
        password: Option<String>,
    },
    Add {
        path: String,
        targets: Vec<String>,
    },
    Remove {
        path: String,
        targets: Vec<String>,
    },
    Checkout {
        url: String,
        path: String,
        username: String,
        password: Option<String>,
    },
    Revert {
        path: String,
        targets: Vec<String>,
    },
    Log {
        path: String,
        username: String,
        password: Option<String>,
    },
    SetPath,
}

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

fn dispatch_rejected(request_id: String, error: String) -> SvnDispatchResponse {
    SvnDispatchResponse {
        request_id,
        ok: false,
        intent_epoch: None,
        error: Some(error),
    }
}

fn intent_needs_os_kind(intent: &SvnIntent) -> bool {
    matches!(
        intent,
        SvnIntent::Commit { .. } | SvnIntent::Checkout { .. } | SvnIntent::Log { .. }
    )
}

fn path_change_listener_ready(state: &BridgeState) -> bool {
    state
        .path_events
        .lock()
        .map(|sender| sender.is_some())
        .unwrap_or(false)
}

fn clone_path_change_sender(state: &BridgeState) -> Option<mpsc::Sender<serde_json::Value>> {
    state
        .path_events
        .lock()
        .ok()
        .and_then(|sender| sender.clone())
}

fn dispatch_intent(
    app: &AppHandle,
    state: &BridgeState,
    probe: &OsProbeState,
    request_id: String,
    intent: SvnIntent,
) -> SvnDispatchResponse {
    if !path_change_listener_ready(state) {
        return dispatch_rejected(
            request_id,
            "Path change listener is not established; the bridge is not ready.".to_string(),
        );
    }

    let os = if intent_needs_os_kind(&intent) {
        match os_probe::resolve_os_kind(&probe.cached) {
            Ok(kind) => Some(kind),
            Err(error) => return dispatch_rejected(request_id, error),
        }
    } else {
        None
    };

    let intent_epoch = match state.context.lock() {
        Ok(context) => context.epoch,
        Err(error) => {
            return dispatch_rejected(
                request_id,
                format!("Failed to acquire working copy context lock: {error}"),
            )
        }
    };

    if matches!(intent, SvnIntent::SetPath) {
        let Some(sender) = clone_path_change_sender(state) else {
            return dispatch_rejected(
                request_id,
                "Path change listener is not established; the bridge is not ready.".to_string(),
            );
        };
        spawn_set_path_worker(app.clone(), sender, request_id.clone());
        return SvnDispatchResponse {
            request_id,
            ok: true,
            intent_epoch: Some(intent_epoch),
            error: None,
        };
    }

    let app_handle = app.clone();
    let worker_request_id = request_id.clone();
    thread::spawn(move || {
        let outcome = execute_intent(&app_handle, &intent, os, &worker_request_id, intent_epoch);
        deliver_outcome(&app_handle, outcome);
    });

    SvnDispatchResponse {
        request_id,
        ok: true,
        intent_epoch: Some(intent_epoch),
        error: None,
    }
}

fn run_logged(app: &AppHandle, cwd: &Path, args: &[String], stdin: Option<&str>) -> svn::SvnCapture {
    let capture = svn::run_svn(cwd, args, stdin);
    logging::log_command(app, cwd, &svn::display_command(args), &capture);
    capture
}

fn resolve_password(username: &str, password: Option<&str>) -> Result<String, String> {
    if let Some(password) = password {
        if password.is_empty() {
            return Err("password must be a non-empty string.".to_string());
        }
        return Ok(password.to_string());
    }

    match credentials::read_password(username)? {
        Some(password) => Ok(password),
        None => Err(format!(
            "No saved password for \"{username}\"; pass one or store it with svn_auth_save."
        )),
    }
}

fn failed_outcome(
    intent: &SvnIntent,
    request_id: &str,
    intent_epoch: u64,
    error: String,
) -> bridge::CommandOutcome {
    let payload = match intent {
        SvnIntent::Status { .. }
        | SvnIntent::Commit { .. }
        | SvnIntent::Checkout { .. }
        | SvnIntent::Revert { .. } => bridge::OutcomePayload::Status(Vec::new()),
        SvnIntent::Log { .. } => bridge::OutcomePayload::Log(Vec::new()),
        SvnIntent::Add { .. } | SvnIntent::Remove { .. } | SvnIntent::SetPath => {
            bridge::OutcomePayload::Silent
        }
    };

    bridge::CommandOutcome {
        request_id: request_id.to_string(),
        intent_epoch,
        ok: false,
        payload,
        error: Some(error),
    }
}

fn refreshed_status_outcome(
    app: &AppHandle,
    cwd: &Path,
    request_id: &str,
    intent_epoch: u64,
) -> bridge::CommandOutcome {
    let capture = run_logged(app, cwd, &svn::status_args(), None);
    if let Some(error) = capture.failure_message() {
        return bridge::CommandOutcome {
            request_id: request_id.to_string(),
            intent_epoch,
            ok: false,
            payload: bridge::OutcomePayload::Status(Vec::new()),
            error: Some(error),
        };
    }

    bridge::CommandOutcome {
        request_id: request_id.to_string(),
        intent_epoch,
        ok: true,
        payload: bridge::OutcomePayload::Status(svn::parse_status_rows(&capture.stdout, cwd)),
        error: None,
    }
}

fn silent_success(request_id: &str, intent_epoch: u64) -> bridge::CommandOutcome {
    bridge::CommandOutcome {
        request_id: request_id.to_string(),
        intent_epoch,
        ok: true,
        payload: bridge::OutcomePayload::Silent,
        error: None,
    }
}

fn execute_intent(
    app: &AppHandle,
    intent: &SvnIntent,
    os: Option<OsKind>,
    request_id: &str,
    intent_epoch: u64,
) -> bridge::CommandOutcome {
    match intent {
        SvnIntent::Status { path } => {
            refreshed_status_outcome(app, &PathBuf::from(path), request_id, intent_epoch)
        }
        SvnIntent::Commit {
            path,
            message,
            changes,
            username,
            password,
        } => {
            let cwd = PathBuf::from(path);
            let secret = match resolve_password(username, password.as_deref()) {
                Ok(secret) => secret,
                Err(error) => return failed_outcome(intent, request_id, intent_epoch, error),
            };
            let Some(os) = os else {
                return failed_outcome(
                    intent,
                    request_id,
                    intent_epoch,
                    "Host OS kind was not resolved before commit.".to_string(),
                );
            };

            let adds = changes
                .iter()
                .filter(|change| change.add)
                .map(|change| change.path.clone())
                .collect::<Vec<_>>();
            if !adds.is_empty() {
                // A failed add is logged but does not abort the commit.
                let _ = run_logged(app, &cwd, &svn::add_args(&adds), None);
            }

            let deletes = changes
                .iter()
                .filter(|change| !change.add)
                .map(|change| change.path.clone())
                .collect::<Vec<_>>();
            if !deletes.is_empty() {
                let _ = run_logged(app, &cwd, &svn::remove_args(&deletes), None);
            }

            let targets = changes
                .iter()
                .map(|change| change.path.clone())
                .collect::<Vec<_>>();
            let capture = run_logged(
                app,
                &cwd,
                &svn::commit_args(message, username, &targets),
                Some(&format!("{secret}{}", os.line_ending())),
            );
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }

            refreshed_status_outcome(app, &cwd, request_id, intent_epoch)
        }
        SvnIntent::Add { path, targets } => {
            let cwd = PathBuf::from(path);
            let capture = run_logged(app, &cwd, &svn::add_args(targets), None);
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }
            silent_success(request_id, intent_epoch)
        }
        SvnIntent::Remove { path, targets } => {
            let cwd = PathBuf::from(path);
            let capture = run_logged(app, &cwd, &svn::remove_args(targets), None);
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }
            silent_success(request_id, intent_epoch)
        }
        SvnIntent::Checkout {
            url,
            path,
            username,
            password,
        } => {
            let cwd = PathBuf::from(path);
            let secret = match resolve_password(username, password.as_deref()) {
                Ok(secret) => secret,
                Err(error) => return failed_outcome(intent, request_id, intent_epoch, error),
            };
            let Some(os) = os else {
                return failed_outcome(
                    intent,
                    request_id,
                    intent_epoch,
                    "Host OS kind was not resolved before checkout.".to_string(),
                );
            };

            let capture = run_logged(
                app,
                &cwd,
                &svn::checkout_args(url, username),
                Some(&format!("{secret}{}", os.line_ending())),
            );
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }

            refreshed_status_outcome(app, &cwd, request_id, intent_epoch)
        }
        SvnIntent::Revert { path, targets } => {
            let cwd = PathBuf::from(path);
            let capture = run_logged(app, &cwd, &svn::revert_args(targets), None);
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }
            refreshed_status_outcome(app, &cwd, request_id, intent_epoch)
        }
        SvnIntent::Log {
            path,
            username,
            password,
        } => {
            let cwd = PathBuf::from(path);
            let secret = match resolve_password(username, password.as_deref()) {
                Ok(secret) => secret,
                Err(error) => return failed_outcome(intent, request_id, intent_epoch, error),
            };
            let Some(os) = os else {
                return failed_outcome(
                    intent,
                    request_id,
                    intent_epoch,
                    "Host OS kind was not resolved before log.".to_string(),
                );
            };

            let capture = run_logged(
                app,
                &cwd,
                &svn::log_args(username),
                Some(&format!("{secret}{}", os.line_ending())),
            );
            if let Some(error) = capture.failure_message() {
                return failed_outcome(intent, request_id, intent_epoch, error);
            }

            match svn::parse_log_entries(&capture.stdout) {
                Ok(entries) => bridge::CommandOutcome {
                    request_id: request_id.to_string(),
                    intent_epoch,
                    ok: true,
                    payload: bridge::OutcomePayload::Log(entries),
                    error: None,
                },
                Err(error) => failed_outcome(intent, request_id, intent_epoch, error),
            }
        }
        SvnIntent::SetPath => failed_outcome(
            intent,
            request_id,
            intent_epoch,
            "set_path does not produce a command outcome.".to_string(),
        ),
    }
}

fn deliver_outcome(app: &AppHandle, outcome: bridge::CommandOutcome) {
    let state = app.state::<BridgeState>();
    let context = match state.context.lock() {
        Ok(context) => context,
        Err(error) => {
            logging::log_line(
                app,
                &format!(
                    "failed to acquire context lock for outcome {}: {error}",
                    outcome.request_id
                ),
            );
            return;
        }
    };

    // The gate decision and the emit happen under the context lock, so a
    // concurrent path change can never interleave between them.
    match bridge::gate_outcome(&context, outcome.intent_epoch) {
        bridge::OutcomeGate::Forward => emit_outcome(app, &outcome),
        bridge::OutcomeGate::DiscardStale => logging::log_line(
            app,
            &format!(
                "discarded stale outcome {} (intent epoch {}, context epoch {})",
                outcome.request_id, outcome.intent_epoch, context.epoch
            ),
        ),
        bridge::OutcomeGate::AheadOfContext => logging::log_line(
            app,
            &format!(
                "internal consistency violation: outcome {} stamped ahead of context (intent epoch {}, context epoch {})",
                outcome.request_id, outcome.intent_epoch, context.epoch
            ),
        ),
    }
}

fn emit_outcome(app: &AppHandle, outcome: &bridge::CommandOutcome) {
    match &outcome.payload {
        bridge::OutcomePayload::Status(rows) => {
            let _ = app.emit(
                "update-status",
                StatusUpdate {
                    request_id: outcome.request_id.clone(),
                    ok: outcome.ok,
                    rows: rows.clone(),
                    error: outcome.error.clone(),
                },
            );
        }
        bridge::OutcomePayload::Log(entries) => {
            let _ = app.emit(
                "update-log",
                LogUpdate {
                    request_id: outcome.request_id.clone(),
                    ok: outcome.ok,
                    entries: entries.clone(),
                    error: outcome.error.clone(),
                },
            );
        }
        bridge::OutcomePayload::Silent => {
            if let Some(error) = &outcome.error {
                logging::log_line(
                    app,
                    &format!("command {} failed: {error}", outcome.request_id),
                );
            }
        }
    }
}

fn apply_path_change_event(app: &AppHandle, event: bridge::PathChangeEvent) {
    let state = app.state::<BridgeState>();
    let mut context = match state.context.lock() {
        Ok(context) => context,
        Err(error) => {
            logging::log_line(
                app,
                &format!("failed to acquire context lock for path change: {error}"),
            );
            return;
        }
    };

    let epoch = bridge::apply_path_change(&mut context, event);

    // Path changes define the new truth; they are forwarded unconditionally.
    let _ = app.emit(
        "update-path",
        serde_json::json!({ "path": context.path, "epoch": epoch }),
    );
    let _ = app.emit("update-repo", serde_json::json!({ "repo": context.repo }));
}

fn establish_path_change_listener(app: &AppHandle) -> Result<(), String> {
    let (sender, receiver) = mpsc::channel::<serde_json::Value>();
    let app_handle = app.clone();

    thread::Builder::new()
        .name("path-change-listener".to_string())
        .spawn(move || {
            while let Ok(raw) = receiver.recv() {
                match bridge::normalize_path_change(&raw) {
                    Ok(event) => apply_path_change_event(&app_handle, event),
                    Err(error) => logging::log_line(
                        &app_handle,
                        &format!("dropped malformed path change event: {error}"),
                    ),
                }
            }
        })
        .map_err(|error| format!("Failed to establish path change listener: {error}"))?;

    let state = app.state::<BridgeState>();
    let mut path_events = state
        .path_events
        .lock()
        .map_err(|error| format!("Failed to store path change sender: {error}"))?;
    *path_events = Some(sender);

    Ok(())
}

// A cancelled pick yields no payload at all: the context must stay untouched.
fn set_path_selection(
    picked: Option<PathBuf>,
    repo_lookup: impl FnOnce(&Path) -> Option<String>,
) -> Option<serde_json::Value> {
    let picked = picked?;
    let repo = repo_lookup(&picked);
    Some(serde_json::json!({
        "path": picked.display().to_string(),
        "repo": repo,
    }))
}

fn spawn_set_path_worker(
    app: AppHandle,
    sender: mpsc::Sender<serde_json::Value>,
    request_id: String,
) {
    thread::spawn(move || {
        let picked = rfd::FileDialog::new().pick_folder();
        let payload = set_path_selection(picked, |path| {
            let capture = run_logged(&app, path, &svn::info_args(), None);
            if capture.failure_message().is_none() {
                svn::parse_info_repository_url(&capture.stdout)
            } else {
                None
            }
        });

        let Some(payload) = payload else {
            logging::log_line(
                &app,
                &format!("working copy selection cancelled (request {request_id})"),
            );
            return;
        };

        if sender.send(payload).is_err() {
            logging::log_line(&app, "path change channel is closed; dropping selection.");
        }
    });
}

#[tauri::command]
fn svn_status(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: StatusPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Status {
            path: path.display().to_string(),
        },
    )
}

#[tauri::command]
fn svn_commit(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: CommitPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let message = match svn::validate_commit_message(&payload.message) {
        Ok(message) => message,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    let mut changes = Vec::new();
    for entry in &payload.changes {
        let trimmed = entry.path.trim();
        if trimmed.is_empty() {
            return dispatch_rejected(
                request_id,
                "changes entries must be non-empty strings.".to_string(),
            );
        }
        changes.push(ChangeEntry {
            path: trimmed.to_string(),
            add: entry.add,
        });
    }
    if changes.is_empty() {
        return dispatch_rejected(
            request_id,
            "changes must include at least one entry.".to_string(),
        );
    }

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Commit {
            path: path.display().to_string(),
            message,
            changes,
            username,
            password: payload.password,
        },
    )
}

#[tauri::command]
fn svn_add(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: TargetsPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let targets = match svn::validate_target_paths(&payload.targets) {
        Ok(targets) => targets,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Add {
            path: path.display().to_string(),
            targets,
        },
    )
}

#[tauri::command]
fn svn_remove(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: TargetsPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let targets = match svn::validate_target_paths(&payload.targets) {
        Ok(targets) => targets,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Remove {
            path: path.display().to_string(),
            targets,
        },
    )
}

#[tauri::command]
fn svn_checkout(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: CheckoutPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let url = match svn::validate_checkout_url(&payload.url) {
        Ok(url) => url,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Checkout {
            url,
            path: path.display().to_string(),
            username,
            password: payload.password,
        },
    )
}

#[tauri::command]
fn svn_revert(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: TargetsPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let targets = match svn::validate_target_paths(&payload.targets) {
        Ok(targets) => targets,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Revert {
            path: path.display().to_string(),
            targets,
        },
    )
}

#[tauri::command]
fn svn_log(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
    payload: LogPayload,
) -> SvnDispatchResponse {
    let request_id = request_id();
    let path = match svn::validate_working_copy_path(&payload.path) {
        Ok(path) => path,
        Err(error) => return dispatch_rejected(request_id, error),
    };
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => return dispatch_rejected(request_id, error),
    };

    dispatch_intent(
        &app,
        &state,
        &probe,
        request_id,
        SvnIntent::Log {
            path: path.display().to_string(),
            username,
            password: payload.password,
        },
    )
}

#[tauri::command]
fn set_path(
    app: AppHandle,
    state: State<BridgeState>,
    probe: State<OsProbeState>,
) -> SvnDispatchResponse {
    let request_id = request_id();
    dispatch_intent(&app, &state, &probe, request_id, SvnIntent::SetPath)
}

#[tauri::command]
fn working_copy_get_context(state: State<BridgeState>) -> WorkingCopyContextResponse {
    let request_id = request_id();
    match state.context.lock() {
        Ok(context) => WorkingCopyContextResponse {
            request_id,
            ok: true,
            path: Some(context.path.clone()),
            repo: context.repo.clone(),
            epoch: Some(context.epoch),
            error: None,
        },
        Err(error) => WorkingCopyContextResponse {
            request_id,
            ok: false,
            path: None,
            repo: None,
            epoch: None,
            error: Some(format!("Failed to acquire working copy context lock: {error}")),
        },
    }
}

#[tauri::command]
fn svn_auth_save(payload: AuthSavePayload) -> SvnAuthResponse {
    let request_id = request_id();
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => {
            return SvnAuthResponse {
                request_id,
                ok: false,
                username: None,
                saved: None,
                error: Some(error),
            }
        }
    };

    match credentials::store_password(&username, &payload.password) {
        Ok(()) => SvnAuthResponse {
            request_id,
            ok: true,
            username: Some(username),
            saved: Some(true),
            error: None,
        },
        Err(error) => SvnAuthResponse {
            request_id,
            ok: false,
            username: Some(username),
            saved: None,
            error: Some(error),
        },
    }
}

#[tauri::command]
fn svn_auth_status(payload: AuthUserPayload) -> SvnAuthResponse {
    let request_id = request_id();
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => {
            return SvnAuthResponse {
                request_id,
                ok: false,
                username: None,
                saved: None,
                error: Some(error),
            }
        }
    };

    match credentials::read_password(&username) {
        Ok(saved) => SvnAuthResponse {
            request_id,
            ok: true,
            username: Some(username),
            saved: Some(saved.is_some()),
            error: None,
        },
        Err(error) => SvnAuthResponse {
            request_id,
            ok: false,
            username: Some(username),
            saved: None,
            error: Some(error),
        },
    }
}

#[tauri::command]
fn svn_auth_forget(payload: AuthUserPayload) -> SvnAuthResponse {
    let request_id = request_id();
    let username = match credentials::normalize_username(&payload.username) {
        Ok(username) => username,
        Err(error) => {
            return SvnAuthResponse {
                request_id,
                ok: false,
                username: None,
                saved: None,
                error: Some(error),
            }
        }
    };

    match credentials::delete_password(&username) {
        Ok(()) => SvnAuthResponse {
            request_id,
            ok: true,
            username: Some(username),
            saved: Some(false),
            error: None,
        },
        Err(error) => SvnAuthResponse {
            request_id,
            ok: false,
            username: Some(username),
            saved: None,
            error: Some(error),
        },
    }
}

pub fn run() {
    tauri::Builder::default()
        .manage(BridgeState::default())
        .manage(OsProbeState::default())
        .setup(|app| {
            logging::prepare_log_file(app.handle());
            establish_path_change_listener(app.handle())?;
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            svn_status,
            svn_commit,
            svn_add,
            svn_remove,
            svn_checkout,
            svn_revert,
            svn_log,
            set_path,
            working_copy_get_context,
            svn_auth_save,
            svn_auth_status,
            svn_auth_forget
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_is_not_ready_without_a_listener() {
        let state = BridgeState::default();
        assert!(!path_change_listener_ready(&state));
        assert!(clone_path_change_sender(&state).is_none());
    }

    #[test]
    fn bridge_is_ready_once_the_sender_is_stored() {
        let state = BridgeState::default();
        let (sender, _receiver) = mpsc::channel();
        *state.path_events.lock().unwrap() = Some(sender);
        assert!(path_change_listener_ready(&state));
        assert!(clone_path_change_sender(&state).is_some());
    }

    #[test]
    fn only_credentialed_intents_need_the_os_probe() {
        assert!(!intent_needs_os_kind(&SvnIntent::Status {
            path: "/a".to_string(),
        }));
        assert!(!intent_needs_os_kind(&SvnIntent::SetPath));
        assert!(intent_needs_os_kind(&SvnIntent::Log {
            path: "/a".to_string(),
            username: "alice".to_string(),
            password: None,
        }));
    }

    #[test]
    fn cancelled_folder_pick_produces_no_path_change() {
        let mut lookups = 0u32;
        let payload = set_path_selection(None, |_| {
            lookups += 1;
            None
        });

        assert!(payload.is_none());
        assert_eq!(lookups, 0);
    }

    #[test]
    fn picked_folder_produces_a_normalizable_path_change() {
        let payload = set_path_selection(Some(PathBuf::from("/home/user/project")), |path| {
            assert_eq!(path, Path::new("/home/user/project"));
            Some("https://svn.example.com/trunk".to_string())
        })
        .unwrap();

        let event = bridge::normalize_path_change(&payload).unwrap();
        assert_eq!(event.path, "/home/user/project");
        assert_eq!(event.repo.as_deref(), Some("https://svn.example.com/trunk"));

        let payload = set_path_selection(Some(PathBuf::from("/plain/dir")), |_| None).unwrap();
        let event = bridge::normalize_path_change(&payload).unwrap();
        assert_eq!(event.repo, None);
    }

    #[test]
    fn failed_outcomes_keep_their_result_channel() {
        let status = failed_outcome(
            &SvnIntent::Status {
                path: "/a".to_string(),
            },
            "request",
            0,
            "svn exited with status 1.".to_string(),
        );
        assert!(!status.ok);
        assert!(matches!(
            status.payload,
            bridge::OutcomePayload::Status(ref rows) if rows.is_empty()
        ));

        let add = failed_outcome(
            &SvnIntent::Add {
                path: "/a".to_string(),
                targets: vec!["t".to_string()],
            },
            "request",
            0,
            "svn exited with status 1.".to_string(),
        );
        assert!(matches!(add.payload, bridge::OutcomePayload::Silent));
    }
}
