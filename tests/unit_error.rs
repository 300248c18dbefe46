use std::path::PathBuf;

use taskzen::error::{exit_codes, Error, JsonError};

#[test]
fn exit_codes_map_correctly() {
    let user = Error::InvalidArgument("bad".to_string());
    assert_eq!(user.exit_code(), exit_codes::USER_ERROR);

    let auth = Error::Auth("provider rejected the token".to_string());
    assert_eq!(auth.exit_code(), exit_codes::AUTH_FAILED);

    let op = Error::LockFailed(PathBuf::from("tasks.json.lock"));
    assert_eq!(op.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn json_error_includes_code_and_kind() {
    let err = Error::TaskNotFound("a1b2".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert_eq!(json.kind, "user_error");
    assert!(json.message.contains("Task not found"));
}

#[test]
fn json_error_kind_tracks_exit_code() {
    assert_eq!(JsonError::from(&Error::NotSignedIn).kind, "user_error");
    assert_eq!(
        JsonError::from(&Error::Auth("no token".to_string())).kind,
        "auth_failed"
    );
    assert_eq!(
        JsonError::from(&Error::Persistence("backend unreachable".to_string())).kind,
        "operation_failed"
    );
}

#[test]
fn json_error_carries_subtask_details() {
    let err = Error::SubtaskNotFound {
        task: "a1b2".to_string(),
        subtask: "3".to_string(),
    };
    let body = serde_json::to_value(JsonError::from(&err)).expect("serialize");
    assert_eq!(body["details"]["task"], "a1b2");
    assert_eq!(body["details"]["subtask"], "3");
}

#[test]
fn json_error_omits_empty_details() {
    let err = Error::NotSignedIn;
    let body = serde_json::to_value(JsonError::from(&err)).expect("serialize");
    assert!(body.get("details").is_none());
}
