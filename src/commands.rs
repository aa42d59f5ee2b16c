//! Command names the host understands, the hosted wire envelope, and the
//! record types most callers decode results into.
//!
//! Argument and result payloads are otherwise opaque to the bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BridgeError;

pub const LIST_REPOS: &str = "list_repos";
pub const ADD_REPO: &str = "add_repo";
pub const CLONE_REPO: &str = "clone_repo";
pub const REMOVE_REPO: &str = "remove_repo";
pub const OPEN_IN_CURSOR: &str = "open_in_cursor";
pub const OPEN_IN_FILE_MANAGER: &str = "open_in_file_manager";
pub const GET_REMOTE_URL: &str = "get_remote_url";
pub const GET_CURRENT_BRANCH: &str = "get_current_branch";
pub const LIST_LOCAL_BRANCHES: &str = "list_local_branches";
pub const GET_REPO_WORKING_TREE_STATUS: &str = "get_repo_working_tree_status";
pub const SWITCH_BRANCH: &str = "switch_branch";
pub const CREATE_LOCAL_BRANCH: &str = "create_local_branch";
pub const DELETE_LOCAL_BRANCH: &str = "delete_local_branch";
pub const GET_REPO_SYNC_STATUS: &str = "get_repo_sync_status";
pub const PULL_REPO: &str = "pull_repo";
pub const LIST_GIT_HISTORY: &str = "list_git_history";
pub const GET_COMMIT_CHANGES: &str = "get_commit_changes";
pub const LIST_AGENTS: &str = "list_agents";
pub const CREATE_AGENT: &str = "create_agent";
pub const DELETE_AGENT: &str = "delete_agent";
pub const RENAME_AGENT: &str = "rename_agent";
pub const RUN_REPO_AGENT: &str = "run_repo_agent";
pub const STOP_REPO_AGENT: &str = "stop_repo_agent";
pub const LIST_GROUPS: &str = "list_groups";
pub const CREATE_GROUP: &str = "create_group";
pub const RENAME_GROUP: &str = "rename_group";
pub const DELETE_GROUP: &str = "delete_group";
pub const MOVE_REPO_TO_GROUP: &str = "move_repo_to_group";

pub const ALL_COMMANDS: &[&str] = &[
    LIST_REPOS,
    ADD_REPO,
    CLONE_REPO,
    REMOVE_REPO,
    OPEN_IN_CURSOR,
    OPEN_IN_FILE_MANAGER,
    GET_REMOTE_URL,
    GET_CURRENT_BRANCH,
    LIST_LOCAL_BRANCHES,
    GET_REPO_WORKING_TREE_STATUS,
    SWITCH_BRANCH,
    CREATE_LOCAL_BRANCH,
    DELETE_LOCAL_BRANCH,
    GET_REPO_SYNC_STATUS,
    PULL_REPO,
    LIST_GIT_HISTORY,
    GET_COMMIT_CHANGES,
    LIST_AGENTS,
    CREATE_AGENT,
    DELETE_AGENT,
    RENAME_AGENT,
    RUN_REPO_AGENT,
    STOP_REPO_AGENT,
    LIST_GROUPS,
    CREATE_GROUP,
    RENAME_GROUP,
    DELETE_GROUP,
    MOVE_REPO_TO_GROUP,
];

/// Body of `POST /api/invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub command: String,
    pub args: Value,
}

impl CommandInvocation {
    /// `null` arguments are sent as an empty object.
    pub fn new(command: impl Into<String>, args: Value) -> Self {
        let args = if args.is_null() {
            Value::Object(Map::new())
        } else {
            args
        };
        Self {
            command: command.into(),
            args,
        }
    }
}

/// Envelope of every 2xx `/api/invoke` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InvokeResponse {
    pub fn into_result(self, command: &str) -> Result<Value, BridgeError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        let message = self
            .error
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| format!("Command failed: {command}"));
        Err(BridgeError::Command(message))
    }
}

/// Embedded hosts only accept a flat key/value mapping; anything else is
/// passed as absent.
pub fn embedded_args(args: Value) -> Option<Map<String, Value>> {
    match args {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub group_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub sort_order: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub repo_id: i64,
    pub name: String,
    pub created_at: String,
}
