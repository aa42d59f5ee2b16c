//! Push stream bodies as the host writes them.

/// One `repo-agent-stdout` line from agent 7.
pub const AGENT_STDOUT: &str =
    "event: repo-agent-stdout\ndata: {\"runId\":\"r1\",\"agentId\":7,\"line\":\"hello\"}\n\n";

/// A run that prints two lines and finishes.
pub const AGENT_RUN: &str = concat!(
    ": keep-alive\n\n",
    "event: repo-agent-stdout\n",
    "data: {\"runId\":\"r2\",\"agentId\":1,\"line\":\"cloning\"}\n\n",
    "event: repo-agent-stderr\n",
    "data: {\"runId\":\"r2\",\"agentId\":1,\"line\":\"warning: shallow\"}\n\n",
    "event: repo-agent-done\n",
    "data: {\"runId\":\"r2\",\"agentId\":1,\"success\":true}\n\n",
);

/// `data:` that is not JSON.
pub const MALFORMED: &str = "event: repo-agent-stdout\ndata: plain text, not json {\n\n";

/// Build one SSE message.
pub fn message(event: &str, id: Option<&str>, data: &str) -> String {
    let mut out = format!("event: {event}\n");
    if let Some(id) = id {
        out.push_str(&format!("id: {id}\n"));
    }
    for line in data.lines() {
        out.push_str(&format!("data: {line}\n"));
    }
    out.push('\n');
    out
}
