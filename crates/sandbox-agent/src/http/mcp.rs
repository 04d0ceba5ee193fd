//! MCP facade — JSON-RPC tools over streaming HTTP at `POST /mcp`.
//!
//! The envelope is dispatched by hand rather than through a generic
//! session-managed transport: the tool set is small and fixed, and a
//! hand-rolled dispatcher guarantees the exact status codes required for
//! `GET`/`DELETE /mcp` (405 with a JSON-RPC `-32000` body) without depending
//! on a transport layer's own connection-lifecycle opinions. One request is
//! one call: no session state survives it.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sandbox_common::{ExecuteResult, Lang};
use sandbox_fs::ops;
use serde::Deserialize;
use serde_json::{json, Value};

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;
const METHOD_NOT_ALLOWED: i64 = -32000;

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message.into()},
    })
}

fn rpc_result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn tool_text_result(payload: &Value, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": payload.to_string()}],
        "isError": is_error,
    })
}

const TOOLS: &[(&str, &str)] = &[
    ("execute", "Run a shell command or source code inside the sandbox"),
    ("write-file", "Write a file under the sandbox root"),
    ("read-file", "Read a file under the sandbox root"),
    ("list-files", "List a directory under the sandbox root"),
];

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = TOOLS
        .iter()
        .map(|(name, description)| {
            json!({
                "name": name,
                "description": description,
                "inputSchema": {"type": "object"},
            })
        })
        .collect();
    json!({"tools": tools})
}

/// `GET`/`DELETE /mcp` — the transport supports neither.
pub async fn method_not_allowed() -> Response {
    let body = rpc_error(Value::Null, METHOD_NOT_ALLOWED, "method not allowed");
    (StatusCode::METHOD_NOT_ALLOWED, Json(body)).into_response()
}

/// `POST /mcp` — dispatch a single JSON-RPC request.
pub async fn handle(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::OK,
                Json(rpc_error(Value::Null, PARSE_ERROR, format!("invalid JSON-RPC request: {e}"))),
            )
                .into_response();
        }
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    let response = match method {
        "tools/list" => rpc_result(id, tools_list_payload()),
        "tools/call" => match dispatch_tool_call(&state, params).await {
            Ok(result) => rpc_result(id, result),
            Err(e) => rpc_error(id, INTERNAL_ERROR, e.to_string()),
        },
        other => rpc_error(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    };

    (StatusCode::OK, Json(response)).into_response()
}

async fn dispatch_tool_call(state: &AppState, params: Value) -> anyhow::Result<Value> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing tool name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let result = match name {
        "execute" => call_execute(state, arguments).await,
        "write-file" => call_write_file(state, arguments).await,
        "read-file" => call_read_file(state, arguments).await,
        "list-files" => call_list_files(state, arguments).await,
        other => return Ok(tool_text_result(&json!({"error": format!("unknown tool: {other}")}), true)),
    };
    Ok(result)
}

#[derive(Deserialize)]
struct ExecuteArgs {
    command: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default, rename = "timeoutSecs")]
    timeout_secs: Option<u32>,
}

async fn call_execute(state: &AppState, arguments: Value) -> Value {
    let args: ExecuteArgs = match serde_json::from_value(arguments) {
        Ok(a) => a,
        Err(e) => return tool_text_result(&json!({"error": format!("invalid arguments: {e}")}), true),
    };
    if args.command.trim().is_empty() {
        return tool_text_result(&json!({"error": "command must not be empty"}), true);
    }
    let Some(lang) = Lang::parse_or_default(args.language.as_deref()) else {
        return tool_text_result(
            &json!({"error": format!("unrecognized language: {}", args.language.unwrap_or_default())}),
            true,
        );
    };
    let timeout = args.timeout_secs.map(|s| std::time::Duration::from_secs(s as u64));

    let result: anyhow::Result<ExecuteResult> = if lang.is_code() {
        let resolver = state.resolver.clone();
        state
            .executor
            .execute(&args.command, lang, timeout, args.cwd.as_deref(), |raw| {
                resolver.resolve_existing(raw)
            })
            .await
    } else {
        run_shell(state, &args, lang, timeout).await
    };

    match result {
        Ok(result) => {
            let payload = json!(result);
            tool_text_result(&payload, !result.is_success())
        }
        Err(e) => tool_text_result(&json!({"error": e.to_string()}), true),
    }
}

async fn run_shell(
    state: &AppState,
    args: &ExecuteArgs,
    lang: Lang,
    timeout: Option<std::time::Duration>,
) -> anyhow::Result<ExecuteResult> {
    let cwd = match &args.cwd {
        Some(raw) => match state.resolver.resolve_existing(raw) {
            Ok(p) => p,
            Err(_) => {
                return Ok(ExecuteResult {
                    stdout: String::new(),
                    stderr: "cwd escapes the sandbox root".to_string(),
                    exit_code: 1,
                    language: lang,
                })
            }
        },
        None => state.resolver.root().to_path_buf(),
    };
    let runner = sandbox_exec::ProcessRunner::new(state.resolver.root());
    let outcome = runner.run(&args.command, Some(&cwd), timeout).await?;
    Ok(ExecuteResult {
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        exit_code: outcome.exit_code,
        language: lang,
    })
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
    #[serde(default)]
    mode: Option<u32>,
}

async fn call_write_file(state: &AppState, arguments: Value) -> Value {
    let args: WriteFileArgs = match serde_json::from_value(arguments) {
        Ok(a) => a,
        Err(e) => return tool_text_result(&json!({"error": format!("invalid arguments: {e}")}), true),
    };
    let resolved = match state.resolver.resolve(&args.path) {
        Ok(p) => p,
        Err(e) => return tool_text_result(&json!({"error": e.to_string()}), true),
    };
    match ops::write_text(&resolved, &args.content, args.mode).await {
        Ok(size) => tool_text_result(
            &json!({"success": true, "path": resolved.display().to_string(), "size": size}),
            false,
        ),
        Err(e) => tool_text_result(&json!({"error": e.to_string()}), true),
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

async fn call_read_file(state: &AppState, arguments: Value) -> Value {
    let args: ReadFileArgs = match serde_json::from_value(arguments) {
        Ok(a) => a,
        Err(e) => return tool_text_result(&json!({"error": format!("invalid arguments: {e}")}), true),
    };
    let resolved = match state.resolver.resolve_existing(&args.path) {
        Ok(p) => p,
        Err(e) => return tool_text_result(&json!({"error": e.to_string()}), true),
    };
    match ops::read_text(&resolved).await {
        Ok(content) => tool_text_result(&json!({"path": resolved.display().to_string(), "content": content}), false),
        Err(e) => tool_text_result(&json!({"error": e.to_string()}), true),
    }
}

#[derive(Deserialize, Default)]
struct ListFilesArgs {
    #[serde(default)]
    path: Option<String>,
}

async fn call_list_files(state: &AppState, arguments: Value) -> Value {
    let args: ListFilesArgs = if arguments.is_null() {
        ListFilesArgs::default()
    } else {
        match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return tool_text_result(&json!({"error": format!("invalid arguments: {e}")}), true),
        }
    };
    let raw_path = args.path.unwrap_or_default();
    let resolved = match state.resolver.resolve_existing(&raw_path) {
        Ok(p) => p,
        Err(e) => return tool_text_result(&json!({"error": e.to_string()}), true),
    };
    match ops::list_detailed(&resolved).await {
        Ok(listing) => tool_text_result(&json!(listing), false),
        Err(e) => tool_text_result(&json!({"error": e.to_string()}), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_list_payload_names_all_four_tools() {
        let payload = tools_list_payload();
        let names: Vec<&str> = payload["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["execute", "write-file", "read-file", "list-files"]);
    }

    #[test]
    fn rpc_error_shapes_json_rpc_envelope() {
        let err = rpc_error(json!(1), METHOD_NOT_ALLOWED, "nope");
        assert_eq!(err["jsonrpc"], "2.0");
        assert_eq!(err["error"]["code"], -32000);
    }
}
