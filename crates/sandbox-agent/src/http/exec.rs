//! `POST /exec` — process execution over HTTP.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use sandbox_common::{ExecuteRequest, ExecuteResult, Lang, SandboxError};
use std::time::Duration;

pub async fn exec(State(state): State<AppState>, Json(req): Json<ExecuteRequest>) -> Response {
    if req.command.trim().is_empty() {
        return SandboxError::validation("command must not be empty").into_response();
    }

    let Some(lang) = Lang::parse_or_default(req.language.as_deref()) else {
        return SandboxError::validation(format!(
            "unrecognized language: {}",
            req.language.unwrap_or_default()
        ))
        .into_response();
    };

    let timeout = req.timeout_secs.map(|s| Duration::from_secs(s as u64));

    let result = if lang.is_code() {
        let resolver = state.resolver.clone();
        state
            .executor
            .execute(&req.command, lang, timeout, req.cwd.as_deref(), |raw| {
                resolver.resolve_existing(raw)
            })
            .await
    } else {
        run_shell(&state, &req, lang, timeout).await
    };

    match result {
        Ok(result) if result.is_success() => (StatusCode::OK, Json(result)).into_response(),
        Ok(result) => (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response(),
        Err(e) => SandboxError::internal(e.to_string()).into_response(),
    }
}

async fn run_shell(
    state: &AppState,
    req: &ExecuteRequest,
    lang: Lang,
    timeout: Option<Duration>,
) -> anyhow::Result<ExecuteResult> {
    let cwd = match &req.cwd {
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
    let outcome = runner.run(&req.command, Some(&cwd), timeout).await?;
    Ok(ExecuteResult {
        stdout: outcome.stdout,
        stderr: outcome.stderr,
        exit_code: outcome.exit_code,
        language: lang,
    })
}

#[cfg(test)]
mod tests {
    use crate::config::AgentConfig;
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config(root: &std::path::Path) -> AgentConfig {
        AgentConfig {
            port: 0,
            public_url: None,
            local_mode: true,
            root: root.to_path_buf(),
            idle_timeout_secs: 0,
            pty_port: 0,
            kv_base_url: None,
            init_script: String::new(),
            node_dependencies: Default::default(),
            python_requirements: String::new(),
        }
    }

    fn test_router() -> (tempfile::TempDir, axum::Router) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(test_config(dir.path())).unwrap();
        (dir, crate::http::build(state))
    }

    async fn exec_request(router: axum::Router, body: serde_json::Value) -> axum::response::Response {
        let req = Request::builder()
            .method("POST")
            .uri("/exec")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        router.oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn successful_shell_command_is_200() {
        let (_dir, router) = test_router();
        let response = exec_request(router, serde_json::json!({"command": "echo hi"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["exitCode"], 0);
        assert_eq!(result["stdout"], "hi\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_500() {
        let (_dir, router) = test_router();
        let response = exec_request(router, serde_json::json!({"command": "exit 3"})).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["exitCode"], 3);
    }

    #[tokio::test]
    async fn empty_command_is_400() {
        let (_dir, router) = test_router();
        let response = exec_request(router, serde_json::json!({"command": "   "})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unrecognized_language_is_400() {
        let (_dir, router) = test_router();
        let response = exec_request(
            router,
            serde_json::json!({"command": "1+1", "language": "cobol"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
