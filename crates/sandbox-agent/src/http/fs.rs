//! Filesystem operations over HTTP: `/fs`, `/fs/`, `/fs/{path}`.
//!
//! Raw-byte bodies in, raw-byte bodies out — this router subtree carries its
//! own 500 MiB body limit (wired in `http::mod`), distinct from the rest of
//! the facade's 50 MiB JSON limit.

use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use sandbox_common::fsmodel::EntryType;
use sandbox_common::SandboxError;
use sandbox_fs::ops;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub struct FsQuery {
    #[serde(default)]
    mkdir: Option<String>,
    #[serde(default)]
    append: Option<String>,
    #[serde(default)]
    download: Option<String>,
    #[serde(default)]
    recursive: Option<String>,
}

impl FsQuery {
    fn truthy(flag: &Option<String>) -> bool {
        matches!(flag.as_deref(), Some("1") | Some("true"))
    }

    fn is_mkdir(&self) -> bool {
        Self::truthy(&self.mkdir)
    }
    fn is_append(&self) -> bool {
        Self::truthy(&self.append)
    }
    fn is_download(&self) -> bool {
        Self::truthy(&self.download)
    }
    fn is_recursive(&self) -> bool {
        Self::truthy(&self.recursive)
    }
}

fn last_modified_header(mtime: Option<chrono::DateTime<chrono::Utc>>) -> Option<String> {
    mtime.map(|t| t.to_rfc2822())
}

/// `GET /fs` and `GET /fs/` — list the sandbox root.
pub async fn get_root(State(state): State<AppState>) -> Response {
    get_path_inner(&state, "", false).await
}

/// `HEAD /fs` and `HEAD /fs/`.
pub async fn head_root(State(state): State<AppState>) -> Response {
    head_path_inner(&state, "").await
}

/// `GET /fs/{path}`.
pub async fn get_path(
    State(state): State<AppState>,
    axum::extract::Path(path): axum::extract::Path<String>,
    Query(query): Query<FsQuery>,
) -> Response {
    get_path_inner(&state, &path, query.is_download()).await
}

/// `HEAD /fs/{path}`.
pub async fn head_path(
    State(state): State<AppState>,
    axum::extract::Path(path): axum::extract::Path<String>,
) -> Response {
    head_path_inner(&state, &path).await
}

async fn get_path_inner(state: &AppState, raw_path: &str, download: bool) -> Response {
    let resolved = match state.resolver.resolve_existing(raw_path) {
        Ok(p) => p,
        Err(e) => return e.into_read_response(),
    };

    let st = ops::stat(&resolved).await;
    if st.entry_type == Some(EntryType::Directory) {
        if download {
            return match ops::zip_directory(&resolved).await {
                Ok(bytes) => {
                    let leaf = ops::leaf_name(&resolved, state.resolver.root());
                    let filename = format!("{leaf}.zip");
                    let filename = if state.resolver.is_root(raw_path) {
                        "sandbox.zip".to_string()
                    } else {
                        filename
                    };
                    let mut headers = HeaderMap::new();
                    headers.insert(header::CONTENT_TYPE, "application/zip".parse().unwrap());
                    headers.insert(
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\"").parse().unwrap(),
                    );
                    (StatusCode::OK, headers, Body::from(bytes)).into_response()
                }
                Err(e) => e.into_response(),
            };
        }
        return match ops::list_detailed(&resolved).await {
            Ok(listing) => (StatusCode::OK, axum::Json(listing)).into_response(),
            Err(e) => e.into_response(),
        };
    }

    match ops::read_binary(&resolved).await {
        Ok(file) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, file.mime_type.parse().unwrap());
            if download {
                let leaf = ops::leaf_name(&resolved, state.resolver.root());
                headers.insert(
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{leaf}\"").parse().unwrap(),
                );
            }
            (StatusCode::OK, headers, Body::from(file.bytes)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn head_path_inner(state: &AppState, raw_path: &str) -> Response {
    let resolved = match state.resolver.resolve_existing(raw_path) {
        Ok(p) => p,
        Err(e) => return e.into_read_response(),
    };

    let st = ops::stat(&resolved).await;
    if !st.exists {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut headers = HeaderMap::new();
    let file_type = match st.entry_type {
        Some(EntryType::Directory) => "directory",
        _ => "file",
    };
    headers.insert("X-File-Type", file_type.parse().unwrap());
    headers.insert("X-Path", resolved.display().to_string().parse().unwrap());
    if let Some(lm) = last_modified_header(st.mtime) {
        headers.insert(header::LAST_MODIFIED, lm.parse().unwrap());
    }
    if st.entry_type != Some(EntryType::Directory) {
        let mime = mime_guess::from_path(&resolved).first_or_octet_stream();
        headers.insert(header::CONTENT_TYPE, mime.essence_str().parse().unwrap());
        if let Some(size) = st.size {
            headers.insert(header::CONTENT_LENGTH, size.to_string().parse().unwrap());
        }
    }
    (StatusCode::OK, headers).into_response()
}

/// `PUT /fs/{path}` — truncate-replace write of the raw request body.
pub async fn put_path(
    State(state): State<AppState>,
    axum::extract::Path(path): axum::extract::Path<String>,
    body: Bytes,
) -> Response {
    if state.resolver.is_root(&path) {
        return SandboxError::validation("cannot write to the sandbox root").into_response();
    }
    if body.is_empty() {
        return SandboxError::validation("request body must not be empty").into_response();
    }
    let resolved = match state.resolver.resolve(&path) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    match ops::write_binary(&resolved, &body, None).await {
        Ok(size) => (
            StatusCode::OK,
            axum::Json(json!({"success": true, "path": resolved.display().to_string(), "size": size})),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /fs/{path}` — dispatches on `?mkdir=1` / `?append=1`.
pub async fn post_path(
    State(state): State<AppState>,
    axum::extract::Path(path): axum::extract::Path<String>,
    Query(query): Query<FsQuery>,
    body: Bytes,
) -> Response {
    if query.is_mkdir() && query.is_append() {
        return SandboxError::validation("mkdir and append are mutually exclusive").into_response();
    }

    if query.is_mkdir() {
        if state.resolver.is_root(&path) {
            return SandboxError::validation("cannot mkdir the sandbox root").into_response();
        }
        let resolved = match state.resolver.resolve(&path) {
            Ok(p) => p,
            Err(e) => return e.into_response(),
        };
        return match ops::mkdir(&resolved).await {
            Ok(()) => (
                StatusCode::CREATED,
                axum::Json(json!({
                    "success": true,
                    "path": resolved.display().to_string(),
                    "type": "directory",
                })),
            )
                .into_response(),
            Err(e) => e.into_response(),
        };
    }

    if query.is_append() {
        if state.resolver.is_root(&path) {
            return SandboxError::validation("cannot append to the sandbox root").into_response();
        }
        if body.is_empty() {
            return SandboxError::validation("request body must not be empty").into_response();
        }
        let resolved = match state.resolver.resolve(&path) {
            Ok(p) => p,
            Err(e) => return e.into_response(),
        };
        return match ops::append_binary(&resolved, &body).await {
            Ok(size) => (
                StatusCode::OK,
                axum::Json(json!({"success": true, "path": resolved.display().to_string(), "size": size})),
            )
                .into_response(),
            Err(e) => e.into_response(),
        };
    }

    SandboxError::validation("must specify exactly one of ?mkdir=1 or ?append=1").into_response()
}

/// `DELETE /fs/{path}`.
pub async fn delete_path(
    State(state): State<AppState>,
    axum::extract::Path(path): axum::extract::Path<String>,
    Query(query): Query<FsQuery>,
) -> Response {
    if state.resolver.is_root(&path) {
        return SandboxError::validation("cannot delete the sandbox root").into_response();
    }
    let resolved = match state.resolver.resolve_existing(&path) {
        Ok(p) => p,
        Err(SandboxError::NotFound(msg)) => {
            // Matches the observed "delete of a missing path is a 500,
            // NOT_FOUND-class" behavior rather than the read-path 404.
            return SandboxError::internal(format!("not found: {msg}")).into_response();
        }
        Err(e) => return e.into_response(),
    };

    match ops::delete(&resolved, query.is_recursive()).await {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "path": resolved.display().to_string(),
                "deleted": true,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
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

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn mkdir_is_idempotent_over_http() {
        let (_dir, router) = test_router();

        let req = || {
            Request::builder()
                .method("POST")
                .uri("/fs/proj?mkdir=1")
                .body(Body::empty())
                .unwrap()
        };

        let first = router.clone().oneshot(req()).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = router.clone().oneshot(req()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn delete_nonempty_dir_without_recursive_is_conflict() {
        let (dir, router) = test_router();
        tokio::fs::create_dir(dir.path().join("proj")).await.unwrap();
        tokio::fs::write(dir.path().join("proj/a.txt"), b"x").await.unwrap();

        let req = Request::builder()
            .method("DELETE")
            .uri("/fs/proj")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["code"], "DIRECTORY_NOT_EMPTY");
    }

    #[tokio::test]
    async fn path_escape_is_400_on_write_and_404_on_read() {
        let (_dir, router) = test_router();

        let write = Request::builder()
            .method("PUT")
            .uri("/fs/../../etc/passwd")
            .body(Body::from("x"))
            .unwrap();
        let write_response = router.clone().oneshot(write).await.unwrap();
        assert_eq!(write_response.status(), StatusCode::BAD_REQUEST);

        let read = Request::builder()
            .method("GET")
            .uri("/fs/../../etc/passwd")
            .body(Body::empty())
            .unwrap();
        let read_response = router.oneshot(read).await.unwrap();
        assert_eq!(read_response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_missing_path_is_404() {
        let (_dir, router) = test_router();
        let req = Request::builder()
            .method("GET")
            .uri("/fs/nope.txt")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_query_sets_content_disposition() {
        let (dir, router) = test_router();
        tokio::fs::write(dir.path().join("a.txt"), b"hello").await.unwrap();

        let req = Request::builder()
            .method("GET")
            .uri("/fs/a.txt?download=1")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(axum::http::header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("attachment"));
        assert!(disposition.contains("a.txt"));
    }

    #[tokio::test]
    async fn put_to_sandbox_root_is_rejected() {
        let (_dir, router) = test_router();
        let req = Request::builder()
            .method("PUT")
            .uri("/fs/.")
            .body(Body::from("x"))
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
