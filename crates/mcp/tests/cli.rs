use anyhow::Context as _;
use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use serde_json::Value;
use statsig_test_support::MockApi;
use std::process::Output;
use tokio::process::Command;

const SPEC: &str = r"
openapi: 3.0.0
info: { title: Console API, version: '1' }
paths:
  /gates/{id}:
    get:
      summary: Read a gate
      tags: [MCP]
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
  /experiments:
    get:
      summary: List experiments
      tags: [Warehouse Native]
  /broken:
    get:
      parameters:
        - { name: q, in: query, schema: { $ref: '#/components/schemas/Nope' } }
";

fn app() -> Router {
    Router::new()
        .route("/openapi.json", get(|| async { SPEC }))
        .route(
            "/gates/{id}",
            get(|Path(id): Path<String>, headers: HeaderMap| async move {
                let key = headers
                    .get("STATSIG-API-KEY")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if id == "missing" {
                    (StatusCode::NOT_FOUND, "gate not found".to_string())
                } else {
                    (StatusCode::OK, format!("gate {id} key={key}"))
                }
            }),
        )
}

async fn run(base_url: &str, args: &[&str]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_statsig-mcp");
    Command::new(bin)
        .args(args)
        .env("STATSIG_BASE_URL", base_url)
        .env("STATSIG_API_KEY", "console-test")
        .env_remove("STATSIG_MCP_CONFIG")
        .env_remove("STATSIG_SPEC_URL")
        .env("RUST_LOG", "warn")
        .output()
        .await
        .context("run statsig-mcp")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[tokio::test(flavor = "multi_thread")]
async fn tools_lists_one_tool_per_path() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;

    let out = run(&server.base_url(), &["tools"]).await?;
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "_gates__id_\tGET\tRead a gate",
            "_experiments\tGET\tList experiments"
        ]
    );

    let out = run(&server.base_url(), &["tools", "--json"]).await?;
    let tools: Value = serde_json::from_slice(&out.stdout).context("parse tools json")?;
    assert_eq!(tools[0]["name"], "_gates__id_");
    assert_eq!(tools[0]["inputSchema"]["properties"]["method"]["enum"][0], "get");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn filters_apply_from_flags() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;

    let out = run(&server.base_url(), &["--include-only-tagged", "tools"]).await?;
    assert_eq!(stdout(&out).lines().count(), 1);

    let out = run(&server.base_url(), &["--warehouse-native", "exclude", "tools"]).await?;
    assert!(!stdout(&out).contains("_experiments"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn check_reports_skipped_operations() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;

    let out = run(&server.base_url(), &["check"]).await?;
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("Console API: 2 tools, 2 operations, 1 skipped"));
    assert!(text.contains("skipped GET /broken"));

    let out = run(&server.base_url(), &["check", "--deny-skipped"]).await?;
    assert!(!out.status.success());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn call_prints_upstream_text_and_fails_on_404() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;

    let out = run(
        &server.base_url(),
        &["call", "_gates__id_", "--method", "get", "--args", r#"{"id":"abc"}"#],
    )
    .await?;
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout(&out).trim_end(), "gate abc key=console-test");

    let out = run(
        &server.base_url(),
        &["call", "_gates__id_", "--args", r#"{"id":"missing"}"#],
    )
    .await?;
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("404"), "stderr: {stderr}");
    assert!(stderr.contains("gate not found"), "stderr: {stderr}");
    Ok(())
}
