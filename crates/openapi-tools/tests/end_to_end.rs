use anyhow::Context as _;
use axum::Router;
use axum::extract::{Path, RawQuery};
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Value, json};
use statsig_openapi_tools::compiler::compile;
use statsig_openapi_tools::config::CompileOptions;
use statsig_openapi_tools::dispatch::ResponseBody;
use statsig_openapi_tools::document::Document;
use statsig_openapi_tools::error::DispatchError;
use statsig_openapi_tools::registry::Registry;
use statsig_openapi_tools::{ApiServerConfig, OpenApiToolSource};
use statsig_test_support::MockApi;

const CONSOLE_SPEC: &str = r"
openapi: 3.0.3
info: { title: Console API, version: '20240601' }
components:
  parameters:
    Limit: { $ref: '#/components/parameters/LimitParam' }
    LimitParam:
      name: limit
      in: query
      schema: { $ref: '#/components/schemas/Count' }
  schemas:
    Count: { type: number }
    Target:
      oneOf:
        - { type: string }
        - { type: integer }
paths:
  /gates/{id}:
    get:
      summary: Read a gate
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
  /gates:
    get:
      summary: List gates
      parameters:
        - $ref: '#/components/parameters/Limit'
    post:
      summary: Create a gate
      parameters:
        - { name: limit, in: query, schema: { type: string } }
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
                target: { $ref: '#/components/schemas/Target' }
";

fn app() -> Router {
    Router::new()
        .route("/openapi.json", get(|| async { CONSOLE_SPEC }))
        .route(
            "/gates/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "abc" {
                    (StatusCode::OK, "plain gate abc".to_string())
                } else {
                    (StatusCode::NOT_FOUND, format!("gate {id} not found"))
                }
            }),
        )
        .route(
            "/gates",
            get(|RawQuery(q): RawQuery| async move { q.unwrap_or_default() }).post(
                |RawQuery(q): RawQuery, body: String| async move {
                    (
                        [("content-type", "application/json")],
                        format!(
                            r#"{{"query":{},"body":{body}}}"#,
                            Value::String(q.unwrap_or_default())
                        ),
                    )
                },
            ),
        )
}

async fn source(server: &MockApi) -> anyhow::Result<OpenApiToolSource> {
    let mut config = ApiServerConfig::new(server.base_url());
    config.api_key = Some("console-test".to_string());
    OpenApiToolSource::build(&config)
        .await
        .context("build tool source")
}

#[tokio::test]
async fn gate_read_returns_upstream_text_unmodified() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;
    let source = source(&server).await?;

    let resp = source
        .invoke("_gates__id_", Some("get"), &json!({"method": "get", "id": "abc"}))
        .await?;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, ResponseBody::Text("plain gate abc".to_string()));

    let err = source
        .invoke("_gates__id_", Some("get"), &json!({"id": "zzz"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Status { status: 404, ref body } if body == "gate zzz not found"
    ));
    Ok(())
}

#[tokio::test]
async fn merged_parameter_accepts_every_verbs_type() -> anyhow::Result<()> {
    let server = MockApi::spawn(app()).await?;
    let source = source(&server).await?;

    let resp = source.invoke("_gates", None, &json!({"limit": 5})).await?;
    assert_eq!(resp.body, ResponseBody::Text("limit=5".to_string()));

    let resp = source
        .invoke(
            "_gates",
            Some("post"),
            &json!({"post": {"limit": "ten", "application/json": {"name": "g", "target": 7}}}),
        )
        .await?;
    assert_eq!(
        resp.body,
        ResponseBody::Json(json!({"query": "limit=ten", "body": {"name": "g", "target": 7}}))
    );

    let err = source
        .invoke("_gates", None, &json!({"limit": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArguments(_)));

    let err = source
        .invoke(
            "_gates",
            Some("post"),
            &json!({"application/json": {"name": "g", "target": false}}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArguments(_)));
    Ok(())
}

#[test]
fn deep_ref_chains_terminate_and_match_inlining() {
    let depth = 25;
    let mut schemas = serde_json::Map::new();
    for i in 0..depth {
        schemas.insert(
            format!("S{i}"),
            json!({"$ref": format!("#/components/schemas/S{}", i + 1)}),
        );
    }
    schemas.insert(format!("S{depth}"), json!({"type": "boolean"}));

    let doc = Document::from_value(
        "inline",
        json!({
            "openapi": "3.0.0",
            "components": {"schemas": schemas},
            "paths": {
                "/chained": {"get": {"parameters": [
                    {"name": "flag", "in": "query", "required": true, "schema": {"$ref": "#/components/schemas/S0"}}
                ]}},
                "/inline": {"get": {"parameters": [
                    {"name": "flag", "in": "query", "required": true, "schema": {"type": "boolean"}}
                ]}}
            }
        }),
    )
    .unwrap();

    let registry = Registry::register(compile(&doc, &CompileOptions::default()));
    let chained = &registry.get("_chained").unwrap().merged_parameters["flag"];
    let inline = &registry.get("_inline").unwrap().merged_parameters["flag"];
    assert_eq!(chained, inline);
    assert_eq!(
        registry.get("_chained").unwrap().input_schema["properties"]["get"]["properties"],
        registry.get("_inline").unwrap().input_schema["properties"]["get"]["properties"]
    );
}

#[test]
fn zero_paths_produce_an_empty_registry() {
    let doc = Document::parse("inline", r#"{"openapi": "3.0.0", "paths": {}}"#).unwrap();
    let output = compile(&doc, &CompileOptions::default());
    assert!(output.skipped.is_empty());
    assert!(Registry::register(output).is_empty());
}
