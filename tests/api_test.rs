use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Value};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use gridportal::api::{self, AppState};
use gridportal::auth::JwtService;
use gridportal::entities::{column_metadata, stored_procedure_registry};
use gridportal::services::{DynamicGridService, MenuItem, MenuService, RoleService, UserService};

const SECRET: &str = "integration-test-secret";

fn app(db: DatabaseConnection) -> Router {
    let db = Arc::new(db);
    let jwt_service = JwtService::new(SECRET, 1, 30);
    let menu: Vec<MenuItem> = serde_json::from_value(json!([
        {"label": "Home", "route": "/"},
        {"label": "Admin", "route": "/admin", "roles": ["Admin"]}
    ]))
    .unwrap();

    api::router(AppState {
        jwt_service: jwt_service.clone(),
        user_service: UserService::new(db.clone(), jwt_service),
        role_service: RoleService::new(db.clone()),
        grid_service: DynamicGridService::new(db),
        menu_service: MenuService::new(menu),
    })
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn bearer(roles: &[&str]) -> String {
    let token = JwtService::new(SECRET, 1, 30)
        .generate_token(
            Uuid::new_v4(),
            "operator@example.com",
            roles.iter().map(|r| r.to_string()).collect(),
        )
        .unwrap();
    format!("Bearer {}", token)
}

fn registry_entry(requires_auth: bool, cache_duration_seconds: i32) -> stored_procedure_registry::Model {
    stored_procedure_registry::Model {
        id: Uuid::new_v4(),
        procedure_name: "sp_Grid_Bus".into(),
        display_name: "Buses".into(),
        category: Some("Network".into()),
        description: None,
        database_name: None,
        is_active: true,
        requires_auth,
        allowed_roles: json!(["Operator"]),
        default_page_size: 50,
        max_page_size: 500,
        cache_duration_seconds,
        created_at: Utc::now().into(),
        updated_at: Utc::now().into(),
    }
}

fn json_post(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_execute_rejects_malformed_procedure_name() {
    let body = json!({"procedureName": "sp_Grid_Bus; DROP TABLE \"user\""});
    let req = json_post("/api/DynamicGrid/execute")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_execute_unregistered_procedure_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<stored_procedure_registry::Model>::new()])
        .into_connection();

    let body = json!({"procedureName": "sp_Grid_Bus"});
    let req = json_post("/api/DynamicGrid/execute")
        .header(header::AUTHORIZATION, bearer(&["Admin"]))
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(db).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_execute_requires_authentication() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![registry_entry(true, 0)]])
        .into_connection();

    let body = json!({"procedureName": "sp_Grid_Bus"});
    let req = json_post("/api/DynamicGrid/execute")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(db).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_execute_returns_grid_with_cache_header() {
    let envelope = json!({
        "success": true,
        "rows": [{"Id": "1", "BusId": 1, "BusName": "Riverside"}],
        "columns": [
            {"field": "Id", "headerName": "Id", "type": "text", "isPrimaryKey": true, "hidden": true},
            {"field": "BusId", "headerName": "Bus Id", "type": "number", "isPrimaryKey": true},
            {"field": "BusName", "headerName": "Bus Name", "type": "text", "editable": true}
        ],
        "totalCount": 1,
        "pageNumber": 1,
        "pageSize": 50,
        "totalPages": 1
    });
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![registry_entry(false, 60)]])
        .append_query_results([vec![BTreeMap::from([(
            "result",
            Value::Json(Some(Box::new(envelope))),
        )])]])
        .append_query_results([Vec::<column_metadata::Model>::new()])
        .into_connection();

    let body = json!({"procedureName": "sp_Grid_Bus", "pageSize": 50});
    let req = json_post("/api/DynamicGrid/execute")
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(db).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=60"
    );

    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["totalCount"], 1);
    assert_eq!(json["loadingStrategy"], "client");
    assert_eq!(json["columns"][2]["field"], "BusName");
    assert_eq!(json["rows"][0]["BusName"], "Riverside");
}

#[tokio::test]
async fn test_update_row_surfaces_error_code() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![registry_entry(true, 0)]])
        .append_query_results([vec![BTreeMap::from([("present", Value::from(true))])]])
        .append_query_results([vec![BTreeMap::from([(
            "result",
            Value::Json(Some(Box::new(json!({
                "success": false,
                "message": "Record not found",
                "errorCode": "NOT_FOUND"
            })))),
        )])]])
        .into_connection();

    let body = json!({
        "procedureName": "sp_Grid_Bus",
        "rowId": "999",
        "changes": {"BusName": "Nowhere"}
    });
    let req = json_post("/api/DynamicGrid/update-row")
        .header(header::AUTHORIZATION, bearer(&["Operator"]))
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(db).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["errorCode"], "NOT_FOUND");
    assert_eq!(json["procedureName"], "sp_Grid_Update_Bus");
}

#[tokio::test]
async fn test_scaffold_requires_admin() {
    let body = json!({"tableName": "Bus"});
    let req = json_post("/api/DynamicGrid/scaffold")
        .header(header::AUTHORIZATION, bearer(&["Operator"]))
        .body(Body::from(body.to_string()))
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_column_state_requires_authentication() {
    let req = Request::builder()
        .uri("/api/DynamicGrid/column-state?procedureName=sp_Grid_Bus")
        .body(Body::empty())
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_test_endpoint_echoes_claims() {
    let req = Request::builder()
        .uri("/api/Auth/test")
        .header(header::AUTHORIZATION, bearer(&["Operator"]))
        .body(Body::empty())
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["user"]["email"], "operator@example.com");
    assert_eq!(json["user"]["roles"][0], "Operator");
}

#[tokio::test]
async fn test_invalid_token_is_treated_as_anonymous() {
    let req = Request::builder()
        .uri("/api/Auth/test")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_menu_is_filtered_by_role() {
    let anonymous = Request::builder().uri("/api/Menu").body(Body::empty()).unwrap();
    let resp = app(empty_db()).oneshot(anonymous).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let admin = Request::builder()
        .uri("/api/Menu")
        .header(header::AUTHORIZATION, bearer(&["Admin"]))
        .body(Body::empty())
        .unwrap();
    let resp = app(empty_db()).oneshot(admin).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_role_management_requires_admin() {
    let req = Request::builder()
        .uri("/api/RoleManagement/roles")
        .header(header::AUTHORIZATION, bearer(&["Operator"]))
        .body(Body::empty())
        .unwrap();

    let resp = app(empty_db()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
