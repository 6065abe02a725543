//! Typed bindings for the backend's admin endpoints.
//!
//! Every method goes through the bearer [`Dispatcher`] and hands back the
//! envelope untouched, so callers decide how to treat business failures. The
//! only error raised is `Unauthorized` (plus local validation in
//! [`AdminApi::create_user`] and [`AdminApi::upload_file`]).

use std::collections::BTreeMap;

use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::dispatcher::{Dispatcher, QueryParams};
use crate::envelope::ApiEnvelope;
use crate::errors::{AdminError, AdminResult};
use crate::password::validate_password;
use crate::types::*;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
const ALL_FILTER: &str = "all";
const SLUG_KEYS: [&str; 4] = ["sort", "search", "filter", "page"];

/// Filters for the paginated user list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    /// Role name, or `"all"` for no filter
    pub role: Option<String>,
    /// Account status, or `"all"` for no filter
    pub status: Option<String>,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            role: None,
            status: None,
        }
    }
}

impl UserQuery {
    pub fn to_query_params(&self) -> QueryParams {
        let mut params = QueryParams::new()
            .with("page", self.page)
            .with("limit", self.limit);

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push("search", search);
        }
        if let Some(role) = self.role.as_deref().filter(|r| !r.is_empty() && *r != ALL_FILTER) {
            params.push("roleFilter", role);
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty() && *s != ALL_FILTER) {
            params.push("status", status);
        }
        params
    }
}

/// Which permissions every role holds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    pub permissions: Vec<Permission>,
    pub roles: Vec<Role>,
    /// Permission ids per role id; a role whose lookup failed maps to an empty list
    pub by_role: BTreeMap<u64, Vec<u64>>,
}

impl PermissionMatrix {
    pub fn role_has(&self, role_id: u64, permission_id: u64) -> bool {
        self.by_role
            .get(&role_id)
            .map(|ids| ids.contains(&permission_id))
            .unwrap_or(false)
    }
}

/// Search options encoded into the backend's `key:value;...` filter syntax
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub tab: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub filter: Option<String>,
    pub page: Option<String>,
}

/// Encode search options, skipping empty values.
///
/// `sort`, `search`, `filter` and `page` are written as `key.slug:value`, anything
/// else as `key:value`.
pub fn format_search_params(params: &SearchParams) -> String {
    [
        ("tab", &params.tab),
        ("sort", &params.sort),
        ("search", &params.search),
        ("filter", &params.filter),
        ("page", &params.page),
    ]
    .into_iter()
    .filter_map(|(key, value)| {
        let value = value.as_deref().filter(|v| !v.is_empty())?;
        Some(if SLUG_KEYS.contains(&key) {
            format!("{}.slug:{}", key, value)
        } else {
            format!("{}:{}", key, value)
        })
    })
    .collect::<Vec<_>>()
    .join(";")
}

/// Admin endpoints of the backend
#[derive(Debug, Clone)]
pub struct AdminApi {
    dispatcher: Dispatcher,
}

impl AdminApi {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    // --- Users ---

    pub async fn list_users(&self, query: &UserQuery) -> AdminResult<ApiEnvelope<Vec<User>>> {
        self.dispatcher
            .get("/admin/get-users", Some(&query.to_query_params()))
            .await
    }

    pub async fn get_user(&self, user_id: u64) -> AdminResult<ApiEnvelope<UserDetails>> {
        self.dispatcher
            .get(&format!("/admin/get-user/{}", user_id), None)
            .await
    }

    pub async fn get_user_roles(&self, user_id: u64) -> AdminResult<ApiEnvelope<UserRoles>> {
        self.dispatcher
            .get(&format!("/admin/get-user-roles/{}", user_id), None)
            .await
    }

    pub async fn assign_role(&self, user_id: u64, role_id: u64) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .post("/admin/assign-role", &RoleAssignment { user_id, role_id }, None)
            .await
    }

    pub async fn remove_role(&self, user_id: u64, role_id: u64) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .post("/admin/remove-role", &RoleAssignment { user_id, role_id }, None)
            .await
    }

    pub async fn update_verification(
        &self,
        user_id: u64,
        is_verify: bool,
    ) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .patch(
                "/admin/update-verification",
                &VerificationUpdate { user_id, is_verify },
                None,
            )
            .await
    }

    pub async fn approve_teacher(
        &self,
        teacher_id: u64,
        is_approved: bool,
    ) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .patch(
                "/admin/approve-teacher",
                &TeacherApproval {
                    teacher_id,
                    is_approved,
                },
                None,
            )
            .await
    }

    /// Register a new account. Passwords that break the account policy are
    /// refused before anything is sent.
    pub async fn create_user(&self, user: &NewUser) -> AdminResult<ApiEnvelope<Value>> {
        validate_password(&user.password).map_err(|issues| {
            AdminError::Request(
                issues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        self.dispatcher.post("/auth/signup", user, None).await
    }

    // --- Roles ---

    pub async fn list_roles(&self) -> AdminResult<ApiEnvelope<Vec<Role>>> {
        self.dispatcher.get("/admin/all-roles", None).await
    }

    pub async fn create_role(&self, role: &RoleInput) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher.post("/admin/create-role", role, None).await
    }

    pub async fn update_role(&self, role_id: u64, role: &RoleInput) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .put(&format!("/admin/update-role/{}", role_id), role, None)
            .await
    }

    pub async fn role_permissions(&self, role_id: u64) -> AdminResult<ApiEnvelope<RolePermissions>> {
        self.dispatcher
            .get(&format!("/admin/get-role-permissions/{}", role_id), None)
            .await
    }

    pub async fn assign_permission(
        &self,
        role_id: u64,
        permission_id: u64,
    ) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .post(
                "/admin/assign-permission",
                &PermissionAssignment {
                    role_id,
                    permission_id,
                },
                None,
            )
            .await
    }

    pub async fn remove_permission(
        &self,
        role_id: u64,
        permission_id: u64,
    ) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .post(
                "/admin/remove-permission",
                &PermissionAssignment {
                    role_id,
                    permission_id,
                },
                None,
            )
            .await
    }

    // --- Permissions ---

    pub async fn list_permissions(&self) -> AdminResult<ApiEnvelope<Vec<Permission>>> {
        self.dispatcher.get("/admin/all-permissions", None).await
    }

    /// Fetch permissions, roles and every role's permissions.
    ///
    /// Lookups run concurrently and may finish in any order. A role whose
    /// lookup fails ends up with no permissions rather than failing the whole
    /// matrix.
    #[instrument(skip(self))]
    pub async fn permission_matrix(&self) -> AdminResult<PermissionMatrix> {
        let (permissions, roles) = tokio::try_join!(self.list_permissions(), self.list_roles())?;
        let permissions = permissions.data.unwrap_or_default();
        let roles = roles.data.unwrap_or_default();

        let lookups = roles.iter().map(|role| async move {
            let ids = match self.role_permissions(role.id).await {
                Ok(envelope) if envelope.success => envelope
                    .data
                    .map(|rp| rp.permissions.iter().map(|p| p.id).collect())
                    .unwrap_or_default(),
                Ok(envelope) => {
                    warn!(role_id = role.id, message = %envelope.message, "Failed to fetch role permissions");
                    Vec::new()
                }
                Err(e) => {
                    warn!(role_id = role.id, error = %e, "Failed to fetch role permissions");
                    Vec::new()
                }
            };
            (role.id, ids)
        });
        let by_role = join_all(lookups).await.into_iter().collect();

        debug!(
            roles = roles.len(),
            permissions = permissions.len(),
            "Built permission matrix"
        );
        Ok(PermissionMatrix {
            permissions,
            roles,
            by_role,
        })
    }

    // --- Dashboard ---

    /// Counters for the dashboard, fetched concurrently; missing counts read as zero
    pub async fn dashboard_stats(&self) -> AdminResult<StatsData> {
        let (users, roles, permissions) = tokio::try_join!(
            self.dispatcher
                .get::<Vec<User>>("/admin/get-users?limit=1", None),
            self.list_roles(),
            self.list_permissions(),
        )?;

        Ok(StatsData {
            total_users: users.total_count().unwrap_or(0),
            total_roles: roles.data.map(|r| r.len() as u64).unwrap_or(0),
            total_permissions: permissions.data.map(|p| p.len() as u64).unwrap_or(0),
        })
    }

    // --- Profile ---

    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> AdminResult<ApiEnvelope<UpdatedUser>> {
        self.dispatcher.patch("/user/update", update, None).await
    }

    /// Upload a file as a multipart form with a single `file` part
    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: Option<&str>,
        folder_path: Option<&str>,
    ) -> AdminResult<ApiEnvelope<UploadedAsset>> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if let Some(mime_type) = mime_type {
            part = part
                .mime_str(mime_type)
                .map_err(|e| AdminError::Request(format!("Invalid mime type {}: {}", mime_type, e)))?;
        }

        let mut form = Form::new().part("file", part);
        if let Some(folder_path) = folder_path {
            form = form.text("folderPath", folder_path.to_string());
        }

        self.dispatcher.post_multipart("/upload", form, None).await
    }

    pub async fn set_profile_picture(&self, asset_id: u64) -> AdminResult<ApiEnvelope<Value>> {
        self.dispatcher
            .patch("/user/update-profile", &ProfilePictureUpdate { asset_id }, None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{InMemorySessionStore, Session};
    use crate::test_support::TestBackend;
    use crate::token::TokenResolver;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Arc;

    fn ok(data: Value) -> Json<Value> {
        Json(json!({"success": true, "message": "", "statusCode": 200, "data": data}))
    }

    fn api_for(backend: &TestBackend) -> AdminApi {
        let store = InMemorySessionStore::with_session(Session::new(
            "1",
            "Ada",
            "ada@example.com",
            "admin-token",
            "refresh",
        ));
        AdminApi::new(Dispatcher::authenticated(
            backend.base_url(),
            TokenResolver::server(Arc::new(store)),
        ))
    }

    fn admin_router() -> Router {
        Router::new()
            .route(
                "/admin/all-roles",
                get(|| async {
                    ok(json!([
                        {"id": 1, "name": "admin", "description": "Full access"},
                        {"id": 2, "name": "teacher", "description": "Authoring"},
                        {"id": 3, "name": "student", "description": "Learning"}
                    ]))
                }),
            )
            .route(
                "/admin/all-permissions",
                get(|| async {
                    ok(json!([
                        {"id": 10, "name": "users.read", "description": "", "action": "read", "group": "users"},
                        {"id": 11, "name": "users.write", "description": "", "action": "write", "group": "users"}
                    ]))
                }),
            )
            .route(
                "/admin/get-role-permissions/:id",
                get(|Path(id): Path<u64>| async move {
                    let response: Response = match id {
                        1 => ok(json!({"roleId": 1, "permissions": [
                            {"id": 10, "name": "users.read"},
                            {"id": 11, "name": "users.write"}
                        ]}))
                        .into_response(),
                        2 => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
                        _ => Json(json!({"success": false, "message": "No permissions", "statusCode": 404}))
                            .into_response(),
                    };
                    response
                }),
            )
            .route(
                "/admin/get-users",
                get(|| async {
                    Json(json!({
                        "success": true,
                        "message": "",
                        "statusCode": 200,
                        "data": [{
                            "id": 4,
                            "documentId": "d4",
                            "firstName": "Alan",
                            "lastName": "Turing",
                            "displayName": "alan",
                            "username": null,
                            "email": "alan@example.com",
                            "isEmailVerified": false,
                            "createdAt": "2024-01-01T00:00:00.000Z",
                            "roles": ["student"],
                            "teacherInfo": null,
                            "studentCategories": null
                        }],
                        "metaData": {"count": 156, "page": 1, "limit": 1, "totalPages": 156}
                    }))
                }),
            )
            .route("/admin/assign-role", post(|| async { ok(json!(null)) }))
            .route("/admin/update-verification", patch(|| async { ok(json!(null)) }))
            .route("/auth/signup", post(|| async { ok(json!({"id": 99})) }))
            .route(
                "/upload",
                post(|| async { ok(json!({"id": 77, "url": "https://cdn.example.com/p.png"})) }),
            )
            .route("/user/update-profile", patch(|| async { ok(json!(null)) }))
    }

    #[tokio::test]
    async fn test_list_users_maps_filters() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        let envelope = api
            .list_users(&UserQuery {
                page: 3,
                search: Some("turing".to_string()),
                role: Some("all".to_string()),
                status: Some("verified".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(envelope.total_count(), Some(156));
        let users = envelope.data.unwrap();
        assert_eq!(users[0].full_name(), "Alan Turing");

        let request = backend.last_request().unwrap();
        assert_eq!(
            request.query.as_deref(),
            Some("page=3&limit=10&search=turing&status=verified")
        );
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        let stats = api.dashboard_stats().await.unwrap();
        assert_eq!(
            stats,
            StatsData {
                total_users: 156,
                total_roles: 3,
                total_permissions: 2
            }
        );
        assert_eq!(backend.request_count(), 3);
    }

    #[tokio::test]
    async fn test_dashboard_stats_tolerate_failures() {
        let backend = TestBackend::start(Router::new().route(
            "/admin/all-roles",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;
        let api = api_for(&backend);

        assert_eq!(api.dashboard_stats().await.unwrap(), StatsData::default());
    }

    #[tokio::test]
    async fn test_permission_matrix_isolates_failed_roles() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        let matrix = api.permission_matrix().await.unwrap();

        assert_eq!(matrix.roles.len(), 3);
        assert_eq!(matrix.permissions.len(), 2);
        assert_eq!(matrix.by_role.get(&1), Some(&vec![10, 11]));
        assert_eq!(matrix.by_role.get(&2), Some(&vec![]));
        assert_eq!(matrix.by_role.get(&3), Some(&vec![]));
        assert!(matrix.role_has(1, 11));
        assert!(!matrix.role_has(2, 10));
        assert!(!matrix.role_has(42, 10));
    }

    #[tokio::test]
    async fn test_permission_matrix_without_session_is_unauthorized() {
        let backend = TestBackend::start(admin_router()).await;
        let api = AdminApi::new(Dispatcher::authenticated(
            backend.base_url(),
            TokenResolver::server(Arc::new(InMemorySessionStore::new())),
        ));

        let err = api.permission_matrix().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(backend.request_count(), 0);
    }

    #[tokio::test]
    async fn test_mutation_payloads() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        assert!(api.assign_role(4, 2).await.unwrap().success);
        let body: Value = serde_json::from_slice(&backend.last_request().unwrap().body).unwrap();
        assert_eq!(body, json!({"userId": 4, "roleId": 2}));

        assert!(api.update_verification(4, false).await.unwrap().success);
        let request = backend.last_request().unwrap();
        assert_eq!(request.method, "PATCH");
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body, json!({"userId": 4, "isVerify": false}));
    }

    #[tokio::test]
    async fn test_create_user_checks_password_locally() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        let weak = NewUser {
            first_name: "Alan".to_string(),
            last_name: "Turing".to_string(),
            email: "alan@example.com".to_string(),
            password: "password".to_string(),
        };
        assert!(matches!(api.create_user(&weak).await, Err(AdminError::Request(_))));
        assert_eq!(backend.request_count(), 0);

        let strong = NewUser {
            password: "Enigma#1939!".to_string(),
            ..weak
        };
        assert!(api.create_user(&strong).await.unwrap().success);
        assert_eq!(backend.last_request().unwrap().path, "/auth/signup");
    }

    #[tokio::test]
    async fn test_upload_then_set_profile_picture() {
        let backend = TestBackend::start(admin_router()).await;
        let api = api_for(&backend);

        let asset = api
            .upload_file("me.png", b"\x89PNG".to_vec(), Some("image/png"), Some("avatars"))
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(asset.id, 77);

        let upload = backend.last_request().unwrap();
        assert!(upload
            .header("content-type")
            .unwrap()
            .starts_with("multipart/form-data"));
        let body = String::from_utf8_lossy(&upload.body);
        assert!(body.contains("name=\"file\"; filename=\"me.png\""));
        assert!(body.contains("name=\"folderPath\""));

        assert!(api.set_profile_picture(asset.id).await.unwrap().success);
        let body: Value = serde_json::from_slice(&backend.last_request().unwrap().body).unwrap();
        assert_eq!(body, json!({"assetId": 77}));
    }

    #[test]
    fn test_format_search_params() {
        let params = SearchParams {
            tab: Some("active".to_string()),
            sort: Some("name".to_string()),
            search: Some(String::new()),
            filter: None,
            page: Some("2".to_string()),
        };
        assert_eq!(
            format_search_params(&params),
            "tab:active;sort.slug:name;page.slug:2"
        );
        assert_eq!(format_search_params(&SearchParams::default()), "");
    }

    #[test]
    fn test_default_user_query() {
        let params = UserQuery::default().to_query_params();
        assert_eq!(params.get("page"), Some("1"));
        assert_eq!(params.get("limit"), Some("10"));
        assert_eq!(params.get("search"), None);
    }
}
