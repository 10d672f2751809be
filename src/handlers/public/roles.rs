use axum::extract::Path;
use serde::Serialize;

use crate::config::roles::Role;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Serialize)]
pub struct RolePermissions {
    pub role: Role,
    pub display_name: String,
    pub department: Option<String>,
    pub menu_access: Vec<String>,
}

impl From<Role> for RolePermissions {
    fn from(role: Role) -> Self {
        Self {
            role,
            display_name: role.display_name(),
            department: role.department(),
            menu_access: role.menu_access(),
        }
    }
}

/// GET /api/roles
pub async fn list() -> ApiResult<Vec<RolePermissions>> {
    Ok(ApiResponse::success(Role::ALL.into_iter().map(RolePermissions::from).collect()))
}

/// GET /api/roles/:role/permissions
pub async fn permissions(Path(role): Path<String>) -> ApiResult<RolePermissions> {
    let role: Role = role.parse().map_err(ApiError::not_found)?;
    Ok(ApiResponse::success(role.into()))
}
