//! User endpoint handlers and their request schemas

use axum::extract::State;
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse, PageMeta};
use crate::api::validation::{trim_opt, RequestSchema, SchemaPart, Skip, Validated};
use crate::domain::user::{
    NewUser, User, UserChanges, UserListQuery, MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH,
    MIN_USERNAME_LENGTH,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserBody {
    #[validate(
        required(message = "Username is required"),
        length(
            min = MIN_USERNAME_LENGTH,
            max = MAX_USERNAME_LENGTH,
            message = "Username must be between 2 and 50 characters"
        )
    )]
    pub username: Option<String>,

    #[validate(
        required(message = "Email is required"),
        email(message = "Email must be a valid email address"),
        length(max = MAX_EMAIL_LENGTH, message = "Email must be at most 255 characters")
    )]
    pub email: Option<String>,
}

impl SchemaPart for CreateUserBody {
    fn sanitize(&mut self) {
        trim_opt(&mut self.username);
        trim_opt(&mut self.email);
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserBody {
    #[validate(length(
        min = MIN_USERNAME_LENGTH,
        max = MAX_USERNAME_LENGTH,
        message = "Username must be between 2 and 50 characters"
    ))]
    pub username: Option<String>,

    #[validate(
        email(message = "Email must be a valid email address"),
        length(max = MAX_EMAIL_LENGTH, message = "Email must be at most 255 characters")
    )]
    pub email: Option<String>,
}

impl SchemaPart for UpdateUserBody {
    fn sanitize(&mut self) {
        trim_opt(&mut self.username);
        trim_opt(&mut self.email);
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserIdParams {
    #[validate(range(min = 1, message = "Id must be a positive integer"))]
    pub id: i64,
}

impl SchemaPart for UserIdParams {}

#[derive(Debug, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: Option<u32>,

    #[validate(length(max = 255, message = "Search term must be at most 255 characters"))]
    pub q: Option<String>,

    #[serde(alias = "sortBy")]
    pub sort_by: Option<String>,

    pub order: Option<String>,
}

impl SchemaPart for ListUsersQuery {
    fn sanitize(&mut self) {
        trim_opt(&mut self.q);
        trim_opt(&mut self.sort_by);
        trim_opt(&mut self.order);
    }
}

pub struct CreateUser;

impl RequestSchema for CreateUser {
    type Body = CreateUserBody;
    type Query = Skip;
    type Params = Skip;
    type Headers = Skip;
}

pub struct ListUsers;

impl RequestSchema for ListUsers {
    type Body = Skip;
    type Query = ListUsersQuery;
    type Params = Skip;
    type Headers = Skip;
}

pub struct UserById;

impl RequestSchema for UserById {
    type Body = Skip;
    type Query = Skip;
    type Params = UserIdParams;
    type Headers = Skip;
}

pub struct UpdateUser;

impl RequestSchema for UpdateUser {
    type Body = UpdateUserBody;
    type Query = Skip;
    type Params = UserIdParams;
    type Headers = Skip;
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<AppState>,
    Validated { body, .. }: Validated<CreateUser>,
) -> Result<ApiResponse<User>, ApiError> {
    let payload = NewUser::new(
        body.username.unwrap_or_default(),
        body.email.unwrap_or_default(),
    );

    let user = state.users.create(payload).await?;

    Ok(ApiResponse::created("User created successfully", user))
}

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    Validated { query, .. }: Validated<ListUsers>,
) -> Result<ApiResponse<Vec<User>>, ApiError> {
    let options = UserListQuery::from_options(
        query.page,
        query.limit,
        query.q,
        query.sort_by.as_deref(),
        query.order.as_deref(),
    );
    debug!(page = options.page, limit = options.limit, "Listing users");

    let page = state.users.list(&options).await?;
    let meta = PageMeta::new(page.total, page.page, page.limit);

    Ok(ApiResponse::paginated("Users fetched successfully", page.users, meta))
}

/// GET /api/v1/users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    Validated { params, .. }: Validated<UserById>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = state
        .users
        .get_by_id(params.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok("User fetched successfully", user))
}

/// PUT /api/v1/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Validated { body, params, .. }: Validated<UpdateUser>,
) -> Result<ApiResponse<User>, ApiError> {
    let changes = UserChanges {
        username: body.username,
        email: body.email,
    };

    let user = state
        .users
        .update(params.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found or not updated"))?;

    Ok(ApiResponse::ok("User updated successfully", user))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Validated { params, .. }: Validated<UserById>,
) -> Result<ApiResponse, ApiError> {
    if !state.users.delete(params.id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(ApiResponse::message("User deleted successfully"))
}
