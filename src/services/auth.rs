use log::{debug, info};

use crate::http::{ApiClient, ApiError, RequestOptions};
use crate::types::{ApiResponse, CreateUserRequest, LoginRequest, LoginResponse, User};

#[tracing::instrument(skip(api, user), fields(email = %user.email))]
pub async fn register(api: &ApiClient, user: &CreateUserRequest) -> Result<ApiResponse<User>, ApiError> {
    api.post("/user/register", Some(user), RequestOptions::new())
        .await
}

/// Signs in and stores the returned credentials.
#[tracing::instrument(skip(api, credentials), fields(email = %credentials.email))]
pub async fn login(api: &ApiClient, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
    let response: LoginResponse = api
        .post("/user/login", Some(credentials), RequestOptions::new())
        .await?;

    match response.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) if response.success => {
            api.set_access_token(token);
            if let Some(refresh_token) = response.refresh_token.as_deref().filter(|t| !t.is_empty()) {
                api.set_refresh_token(refresh_token);
            }
            info!("Signed in as {}", credentials.email);
        }
        _ => debug!("Login response carried no token"),
    }

    Ok(response)
}

pub fn logout(api: &ApiClient) {
    api.clear_access_token();
}

pub async fn current_user(api: &ApiClient) -> Result<ApiResponse<User>, ApiError> {
    api.get("/user/me", RequestOptions::new()).await
}

/// Point-in-time check: a stored token counts even if it has expired.
pub fn check_auth_status(api: &ApiClient) -> bool {
    api.is_authenticated()
}
