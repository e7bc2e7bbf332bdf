use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::auth::{extract_token, TokenService};
use crate::errors::ApiError;

/// The caller of a protected route, taken from a verified bearer token.
///
/// Taking this as a handler argument runs the check before the handler body,
/// so an unauthenticated request never reaches the store.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = extract_token(header).ok_or_else(|| ApiError::unauthorized("未授权"))?;

    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .ok_or_else(|| ApiError::internal("服务配置错误", "TokenService is not registered"))?;

    let claims = tokens
        .verify(token)
        .ok_or_else(|| ApiError::unauthorized("Token 无效"))?;

    Ok(AuthUser {
        id: claims.user_id,
        username: claims.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use chrono::Duration;

    fn tokens() -> web::Data<TokenService> {
        web::Data::new(TokenService::new(b"test-secret", Duration::hours(1)))
    }

    #[test]
    fn accepts_a_valid_bearer_token() {
        let tokens = tokens();
        let token = tokens.issue(5, "carol").unwrap();
        let req = TestRequest::default()
            .app_data(tokens)
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .to_http_request();

        let user = authenticate(&req).unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.username, "carol");
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        let req = TestRequest::default().app_data(tokens()).to_http_request();
        assert!(matches!(authenticate(&req), Err(ApiError::Unauthorized(m)) if m == "未授权"));

        let req = TestRequest::default()
            .app_data(tokens())
            .insert_header((header::AUTHORIZATION, "Token abc"))
            .to_http_request();
        assert!(matches!(authenticate(&req), Err(ApiError::Unauthorized(m)) if m == "未授权"));
    }

    #[test]
    fn bad_token_is_invalid() {
        let req = TestRequest::default()
            .app_data(tokens())
            .insert_header((header::AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert!(matches!(authenticate(&req), Err(ApiError::Unauthorized(m)) if m == "Token 无效"));
    }
}
