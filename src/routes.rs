use actix_web::{delete, get, patch, post, web, HttpResponse};
use log::{debug, info};
use utoipa::OpenApi;

use crate::auth::TokenService;
use crate::db::Database;
use crate::errors::{ApiError, ErrorBody};
use crate::middleware::AuthUser;
use crate::models::{
    CreateTodoRequest, DeleteResponse, LoginRequest, LoginResponse, NewTodo, Priority, Todo,
    TodoPatch, User, UserInfo,
};
use crate::password;

const BAD_CREDENTIALS: &str = "用户名或密码错误";
const TEXT_REQUIRED: &str = "待办事项内容不能为空";
const TODO_NOT_FOUND: &str = "待办事项不存在";
const LOGIN_FAILED: &str = "登录失败";

/// Registers every route on `cfg`. Expects `web::Data<Database>` and
/// `web::Data<TokenService>` to be registered on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        debug!("rejected request body: {err}");
        ApiError::validation("请求体格式错误").into()
    }))
    .service(
        web::scope("/api")
            .service(login)
            .service(me)
            .service(list_todos)
            .service(create_todo)
            .service(update_todo)
            .service(delete_todo),
    )
    .service(openapi_json);
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, registering the user if the name was unseen", body = LoginResponse),
        (status = 400, description = "Username or password missing", body = ErrorBody),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[post("/auth/login")]
async fn login(
    db: web::Data<Database>,
    tokens: web::Data<TokenService>,
    req: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { username, password } = req.into_inner();
    let (username, password) = match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            (username, password)
        }
        _ => return Err(ApiError::validation("用户名和密码不能为空")),
    };

    let existing = db
        .find_user_by_username(&username)
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?;

    let user = match existing {
        Some(user) => check_password(user, password).await?,
        None => register(&db, username, password).await?,
    };

    let token = tokens
        .issue(user.id, &user.username)
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        user: UserInfo::from(&user),
    }))
}

async fn check_password(user: User, password: String) -> Result<User, ApiError> {
    let hashed = user.password_hash.clone();
    let matches = web::block(move || password::verify(&password, &hashed))
        .await
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?;

    if matches {
        Ok(user)
    } else {
        info!("failed login for user {}", user.id);
        Err(ApiError::unauthorized(BAD_CREDENTIALS))
    }
}

/// First login with an unseen username creates the account.
async fn register(db: &Database, username: String, password: String) -> Result<User, ApiError> {
    let plain = password.clone();
    let hashed = web::block(move || password::hash(&plain))
        .await
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?
        .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?;

    match db.create_user(&username, &hashed) {
        Ok(user) => {
            info!("registered user {} ({})", user.id, user.username);
            Ok(user)
        }
        // A concurrent first login took the name; log in against that account.
        Err(err) if err.is_unique_violation() => {
            let user = db
                .find_user_by_username(&username)
                .map_err(|e| ApiError::internal(LOGIN_FAILED, e))?
                .ok_or_else(|| ApiError::internal(LOGIN_FAILED, err))?;
            check_password(user, password).await
        }
        Err(err) => Err(ApiError::internal(LOGIN_FAILED, err)),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The user named by the bearer token", body = UserInfo),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
#[get("/auth/me")]
async fn me(user: AuthUser) -> HttpResponse {
    // Answered from the token claims alone, without a store lookup.
    HttpResponse::Ok().json(UserInfo {
        id: user.id,
        username: user.username,
    })
}

#[utoipa::path(
    get,
    path = "/api/todos",
    responses(
        (status = 200, description = "The caller's todos, newest first", body = [Todo]),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[get("/todos")]
async fn list_todos(user: AuthUser, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let todos = db
        .list_todos(user.id)
        .map_err(|e| ApiError::internal("获取待办事项失败", e))?;
    Ok(HttpResponse::Ok().json(todos))
}

#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Todo created", body = Todo),
        (status = 400, description = "Text missing or blank", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[post("/todos")]
async fn create_todo(
    user: AuthUser,
    db: web::Data<Database>,
    req: web::Json<CreateTodoRequest>,
) -> Result<HttpResponse, ApiError> {
    let CreateTodoRequest {
        text,
        description,
        priority,
    } = req.into_inner();

    let text = non_blank(text).ok_or_else(|| ApiError::validation(TEXT_REQUIRED))?;
    let new = NewTodo {
        text,
        description: description.unwrap_or_default(),
        priority: priority.unwrap_or(Priority::Medium),
    };

    let todo = db
        .create_todo(user.id, new)
        .map_err(|e| ApiError::internal("创建待办事项失败", e))?;
    Ok(HttpResponse::Created().json(todo))
}

#[utoipa::path(
    patch,
    path = "/api/todos/{id}",
    request_body = TodoPatch,
    params(
        ("id" = i64, Path, description = "Id of one of the caller's todos")
    ),
    responses(
        (status = 200, description = "Todo updated", body = Todo),
        (status = 400, description = "Bad id or blank text", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "No such todo for this user", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[patch("/todos/{id}")]
async fn update_todo(
    user: AuthUser,
    db: web::Data<Database>,
    todo_id: web::Path<String>,
    req: web::Json<TodoPatch>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_todo_id(&todo_id)?;
    let mut patch = req.into_inner();
    if let Some(text) = patch.text.take() {
        patch.text = Some(non_blank(Some(text)).ok_or_else(|| ApiError::validation(TEXT_REQUIRED))?);
    }

    let todo = db
        .update_todo(id, user.id, patch)
        .map_err(|e| ApiError::internal("更新待办事项失败", e))?
        .ok_or_else(|| ApiError::not_found(TODO_NOT_FOUND))?;
    Ok(HttpResponse::Ok().json(todo))
}

#[utoipa::path(
    delete,
    path = "/api/todos/{id}",
    params(
        ("id" = i64, Path, description = "Id of one of the caller's todos")
    ),
    responses(
        (status = 200, description = "Todo deleted", body = DeleteResponse),
        (status = 400, description = "Bad id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "No such todo for this user", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[delete("/todos/{id}")]
async fn delete_todo(
    user: AuthUser,
    db: web::Data<Database>,
    todo_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_todo_id(&todo_id)?;
    let deleted = db
        .delete_todo(id, user.id)
        .map_err(|e| ApiError::internal("删除待办事项失败", e))?;

    if !deleted {
        return Err(ApiError::not_found(TODO_NOT_FOUND));
    }
    Ok(HttpResponse::Ok().json(DeleteResponse { success: true }))
}

#[get("/api-doc/openapi.json")]
async fn openapi_json() -> HttpResponse {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

fn parse_todo_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::validation("无效的待办事项 ID")),
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    let text = text?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, me, list_todos, create_todo, update_todo, delete_todo),
    components(schemas(
        LoginRequest,
        LoginResponse,
        UserInfo,
        Todo,
        Priority,
        CreateTodoRequest,
        TodoPatch,
        DeleteResponse,
        ErrorBody
    ))
)]
pub struct ApiDoc;
