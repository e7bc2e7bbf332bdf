pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod password;
pub mod routes;

pub use auth::TokenService;
pub use config::AppConfig;
pub use db::Database;
pub use errors::ApiError;
