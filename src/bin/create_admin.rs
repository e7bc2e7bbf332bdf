//! Seeds an account ahead of time so it does not depend on a first login.
//!
//! Reads `ADMIN_USERNAME` (default `admin`), `ADMIN_PASSWORD` (default
//! `admin123`) and `DATABASE_PATH` (default `todo.db`), also from `.env`.

use dotenv::dotenv;
use log::{error, info, warn};
use std::env;
use std::process::ExitCode;

use todo_service::{password, Database};

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let plain = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
    let database_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "todo.db".to_string());

    let db = match Database::open(&database_path) {
        Ok(db) => db,
        Err(e) => {
            error!("failed to open database {database_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = create_admin(&db, &username, &plain);
    if let Err(e) = db.close() {
        warn!("database did not close cleanly: {e}");
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to create admin account: {e}");
            ExitCode::FAILURE
        }
    }
}

fn create_admin(db: &Database, username: &str, plain: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("creating admin account '{username}'");

    if let Some(existing) = db.find_user_by_username(username)? {
        warn!(
            "account already exists: id {}, created {}",
            existing.id, existing.created_at
        );
        return Ok(());
    }

    let hashed = password::hash(plain)?;
    let admin = db.create_user(username, &hashed)?;
    info!("admin account created: id {}, username {}", admin.id, admin.username);
    Ok(())
}
