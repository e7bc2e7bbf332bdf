use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use std::io;

use todo_service::{routes, AppConfig, Database, TokenService};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.database_path).map_err(|e| {
        error!("failed to open database {}: {e}", config.database_path);
        io::Error::other(e.to_string())
    })?;
    info!("using database {}", config.database_path);

    let db = web::Data::new(db);
    let tokens = web::Data::new(TokenService::new(
        config.jwt_secret.as_bytes(),
        config.token_ttl,
    ));

    info!(
        "starting server on http://{}:{}",
        config.server_host, config.server_port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(tokens.clone())
            .wrap(Logger::default())
            .configure(routes::configure)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}

// curl -X POST http://127.0.0.1:8080/api/auth/login -H "Content-Type: application/json" -d '{"username": "alice", "password": "hunter22"}'
