use actix_web::{App, HttpServer, middleware, web};

use formbase::db;
use formbase::handlers;
use formbase::notify::Broadcaster;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "data/app.db".to_string());
    if let Some(parent) = std::path::Path::new(&database_path).parent() {
        std::fs::create_dir_all(parent).expect("Failed to create data directory");
    }

    let pool = db::init_pool(&database_path);
    db::run_migrations(&pool);

    // One registry for the whole server; every worker shares it.
    let broadcaster = Broadcaster::new();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(broadcaster.clone()))
            .configure(handlers::configure)
            .default_service(web::to(|| async {
                actix_web::HttpResponse::NotFound()
                    .json(serde_json::json!({"error": "Not found"}))
            }))
    })
    .bind(bind_addr)?
    .run()
    .await
}
