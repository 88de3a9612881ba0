use std::sync::{Arc, Mutex};

use axum::{extract::Request, middleware::Next, response::Response};
use rusqlite::Connection;

use super::config::Config;
use super::schema;

pub type ConnectionPool = Arc<Mutex<Connection>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: ConnectionPool,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let conn = Connection::open(&config.database_url).expect("Failed to open database");

        conn.execute(schema::CREATE_SHORT_LINKS, [])
            .expect("Failed to create short_links table");
        conn.execute(schema::CREATE_PUSH_SUBSCRIPTIONS, [])
            .expect("Failed to create push_subscriptions table");

        Self {
            config,
            pool: Arc::new(Mutex::new(conn)),
            http: reqwest::Client::new(),
        }
    }
}

pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::debug!("{} {} -> {}", method, uri, response.status());

    response
}
