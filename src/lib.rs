use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

pub mod config;
pub mod errors;
mod middleware;
mod models;
mod pages;
mod push;
mod registry;
mod routes;
mod schema;
mod utils;

use self::config::Config;
pub use self::middleware::AppState;
pub use self::utils::{generate_code, slugify};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::home).post(routes::submit))
        .route("/subscribe", post(routes::subscribe))
        .route("/sw.js", get(routes::service_worker))
        .route("/:code", get(routes::follow))
        .route("/:code/", get(routes::follow))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::logging_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run(host: &str, port: u16, config: Config) {
    let state = AppState::new(config);
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .expect("Failed to bind listener");

    tracing::info!("listening on {}:{}", host, port);

    axum::serve(listener, router(state))
        .await
        .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::config::Config;
    use super::*;
    use axum_test::TestServer;
    use hyper::StatusCode;

    fn create_test_server() -> TestServer {
        let config = Config::new(
            String::from(":memory:"),
            String::from("http://localhost"),
            None,
            None,
            String::from("mailto:admin@example.com"),
        );

        TestServer::new(router(AppState::new(config))).unwrap()
    }

    async fn post_form(server: &TestServer, pairs: &[(&str, &str)]) -> axum_test::TestResponse {
        let body = serde_urlencoded::to_string(pairs).unwrap();
        server
            .post("/")
            .bytes(body.into_bytes().into())
            .content_type(mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
            .await
    }

    fn extract_short_code(html: &str) -> String {
        let marker = "data-short-code=\"";
        let start = html.find(marker).expect("no created panel in page") + marker.len();
        let end = html[start..].find('"').unwrap();
        html[start..start + end].to_string()
    }

    async fn create_link(server: &TestServer, url: &str, alias: &str) -> String {
        let response = post_form(
            server,
            &[("action", "create"), ("original_url", url), ("custom_alias", alias)],
        )
        .await;
        response.assert_status(StatusCode::SEE_OTHER);

        let location = response.header("location");
        let page = server.get(location.to_str().unwrap()).await;
        page.assert_status_ok();
        extract_short_code(&page.text())
    }

    #[tokio::test]
    async fn create_without_alias_yields_six_char_code() {
        let server = create_test_server();
        let code = create_link(&server, "https://example.com/a/b", "").await;

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

        let response = server.get(&format!("/{}/", code)).await;
        response.assert_status(StatusCode::FOUND);
        assert_eq!(
            response.header("location").to_str().unwrap(),
            "https://example.com/a/b"
        );
    }

    #[tokio::test]
    async fn click_count_appears_on_home_page() {
        let server = create_test_server();
        let response = post_form(
            &server,
            &[
                ("action", "create"),
                ("original_url", "https://example.com/a/b"),
                ("custom_alias", "counted"),
            ],
        )
        .await;
        response.assert_status(StatusCode::SEE_OTHER);
        let location = response.header("location").to_str().unwrap().to_string();

        server
            .get("/counted/")
            .await
            .assert_status(StatusCode::FOUND);

        let page = server.get(&location).await;
        assert!(page.text().contains("<span id=\"click-count\">1</span>"));
    }

    #[tokio::test]
    async fn custom_alias_is_slugified() {
        let server = create_test_server();
        let code = create_link(&server, "https://example.com", "Promo Akhir Tahun!").await;
        assert_eq!(code, "promo-akhir-tahun");

        let response = server.get("/promo-akhir-tahun/").await;
        response.assert_status(StatusCode::FOUND);
    }

    #[tokio::test]
    async fn redirect_works_without_trailing_slash() {
        let server = create_test_server();
        create_link(&server, "https://example.com", "no-slash").await;

        let response = server.get("/no-slash").await;
        response.assert_status(StatusCode::FOUND);
    }

    #[tokio::test]
    async fn duplicate_alias_is_rejected() {
        let server = create_test_server();
        create_link(&server, "https://example.com/1", "sale").await;

        let response = post_form(
            &server,
            &[
                ("action", "create"),
                ("original_url", "https://example.com/2"),
                ("custom_alias", "sale"),
            ],
        )
        .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.text().contains("already taken"));
    }

    #[tokio::test]
    async fn too_short_alias_is_rejected_with_field_error() {
        let server = create_test_server();
        let response = post_form(
            &server,
            &[
                ("action", "create"),
                ("original_url", "https://example.com"),
                ("custom_alias", "ab"),
            ],
        )
        .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response.text().contains("at least 3"));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_and_form_stays_sticky() {
        let server = create_test_server();
        let response = post_form(
            &server,
            &[
                ("action", "create"),
                ("original_url", "not a url"),
                ("custom_alias", ""),
            ],
        )
        .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let page = response.text();
        assert!(page.contains("Enter a valid URL."));
        assert!(page.contains("value=\"not a url\""));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let server = create_test_server();
        let response = server.get("/does-not-exist/").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn alias_can_be_renamed_and_old_code_stops_working() {
        let server = create_test_server();
        create_link(&server, "https://example.com", "before").await;

        let response = post_form(
            &server,
            &[
                ("action", "update"),
                ("link_id", "1"),
                ("new_alias", "After Rename"),
            ],
        )
        .await;
        response.assert_status(StatusCode::SEE_OTHER);

        server
            .get("/after-rename/")
            .await
            .assert_status(StatusCode::FOUND);
        server
            .get("/before/")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn renaming_to_own_alias_is_allowed() {
        let server = create_test_server();
        create_link(&server, "https://example.com", "same-name").await;

        let response = post_form(
            &server,
            &[
                ("action", "update"),
                ("link_id", "1"),
                ("new_alias", "Same Name"),
            ],
        )
        .await;
        response.assert_status(StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn renaming_unknown_link_is_not_found() {
        let server = create_test_server();
        let response = post_form(
            &server,
            &[
                ("action", "update"),
                ("link_id", "42"),
                ("new_alias", "whatever"),
            ],
        )
        .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn concurrent_hits_each_count() {
        let server = create_test_server();
        create_link(&server, "https://example.com", "racing").await;

        let (a, b, c) = tokio::join!(
            server.get("/racing/"),
            server.get("/racing/"),
            server.get("/racing/"),
        );
        a.assert_status(StatusCode::FOUND);
        b.assert_status(StatusCode::FOUND);
        c.assert_status(StatusCode::FOUND);

        let page = server.get("/?created=1").await;
        assert!(page.text().contains("<span id=\"click-count\">3</span>"));
    }

    #[tokio::test]
    async fn subscribe_stores_push_subscription() {
        let server = create_test_server();
        let response = server
            .post("/subscribe")
            .json(&serde_json::json!({
                "endpoint": "https://push.example/device-1",
                "keys": { "p256dh": "pkey", "auth": "akey" }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        // Re-registering the same endpoint must not conflict.
        let response = server
            .post("/subscribe")
            .json(&serde_json::json!({
                "endpoint": "https://push.example/device-1",
                "keys": { "p256dh": "pkey2", "auth": "akey2" }
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    #[tokio::test]
    async fn service_worker_is_served() {
        let server = create_test_server();
        let response = server.get("/sw.js").await;
        response.assert_status_ok();
        assert!(response.text().contains("addEventListener(\"push\""));
    }
}
