//! Request-level tests for the tapir pipeline.
//!
//! ## Test Modules
//!
//! - **api_tests**: account endpoints end to end
//! - **pipeline_tests**: recovery, rate limiting, authentication ordering
//! - **error_tests**: error-to-response mapping
//! - **config_tests**: configuration loading and validation
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test pipeline_tests
//! ```

pub mod config_tests;

#[cfg(test)]
pub mod support {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::Body,
        extract::connect_info::ConnectInfo,
        http::{header, Request, Response},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::auth::{CredentialHasher, Token, User};
    use crate::config::AppConfig;
    use crate::notify::Notifier;
    use crate::routes;
    use crate::state::AppState;
    use crate::store::{MemoryStore, TokenStore, UserStore};

    pub const CLIENT: ([u8; 4], u16) = ([192, 0, 2, 10], 40000);

    /// Remembers every send so tests can read activation tokens back.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<(String, String, Value)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, recipient: &str, template: &str, data: &Value) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((recipient.to_string(), template.to_string(), data.clone()));
            Ok(())
        }
    }

    impl RecordingNotifier {
        pub fn last_activation_token(&self) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            sent.last().and_then(|(_, _, data)| data["activation_token"].as_str().map(str::to_string))
        }
    }

    pub struct TestApp {
        pub router: Router,
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub notifier: Arc<RecordingNotifier>,
    }

    impl TestApp {
        /// Limiter off, so endpoint tests can send as many requests as they like.
        pub fn new() -> Self {
            let mut config = AppConfig::default();
            config.limiter.enabled = false;
            Self::with_config(config)
        }

        pub fn with_config(config: AppConfig) -> Self {
            let store = Arc::new(MemoryStore::new());
            let notifier = Arc::new(RecordingNotifier::default());
            let state = AppState::new(config, store.clone(), notifier.clone()).with_hasher(CredentialHasher::with_cost(4));
            Self { router: routes::router(state.clone()), state, store, notifier }
        }

        pub async fn send(&self, req: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(req).await.unwrap()
        }

        /// Inserts a user with a real (low-cost) password hash.
        pub async fn seed_user(&self, email: &str, password: &str, activated: bool) -> User {
            let hash = CredentialHasher::with_cost(4).hash(password.to_string()).unwrap();
            let mut user = User::new("reader".to_string(), email.to_string(), hash);
            user.activated = activated;
            self.store.insert(&mut user).await.unwrap();
            user
        }

        pub async fn seed_login(&self, user: &User) -> String {
            let token = Token::authentication(user.id);
            self.store.insert_token(&token).await.unwrap();
            token.plaintext
        }
    }

    pub fn request(method: &str, uri: &str, body: Option<&str>, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let mut req = builder.body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty)).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(CLIENT)));
        req
    }

    pub fn from_client(mut req: Request<Body>, addr: SocketAddr) -> Request<Body> {
        req.extensions_mut().insert(ConnectInfo(addr));
        req
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }
}
