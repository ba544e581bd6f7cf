use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;
use secrecy::Secret;
use serde_json::Value;
use tracing_subscriber::util::SubscriberInitExt;
use waitlist::{
    app::App,
    config::{get_configuration, Settings},
    domain::subscriber::Subscriber,
    store::{InMemorySubscriberStore, StoreError, SubscriberStore},
    telemetry::get_subscriber,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

static TRACING: Lazy<()> = Lazy::new(|| {
    let env_filter = "waitlist=trace,tower_http=trace,axum::rejection=trace";

    if std::env::var("TEST_LOG").is_ok() {
        get_subscriber(env_filter, std::io::stdout).init();
    } else {
        get_subscriber(env_filter, std::io::sink).init();
    };
});

pub struct TestApp {
    pub addr: String,
    pub store: Arc<dyn SubscriberStore>,
    pub email_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_join(&self, body: &str) -> reqwest::Response {
        self.api_client
            .post(format!("{}/waitlist/join", &self.addr))
            .json(&serde_json::from_str::<Value>(body).unwrap())
            .send()
            .await
            .expect("The request should succeed.")
    }

    /// Post `body` to the join endpoint as-is, labelled as JSON.
    pub async fn post_raw_join(&self, body: &str) -> reqwest::Response {
        self.api_client
            .post(format!("{}/waitlist/join", &self.addr))
            .header("Content-Type", "application/json")
            .body(body.to_owned())
            .send()
            .await
            .expect("The request should succeed.")
    }

    pub async fn get_count(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/waitlist/count", &self.addr))
            .send()
            .await
            .expect("The request should succeed.")
    }

    pub async fn get_subscribers(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/waitlist/subscribers", &self.addr))
            .send()
            .await
            .expect("The request should succeed.")
    }

    pub async fn delete_subscriber(&self, email: &str) -> reqwest::Response {
        self.api_client
            .delete(format!("{}/waitlist/subscriber/{}", &self.addr, email))
            .send()
            .await
            .expect("The request should succeed.")
    }

    pub async fn post_bulk_email(&self, body: &Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}/waitlist/bulk-email", &self.addr))
            .json(body)
            .send()
            .await
            .expect("The request should succeed.")
    }

    pub async fn stored_subscribers(&self) -> Vec<Subscriber> {
        self.store
            .list()
            .await
            .expect("The in-memory store should not fail.")
    }

    /// JSON bodies of every request the mock email provider received.
    pub async fn sent_emails(&self) -> Vec<Value> {
        self.email_server
            .received_requests()
            .await
            .expect("Request recording should be enabled.")
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Settings)) -> TestApp {
    spawn_app_with_store(customize, Arc::new(InMemorySubscriberStore::default())).await
}

pub async fn spawn_app_with_store(
    customize: impl FnOnce(&mut Settings),
    store: Arc<dyn SubscriberStore>,
) -> TestApp {
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;
    let mut config = get_configuration().expect("Failed to read configuration.");
    config.application.host = "127.0.0.1".into();
    config.application.port = 0;
    config.email_client.base_url = email_server.uri();
    config.email_client.authorization_token = Some(Secret::new("test-token".into()));
    customize(&mut config);

    let app = App::with(config)
        .await
        .expect("The application should be built.");

    let test_app = TestApp {
        addr: format!("http://127.0.0.1:{}", app.port().unwrap()),
        store: store.clone(),
        email_server,
        api_client: reqwest::Client::new(),
    };

    let _ = tokio::spawn(async move {
        app.serve(store)
            .await
            .expect("The server should be running")
    });

    test_app
}

/// Accept every email sent to the mock provider, expecting `times` of them.
pub async fn accept_emails(app: &TestApp, times: u64) {
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(times)
        .mount(&app.email_server)
        .await;
}

/// Reject every email sent to the mock provider, expecting `times` of them.
pub async fn reject_emails(app: &TestApp, times: u64) {
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(times)
        .mount(&app.email_server)
        .await;
}

/// A store whose every operation fails.
pub struct BrokenStore;

fn broken() -> StoreError {
    StoreError::InvalidRecord("the store is down".into())
}

#[async_trait]
impl SubscriberStore for BrokenStore {
    async fn add_if_absent(&self, _subscriber: &Subscriber) -> Result<bool, StoreError> {
        Err(broken())
    }

    async fn remove(&self, _email: &str) -> Result<bool, StoreError> {
        Err(broken())
    }

    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        Err(broken())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Err(broken())
    }
}

/// An in-memory store that cannot count.
#[derive(Default)]
pub struct UncountableStore(InMemorySubscriberStore);

#[async_trait]
impl SubscriberStore for UncountableStore {
    async fn add_if_absent(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        self.0.add_if_absent(subscriber).await
    }

    async fn remove(&self, email: &str) -> Result<bool, StoreError> {
        self.0.remove(email).await
    }

    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        self.0.list().await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Err(broken())
    }
}

pub fn get_client() -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(reqwest::Client::new())
        .with(TracingMiddleware::default())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}
