use std::{io, net::IpAddr, sync::Arc};

use anyhow::Context;
use axum::{http::Request, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::{BulkEmailSettings, Settings, WaitlistSettings},
    email::{EmailClient, EmailError},
    store::SubscriberStore,
};

mod error;
mod extractor;
mod health;
mod waitlist;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn SubscriberStore>,
    email_client: Option<EmailClient>,
    waitlist: WaitlistSettings,
    bulk_email: BulkEmailSettings,
}

impl AppState {
    /// The email integration, or [`EmailError::NotConfigured`] when the
    /// provider credential was not supplied.
    fn email_client(&self) -> Result<&EmailClient, EmailError> {
        self.email_client.as_ref().ok_or(EmailError::NotConfigured)
    }
}

fn app_router() -> Router<AppState> {
    health::router().merge(waitlist::router())
}

pub struct App {
    listener: TcpListener,
    email_client: Option<EmailClient>,
    waitlist: WaitlistSettings,
    bulk_email: BulkEmailSettings,
}

impl App {
    pub async fn with(config: Settings) -> anyhow::Result<Self> {
        let email_client = config
            .email_client
            .client()
            .context("Invalid email client configuration.")?;

        let listener = tokio::net::TcpListener::bind(format!(
            "{}:{}",
            config.application.host, config.application.port
        ))
        .await
        .context("The listener should be able to bind the address.")?;

        Ok(Self {
            listener,
            email_client,
            waitlist: config.waitlist,
            bulk_email: config.bulk_email,
        })
    }

    pub fn host(&self) -> io::Result<IpAddr> {
        Ok(self.listener.local_addr()?.ip())
    }

    pub fn port(&self) -> io::Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    pub async fn serve(self, store: Arc<dyn SubscriberStore>) -> Result<(), io::Error> {
        let app = app_router()
            .with_state(AppState {
                store,
                email_client: self.email_client,
                waitlist: self.waitlist,
                bulk_email: self.bulk_email,
            })
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                    let id = uuid::Uuid::new_v4();
                    tracing::info_span!(
                        "request",
                        method = ?request.method(),
                        uri = ?request.uri(),
                        %id,
                    )
                }),
            );

        axum::serve(self.listener, app.into_make_service()).await
    }
}
