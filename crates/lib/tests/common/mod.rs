//! Shared test helpers: an in-process stand-in for the gateway API and
//! free-port allocation for the kit's own servers.

#![allow(dead_code)]

use axum::Router;
use lib::config::Credentials;
use std::time::Duration;

/// Serve `app` on an OS-assigned loopback port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock gateway");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

pub fn credentials(base_url: &str) -> Credentials {
    Credentials::new(base_url, "sms", "secret", Duration::from_secs(5)).expect("credentials")
}
