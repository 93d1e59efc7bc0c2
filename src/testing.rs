//! Helpers shared by the inline tests.

use axum::Router;
use std::net::TcpListener;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub fn spawn_upstream(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    format!("http://{}", addr)
}
