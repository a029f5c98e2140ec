#![allow(dead_code)]

use axum::Router;
use std::net::TcpListener;

/// Serve `app` on an ephemeral localhost port; returns the base URL.
pub fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(async move {
        server.await.unwrap();
    });
    format!("http://{}", addr)
}
