// GPS monitor end to end: UDP in, WebSocket out, static page served

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures_util::StreamExt;
use serde_json::Value;
use skyrelay_server::{create_gps_router, GpsHubState, GpsMonitor};
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";

#[tokio::test]
async fn test_fix_reaches_browser() {
    let monitor = GpsMonitor::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let udp_addr = monitor.local_addr().unwrap();
    let state = GpsHubState { fixes: monitor.sender() };
    let udp_task = tokio::spawn(monitor.run());

    let static_dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = listener.local_addr().unwrap();
    let app = create_gps_router(state, static_dir.path());
    let http_task = tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", http_addr))
        .await
        .unwrap();

    // keep sending until the socket has subscribed and forwards a fix
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            sender.send_to(GGA.as_bytes(), udp_addr).await.unwrap();
            match tokio::time::timeout(Duration::from_millis(100), ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => return text,
                Ok(Some(Ok(_))) | Err(_) => continue,
                Ok(other) => panic!("websocket ended: {:?}", other),
            }
        }
    })
    .await
    .unwrap();

    let json: Value = serde_json::from_str(&received).unwrap();
    assert_eq!(json["event"], "gps");
    assert_eq!(json["data"]["type"], "GGA");
    assert!((json["data"]["lat"].as_f64().unwrap() - 48.1173).abs() < 1e-4);
    assert!((json["data"]["alt"].as_f64().unwrap() - 545.4).abs() < 0.01);

    udp_task.abort();
    http_task.abort();
}

#[tokio::test]
async fn test_static_page_served() {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<h1>gps</h1>").unwrap();

    let (fixes, _) = tokio::sync::broadcast::channel(4);
    let app = create_gps_router(GpsHubState { fixes }, static_dir.path());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"<h1>gps</h1>");

    let response = app
        .oneshot(Request::builder().uri("/missing.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
