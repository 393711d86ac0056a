//! WebSocket transport over real sockets: one message per frame, and the
//! same close semantics as TCP.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use kickoff_transport::{Connection, Transport, WebSocketConnection, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds, connects one client, and returns both ends plus the
    /// transport for further accepts.
    async fn pair() -> (WebSocketTransport, WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let url = format!("ws://{}", transport.local_addr().unwrap());

        let (server, client) = tokio::join!(transport.accept(), tokio_tungstenite::connect_async(&url));
        let server = server.expect("should accept");
        let (client, _) = client.expect("client should connect");
        (transport, server, client)
    }

    #[tokio::test]
    async fn test_websocket_frames_flow_both_ways() {
        let (_transport, server, mut client) = pair().await;

        server.send(br#"{"event":"match_start"}"#).await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), br#"{"event":"match_start"}"#);

        // Text frames from browser clients are accepted too.
        client
            .send(Message::Text(r#"{"event":"match_request"}"#.into()))
            .await
            .unwrap();
        let received = server.recv().await.expect("recv").expect("data");
        assert_eq!(received, br#"{"event":"match_request"}"#);
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (_transport, server, mut client) = pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_close_wakes_blocked_recv() {
        let (_transport, server, mut client) = pair().await;
        let server = std::sync::Arc::new(server);

        let reader = {
            let server = std::sync::Arc::clone(&server);
            tokio::spawn(async move { server.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        server.close().await.expect("close");
        let result = tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("recv should wake")
            .unwrap();
        assert!(matches!(result, Ok(None)));

        // The client sees the close handshake.
        let next = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("client should hear the close");
        assert!(matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))));

        assert!(server.send(b"late").await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_ids_are_distinct_per_connection() {
        let (mut transport, first, _first_client) = pair().await;
        let url = format!("ws://{}", transport.local_addr().unwrap());

        let (second, client) =
            tokio::join!(transport.accept(), tokio_tungstenite::connect_async(&url));
        let second = second.expect("should accept");
        let _second_client = client.expect("connect");

        assert_ne!(first.id(), second.id());
    }
}
