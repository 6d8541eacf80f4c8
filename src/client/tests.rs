use super::{Connection, ConnectionState, FrameSink};
use crate::auth::Identity;
use std::sync::Arc;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn identity() -> Identity {
    Identity {
        id: 3,
        email: "viewer@demo.com".to_string(),
        role: "viewer".to_string(),
    }
}

#[test]
fn test_connection_new() {
    let (tx, _rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn = Connection::new(identity(), Arc::new(tx));
    assert!(!conn.id.is_empty());
    assert_eq!(conn.state(), ConnectionState::Authenticated);
    assert!(conn.topics().is_empty());
}

#[test]
fn subscribed_topic_tracks_most_recent_join() {
    let (tx, _rx) = mpsc::unbounded_channel::<WsMessage>();
    let mut conn = Connection::new(identity(), Arc::new(tx));

    conn.joined("vehicle_A");
    conn.joined("vehicle_B");
    assert_eq!(conn.subscribed_topic(), Some("vehicle_B"));

    conn.joined("vehicle_A");
    assert_eq!(conn.topics(), ["vehicle_B", "vehicle_A"]);

    conn.left("vehicle_A");
    assert_eq!(
        conn.state(),
        ConnectionState::Subscribed("vehicle_B".to_string())
    );

    conn.left("vehicle_B");
    assert_eq!(conn.state(), ConnectionState::Authenticated);
}

#[test]
fn channel_sink_reports_closed_receiver() {
    let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
    assert!(tx.is_open());
    assert!(FrameSink::send(&tx, WsMessage::text("hi")).is_ok());

    drop(rx);
    assert!(!tx.is_open());
    assert!(FrameSink::send(&tx, WsMessage::text("hi")).is_err());
}
