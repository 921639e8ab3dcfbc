//! End-to-End-Tests: echter axum-Server auf einem freien Port,
//! Clients ueber tokio-tungstenite bzw. die Funkraum-Client-Runtime

use funkraum_client::{ReconnectStrategie, SignalingClient, VerbindungsStatus};
use funkraum_protocol::{AnnouncedUser, ClientMessage, ServerMessage};
use funkraum_server::{config::ServerConfig, Server};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ZEITLIMIT: Duration = Duration::from_secs(5);

struct LaufenderServer {
    adresse: SocketAddr,
    stopp: oneshot::Sender<()>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn server_starten(config: ServerConfig) -> LaufenderServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let adresse = listener.local_addr().unwrap();
    let (stopp, stopp_rx) = oneshot::channel::<()>();
    let server = Server::neu(config).unwrap();
    let task = tokio::spawn(server.ausfuehren(listener, async {
        let _ = stopp_rx.await;
    }));
    LaufenderServer {
        adresse,
        stopp,
        task,
    }
}

async fn ws_verbinden(adresse: SocketAddr) -> Ws {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{adresse}/ws"))
        .await
        .unwrap();
    ws
}

async fn senden(ws: &mut Ws, wert: Value) {
    ws.send(Message::Text(wert.to_string().into())).await.unwrap();
}

/// Naechste JSON-Nachricht (Ping/Pong werden uebersprungen)
async fn naechste(ws: &mut Ws) -> Value {
    loop {
        let frame = tokio::time::timeout(ZEITLIMIT, ws.next())
            .await
            .expect("Zeitlimit")
            .expect("Verbindung offen")
            .expect("kein Lesefehler");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Ueberspringt Nachrichten bis zum gewuenschten Typ
async fn warte_auf(ws: &mut Ws, typ: &str) -> Value {
    loop {
        let wert = naechste(ws).await;
        if wert["type"] == typ {
            return wert;
        }
    }
}

async fn anmelden(adresse: SocketAddr, id: &str) -> Ws {
    let mut ws = ws_verbinden(adresse).await;
    senden(&mut ws, json!({"type": "announce", "user": {"id": id, "name": id}})).await;
    warte_auf(&mut ws, "rooms-updated").await;
    ws
}

async fn http_get(adresse: SocketAddr, pfad: &str) -> String {
    let mut stream = TcpStream::connect(adresse).await.unwrap();
    stream
        .write_all(
            format!("GET {pfad} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                .as_bytes(),
        )
        .await
        .unwrap();
    let mut antwort = String::new();
    tokio::time::timeout(ZEITLIMIT, stream.read_to_string(&mut antwort))
        .await
        .expect("Zeitlimit")
        .unwrap();
    antwort
}

fn mitglieder_ids(wert: &Value) -> Vec<String> {
    let mut ids: Vec<String> = wert["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_liefert_festen_body() {
    let server = server_starten(ServerConfig::default()).await;

    let antwort = http_get(server.adresse, "/health").await;
    assert!(antwort.starts_with("HTTP/1.1 200"), "{antwort}");
    assert!(antwort.contains(&format!(
        r#"{{"status":"healthy","version":"{}"}}"#,
        env!("CARGO_PKG_VERSION")
    )));

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn zwei_clients_signalisieren_ueber_den_server() {
    let server = server_starten(ServerConfig::default()).await;

    let mut a = ws_verbinden(server.adresse).await;
    senden(&mut a, json!({"type": "announce", "user": {"id": "A", "name": "Anna"}})).await;
    let raeume = warte_auf(&mut a, "rooms-updated").await;
    let ids: Vec<&str> = raeume["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["lobby", "general", "music"]);

    senden(&mut a, json!({"type": "join-room", "roomId": "lobby", "userId": "A"})).await;
    let beigetreten = warte_auf(&mut a, "joined-room").await;
    assert_eq!(beigetreten["room"]["id"], "lobby");
    assert_eq!(beigetreten["user"]["id"], "A");
    assert!(beigetreten["room"].get("password").is_none());
    let allein = warte_auf(&mut a, "room-members-updated").await;
    assert_eq!(mitglieder_ids(&allein), vec!["A"]);

    let mut b = anmelden(server.adresse, "B").await;
    senden(&mut b, json!({"type": "join-room", "roomId": "lobby", "userId": "B"})).await;
    warte_auf(&mut b, "joined-room").await;

    let update = warte_auf(&mut a, "room-members-updated").await;
    assert_eq!(mitglieder_ids(&update), vec!["A", "B"]);

    let payload = r#"{"type":"offer","sdp":"v=0\r\n","x":  [1, 2]}"#;
    a.send(Message::Text(
        format!(r#"{{"type":"signal","fromId":"A","toId":"B","roomId":"lobby","payload":{payload}}}"#)
            .into(),
    ))
    .await
    .unwrap();

    let signal = loop {
        let frame = tokio::time::timeout(ZEITLIMIT, b.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            if text.as_str().contains(r#""type":"signal""#) {
                break text.as_str().to_owned();
            }
        }
    };
    assert!(signal.contains(payload), "Payload muss byte-identisch sein: {signal}");
    let wert: Value = serde_json::from_str(&signal).unwrap();
    assert_eq!(wert["fromId"], "A");

    // B trennt: A bekommt left-room und die neue Mitgliederliste
    b.close(None).await.unwrap();
    let weg = warte_auf(&mut a, "left-room").await;
    assert_eq!(weg["userId"], "B");
    let update = warte_auf(&mut a, "room-members-updated").await;
    assert_eq!(mitglieder_ids(&update), vec!["A"]);

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn ungueltiger_frame_liefert_fehlercode() {
    let server = server_starten(ServerConfig::default()).await;
    let mut a = ws_verbinden(server.adresse).await;

    a.send(Message::Text("kein json".into())).await.unwrap();
    let fehler = naechste(&mut a).await;
    assert_eq!(fehler["type"], "error");
    assert_eq!(fehler["code"], "INVALID_REQUEST");

    senden(&mut a, json!({"type": "join-room", "roomId": "lobby", "userId": "x"})).await;
    let fehler = naechste(&mut a).await;
    assert_eq!(fehler["code"], "NOT_ANNOUNCED");

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn verdraengte_verbindung_wird_geschlossen() {
    let server = server_starten(ServerConfig::default()).await;
    let mut alt = anmelden(server.adresse, "alice").await;
    let _neu = anmelden(server.adresse, "alice").await;

    let fehler = warte_auf(&mut alt, "error").await;
    assert_eq!(fehler["code"], "SESSION_REPLACED");

    let ende = tokio::time::timeout(ZEITLIMIT, async {
        loop {
            match alt.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ende.is_ok(), "alte Verbindung muss geschlossen werden");

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn verbindungslimit_lehnt_mit_503_ab() {
    let mut config = ServerConfig::default();
    config.server.max_clients = 1;
    let server = server_starten(config).await;

    let _erste = anmelden(server.adresse, "a").await;

    match tokio_tungstenite::connect_async(format!("ws://{}/ws", server.adresse)).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(antwort)) => {
            assert_eq!(antwort.status(), 503);
        }
        anderes => panic!("Erwartet HTTP 503, erhalten {:?}", anderes.map(|_| ())),
    }

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn metriken_zaehlen_verbindungen() {
    let server = server_starten(ServerConfig::default()).await;
    let _a = anmelden(server.adresse, "a").await;

    let antwort = http_get(server.adresse, "/metrics").await;
    assert!(antwort.starts_with("HTTP/1.1 200"), "{antwort}");
    assert!(antwort.contains("funkraum_connected_clients 1"));
    assert!(antwort.contains("funkraum_rooms 3"));

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn stumme_verbindung_wird_nach_heartbeat_getrennt() {
    let mut config = ServerConfig::default();
    config.heartbeat.intervall_sek = 1;
    let server = server_starten(config).await;

    let mut a = anmelden(server.adresse, "a").await;
    senden(&mut a, json!({"type": "join-room", "roomId": "lobby", "userId": "a"})).await;
    let mut b = anmelden(server.adresse, "b").await;
    senden(&mut b, json!({"type": "join-room", "roomId": "lobby", "userId": "b"})).await;
    let update = warte_auf(&mut b, "room-members-updated").await;
    assert_eq!(mitglieder_ids(&update), vec!["a", "b"]);

    // a liest nicht mehr und beantwortet damit keine Pings
    let weg = warte_auf(&mut b, "left-room").await;
    assert_eq!(weg["userId"], "a");
    let update = warte_auf(&mut b, "room-members-updated").await;
    assert_eq!(mitglieder_ids(&update), vec!["b"]);
    drop(a);

    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_schliesst_offene_verbindungen() {
    let server = server_starten(ServerConfig::default()).await;
    let mut a = anmelden(server.adresse, "a").await;

    let _ = server.stopp.send(());

    let ende = tokio::time::timeout(ZEITLIMIT, async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ende.is_ok());
    server.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn client_runtime_gegen_echten_server() {
    let server = server_starten(ServerConfig::default()).await;

    let mut client = SignalingClient::verbinden(
        format!("ws://{}/ws", server.adresse),
        AnnouncedUser {
            id: Some("runtime".into()),
            name: "Runtime".into(),
            ..Default::default()
        },
        ReconnectStrategie::default(),
    );

    let erstes = tokio::time::timeout(ZEITLIMIT, client.naechstes_ereignis())
        .await
        .unwrap();
    assert!(matches!(erstes, Some(ServerMessage::RoomsUpdated { .. })));
    assert_eq!(client.status(), VerbindungsStatus::Verbunden);

    client
        .senden(ClientMessage::JoinRoom {
            room_id: "music".into(),
            user_id: "runtime".into(),
            password: None,
        })
        .await
        .unwrap();

    let beigetreten = tokio::time::timeout(ZEITLIMIT, async {
        loop {
            match client.naechstes_ereignis().await {
                Some(ServerMessage::JoinedRoom { room, user }) => break (room, user),
                Some(_) => {}
                None => panic!("Client beendet"),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(beigetreten.0.id.as_str(), "music");
    assert_eq!(beigetreten.1.id.as_str(), "runtime");

    client.beenden().await;
    let _ = server.stopp.send(());
    server.task.await.unwrap().unwrap();
}
