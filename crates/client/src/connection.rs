//! WebSocket-Verbindung zum Funkraum-Signaling-Server
//!
//! `SignalingClient` startet einen Hintergrund-Task, der die Verbindung
//! aufbaut, nach jedem (Re-)Connect `announce` sendet und eingehende
//! `ServerMessage`s als Ereignisse weiterreicht. Bricht die Verbindung ab,
//! wird nach der `ReconnectStrategie` neu verbunden.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use funkraum_protocol::{
    wire::server_nachricht_dekodieren, AnnouncedUser, ClientMessage, Dekodiert, ServerMessage,
};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{ClientError, ClientResult};
use crate::reconnect::ReconnectStrategie;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Groesse der Ereignis- und Befehls-Queues
const QUEUE_GROESSE: usize = 256;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Verbindungsstatus des Clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsStatus {
    /// Verbindungsaufbau laeuft
    Verbindend,
    /// Verbunden und angemeldet
    Verbunden,
    /// Getrennt, naechster Versuch folgt (0 = vom Benutzer beendet)
    Getrennt { versuch: u32 },
    /// Alle Versuche fehlgeschlagen, keine weiteren Reconnects
    Aufgegeben,
}

// ---------------------------------------------------------------------------
// SignalingClient
// ---------------------------------------------------------------------------

/// Verbindung zum Signaling-Server mit automatischem Reconnect
pub struct SignalingClient {
    befehl_tx: mpsc::Sender<ClientMessage>,
    ereignis_rx: mpsc::Receiver<ServerMessage>,
    status_rx: watch::Receiver<VerbindungsStatus>,
    stopp_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SignalingClient {
    /// Startet den Verbindungs-Task (benoetigt eine laufende Tokio-Runtime)
    ///
    /// `url` ist die WebSocket-URL des Servers, z.B. `ws://host:8080/ws`.
    pub fn verbinden(
        url: impl Into<String>,
        ankuendigung: AnnouncedUser,
        strategie: ReconnectStrategie,
    ) -> Self {
        let (befehl_tx, befehl_rx) = mpsc::channel(QUEUE_GROESSE);
        let (ereignis_tx, ereignis_rx) = mpsc::channel(QUEUE_GROESSE);
        let (status_tx, status_rx) = watch::channel(VerbindungsStatus::Verbindend);
        let (stopp_tx, stopp_rx) = watch::channel(false);

        let task = tokio::spawn(verbindungs_schleife(
            url.into(),
            ankuendigung,
            strategie,
            Kanaele {
                befehl_rx,
                ereignis_tx,
                status_tx,
                stopp_rx,
            },
        ));

        Self {
            befehl_tx,
            ereignis_rx,
            status_rx,
            stopp_tx,
            task,
        }
    }

    /// Reiht eine Nachricht an den Server ein
    ///
    /// Waehrend eines Reconnects bleibt die Nachricht in der Queue und wird
    /// nach dem erneuten `announce` gesendet.
    pub async fn senden(&self, nachricht: ClientMessage) -> ClientResult<()> {
        if self.status() == VerbindungsStatus::Aufgegeben {
            return Err(ClientError::NichtVerbunden);
        }
        self.befehl_tx
            .send(nachricht)
            .await
            .map_err(|_| ClientError::Beendet)
    }

    /// Wartet auf die naechste Server-Nachricht (`None` wenn beendet)
    pub async fn naechstes_ereignis(&mut self) -> Option<ServerMessage> {
        self.ereignis_rx.recv().await
    }

    /// Aktueller Verbindungsstatus
    pub fn status(&self) -> VerbindungsStatus {
        *self.status_rx.borrow()
    }

    /// Beobachter fuer Statuswechsel
    pub fn status_beobachten(&self) -> watch::Receiver<VerbindungsStatus> {
        self.status_rx.clone()
    }

    /// Schliesst die Verbindung und wartet auf das Ende des Tasks
    pub async fn beenden(self) {
        let _ = self.stopp_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(fehler = %e, "Verbindungs-Task abgebrochen");
        }
    }
}

// ---------------------------------------------------------------------------
// Hintergrund-Task
// ---------------------------------------------------------------------------

struct Kanaele {
    befehl_rx: mpsc::Receiver<ClientMessage>,
    ereignis_tx: mpsc::Sender<ServerMessage>,
    status_tx: watch::Sender<VerbindungsStatus>,
    stopp_rx: watch::Receiver<bool>,
}

enum SitzungsEnde {
    Getrennt,
    Beendet,
}

async fn verbindungs_schleife(
    url: String,
    ankuendigung: AnnouncedUser,
    strategie: ReconnectStrategie,
    mut k: Kanaele,
) {
    let mut versuch = 0u32;

    loop {
        if *k.stopp_rx.borrow() || k.ereignis_tx.is_closed() {
            break;
        }
        k.status_tx.send_replace(VerbindungsStatus::Verbindend);
        tracing::info!(url = %url, versuch, "Verbinde mit Signaling-Server");

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                versuch = 0;
                k.status_tx.send_replace(VerbindungsStatus::Verbunden);
                tracing::info!(url = %url, "WebSocket-Verbindung hergestellt");

                match sitzung_fuehren(ws, &ankuendigung, &mut k).await {
                    SitzungsEnde::Beendet => break,
                    SitzungsEnde::Getrennt => {
                        tracing::warn!(url = %url, "Verbindung zum Server verloren");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, fehler = %e, "Verbindung fehlgeschlagen");
            }
        }

        versuch += 1;
        let Some(wartezeit) = strategie.verzoegerung(versuch) else {
            tracing::warn!(url = %url, versuche = strategie.max_versuche, "Reconnect aufgegeben");
            k.status_tx.send_replace(VerbindungsStatus::Aufgegeben);
            return;
        };
        k.status_tx
            .send_replace(VerbindungsStatus::Getrennt { versuch });
        tracing::debug!(versuch, wartezeit_ms = wartezeit.as_millis() as u64, "Warte vor Reconnect");

        tokio::select! {
            _ = tokio::time::sleep(wartezeit) => {}
            _ = k.stopp_rx.changed() => {}
        }
    }

    k.status_tx
        .send_replace(VerbindungsStatus::Getrennt { versuch: 0 });
    tracing::info!(url = %url, "Client beendet");
}

/// Fuehrt eine einzelne Verbindung bis zu ihrem Ende
async fn sitzung_fuehren(
    ws: WsStream,
    ankuendigung: &AnnouncedUser,
    k: &mut Kanaele,
) -> SitzungsEnde {
    let (mut schreiber, mut leser) = ws.split();

    let announce = ClientMessage::Announce {
        user: ankuendigung.clone(),
    };
    if let Err(e) = nachricht_schreiben(&mut schreiber, &announce).await {
        tracing::warn!(fehler = %e, "announce konnte nicht gesendet werden");
        return SitzungsEnde::Getrennt;
    }

    loop {
        tokio::select! {
            eingang = leser.next() => match eingang {
                Some(Ok(Message::Text(text))) => match server_nachricht_dekodieren(text.as_str()) {
                    Ok(Dekodiert::Nachricht(nachricht)) => {
                        if k.ereignis_tx.send(nachricht).await.is_err() {
                            let _ = schreiber.send(Message::Close(None)).await;
                            return SitzungsEnde::Beendet;
                        }
                    }
                    Ok(Dekodiert::Unbekannt(typ)) => {
                        tracing::debug!(typ = %typ, "Unbekannter Nachrichtentyp vom Server");
                    }
                    Err(e) => {
                        tracing::debug!(fehler = %e, "Ungueltige Nachricht vom Server");
                    }
                },
                Some(Ok(Message::Close(_))) | None => return SitzungsEnde::Getrennt,
                // Ping/Pong beantwortet tungstenite selbst
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(fehler = %e, "WebSocket-Fehler");
                    return SitzungsEnde::Getrennt;
                }
            },

            befehl = k.befehl_rx.recv() => match befehl {
                Some(nachricht) => {
                    if let Err(e) = nachricht_schreiben(&mut schreiber, &nachricht).await {
                        tracing::warn!(fehler = %e, typ = nachricht.typ(), "Senden fehlgeschlagen");
                        return SitzungsEnde::Getrennt;
                    }
                }
                None => {
                    let _ = schreiber.send(Message::Close(None)).await;
                    return SitzungsEnde::Beendet;
                }
            },

            _ = k.stopp_rx.changed() => {
                let _ = schreiber.send(Message::Close(None)).await;
                return SitzungsEnde::Beendet;
            }
        }
    }
}

async fn nachricht_schreiben(
    schreiber: &mut SplitSink<WsStream, Message>,
    nachricht: &ClientMessage,
) -> ClientResult<()> {
    let json = nachricht.to_json()?;
    schreiber.send(Message::Text(json.into())).await?;
    Ok(())
}
