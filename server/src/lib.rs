//! funkraum-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use axum::Router;
use config::ServerConfig;
use funkraum_core::types::RoomId;
use funkraum_observability::{
    health_router, metrics_router, request_timing_layer, timing_middleware, FunkraumMetrics,
};
use funkraum_signaling::{signaling_router, SignalingState};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    state: Arc<SignalingState>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    ///
    /// Legt die festen Raeume aus `[[raeume]]` an.
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let metriken = FunkraumMetrics::neu()?;
        let state = SignalingState::neu(config.signaling_config(), metriken);
        for raum in &config.raeume {
            state.standard_raum_anlegen(RoomId::from(raum.id.as_str()), &raum.name, raum.max_mitglieder);
        }
        Ok(Self { config, state })
    }

    /// Gemeinsamer Zustand (fuer Tests und Diagnose)
    pub fn state(&self) -> &Arc<SignalingState> {
        &self.state
    }

    /// Setzt alle HTTP-Routen zusammen: `/ws`, `/health`, `/metrics`
    pub fn router(&self, shutdown_rx: watch::Receiver<bool>) -> Router {
        Router::new()
            .merge(signaling_router(Arc::clone(&self.state), shutdown_rx))
            .merge(health_router())
            .merge(metrics_router(self.state.metriken.clone()))
            .layer(axum::middleware::from_fn(timing_middleware))
            .layer(request_timing_layer())
    }

    /// Bindet die konfigurierte Adresse und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let adresse = self.config.bind_adresse();
        let listener = TcpListener::bind(&adresse)
            .await
            .map_err(|e| anyhow::anyhow!("Bind auf {adresse} fehlgeschlagen: {e}"))?;

        self.ausfuehren(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht installiert werden");
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        })
        .await
    }

    /// Bedient Anfragen auf `listener` bis `shutdown` abgeschlossen ist
    ///
    /// Beim Shutdown bekommen alle offenen WebSocket-Verbindungen einen
    /// Close-Frame, danach werden keine neuen Verbindungen angenommen.
    pub async fn ausfuehren<S>(self, listener: TcpListener, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.router(shutdown_rx);

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %listener.local_addr()?,
            max_clients = self.config.server.max_clients,
            heartbeat_sek = self.config.heartbeat.intervall_sek,
            raeume = self.config.raeume.len(),
            "Server laeuft"
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

        tracing::info!(
            uptime_sek = self.state.uptime_sek(),
            "Server beendet"
        );
        Ok(())
    }
}
