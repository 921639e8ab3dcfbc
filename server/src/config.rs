//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt
//! `netzwerk.port`.

use funkraum_core::{FunkraumError, Result};
use funkraum_observability::logging::{log_format_gueltig, log_level_gueltig};
use funkraum_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Heartbeat der WebSocket-Verbindungen
    pub heartbeat: HeartbeatEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Feste Raeume, die bei jedem Start angelegt werden
    pub raeume: Vec<RaumVorgabe>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerEinstellungen::default(),
            netzwerk: NetzwerkEinstellungen::default(),
            heartbeat: HeartbeatEinstellungen::default(),
            logging: LoggingEinstellungen::default(),
            raeume: RaumVorgabe::standard(),
        }
    }
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Maximale Anzahl gleichzeitiger WebSocket-Verbindungen
    pub max_clients: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Funkraum".into(),
            max_clients: 512,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Heartbeat-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatEinstellungen {
    /// Abstand zwischen zwei Pings in Sekunden
    pub intervall_sek: u64,
}

impl Default for HeartbeatEinstellungen {
    fn default() -> Self {
        Self { intervall_sek: 30 }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Ein fester Raum aus der Konfiguration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaumVorgabe {
    pub id: String,
    pub name: String,
    #[serde(default = "standard_max_mitglieder")]
    pub max_mitglieder: u32,
}

fn standard_max_mitglieder() -> u32 {
    10
}

impl RaumVorgabe {
    /// lobby (20), general (10), music (10)
    pub fn standard() -> Vec<Self> {
        [("lobby", "Lobby", 20), ("general", "General", 10), ("music", "Music", 10)]
            .into_iter()
            .map(|(id, name, max)| Self {
                id: id.into(),
                name: name.into(),
                max_mitglieder: max,
            })
            .collect()
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Gibt `None` zurueck wenn die Datei nicht existiert; der Aufrufer
    /// verwendet dann die Standardwerte.
    pub fn laden(pfad: &str) -> Result<Option<Self>> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt).map(Some).map_err(|e| {
                FunkraumError::konfiguration(format!("Konfigurationsfehler in '{pfad}': {e}"))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FunkraumError::Io(e)),
        }
    }

    /// Uebernimmt den Wert der Umgebungsvariable `PORT`, falls gesetzt
    pub fn port_ueberschreiben(&mut self, port: Option<&str>) -> Result<()> {
        let Some(wert) = port.map(str::trim).filter(|w| !w.is_empty()) else {
            return Ok(());
        };
        self.netzwerk.port = wert.parse().map_err(|e| {
            FunkraumError::konfiguration(format!("Ungueltiger Wert fuer PORT '{wert}': {e}"))
        })?;
        Ok(())
    }

    /// Prueft die Konfiguration auf unsinnige Werte
    pub fn pruefen(&self) -> Result<()> {
        let fehler = |msg: String| Err(FunkraumError::konfiguration(msg));

        if self.server.max_clients == 0 {
            return fehler("server.max_clients muss groesser als 0 sein".into());
        }
        if self.heartbeat.intervall_sek == 0 {
            return fehler("heartbeat.intervall_sek muss groesser als 0 sein".into());
        }
        if !log_level_gueltig(&self.logging.level) {
            return fehler(format!("Unbekanntes Log-Level: {}", self.logging.level));
        }
        if !log_format_gueltig(&self.logging.format) {
            return fehler(format!("Unbekanntes Log-Format: {}", self.logging.format));
        }
        for (i, raum) in self.raeume.iter().enumerate() {
            if raum.id.trim().is_empty() {
                return fehler(format!("raeume[{i}]: id darf nicht leer sein"));
            }
            if raum.max_mitglieder < 2 {
                return fehler(format!(
                    "raeume[{i}] '{}': max_mitglieder muss mindestens 2 sein",
                    raum.id
                ));
            }
            if self.raeume[..i].iter().any(|r| r.id == raum.id) {
                return fehler(format!("raeume: doppelte id '{}'", raum.id));
            }
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Einstellungen fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_clients: self.server.max_clients,
            heartbeat_intervall: Duration::from_secs(self.heartbeat.intervall_sek),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 512);
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.heartbeat.intervall_sek, 30);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.raeume.len(), 3);
        cfg.pruefen().unwrap();
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:8080");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Server"
            max_clients = 100

            [netzwerk]
            port = 9000

            [[raeume]]
            id = "werkstatt"
            name = "Werkstatt"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Server");
        assert_eq!(cfg.server.max_clients, 100);
        assert_eq!(cfg.netzwerk.port, 9000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.heartbeat.intervall_sek, 30);
        // Eigene Raeume ersetzen die Standardraeume
        assert_eq!(
            cfg.raeume,
            vec![RaumVorgabe {
                id: "werkstatt".into(),
                name: "Werkstatt".into(),
                max_mitglieder: 10,
            }]
        );
    }

    #[test]
    fn ohne_raeume_abschnitt_gelten_standardraeume() {
        let cfg: ServerConfig = toml::from_str("[logging]\nformat = \"json\"\n").unwrap();
        let ids: Vec<&str> = cfg.raeume.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["lobby", "general", "music"]);
        assert_eq!(cfg.raeume[0].max_mitglieder, 20);
    }

    #[test]
    fn port_aus_umgebung() {
        let mut cfg = ServerConfig::default();
        cfg.port_ueberschreiben(Some("3000")).unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);

        cfg.port_ueberschreiben(None).unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);

        assert!(cfg.port_ueberschreiben(Some("achtzig")).is_err());
        assert!(cfg.port_ueberschreiben(Some("70000")).is_err());
    }

    #[test]
    fn fehlende_datei_liefert_none() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/funkraum.toml").unwrap();
        assert!(cfg.is_none());
    }

    #[test]
    fn verzeichnis_statt_datei_ist_io_fehler() {
        let pfad = std::env::temp_dir();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        assert!(matches!(ergebnis, Err(FunkraumError::Io(_))));
    }

    #[test]
    fn kaputtes_toml_ist_konfigurationsfehler() {
        let pfad = std::env::temp_dir().join(format!("funkraum-{}.toml", std::process::id()));
        std::fs::write(&pfad, "[server\nname = ").unwrap();
        let ergebnis = ServerConfig::laden(pfad.to_str().unwrap());
        std::fs::remove_file(&pfad).unwrap();
        assert!(matches!(ergebnis, Err(FunkraumError::Konfiguration(_))));
    }

    #[test]
    fn pruefen_erkennt_fehler() {
        let mut cfg = ServerConfig::default();
        cfg.raeume.push(RaumVorgabe {
            id: "lobby".into(),
            name: "Nochmal".into(),
            max_mitglieder: 5,
        });
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.heartbeat.intervall_sek = 0;
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(matches!(cfg.pruefen(), Err(FunkraumError::Konfiguration(_))));
    }

    #[test]
    fn signaling_config_uebernimmt_werte() {
        let mut cfg = ServerConfig::default();
        cfg.server.max_clients = 7;
        cfg.heartbeat.intervall_sek = 5;
        let s = cfg.signaling_config();
        assert_eq!(s.max_clients, 7);
        assert_eq!(s.heartbeat_intervall, Duration::from_secs(5));
    }
}
