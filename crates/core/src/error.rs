//! Fehlertypen fuer Funkraum
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Funkraum
pub type Result<T> = std::result::Result<T, FunkraumError>;

/// Crate-uebergreifende Fehler im Funkraum-System
#[derive(Debug, Error)]
pub enum FunkraumError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Ein-/Ausgabe ---
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl FunkraumError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = FunkraumError::konfiguration("PORT ungueltig");
        assert_eq!(e.to_string(), "Konfigurationsfehler: PORT ungueltig");
    }

    #[test]
    fn io_fehler_konvertierung() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "belegt");
        let e: FunkraumError = io.into();
        assert!(matches!(e, FunkraumError::Io(_)));
    }
}
