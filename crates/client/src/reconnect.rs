//! Reconnect-Strategie mit begrenztem exponentiellem Backoff

use std::time::Duration;

/// Wartezeiten zwischen Verbindungsversuchen
///
/// Versuch `n` (ab 1) wartet `basis * 2^(n-1)`, hoechstens `maximum`.
/// Nach `max_versuche` fehlgeschlagenen Versuchen gibt der Client auf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectStrategie {
    pub basis: Duration,
    pub maximum: Duration,
    pub max_versuche: u32,
}

impl Default for ReconnectStrategie {
    fn default() -> Self {
        Self {
            basis: Duration::from_millis(500),
            maximum: Duration::from_secs(16),
            max_versuche: 6,
        }
    }
}

impl ReconnectStrategie {
    /// Wartezeit vor Versuch `versuch`, `None` wenn aufgegeben wird
    pub fn verzoegerung(&self, versuch: u32) -> Option<Duration> {
        if versuch > self.max_versuche {
            return None;
        }
        let faktor = 1u32
            .checked_shl(versuch.saturating_sub(1))
            .unwrap_or(u32::MAX);
        Some(self.basis.saturating_mul(faktor).min(self.maximum))
    }
}
