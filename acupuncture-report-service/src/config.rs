use std::time::Duration;

use serde::Serialize;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PDF_SCALE: f32 = 2.0;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Who signs the printed documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderIdentity {
    pub practice_title: String,
    pub practitioner: String,
    pub role: String,
}

impl Default for ProviderIdentity {
    fn default() -> Self {
        Self {
            practice_title: "AGOPUNTURA – LA CURA DEL DETTAGLIO PER IL TUO BENESSERE".to_string(),
            practitioner: "Dott. Di Gesù Renato".to_string(),
            role: "(Medico Agopuntore in Formazione)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub log_format: LogFormat,
    pub gemini: GeminiConfig,
    pub provider: ProviderIdentity,
    /// Canvas pixels per CSS pixel used when laying out PDF exports
    pub pdf_scale: f32,
    /// Sessions untouched for this long are evicted with their patient data
    pub session_ttl: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            log_format: LogFormat::Json,
            gemini: GeminiConfig::default(),
            provider: ProviderIdentity::default(),
            pdf_scale: DEFAULT_PDF_SCALE,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; unset or unparsable
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServiceConfig::default();
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let parsed = |key: &str| -> Option<String> {
            let value = text(key)?;
            Some(value.trim().to_string())
        };

        let port = parsed("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let log_format = match parsed("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        let timeout_secs = parsed("GENERATION_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let temperature = parsed("GEMINI_TEMPERATURE")
            .and_then(|value| value.parse::<f32>().ok())
            .filter(|t| (0.0..=2.0).contains(t))
            .unwrap_or(DEFAULT_TEMPERATURE);

        let gemini = GeminiConfig {
            api_key: text("GEMINI_API_KEY").or_else(|| text("API_KEY")),
            model: parsed("GEMINI_MODEL").unwrap_or(defaults.gemini.model),
            base_url: parsed("GEMINI_BASE_URL").unwrap_or(defaults.gemini.base_url),
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        };

        let provider = ProviderIdentity {
            practice_title: text("PRACTICE_TITLE").unwrap_or(defaults.provider.practice_title),
            practitioner: text("PRACTITIONER_NAME").unwrap_or(defaults.provider.practitioner),
            role: text("PRACTITIONER_ROLE").unwrap_or(defaults.provider.role),
        };

        let pdf_scale = parsed("PDF_SCALE")
            .and_then(|value| value.parse::<f32>().ok())
            .filter(|scale| *scale > 0.0)
            .unwrap_or(DEFAULT_PDF_SCALE);

        let session_ttl_secs = parsed("SESSION_TTL_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        ServiceConfig {
            port,
            log_format,
            gemini,
            provider,
            pdf_scale,
            session_ttl: Duration::from_secs(session_ttl_secs),
        }
    }

    /// Log configuration problems that do not prevent startup
    pub fn warn_on_gaps(&self) {
        if self.gemini.api_key.is_none() {
            warn!("GEMINI_API_KEY not set, report generation will fail until it is configured");
        }
    }

    /// How often idle sessions are looked for
    pub fn sweep_period(&self) -> Duration {
        (self.session_ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ServiceConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.gemini.temperature, 0.5);
        assert_eq!(config.gemini.timeout, Duration::from_secs(120));
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.provider, ProviderIdentity::default());
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.sweep_period(), Duration::from_secs(60));
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "pretty"),
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.5-pro"),
            ("GENERATION_TIMEOUT_SECS", "30"),
            ("PRACTITIONER_NAME", "Dott.ssa Neri"),
            ("PDF_SCALE", "3"),
            ("SESSION_TTL_SECS", "120"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.gemini.api_key.as_deref(), Some("secret"));
        assert_eq!(config.gemini.model, "gemini-2.5-pro");
        assert_eq!(config.gemini.timeout, Duration::from_secs(30));
        assert_eq!(config.provider.practitioner, "Dott.ssa Neri");
        assert_eq!(config.pdf_scale, 3.0);
        assert_eq!(config.session_ttl, Duration::from_secs(120));
        assert_eq!(config.sweep_period(), Duration::from_secs(30));
    }

    #[test]
    fn api_key_falls_back_to_legacy_variable() {
        let config = config(&[("API_KEY", "legacy"), ("GEMINI_API_KEY", " ")]);
        assert_eq!(config.gemini.api_key.as_deref(), Some("legacy"));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config(&[
            ("PORT", "ninety"),
            ("GENERATION_TIMEOUT_SECS", "0"),
            ("GEMINI_TEMPERATURE", "7"),
            ("PDF_SCALE", "-1"),
            ("SESSION_TTL_SECS", "0"),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.gemini.timeout, Duration::from_secs(120));
        assert_eq!(config.gemini.temperature, 0.5);
        assert_eq!(config.pdf_scale, 2.0);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn short_ttls_still_sweep_at_most_once_a_second() {
        let config = config(&[("SESSION_TTL_SECS", "2")]);
        assert_eq!(config.sweep_period(), Duration::from_secs(1));
    }
}
