//! Runtime settings loaded from the environment (and `.env`)

use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Router thresholds. The escalation/fallback asymmetry is a policy knob,
/// not an invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterConfig {
    /// Below this best local confidence the LLM pass runs.
    pub escalation_threshold: f32,
    /// Below this final confidence the default agent is used.
    pub fallback_threshold: f32,
    /// Confidence reported when the default agent is used.
    pub fallback_confidence: f32,
    pub routing_temperature: f32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.7,
            fallback_threshold: 0.3,
            fallback_confidence: 0.5,
            routing_temperature: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_timeout: Duration,
    pub router: RouterConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            openai_model: DEFAULT_MODEL.to_string(),
            llm_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            router: RouterConfig::default(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let router = RouterConfig {
            escalation_threshold: parse_or(&get, "ROUTER_ESCALATION_THRESHOLD", defaults.router.escalation_threshold)?,
            fallback_threshold: parse_or(&get, "ROUTER_FALLBACK_THRESHOLD", defaults.router.fallback_threshold)?,
            fallback_confidence: parse_or(&get, "ROUTER_FALLBACK_CONFIDENCE", defaults.router.fallback_confidence)?,
            routing_temperature: defaults.router.routing_temperature,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            llm_timeout: Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            router,
        })
    }

    pub fn is_llm_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| {
            OrchestrationError::Config(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(!settings.is_llm_configured());
        assert_eq!(settings.openai_model, DEFAULT_MODEL);
        assert_eq!(settings.router, RouterConfig::default());
        assert_eq!(settings.llm_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("ROUTER_ESCALATION_THRESHOLD", "0.8"),
            ("LLM_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.openai_model, "gpt-4o");
        assert_eq!(settings.router.escalation_threshold, 0.8);
        assert_eq!(settings.router.fallback_threshold, 0.3);
        assert_eq!(settings.llm_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = Settings::from_lookup(lookup(&[("ROUTER_FALLBACK_THRESHOLD", "high")])).unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let settings = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(settings.openai_api_key.is_none());
    }
}
