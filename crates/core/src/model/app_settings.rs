use thiserror::Error;
use url::Url;

/// Turns of prior conversation forwarded to the chat assistant by default.
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 5;
const MAX_CHAT_HISTORY_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    api_key: Option<String>,
    api_model: Option<String>,
    api_base_url: Option<String>,
    chat_history_limit: usize,
}

#[derive(Clone, Debug, Default)]
pub struct AppSettingsDraft {
    pub api_key: Option<String>,
    pub api_model: Option<String>,
    pub api_base_url: Option<String>,
    pub chat_history_limit: Option<usize>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppSettingsError {
    #[error("invalid base URL")]
    InvalidBaseUrl,
    #[error("chat history limit {0} exceeds the maximum of {MAX_CHAT_HISTORY_LIMIT}")]
    HistoryLimitTooLarge(usize),
}

impl AppSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft into settings.
    ///
    /// # Errors
    ///
    /// Returns `AppSettingsError` if the base URL is present but invalid, or the
    /// chat history limit is too large.
    pub fn validate(self) -> Result<AppSettings, AppSettingsError> {
        let api_key = normalize_optional(self.api_key);
        let api_model = normalize_optional(self.api_model);
        let api_base_url = normalize_optional(self.api_base_url);

        if let Some(url) = api_base_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(AppSettingsError::InvalidBaseUrl);
            }
        }

        let chat_history_limit = self
            .chat_history_limit
            .unwrap_or(DEFAULT_CHAT_HISTORY_LIMIT);
        if chat_history_limit > MAX_CHAT_HISTORY_LIMIT {
            return Err(AppSettingsError::HistoryLimitTooLarge(chat_history_limit));
        }

        Ok(AppSettings {
            api_key,
            api_model,
            api_base_url,
            chat_history_limit,
        })
    }
}

impl AppSettings {
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn api_model(&self) -> Option<&str> {
        self.api_model.as_deref()
    }

    #[must_use]
    pub fn api_base_url(&self) -> Option<&str> {
        self.api_base_url.as_deref()
    }

    #[must_use]
    pub fn chat_history_limit(&self) -> usize {
        self.chat_history_limit
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_model: None,
            api_base_url: None,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}
