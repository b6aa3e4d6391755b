//! Document ids and locale lookup.

use std::collections::HashMap;

use async_trait::async_trait;

use snap_config::CaasConfig;
use snap_protocols::{ChangeStreamError, LocaleLookup};

/// Fixed language to locale table, e.g. from `[caas.locales]`.
#[derive(Debug, Clone, Default)]
pub struct StaticLocales {
    locales: HashMap<String, String>,
}

impl StaticLocales {
    pub fn new(locales: HashMap<String, String>) -> Self {
        Self { locales }
    }

    pub fn from_config(config: &CaasConfig) -> Self {
        Self::new(config.locales.clone())
    }
}

#[async_trait]
impl LocaleLookup for StaticLocales {
    async fn locale_for(&self, language: &str) -> Result<String, ChangeStreamError> {
        self.locales
            .get(language)
            .cloned()
            .ok_or_else(|| ChangeStreamError::UnknownLocale(language.to_string()))
    }
}

/// CaaS document id of `preview_id` in `language`.
///
/// An id that already carries a locale (contains `.`) is used as is and
/// needs no lookup.
pub async fn document_id_for(
    locales: &dyn LocaleLookup,
    preview_id: &str,
    language: &str,
) -> Result<String, ChangeStreamError> {
    if preview_id.contains('.') {
        return Ok(preview_id.to_string());
    }
    let locale = locales.locale_for(language).await?;
    Ok(format!("{}.{}", preview_id, locale))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locales() -> StaticLocales {
        StaticLocales::new(HashMap::from([("EN".to_string(), "en_GB".to_string())]))
    }

    #[tokio::test]
    async fn test_document_id_appends_locale() {
        assert_eq!(document_id_for(&locales(), "42", "EN").await.unwrap(), "42.en_GB");
    }

    #[tokio::test]
    async fn test_document_id_with_locale_is_kept() {
        assert_eq!(document_id_for(&locales(), "42.de_DE", "FR").await.unwrap(), "42.de_DE");
    }

    #[tokio::test]
    async fn test_unknown_language() {
        let err = document_id_for(&locales(), "42", "FR").await.unwrap_err();
        assert_eq!(err, ChangeStreamError::UnknownLocale("FR".to_string()));
    }
}
