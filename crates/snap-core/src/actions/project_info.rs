//! Cached `PROJECT_INFO` answer.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value};

use snap_protocols::{Action, ActionError, LocaleEntry};

use super::dispatcher::Dispatcher;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectLanguage {
    lang: String,
    #[serde(default)]
    master: bool,
    #[serde(default)]
    locale: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    #[serde(default)]
    languages: Vec<ProjectLanguage>,
    #[serde(default)]
    preview_url: Option<String>,
}

pub struct ProjectInfo {
    dispatcher: Dispatcher,
    cache: Mutex<Option<Project>>,
}

impl ProjectInfo {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            cache: Mutex::new(None),
        }
    }

    async fn project(&self, invalidate: bool) -> Result<Project, ActionError> {
        if !invalidate {
            if let Some(project) = self.cache.lock().clone() {
                return Ok(project);
            }
        }

        let response = self
            .dispatcher
            .send_action(Action::ProjectInfo, Map::new(), true)
            .await?;
        let project: Project = match response {
            Value::Null => Project::default(),
            other => serde_json::from_value(other).map_err(|e| ActionError::InvalidResponse {
                action: Action::ProjectInfo.to_string(),
                message: e.to_string(),
            })?,
        };
        *self.cache.lock() = Some(project.clone());
        Ok(project)
    }

    /// Project languages, master language first. The master language becomes
    /// the preview language if none is set.
    pub async fn languages(&self, invalidate: bool) -> Result<Vec<String>, ActionError> {
        let project = self.project(invalidate).await?;
        let mut languages = Vec::with_capacity(project.languages.len());
        for language in project.languages {
            if language.master {
                self.dispatcher.adopt_language(&language.lang);
                languages.insert(0, language.lang);
            } else {
                languages.push(language.lang);
            }
        }
        Ok(languages)
    }

    pub async fn locales(&self, invalidate: bool) -> Result<Vec<LocaleEntry>, ActionError> {
        let project = self.project(invalidate).await?;
        let mut locales = Vec::with_capacity(project.languages.len());
        for language in project.languages {
            let entry = LocaleEntry {
                locale: language.locale.unwrap_or_default(),
                lang: language.lang,
            };
            if language.master {
                locales.insert(0, entry);
            } else {
                locales.push(entry);
            }
        }
        Ok(locales)
    }

    pub async fn preview_url(&self, invalidate: bool) -> Result<Option<String>, ActionError> {
        Ok(self.project(invalidate).await?.preview_url)
    }
}
