// Cross-workflow session state: current pipeline, profile, UI preferences
//
// Passed explicitly to whatever needs it; there is no process-wide instance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::store::{KeyValueStore, StoreError};

pub const PIPELINE_ID_KEY: &str = "pipeline_id";
pub const LAST_APP_KEY: &str = "last_app_choice";
pub const PROFILE_KEY: &str = "last_profile_name";
pub const THEME_KEY: &str = "theme_preference";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "auto" => Ok(Theme::Auto),
            other => Err(format!("unknown theme '{other}' (expected light, dark or auto)")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    default_profile: String,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("default_profile", &self.default_profile)
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn new(store: Arc<dyn KeyValueStore>, default_profile: impl Into<String>) -> Self {
        Self {
            store,
            default_profile: default_profile.into(),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get_value(key).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.set_value(key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.store.remove_value(key).await
    }

    pub async fn current_pipeline_id(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get(PIPELINE_ID_KEY).await?.filter(|id| !id.is_empty()))
    }

    pub async fn set_current_pipeline_id(&self, pipeline_id: &str) -> Result<(), StoreError> {
        self.set(PIPELINE_ID_KEY, pipeline_id).await
    }

    pub async fn clear_current_pipeline_id(&self) -> Result<bool, StoreError> {
        self.remove(PIPELINE_ID_KEY).await
    }

    pub async fn last_app(&self) -> Result<Option<String>, StoreError> {
        self.get(LAST_APP_KEY).await
    }

    pub async fn set_last_app(&self, app: &str) -> Result<(), StoreError> {
        self.set(LAST_APP_KEY, app).await
    }

    /// Stored profile name, falling back to the configured default.
    pub async fn profile_name(&self) -> Result<String, StoreError> {
        Ok(self
            .get(PROFILE_KEY)
            .await?
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.default_profile.clone()))
    }

    pub async fn set_profile_name(&self, name: &str) -> Result<(), StoreError> {
        self.set(PROFILE_KEY, name).await
    }

    /// Unknown stored values read as the default theme.
    pub async fn theme(&self) -> Result<Theme, StoreError> {
        Ok(self
            .get(THEME_KEY)
            .await?
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.set(THEME_KEY, &theme.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn session() -> SessionContext {
        SessionContext::new(Arc::new(MemoryStore::new()), "Default")
    }

    #[tokio::test]
    async fn test_current_pipeline_round_trip() {
        let session = session();
        assert_eq!(session.current_pipeline_id().await.unwrap(), None);

        session.set_current_pipeline_id("Default-hello-01").await.unwrap();
        assert_eq!(
            session.current_pipeline_id().await.unwrap().as_deref(),
            Some("Default-hello-01")
        );

        assert!(session.clear_current_pipeline_id().await.unwrap());
        assert_eq!(session.current_pipeline_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_profile_falls_back_to_default() {
        let session = session();
        assert_eq!(session.profile_name().await.unwrap(), "Default");

        session.set_profile_name("Acme").await.unwrap();
        assert_eq!(session.profile_name().await.unwrap(), "Acme");
    }

    #[tokio::test]
    async fn test_theme_preference() {
        let session = session();
        assert_eq!(session.theme().await.unwrap(), Theme::Auto);

        session.set_theme(Theme::Dark).await.unwrap();
        assert_eq!(session.theme().await.unwrap(), Theme::Dark);

        session.set(THEME_KEY, "neon").await.unwrap();
        assert_eq!(session.theme().await.unwrap(), Theme::Auto);
        assert!("neon".parse::<Theme>().is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let first = session();
        let second = session();
        first.set_current_pipeline_id("Default-hello-01").await.unwrap();
        assert_eq!(second.current_pipeline_id().await.unwrap(), None);
    }
}
