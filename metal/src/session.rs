//! Shared state handed from the provider to resources and data sources

use std::any::Any;
use std::sync::Arc;
use tfplug::Diagnostic;

use crate::api::Client;
use crate::watcher::WatchOptions;

#[derive(Clone)]
pub struct Session {
    pub client: Client,
    pub organization: Option<String>,
    /// Default project for calls that do not name one
    pub project: String,
    pub watch: WatchOptions,
}

impl Session {
    pub fn new(client: Client, project: impl Into<String>) -> Self {
        Self {
            client,
            organization: None,
            project: project.into(),
            watch: WatchOptions::default(),
        }
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    pub fn with_watch_options(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }

    /// `project` unless it is empty, the session project otherwise
    pub fn project_or_default(&self, project: Option<String>) -> String {
        project
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.project.clone())
    }

    /// Pick the session out of the provider data given to `configure`
    ///
    /// Ok(None) when the provider has not been configured yet.
    pub fn from_provider_data(
        data: Option<Arc<dyn Any + Send + Sync>>,
    ) -> Result<Option<Session>, Diagnostic> {
        let Some(data) = data else {
            return Ok(None);
        };
        match data.downcast_ref::<Session>() {
            Some(session) => Ok(Some(session.clone())),
            None => Err(Diagnostic::error(
                "Unexpected Resource Configure Type",
                "Expected a metal session as provider data. Please report this issue to the provider developers.",
            )),
        }
    }
}

/// Error used by every operation that runs before `configure`
pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Client::new("https://api.example", "token").unwrap(), "p-default")
    }

    #[test]
    fn downcasts_provider_data() {
        let data: Arc<dyn Any + Send + Sync> = Arc::new(session());
        let found = Session::from_provider_data(Some(data)).unwrap().unwrap();
        assert_eq!(found.project, "p-default");

        assert!(Session::from_provider_data(None).unwrap().is_none());

        let wrong: Arc<dyn Any + Send + Sync> = Arc::new(42u8);
        let err = Session::from_provider_data(Some(wrong)).err().unwrap();
        assert_eq!(err.summary, "Unexpected Resource Configure Type");
    }

    #[test]
    fn empty_project_falls_back_to_session() {
        let session = session();
        assert_eq!(session.project_or_default(None), "p-default");
        assert_eq!(session.project_or_default(Some(String::new())), "p-default");
        assert_eq!(session.project_or_default(Some("p-1".to_string())), "p-1");
    }
}
