use std::collections::BTreeMap;
use std::io;
use std::process::Command;
use std::sync::Arc;

use url::Url;

use crate::error::BridgeError;

const CALLBACK_AUTHORITY: &str = "x-callback-url";

/// A Bear action together with its query parameters.
///
/// Parameters set to `None` are dropped when the URL is built.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingAction {
    pub name: String,
    pub parameters: BTreeMap<String, Option<String>>,
}

impl OutgoingAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, Some(value.into()));
        self
    }

    pub fn set(&mut self, key: &str, value: Option<String>) {
        self.parameters.insert(key.to_string(), value);
    }

    /// Build `<scheme>://x-callback-url/<action>?<params>`.
    pub fn to_url(&self, scheme: &str) -> Result<Url, BridgeError> {
        let base = format!("{}://{}", scheme, CALLBACK_AUTHORITY);
        let mut url = Url::parse(&base).map_err(|e| BridgeError::dispatch(&self.name, e))?;

        url.path_segments_mut()
            .map_err(|_| BridgeError::dispatch(&self.name, "scheme URL cannot carry a path"))?
            .push(&self.name);

        let present: Vec<(&String, &String)> = self
            .parameters
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .collect();

        // query_pairs_mut() would leave a bare '?' behind on an empty set
        if !present.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in present {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// Hands a URL to whatever resolves the scheme.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &Url) -> io::Result<()>;
}

/// Opens URLs through the platform's launcher command.
pub struct SystemOpener {
    command: String,
}

impl SystemOpener {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.unwrap_or_else(|| Self::platform_default().to_string()),
        }
    }

    fn platform_default() -> &'static str {
        if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        }
    }
}

impl UrlOpener for SystemOpener {
    fn open(&self, url: &Url) -> io::Result<()> {
        let status = Command::new(&self.command)
            .arg(url.as_str())
            .status()
            .map_err(|e| {
                io::Error::new(e.kind(), format!("failed to run '{}': {}", self.command, e))
            })?;

        if !status.success() {
            return Err(io::Error::other(format!("'{}' exited with {}", self.command, status)));
        }
        Ok(())
    }
}

/// Builds scheme URLs and passes them to a [`UrlOpener`]. Never waits for Bear.
#[derive(Clone)]
pub struct ActionDispatcher {
    scheme: String,
    opener: Arc<dyn UrlOpener>,
}

impl ActionDispatcher {
    pub fn new(scheme: impl Into<String>, opener: Arc<dyn UrlOpener>) -> Self {
        Self {
            scheme: scheme.into(),
            opener,
        }
    }

    pub fn invoke(&self, action: &OutgoingAction) -> Result<Url, BridgeError> {
        let url = action.to_url(&self.scheme)?;
        log::debug!("Opening Bear URL: {}", url);

        self.opener
            .open(&url)
            .map_err(|e| BridgeError::dispatch(&action.name, e))?;
        Ok(url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every URL instead of launching anything.
    #[derive(Default)]
    pub(crate) struct RecordingOpener {
        pub opened: Mutex<Vec<Url>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &Url) -> io::Result<()> {
            self.opened.lock().unwrap().push(url.clone());
            Ok(())
        }
    }

    #[test]
    fn test_none_parameters_are_omitted() {
        let mut action = OutgoingAction::new("create").with("title", "Groceries");
        action.set("tags", None);
        action.set("text", None);
        let url = action.to_url("bear").unwrap();
        assert_eq!(url.as_str(), "bear://x-callback-url/create?title=Groceries");
        assert!(!url.as_str().contains("tags"));
        assert!(!url.as_str().contains("undefined"));
    }

    #[test]
    fn test_no_parameters_leaves_no_query() {
        let url = OutgoingAction::new("tags").to_url("bear").unwrap();
        assert_eq!(url.as_str(), "bear://x-callback-url/tags");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let action = OutgoingAction::new("create").with("title", "Tom & \"Jerry\" café");
        let url = action.to_url("bear").unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("%26"));
        assert!(query.contains("%22"));
        assert!(query.contains("caf%C3%A9"));

        let decoded: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(decoded, vec![("title".to_string(), "Tom & \"Jerry\" café".to_string())]);
    }

    #[test]
    fn test_action_name_is_path_escaped() {
        let url = OutgoingAction::new("odd/name?").to_url("bear").unwrap();
        assert_eq!(url.path(), "/odd%2Fname%3F");
    }

    #[test]
    fn test_invoke_passes_url_to_opener() {
        let opener = Arc::new(RecordingOpener::default());
        let dispatcher = ActionDispatcher::new("bear", opener.clone());
        let url = dispatcher
            .invoke(&OutgoingAction::new("trash").with("id", "ABC-1"))
            .unwrap();

        let opened = opener.opened.lock().unwrap();
        assert_eq!(opened.as_slice(), &[url]);
        assert_eq!(opened[0].as_str(), "bear://x-callback-url/trash?id=ABC-1");
    }

    #[test]
    fn test_spawn_failure_is_dispatch_error() {
        let opener = Arc::new(SystemOpener::new(Some(
            "/nonexistent/bear-bridge-opener".to_string(),
        )));
        let dispatcher = ActionDispatcher::new("bear", opener);
        let err = dispatcher.invoke(&OutgoingAction::new("tags")).unwrap_err();
        assert!(matches!(err, BridgeError::Dispatch { ref action, .. } if action == "tags"));

        let source = std::error::Error::source(&err).unwrap();
        let io_err = source.downcast_ref::<io::Error>().unwrap();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);
        assert!(io_err.to_string().contains("/nonexistent/bear-bridge-opener"));
    }
}
