use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Supplies the Bear API token for actions that read data.
pub trait TokenSource: Send + Sync {
    fn load(&self) -> Option<String>;
}

/// Token persisted in a file, with an environment variable as fallback.
///
/// The file wins: it is what `set_bear_token` writes at runtime.
#[derive(Debug, Clone)]
pub struct TokenStore {
    file: PathBuf,
    env_var: String,
}

impl TokenStore {
    pub fn new(file: PathBuf, env_var: impl Into<String>) -> Self {
        Self {
            file,
            env_var: env_var.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    fn read_file(&self) -> Option<String> {
        match fs::read_to_string(&self.file) {
            Ok(content) => non_empty(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Failed to read token file {}: {}", self.file.display(), e);
                None
            }
        }
    }

    fn read_env(&self) -> Option<String> {
        std::env::var(&self.env_var).ok().and_then(|v| non_empty(&v))
    }

    /// Persist a token, readable only by the current user.
    pub fn save(&self, token: &str) -> Result<()> {
        let token = non_empty(token).context("Token must not be empty")?;

        if let Some(dir) = self.file.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create token directory {}", dir.display()))?;
        }
        fs::write(&self.file, &token)
            .with_context(|| format!("Failed to write token file {}", self.file.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.file, fs::Permissions::from_mode(0o600))
                .context("Failed to restrict token file permissions")?;
        }

        log::info!("Bear token saved to {}", self.file.display());
        Ok(())
    }
}

impl TokenSource for TokenStore {
    fn load(&self) -> Option<String> {
        self.read_file().or_else(|| self.read_env())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
