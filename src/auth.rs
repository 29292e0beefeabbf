use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::storage::{TokenInfo, TokenStorage};
use yup_oauth2::{
    ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
    read_application_secret,
};

pub type Connector = hyper_rustls::HttpsConnector<hyper::client::HttpConnector>;

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.modify",
];

const AUTHORIZED_USER: &str = "authorized_user";

/// The on-disk credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl AuthorizedUser {
    pub fn new(secret: &ApplicationSecret, refresh_token: String) -> Self {
        Self {
            kind: AUTHORIZED_USER.to_string(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            refresh_token,
        }
    }

    /// Rejects records that cannot be used with the given application credentials.
    pub fn check(&self, secret: &ApplicationSecret) -> Result<()> {
        if self.kind != AUTHORIZED_USER {
            bail!("unsupported credential type '{}'", self.kind);
        }
        if self.refresh_token.is_empty() {
            bail!("stored credential has an empty refresh token");
        }
        if self.client_id != secret.client_id {
            bail!("stored credential belongs to a different OAuth client");
        }
        Ok(())
    }
}

/// Reads and writes the token file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no token file exists yet.
    pub fn load(&self) -> Result<Option<AuthorizedUser>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        let user = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse token file {}", self.path.display()))?;

        debug!(path = %self.path.display(), "loaded stored credential");
        Ok(Some(user))
    }

    /// Writes through a temp file and rename so a crash never leaves a torn token file.
    pub fn save(&self, user: &AuthorizedUser) -> Result<()> {
        let json = serde_json::to_string(user).context("Failed to serialize credential")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        restrict_permissions(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "stored credential");
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn delete(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to delete {}", self.path.display()))?;
        Ok(true)
    }
}

fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

#[derive(Debug, Default)]
struct TokenState {
    cached: Option<TokenInfo>,
    persisted_refresh: Option<String>,
}

/// Token storage for the authenticator. Access tokens live in memory only;
/// the token file is rewritten only when a new refresh token is issued.
pub struct FileTokenStorage {
    store: CredentialStore,
    secret: ApplicationSecret,
    state: Mutex<TokenState>,
}

impl FileTokenStorage {
    pub fn new(
        store: CredentialStore,
        secret: &ApplicationSecret,
        stored: Option<AuthorizedUser>,
    ) -> Self {
        let persisted_refresh = stored.map(|user| user.refresh_token);
        let cached = persisted_refresh.clone().map(|refresh_token| TokenInfo {
            access_token: None,
            refresh_token: Some(refresh_token),
            expires_at: None,
            id_token: None,
        });

        Self {
            store,
            secret: secret.clone(),
            state: Mutex::new(TokenState {
                cached,
                persisted_refresh,
            }),
        }
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn set(&self, _scopes: &[&str], mut token: TokenInfo) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("token state lock poisoned"))?;

        if token.refresh_token.is_none() {
            token.refresh_token = state.persisted_refresh.clone();
        }

        if let Some(refresh_token) = &token.refresh_token {
            if state.persisted_refresh.as_ref() != Some(refresh_token) {
                self.store
                    .save(&AuthorizedUser::new(&self.secret, refresh_token.clone()))?;
                info!(path = %self.store.path().display(), "Saved new credential");
                state.persisted_refresh = Some(refresh_token.clone());
            }
        } else {
            warn!("Authorization returned no refresh token; credential not persisted");
        }

        state.cached = Some(token);
        Ok(())
    }

    async fn get(&self, _scopes: &[&str]) -> Option<TokenInfo> {
        self.state.lock().ok().and_then(|state| state.cached.clone())
    }
}

/// Opens the consent page in the default browser and logs the URL as a fallback.
pub struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<String, String>> + Send + 'a>> {
        Box::pin(present_url(url, need_code))
    }
}

async fn present_url(url: &str, need_code: bool) -> std::result::Result<String, String> {
    info!("Authorize this app by visiting: {}", url);
    if let Err(e) = open::that(url) {
        warn!(error = %e, "Could not open a browser; open the URL manually");
    }

    if !need_code {
        return Ok(String::new());
    }

    use tokio::io::AsyncBufReadExt;
    let mut code = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut code)
        .await
        .map_err(|e| format!("Failed to read authorization code: {}", e))?;
    Ok(code.trim().to_string())
}

/// A ready-to-use credential handle.
#[derive(Clone)]
pub struct Credential {
    authenticator: Authenticator<Connector>,
}

impl Credential {
    pub fn authenticator(&self) -> Authenticator<Connector> {
        self.authenticator.clone()
    }
}

pub struct Authorizer {
    credentials_path: PathBuf,
    store: CredentialStore,
}

impl Authorizer {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(credentials_path: P, token_path: Q) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            store: CredentialStore::new(token_path),
        }
    }

    pub async fn load_secret(&self) -> Result<ApplicationSecret> {
        read_application_secret(&self.credentials_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to read application secret {}",
                    self.credentials_path.display()
                )
            })
    }

    /// Uses the stored credential when there is one, otherwise runs the
    /// interactive consent flow and persists the result.
    pub async fn authorize(&self) -> Result<Credential> {
        let secret = self.load_secret().await?;

        let stored = self.store.load()?;
        match &stored {
            Some(user) => user.check(&secret).with_context(|| {
                format!("Unusable credential in {}", self.store.path().display())
            })?,
            None => info!("No stored credential, starting interactive authorization"),
        }

        let storage = FileTokenStorage::new(self.store.clone(), &secret, stored);
        let authenticator =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .with_storage(Box::new(storage))
                .flow_delegate(Box::new(BrowserDelegate))
                .build()
                .await
                .context("Failed to build authenticator")?;

        authenticator
            .token(SCOPES)
            .await
            .context("Failed to obtain an access token")?;

        Ok(Credential { authenticator })
    }

    pub fn reset(&self) -> Result<bool> {
        self.store.delete()
    }
}
