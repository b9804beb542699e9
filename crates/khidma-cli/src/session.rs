use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use khidma_core::{ApiClient, FileConfig, SessionHooks, SessionVault};
use tracing::warn;

/// A client wired to the stored session. Call [`Workspace::persist`] once the command
/// finishes so renewed credentials are kept.
pub(crate) struct Workspace {
    pub config: FileConfig,
    pub client: ApiClient,
    vault: SessionVault,
    expired: Arc<AtomicBool>,
}

impl Workspace {
    pub fn open(config: FileConfig, api_url: Option<&str>) -> Result<Self, String> {
        let vault = SessionVault::open_default();
        let expired = Arc::new(AtomicBool::new(false));

        let hook_vault = vault.clone();
        let hook_flag = Arc::clone(&expired);
        let hooks = SessionHooks::on_expired(move || {
            hook_flag.store(true, Ordering::SeqCst);
            if let Err(err) = hook_vault.clear() {
                warn!(error = %err, "failed to clear stored session");
            }
            eprintln!("Your session has expired. Run `khidma login` to sign in again.");
        });

        let settings = config.api.resolve_client_settings(api_url);
        let client = ApiClient::new(settings, hooks).map_err(|err| err.to_string())?;

        match vault.load() {
            Ok(Some(snapshot)) => client.session().restore(&snapshot),
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "stored session is unreadable; starting signed out");
                eprintln!("Warning: stored session unreadable, please log in again.");
                if let Err(err) = vault.clear() {
                    warn!(error = %err, "failed to clear unreadable session");
                }
            }
        }

        Ok(Self {
            config,
            client,
            vault,
            expired,
        })
    }

    pub fn is_signed_in(&self) -> bool {
        self.client.session().has_credentials()
    }

    /// Store the session as it is now, or drop the stored copy if nothing is left.
    pub fn persist(&self) {
        let snapshot = self.client.session().snapshot();
        let result = if self.expired.load(Ordering::SeqCst) || snapshot.is_empty() {
            self.vault.clear()
        } else {
            self.vault.save(&snapshot)
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to update stored session");
            eprintln!("Warning: could not update the stored session: {err}");
        }
    }
}
