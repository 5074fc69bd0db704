use std::sync::Arc;

use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::remote::traits::{AuthOutcome, Credentials, SessionProvider};

/// Gates every catalog interaction behind a validated session.
///
/// Authentication is awaited directly and returns a typed outcome; there is
/// no broadcast notification channel, so a concurrent job can never capture
/// another job's completion.
pub struct SessionGate {
    provider: Arc<dyn SessionProvider>,
}

impl SessionGate {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    /// Validate credentials and open a session. Blank credentials fail
    /// before any network call is made.
    pub async fn acquire(&self, credentials: &Credentials) -> Result<()> {
        if credentials.client_id.trim().is_empty() || credentials.client_secret.trim().is_empty() {
            return Err(PipelineError::CredentialsMissing);
        }

        match self.provider.authenticate(credentials).await? {
            AuthOutcome::Granted => {
                debug!("session granted");
                Ok(())
            }
            AuthOutcome::Rejected { reason } => Err(PipelineError::AuthFailed(reason)),
        }
    }
}
