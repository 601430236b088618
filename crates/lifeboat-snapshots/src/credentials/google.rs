use lifeboat_core::constants::GOOGLE_CREDENTIALS_SECRET;
use lifeboat_core::SnapshotResult;

use super::{keep_previous, redact, ProviderCredentials};

/// Service-account key JSON, stored verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub service_account: String,
}

impl ProviderCredentials for GoogleCredentials {
    const SECRET_NAME: &'static str = GOOGLE_CREDENTIALS_SECRET;

    fn parse(blob: &str) -> SnapshotResult<Self> {
        Ok(Self {
            service_account: blob.to_string(),
        })
    }

    fn render(&self) -> String {
        self.service_account.clone()
    }

    fn is_empty(&self) -> bool {
        self.service_account.trim().is_empty()
    }

    fn redacted(&self) -> Self {
        Self {
            service_account: redact(&self.service_account),
        }
    }

    fn restore_redacted(&mut self, previous: &Self) {
        keep_previous(&mut self.service_account, &previous.service_account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeboat_core::constants::REDACTED_SENTINEL;

    #[test]
    fn test_blob_is_kept_verbatim() {
        let blob = "{\n  \"type\": \"service_account\",\n  \"project_id\": \"p\"\n}";
        let credentials = GoogleCredentials::parse(blob).unwrap();
        assert_eq!(credentials.render(), blob);
        assert_eq!(credentials.redacted().service_account, REDACTED_SENTINEL);
    }
}
