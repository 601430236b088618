use lifeboat_core::constants::AZURE_CREDENTIALS_SECRET;
use lifeboat_core::SnapshotResult;

use super::{keep_previous, line_value, redact, ProviderCredentials};

/// Env-file blob read by the controller's Azure plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AzureCredentials {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub resource_group: String,
    pub cloud_name: String,
}

impl ProviderCredentials for AzureCredentials {
    const SECRET_NAME: &'static str = AZURE_CREDENTIALS_SECRET;

    fn parse(blob: &str) -> SnapshotResult<Self> {
        Ok(Self {
            subscription_id: line_value(blob, "AZURE_SUBSCRIPTION_ID")?,
            tenant_id: line_value(blob, "AZURE_TENANT_ID")?,
            client_id: line_value(blob, "AZURE_CLIENT_ID")?,
            client_secret: line_value(blob, "AZURE_CLIENT_SECRET")?,
            resource_group: line_value(blob, "AZURE_RESOURCE_GROUP")?,
            cloud_name: line_value(blob, "AZURE_CLOUD_NAME")?,
        })
    }

    fn render(&self) -> String {
        let lines = [
            ("AZURE_SUBSCRIPTION_ID", &self.subscription_id),
            ("AZURE_TENANT_ID", &self.tenant_id),
            ("AZURE_CLIENT_ID", &self.client_id),
            ("AZURE_CLIENT_SECRET", &self.client_secret),
            ("AZURE_RESOURCE_GROUP", &self.resource_group),
            ("AZURE_CLOUD_NAME", &self.cloud_name),
        ];

        lines
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, value))
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.client_id.is_empty() && self.client_secret.is_empty()
    }

    fn redacted(&self) -> Self {
        Self {
            client_secret: redact(&self.client_secret),
            ..self.clone()
        }
    }

    fn restore_redacted(&mut self, previous: &Self) {
        keep_previous(&mut self.subscription_id, &previous.subscription_id);
        keep_previous(&mut self.tenant_id, &previous.tenant_id);
        keep_previous(&mut self.client_id, &previous.client_id);
        keep_previous(&mut self.client_secret, &previous.client_secret);
        keep_previous(&mut self.resource_group, &previous.resource_group);
        keep_previous(&mut self.cloud_name, &previous.cloud_name);
    }
}
