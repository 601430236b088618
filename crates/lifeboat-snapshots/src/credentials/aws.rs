use lifeboat_core::constants::AWS_CREDENTIALS_SECRET;
use lifeboat_core::SnapshotResult;

use super::{keep_previous, line_value, redact, ProviderCredentials};

/// Shared-credentials file with a single `[default]` profile. Also used for
/// S3-compatible stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl ProviderCredentials for AwsCredentials {
    const SECRET_NAME: &'static str = AWS_CREDENTIALS_SECRET;

    fn parse(blob: &str) -> SnapshotResult<Self> {
        Ok(Self {
            access_key_id: line_value(blob, "aws_access_key_id")?,
            secret_access_key: line_value(blob, "aws_secret_access_key")?,
        })
    }

    fn render(&self) -> String {
        format!(
            "[default]\naws_access_key_id={}\naws_secret_access_key={}\n",
            self.access_key_id, self.secret_access_key
        )
    }

    fn is_empty(&self) -> bool {
        self.access_key_id.is_empty() && self.secret_access_key.is_empty()
    }

    fn redacted(&self) -> Self {
        Self {
            access_key_id: self.access_key_id.clone(),
            secret_access_key: redact(&self.secret_access_key),
        }
    }

    fn restore_redacted(&mut self, previous: &Self) {
        keep_previous(&mut self.access_key_id, &previous.access_key_id);
        keep_previous(&mut self.secret_access_key, &previous.secret_access_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifeboat_core::constants::REDACTED_SENTINEL;

    #[test]
    fn test_parse_rendered_blob() {
        let credentials = AwsCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "wJalr/K7MDENG+bPxRfi".to_string(),
        };
        let blob = credentials.render();
        assert!(blob.starts_with("[default]\n"));
        assert_eq!(AwsCredentials::parse(&blob).unwrap(), credentials);
    }

    #[test]
    fn test_parse_tolerates_spacing_and_missing_keys() {
        let parsed =
            AwsCredentials::parse("[default]\r\naws_access_key_id = AKIA \r\n").unwrap();
        assert_eq!(parsed.access_key_id, "AKIA");
        assert_eq!(parsed.secret_access_key, "");
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_redaction_hides_only_the_secret() {
        let credentials = AwsCredentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "secret".to_string(),
        };
        let redacted = credentials.redacted();
        assert_eq!(redacted.access_key_id, "AKIA");
        assert_eq!(redacted.secret_access_key, REDACTED_SENTINEL);

        assert_eq!(AwsCredentials::default().redacted().secret_access_key, "");
    }
}
