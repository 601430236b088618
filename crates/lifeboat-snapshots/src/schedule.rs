//! Automatic snapshot settings: cron schedule and retention per application.

use std::sync::Arc;

use croner::Cron;
use lifeboat_core::models::SnapshotSettings;
use lifeboat_core::{format_ttl, parse_ttl, SnapshotError, SnapshotResult};

use crate::collaborators::{AppStore, ScheduleStore};

pub struct ScheduleService {
    apps: Arc<dyn AppStore>,
    schedules: Arc<dyn ScheduleStore>,
    default_ttl: String,
}

impl ScheduleService {
    pub fn new(
        apps: Arc<dyn AppStore>,
        schedules: Arc<dyn ScheduleStore>,
        default_ttl: impl Into<String>,
    ) -> Self {
        Self {
            apps,
            schedules,
            default_ttl: default_ttl.into(),
        }
    }

    pub async fn read_settings(&self, app_id: &str) -> SnapshotResult<SnapshotSettings> {
        let app = self.apps.get_app(app_id).await?;
        let schedule = self.schedules.read_schedule(app_id).await?;
        let ttl = app.snapshot_ttl.as_deref().unwrap_or(&self.default_ttl);

        Ok(SnapshotSettings {
            schedule,
            ttl: format_ttl(ttl)?,
        })
    }

    /// Store `schedule` (a blank or absent schedule disables automatic
    /// snapshots) and the human-readable `ttl`. Nothing is written unless
    /// both values are valid.
    pub async fn save_settings(
        &self,
        app_id: &str,
        schedule: Option<&str>,
        ttl: &str,
    ) -> SnapshotResult<SnapshotSettings> {
        let duration = parse_ttl(ttl)?;
        let schedule = schedule.map(str::trim).filter(|s| !s.is_empty());
        if let Some(expression) = schedule {
            validate_schedule(expression)?;
        }

        // Fails early for unknown applications.
        self.apps.get_app(app_id).await?;

        match schedule {
            Some(expression) => self.schedules.write_schedule(app_id, expression).await?,
            None => self.schedules.delete_schedule(app_id).await?,
        }
        self.apps.update_snapshot_ttl(app_id, &duration).await?;

        tracing::info!(
            app_id = %app_id,
            schedule = schedule.unwrap_or("disabled"),
            ttl = %duration,
            "Snapshot settings saved"
        );

        Ok(SnapshotSettings {
            schedule: schedule.map(str::to_string),
            ttl: format_ttl(&duration)?,
        })
    }
}

pub fn validate_schedule(expression: &str) -> SnapshotResult<()> {
    Cron::new(expression).parse().map_err(|e| {
        SnapshotError::Validation(format!("Invalid schedule '{}': {}", expression, e))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{app, MockAppStore, MockScheduleStore};

    fn service() -> (ScheduleService, MockAppStore, MockScheduleStore) {
        let apps = MockAppStore::new();
        apps.add_app(app("a1", "app1"));
        let schedules = MockScheduleStore::new();
        let service = ScheduleService::new(
            Arc::new(apps.clone()),
            Arc::new(schedules.clone()),
            "720h",
        );
        (service, apps, schedules)
    }

    #[test]
    fn test_validate_schedule() {
        assert!(validate_schedule("0 2 * * *").is_ok());
        assert!(validate_schedule("*/15 * * * 1-5").is_ok());
        assert!(matches!(
            validate_schedule("every night"),
            Err(SnapshotError::Validation(_))
        ));
        assert!(validate_schedule("61 * * * *").is_err());
    }

    #[tokio::test]
    async fn test_read_defaults() {
        let (service, _, _) = service();
        let settings = service.read_settings("a1").await.unwrap();
        assert_eq!(settings.schedule, None);
        assert_eq!(settings.ttl, "1 month");
    }

    #[tokio::test]
    async fn test_save_then_read() {
        let (service, apps, schedules) = service();

        let saved = service
            .save_settings("a1", Some(" 0 2 * * * "), "2 weeks")
            .await
            .unwrap();

        assert_eq!(saved.schedule.as_deref(), Some("0 2 * * *"));
        assert_eq!(saved.ttl, "2 weeks");
        assert_eq!(schedules.schedule("a1").as_deref(), Some("0 2 * * *"));
        assert_eq!(apps.app("a1").snapshot_ttl.as_deref(), Some("336h"));
        assert_eq!(service.read_settings("a1").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_blank_schedule_disables() {
        let (service, _, schedules) = service();
        service
            .save_settings("a1", Some("0 2 * * *"), "1 month")
            .await
            .unwrap();

        let saved = service.save_settings("a1", Some("  "), "1 month").await.unwrap();
        assert_eq!(saved.schedule, None);
        assert_eq!(schedules.schedule("a1"), None);
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let (service, apps, schedules) = service();

        let err = service
            .save_settings("a1", Some("whenever"), "1 month")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Validation(_)));

        let err = service
            .save_settings("a1", Some("0 2 * * *"), "3 fortnights")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Validation(_)));

        let err = service
            .save_settings("a1", Some("0 2 * * *"), "99999999999999999 years")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Validation(_)));

        assert_eq!(schedules.schedule("a1"), None);
        assert_eq!(apps.app("a1").snapshot_ttl, None);
    }
}
