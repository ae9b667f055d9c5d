//! End-to-end recommendation run
//!
//! History is collected once; every theme then goes through
//! request → collection sync → request forwarding → report. A failing theme is
//! recorded in the summary and never stops the others.

use chrono::{DateTime, Utc};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::Instrument;

use crate::{
    config::Config,
    error::{AppError, AppResult},
    logging::RunId,
    models::{
        RecommendationRequest, RunSummary, Theme, ThemeFailure, ThemeReport, WatchHistoryEntry,
    },
    services::{
        collections::sync_collection,
        history::collect_history,
        providers::{LanguageModel, MediaServer, RequestService},
        recommendations::{request_recommendations, RequestOptions},
        report::write_report,
        request_forwarder::forward_missing,
    },
};

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub recommendation_count: usize,
    pub history_limit: usize,
    pub output_dir: PathBuf,
    pub request_delay: Duration,
    /// Look things up and write reports, but change nothing upstream
    pub dry_run: bool,
}

impl WorkflowOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            recommendation_count: config.run.recommendation_count,
            history_limit: config.run.history_limit,
            output_dir: config.output.dir.clone(),
            request_delay: Duration::from_millis(
                config.ombi().map(|o| o.request_delay_ms).unwrap_or_default(),
            ),
            dry_run: false,
        }
    }
}

pub struct Workflow {
    media_server: Arc<dyn MediaServer>,
    model: Arc<dyn LanguageModel>,
    request_service: Option<Arc<dyn RequestService>>,
    options: WorkflowOptions,
}

impl Workflow {
    pub fn new(
        media_server: Arc<dyn MediaServer>,
        model: Arc<dyn LanguageModel>,
        request_service: Option<Arc<dyn RequestService>>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            media_server,
            model,
            request_service,
            options,
        }
    }

    /// Runs every theme in order
    ///
    /// Only history collection is fatal: without history no model call is made.
    pub async fn run(&self, themes: &[Theme]) -> AppResult<RunSummary> {
        let run_id = RunId::new();
        let span = run_id.span();

        async move {
            let run_at = Utc::now();
            tracing::info!(
                themes = themes.len(),
                dry_run = self.options.dry_run,
                "Starting recommendation run"
            );

            let history = collect_history(self.media_server.as_ref()).await?;

            let mut summary = RunSummary {
                run_id: run_id.0,
                reports: Vec::with_capacity(themes.len()),
                failures: Vec::new(),
            };

            for theme in themes {
                let theme_span = tracing::info_span!("theme", theme = %theme.id);
                match self
                    .run_theme(theme, &history, run_at)
                    .instrument(theme_span)
                    .await
                {
                    Ok(report) => summary.reports.push(report),
                    Err(e) => {
                        tracing::error!(
                            theme = %theme.id,
                            status = ?e.status(),
                            error = %e,
                            "Theme failed"
                        );
                        summary.failures.push(ThemeFailure {
                            theme_id: theme.id.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            tracing::info!(
                updated = ?summary.updated_collections(),
                failed = summary.failures.len(),
                "Run complete"
            );
            Ok::<_, AppError>(summary)
        }
        .instrument(span)
        .await
    }

    async fn run_theme(
        &self,
        theme: &Theme,
        history: &[WatchHistoryEntry],
        run_at: DateTime<Utc>,
    ) -> AppResult<ThemeReport> {
        let request = RecommendationRequest {
            history: history.to_vec(),
            theme: theme.clone(),
        };
        let request_options = RequestOptions {
            today: run_at.date_naive(),
            recommendation_count: self.options.recommendation_count,
            history_limit: self.options.history_limit,
        };

        let items = match request_recommendations(self.model.as_ref(), &request, &request_options).await {
            Ok(items) => items,
            Err(AppError::Parse(reason)) => {
                tracing::warn!(theme = %theme.id, reason = %reason, "No usable recommendations");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let synced = sync_collection(
            self.media_server.as_ref(),
            theme,
            items,
            self.options.dry_run,
        )
        .await;

        let mut dispositions = synced.dispositions;
        dispositions.extend(
            forward_missing(
                self.request_service.as_deref(),
                synced.missing,
                self.options.request_delay,
                self.options.dry_run,
            )
            .await,
        );

        let report_path = match write_report(&self.options.output_dir, &theme.id, run_at, &dispositions) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(theme = %theme.id, error = %e, "Could not write report");
                None
            }
        };

        let report = ThemeReport {
            theme_id: theme.id.clone(),
            collection_name: theme.collection_name.clone(),
            items: dispositions,
            report_path,
        };

        tracing::info!(
            theme = %theme.id,
            added = report.added(),
            forwarded = report.forwarded(),
            dropped = report.dropped(),
            "Theme complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MockLanguageModel, MockMediaServer};
    use reqwest::StatusCode;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> WorkflowOptions {
        WorkflowOptions {
            recommendation_count: 10,
            history_limit: 200,
            output_dir: dir.path().to_path_buf(),
            request_delay: Duration::ZERO,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn test_history_failure_aborts_before_model_call() {
        let dir = TempDir::new().unwrap();

        let mut media_server = MockMediaServer::new();
        media_server.expect_name().return_const("mock");
        media_server.expect_watch_history().returning(|| {
            Err(AppError::ExternalApi {
                service: "Plex",
                status: StatusCode::UNAUTHORIZED,
                body: String::new(),
            })
        });

        let mut model = MockLanguageModel::new();
        model.expect_complete().times(0);

        let workflow = Workflow::new(Arc::new(media_server), Arc::new(model), None, options(&dir));
        let themes = crate::models::theme::builtin_themes();

        tokio_test::assert_err!(workflow.run(&themes).await);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.run.history_limit = 50;
        let opts = WorkflowOptions::from_config(&config);

        assert_eq!(opts.history_limit, 50);
        assert_eq!(opts.recommendation_count, 10);
        assert_eq!(opts.request_delay, Duration::ZERO);
        assert!(!opts.dry_run);
    }
}
