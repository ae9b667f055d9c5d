use std::time::Duration;

use crate::{
    models::{Disposition, ItemDisposition, RecommendationItem, RequestOutcome, RequestTicket},
    services::providers::RequestService,
};

pub const NOT_CONFIGURED: &str = "request service not configured";

/// Submits a request for every title the library does not have
///
/// Every item gets exactly one disposition. Failures never abort the batch;
/// the item is dropped with the error (and HTTP status, when there is one)
/// as the reason. `delay` is awaited between consecutive submissions.
pub async fn forward_missing(
    service: Option<&dyn RequestService>,
    items: Vec<RecommendationItem>,
    delay: Duration,
    dry_run: bool,
) -> Vec<ItemDisposition> {
    let Some(service) = service else {
        if !items.is_empty() {
            tracing::info!(count = items.len(), "No request service configured; dropping missing titles");
        }
        return items
            .into_iter()
            .map(|item| ItemDisposition {
                item,
                disposition: Disposition::dropped(NOT_CONFIGURED),
            })
            .collect();
    };

    let mut dispositions = Vec::with_capacity(items.len());

    for (idx, item) in items.into_iter().enumerate() {
        let ticket = RequestTicket::from(&item);

        if dry_run {
            tracing::info!(title = %ticket.title, media_type = %ticket.media_type, "Dry run: would request");
            dispositions.push(ItemDisposition {
                item,
                disposition: Disposition::Forwarded {
                    already_requested: false,
                },
            });
            continue;
        }

        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let disposition = match service.submit(&ticket).await {
            Ok(RequestOutcome::Submitted) => Disposition::Forwarded {
                already_requested: false,
            },
            Ok(RequestOutcome::AlreadyRequested) => Disposition::Forwarded {
                already_requested: true,
            },
            Ok(RequestOutcome::NotFound) => {
                Disposition::dropped(format!("no match in {}", service.name()))
            }
            Err(e) => {
                tracing::warn!(
                    title = %ticket.title,
                    provider = service.name(),
                    status = ?e.status(),
                    error = %e,
                    "Request failed"
                );
                Disposition::dropped(format!("request failed: {}", e))
            }
        };

        dispositions.push(ItemDisposition { item, disposition });
    }

    dispositions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, models::MediaType, services::providers::MockRequestService};
    use reqwest::StatusCode;

    fn items(titles: &[&str]) -> Vec<RecommendationItem> {
        titles
            .iter()
            .map(|t| RecommendationItem::new(*t, MediaType::Movie))
            .collect()
    }

    #[tokio::test]
    async fn test_no_service_drops_everything() {
        let result = forward_missing(None, items(&["The Matrix"]), Duration::ZERO, false).await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].disposition, Disposition::dropped(NOT_CONFIGURED));
    }

    #[tokio::test]
    async fn test_outcomes_map_to_dispositions() {
        let mut service = MockRequestService::new();
        service.expect_name().return_const("ombi");
        service.expect_submit().times(4).returning(|ticket| match ticket.title.as_str() {
            "The Matrix" => Ok(RequestOutcome::Submitted),
            "Heat" => Ok(RequestOutcome::AlreadyRequested),
            "Obscure" => Ok(RequestOutcome::NotFound),
            _ => Err(AppError::ExternalApi {
                service: "Ombi",
                status: StatusCode::UNAUTHORIZED,
                body: "bad key".to_string(),
            }),
        });

        let result = forward_missing(
            Some(&service as &dyn RequestService),
            items(&["The Matrix", "Heat", "Obscure", "Broken"]),
            Duration::ZERO,
            false,
        )
        .await;

        assert_eq!(
            result[0].disposition,
            Disposition::Forwarded {
                already_requested: false
            }
        );
        assert_eq!(
            result[1].disposition,
            Disposition::Forwarded {
                already_requested: true
            }
        );
        assert_eq!(result[2].disposition, Disposition::dropped("no match in ombi"));
        match &result[3].disposition {
            Disposition::Dropped { reason } => assert!(reason.contains("401")),
            other => panic!("expected dropped, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ticket_carries_title_and_media_type() {
        let mut service = MockRequestService::new();
        service.expect_name().return_const("ombi");
        service
            .expect_submit()
            .withf(|ticket| {
                *ticket
                    == RequestTicket {
                        title: "Dark".to_string(),
                        media_type: MediaType::Show,
                    }
            })
            .times(1)
            .returning(|_| Ok(RequestOutcome::Submitted));

        let result = forward_missing(
            Some(&service as &dyn RequestService),
            vec![RecommendationItem::new("Dark", MediaType::Show)],
            Duration::ZERO,
            false,
        )
        .await;
        assert_eq!(result[0].disposition.label(), "forwarded");
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let mut service = MockRequestService::new();
        service.expect_submit().times(0);

        let result = forward_missing(Some(&service as &dyn RequestService), items(&["A", "B"]), Duration::from_secs(60), true).await;

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|d| d.disposition.label() == "forwarded"));
    }

    #[tokio::test]
    async fn test_delay_between_submissions() {
        let mut service = MockRequestService::new();
        service.expect_name().return_const("ombi");
        service.expect_submit().returning(|_| Ok(RequestOutcome::Submitted));

        let start = std::time::Instant::now();
        forward_missing(
            Some(&service as &dyn RequestService),
            items(&["A", "B", "C"]),
            Duration::from_millis(25),
            false,
        )
        .await;

        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
