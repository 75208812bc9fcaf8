//! Integration tests for the full unit-of-work pipeline.
//!
//! Tests: Handler → ChangeTracker → Store flush → SubscriberPublisher → Subscribers
//!
//! Verifies:
//! - Updates against seeded data are stamped and published to subscribers
//! - A failing subscriber leaves the data saved and the failure reported
//! - Cancellation before the flush writes nothing

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio_util::sync::CancellationToken;

    use travel_auth::StaticCurrentUser;
    use travel_core::{EventCarrier, FixedClock};
    use travel_events::{EventSubscriber, SubscriberError, SubscriberPublisher};
    use travel_itineraries::{StopEvent, SuggestStopsOnStopUpdated, UpdateStop};

    use crate::handlers::{self, HandlerError, RequestContext};
    use crate::seed;
    use crate::store::{InMemoryStore, Store};
    use crate::unit_of_work::{CommitError, CommitPipeline};

    /// Remembers the stop ids of every stop update it handled.
    #[derive(Default)]
    struct StopAudit {
        fail: bool,
        stop_ids: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventSubscriber for StopAudit {
        fn name(&self) -> &str {
            "stop_audit"
        }

        fn handles(&self, kind: &str) -> bool {
            kind == StopEvent::UPDATED
        }

        async fn handle(&self, event: &EventCarrier) -> Result<(), SubscriberError> {
            if self.fail {
                return Err(SubscriberError::new("audit sink offline"));
            }
            let stop_id = event.payload()["stop_id"].as_str().unwrap_or_default();
            self.stop_ids.lock().unwrap().push(stop_id.to_string());
            Ok(())
        }
    }

    type Pipeline = CommitPipeline<Arc<InMemoryStore>, Arc<SubscriberPublisher>, FixedClock>;

    async fn setup(audit: Arc<StopAudit>) -> Pipeline {
        let store = Arc::new(InMemoryStore::new());
        seed::seed_store(&store).await.unwrap();

        let publisher = SubscriberPublisher::new()
            .with_subscriber(Arc::new(SuggestStopsOnStopUpdated))
            .unwrap()
            .with_subscriber(audit)
            .unwrap();

        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        CommitPipeline::new(store, Arc::new(publisher)).with_clock(FixedClock(now))
    }

    fn ctx(user: &str) -> RequestContext {
        RequestContext::new(Arc::new(StaticCurrentUser::new(user)), CancellationToken::new())
    }

    fn louvre_update() -> UpdateStop {
        UpdateStop {
            name: "Musée du Louvre".to_string(),
            image_uri: Some("https://localhost:7120/images/louvre.jpg".to_string()),
            suggested: Some(true),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn seeded_stops_are_listed_in_order() {
        let pipeline = setup(Arc::new(StopAudit::default())).await;

        let stops = handlers::get_stops(pipeline.store(), seed::paris_itinerary_id())
            .await
            .unwrap()
            .unwrap();

        let names: Vec<_> = stops.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["The Eiffel Tower", "The Louvre", "Père Lachaise Cemetery"]);
    }

    #[tokio::test]
    async fn update_is_stamped_and_published_to_every_subscriber() {
        let audit = Arc::new(StopAudit::default());
        let pipeline = setup(audit.clone()).await;
        let louvre = seed::seed_stop_id(2);

        let view = handlers::update_stop(
            &pipeline,
            &ctx("alice"),
            seed::paris_itinerary_id(),
            louvre,
            louvre_update(),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(view.name, "Musée du Louvre");
        assert_eq!(*audit.stop_ids.lock().unwrap(), vec![louvre.to_string()]);

        let key = travel_core::EntityKey::new("stops", louvre);
        let row = pipeline.store().find(&key).await.unwrap().unwrap();
        assert_eq!(row["created_by"], seed::SEED_USER);
        assert_eq!(row["last_modified_by"], "alice");
        assert_eq!(row["last_modified_on"], "2025-03-01T09:30:00Z");
    }

    #[tokio::test]
    async fn failing_subscriber_reports_after_the_data_is_saved() {
        let audit = Arc::new(StopAudit {
            fail: true,
            ..StopAudit::default()
        });
        let pipeline = setup(audit).await;
        let louvre = seed::seed_stop_id(2);

        let err = handlers::update_stop(
            &pipeline,
            &ctx("alice"),
            seed::paris_itinerary_id(),
            louvre,
            louvre_update(),
        )
        .await
        .unwrap_err();

        assert!(err.is_saved());
        let HandlerError::Commit(CommitError::Publish { report, .. }) = &err else {
            panic!("expected publish failure, got {err:?}");
        };
        assert_eq!(report.rows_affected, 1);
        assert!(report.published.is_empty());
        assert!(report.failed.is_some());

        let stops = handlers::get_stops(pipeline.store(), seed::paris_itinerary_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stops[1].name, "Musée du Louvre");
    }

    #[tokio::test]
    async fn cancelled_request_leaves_the_store_untouched() {
        let audit = Arc::new(StopAudit::default());
        let pipeline = setup(audit.clone()).await;
        let ctx = ctx("alice");
        ctx.cancel().cancel();

        let err = handlers::update_stop(
            &pipeline,
            &ctx,
            seed::paris_itinerary_id(),
            seed::seed_stop_id(2),
            louvre_update(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, HandlerError::Commit(CommitError::Cancelled)));
        assert!(audit.stop_ids.lock().unwrap().is_empty());
        let stops = handlers::get_stops(pipeline.store(), seed::paris_itinerary_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stops[1].name, "The Louvre");
    }

    #[tokio::test]
    async fn stops_of_another_itinerary_cannot_be_updated() {
        let audit = Arc::new(StopAudit::default());
        let pipeline = setup(audit.clone()).await;

        let result = handlers::update_stop(
            &pipeline,
            &ctx("alice"),
            seed::antwerp_itinerary_id(),
            seed::seed_stop_id(2),
            louvre_update(),
        )
        .await
        .unwrap();

        assert!(result.is_none());
        assert!(audit.stop_ids.lock().unwrap().is_empty());
    }
}
