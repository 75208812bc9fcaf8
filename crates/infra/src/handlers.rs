//! Application use cases over the commit pipeline.
//!
//! Each handler runs one unit of work: it opens a fresh [`ChangeTracker`],
//! loads or creates what it needs, and commits once. Transport concerns
//! (routing, status codes) live outside this crate.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use travel_auth::CurrentUser;
use travel_core::{Clock, DomainError, Entity, EntityKey, ItineraryId, StopId};
use travel_events::EventPublisher;
use travel_itineraries::{Itinerary, Stop, UpdateStop};

use crate::change_tracker::ChangeTracker;
use crate::store::{Store, StoreError};
use crate::unit_of_work::{CommitError, CommitPipeline};

/// Who is acting and whether the caller still wants the result.
#[derive(Clone)]
pub struct RequestContext {
    user: Arc<dyn CurrentUser>,
    cancel: CancellationToken,
}

impl RequestContext {
    pub fn new(user: Arc<dyn CurrentUser>, cancel: CancellationToken) -> Self {
        Self { user, cancel }
    }

    pub fn user(&self) -> &dyn CurrentUser {
        self.user.as_ref()
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("user_id", &self.user.user_id())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopView {
    pub id: StopId,
    pub itinerary_id: ItineraryId,
    pub name: String,
    pub image_uri: Option<String>,
    pub suggested: Option<bool>,
}

impl From<&Stop> for StopView {
    fn from(stop: &Stop) -> Self {
        Self {
            id: stop.id_typed(),
            itinerary_id: stop.itinerary_id(),
            name: stop.name().to_string(),
            image_uri: stop.image_uri().map(ToString::to_string),
            suggested: stop.suggested(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItineraryView {
    pub id: ItineraryId,
    pub name: String,
    pub description: Option<String>,
    pub user_id: String,
}

impl From<&Itinerary> for ItineraryView {
    fn from(itinerary: &Itinerary) -> Self {
        Self {
            id: itinerary.id_typed(),
            name: itinerary.name().to_string(),
            description: itinerary.description().map(str::to_string),
            user_id: itinerary.user_id().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request was rejected by domain validation; nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    /// Whether the requested change was durably saved despite the error.
    pub fn is_saved(&self) -> bool {
        matches!(self, HandlerError::Commit(err) if err.rows_affected().is_some())
    }
}

fn itinerary_key(id: ItineraryId) -> EntityKey {
    EntityKey::new(Itinerary::TYPE_NAME, id)
}

fn stop_key(id: StopId) -> EntityKey {
    EntityKey::new(Stop::TYPE_NAME, id)
}

async fn itinerary_exists<S: Store>(store: &S, id: ItineraryId) -> Result<bool, StoreError> {
    Ok(store.find(&itinerary_key(id)).await?.is_some())
}

/// Stops of one itinerary, ordered by id; `None` if the itinerary is unknown.
#[instrument(skip(store), err)]
pub async fn get_stops<S: Store>(
    store: &S,
    itinerary_id: ItineraryId,
) -> Result<Option<Vec<StopView>>, HandlerError> {
    if !itinerary_exists(store, itinerary_id).await? {
        return Ok(None);
    }

    let mut stops = Vec::new();
    for row in store.rows_of_type(Stop::TYPE_NAME).await? {
        let stop: Stop =
            serde_json::from_value(row).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if stop.itinerary_id() == itinerary_id {
            stops.push(StopView::from(&stop));
        }
    }
    debug!(count = stops.len(), "stops loaded");
    Ok(Some(stops))
}

/// Create an itinerary owned by the acting user.
pub async fn create_itinerary<S, P, C>(
    pipeline: &CommitPipeline<S, P, C>,
    ctx: &RequestContext,
    name: &str,
    description: Option<&str>,
) -> Result<ItineraryView, HandlerError>
where
    S: Store,
    P: EventPublisher,
    C: Clock,
{
    let mut itinerary = Itinerary::new(name, &ctx.user().user_id())?;
    if let Some(description) = description {
        itinerary = itinerary.with_description(description)?;
    }

    let view = ItineraryView::from(&itinerary);
    let mut tracker = ChangeTracker::new();
    tracker.add(itinerary).map_err(CommitError::from)?;
    pipeline.commit(&mut tracker, ctx.user(), ctx.cancel()).await?;

    Ok(view)
}

/// Add a stop to an existing itinerary; `None` if the itinerary is unknown.
pub async fn create_stop<S, P, C>(
    pipeline: &CommitPipeline<S, P, C>,
    ctx: &RequestContext,
    itinerary_id: ItineraryId,
    name: &str,
    image_uri: Option<&str>,
) -> Result<Option<StopView>, HandlerError>
where
    S: Store,
    P: EventPublisher,
    C: Clock,
{
    let mut stop = Stop::new(itinerary_id, name)?;
    if let Some(image_uri) = image_uri {
        stop = stop.with_image_uri(image_uri)?;
    }
    if !itinerary_exists(pipeline.store(), itinerary_id).await? {
        return Ok(None);
    }

    let view = StopView::from(&stop);
    let mut tracker = ChangeTracker::new();
    tracker.add(stop).map_err(CommitError::from)?;
    pipeline.commit(&mut tracker, ctx.user(), ctx.cancel()).await?;

    Ok(Some(view))
}

/// Update a stop and publish `StopUpdated`.
///
/// `None` if the stop does not exist or belongs to another itinerary.
pub async fn update_stop<S, P, C>(
    pipeline: &CommitPipeline<S, P, C>,
    ctx: &RequestContext,
    itinerary_id: ItineraryId,
    stop_id: StopId,
    cmd: UpdateStop,
) -> Result<Option<StopView>, HandlerError>
where
    S: Store,
    P: EventPublisher,
    C: Clock,
{
    let mut tracker = ChangeTracker::new();
    let Some(key) = pipeline.find::<Stop>(&mut tracker, stop_key(stop_id)).await? else {
        return Ok(None);
    };
    if tracker
        .get::<Stop>(&key)
        .is_none_or(|stop| stop.itinerary_id() != itinerary_id)
    {
        return Ok(None);
    }

    if let Some(stop) = tracker.get_mut::<Stop>(&key) {
        stop.handle_update(&cmd)?;
    }
    pipeline.commit(&mut tracker, ctx.user(), ctx.cancel()).await?;

    Ok(tracker.get::<Stop>(&key).map(StopView::from))
}

/// Delete a stop; `false` if it does not exist or belongs to another itinerary.
pub async fn delete_stop<S, P, C>(
    pipeline: &CommitPipeline<S, P, C>,
    ctx: &RequestContext,
    itinerary_id: ItineraryId,
    stop_id: StopId,
) -> Result<bool, HandlerError>
where
    S: Store,
    P: EventPublisher,
    C: Clock,
{
    let mut tracker = ChangeTracker::new();
    let Some(key) = pipeline.find::<Stop>(&mut tracker, stop_key(stop_id)).await? else {
        return Ok(false);
    };
    if tracker
        .get::<Stop>(&key)
        .is_none_or(|stop| stop.itinerary_id() != itinerary_id)
    {
        return Ok(false);
    }

    tracker.remove(&key);
    pipeline.commit(&mut tracker, ctx.user(), ctx.cancel()).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;
    use travel_auth::StaticCurrentUser;
    use travel_events::SubscriberPublisher;

    use crate::store::InMemoryStore;

    type Pipeline = CommitPipeline<Arc<InMemoryStore>, Arc<SubscriberPublisher>>;

    fn pipeline() -> Pipeline {
        CommitPipeline::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(SubscriberPublisher::new()),
        )
    }

    fn ctx(user: &str) -> RequestContext {
        RequestContext::new(
            Arc::new(StaticCurrentUser::new(user)),
            CancellationToken::new(),
        )
    }

    fn rename(name: &str) -> UpdateStop {
        UpdateStop {
            name: name.to_string(),
            image_uri: None,
            suggested: Some(true),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn created_itinerary_is_owned_by_the_acting_user() {
        let pipeline = pipeline();
        let view = create_itinerary(&pipeline, &ctx("alice"), "A Trip to Paris", Some("Paris!"))
            .await
            .unwrap();

        assert_eq!(view.user_id, "alice");
        assert_eq!(view.description.as_deref(), Some("Paris!"));
        let row = pipeline
            .store()
            .find(&itinerary_key(view.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["created_by"], "alice");
    }

    #[tokio::test]
    async fn stops_are_listed_per_itinerary() {
        let pipeline = pipeline();
        let ctx = ctx("alice");
        let paris = create_itinerary(&pipeline, &ctx, "Paris", None).await.unwrap();
        let antwerp = create_itinerary(&pipeline, &ctx, "Antwerp", None).await.unwrap();
        create_stop(&pipeline, &ctx, paris.id, "Louvre", None)
            .await
            .unwrap()
            .unwrap();
        create_stop(&pipeline, &ctx, antwerp.id, "MAS", None)
            .await
            .unwrap()
            .unwrap();

        let stops = get_stops(pipeline.store(), paris.id).await.unwrap().unwrap();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].name, "Louvre");
        assert_eq!(stops[0].suggested, Some(false));
    }

    #[tokio::test]
    async fn unknown_itinerary_yields_none() {
        let pipeline = pipeline();
        let missing = ItineraryId::new();

        assert!(get_stops(pipeline.store(), missing).await.unwrap().is_none());
        let created = create_stop(&pipeline, &ctx("alice"), missing, "Louvre", None)
            .await
            .unwrap();
        assert!(created.is_none());
        assert_eq!(pipeline.store().row_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn update_stop_applies_the_change() {
        let pipeline = pipeline();
        let ctx = ctx("alice");
        let paris = create_itinerary(&pipeline, &ctx, "Paris", None).await.unwrap();
        let stop = create_stop(&pipeline, &ctx, paris.id, "Louvre", None)
            .await
            .unwrap()
            .unwrap();

        let updated = update_stop(&pipeline, &ctx, paris.id, stop.id, rename("Musée du Louvre"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Musée du Louvre");
        assert_eq!(updated.suggested, Some(true));
        let stops = get_stops(pipeline.store(), paris.id).await.unwrap().unwrap();
        assert_eq!(stops[0].name, "Musée du Louvre");
    }

    #[tokio::test]
    async fn update_stop_of_another_itinerary_is_not_found() {
        let pipeline = pipeline();
        let ctx = ctx("alice");
        let paris = create_itinerary(&pipeline, &ctx, "Paris", None).await.unwrap();
        let antwerp = create_itinerary(&pipeline, &ctx, "Antwerp", None).await.unwrap();
        let stop = create_stop(&pipeline, &ctx, paris.id, "Louvre", None)
            .await
            .unwrap()
            .unwrap();

        let result = update_stop(&pipeline, &ctx, antwerp.id, stop.id, rename("MAS"))
            .await
            .unwrap();
        assert!(result.is_none());

        let missing = update_stop(&pipeline, &ctx, paris.id, StopId::new(), rename("MAS"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn invalid_update_writes_nothing() {
        let pipeline = pipeline();
        let ctx = ctx("alice");
        let paris = create_itinerary(&pipeline, &ctx, "Paris", None).await.unwrap();
        let stop = create_stop(&pipeline, &ctx, paris.id, "Louvre", None)
            .await
            .unwrap()
            .unwrap();

        let err = update_stop(&pipeline, &ctx, paris.id, stop.id, rename(" "))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Domain(DomainError::Validation(_))));
        assert!(!err.is_saved());
        let stops = get_stops(pipeline.store(), paris.id).await.unwrap().unwrap();
        assert_eq!(stops[0].name, "Louvre");
    }

    #[tokio::test]
    async fn delete_stop_removes_only_matching_stops() {
        let pipeline = pipeline();
        let ctx = ctx("alice");
        let paris = create_itinerary(&pipeline, &ctx, "Paris", None).await.unwrap();
        let stop = create_stop(&pipeline, &ctx, paris.id, "Louvre", None)
            .await
            .unwrap()
            .unwrap();

        assert!(!delete_stop(&pipeline, &ctx, ItineraryId::new(), stop.id).await.unwrap());
        assert!(delete_stop(&pipeline, &ctx, paris.id, stop.id).await.unwrap());
        assert!(!delete_stop(&pipeline, &ctx, paris.id, stop.id).await.unwrap());
        assert!(get_stops(pipeline.store(), paris.id).await.unwrap().unwrap().is_empty());
    }
}
