//! Demo data for a fresh store.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use travel_core::{
    AuditInfo, DomainError, DomainResult, EntityKey, ItineraryId, StopId, Trackable,
};
use travel_itineraries::{Itinerary, Stop};

use crate::store::{Change, Store, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    /// A demo entity could not be built or encoded.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `created_by` of every seeded row.
pub const SEED_USER: &str = "DATASEED";

pub const SEED_OWNER: &str = "dummyuserid";

pub fn seeded_on() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn paris_itinerary_id() -> ItineraryId {
    ItineraryId::from_uuid(Uuid::from_u128(1))
}

pub fn antwerp_itinerary_id() -> ItineraryId {
    ItineraryId::from_uuid(Uuid::from_u128(2))
}

pub fn seed_stop_id(n: u128) -> StopId {
    StopId::from_uuid(Uuid::from_u128(n))
}

fn provenance() -> AuditInfo {
    AuditInfo::created(seeded_on(), SEED_USER)
}

pub fn itineraries() -> DomainResult<Vec<Itinerary>> {
    Ok(vec![
        Itinerary::new("A Trip to Paris", SEED_OWNER)?
            .with_id(paris_itinerary_id())
            .with_description("Five great days in Paris")?
            .with_audit(provenance()),
        Itinerary::new("Antwerp Extravaganza", SEED_OWNER)?
            .with_id(antwerp_itinerary_id())
            .with_description("A week in beautiful Antwerp")?
            .with_audit(provenance()),
    ])
}

pub fn stops() -> DomainResult<Vec<Stop>> {
    let paris = paris_itinerary_id();
    let antwerp = antwerp_itinerary_id();
    [
        (1, paris, "The Eiffel Tower", "eiffeltower.jpg"),
        (2, paris, "The Louvre", "louvre.jpg"),
        (3, paris, "Père Lachaise Cemetery", "perelachaise.jpg"),
        (4, antwerp, "The Royal Museum of Beautiful Arts", "royalmuseum.jpg"),
        (5, antwerp, "Saint Paul's Church", "stpauls.jpg"),
        (6, antwerp, "Michelin Restaurant Visit", "michelin.jpg"),
    ]
    .into_iter()
    .map(|(n, itinerary_id, name, image)| {
        Ok(Stop::new(itinerary_id, name)?
            .with_id(seed_stop_id(n))
            .with_image_uri(&format!("https://localhost:7120/images/{image}"))?
            .with_audit(provenance()))
    })
    .collect()
}

fn keyed_row(entity: &dyn Trackable) -> Result<(EntityKey, JsonValue), SeedError> {
    Ok((entity.key(), entity.to_row()?))
}

/// Insert the demo rows that are not in `store` yet.
///
/// Returns the number of rows written; running it twice writes nothing the
/// second time.
pub async fn seed_store<S: Store>(store: &S) -> Result<u64, SeedError> {
    let itineraries = itineraries()?;
    let stops = stops()?;

    let mut changes = Vec::new();
    let rows = itineraries
        .iter()
        .map(|i| keyed_row(i))
        .chain(stops.iter().map(|s| keyed_row(s)));
    for row in rows {
        let (key, row) = row?;
        if store.find(&key).await?.is_none() {
            changes.push(Change::Insert { key, row });
        }
    }

    let inserted = store.flush(changes).await?;
    info!(inserted, "seed data loaded");
    Ok(inserted)
}
