use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use travel_auth::StaticCurrentUser;
use travel_events::SubscriberPublisher;
use travel_infra::handlers::{self, RequestContext};
use travel_infra::{AppConfig, CommitPipeline, InMemoryStore, seed};
use travel_itineraries::{SuggestStopsOnStopUpdated, UpdateStop};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    travel_observability::init(config.log_format);
    info!(seed_data = config.seed_data, system_user = %config.system_user, "configuration loaded");

    let store = Arc::new(InMemoryStore::new());
    if config.seed_data {
        seed::seed_store(&store).await.context("seeding the store")?;
    }

    let publisher = SubscriberPublisher::new()
        .with_subscriber(Arc::new(SuggestStopsOnStopUpdated))
        .context("registering subscribers")?;
    let pipeline = CommitPipeline::new(store, Arc::new(publisher));

    // Acting user: first CLI argument, else the configured system user.
    let user = match std::env::args().nth(1) {
        Some(claim) => StaticCurrentUser::from_claim(Some(&claim)),
        None => StaticCurrentUser::new(config.system_user.clone()),
    };
    let ctx = RequestContext::new(Arc::new(user), CancellationToken::new());

    let itinerary_id = seed::paris_itinerary_id();
    let Some(stops) = handlers::get_stops(pipeline.store(), itinerary_id).await? else {
        warn!(%itinerary_id, "itinerary not found; enable TRAVEL_SEED_DATA to run the demo");
        return Ok(());
    };
    info!(%itinerary_id, stops = stops.len(), "itinerary loaded");

    let Some(louvre) = stops.iter().find(|s| s.name == "The Louvre") else {
        warn!(%itinerary_id, "no stop to update");
        return Ok(());
    };

    let cmd = UpdateStop {
        name: "Musée du Louvre".to_string(),
        image_uri: louvre.image_uri.clone(),
        suggested: Some(true),
        occurred_at: Utc::now(),
    };

    match handlers::update_stop(&pipeline, &ctx, itinerary_id, louvre.id, cmd).await {
        Ok(Some(view)) => info!(stop_id = %view.id, name = %view.name, "stop updated"),
        Ok(None) => warn!(stop_id = %louvre.id, "stop not found"),
        Err(err) if err.is_saved() => warn!(error = %err, "stop saved but not every listener ran"),
        Err(err) => return Err(err).context("updating stop"),
    }

    Ok(())
}
