//! Demo run against the in-memory platform double.
//!
//! Seeds a couple of accounts and work orders, then walks one technician
//! through a full day: sign in, request work, bring on a partner, complete
//! through the queue, file a hazard, and chat. Point `PLATFORM_URL` and
//! friends at a real deployment to use the REST gateway instead; the demo
//! stays on the double so it runs anywhere.

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skypanel_client::{
    auth::{Authenticator, Credentials, SignIn},
    chat::ChatRoom,
    hazards::{HazardBoard, NewHazard},
    lifecycle::{CompleteOutcome, LifecycleClient, RequestOutcome},
    session::SessionStore,
    works::{Viewer, WorkBoard},
    ClientConfig,
};
use skypanel_core::hazard::Severity;
use skypanel_core::roles::Role;
use skypanel_gateway::MemoryGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skypanel=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(platform = %config.platform_url, "Loaded client configuration");

    let gateway = Arc::new(MemoryGateway::new());
    seed(&gateway).await;

    let store = SessionStore::new(&config.session_path);
    let auth = Authenticator::new(gateway.as_ref(), &store);
    let session = match auth
        .sign_in(Credentials {
            username: "tecnico1".into(),
            password: "demo".into(),
        })
        .await?
    {
        SignIn::SignedIn(session) => session,
        SignIn::Rejected(reason) => anyhow::bail!("Demo sign-in rejected: {reason}"),
    };
    println!("Signed in as {} ({})", session.full_name, session.role.as_str());

    let mut lifecycle = LifecycleClient::new(gateway.clone(), session.user_id);
    match lifecycle.request_next().await? {
        RequestOutcome::Assigned(work) => println!("Assigned: #{} {}", work.id, work.title),
        RequestOutcome::NoPendingWork => println!("Queue is empty"),
    }

    let candidates = lifecycle.partner_candidates().await?;
    if let Some(partner) = candidates.first() {
        lifecycle
            .add_partner(partner.id)
            .await
            .context("Adding partner")?;
        println!("Partner added: {}", partner.full_name);
    }

    loop {
        match lifecycle.complete().await? {
            CompleteOutcome::NextAssigned(work) => {
                println!("Completed, next up: #{} {}", work.id, work.title);
            }
            CompleteOutcome::AllDone => {
                println!("All work done");
                break;
            }
        }
    }

    let hazards = HazardBoard::new(gateway.clone(), session.user_id, session.role);
    let mut new = NewHazard::new("Loose railing on the roof access ladder", Severity::High);
    new.location_address = Some("Site 42".into());
    let report = hazards.report(new).await?;
    println!("Hazard filed: #{}", report.id);

    let chat = ChatRoom::new(gateway.clone(), session.user_id);
    chat.send("Done for the day").await?;
    for message in chat.history().await? {
        let author = message.author_name.unwrap_or_else(|| "?".into());
        println!("[chat] {author}: {}", message.message);
    }

    let board = WorkBoard::new(
        gateway.clone(),
        Viewer {
            id: session.user_id,
            role: session.role,
        },
    );
    let stats = board.stats().await?;
    println!(
        "Board: {} pending, {} in progress, {} completed",
        stats.pending, stats.in_progress, stats.completed
    );

    store.clear();
    Ok(())
}

async fn seed(gateway: &MemoryGateway) {
    gateway
        .seed(
            "users",
            json!({
                "id": 1,
                "username": "tecnico1",
                "password": "demo",
                "role": "TECHNICIAN",
                "full_name": "Demo Technician",
                "is_active": true,
            }),
        )
        .await;
    gateway
        .seed(
            "users",
            json!({
                "id": 2,
                "username": "tecnico2",
                "password": "demo",
                "role": "TECHNICIAN",
                "full_name": "Partner Technician",
                "is_active": true,
            }),
        )
        .await;

    for (id, title, status, created) in [
        (10, "Panel inspection, Via Roma 1", "PENDING", "2026-08-01T08:00:00Z"),
        (11, "Inverter swap, Corso Milano 4", "HIGH_PRIORITY", "2026-08-01T09:00:00Z"),
        (12, "Cable trench survey", "PENDING", "2026-08-01T10:00:00Z"),
    ] {
        gateway
            .seed(
                "works",
                json!({
                    "id": id,
                    "title": title,
                    "status": status,
                    "pinned": false,
                    "archived": false,
                    "created_at": created,
                    "assigned_technician_id": null,
                    "partner_technician_id": null,
                    "locked_by": null,
                }),
            )
            .await;
    }
}
