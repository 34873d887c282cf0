//! Claim races and the shared-list conditional updates.

mod common;

use skypanel_client::works::{TakeOutcome, Viewer, WorkBoard};
use skypanel_core::roles::Role;
use skypanel_core::work::WorkStatus;

use common::{platform, work, ADMIN, TECNICO1, TECNICO2};

fn viewer(id: i64) -> Viewer {
    Viewer {
        id,
        role: Role::Technician,
    }
}

#[tokio::test]
async fn racing_claims_produce_exactly_one_winner() {
    let gateway = platform().await;
    gateway.seed("works", work(7, "PENDING", "2026-08-01T08:00:00Z")).await;

    let a = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            WorkBoard::new(gateway, viewer(TECNICO1)).take(7).await.unwrap()
        })
    };
    let b = {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            WorkBoard::new(gateway, viewer(TECNICO2)).take(7).await.unwrap()
        })
    };
    let outcomes = [a.await.unwrap(), b.await.unwrap()];

    let winners = outcomes.iter().filter(|o| **o == TakeOutcome::Taken).count();
    let losers = outcomes
        .iter()
        .filter(|o| **o == TakeOutcome::AlreadyTaken)
        .count();
    assert_eq!((winners, losers), (1, 1));

    // The row reflects exactly the winner's claim.
    let board = WorkBoard::new(gateway, viewer(TECNICO1));
    let works = board.list().await.unwrap();
    assert_eq!(works[0].status, WorkStatus::InProgress);
    assert!(works[0].locked_by.is_some());
}

#[tokio::test]
async fn pause_then_retake_hands_the_order_over() {
    let gateway = platform().await;
    gateway.seed("works", work(7, "PENDING", "2026-08-01T08:00:00Z")).await;

    let first = WorkBoard::new(gateway.clone(), viewer(TECNICO1));
    assert_eq!(first.take(7).await.unwrap(), TakeOutcome::Taken);
    first.pause(7, Some("Waiting on parts".into())).await.unwrap();

    let board = WorkBoard::new(gateway.clone(), viewer(TECNICO2));
    let works = board.list().await.unwrap();
    assert_eq!(works[0].status, WorkStatus::Paused);
    assert_eq!(works[0].pause_reason.as_deref(), Some("Waiting on parts"));

    assert_eq!(board.take(7).await.unwrap(), TakeOutcome::Taken);
    let works = board.list().await.unwrap();
    assert_eq!(works[0].locked_by, Some(TECNICO2));
}

#[tokio::test]
async fn completed_orders_cannot_be_taken() {
    let gateway = platform().await;
    gateway.seed("works", work(7, "PENDING", "2026-08-01T08:00:00Z")).await;

    let board = WorkBoard::new(gateway, viewer(TECNICO1));
    board.take(7).await.unwrap();
    board.complete(7).await.unwrap();

    assert_eq!(board.take(7).await.unwrap(), TakeOutcome::AlreadyTaken);
}

#[tokio::test]
async fn pinning_reorders_the_shared_list_for_everyone() {
    let gateway = platform().await;
    gateway.seed("works", work(1, "PENDING", "2026-08-01T08:00:00Z")).await;
    gateway.seed("works", work(2, "PENDING", "2026-08-02T08:00:00Z")).await;

    let admin = WorkBoard::new(
        gateway.clone(),
        Viewer {
            id: ADMIN,
            role: Role::Admin,
        },
    );
    admin.set_pinned(1, true).await.unwrap();

    let tech = WorkBoard::new(gateway, viewer(TECNICO1));
    let ids: Vec<i64> = tech.list().await.unwrap().iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn archived_orders_disappear_from_the_list() {
    let gateway = platform().await;
    gateway.seed("works", work(1, "PENDING", "2026-08-01T08:00:00Z")).await;
    gateway.seed("works", work(2, "PENDING", "2026-08-02T08:00:00Z")).await;

    let admin = WorkBoard::new(
        gateway.clone(),
        Viewer {
            id: ADMIN,
            role: Role::Admin,
        },
    );
    admin.archive(2).await.unwrap();

    let tech = WorkBoard::new(gateway, viewer(TECNICO1));
    let ids: Vec<i64> = tech.list().await.unwrap().iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![1]);
}
