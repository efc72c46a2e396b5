mod common;

use chrono::{Duration, TimeZone, Utc};
use common::TestApp;
use helpdesk::store::TicketStore;
use helpdesk::tickets::error::TicketError;
use helpdesk::tickets::models::{RichTextContent, TicketPriority, TicketStatus};

const ALLOWED: &[(TicketStatus, TicketStatus)] = &[
    (TicketStatus::New, TicketStatus::InProgress),
    (TicketStatus::New, TicketStatus::WaitingForAgent),
    (TicketStatus::InProgress, TicketStatus::WaitingForCustomer),
    (TicketStatus::InProgress, TicketStatus::Resolved),
    (TicketStatus::InProgress, TicketStatus::Closed),
    (TicketStatus::WaitingForCustomer, TicketStatus::InProgress),
    (TicketStatus::WaitingForCustomer, TicketStatus::Closed),
    (TicketStatus::WaitingForAgent, TicketStatus::InProgress),
    (TicketStatus::Resolved, TicketStatus::Closed),
    (TicketStatus::Resolved, TicketStatus::InProgress),
    (TicketStatus::Closed, TicketStatus::InProgress),
];

#[tokio::test]
async fn test_every_status_pair() {
    let mut app = TestApp::new().await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    for from in TicketStatus::ALL {
        for to in TicketStatus::ALL {
            let created = app.create_ticket(TicketPriority::Medium).await;
            let mut ticket = app.store.get_ticket(created.ticket.id).await.unwrap().unwrap();
            lifecycle.force_status(&mut ticket, from).await.unwrap();

            let result = lifecycle.update_ticket_status(ticket.id, to).await;
            let stored = app.store.get_ticket(ticket.id).await.unwrap().unwrap();

            if ALLOWED.contains(&(from, to)) {
                let updated = result.unwrap_or_else(|e| panic!("{from} -> {to} rejected: {e}"));
                assert_eq!(updated.status, to);
                assert_eq!(stored.status, to);
            } else {
                match result {
                    Err(TicketError::InvalidTransition { from: f, to: t }) => {
                        assert_eq!((f, t), (from, to));
                    }
                    other => panic!("{from} -> {to} should be rejected, got {other:?}"),
                }
                assert_eq!(stored.status, from);
            }
        }
    }
}

#[tokio::test]
async fn test_unknown_ticket_is_not_found() {
    let app = TestApp::new().await;
    let result = app
        .state
        .tickets
        .lifecycle()
        .update_ticket_status(uuid::Uuid::new_v4(), TicketStatus::InProgress)
        .await;
    assert!(matches!(result, Err(TicketError::NotFound(_))));
}

#[tokio::test]
async fn test_close_stores_resolution_comment_without_changing_status() {
    let mut app = TestApp::new().await;
    let agent = app.add_agent("Nia", Some(app.category.id)).await;
    let created = app.create_ticket(TicketPriority::High).await;
    assert_eq!(created.ticket.status, TicketStatus::InProgress);

    let closed = app
        .state
        .tickets
        .lifecycle()
        .close_ticket(
            created.ticket.id,
            &agent,
            Some(RichTextContent::from_text("Replaced the VPN profile")),
        )
        .await
        .unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert_eq!(closed.closed_at, Some(common::monday_morning()));

    let comments = app.store.comments_for_ticket(closed.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author_id, agent.id);
    let stored = app.store.get_ticket(closed.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Closed);
}

#[tokio::test]
async fn test_reopen_window_boundary() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    // closed Monday 2024-05-06
    let created = app.create_ticket(TicketPriority::Low).await;
    lifecycle
        .update_ticket_status(created.ticket.id, TicketStatus::Resolved)
        .await
        .unwrap();

    // Friday of the following week: 10 business days
    app.clock.set(Utc.with_ymd_and_hms(2024, 5, 17, 18, 0, 0).unwrap());
    assert!(lifecycle.can_reopen_ticket(created.ticket.id).await.unwrap());

    // Monday after: 11
    app.clock.set(Utc.with_ymd_and_hms(2024, 5, 20, 8, 0, 0).unwrap());
    assert!(!lifecycle.can_reopen_ticket(created.ticket.id).await.unwrap());
}

#[tokio::test]
async fn test_reopen_within_window() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    let created = app.create_ticket(TicketPriority::Low).await;
    lifecycle
        .update_ticket_status(created.ticket.id, TicketStatus::Closed)
        .await
        .unwrap();
    app.clock.advance(Duration::days(2));

    let reopened = lifecycle.reopen_ticket(created.ticket.id).await.unwrap();
    assert_eq!(reopened.status, TicketStatus::InProgress);
    assert_eq!(reopened.closed_at, None);
}

#[tokio::test]
async fn test_reopen_refused_for_open_ticket() {
    let mut app = TestApp::new().await;
    let created = app.create_ticket(TicketPriority::Low).await;
    let lifecycle = app.state.tickets.lifecycle();

    assert!(!lifecycle.can_reopen_ticket(created.ticket.id).await.unwrap());
    assert!(matches!(
        lifecycle.reopen_ticket(created.ticket.id).await,
        Err(TicketError::ReopenWindowExpired {
            elapsed_business_days: None,
            ..
        })
    ));
    assert!(matches!(
        lifecycle.can_reopen_ticket(uuid::Uuid::new_v4()).await,
        Err(TicketError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_closed_eleven_business_days_ago_cannot_reopen() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    let created = app.create_ticket(TicketPriority::Medium).await;
    lifecycle
        .update_ticket_status(created.ticket.id, TicketStatus::Closed)
        .await
        .unwrap();
    app.clock.set(Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap());

    match lifecycle.reopen_ticket(created.ticket.id).await {
        Err(TicketError::ReopenWindowExpired {
            elapsed_business_days,
            window,
            ..
        }) => {
            assert_eq!(elapsed_business_days, Some(11));
            assert_eq!(window, 10);
        }
        other => panic!("expected ReopenWindowExpired, got {other:?}"),
    }
    let stored = app.store.get_ticket(created.ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Closed);
}
