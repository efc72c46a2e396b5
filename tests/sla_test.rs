mod common;

use chrono::Duration;
use common::{monday_morning, TestApp};
use helpdesk::sla::{check_sla_breach, pause_sla_clock, SweepReport};
use helpdesk::store::TicketStore;
use helpdesk::tickets::models::{TicketPriority, TicketStatus};

#[tokio::test]
async fn test_due_date_follows_priority_table() {
    let mut app = TestApp::new().await;
    let expected = [
        (TicketPriority::Critical, 2),
        (TicketPriority::High, 4),
        (TicketPriority::Medium, 24),
        (TicketPriority::Low, 48),
    ];
    for (priority, hours) in expected {
        let ticket = app.create_ticket(priority).await.ticket;
        assert_eq!(ticket.sla_due_date, Some(monday_morning() + Duration::hours(hours)));
        assert!(!ticket.sla_breached);
    }
}

#[tokio::test]
async fn test_stamping_is_queued_and_idempotent() {
    let mut app = TestApp::new().await;
    let created = app
        .state
        .tickets
        .create_ticket(app.ticket_request(TicketPriority::High), &app.requester)
        .await
        .unwrap();
    assert_eq!(created.ticket.sla_due_date, None);

    assert_eq!(app.drain_sla_jobs().await, 1);
    let stamped = app.store.get_ticket(created.ticket.id).await.unwrap().unwrap();
    let due = stamped.sla_due_date;
    assert_eq!(due, Some(monday_morning() + Duration::hours(4)));

    // redelivery must not move the deadline
    app.clock.advance(Duration::hours(1));
    assert!(app
        .background
        .monitor
        .stamp_new_ticket(created.ticket.id)
        .await
        .unwrap());
    let again = app.store.get_ticket(created.ticket.id).await.unwrap().unwrap();
    assert_eq!(again.sla_due_date, due);

    assert!(!app
        .background
        .monitor
        .stamp_new_ticket(uuid::Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_pause_then_resume_shifts_deadline() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    for minutes in [0_i64, 1, 45, 180, 60 * 26] {
        let created = app.create_ticket(TicketPriority::Critical).await;
        let due = created.ticket.sla_due_date.unwrap();

        lifecycle
            .update_ticket_status(created.ticket.id, TicketStatus::WaitingForCustomer)
            .await
            .unwrap();
        app.clock.advance(Duration::minutes(minutes));
        let resumed = lifecycle
            .update_ticket_status(created.ticket.id, TicketStatus::InProgress)
            .await
            .unwrap();

        assert_eq!(resumed.sla_due_date, Some(due + Duration::minutes(minutes)));
        assert_eq!(resumed.sla_paused_at, None);
        assert_eq!(resumed.sla_total_paused_minutes, minutes);
    }
}

#[tokio::test]
async fn test_double_pause_keeps_first_timestamp() {
    let mut app = TestApp::new().await;
    let mut ticket = app.create_ticket(TicketPriority::Medium).await.ticket;

    assert!(pause_sla_clock(&mut ticket, monday_morning()));
    let once = ticket.clone();
    assert!(!pause_sla_clock(&mut ticket, monday_morning() + Duration::hours(1)));
    assert_eq!(ticket, once);
}

#[tokio::test]
async fn test_sweep_flags_overdue_tickets_once() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    let late = app.create_ticket(TicketPriority::Critical).await.ticket;
    let waiting = app.create_ticket(TicketPriority::Critical).await.ticket;
    let relaxed = app.create_ticket(TicketPriority::Low).await.ticket;
    lifecycle
        .update_ticket_status(waiting.id, TicketStatus::WaitingForCustomer)
        .await
        .unwrap();

    app.clock.advance(Duration::hours(3));
    let report = app.background.monitor.run_sweep().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            checked: 1,
            breached: 1,
            failed: 0
        }
    );

    let late = app.store.get_ticket(late.id).await.unwrap().unwrap();
    assert!(late.sla_breached);
    let waiting = app.store.get_ticket(waiting.id).await.unwrap().unwrap();
    assert!(!waiting.sla_breached);
    assert!(!check_sla_breach(&waiting, monday_morning() + Duration::hours(3)));
    let relaxed = app.store.get_ticket(relaxed.id).await.unwrap().unwrap();
    assert!(!relaxed.sla_breached);

    let report = app.background.monitor.run_sweep().await.unwrap();
    assert_eq!(report.checked, 0);
}

#[tokio::test]
async fn test_breach_flag_is_sticky() {
    let mut app = TestApp::new().await;
    app.add_agent("Nia", Some(app.category.id)).await;
    let state = app.state.clone();
    let lifecycle = state.tickets.lifecycle();

    let ticket = app.create_ticket(TicketPriority::Critical).await.ticket;
    app.clock.advance(Duration::hours(3));
    app.background.monitor.run_sweep().await.unwrap();

    lifecycle
        .update_ticket_status(ticket.id, TicketStatus::WaitingForCustomer)
        .await
        .unwrap();
    let paused = app.store.get_ticket(ticket.id).await.unwrap().unwrap();
    assert!(paused.sla_breached);

    lifecycle
        .update_ticket_status(ticket.id, TicketStatus::Closed)
        .await
        .unwrap();
    app.clock.advance(Duration::hours(1));
    let reopened = lifecycle.reopen_ticket(ticket.id).await.unwrap();
    assert!(reopened.sla_breached);
}

#[tokio::test]
async fn test_overdue_listing_is_for_agents() {
    let mut app = TestApp::new().await;
    let agent = app.add_agent("Nia", Some(app.category.id)).await;
    let ticket = app.create_ticket(TicketPriority::High).await.ticket;

    assert!(app.state.tickets.overdue_tickets(&agent).await.unwrap().is_empty());
    app.clock.advance(Duration::hours(5));
    let overdue = app.state.tickets.overdue_tickets(&agent).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, ticket.id);

    assert!(app
        .state
        .tickets
        .overdue_tickets(&app.requester)
        .await
        .is_err());
}
