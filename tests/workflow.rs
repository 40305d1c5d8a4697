//! End-to-end submission workflows through the public API

use std::sync::Arc;
use std::time::Duration;

use grievance_portal::auth::IdentityGate;
use grievance_portal::forms::{
    AnonymousField, AnonymousOrchestrator, AnonymousRecord, AnonymousView, GrievanceOrchestrator,
    IdentityRecord, PublicField, PublicView, SubmitOutcome,
};
use grievance_portal::gateway::MockGateway;
use grievance_portal::validation::validate_identity;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

#[tokio::test]
async fn test_anonymous_example_end_to_end() {
    let gateway = Arc::new(MockGateway::new());
    let orchestrator = AnonymousOrchestrator::new(gateway.clone());

    let mut view = AnonymousView::new();
    view.apply_field_edit(AnonymousField::Category, "General");
    view.apply_field_edit(AnonymousField::Message, "This is a valid complaint text.");

    let outcome = orchestrator.submit(&mut view, None).await;
    assert!(outcome.is_submitted());

    let sent = gateway.submissions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination, "Anonymous");
    assert_eq!(
        sent[0].fields,
        vec![
            ("category".to_string(), "General".to_string()),
            ("message".to_string(), "This is a valid complaint text.".to_string()),
        ]
    );

    assert_eq!(view.record, AnonymousRecord::default());
    assert!(view.errors.is_valid());
}

#[test]
fn test_invalid_email_example() {
    let identity = IdentityRecord {
        name: "Asha".into(),
        roll_number: "R-101".into(),
        email: "x@y".into(),
    };
    let errors = validate_identity(&identity);
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email"]);
    assert_eq!(errors.get("email"), Some("Enter a valid email address."));
}

#[tokio::test]
async fn test_second_trigger_while_in_flight_is_ignored() {
    let gateway = Arc::new(MockGateway::new().with_delay(Duration::from_millis(50)));
    let orchestrator = AnonymousOrchestrator::new(gateway.clone());

    let mut first = AnonymousView::new();
    first.apply_field_edit(AnonymousField::Category, "Suggestion");
    first.apply_field_edit(AnonymousField::Message, "Please add more study rooms.");
    let mut second = first.clone();

    let (a, b) = tokio::join!(
        orchestrator.submit(&mut first, None),
        orchestrator.submit(&mut second, None)
    );

    assert!(a.is_submitted());
    assert!(matches!(b, SubmitOutcome::Busy));
    assert_eq!(gateway.call_count(), 1);
    assert!(!orchestrator.is_in_flight());

    let third = orchestrator.submit(&mut second, None).await;
    assert!(third.is_submitted());
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_second_grievance_while_in_flight_is_ignored() {
    let gateway = Arc::new(MockGateway::new().with_delay(Duration::from_millis(50)));
    let orchestrator = GrievanceOrchestrator::new(gateway.clone());

    let mut first = PublicView::new();
    first.apply_field_edit(PublicField::Name, "Asha");
    first.apply_field_edit(PublicField::RollNumber, "R-101");
    first.apply_field_edit(PublicField::Email, "asha@org.edu");
    first.apply_field_edit(PublicField::GrievanceText, "Equipment was never returned.");
    let mut second = first.clone();

    let (a, b) = tokio::join!(
        orchestrator.submit(&mut first, Some("tok")),
        orchestrator.submit(&mut second, Some("tok"))
    );

    assert!(a.is_submitted());
    assert!(matches!(b, SubmitOutcome::Busy));
    assert_eq!(gateway.call_count(), 1);
    assert!(!orchestrator.is_in_flight());
    assert_eq!(second.grievance.grievance_text, "Equipment was never returned.");

    let third = orchestrator.submit(&mut second, Some("tok")).await;
    assert!(third.is_submitted());
    assert_eq!(gateway.call_count(), 2);
}

#[tokio::test]
async fn test_independent_orchestrators_overlap_freely() {
    let gateway = Arc::new(MockGateway::new().with_delay(Duration::from_millis(20)));
    let anonymous = AnonymousOrchestrator::new(gateway.clone());
    let grievance = GrievanceOrchestrator::new(gateway.clone());

    let mut anon_view = AnonymousView::new();
    anon_view.apply_field_edit(AnonymousField::Category, "Team Conflict");
    anon_view.apply_field_edit(AnonymousField::Message, "Two leads keep overriding each other.");

    let mut public_view = PublicView::new();
    public_view.apply_field_edit(PublicField::Name, "Asha");
    public_view.apply_field_edit(PublicField::RollNumber, "R-101");
    public_view.apply_field_edit(PublicField::Email, "asha@org.edu");
    public_view.apply_field_edit(PublicField::GrievanceText, "Equipment was never returned.");

    let (a, b) = tokio::join!(
        anonymous.submit(&mut anon_view, None),
        grievance.submit(&mut public_view, None)
    );
    assert!(a.is_submitted());
    assert!(b.is_submitted());
    assert_eq!(gateway.call_count(), 2);
    assert_eq!(public_view.identity.name, "Asha");
}

#[test]
fn test_gate_rejects_other_domain() {
    let gate = IdentityGate::new("@org.edu");
    let credential = encode(
        &Header::default(),
        &json!({"email": "a@otherdomain.com", "sub": "9"}),
        &EncodingKey::from_secret(b"widget"),
    )
    .unwrap();

    let mut admitted = false;
    let result = gate.admit(&credential, |_, _| admitted = true);
    tokio_test::assert_err!(result);
    assert!(!admitted);
}
