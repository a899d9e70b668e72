//! Integration tests for the appointment book and digital records.

mod common;

use agendo_core::error::AgendoError;
use agendo_core::models::license::LicenseType;
use agendo_core::models::appointment::{AppointmentStatus, CreateAppointment, UpdateAppointment};
use agendo_core::models::record::{CreateDigitalRecord, FollowUp, UpdateDigitalRecord};
use agendo_core::models::user::User;
use agendo_core::store::Store;
use agendo_session::{AppointmentBook, RecordBook};
use agendo_store::MemoryStore;
use chrono::NaiveDate;
use common::*;

struct Salon {
    fx: Fixture,
    book: AppointmentBook<MemoryStore>,
    owner: User,
    assistant: User,
}

/// Business b1 with an exclusive 60-minute service, a shared service,
/// one client and a 10:00-11:00 booking of the exclusive service.
async fn salon() -> Salon {
    let fx = setup(at(2024, 5, 1)).await;
    put_business(&fx.store, &business("b1", "o1", Some(license(at(2024, 5, 1), LicenseType::OneMonth)))).await;
    put_service(&fx.store, &service("b1", "corte", 60, 1)).await;
    put_service(&fx.store, &service("b1", "tinte", 90, 1)).await;
    put_service(&fx.store, &service("b1", "sala", 60, 2)).await;
    put_client(&fx.store, &client("b1", "c1", "Ana")).await;
    put_client(&fx.store, &client("b1", "c2", "Bea")).await;
    put_appointment(
        &fx.store,
        &appointment("b1", "ap1", "corte", "c1", friday(), "10:00", "11:00"),
    )
    .await;

    let book = AppointmentBook::new(fx.store.clone(), fx.clock());
    Salon {
        fx,
        book,
        owner: owner_of("o1", "b1"),
        assistant: assistant_of("a1", &["b1"]),
    }
}

fn friday() -> NaiveDate {
    day(2024, 5, 10)
}

fn booking(service_id: &str, start: &str, end: Option<&str>) -> CreateAppointment {
    CreateAppointment {
        client_id: "c2".into(),
        service_id: service_id.into(),
        date: friday(),
        start_time: start.parse().unwrap(),
        end_time: end.map(|e| e.parse().unwrap()),
        status: None,
        notes: None,
    }
}

#[tokio::test]
async fn touching_boundary_is_not_a_conflict() {
    let s = salon().await;
    let appt = s
        .book
        .create(&s.assistant, "b1", booking("corte", "11:00", None))
        .await
        .unwrap();
    assert_eq!(appt.end_time.to_string(), "12:00");
    assert_eq!(appt.status, AppointmentStatus::Pending);
    assert_eq!(appt.created_by, "a1");
}

#[tokio::test]
async fn overlap_names_the_client_holding_the_slot() {
    let s = salon().await;
    let err = s
        .book
        .create(&s.owner, "b1", booking("corte", "10:30", Some("10:45")))
        .await
        .unwrap_err();
    match &err {
        AgendoError::Conflict {
            client_name,
            start,
            end,
        } => {
            assert_eq!(client_name, "Ana");
            assert_eq!(start, "10:00");
            assert_eq!(end, "11:00");
        }
        other => panic!("expected Conflict, got: {other:?}"),
    }
    // Nothing was written.
    assert_eq!(s.book.list(&s.owner, "b1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn other_services_and_shared_services_never_conflict() {
    let s = salon().await;
    s.book
        .create(&s.owner, "b1", booking("tinte", "10:00", None))
        .await
        .unwrap();
    s.book
        .create(&s.owner, "b1", booking("sala", "10:00", Some("11:00")))
        .await
        .unwrap();
    s.book
        .create(&s.owner, "b1", booking("sala", "10:00", Some("11:00")))
        .await
        .unwrap();
    assert_eq!(s.book.list(&s.owner, "b1").await.unwrap().len(), 4);
}

#[tokio::test]
async fn cancelled_bookings_free_the_slot() {
    let s = salon().await;
    s.book
        .update(
            &s.owner,
            "b1",
            "ap1",
            UpdateAppointment {
                status: Some(AppointmentStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    s.book
        .create(&s.owner, "b1", booking("corte", "10:00", None))
        .await
        .unwrap();
}

#[tokio::test]
async fn editing_does_not_conflict_with_itself() {
    let s = salon().await;
    let moved = s
        .book
        .update(
            &s.assistant,
            "b1",
            "ap1",
            UpdateAppointment {
                start_time: Some("10:30".parse().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // Moving the start keeps the duration.
    assert_eq!(moved.end_time.to_string(), "11:30");

    let retimed = s
        .book
        .update(
            &s.assistant,
            "b1",
            "ap1",
            UpdateAppointment {
                service_id: Some("tinte".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    // A new service re-derives the end from its duration.
    assert_eq!(retimed.end_time.to_string(), "12:00");
}

#[tokio::test]
async fn moving_onto_another_booking_conflicts() {
    let s = salon().await;
    let other = s
        .book
        .create(&s.owner, "b1", booking("corte", "12:00", None))
        .await
        .unwrap();
    let err = s
        .book
        .update(
            &s.owner,
            "b1",
            &other.id,
            UpdateAppointment {
                start_time: Some("10:15".parse().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::Conflict { .. }), "got: {err:?}");
}

#[tokio::test]
async fn conflict_falls_back_to_client_id() {
    let s = salon().await;
    s.fx
        .store
        .write("businesses/b1/clients/c1", serde_json::Value::Null)
        .await
        .unwrap();
    let err = s
        .book
        .create(&s.owner, "b1", booking("corte", "10:00", None))
        .await
        .unwrap_err();
    match err {
        AgendoError::Conflict { client_name, .. } => assert_eq!(client_name, "c1"),
        other => panic!("expected Conflict, got: {other:?}"),
    }
}

#[tokio::test]
async fn booking_validation() {
    let s = salon().await;
    let err = s
        .book
        .create(&s.owner, "b1", booking("nope", "12:00", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::NotFound { .. }));

    let err = s
        .book
        .create(&s.owner, "b1", booking("corte", "12:00", Some("11:00")))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::Validation { .. }));

    let err = s
        .book
        .create(&s.owner, "b1", booking("corte", "23:30", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::Validation { .. }));

    let outsider = owner_of("o2", "b2");
    let err = s
        .book
        .create(&outsider, "b1", booking("corte", "12:00", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::PermissionDenied { .. }));
}

#[tokio::test]
async fn delete_removes_the_booking() {
    let s = salon().await;
    s.book.delete(&s.assistant, "b1", "ap1").await.unwrap();
    assert!(s.book.list(&s.owner, "b1").await.unwrap().is_empty());
    let err = s.book.delete(&s.assistant, "b1", "ap1").await.unwrap_err();
    assert!(matches!(err, AgendoError::NotFound { .. }));
}

fn record(treatment: &str, date: NaiveDate) -> CreateDigitalRecord {
    CreateDigitalRecord {
        business_id: "b1".into(),
        client_id: "c1".into(),
        service_id: "corte".into(),
        treatment: treatment.into(),
        date,
        notes: Some("sin alergias".into()),
        diagnosis: None,
        duration: Some(60),
        category: None,
        data: None,
        follow_up: None,
    }
}

#[tokio::test]
async fn records_are_listed_newest_first() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());
    records
        .create(&s.owner, record("Corte", day(2024, 4, 1)))
        .await
        .unwrap();
    records
        .create(&s.owner, record("Color", day(2024, 4, 20)))
        .await
        .unwrap();

    let listed = records.list(&s.owner, "b1", None).await.unwrap();
    let treatments: Vec<_> = listed.iter().map(|r| r.treatment.as_str()).collect();
    assert_eq!(treatments, vec!["Color", "Corte"]);
    assert!(listed.iter().all(|r| r.created_by == "o1"));

    assert!(records.list(&s.owner, "b1", Some("c2")).await.unwrap().is_empty());
}

#[tokio::test]
async fn record_access_is_limited_to_the_business() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());

    let outsider = owner_of("o2", "b2");
    let err = records
        .create(&outsider, record("Corte", friday()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::PermissionDenied { .. }));
    assert!(records.validate_record_access(&s.assistant, "b1").is_ok());

    // Assistants hold no record capabilities.
    let err = records.list(&s.assistant, "b1", None).await.unwrap_err();
    assert!(matches!(err, AgendoError::PermissionDenied { .. }));
}

#[tokio::test]
async fn record_requires_treatment() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());
    let err = records
        .create(&s.owner, record("  ", friday()))
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::Validation { .. }));
}

#[tokio::test]
async fn follow_up_is_booked_with_the_record() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());

    let mut input = record("Corte", friday());
    input.follow_up = Some(FollowUp {
        date: day(2024, 6, 7),
        start_time: "09:00".parse().unwrap(),
        end_time: None,
        notes: Some("revisión".into()),
    });
    records.create(&s.owner, input).await.unwrap();

    let booked = s.book.list(&s.owner, "b1").await.unwrap();
    let follow_up = booked
        .iter()
        .find(|a| a.date == day(2024, 6, 7))
        .expect("follow-up appointment");
    assert_eq!(follow_up.end_time.to_string(), "10:00");
    assert_eq!(follow_up.client_id, "c1");
    assert_eq!(follow_up.notes, "revisión");
}

#[tokio::test]
async fn conflicting_follow_up_writes_nothing() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());

    let mut input = record("Corte", day(2024, 5, 3));
    input.follow_up = Some(FollowUp {
        date: friday(),
        start_time: "10:30".parse().unwrap(),
        end_time: None,
        notes: None,
    });
    let err = records.create(&s.owner, input).await.unwrap_err();
    assert!(matches!(err, AgendoError::Conflict { .. }));
    assert!(records.list(&s.owner, "b1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_and_delete_records() {
    let s = salon().await;
    let records = RecordBook::new(s.fx.store.clone(), s.fx.clock());
    let created = records
        .create(&s.owner, record("Corte", friday()))
        .await
        .unwrap();

    s.fx.clock.set(at(2024, 5, 2));
    let updated = records
        .update(
            &s.owner,
            "b1",
            &created.id,
            UpdateDigitalRecord {
                diagnosis: Some("cuero cabelludo seco".into()),
                duration: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.diagnosis, "cuero cabelludo seco");
    assert_eq!(updated.duration, None);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.created_by, "o1");
    assert_eq!(updated.updated_at, at(2024, 5, 2));

    // Another business's owner cannot delete it.
    let outsider = owner_of("o2", "b2");
    let err = records
        .delete(&outsider, "b1", &created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::PermissionDenied { .. }));

    records.delete(&s.owner, "b1", &created.id).await.unwrap();
    let err = records
        .delete(&s.owner, "b1", &created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AgendoError::NotFound { .. }));
}
