use axum::{
    body::{to_bytes, Body},
    Router,
};
use chrono::{DateTime, Utc};
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::router::appointment_routes;
use shared_database::{AppointmentStore, ClinicState, DoctorDirectory};
use shared_models::scheduling::{AppointmentStatus, Doctor};
use shared_utils::test_utils::{Fixtures, JwtTestUtils, TestConfig, TestUser};

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Fixtures::at(Fixtures::reference_date(), hour, minute)
}

struct Harness {
    config: TestConfig,
    state: ClinicState,
    app: Router,
    doctor: Doctor,
}

impl Harness {
    async fn new() -> Self {
        let config = TestConfig::default();
        let state = config.to_clinic_state();
        let doctor = Fixtures::doctor("Anna Smith", "Cardiology");
        state.doctors.save(&doctor).await.unwrap();
        let app = appointment_routes(state.clone());
        Self {
            config,
            state,
            app,
            doctor,
        }
    }

    fn bearer(&self, user: &TestUser) -> String {
        JwtTestUtils::bearer(user, &self.config)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&TestUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, self.bearer(user));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    async fn book(&self, patient: &TestUser, time: DateTime<Utc>) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/",
            Some(patient),
            Some(json!({
                "doctor_id": self.doctor.id,
                "appointment_time": time
            })),
        )
        .await
    }

    async fn book_ok(&self, patient: &TestUser, time: DateTime<Utc>) -> String {
        let (status, body) = self.book(patient, time).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_booking_requires_authentication() {
    let harness = Harness::new().await;

    let (status, body) = harness
        .send(
            Method::POST,
            "/",
            None,
            Some(json!({ "doctor_id": harness.doctor.id, "appointment_time": at(10, 0) })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_booking_scenario() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");

    let (status, first) = harness.book(&patient, at(10, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "scheduled");
    assert_eq!(first["patient_id"], patient.id);
    assert_eq!(first["appointment_time"], json!(at(10, 0)));

    let (status, body) = harness.book(&TestUser::patient("p2@clinic.test"), at(10, 30)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = harness.book(&TestUser::patient("p2@clinic.test"), at(11, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_rejections() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");

    let (status, body) = harness.book(&patient, at(18, 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = harness
        .send(
            Method::POST,
            "/",
            Some(&patient),
            Some(json!({ "doctor_id": Uuid::new_v4(), "appointment_time": at(10, 0) })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let doctor = TestUser::doctor("doc@clinic.test");
    let (status, _) = harness.book(&doctor, at(10, 0)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_appointment_visibility() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");
    let id = harness.book_ok(&patient, at(10, 0)).await;
    let uri = format!("/{}", id);

    let (status, body) = harness.send(Method::GET, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let treating = TestUser::with_id(harness.doctor.id, &harness.doctor.email, "doctor");
    let (status, _) = harness.send(Method::GET, &uri, Some(&treating), None).await;
    assert_eq!(status, StatusCode::OK);

    let admin = TestUser::admin("admin@clinic.test");
    let (status, _) = harness.send(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let stranger = TestUser::patient("p2@clinic.test");
    let (status, _) = harness.send(Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = format!("/{}", Uuid::new_v4());
    let (status, _) = harness.send(Method::GET, &missing, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = harness.send(Method::GET, "/not-a-uuid", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_flow() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");
    let id = harness.book_ok(&patient, at(10, 0)).await;
    let uri = format!("/{}/cancel", id);

    let stranger = TestUser::patient("p2@clinic.test");
    let (status, _) = harness.send(Method::POST, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness.send(Method::POST, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, _) = harness.send(Method::POST, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The freed slot is bookable again.
    let (status, _) = harness.book(&stranger, at(10, 0)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_update_flow() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");
    let morning = harness.book_ok(&patient, at(10, 0)).await;
    harness.book_ok(&TestUser::patient("p2@clinic.test"), at(13, 0)).await;
    let uri = format!("/{}", morning);

    let (status, body) = harness
        .send(
            Method::PUT,
            &uri,
            Some(&patient),
            Some(json!({ "appointment_time": at(10, 15) })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment_time"], json!(at(10, 15)));

    let (status, _) = harness
        .send(
            Method::PUT,
            &uri,
            Some(&patient),
            Some(json!({ "appointment_time": at(12, 30) })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stranger = TestUser::patient("p3@clinic.test");
    let (status, _) = harness
        .send(
            Method::PUT,
            &uri,
            Some(&stranger),
            Some(json!({ "appointment_time": at(15, 0) })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_complete_authorization() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");
    let id = harness.book_ok(&patient, at(10, 0)).await;
    let uri = format!("/{}/complete", id);

    let (status, _) = harness.send(Method::POST, &uri, Some(&patient), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let other_doctor = TestUser::doctor("other@clinic.test");
    let (status, _) = harness.send(Method::POST, &uri, Some(&other_doctor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let treating = TestUser::with_id(harness.doctor.id, &harness.doctor.email, "doctor");
    let (status, body) = harness.send(Method::POST, &uri, Some(&treating), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = harness.send(Method::POST, &uri, Some(&treating), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patient_history_filters() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");

    let other = Fixtures::doctor("Bob Jones", "Dermatology");
    harness.state.doctors.save(&other).await.unwrap();
    for (doctor, hour, status) in [
        (harness.doctor.id, 9, AppointmentStatus::Completed),
        (other.id, 11, AppointmentStatus::Completed),
        (harness.doctor.id, 15, AppointmentStatus::Scheduled),
        (other.id, 16, AppointmentStatus::Cancelled),
    ] {
        let appointment = Fixtures::appointment(doctor, patient.uuid(), at(hour, 0), status);
        harness.state.appointments.save(&appointment).await.unwrap();
    }
    let base = format!("/patients/{}", patient.id);

    let (status, body) = harness.send(Method::GET, &base, Some(&patient), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["appointments"][0]["appointment_time"], json!(at(9, 0)));
    assert_eq!(body["appointments"][0]["doctor_name"], "Anna Smith");
    assert_eq!(body["appointments"][0]["end_time"], json!(at(10, 0)));

    let (_, body) = harness
        .send(Method::GET, &format!("{}?condition=past", base), Some(&patient), None)
        .await;
    assert_eq!(body["total"], 2);

    let (_, body) = harness
        .send(Method::GET, &format!("{}?condition=future", base), Some(&patient), None)
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["appointment_time"], json!(at(15, 0)));

    let (_, body) = harness
        .send(
            Method::GET,
            &format!("{}?condition=past&doctor_name=jones", base),
            Some(&patient),
            None,
        )
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["doctor_name"], "Bob Jones");

    let (status, _) = harness
        .send(Method::GET, &format!("{}?condition=someday", base), Some(&patient), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_history_access() {
    let harness = Harness::new().await;
    let patient = TestUser::patient("p1@clinic.test");
    let base = format!("/patients/{}", patient.id);

    let (status, _) = harness
        .send(Method::GET, &base, Some(&TestUser::patient("p2@clinic.test")), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = harness
        .send(Method::GET, &base, Some(&TestUser::doctor("doc@clinic.test")), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_doctor_schedule_for_one_day() {
    let harness = Harness::new().await;
    let first = TestUser::patient("p1@clinic.test");
    let second = TestUser::patient("p2@clinic.test");
    harness.book_ok(&second, at(14, 0)).await;
    harness.book_ok(&first, at(9, 0)).await;

    let next_day = Fixtures::at(Fixtures::reference_date().succ_opt().unwrap(), 9, 0);
    let tomorrow = Fixtures::appointment(
        harness.doctor.id,
        first.uuid(),
        next_day,
        AppointmentStatus::Scheduled,
    );
    harness.state.appointments.save(&tomorrow).await.unwrap();

    let treating = TestUser::with_id(harness.doctor.id, &harness.doctor.email, "doctor");
    let base = format!("/doctors/{}?date={}", harness.doctor.id, Fixtures::reference_date());

    let (status, body) = harness.send(Method::GET, &base, Some(&treating), None).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(body["total"], 2);
    assert_eq!(body["date"], "2025-01-10");
    assert_eq!(body["appointments"][0]["appointment_time"], json!(at(9, 0)));
    assert_eq!(body["appointments"][1]["appointment_time"], json!(at(14, 0)));
    assert_eq!(body["appointments"][0]["doctor_name"], "Anna Smith");

    let (status, body) = harness
        .send(
            Method::GET,
            &format!("{}&patient={}", base, second.id),
            Some(&treating),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["patient_id"], second.id);
}

#[tokio::test]
async fn test_doctor_schedule_access() {
    let harness = Harness::new().await;
    let uri = format!("/doctors/{}?date=2025-01-10", harness.doctor.id);

    for outsider in [
        TestUser::doctor("other@clinic.test"),
        TestUser::patient("p1@clinic.test"),
        // A patient token carrying the doctor's id is still not the doctor.
        TestUser::with_id(harness.doctor.id, "p9@clinic.test", "patient"),
    ] {
        let (status, _) = harness.send(Method::GET, &uri, Some(&outsider), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, _) = harness.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = TestUser::admin("admin@clinic.test");
    let (status, body) = harness.send(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_doctor_schedule_rejections() {
    let harness = Harness::new().await;
    let admin = TestUser::admin("admin@clinic.test");

    let bad_date = format!("/doctors/{}?date=10-01-2025", harness.doctor.id);
    let (status, body) = harness.send(Method::GET, &bad_date, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let bad_patient = format!("/doctors/{}?patient=someone", harness.doctor.id);
    let (status, _) = harness.send(Method::GET, &bad_patient, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = format!("/doctors/{}?date=2025-01-10", Uuid::new_v4());
    let (status, _) = harness.send(Method::GET, &unknown, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
