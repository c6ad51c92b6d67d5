use axum::{
    body::{to_bytes, Body},
    Router,
};
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::router::doctor_routes;
use shared_database::ClinicState;
use shared_models::scheduling::AppointmentStatus;
use shared_utils::test_utils::{Fixtures, JwtTestUtils, TestConfig, TestUser};

struct Harness {
    config: TestConfig,
    state: ClinicState,
    app: Router,
}

impl Harness {
    fn new() -> Self {
        let config = TestConfig::default();
        let state = config.to_clinic_state();
        let app = doctor_routes(state.clone());
        Self { config, state, app }
    }

    fn admin_bearer(&self) -> String {
        JwtTestUtils::bearer(&TestUser::admin("admin@clinic.test"), &self.config)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, bearer);
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

    async fn register(&self, name: &str, email: &str, specialty: &str) -> Value {
        let bearer = self.admin_bearer();
        let (status, body) = self
            .send(
                Method::POST,
                "/",
                Some(&bearer),
                Some(json!({
                    "name": name,
                    "email": email,
                    "specialty": specialty,
                    "password": "correct-horse"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
        body
    }
}

#[tokio::test]
async fn test_admin_registers_doctor() {
    let harness = Harness::new();

    let created = harness
        .register("Anna Smith", "anna@clinic.test", "Cardiology")
        .await;
    assert_eq!(created["name"], "Anna Smith");
    assert!(created.get("password_hash").is_none());

    let (status, listing) = harness.send(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["doctors"][0]["email"], "anna@clinic.test");
}

#[tokio::test]
async fn test_registration_requires_admin() {
    let harness = Harness::new();
    let payload = json!({
        "name": "Anna Smith",
        "email": "anna@clinic.test",
        "specialty": "Cardiology",
        "password": "pw"
    });

    let (status, _) = harness
        .send(Method::POST, "/", None, Some(payload.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let patient = JwtTestUtils::bearer(&TestUser::patient("p@clinic.test"), &harness.config);
    let (status, body) = harness
        .send(Method::POST, "/", Some(&patient), Some(payload))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let harness = Harness::new();
    harness
        .register("Anna Smith", "anna@clinic.test", "Cardiology")
        .await;

    let bearer = harness.admin_bearer();
    let (status, body) = harness
        .send(
            Method::POST,
            "/",
            Some(&bearer),
            Some(json!({
                "name": "Another Anna",
                "email": "ANNA@clinic.test",
                "specialty": "Dermatology",
                "password": "pw"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_invalid_email_is_rejected() {
    let harness = Harness::new();
    let bearer = harness.admin_bearer();

    let (status, body) = harness
        .send(
            Method::POST,
            "/",
            Some(&bearer),
            Some(json!({
                "name": "Anna Smith",
                "email": "not-an-email",
                "specialty": "Cardiology",
                "password": "pw"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_get_doctor_outcomes() {
    let harness = Harness::new();
    let created = harness
        .register("Anna Smith", "anna@clinic.test", "Cardiology")
        .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = harness.send(Method::GET, &format!("/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["specialty"], "Cardiology");

    let (status, body) = harness
        .send(Method::GET, &format!("/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = harness.send(Method::GET, "/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_doctor_email_conflict() {
    let harness = Harness::new();
    harness
        .register("Anna Smith", "anna@clinic.test", "Cardiology")
        .await;
    let bob = harness
        .register("Bob Jones", "bob@clinic.test", "Dermatology")
        .await;
    let bob_id = bob["id"].as_str().unwrap();
    let bearer = harness.admin_bearer();

    let (status, _) = harness
        .send(
            Method::PUT,
            &format!("/{}", bob_id),
            Some(&bearer),
            Some(json!({ "email": "anna@clinic.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = harness
        .send(
            Method::PUT,
            &format!("/{}", bob_id),
            Some(&bearer),
            Some(json!({ "specialty": "Neurology", "email": "bob@clinic.test" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["specialty"], "Neurology");

    let (status, _) = harness
        .send(
            Method::PUT,
            &format!("/{}", Uuid::new_v4()),
            Some(&bearer),
            Some(json!({ "name": "Nobody" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_checks_password() {
    let harness = Harness::new();
    harness
        .register("Anna Smith", "anna@clinic.test", "Cardiology")
        .await;

    let (status, body) = harness
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "anna@clinic.test", "password": "correct-horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doctor"]["name"], "Anna Smith");

    let (status, body) = harness
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "anna@clinic.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = harness
        .send(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "nobody@clinic.test", "password": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_availability_reports_every_slot() {
    let harness = Harness::new();
    let doctor = Fixtures::doctor("Anna Smith", "Cardiology");
    harness.state.doctors.save(&doctor).await.unwrap();

    let date = Fixtures::reference_date();
    let patient = Uuid::new_v4();
    for (hour, status) in [
        (10, AppointmentStatus::Scheduled),
        (14, AppointmentStatus::Cancelled),
    ] {
        let appointment =
            Fixtures::appointment(doctor.id, patient, Fixtures::at(date, hour, 0), status);
        harness.state.appointments.save(&appointment).await.unwrap();
    }

    let (status, body) = harness
        .send(
            Method::GET,
            &format!("/{}/availability?date=2025-01-10", doctor.id),
            None,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slots"].as_array().unwrap().len(), 481);
    assert_eq!(body["booked_slots"], 60);
    assert_eq!(body["free_slots"], 421);
    assert_eq!(body["slots"][60]["start"], "2025-01-10T10:00:00Z");
    assert_eq!(body["slots"][60]["status"], "booked");
    assert_eq!(body["slots"][300]["status"], "free");
}

#[tokio::test]
async fn test_availability_errors() {
    let harness = Harness::new();

    let (status, _) = harness
        .send(
            Method::GET,
            &format!("/{}/availability?date=2025-01-10", Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let doctor = Fixtures::doctor("Anna Smith", "Cardiology");
    harness.state.doctors.save(&doctor).await.unwrap();

    let (status, body) = harness
        .send(
            Method::GET,
            &format!("/{}/availability?date=10-01-2025", doctor.id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_delete_cascades_to_appointments() {
    let harness = Harness::new();
    let doctor = Fixtures::doctor("Anna Smith", "Cardiology");
    let other = Fixtures::doctor("Bob Jones", "Dermatology");
    harness.state.doctors.save(&doctor).await.unwrap();
    harness.state.doctors.save(&other).await.unwrap();

    let date = Fixtures::reference_date();
    let patient = Uuid::new_v4();
    for (doctor_id, hour) in [(doctor.id, 9), (doctor.id, 11), (other.id, 9)] {
        let appointment = Fixtures::appointment(
            doctor_id,
            patient,
            Fixtures::at(date, hour, 0),
            AppointmentStatus::Scheduled,
        );
        harness.state.appointments.save(&appointment).await.unwrap();
    }

    let bearer = harness.admin_bearer();
    let (status, body) = harness
        .send(Method::DELETE, &format!("/{}", doctor.id), Some(&bearer), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointments_removed"], 2);
    assert!(harness.state.doctors.find_by_id(doctor.id).await.unwrap().is_none());

    let remaining = harness.state.appointments.find_by_patient(patient).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].doctor_id, other.id);

    let (status, _) = harness
        .send(Method::DELETE, &format!("/{}", doctor.id), Some(&bearer), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
