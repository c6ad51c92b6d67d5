use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{Appointment, Doctor};

use crate::store::{AppointmentStore, DoctorDirectory, DuplicateEmail};

/// PostgREST answered 409, i.e. a unique or foreign key constraint rejected the write.
#[derive(Debug, Error)]
#[error("Constraint violation: {0}")]
pub struct ConstraintViolation(pub String);

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.anon_key))?,
        );

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => ConstraintViolation(error_text).into(),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Runs a request whose response body is irrelevant (deletes, minimal upserts).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<()> {
        self.send(method, path, body, headers).await?;
        Ok(())
    }
}

fn upsert_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Prefer",
        HeaderValue::from_static("resolution=merge-duplicates,return=minimal"),
    );
    headers
}

fn timestamp_param(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}

/// Escapes LIKE wildcards (`%`, `_`, and PostgREST's `*`) so `value` matches literally.
fn like_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Result<Vec<T>> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| anyhow!("Failed to parse {}: {}", what, e))
}

// ==============================================================================
// POSTGREST-BACKED STORES
// ==============================================================================

/// Appointment store backed by the `appointments` table.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Appointment>> {
        let path = format!("/rest/v1/appointments?{}", query);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        parse_rows(rows, "appointments")
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_by_doctor_and_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        self.fetch(&format!(
            "doctor_id=eq.{}&appointment_time=gte.{}&appointment_time=lt.{}&order=appointment_time.asc",
            doctor_id,
            timestamp_param(start),
            timestamp_param(end)
        ))
        .await
    }

    async fn find_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>> {
        self.fetch(&format!(
            "patient_id=eq.{}&order=appointment_time.asc",
            patient_id
        ))
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.fetch(&format!("id=eq.{}", id)).await?.into_iter().next())
    }

    async fn save(&self, appointment: &Appointment) -> Result<()> {
        self.supabase
            .execute(
                Method::POST,
                "/rest/v1/appointments",
                Some(serde_json::to_value(appointment)?),
                Some(upsert_headers()),
            )
            .await
    }

    async fn delete_by_doctor(&self, doctor_id: Uuid) -> Result<usize> {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let path = format!("/rest/v1/appointments?doctor_id=eq.{}", doctor_id);
        let removed: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, Some(headers))
            .await?;

        Ok(removed.len())
    }
}

/// Doctor directory backed by the `doctors` table.
pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Doctor>> {
        let path = format!("/rest/v1/doctors?{}", query);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        parse_rows(rows, "doctors")
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.fetch(&format!("id=eq.{}", id)).await?.into_iter().next())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        // Emails are stored lowercased, so an exact match suffices.
        let query = format!("email=eq.{}", urlencoding::encode(&email.to_lowercase()));
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    async fn find_by_name_substring(&self, fragment: &str) -> Result<Vec<Doctor>> {
        let pattern = format!("*{}*", like_literal(fragment));
        self.fetch(&format!(
            "name=ilike.{}&order=name.asc",
            urlencoding::encode(&pattern)
        ))
        .await
    }

    async fn find_by_specialty(&self, specialty: &str) -> Result<Vec<Doctor>> {
        self.fetch(&format!(
            "specialty=ilike.{}&order=name.asc",
            urlencoding::encode(&like_literal(specialty))
        ))
        .await
    }

    async fn find_all(&self) -> Result<Vec<Doctor>> {
        self.fetch("order=name.asc").await
    }

    async fn save(&self, doctor: &Doctor) -> Result<()> {
        self.supabase
            .execute(
                Method::POST,
                "/rest/v1/doctors",
                Some(serde_json::to_value(doctor)?),
                Some(upsert_headers()),
            )
            .await
            .map_err(|e| {
                if e.is::<ConstraintViolation>() {
                    DuplicateEmail(doctor.email.clone()).into()
                } else {
                    e
                }
            })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let path = format!("/rest/v1/doctors?id=eq.{}", id);
        self.supabase.execute(Method::DELETE, &path, None, None).await
    }
}
