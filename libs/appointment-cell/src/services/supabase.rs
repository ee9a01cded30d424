// libs/appointment-cell/src/services/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{Appointment, AppointmentPatch, AppointmentQuery, BlockedTimeRange, NewAppointment};
use crate::services::catalog::SlotTime;
use crate::services::store::{format_sequence, AppointmentStore, BlockedRangeStore, SequenceAllocator};

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DatabaseError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(DatabaseError::from)
}

fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>, DatabaseError> {
    Ok(parse_rows(rows)?.into_iter().next())
}

/// Appointments and blocked ranges over PostgREST.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, path: &str) -> Result<Vec<Value>, DatabaseError> {
        debug!("Querying appointments: {}", path);
        self.supabase.request(Method::GET, path, None, None).await
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, DatabaseError> {
        let body = serde_json::to_value(&appointment)?;
        let rows = self.supabase
            .request_returning(Method::POST, "/rest/v1/appointments", Some(body))
            .await?;

        first_row(rows)?
            .ok_or_else(|| DatabaseError::Api { status: 200, message: "Insert returned no rows".to_string() })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let rows = self.select(&format!("/rest/v1/appointments?id=eq.{}", id)).await?;
        first_row(rows)
    }

    async fn find_active_at(
        &self,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?preferred_date=eq.{}&preferred_time=eq.{}&status=neq.cancelled&limit=1",
            date,
            urlencoding::encode(&time.to_string())
        );
        first_row(self.select(&path).await?)
    }

    async fn list_active_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let path = format!(
            "/rest/v1/appointments?preferred_date=eq.{}&status=neq.cancelled&order=preferred_time.asc",
            date
        );
        parse_rows(self.select(&path).await?)
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let mut query_parts = vec!["order=preferred_date.asc,preferred_time.asc".to_string()];

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("preferred_date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("preferred_date=lte.{}", to_date));
        }
        query_parts.push(format!("offset={}", query.effective_skip()));
        query_parts.push(format!("limit={}", query.effective_limit()));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        parse_rows(self.select(&path).await?)
    }

    async fn update(&self, id: Uuid, patch: &AppointmentPatch) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.supabase
            .request_returning(Method::PATCH, &path, Some(Value::Object(patch.to_update_map())))
            .await?;
        first_row(rows)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.supabase.request_returning(Method::DELETE, &path, None).await?;
        first_row(rows)
    }
}

#[async_trait]
impl BlockedRangeStore for SupabaseAppointmentStore {
    async fn active_ranges_covering(&self, date: NaiveDate) -> Result<Vec<BlockedTimeRange>, DatabaseError> {
        let path = format!(
            "/rest/v1/blocked_time_ranges?is_active=eq.true&start_date=lte.{}&end_date=gte.{}",
            date, date
        );
        debug!("Querying blocked ranges: {}", path);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        parse_rows(rows)
    }
}

/// Calls the `next_sequence_value` function, an upsert-increment on a counter row.
pub struct SupabaseSequenceAllocator {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSequenceAllocator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl SequenceAllocator for SupabaseSequenceAllocator {
    async fn next(&self, key: &str) -> Result<String, DatabaseError> {
        let value: u64 = self.supabase
            .rpc("next_sequence_value", json!({ "counter_key": key }))
            .await?;
        debug!("Allocated {} for {}", value, key);
        Ok(format_sequence(value))
    }
}
