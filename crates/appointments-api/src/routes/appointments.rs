//! Routes for the booking context.
//!
//! Reads are served from the write store. Writes succeed once the write store
//! has committed, whether or not the resulting event reached the broker.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use appointments_booking::application::command_handlers;
use appointments_booking::application::query_handlers::{self, AppointmentView};
use appointments_booking::domain::commands;
use appointments_booking::domain::status::AppointmentStatus;
use appointments_core::error::DomainError;

use crate::correlation::CorrelationId;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /appointments`.
#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Customer booking the appointment. `user_id` is accepted as an alias.
    #[serde(default, alias = "user_id")]
    pub customer_id: Option<String>,
    /// Optional provider.
    #[serde(default)]
    pub provider_id: Option<String>,
    /// RFC 3339 start of the interval.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// RFC 3339 end of the interval.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

/// Request body for `POST /appointments/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    /// Target status in wire form, e.g. `CONFIRMED`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Query string for `GET /appointments`.
#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    /// Appointment identifier.
    pub id: Option<String>,
}

type AppointmentResponse = (StatusCode, CorrelationId, Json<AppointmentView>);

fn parse_id(raw: Option<&str>) -> Result<Uuid, DomainError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DomainError::Validation("id is required".into()))?;
    Uuid::parse_str(raw).map_err(|_| DomainError::Validation(format!("id is not a valid UUID: {raw}")))
}

/// POST /appointments
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn create_appointment(
    State(state): State<AppState>,
    correlation: CorrelationId,
    body: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<AppointmentResponse, ApiError> {
    let Json(request) = body?;
    let command = commands::CreateAppointment {
        correlation_id: correlation.0,
        customer_id: request
            .customer_id
            .ok_or_else(|| DomainError::Validation("customer_id is required".into()))?,
        provider_id: request.provider_id,
        start_time: request.start_time,
        end_time: request.end_time,
    };

    info!("handling create_appointment command");

    let outcome = command_handlers::handle_create_appointment(
        &command,
        state.clock.as_ref(),
        &*state.appointment_repository,
        &state.publisher,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        correlation,
        Json(outcome.appointment.into()),
    ))
}

/// GET /appointments?id=...
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn get_appointment_by_query(
    State(state): State<AppState>,
    correlation: CorrelationId,
    query: Result<Query<AppointmentQuery>, QueryRejection>,
) -> Result<AppointmentResponse, ApiError> {
    let Query(query) = query?;
    let id = parse_id(query.id.as_deref())?;
    let view = query_handlers::get_appointment(id, &*state.appointment_repository).await?;
    Ok((StatusCode::OK, correlation, Json(view)))
}

/// GET /appointments/{id}
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn get_appointment_by_path(
    State(state): State<AppState>,
    correlation: CorrelationId,
    id: Result<Path<String>, PathRejection>,
) -> Result<AppointmentResponse, ApiError> {
    let Path(raw) = id?;
    let id = parse_id(Some(&raw))?;
    let view = query_handlers::get_appointment(id, &*state.appointment_repository).await?;
    Ok((StatusCode::OK, correlation, Json(view)))
}

/// POST /appointments/{id}/status
#[instrument(skip_all, fields(correlation_id = %correlation.0))]
async fn change_status(
    State(state): State<AppState>,
    correlation: CorrelationId,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<AppointmentResponse, ApiError> {
    let Path(raw) = id?;
    let appointment_id = parse_id(Some(&raw))?;
    let Json(request) = body?;
    let new_status: AppointmentStatus = request
        .status
        .ok_or_else(|| DomainError::Validation("status is required".into()))?
        .parse()?;

    let command = commands::ChangeAppointmentStatus {
        correlation_id: correlation.0,
        appointment_id,
        new_status,
    };

    info!(%appointment_id, %new_status, "handling change_status command");

    let outcome = command_handlers::handle_change_status(
        &command,
        state.clock.as_ref(),
        &*state.appointment_repository,
        &state.publisher,
    )
    .await?;

    Ok((StatusCode::OK, correlation, Json(outcome.appointment.into())))
}

/// Returns the router for the booking context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/appointments",
            post(create_appointment).get(get_appointment_by_query),
        )
        .route("/appointments/{id}", get(get_appointment_by_path))
        .route("/appointments/{id}/status", post(change_status))
}
