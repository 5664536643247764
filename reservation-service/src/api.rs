use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shared::{
    CreateReservationRequest, CreateShowtimeRequest, PaymentCallback, ReservationDto, SeatDto,
    ShowtimeDto,
};

use crate::error::BookingError;
use crate::handlers::{DbPool, ReservationEngine, SeatDirectory, ShowtimeScheduler};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentCallbackResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailableShowtimesQuery {
    pub from: Option<NaiveDate>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/reservations", post(create_reservation).get(list_reservations))
        .route("/reservations/user/:user_id", get(reservations_by_user))
        .route(
            "/reservations/:id",
            get(get_reservation)
                .put(cancel_reservation)
                .delete(delete_reservation),
        )
        .route("/reservations/:id/confirm", put(confirm_reservation))
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/available", get(available_showtimes))
        .route("/showtimes/movie/:movie_id", get(showtimes_by_movie))
        .route("/showtimes/:id", get(get_showtime).delete(delete_showtime))
        .route("/showtimes/:id/seats", get(seats_by_showtime))
        .route(
            "/showtimes/:id/seats/available",
            get(available_seats_by_showtime),
        )
        .route("/payments/callback", get(payment_callback))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<Json<ReservationDto>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    Ok(Json(engine.create(request).await?))
}

pub async fn list_reservations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReservationDto>>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    Ok(Json(engine.list_all().await?))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReservationDto>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    Ok(Json(engine.get(&id).await?))
}

pub async fn reservations_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ReservationDto>>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    Ok(Json(engine.list_by_user(user_id).await?))
}

pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    engine.confirm(&id).await?;
    Ok(Json(MessageResponse {
        message: format!("reservation {} confirmed", id),
    }))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    engine.cancel(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    engine.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Payment gateway callback: success confirms the reservation, failure
/// cancels it and releases the seats.
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(callback): Query<PaymentCallback>,
) -> Result<Json<PaymentCallbackResponse>, BookingError> {
    let engine = ReservationEngine::new(state.pool.clone());
    if callback.success {
        engine.confirm(&callback.reservation_id).await?;
        Ok(Json(PaymentCallbackResponse {
            message: format!("payment confirmed for reservation {}", callback.reservation_id),
            status: "CONFIRMED".to_string(),
        }))
    } else {
        engine.cancel(&callback.reservation_id).await?;
        Ok(Json(PaymentCallbackResponse {
            message: format!(
                "payment failed, reservation {} canceled",
                callback.reservation_id
            ),
            status: "CANCELED".to_string(),
        }))
    }
}

pub async fn create_showtime(
    State(state): State<AppState>,
    Json(request): Json<CreateShowtimeRequest>,
) -> Result<(StatusCode, Json<ShowtimeDto>), BookingError> {
    let scheduler = ShowtimeScheduler::new(state.pool.clone());
    let created = scheduler.create(request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_showtime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ShowtimeDto>, BookingError> {
    let scheduler = ShowtimeScheduler::new(state.pool.clone());
    Ok(Json(scheduler.get(id).await?))
}

pub async fn showtimes_by_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<i64>,
) -> Result<Json<Vec<ShowtimeDto>>, BookingError> {
    let scheduler = ShowtimeScheduler::new(state.pool.clone());
    Ok(Json(scheduler.list_by_movie(movie_id).await?))
}

pub async fn available_showtimes(
    State(state): State<AppState>,
    Query(query): Query<AvailableShowtimesQuery>,
) -> Result<Json<Vec<ShowtimeDto>>, BookingError> {
    let scheduler = ShowtimeScheduler::new(state.pool.clone());
    Ok(Json(scheduler.list_available(query.from).await?))
}

pub async fn delete_showtime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, BookingError> {
    let scheduler = ShowtimeScheduler::new(state.pool.clone());
    scheduler.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seats_by_showtime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SeatDto>>, BookingError> {
    let directory = SeatDirectory::new(state.pool.clone());
    Ok(Json(directory.list_by_showtime(id).await?))
}

pub async fn available_seats_by_showtime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SeatDto>>, BookingError> {
    let directory = SeatDirectory::new(state.pool.clone());
    Ok(Json(directory.list_available_by_showtime(id).await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}
