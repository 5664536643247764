use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reservation lifecycle status, persisted as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl ReservationStatus {
    pub const fn code(self) -> i32 {
        match self {
            ReservationStatus::Pending => 1,
            ReservationStatus::Confirmed => 2,
            ReservationStatus::Canceled => 3,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ReservationStatus::Pending),
            2 => Some(ReservationStatus::Confirmed),
            3 => Some(ReservationStatus::Canceled),
            _ => None,
        }
    }
}

/// Maps a stored status code to its external label. Total on purpose:
/// read paths must never fail on an unrecognized code.
pub fn status_label(code: i32) -> &'static str {
    match code {
        1 => "PENDING",
        2 => "CONFIRMED",
        3 => "CANCELED",
        _ => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatStatus {
    Available,
    Reserved,
}

impl SeatStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Reserved => "RESERVED",
        }
    }
}

/// Seat label for the 1-based seat index: ten seats per row letter,
/// rows advance alphabetically (A1..A10, B1..B10, ...).
pub fn seat_label(index: i32) -> String {
    let row = (b'A' + ((index - 1) / 10) as u8) as char;
    let column = (index - 1) % 10 + 1;
    format!("{}{}", row, column)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatDto {
    pub id: i64,
    pub showtime_id: i64,
    pub seat_number: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDto {
    pub id: String,
    pub user_id: i64,
    pub showtime_id: i64,
    pub reservation_time: DateTime<Utc>,
    pub status_id: i32,
    pub status_value: String,
    pub total_price: BigDecimal,
    pub paid: bool,
    pub seats: Vec<SeatDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeDto {
    pub id: i64,
    pub movie_id: i64,
    pub theater_id: i64,
    pub show_date: NaiveDate,
    pub show_time: String,
    pub price: BigDecimal,
    pub total_seats: i32,
    pub available_seats: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<Vec<SeatDto>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub user_id: i64,
    pub showtime_id: i64,
    pub seat_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShowtimeRequest {
    pub movie_id: i64,
    pub theater_id: i64,
    pub show_date: NaiveDate,
    /// HH:MM, parsed by the service.
    pub show_time: String,
    pub price: BigDecimal,
    pub total_seats: i32,
}

/// Outcome signal from the payment gateway, keyed by reservation id.
/// Gateway signature verification happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    pub reservation_id: String,
    pub success: bool,
}
