use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::{status_label, ReservationDto, SeatDto, ShowtimeDto};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::theaters)]
pub struct Theater {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub capacity: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::showtimes)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub theater_id: i64,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub price: BigDecimal,
    pub total_seats: i32,
    pub available_seats: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::showtimes)]
pub struct NewShowtime {
    pub movie_id: i64,
    pub theater_id: i64,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub price: BigDecimal,
    pub total_seats: i32,
    pub available_seats: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::seats)]
pub struct Seat {
    pub id: i64,
    pub showtime_id: i64,
    pub seat_number: String,
    pub status: String,
    pub reservation_id: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::seats)]
pub struct NewSeat {
    pub showtime_id: i64,
    pub seat_number: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: String,
    pub user_id: i64,
    pub showtime_id: i64,
    pub reservation_time: DateTime<Utc>,
    pub status_id: i32,
    pub total_price: BigDecimal,
    pub paid: bool,
}

impl From<Seat> for SeatDto {
    fn from(seat: Seat) -> Self {
        SeatDto {
            id: seat.id,
            showtime_id: seat.showtime_id,
            seat_number: seat.seat_number,
            status: seat.status,
        }
    }
}

impl Showtime {
    pub fn into_dto(self, seats: Option<Vec<SeatDto>>) -> ShowtimeDto {
        ShowtimeDto {
            id: self.id,
            movie_id: self.movie_id,
            theater_id: self.theater_id,
            show_date: self.show_date,
            show_time: self.show_time.format("%H:%M").to_string(),
            price: self.price,
            total_seats: self.total_seats,
            available_seats: self.available_seats,
            seats,
        }
    }
}

impl Reservation {
    pub fn into_dto(self, seats: Vec<SeatDto>) -> ReservationDto {
        ReservationDto {
            id: self.id,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            reservation_time: self.reservation_time,
            status_id: self.status_id,
            status_value: status_label(self.status_id).to_string(),
            total_price: self.total_price,
            paid: self.paid,
            seats,
        }
    }
}
