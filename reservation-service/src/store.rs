//! Narrow persistence surface over the booking tables. Every function takes
//! the caller's connection so multi-table writes stay inside one transaction.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::{seat_label, SeatStatus};

use crate::error::BookingError;
use crate::models::{NewSeat, NewShowtime, Reservation, Seat, Showtime, Theater};
use crate::schema::{reservations, seats, showtimes, theaters};

pub struct SeatStore;

impl SeatStore {
    pub async fn list_by_showtime(
        conn: &mut AsyncPgConnection,
        showtime_id: i64,
    ) -> QueryResult<Vec<Seat>> {
        seats::table
            .filter(seats::showtime_id.eq(showtime_id))
            .order(seats::seat_number.asc())
            .load(conn)
            .await
    }

    pub async fn list_available_by_showtime(
        conn: &mut AsyncPgConnection,
        showtime_id: i64,
    ) -> QueryResult<Vec<Seat>> {
        seats::table
            .filter(seats::showtime_id.eq(showtime_id))
            .filter(seats::status.eq(SeatStatus::Available.as_str()))
            .order(seats::seat_number.asc())
            .load(conn)
            .await
    }

    pub async fn list_for_reservation(
        conn: &mut AsyncPgConnection,
        reservation_id: &str,
    ) -> QueryResult<Vec<Seat>> {
        seats::table
            .filter(seats::reservation_id.eq(reservation_id))
            .order(seats::seat_number.asc())
            .load(conn)
            .await
    }

    /// Locks the rows matching the given ids AND showtime (SELECT ... FOR
    /// UPDATE). Concurrent bookings on overlapping seats serialize here.
    pub async fn lock_for_booking(
        conn: &mut AsyncPgConnection,
        showtime_id: i64,
        seat_ids: &[i64],
    ) -> QueryResult<Vec<Seat>> {
        seats::table
            .filter(seats::id.eq_any(seat_ids))
            .filter(seats::showtime_id.eq(showtime_id))
            .for_update()
            .load(conn)
            .await
    }

    pub async fn mark_reserved(
        conn: &mut AsyncPgConnection,
        seat_ids: &[i64],
        reservation_id: &str,
    ) -> QueryResult<usize> {
        diesel::update(seats::table.filter(seats::id.eq_any(seat_ids)))
            .set((
                seats::status.eq(SeatStatus::Reserved.as_str()),
                seats::reservation_id.eq(reservation_id),
            ))
            .execute(conn)
            .await
    }

    /// Releases every seat linked to the reservation and returns how many
    /// were released.
    pub async fn release_for_reservation(
        conn: &mut AsyncPgConnection,
        reservation_id: &str,
    ) -> QueryResult<usize> {
        diesel::update(seats::table.filter(seats::reservation_id.eq(reservation_id)))
            .set((
                seats::status.eq(SeatStatus::Available.as_str()),
                seats::reservation_id.eq(None::<String>),
            ))
            .execute(conn)
            .await
    }

    /// Bulk delete; false means there was nothing to delete.
    pub async fn delete_all_for_showtime(
        conn: &mut AsyncPgConnection,
        showtime_id: i64,
    ) -> QueryResult<bool> {
        let deleted = diesel::delete(seats::table.filter(seats::showtime_id.eq(showtime_id)))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Creates `count` seats labeled A1..A10, B1.. for the showtime.
    /// Refuses to run twice for the same showtime.
    pub async fn generate_for_showtime(
        conn: &mut AsyncPgConnection,
        showtime_id: i64,
        count: i32,
    ) -> Result<Vec<Seat>, BookingError> {
        let existing: i64 = seats::table
            .filter(seats::showtime_id.eq(showtime_id))
            .count()
            .get_result(conn)
            .await?;
        if existing > 0 {
            return Err(BookingError::InvalidOperation(format!(
                "seats for showtime {} already exist",
                showtime_id
            )));
        }

        let rows: Vec<NewSeat> = (1..=count)
            .map(|i| NewSeat {
                showtime_id,
                seat_number: seat_label(i),
                status: SeatStatus::Available.as_str().to_string(),
            })
            .collect();

        let created = diesel::insert_into(seats::table)
            .values(&rows)
            .get_results(conn)
            .await?;
        Ok(created)
    }
}

pub struct ShowtimeStore;

impl ShowtimeStore {
    pub async fn find(conn: &mut AsyncPgConnection, id: i64) -> QueryResult<Option<Showtime>> {
        showtimes::table.find(id).first(conn).await.optional()
    }

    pub async fn find_theater(
        conn: &mut AsyncPgConnection,
        id: i64,
    ) -> QueryResult<Option<Theater>> {
        theaters::table.find(id).first(conn).await.optional()
    }

    pub async fn insert(conn: &mut AsyncPgConnection, row: &NewShowtime) -> QueryResult<Showtime> {
        diesel::insert_into(showtimes::table)
            .values(row)
            .get_result(conn)
            .await
    }

    /// Relative counter update executed as SQL arithmetic, so concurrent
    /// transactions on the same showtime never lose an update.
    pub async fn adjust_available_seats(
        conn: &mut AsyncPgConnection,
        id: i64,
        delta: i32,
    ) -> QueryResult<usize> {
        diesel::update(showtimes::table.find(id))
            .set(showtimes::available_seats.eq(showtimes::available_seats + delta))
            .execute(conn)
            .await
    }

    pub async fn set_available_seats(
        conn: &mut AsyncPgConnection,
        id: i64,
        value: i32,
    ) -> QueryResult<usize> {
        diesel::update(showtimes::table.find(id))
            .set(showtimes::available_seats.eq(value))
            .execute(conn)
            .await
    }

    pub async fn delete(conn: &mut AsyncPgConnection, id: i64) -> QueryResult<usize> {
        diesel::delete(showtimes::table.find(id)).execute(conn).await
    }

    pub async fn list_by_movie(
        conn: &mut AsyncPgConnection,
        movie_id: i64,
    ) -> QueryResult<Vec<Showtime>> {
        showtimes::table
            .filter(showtimes::movie_id.eq(movie_id))
            .order((showtimes::show_date.asc(), showtimes::show_time.asc()))
            .load(conn)
            .await
    }

    pub async fn list_available(
        conn: &mut AsyncPgConnection,
        from: NaiveDate,
    ) -> QueryResult<Vec<Showtime>> {
        showtimes::table
            .filter(showtimes::show_date.ge(from))
            .filter(showtimes::available_seats.gt(0))
            .order((showtimes::show_date.asc(), showtimes::show_time.asc()))
            .load(conn)
            .await
    }
}

pub struct ReservationStore;

impl ReservationStore {
    pub async fn find(
        conn: &mut AsyncPgConnection,
        id: &str,
    ) -> QueryResult<Option<Reservation>> {
        reservations::table.find(id).first(conn).await.optional()
    }

    pub async fn insert(conn: &mut AsyncPgConnection, row: &Reservation) -> QueryResult<usize> {
        diesel::insert_into(reservations::table)
            .values(row)
            .execute(conn)
            .await
    }

    pub async fn set_status(
        conn: &mut AsyncPgConnection,
        id: &str,
        status_id: i32,
    ) -> QueryResult<usize> {
        diesel::update(reservations::table.find(id))
            .set(reservations::status_id.eq(status_id))
            .execute(conn)
            .await
    }

    pub async fn mark_confirmed(conn: &mut AsyncPgConnection, id: &str) -> QueryResult<usize> {
        diesel::update(reservations::table.find(id))
            .set((
                reservations::status_id.eq(shared::ReservationStatus::Confirmed.code()),
                reservations::paid.eq(true),
            ))
            .execute(conn)
            .await
    }

    pub async fn delete(conn: &mut AsyncPgConnection, id: &str) -> QueryResult<usize> {
        diesel::delete(reservations::table.find(id)).execute(conn).await
    }

    pub async fn list_all(conn: &mut AsyncPgConnection) -> QueryResult<Vec<Reservation>> {
        reservations::table
            .order(reservations::reservation_time.asc())
            .load(conn)
            .await
    }

    pub async fn list_by_user(
        conn: &mut AsyncPgConnection,
        user_id: i64,
    ) -> QueryResult<Vec<Reservation>> {
        reservations::table
            .filter(reservations::user_id.eq(user_id))
            .order(reservations::reservation_time.asc())
            .load(conn)
            .await
    }
}
