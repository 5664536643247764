use std::collections::HashSet;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveTime, Utc};
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use rand::Rng;
use tracing::info;

use shared::{
    CreateReservationRequest, CreateShowtimeRequest, ReservationDto, ReservationStatus, SeatDto,
    SeatStatus, ShowtimeDto,
};

use crate::error::BookingError;
use crate::models::{NewShowtime, Reservation};
use crate::store::{ReservationStore, SeatStore, ShowtimeStore};

pub type DbPool = Pool<AsyncPgConnection>;

/// Booking reference: uppercase hex of the Unix-millisecond timestamp
/// followed by the hex of a non-negative random 31-bit integer. Short,
/// time-ordered, safe to hand to a payment gateway.
fn generate_reservation_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let entropy = rand::thread_rng().gen_range(0..i32::MAX);
    format!("{:X}{:X}", millis, entropy)
}

fn total_price(unit_price: &BigDecimal, seat_count: usize) -> BigDecimal {
    unit_price * BigDecimal::from(seat_count as i64)
}

/// Orchestrates seat locking, reservation creation, confirmation and
/// cancellation. Every multi-table write runs inside one transaction;
/// correctness under concurrent requests rests on the row locks taken by
/// `SeatStore::lock_for_booking`, not on any in-process mutual exclusion.
pub struct ReservationEngine {
    pool: DbPool,
}

impl ReservationEngine {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        request: CreateReservationRequest,
    ) -> Result<ReservationDto, BookingError> {
        if request.user_id <= 0 {
            return Err(BookingError::InvalidInput(
                "userId must be greater than zero".to_string(),
            ));
        }
        if request.seat_ids.is_empty() {
            return Err(BookingError::InvalidInput(
                "at least one seat must be selected".to_string(),
            ));
        }
        let mut distinct = request.seat_ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() != request.seat_ids.len() {
            return Err(BookingError::InvalidInput(
                "duplicate seat ids in request".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;

        let showtime = ShowtimeStore::find(&mut conn, request.showtime_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("showtime {} not found", request.showtime_id))
            })?;

        let user_id = request.user_id;
        let seat_ids = distinct;
        let reservation = conn
            .transaction::<_, BookingError, _>(|conn| {
                Box::pin(async move {
                    let seats = SeatStore::lock_for_booking(conn, showtime.id, &seat_ids).await?;

                    if seats.len() != seat_ids.len() {
                        let found: HashSet<i64> = seats.iter().map(|s| s.id).collect();
                        let missing: Vec<String> = seat_ids
                            .iter()
                            .filter(|id| !found.contains(id))
                            .map(|id| id.to_string())
                            .collect();
                        return Err(BookingError::NotFound(format!(
                            "seats not found with ids: {}",
                            missing.join(", ")
                        )));
                    }

                    // The locked fetch already filtered on the showtime;
                    // recheck so a mismatch can never slip through.
                    let wrong: Vec<String> = seats
                        .iter()
                        .filter(|s| s.showtime_id != showtime.id)
                        .map(|s| s.seat_number.clone())
                        .collect();
                    if !wrong.is_empty() {
                        return Err(BookingError::InvalidInput(format!(
                            "seats {} do not belong to showtime {}",
                            wrong.join(", "),
                            showtime.id
                        )));
                    }

                    let taken: Vec<String> = seats
                        .iter()
                        .filter(|s| s.status == SeatStatus::Reserved.as_str())
                        .map(|s| s.seat_number.clone())
                        .collect();
                    if !taken.is_empty() {
                        return Err(BookingError::Conflict(format!(
                            "seats already reserved: {}",
                            taken.join(", ")
                        )));
                    }

                    let row = Reservation {
                        id: generate_reservation_id(),
                        user_id,
                        showtime_id: showtime.id,
                        reservation_time: Utc::now(),
                        status_id: ReservationStatus::Pending.code(),
                        total_price: total_price(&showtime.price, seats.len()),
                        paid: false,
                    };

                    ReservationStore::insert(conn, &row).await?;
                    SeatStore::mark_reserved(conn, &seat_ids, &row.id).await?;
                    ShowtimeStore::adjust_available_seats(conn, showtime.id, -(seats.len() as i32))
                        .await?;

                    let seat_dtos = seats
                        .into_iter()
                        .map(|mut seat| {
                            seat.status = SeatStatus::Reserved.as_str().to_string();
                            seat.reservation_id = Some(row.id.clone());
                            SeatDto::from(seat)
                        })
                        .collect();

                    Ok(row.into_dto(seat_dtos))
                })
            })
            .await?;

        info!(
            "Reservation {} created for user {} ({} seats)",
            reservation.id,
            reservation.user_id,
            reservation.seats.len()
        );
        Ok(reservation)
    }

    /// Marks the reservation paid. Confirming an already confirmed and paid
    /// reservation is a no-op success; a canceled one is a hard error.
    /// Seats are not touched: confirmation changes payment state only.
    pub async fn confirm(&self, reservation_id: &str) -> Result<(), BookingError> {
        let mut conn = self.pool.get().await?;

        let reservation = ReservationStore::find(&mut conn, reservation_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("reservation {} not found", reservation_id))
            })?;

        if reservation.status_id == ReservationStatus::Canceled.code() {
            return Err(BookingError::InvalidOperation(
                "cannot confirm a canceled reservation".to_string(),
            ));
        }
        if reservation.status_id == ReservationStatus::Confirmed.code() && reservation.paid {
            return Ok(());
        }

        ReservationStore::mark_confirmed(&mut conn, reservation_id).await?;
        info!("Reservation {} confirmed", reservation_id);
        Ok(())
    }

    /// Cancels the reservation, releases its seats and restores the showtime
    /// counter by the released count, all in one transaction.
    pub async fn cancel(&self, reservation_id: &str) -> Result<(), BookingError> {
        let mut conn = self.pool.get().await?;

        let id = reservation_id.to_string();
        conn.transaction::<_, BookingError, _>(|conn| {
            let id = id.clone();
            Box::pin(async move {
                let reservation = ReservationStore::find(conn, &id).await?.ok_or_else(|| {
                    BookingError::NotFound(format!("reservation {} not found", id))
                })?;

                ReservationStore::set_status(conn, &id, ReservationStatus::Canceled.code())
                    .await?;
                let released = SeatStore::release_for_reservation(conn, &id).await?;
                if released > 0 {
                    ShowtimeStore::adjust_available_seats(
                        conn,
                        reservation.showtime_id,
                        released as i32,
                    )
                    .await?;
                }
                Ok(released)
            })
        })
        .await
        .map(|released| {
            info!(
                "Reservation {} canceled, {} seats released",
                reservation_id, released
            );
        })
    }

    /// Maintenance hard delete, distinct from cancellation: removes the row
    /// after releasing its seats. The counter is restored by the actual
    /// number of seats the reservation held.
    pub async fn delete(&self, reservation_id: &str) -> Result<(), BookingError> {
        let mut conn = self.pool.get().await?;

        let id = reservation_id.to_string();
        conn.transaction::<_, BookingError, _>(|conn| {
            let id = id.clone();
            Box::pin(async move {
                let reservation = ReservationStore::find(conn, &id).await?.ok_or_else(|| {
                    BookingError::NotFound(format!("reservation {} not found", id))
                })?;

                let released = SeatStore::release_for_reservation(conn, &id).await?;
                if released > 0 {
                    ShowtimeStore::adjust_available_seats(
                        conn,
                        reservation.showtime_id,
                        released as i32,
                    )
                    .await?;
                }
                ReservationStore::delete(conn, &id).await?;
                Ok(())
            })
        })
        .await?;

        info!("Reservation {} deleted", reservation_id);
        Ok(())
    }

    pub async fn get(&self, reservation_id: &str) -> Result<ReservationDto, BookingError> {
        let mut conn = self.pool.get().await?;

        let reservation = ReservationStore::find(&mut conn, reservation_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("reservation {} not found", reservation_id))
            })?;

        let seats = SeatStore::list_for_reservation(&mut conn, reservation_id).await?;
        Ok(reservation.into_dto(seats.into_iter().map(SeatDto::from).collect()))
    }

    pub async fn list_all(&self) -> Result<Vec<ReservationDto>, BookingError> {
        let mut conn = self.pool.get().await?;
        let rows = ReservationStore::list_all(&mut conn).await?;
        Self::attach_seats(&mut conn, rows).await
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<ReservationDto>, BookingError> {
        if user_id <= 0 {
            return Err(BookingError::InvalidInput(
                "userId must be greater than zero".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;
        let rows = ReservationStore::list_by_user(&mut conn, user_id).await?;
        Self::attach_seats(&mut conn, rows).await
    }

    async fn attach_seats(
        conn: &mut AsyncPgConnection,
        rows: Vec<Reservation>,
    ) -> Result<Vec<ReservationDto>, BookingError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let seats = SeatStore::list_for_reservation(conn, &row.id).await?;
            out.push(row.into_dto(seats.into_iter().map(SeatDto::from).collect()));
        }
        Ok(out)
    }
}

/// Read-only seat map access, scoped by showtime.
pub struct SeatDirectory {
    pool: DbPool,
}

impl SeatDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_showtime(&self, showtime_id: i64) -> Result<Vec<SeatDto>, BookingError> {
        let mut conn = self.pool.get().await?;
        let seats = SeatStore::list_by_showtime(&mut conn, showtime_id).await?;
        Ok(seats.into_iter().map(SeatDto::from).collect())
    }

    pub async fn list_available_by_showtime(
        &self,
        showtime_id: i64,
    ) -> Result<Vec<SeatDto>, BookingError> {
        let mut conn = self.pool.get().await?;
        let seats = SeatStore::list_available_by_showtime(&mut conn, showtime_id).await?;
        Ok(seats.into_iter().map(SeatDto::from).collect())
    }
}

/// Showtime administration: creation with bulk seat generation, read
/// projections, and deletion together with the seat pool.
pub struct ShowtimeScheduler {
    pool: DbPool,
}

impl ShowtimeScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        request: CreateShowtimeRequest,
    ) -> Result<ShowtimeDto, BookingError> {
        let show_time = NaiveTime::parse_from_str(&request.show_time, "%H:%M")
            .map_err(|_| BookingError::InvalidInput("showTime must be in HH:MM format".to_string()))?;
        if request.total_seats <= 0 {
            return Err(BookingError::InvalidInput(
                "totalSeats must be greater than zero".to_string(),
            ));
        }

        let mut conn = self.pool.get().await?;

        let theater = ShowtimeStore::find_theater(&mut conn, request.theater_id)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("theater {} not found", request.theater_id))
            })?;
        if request.total_seats > theater.capacity {
            return Err(BookingError::InvalidInput(format!(
                "totalSeats ({}) cannot be greater than theater capacity ({})",
                request.total_seats, theater.capacity
            )));
        }

        let row = NewShowtime {
            movie_id: request.movie_id,
            theater_id: request.theater_id,
            show_date: request.show_date,
            show_time,
            price: request.price,
            total_seats: request.total_seats,
            available_seats: request.total_seats,
        };
        let showtime = ShowtimeStore::insert(&mut conn, &row).await?;

        let seats =
            SeatStore::generate_for_showtime(&mut conn, showtime.id, showtime.total_seats).await?;

        // Generation may diverge from the requested count; the counter
        // follows what actually exists.
        let available = showtime.total_seats.min(seats.len() as i32);
        ShowtimeStore::set_available_seats(&mut conn, showtime.id, available).await?;

        info!(
            "Showtime {} created with {} seats",
            showtime.id,
            seats.len()
        );

        let mut dto = showtime.into_dto(Some(seats.into_iter().map(SeatDto::from).collect()));
        dto.available_seats = available;
        Ok(dto)
    }

    pub async fn get(&self, id: i64) -> Result<ShowtimeDto, BookingError> {
        let mut conn = self.pool.get().await?;

        let showtime = ShowtimeStore::find(&mut conn, id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("showtime {} not found", id)))?;

        let seats = SeatStore::list_by_showtime(&mut conn, id).await?;
        Ok(showtime.into_dto(Some(seats.into_iter().map(SeatDto::from).collect())))
    }

    pub async fn list_by_movie(&self, movie_id: i64) -> Result<Vec<ShowtimeDto>, BookingError> {
        let mut conn = self.pool.get().await?;
        let rows = ShowtimeStore::list_by_movie(&mut conn, movie_id).await?;
        Ok(rows.into_iter().map(|s| s.into_dto(None)).collect())
    }

    pub async fn list_available(
        &self,
        from: Option<NaiveDate>,
    ) -> Result<Vec<ShowtimeDto>, BookingError> {
        let from = from.unwrap_or_else(|| Utc::now().date_naive());
        let mut conn = self.pool.get().await?;
        let rows = ShowtimeStore::list_available(&mut conn, from).await?;
        Ok(rows.into_iter().map(|s| s.into_dto(None)).collect())
    }

    pub async fn delete(&self, id: i64) -> Result<(), BookingError> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move {
                SeatStore::delete_all_for_showtime(conn, id).await?;
                let deleted = ShowtimeStore::delete(conn, id).await?;
                if deleted == 0 {
                    return Err(BookingError::NotFound(format!("showtime {} not found", id)));
                }
                Ok(())
            })
        })
        .await?;

        info!("Showtime {} and its seats deleted", id);
        Ok(())
    }
}
