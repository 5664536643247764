//! Integration tests for the booking workflow against a real PostgreSQL
//! database.
//!
//! Set `DATABASE_URL` to a scratch database and run with
//! `cargo test -p reservation-service -- --ignored`.

use std::sync::Once;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use reservation_service::error::BookingError;
use reservation_service::handlers::{DbPool, ReservationEngine, ShowtimeScheduler};
use reservation_service::schema::{reservations, seats, showtimes, theaters};
use shared::{CreateReservationRequest, CreateShowtimeRequest, SeatStatus, ShowtimeDto};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static MIGRATIONS_DONE: Once = Once::new();

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch postgres database")
}

async fn setup_pool() -> DbPool {
    let url = database_url();
    MIGRATIONS_DONE.call_once(|| {
        let mut conn = PgConnection::establish(&url).expect("failed to connect for migrations");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("failed to run migrations");
    });

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&url);
    Pool::builder().build(config).await.expect("failed to build pool")
}

/// Fresh theater + showtime with `total_seats` seats at 50 per seat.
async fn setup_showtime(pool: &DbPool, total_seats: i32) -> ShowtimeDto {
    let mut conn = pool.get().await.expect("pool checkout");

    let theater_id: i64 = diesel::insert_into(theaters::table)
        .values((
            theaters::name.eq("Main Hall"),
            theaters::location.eq("Downtown"),
            theaters::capacity.eq(500),
        ))
        .returning(theaters::id)
        .get_result(&mut conn)
        .await
        .expect("insert theater");

    let scheduler = ShowtimeScheduler::new(pool.clone());
    scheduler
        .create(CreateShowtimeRequest {
            movie_id: 1,
            theater_id,
            show_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            show_time: "19:30".to_string(),
            price: BigDecimal::from(50),
            total_seats,
        })
        .await
        .expect("create showtime")
}

async fn available_seats(pool: &DbPool, showtime_id: i64) -> i32 {
    let mut conn = pool.get().await.unwrap();
    showtimes::table
        .find(showtime_id)
        .select(showtimes::available_seats)
        .first(&mut conn)
        .await
        .unwrap()
}

async fn reserved_seat_count(pool: &DbPool, showtime_id: i64) -> i64 {
    let mut conn = pool.get().await.unwrap();
    seats::table
        .filter(seats::showtime_id.eq(showtime_id))
        .filter(seats::status.eq(SeatStatus::Reserved.as_str()))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap()
}

async fn reservation_state(pool: &DbPool, id: &str) -> (i32, bool) {
    let mut conn = pool.get().await.unwrap();
    reservations::table
        .find(id)
        .select((reservations::status_id, reservations::paid))
        .first(&mut conn)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn reserving_seats_marks_them_and_decrements_the_counter() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());
    let reservation = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..2].to_vec(),
        })
        .await
        .expect("create reservation");

    assert_eq!(reservation.status_value, "PENDING");
    assert!(!reservation.paid);
    assert_eq!(reservation.total_price, BigDecimal::from(100));
    assert_eq!(reservation.seats.len(), 2);
    assert!(reservation
        .seats
        .iter()
        .all(|s| s.status == SeatStatus::Reserved.as_str()));

    assert_eq!(available_seats(&pool, showtime.id).await, 8);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 2);
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn overlapping_concurrent_requests_never_double_book() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    // Every request overlaps at least one other on some seat.
    let attempts = vec![
        vec![seat_ids[0], seat_ids[1]],
        vec![seat_ids[1], seat_ids[2]],
        vec![seat_ids[2], seat_ids[3]],
        vec![seat_ids[0], seat_ids[3]],
        vec![seat_ids[1], seat_ids[4]],
        vec![seat_ids[4], seat_ids[5]],
    ];

    let mut handles = Vec::new();
    for (i, ids) in attempts.into_iter().enumerate() {
        let engine = ReservationEngine::new(pool.clone());
        let showtime_id = showtime.id;
        handles.push(tokio::spawn(async move {
            engine
                .create(CreateReservationRequest {
                    user_id: (i + 1) as i64,
                    showtime_id,
                    seat_ids: ids.clone(),
                })
                .await
                .map(|r| r.seats.iter().map(|s| s.id).collect::<Vec<i64>>())
        }));
    }

    let mut won: Vec<i64> = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ids) => won.extend(ids),
            Err(BookingError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error under contention: {other}"),
        }
    }

    // No seat may be won twice, and exactly the won seats are reserved.
    let mut deduped = won.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), won.len(), "a seat was double-booked: {won:?}");

    assert_eq!(reserved_seat_count(&pool, showtime.id).await, won.len() as i64);
    assert_eq!(
        available_seats(&pool, showtime.id).await,
        10 - won.len() as i32
    );
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn confirm_is_idempotent() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());
    let reservation = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..1].to_vec(),
        })
        .await
        .unwrap();

    engine.confirm(&reservation.id).await.expect("first confirm");
    engine.confirm(&reservation.id).await.expect("second confirm");

    let (status_id, paid) = reservation_state(&pool, &reservation.id).await;
    assert_eq!(status_id, 2);
    assert!(paid);
    // Confirmation does not change seat occupancy.
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 1);
    assert_eq!(available_seats(&pool, showtime.id).await, 9);
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn cancel_releases_every_seat_and_restores_the_counter() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());
    let reservation = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..3].to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(available_seats(&pool, showtime.id).await, 7);

    engine.cancel(&reservation.id).await.expect("cancel");

    assert_eq!(available_seats(&pool, showtime.id).await, 10);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 0);
    let (status_id, _) = reservation_state(&pool, &reservation.id).await;
    assert_eq!(status_id, 3);

    let mut conn = pool.get().await.unwrap();
    let linked: i64 = seats::table
        .filter(seats::reservation_id.eq(&reservation.id))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap();
    assert_eq!(linked, 0, "cancel must clear the seat links");
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn confirming_a_canceled_reservation_is_rejected() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());
    let reservation = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..2].to_vec(),
        })
        .await
        .unwrap();
    engine.cancel(&reservation.id).await.unwrap();

    let err = engine.confirm(&reservation.id).await.unwrap_err();
    assert!(
        matches!(err, BookingError::InvalidOperation(_)),
        "expected InvalidOperation, got {err:?}"
    );

    // The failed confirm must not mutate seats or counters.
    assert_eq!(available_seats(&pool, showtime.id).await, 10);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 0);
    let (status_id, paid) = reservation_state(&pool, &reservation.id).await;
    assert_eq!(status_id, 3);
    assert!(!paid);
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn hard_delete_restores_the_counter_by_the_actual_seat_count() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());
    let reservation = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..2].to_vec(),
        })
        .await
        .unwrap();
    assert_eq!(available_seats(&pool, showtime.id).await, 8);

    engine.delete(&reservation.id).await.expect("delete");

    // Two seats were held, so the counter comes back by two. A flat +1
    // here would leave the pool permanently short for multi-seat bookings.
    assert_eq!(available_seats(&pool, showtime.id).await, 10);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 0);

    let mut conn = pool.get().await.unwrap();
    let remaining: i64 = reservations::table
        .filter(reservations::id.eq(&reservation.id))
        .count()
        .get_result(&mut conn)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn booking_requests_are_validated() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());

    let err = engine
        .create(CreateReservationRequest {
            user_id: 0,
            showtime_id: showtime.id,
            seat_ids: seat_ids[..1].to_vec(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));

    let err = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));

    let err = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: vec![seat_ids[0], seat_ids[0]],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));

    let err = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: -1,
            seat_ids: seat_ids[..1].to_vec(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    let err = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: vec![seat_ids[0], i64::MAX],
        })
        .await
        .unwrap_err();
    match err {
        BookingError::NotFound(message) => {
            assert!(message.contains(&i64::MAX.to_string()), "missing ids must be named: {message}");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }

    // Validation failures must leave no partial state behind.
    assert_eq!(available_seats(&pool, showtime.id).await, 10);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 0);
}

/// The end-to-end scenario: overlapping booking attempts, cancellation,
/// and a rejected late confirm.
#[tokio::test]
#[ignore = "requires postgres via DATABASE_URL"]
async fn the_full_booking_lifecycle() {
    let pool = setup_pool().await;
    let showtime = setup_showtime(&pool, 10).await;
    let seat_ids: Vec<i64> = showtime.seats.as_ref().unwrap().iter().map(|s| s.id).collect();

    let engine = ReservationEngine::new(pool.clone());

    let first = engine
        .create(CreateReservationRequest {
            user_id: 7,
            showtime_id: showtime.id,
            seat_ids: vec![seat_ids[0], seat_ids[1]],
        })
        .await
        .expect("first booking");
    assert_eq!(first.status_value, "PENDING");
    assert_eq!(first.total_price, BigDecimal::from(100));
    assert_eq!(available_seats(&pool, showtime.id).await, 8);

    let err = engine
        .create(CreateReservationRequest {
            user_id: 9,
            showtime_id: showtime.id,
            seat_ids: vec![seat_ids[1], seat_ids[2]],
        })
        .await
        .unwrap_err();
    match err {
        BookingError::Conflict(message) => {
            assert!(message.contains("A2"), "conflicting label must be named: {message}");
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    // The losing request must leave no partial effect.
    assert_eq!(available_seats(&pool, showtime.id).await, 8);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 2);

    engine.cancel(&first.id).await.expect("cancel");
    assert_eq!(available_seats(&pool, showtime.id).await, 10);
    assert_eq!(reserved_seat_count(&pool, showtime.id).await, 0);

    let err = engine.confirm(&first.id).await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidOperation(_)));

    let listed = engine.list_by_user(7).await.unwrap();
    assert!(listed.iter().any(|r| r.id == first.id && r.status_value == "CANCELED"));
}
