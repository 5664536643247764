diesel::table! {
    theaters (id) {
        id -> Int8,
        name -> Varchar,
        location -> Varchar,
        capacity -> Int4,
    }
}

diesel::table! {
    showtimes (id) {
        id -> Int8,
        movie_id -> Int8,
        theater_id -> Int8,
        show_date -> Date,
        show_time -> Time,
        price -> Numeric,
        total_seats -> Int4,
        available_seats -> Int4,
    }
}

diesel::table! {
    seats (id) {
        id -> Int8,
        showtime_id -> Int8,
        seat_number -> Varchar,
        status -> Varchar,
        reservation_id -> Nullable<Varchar>,
    }
}

diesel::table! {
    reservations (id) {
        id -> Varchar,
        user_id -> Int8,
        showtime_id -> Int8,
        reservation_time -> Timestamptz,
        status_id -> Int4,
        total_price -> Numeric,
        paid -> Bool,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    theaters,
    showtimes,
    seats,
    reservations,
);
