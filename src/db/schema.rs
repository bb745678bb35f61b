//! Database schema definitions for Diesel.

diesel::table! {
    users (id) {
        id -> Integer,
        email -> Text,
        name -> Nullable<Text>,
        image -> Nullable<Text>,
        is_admin -> Bool,
        api_key -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    proposals (id) {
        id -> Integer,
        proposer_id -> Integer,
        title -> Text,
        artist -> Text,
        chart_url -> Nullable<Text>,
        lyrics_url -> Nullable<Text>,
        youtube_url -> Nullable<Text>,
        status -> Text,
        setlist_order -> Nullable<Integer>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    votes (id) {
        id -> Integer,
        user_id -> Integer,
        proposal_id -> Integer,
        created_at -> Timestamp,
    }
}

diesel::table! {
    settings (id) {
        id -> Integer,
        vote_threshold -> Integer,
        admin_allowlist -> Text,
    }
}

diesel::table! {
    audit_log (id) {
        id -> Integer,
        user_id -> Integer,
        action -> Text,
        target_id -> Integer,
        created_at -> Timestamp,
    }
}

// Define foreign key relationships
diesel::joinable!(proposals -> users (proposer_id));
diesel::joinable!(votes -> proposals (proposal_id));
diesel::joinable!(votes -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    proposals,
    votes,
    settings,
    audit_log,
);
