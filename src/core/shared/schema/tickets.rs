diesel::table! {
    tickets (id) {
        id -> Uuid,
        category_id -> Uuid,
        subcategory_id -> Uuid,
        user_id -> Uuid,
        agent_id -> Nullable<Uuid>,
        title -> Varchar,
        description -> Text,
        content -> Jsonb,
        priority -> Varchar,
        severity -> Varchar,
        tags -> Jsonb,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        closed_at -> Nullable<Timestamptz>,
        sla_due_date -> Nullable<Timestamptz>,
        sla_breached -> Bool,
        sla_paused_at -> Nullable<Timestamptz>,
        sla_total_paused_minutes -> Int8,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        author_id -> Uuid,
        content -> Jsonb,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(ticket_comments -> tickets (ticket_id));
