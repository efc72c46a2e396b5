diesel::table! {
    users (id) {
        id -> Uuid,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        role -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    categories (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    subcategories (id) {
        id -> Uuid,
        category_id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
    }
}

diesel::table! {
    agent_profiles (id) {
        id -> Uuid,
        agent_id -> Uuid,
        category_id -> Nullable<Uuid>,
        subcategory_ids -> Array<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(subcategories -> categories (category_id));
diesel::joinable!(agent_profiles -> users (agent_id));
