pub mod directory;
#[path = "tickets.rs"]
pub mod ticket_tables;

pub use self::directory::*;
pub use self::ticket_tables::*;

diesel::allow_tables_to_appear_in_same_query!(
    users,
    categories,
    subcategories,
    agent_profiles,
    tickets,
    ticket_comments,
);
