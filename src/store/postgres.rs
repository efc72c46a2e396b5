use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use log::info;
use uuid::Uuid;

use super::{AgentFilter, Directory, StoreError, TicketFilter, TicketStore};
use crate::comments::Comment;
use crate::core::shared::schema::{
    agent_profiles, categories, subcategories, ticket_comments, tickets, users,
};
use crate::core::shared::utils::{create_conn, DbPool};
use crate::directory::{AgentSkills, Category, SubCategory, User};
use crate::tickets::models::Ticket;

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation,
                info,
            ) => Self::Conflict(info.message().to_string()),
            other => Self::Database(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = tickets, treat_none_as_null = true)]
struct TicketRow {
    id: Uuid,
    category_id: Uuid,
    subcategory_id: Uuid,
    user_id: Uuid,
    agent_id: Option<Uuid>,
    title: String,
    description: String,
    content: serde_json::Value,
    priority: String,
    severity: String,
    tags: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    sla_due_date: Option<DateTime<Utc>>,
    sla_breached: bool,
    sla_paused_at: Option<DateTime<Utc>>,
    sla_total_paused_minutes: i64,
}

impl TicketRow {
    fn from_ticket(ticket: &Ticket) -> Result<Self, StoreError> {
        Ok(Self {
            id: ticket.id,
            category_id: ticket.category_id,
            subcategory_id: ticket.subcategory_id,
            user_id: ticket.user_id,
            agent_id: ticket.agent_id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            content: serde_json::to_value(&ticket.content)?,
            priority: ticket.priority.as_str().to_string(),
            severity: ticket.severity.as_str().to_string(),
            tags: serde_json::to_value(&ticket.tags)?,
            status: ticket.status.as_str().to_string(),
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
            closed_at: ticket.closed_at,
            sla_due_date: ticket.sla_due_date,
            sla_breached: ticket.sla_breached,
            sla_paused_at: ticket.sla_paused_at,
            sla_total_paused_minutes: ticket.sla_total_paused_minutes,
        })
    }

    fn into_ticket(self) -> Result<Ticket, StoreError> {
        Ok(Ticket {
            id: self.id,
            category_id: self.category_id,
            subcategory_id: self.subcategory_id,
            user_id: self.user_id,
            agent_id: self.agent_id,
            title: self.title,
            description: self.description,
            content: serde_json::from_value(self.content)?,
            priority: self.priority.parse().map_err(StoreError::Serialization)?,
            severity: self.severity.parse().map_err(StoreError::Serialization)?,
            tags: serde_json::from_value(self.tags)?,
            status: self.status.parse().map_err(StoreError::Serialization)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            sla_due_date: self.sla_due_date,
            sla_breached: self.sla_breached,
            sla_paused_at: self.sla_paused_at,
            sla_total_paused_minutes: self.sla_total_paused_minutes,
        })
    }
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = ticket_comments)]
struct CommentRow {
    id: Uuid,
    ticket_id: Uuid,
    author_id: Uuid,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommentRow {
    fn from_comment(comment: &Comment) -> Result<Self, StoreError> {
        Ok(Self {
            id: comment.id,
            ticket_id: comment.ticket_id,
            author_id: comment.author_id,
            content: serde_json::to_value(&comment.content)?,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        })
    }

    fn into_comment(self) -> Result<Comment, StoreError> {
        Ok(Comment {
            id: self.id,
            ticket_id: self.ticket_id,
            author_id: self.author_id,
            content: serde_json::from_value(self.content)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Queryable)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        Ok(User {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            role: self.role.parse().map_err(StoreError::Serialization)?,
            created_at: self.created_at,
        })
    }
}

type CategoryRow = (Uuid, String, Option<String>);
type SubCategoryRow = (Uuid, Uuid, String, Option<String>);

fn category_from_row((id, name, description): CategoryRow) -> Category {
    Category {
        id,
        name,
        description,
    }
}

fn subcategory_from_row((id, category_id, name, description): SubCategoryRow) -> SubCategory {
    SubCategory {
        id,
        category_id,
        name,
        description,
    }
}

fn load_user(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, StoreError> {
    users::table
        .find(id)
        .first::<UserRow>(conn)
        .optional()?
        .map(UserRow::into_user)
        .transpose()
}

fn load_category(conn: &mut PgConnection, id: Uuid) -> Result<Option<Category>, StoreError> {
    Ok(categories::table
        .find(id)
        .first::<CategoryRow>(conn)
        .optional()?
        .map(category_from_row))
}

fn forget_subcategories(conn: &mut PgConnection, ids: &[Uuid]) -> Result<(), StoreError> {
    for id in ids {
        diesel::sql_query(
            "UPDATE agent_profiles SET subcategory_ids = array_remove(subcategory_ids, $1)",
        )
        .bind::<diesel::sql_types::Uuid, _>(*id)
        .execute(conn)?;
    }
    Ok(())
}

fn resolve_profile(
    conn: &mut PgConnection,
    agent_id: Uuid,
    category_id: Option<Uuid>,
    subcategory_ids: Vec<Uuid>,
) -> Result<Option<AgentSkills>, StoreError> {
    let Some(agent) = load_user(conn, agent_id)? else {
        return Ok(None);
    };
    let category = match category_id {
        Some(id) => load_category(conn, id)?,
        None => None,
    };
    let subcategories = subcategories::table
        .filter(subcategories::id.eq_any(subcategory_ids))
        .order(subcategories::name.asc())
        .load::<SubCategoryRow>(conn)?
        .into_iter()
        .map(subcategory_from_row)
        .collect();

    Ok(Some(AgentSkills {
        agent,
        category,
        subcategories,
    }))
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = create_conn(database_url).map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

        const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

        let mut conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Database(format!("Migration error: {e}")))?;
        info!("Applied {} pending migrations", applied.len());
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, StoreError> {
        let row = TicketRow::from_ticket(&ticket)?;
        self.with_conn(move |conn| {
            diesel::insert_into(tickets::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, StoreError> {
        self.with_conn(move |conn| {
            tickets::table
                .find(id)
                .first::<TicketRow>(conn)
                .optional()?
                .map(TicketRow::into_ticket)
                .transpose()
        })
        .await
    }

    async fn save_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let row = TicketRow::from_ticket(ticket)?;
        self.with_conn(move |conn| {
            diesel::update(tickets::table.find(row.id))
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn delete_ticket(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                diesel::delete(ticket_comments::table.filter(ticket_comments::ticket_id.eq(id)))
                    .execute(conn)?;
                let deleted = diesel::delete(tickets::table.find(id)).execute(conn)?;
                Ok(deleted > 0)
            })
        })
        .await
    }

    async fn find_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let filter = filter.clone();
        self.with_conn(move |conn| {
            let mut query = tickets::table.into_boxed();

            if let Some(statuses) = &filter.status_in {
                let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
                query = query.filter(tickets::status.eq_any(statuses));
            }
            if let Some(status) = filter.status_not {
                query = query.filter(tickets::status.ne(status.as_str()));
            }
            if let Some(priority) = filter.priority {
                query = query.filter(tickets::priority.eq(priority.as_str()));
            }
            if let Some(category_id) = filter.category_id {
                query = query.filter(tickets::category_id.eq(category_id));
            }
            if let Some(user_id) = filter.user_id {
                query = query.filter(tickets::user_id.eq(user_id));
            }
            query = match filter.agent {
                AgentFilter::Any => query,
                AgentFilter::Unassigned => query.filter(tickets::agent_id.is_null()),
                AgentFilter::Assigned(agent_id) => query.filter(tickets::agent_id.eq(agent_id)),
            };
            if let Some(before) = filter.sla_due_before {
                query = query.filter(tickets::sla_due_date.lt(before));
            }
            if let Some(breached) = filter.sla_breached {
                query = query.filter(tickets::sla_breached.eq(breached));
            }

            query
                .order(tickets::created_at.desc())
                .load::<TicketRow>(conn)?
                .into_iter()
                .map(TicketRow::into_ticket)
                .collect()
        })
        .await
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        let row = CommentRow::from_comment(&comment)?;
        self.with_conn(move |conn| {
            diesel::insert_into(ticket_comments::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(comment)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        self.with_conn(move |conn| {
            ticket_comments::table
                .find(id)
                .first::<CommentRow>(conn)
                .optional()?
                .map(CommentRow::into_comment)
                .transpose()
        })
        .await
    }

    async fn save_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let row = CommentRow::from_comment(comment)?;
        self.with_conn(move |conn| {
            diesel::update(ticket_comments::table.find(row.id))
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(ticket_comments::table.find(id)).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn comments_for_ticket(&self, ticket_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        self.with_conn(move |conn| {
            ticket_comments::table
                .filter(ticket_comments::ticket_id.eq(ticket_id))
                .order(ticket_comments::created_at.asc())
                .load::<CommentRow>(conn)?
                .into_iter()
                .map(CommentRow::into_comment)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl Directory for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.with_conn(move |conn| load_user(conn, id)).await
    }

    async fn get_category(&self, id: Uuid) -> Result<Option<Category>, StoreError> {
        self.with_conn(move |conn| load_category(conn, id)).await
    }

    async fn get_subcategory(&self, id: Uuid) -> Result<Option<SubCategory>, StoreError> {
        self.with_conn(move |conn| {
            Ok(subcategories::table
                .find(id)
                .first::<SubCategoryRow>(conn)
                .optional()?
                .map(subcategory_from_row))
        })
        .await
    }

    async fn agent_skills(&self) -> Result<Vec<AgentSkills>, StoreError> {
        self.with_conn(|conn| {
            let profiles: Vec<(Uuid, Option<Uuid>, Vec<Uuid>)> = agent_profiles::table
                .select((
                    agent_profiles::agent_id,
                    agent_profiles::category_id,
                    agent_profiles::subcategory_ids,
                ))
                .order((agent_profiles::created_at.asc(), agent_profiles::id.asc()))
                .load(conn)?;

            let mut skills = Vec::with_capacity(profiles.len());
            for (agent_id, category_id, subcategory_ids) in profiles {
                if let Some(resolved) = resolve_profile(conn, agent_id, category_id, subcategory_ids)? {
                    skills.push(resolved);
                }
            }
            Ok(skills)
        })
        .await
    }

    async fn agent_skills_for(&self, agent_id: Uuid) -> Result<Option<AgentSkills>, StoreError> {
        self.with_conn(move |conn| {
            let profile: Option<(Option<Uuid>, Vec<Uuid>)> = agent_profiles::table
                .filter(agent_profiles::agent_id.eq(agent_id))
                .select((agent_profiles::category_id, agent_profiles::subcategory_ids))
                .first(conn)
                .optional()?;

            match profile {
                Some((category_id, subcategory_ids)) => {
                    resolve_profile(conn, agent_id, category_id, subcategory_ids)
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.with_conn(|conn| {
            Ok(categories::table
                .order(categories::name.asc())
                .load::<CategoryRow>(conn)?
                .into_iter()
                .map(category_from_row)
                .collect())
        })
        .await
    }

    async fn subcategories_for(&self, category_id: Uuid) -> Result<Vec<SubCategory>, StoreError> {
        self.with_conn(move |conn| {
            Ok(subcategories::table
                .filter(subcategories::category_id.eq(category_id))
                .order(subcategories::name.asc())
                .load::<SubCategoryRow>(conn)?
                .into_iter()
                .map(subcategory_from_row)
                .collect())
        })
        .await
    }

    async fn insert_category(&self, category: Category) -> Result<Category, StoreError> {
        let row = category.clone();
        self.with_conn(move |conn| {
            diesel::insert_into(categories::table)
                .values((
                    categories::id.eq(row.id),
                    categories::name.eq(row.name),
                    categories::description.eq(row.description),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(category)
    }

    async fn save_category(&self, category: &Category) -> Result<bool, StoreError> {
        let row = category.clone();
        self.with_conn(move |conn| {
            let updated = diesel::update(categories::table.find(row.id))
                .set((
                    categories::name.eq(row.name),
                    categories::description.eq(row.description),
                ))
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let children: Vec<Uuid> = subcategories::table
                    .filter(subcategories::category_id.eq(id))
                    .select(subcategories::id)
                    .load(conn)?;
                // Cascades to subcategories and clears agent_profiles.category_id.
                let deleted = diesel::delete(categories::table.find(id)).execute(conn)?;
                forget_subcategories(conn, &children)?;
                Ok(deleted > 0)
            })
        })
        .await
    }

    async fn insert_subcategory(&self, subcategory: SubCategory) -> Result<SubCategory, StoreError> {
        let row = subcategory.clone();
        self.with_conn(move |conn| {
            diesel::insert_into(subcategories::table)
                .values((
                    subcategories::id.eq(row.id),
                    subcategories::category_id.eq(row.category_id),
                    subcategories::name.eq(row.name),
                    subcategories::description.eq(row.description),
                ))
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(subcategory)
    }

    async fn save_subcategory(&self, subcategory: &SubCategory) -> Result<bool, StoreError> {
        let row = subcategory.clone();
        self.with_conn(move |conn| {
            let updated = diesel::update(subcategories::table.find(row.id))
                .set((
                    subcategories::category_id.eq(row.category_id),
                    subcategories::name.eq(row.name),
                    subcategories::description.eq(row.description),
                ))
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete_subcategory(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let deleted = diesel::delete(subcategories::table.find(id)).execute(conn)?;
                forget_subcategories(conn, &[id])?;
                Ok(deleted > 0)
            })
        })
        .await
    }
}
