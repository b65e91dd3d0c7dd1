//! Members repository for PostgreSQL

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, Pool, Postgres, Row};
use uuid::Uuid;

use super::{like_pattern, search_term, MemberCounts, MembersRepository};
use crate::{
    error::{AppError, AppResult},
    models::{
        member::{BorrowRecord, Member, MemberQuery, MemberRow, NewMember, UpdateMember},
        PageRequest,
    },
};

const DUPLICATE_EMAIL: &str = "Email already exists";

/// Borrow record tagged with its owning member
#[derive(FromRow)]
struct OwnedBorrowRecord {
    member_id: Uuid,
    #[sqlx(flatten)]
    record: BorrowRecord,
}

#[derive(Clone)]
pub struct PgMembersRepository {
    pool: Pool<Postgres>,
}

impl PgMembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load the borrow ledgers of the given members, in borrow order
    async fn ledgers(&self, member_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<BorrowRecord>>> {
        let mut ledgers: HashMap<Uuid, Vec<BorrowRecord>> = HashMap::new();
        if member_ids.is_empty() {
            return Ok(ledgers);
        }

        let rows = sqlx::query_as::<_, OwnedBorrowRecord>(
            r#"
            SELECT member_id, id, book_id, borrowed_date, due_date, returned, returned_date
            FROM borrow_records
            WHERE member_id = ANY($1)
            ORDER BY seq
            "#,
        )
        .bind(member_ids)
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            ledgers.entry(row.member_id).or_default().push(row.record);
        }

        Ok(ledgers)
    }
}

#[async_trait]
impl MembersRepository for PgMembersRepository {
    async fn search(&self, query: &MemberQuery, page: PageRequest) -> AppResult<(Vec<Member>, i64)> {
        let pattern = search_term(&query.search).map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM members
            WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            "#,
        )
        .bind(&pattern)
        .bind(query.is_active)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT * FROM members
            WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1 OR email ILIKE $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&pattern)
        .bind(query.is_active)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut ledgers = self.ledgers(&ids).await?;

        let members = rows
            .into_iter()
            .map(|row| {
                let records = ledgers.remove(&row.id).unwrap_or_default();
                row.into_member(records)
            })
            .collect();

        Ok((members, total))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Member> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        let records = self.ledgers(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(row.into_member(records))
    }

    async fn create(&self, member: NewMember) -> AppResult<Member> {
        let now = Utc::now();
        let address = member.address.clone().unwrap_or_default();

        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (
                id, first_name, last_name, email, phone,
                addr_street, addr_city, addr_state, addr_zip_code,
                membership_date, membership_type, is_active, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(now)
        .bind(member.membership_type)
        .bind(member.is_active)
        .bind(member.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_write(e, DUPLICATE_EMAIL))?;

        Ok(row.into_member(Vec::new()))
    }

    async fn update(&self, id: Uuid, changes: &UpdateMember) -> AppResult<Member> {
        let address = changes.address.clone().unwrap_or_default();

        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE members SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                addr_street = CASE WHEN $6 THEN $7 ELSE addr_street END,
                addr_city = CASE WHEN $6 THEN $8 ELSE addr_city END,
                addr_state = CASE WHEN $6 THEN $9 ELSE addr_state END,
                addr_zip_code = CASE WHEN $6 THEN $10 ELSE addr_zip_code END,
                membership_type = COALESCE($11, membership_type),
                is_active = COALESCE($12, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.phone)
        .bind(changes.address.is_some())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(changes.membership_type)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::on_write(e, DUPLICATE_EMAIL))?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        let records = self.ledgers(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(row.into_member(records))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Borrow and return lock the same row, so the ledger cannot change under us
        sqlx::query("SELECT id FROM members WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        let outstanding: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM borrow_records WHERE member_id = $1 AND NOT returned)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding {
            return Err(AppError::Conflict(
                "Cannot delete member with borrowed books. Return all books first.".to_string(),
            ));
        }

        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn counts(&self) -> AppResult<MemberCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_active) AS active
            FROM members
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(MemberCounts {
            total: row.get("total"),
            active: row.get("active"),
        })
    }
}
