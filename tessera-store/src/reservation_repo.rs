use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use tessera_core::event::{AdditionalFee, Event, EventSettings, PaymentMethod};
use tessera_core::inventory::{SeatCoordinate, SeatStatus, TicketCategory, VenueSector};
use tessera_core::order::{FeeBreakdown, Order, OrderItem, OrderStatus};
use tessera_core::repository::{ReservationStore, StoreError, StoreResult, UnitOfWork};

/// PostgreSQL implementation. Every unit of work is one database transaction.
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    name: String,
    status: String,
    venue_name: String,
    starts_at: DateTime<Utc>,
    start_sale_at: DateTime<Utc>,
    end_sale_at: DateTime<Utc>,
    is_sale_active: bool,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Event {
            id: row.id,
            name: row.name,
            status: row.status.parse().map_err(StoreError::Database)?,
            venue_name: row.venue_name,
            starts_at: row.starts_at,
            start_sale_at: row.start_sale_at,
            end_sale_at: row.end_sale_at,
            is_sale_active: row.is_sale_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    event_id: Uuid,
    identity_verification_required: bool,
    max_items_per_order: i32,
    adult_minimum_age: i32,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    event_id: Uuid,
    name: String,
    price: i64,
    total_public_stock: i32,
    public_stock: i32,
    sector_id: Option<Uuid>,
}

impl From<CategoryRow> for TicketCategory {
    fn from(row: CategoryRow) -> Self {
        TicketCategory {
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            price: row.price,
            total_public_stock: row.total_public_stock,
            public_stock: row.public_stock,
            sector_id: row.sector_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SeatStatusRow {
    seat_row: i32,
    seat_column: i32,
    status: String,
    booked: bool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    event_id: Uuid,
    ticket_category_id: Uuid,
    status: String,
    fullname: String,
    email: String,
    payment_method: String,
    item_count: i32,
    total_price: i64,
    tax_percentage: f64,
    total_tax: i64,
    admin_fee_percentage: f64,
    total_admin_fee: i64,
    pg_additional_fee: i64,
    grand_total: i64,
    payment_expired_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    seat_row: Option<i32>,
    seat_column: Option<i32>,
    fullname: String,
    email: String,
    phone_number: String,
    identity_token: Option<String>,
    age: Option<i32>,
    additional_information: Option<String>,
    price: i64,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        let seat = match (row.seat_row, row.seat_column) {
            (Some(r), Some(c)) => Some(SeatCoordinate::new(r, c)),
            _ => None,
        };
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            seat,
            fullname: row.fullname,
            email: row.email,
            phone_number: row.phone_number,
            identity_token: row.identity_token,
            age: row.age.map(non_negative),
            additional_information: row.additional_information,
            price: row.price,
        }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, event_id, ticket_category_id, status, fullname, email, \
     payment_method, item_count, total_price, tax_percentage, total_tax, admin_fee_percentage, \
     total_admin_fee, pg_additional_fee, grand_total, payment_expired_at, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, event_id, name, price, total_public_stock, public_stock, sector_id";

async fn load_order(conn: &mut PgConnection, order_id: Uuid, for_update: bool) -> StoreResult<Option<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let items: Vec<OrderItem> = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, seat_row, seat_column, fullname, email, phone_number,
               identity_token, age, additional_information, price
        FROM order_items
        WHERE order_id = $1
        ORDER BY seat_row NULLS LAST, seat_column NULLS LAST, id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_err)?
    .into_iter()
    .map(OrderItem::from)
    .collect();

    Ok(Some(Order {
        id: row.id,
        order_number: row.order_number,
        event_id: row.event_id,
        ticket_category_id: row.ticket_category_id,
        status: row.status.parse().map_err(StoreError::Database)?,
        fullname: row.fullname,
        email: row.email,
        payment_method: row.payment_method,
        item_count: non_negative(row.item_count),
        fees: FeeBreakdown {
            total_price: row.total_price,
            tax_percentage: row.tax_percentage,
            total_tax: row.total_tax,
            admin_fee_percentage: row.admin_fee_percentage,
            total_admin_fee: row.total_admin_fee,
            pg_additional_fee: row.pg_additional_fee,
            grand_total: row.grand_total,
        },
        payment_expired_at: row.payment_expired_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        items,
    }))
}

async fn load_category(
    conn: &mut PgConnection,
    event_id: Uuid,
    category_id: Uuid,
) -> StoreResult<Option<TicketCategory>> {
    let sql = format!("SELECT {} FROM ticket_categories WHERE id = $1 AND event_id = $2", CATEGORY_COLUMNS);
    let row = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(category_id)
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(row.map(TicketCategory::from))
}

async fn load_sector(conn: &mut PgConnection, sector_id: Uuid) -> StoreResult<Option<VenueSector>> {
    let row: Option<(Uuid, String, bool)> =
        sqlx::query_as("SELECT id, name, has_seat_map FROM venue_sectors WHERE id = $1")
            .bind(sector_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
    Ok(row.map(|(id, name, has_seat_map)| VenueSector { id, name, has_seat_map }))
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, name, status, venue_name, starts_at, start_sale_at, end_sale_at, is_sale_active
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(Event::try_from).transpose()
    }

    async fn find_event_settings(&self, event_id: Uuid) -> StoreResult<Option<EventSettings>> {
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT event_id, identity_verification_required, max_items_per_order, adult_minimum_age
            FROM event_settings
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| EventSettings {
            event_id: r.event_id,
            identity_verification_required: r.identity_verification_required,
            max_items_per_order: non_negative(r.max_items_per_order),
            adult_minimum_age: non_negative(r.adult_minimum_age),
        }))
    }

    async fn find_ticket_category(
        &self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_category(&mut conn, event_id, category_id).await
    }

    async fn find_sector(&self, sector_id: Uuid) -> StoreResult<Option<VenueSector>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_sector(&mut conn, sector_id).await
    }

    async fn find_payment_method(&self, code: &str) -> StoreResult<Option<PaymentMethod>> {
        let row: Option<(String, String, bool, bool, f64, bool)> = sqlx::query_as(
            r#"
            SELECT code, name, is_active, is_paused, additional_fee, is_percentage
            FROM payment_methods
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(code, name, is_active, is_paused, additional_fee, is_percentage)| PaymentMethod {
            code,
            name,
            is_active,
            is_paused,
            additional_fee,
            is_percentage,
        }))
    }

    async fn list_additional_fees(&self, event_id: Uuid) -> StoreResult<Vec<AdditionalFee>> {
        let rows: Vec<(String, bool, bool, f64)> = sqlx::query_as(
            "SELECT name, is_tax, is_percentage, value FROM additional_fees WHERE event_id = $1 ORDER BY name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(name, is_tax, is_percentage, value)| AdditionalFee { name, is_tax, is_percentage, value })
            .collect())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        load_order(&mut conn, order_id, false).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Dropping the transaction without commit rolls it back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn claim_buyer_slot(&mut self, event_id: Uuid, email: &str) -> StoreResult<Uuid> {
        let slot_id = Uuid::new_v4();
        sqlx::query("INSERT INTO buyer_slots (id, event_id, email) VALUES ($1, $2, $3)")
            .bind(slot_id)
            .bind(event_id)
            .bind(email.to_lowercase())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| if is_unique_violation(&e) { StoreError::DuplicateBuyer } else { db_err(e) })?;
        Ok(slot_id)
    }

    async fn link_buyer_slot(&mut self, slot_id: Uuid, order_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE buyer_slots SET order_id = $2 WHERE id = $1")
            .bind(slot_id)
            .bind(order_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn fetch_ticket_category(
        &mut self,
        event_id: Uuid,
        category_id: Uuid,
    ) -> StoreResult<Option<TicketCategory>> {
        load_category(&mut self.tx, event_id, category_id).await
    }

    async fn fetch_sector(&mut self, sector_id: Uuid) -> StoreResult<Option<VenueSector>> {
        load_sector(&mut self.tx, sector_id).await
    }

    async fn reserve_stock(&mut self, category_id: Uuid, quantity: u32) -> StoreResult<()> {
        let quantity = i32::try_from(quantity).map_err(|_| StoreError::OutOfStock)?;
        let result = sqlx::query(
            r#"
            UPDATE ticket_categories
            SET public_stock = public_stock - $2
            WHERE id = $1 AND public_stock >= $2
            "#,
        )
        .bind(category_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OutOfStock);
        }
        Ok(())
    }

    async fn read_seat_statuses(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<HashMap<SeatCoordinate, SeatStatus>> {
        let rows_in: Vec<i32> = seats.iter().map(|s| s.row).collect();
        let cols_in: Vec<i32> = seats.iter().map(|s| s.column).collect();

        let rows = sqlx::query_as::<_, SeatStatusRow>(
            r#"
            SELECT s.seat_row, s.seat_column, s.status, (sb.order_id IS NOT NULL) AS booked
            FROM seats s
            JOIN UNNEST($3::int4[], $4::int4[]) AS wanted(seat_row, seat_column)
              ON wanted.seat_row = s.seat_row AND wanted.seat_column = s.seat_column
            LEFT JOIN seat_books sb
              ON sb.event_id = $1
             AND sb.sector_id = s.sector_id
             AND sb.seat_row = s.seat_row
             AND sb.seat_column = s.seat_column
            WHERE s.sector_id = $2
            "#,
        )
        .bind(event_id)
        .bind(sector_id)
        .bind(rows_in)
        .bind(cols_in)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_err)?;

        let mut statuses = HashMap::with_capacity(rows.len());
        for row in rows {
            let status = if row.booked {
                SeatStatus::Booked
            } else {
                row.status.parse().map_err(StoreError::Database)?
            };
            statuses.insert(SeatCoordinate::new(row.seat_row, row.seat_column), status);
        }
        Ok(statuses)
    }

    async fn reserve_seats(
        &mut self,
        event_id: Uuid,
        sector_id: Uuid,
        order_id: Uuid,
        seats: &[SeatCoordinate],
    ) -> StoreResult<()> {
        let rows_in: Vec<i32> = seats.iter().map(|s| s.row).collect();
        let cols_in: Vec<i32> = seats.iter().map(|s| s.column).collect();

        // One statement, so a conflict on any seat inserts none of them.
        sqlx::query(
            r#"
            INSERT INTO seat_books (event_id, sector_id, seat_row, seat_column, order_id)
            SELECT $1, $2, wanted.seat_row, wanted.seat_column, $3
            FROM UNNEST($4::int4[], $5::int4[]) AS wanted(seat_row, seat_column)
            "#,
        )
        .bind(event_id)
        .bind(sector_id)
        .bind(order_id)
        .bind(rows_in)
        .bind(cols_in)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { StoreError::SeatConflict } else { db_err(e) })?;
        Ok(())
    }

    async fn reserve_identities(&mut self, event_id: Uuid, order_id: Uuid, tokens: &[String]) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO identity_books (event_id, identity_token, order_id)
            SELECT $1, wanted.token, $2
            FROM UNNEST($3::text[]) AS wanted(token)
            "#,
        )
        .bind(event_id)
        .bind(order_id)
        .bind(tokens.to_vec())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| if is_unique_violation(&e) { StoreError::IdentityConflict } else { db_err(e) })?;
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        let item_count = i32::try_from(order.item_count).map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, event_id, ticket_category_id, status, fullname, email,
                                payment_method, item_count, total_price, tax_percentage, total_tax,
                                admin_fee_percentage, total_admin_fee, pg_additional_fee, grand_total,
                                payment_expired_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.event_id)
        .bind(order.ticket_category_id)
        .bind(order.status.as_str())
        .bind(&order.fullname)
        .bind(&order.email)
        .bind(&order.payment_method)
        .bind(item_count)
        .bind(order.fees.total_price)
        .bind(order.fees.tax_percentage)
        .bind(order.fees.total_tax)
        .bind(order.fees.admin_fee_percentage)
        .bind(order.fees.total_admin_fee)
        .bind(order.fees.pg_additional_fee)
        .bind(order.fees.grand_total)
        .bind(order.payment_expired_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, seat_row, seat_column, fullname, email, phone_number,
                                         identity_token, age, additional_information, price)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.seat.map(|s| s.row))
            .bind(item.seat.map(|s| s.column))
            .bind(&item.fullname)
            .bind(&item.email)
            .bind(&item.phone_number)
            .bind(item.identity_token.as_deref())
            .bind(item.age.map(|a| a as i32))
            .bind(item.additional_information.as_deref())
            .bind(item.price)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        }

        Ok(())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> StoreResult<Option<Order>> {
        load_order(&mut self.tx, order_id, true).await
    }

    async fn release_holds(&mut self, order: &Order) -> StoreResult<()> {
        for table in ["seat_books", "identity_books", "buyer_slots"] {
            sqlx::query(&format!("DELETE FROM {} WHERE order_id = $1", table))
                .bind(order.id)
                .execute(&mut *self.tx)
                .await
                .map_err(db_err)?;
        }

        let quantity = i32::try_from(order.item_count).map_err(|e| StoreError::Database(e.to_string()))?;
        sqlx::query(
            "UPDATE ticket_categories SET public_stock = LEAST(public_stock + $2, total_public_stock) WHERE id = $1",
        )
            .bind(order.ticket_category_id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_order_status(&mut self, order_id: Uuid, status: OrderStatus) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(db_err)
    }
}
