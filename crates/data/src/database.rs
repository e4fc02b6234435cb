use arb_collect_core::{
    CollectError, MarketPair, OrderBookSnapshot, PriceSnapshot, Result, SnapshotStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Creates a new database client connected to the specified `PostgreSQL` database.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CollectError::Storage(format!("database connection failed: {e}")))?;
        Ok(Self { pool })
    }

    /// Queries stored price points for a pair within a time range,
    /// ascending by timestamp. Used by the CSV export path.
    ///
    /// # Errors
    /// Returns [`CollectError::Storage`] if the query fails.
    pub async fn query_price_points(
        &self,
        pair_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PriceSnapshot>> {
        let rows = sqlx::query_as::<_, PricePointRow>(
            r"
            SELECT price, volume_24h, bid, ask, timestamp
            FROM price_points
            WHERE market_pair_id = $1 AND timestamp >= $2 AND timestamp <= $3
            ORDER BY timestamp ASC
            ",
        )
        .bind(pair_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(PricePointRow::into_snapshot).collect())
    }
}

#[async_trait]
impl SnapshotStore for DatabaseClient {
    async fn load_active_pairs(&self) -> Result<Vec<MarketPair>> {
        let rows = sqlx::query_as::<_, MarketPairRow>(
            r"
            SELECT mp.id, mp.base_currency, mp.quote_currency, mp.market_id, mp.coin_id,
                   m.name AS market_name
            FROM market_pairs mp
            JOIN markets m ON m.id = mp.market_id
            WHERE mp.is_active AND m.is_active
            ORDER BY mp.id
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(MarketPairRow::into_pair).collect())
    }

    async fn insert_price_points(&self, pair_id: i64, points: &[PriceSnapshot]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for point in points {
            sqlx::query(
                r"
                INSERT INTO price_points (market_pair_id, price, volume_24h, bid, ask, timestamp)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(pair_id)
            .bind(point.price)
            .bind(point.volume_24h)
            .bind(point.bid)
            .bind(point.ask)
            .bind(point.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn insert_order_books(&self, pair_id: i64, books: &[OrderBookSnapshot]) -> Result<()> {
        // Phase one: headers, capturing generated ids in order.
        let mut header_ids = Vec::with_capacity(books.len());
        for book in books {
            let row = sqlx::query(
                r"
                INSERT INTO order_book_snapshots (market_pair_id, last_update_id, timestamp)
                VALUES ($1, $2, $3)
                RETURNING id
                ",
            )
            .bind(pair_id)
            .bind(book.last_update_id)
            .bind(book.timestamp)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
            header_ids.push(row.get::<i64, _>("id"));
        }

        // Phase two: entries referencing the headers by position-matched
        // index. A failure here leaves the already-written headers behind
        // with no entries; there is no compensating rollback.
        for (book, header_id) in books.iter().zip(&header_ids) {
            for (side, levels) in [("bid", &book.bids), ("ask", &book.asks)] {
                for (position, level) in levels.iter().enumerate() {
                    sqlx::query(
                        r"
                        INSERT INTO order_book_entries
                            (order_book_id, side, price, quantity, total, position)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        ",
                    )
                    .bind(header_id)
                    .bind(side)
                    .bind(level.price)
                    .bind(level.quantity)
                    .bind(level.total())
                    .bind(i32::try_from(position).unwrap_or(i32::MAX))
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
                }
            }
        }

        Ok(())
    }
}

fn storage_err(err: sqlx::Error) -> CollectError {
    CollectError::Storage(err.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct MarketPairRow {
    id: i64,
    base_currency: String,
    quote_currency: String,
    market_id: i64,
    coin_id: i64,
    market_name: String,
}

impl MarketPairRow {
    fn into_pair(self) -> MarketPair {
        MarketPair {
            id: self.id,
            base_currency: self.base_currency,
            quote_currency: self.quote_currency,
            market_id: self.market_id,
            coin_id: self.coin_id,
            market_name: self.market_name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PricePointRow {
    price: f64,
    volume_24h: f64,
    bid: f64,
    ask: f64,
    timestamp: DateTime<Utc>,
}

impl PricePointRow {
    fn into_snapshot(self) -> PriceSnapshot {
        PriceSnapshot::new(self.price, self.volume_24h, self.bid, self.ask, self.timestamp)
    }
}
