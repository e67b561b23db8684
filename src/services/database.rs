use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};

use crate::models::{FoodEntry, Minerals, NutrientVector, Vitamins};

/// Where resolved food entries end up.
#[async_trait::async_trait]
pub trait FoodEntrySink: Send + Sync {
    async fn store(&self, entry: &FoodEntry) -> Result<i64>;

    /// Entries for a user, newest first, optionally limited to an inclusive date range (UTC).
    async fn entries(&self, user_id: i64, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<FoodEntry>>;

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool>;
}

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Database { pool };
        db.init_tables().await?;
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS food_entries (
                id BIGSERIAL PRIMARY KEY,
                user_id BIGINT NOT NULL,
                food_name TEXT NOT NULL,
                localized_name TEXT NOT NULL,
                portion_size DOUBLE PRECISION NOT NULL DEFAULT 100,
                portion_unit TEXT NOT NULL DEFAULT 'g',
                calories BIGINT NOT NULL DEFAULT 0,
                protein DOUBLE PRECISION NOT NULL DEFAULT 0,
                fat DOUBLE PRECISION NOT NULL DEFAULT 0,
                carbohydrates DOUBLE PRECISION NOT NULL DEFAULT 0,
                fiber DOUBLE PRECISION NOT NULL DEFAULT 0,
                vitamin_a DOUBLE PRECISION NOT NULL DEFAULT 0,
                vitamin_c DOUBLE PRECISION NOT NULL DEFAULT 0,
                vitamin_d DOUBLE PRECISION NOT NULL DEFAULT 0,
                vitamin_e DOUBLE PRECISION NOT NULL DEFAULT 0,
                calcium DOUBLE PRECISION NOT NULL DEFAULT 0,
                iron DOUBLE PRECISION NOT NULL DEFAULT 0,
                potassium DOUBLE PRECISION NOT NULL DEFAULT 0,
                sodium DOUBLE PRECISION NOT NULL DEFAULT 0,
                fdc_id BIGINT,
                fdc_description TEXT,
                serving_size DOUBLE PRECISION,
                serving_unit TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Tables created before reference metadata was stored
        for column in [
            "fdc_description TEXT",
            "serving_size DOUBLE PRECISION",
            "serving_unit TEXT",
        ] {
            sqlx::query(&format!("ALTER TABLE food_entries ADD COLUMN IF NOT EXISTS {}", column))
                .execute(&self.pool)
                .await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_food_entries_user_created ON food_entries (user_id, created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn entry_from_row(row: &PgRow) -> FoodEntry {
        FoodEntry {
            id: Some(row.get("id")),
            user_id: row.get("user_id"),
            food_name: row.get("food_name"),
            localized_name: row.get("localized_name"),
            portion_size: row.get("portion_size"),
            portion_unit: row.get("portion_unit"),
            nutrients: NutrientVector {
                calories: row.get("calories"),
                protein: row.get("protein"),
                fat: row.get("fat"),
                carbohydrates: row.get("carbohydrates"),
                fiber: row.get("fiber"),
                vitamins: Vitamins {
                    a: row.get("vitamin_a"),
                    c: row.get("vitamin_c"),
                    d: row.get("vitamin_d"),
                    e: row.get("vitamin_e"),
                },
                minerals: Minerals {
                    calcium: row.get("calcium"),
                    iron: row.get("iron"),
                    potassium: row.get("potassium"),
                    sodium: row.get("sodium"),
                },
            },
            fdc_id: row.get("fdc_id"),
            fdc_description: row.get("fdc_description"),
            serving_size: row.get("serving_size"),
            serving_unit: row.get("serving_unit"),
            created_at: row.get("created_at"),
        }
    }
}

const SELECT_ENTRIES: &str = r#"
    SELECT id, user_id, food_name, localized_name, portion_size, portion_unit,
           calories, protein, fat, carbohydrates, fiber,
           vitamin_a, vitamin_c, vitamin_d, vitamin_e,
           calcium, iron, potassium, sodium,
           fdc_id, fdc_description, serving_size, serving_unit, created_at
    FROM food_entries
"#;

#[async_trait::async_trait]
impl FoodEntrySink for Database {
    async fn store(&self, entry: &FoodEntry) -> Result<i64> {
        let n = &entry.nutrients;
        let row = sqlx::query(
            r#"
            INSERT INTO food_entries (
                user_id, food_name, localized_name, portion_size, portion_unit,
                calories, protein, fat, carbohydrates, fiber,
                vitamin_a, vitamin_c, vitamin_d, vitamin_e,
                calcium, iron, potassium, sodium,
                fdc_id, fdc_description, serving_size, serving_unit, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23
            )
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.food_name)
        .bind(&entry.localized_name)
        .bind(entry.portion_size)
        .bind(&entry.portion_unit)
        .bind(n.calories)
        .bind(n.protein)
        .bind(n.fat)
        .bind(n.carbohydrates)
        .bind(n.fiber)
        .bind(n.vitamins.a)
        .bind(n.vitamins.c)
        .bind(n.vitamins.d)
        .bind(n.vitamins.e)
        .bind(n.minerals.calcium)
        .bind(n.minerals.iron)
        .bind(n.minerals.potassium)
        .bind(n.minerals.sodium)
        .bind(entry.fdc_id)
        .bind(&entry.fdc_description)
        .bind(entry.serving_size)
        .bind(&entry.serving_unit)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get(0);
        log::debug!("💾 Stored food entry {} for user {}", id, entry.user_id);
        Ok(id)
    }

    async fn entries(&self, user_id: i64, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<FoodEntry>> {
        let rows = match range {
            Some((start, end)) => {
                let from = start.and_time(NaiveTime::MIN).and_utc();
                let until = (end + chrono::Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
                sqlx::query(&format!(
                    "{} WHERE user_id = $1 AND created_at >= $2 AND created_at < $3 ORDER BY created_at DESC",
                    SELECT_ENTRIES
                ))
                .bind(user_id)
                .bind(from)
                .bind(until)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE user_id = $1 ORDER BY created_at DESC",
                    SELECT_ENTRIES
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(Self::entry_from_row).collect())
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM food_entries WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
