use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::error::StoreError;
use crate::models::{Statistics, Student};
use crate::store::StudentStore;

const STUDENT_COLUMNS: &str = "id, full_name, email, phone, handle, current_rating, max_rating, \
     last_synced, inactivity_notified, reminders_disabled, reminder_count, synced_handle, statistics";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Student>, StoreError> {
        let query = format!(
            "SELECT {STUDENT_COLUMNS} FROM cf_tracker.students ORDER BY created_at, full_name"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(student_from_row).collect()
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Student>, StoreError> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM cf_tracker.students WHERE handle = $1");
        let row = sqlx::query(&query)
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(student_from_row).transpose()
    }

    async fn list_tracked(&self) -> Result<Vec<Student>, StoreError> {
        let query = format!(
            "SELECT {STUDENT_COLUMNS} FROM cf_tracker.students \
             WHERE handle IS NOT NULL ORDER BY created_at, full_name"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn insert(&self, student: &Student) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO cf_tracker.students
            (id, full_name, email, phone, handle, current_rating, max_rating, last_synced,
             inactivity_notified, reminders_disabled, reminder_count, synced_handle, statistics)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.handle)
        .bind(student.current_rating)
        .bind(student.max_rating)
        .bind(student.last_synced)
        .bind(student.inactivity_notified)
        .bind(student.reminders_disabled)
        .bind(student.reminder_count)
        .bind(&student.synced_handle)
        .bind(student.statistics.as_ref().map(Json))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
                StoreError::DuplicateHandle(student.handle.clone().unwrap_or_default()),
            ),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, student: &Student) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE cf_tracker.students
            SET full_name = $2, email = $3, phone = $4, handle = $5, current_rating = $6,
                max_rating = $7, last_synced = $8, inactivity_notified = $9,
                reminders_disabled = $10, reminder_count = $11, synced_handle = $12,
                statistics = $13
            WHERE id = $1
            "#,
        )
        .bind(student.id)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(&student.handle)
        .bind(student.current_rating)
        .bind(student.max_rating)
        .bind(student.last_synced)
        .bind(student.inactivity_notified)
        .bind(student.reminders_disabled)
        .bind(student.reminder_count)
        .bind(&student.synced_handle)
        .bind(student.statistics.as_ref().map(Json))
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(StoreError::Database(sqlx::Error::RowNotFound))
            }
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
                StoreError::DuplicateHandle(student.handle.clone().unwrap_or_default()),
            ),
            Err(err) => Err(err.into()),
        }
    }
}

fn student_from_row(row: &PgRow) -> Result<Student, StoreError> {
    let statistics: Option<Json<Statistics>> = row.try_get("statistics")?;

    Ok(Student {
        id: row.try_get("id")?,
        name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        handle: row.try_get("handle")?,
        current_rating: row.try_get("current_rating")?,
        max_rating: row.try_get("max_rating")?,
        last_synced: row.try_get("last_synced")?,
        inactivity_notified: row.try_get("inactivity_notified")?,
        reminders_disabled: row.try_get("reminders_disabled")?,
        reminder_count: row.try_get("reminder_count")?,
        synced_handle: row.try_get("synced_handle")?,
        statistics: statistics.map(|Json(stats)| stats),
    })
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    handle: &'a str,
    current_rating: i32,
    max_rating: i32,
    last_synced: Option<DateTime<Utc>>,
}

pub fn write_csv<W: std::io::Write>(students: &[Student], out: W) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);

    for student in students {
        writer.serialize(CsvRow {
            name: &student.name,
            email: &student.email,
            phone: student.phone.as_deref().unwrap_or(""),
            handle: student.handle.as_deref().unwrap_or(""),
            current_rating: student.current_rating,
            max_rating: student.max_rating,
            last_synced: student.last_synced,
        })?;
    }

    writer.flush()?;
    Ok(students.len())
}

pub async fn export_csv(store: &PgStudentStore, csv_path: &Path) -> anyhow::Result<usize> {
    let students = store.list_all().await?;
    let file = std::fs::File::create(csv_path)?;
    write_csv(&students, file)
}
