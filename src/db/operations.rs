use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{ObservationRow, ProfileMeta};

pub struct DatabaseOperations;

impl DatabaseOperations {
    /// Insert a profile and its observations in one transaction. Nothing is
    /// written if any row fails.
    pub async fn insert_profile(
        pool: &SqlitePool,
        meta: &ProfileMeta,
        observations: &[ObservationRow],
    ) -> Result<i64> {
        let mut tx = pool.begin().await?;

        let data_id = sqlx::query(
            r#"
            INSERT INTO Data (
                platform_number, project_name, pi_name, cycle_num, data_centre, data_mode,
                float_no, firmware, platform_type, juld, latitude, longitude, position_system
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(meta.platform_number)
        .bind(&meta.project_name)
        .bind(&meta.pi_name)
        .bind(meta.cycle_num)
        .bind(&meta.data_centre)
        .bind(&meta.data_mode)
        .bind(meta.float_no)
        .bind(meta.firmware)
        .bind(&meta.platform_type)
        .bind(meta.juld)
        .bind(meta.latitude)
        .bind(meta.longitude)
        .bind(&meta.position_system)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for obs in observations {
            sqlx::query(
                r#"
                INSERT INTO Observation (
                    data_id, pressure, temp, psal, station_param,
                    equation, coefficient, comment, history_software
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(data_id)
            .bind(obs.pressure)
            .bind(obs.temp)
            .bind(obs.psal)
            .bind(&obs.station_param)
            .bind(&obs.equation)
            .bind(&obs.coefficient)
            .bind(&obs.comment)
            .bind(&obs.history_software)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(data_id)
    }

    pub async fn count_profiles(pool: &SqlitePool) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Data")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn count_observations(pool: &SqlitePool) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Observation")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
