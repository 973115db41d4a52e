use sqlx::PgPool;
use uuid::Uuid;

use crate::models::TariffRow;

pub async fn list_active(pool: &PgPool) -> Result<Vec<TariffRow>, sqlx::Error> {
    sqlx::query_as::<_, TariffRow>(
        "SELECT id, name, description, credits_count, price_fiat, price_native_stars,
                is_active, sort_order
         FROM tariffs WHERE is_active = true
         ORDER BY sort_order ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn find(pool: &PgPool, tariff_id: Uuid) -> Result<Option<TariffRow>, sqlx::Error> {
    sqlx::query_as::<_, TariffRow>(
        "SELECT id, name, description, credits_count, price_fiat, price_native_stars,
                is_active, sort_order
         FROM tariffs WHERE id = $1",
    )
    .bind(tariff_id)
    .fetch_optional(pool)
    .await
}
