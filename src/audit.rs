// Jaskier Shared Pattern — audit
// Fire-and-forget INSERT for tracking admin actions (manual session sets,
// sync refresh triggers) outside the PaymentEvent trail, which already
// covers the payment lifecycle on its own.

/// Insert an audit log entry. Errors are logged but never propagated
/// (audit must not break the main request flow).
pub async fn log_audit(
    pool: &sqlx::PgPool,
    action: &str,
    details: serde_json::Value,
    ip: Option<&str>,
) {
    if let Err(e) = sqlx::query(
        "INSERT INTO audit_log (action, details, ip_address) VALUES ($1, $2, $3)",
    )
    .bind(action)
    .bind(&details)
    .bind(ip)
    .execute(pool)
    .await
    {
        tracing::warn!("audit: failed to log action={}: {}", action, e);
    }
}
