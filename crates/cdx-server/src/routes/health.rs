use chrono::Utc;

/// Liveness probe: returns the current UTC timestamp.
pub async fn health_check() -> String {
    Utc::now().to_rfc3339()
}
