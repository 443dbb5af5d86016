use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Synthetic external id in the shape `<prefix>_<millis>_<suffix>`, used
/// for stored raw payloads and locally originated messages.
pub fn generate_external_id(prefix: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    format!(
        "{}_{}_{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}
