use crate::core::table::Table;
use crate::utils::error::Result;
use crate::utils::validation::is_remote;
use reqwest::Client;
use std::time::Duration;

/// Raw bytes of a table, from an `http(s)://` URL or a local path.
pub async fn fetch_bytes(client: &Client, location: &str, timeout_seconds: Option<u64>) -> Result<Vec<u8>> {
    if is_remote(location) {
        tracing::debug!("Fetching table from: {}", location);

        let mut request = client.get(location);
        if let Some(timeout) = timeout_seconds {
            request = request.timeout(Duration::from_secs(timeout));
        }

        let response = request.send().await?.error_for_status()?;
        tracing::debug!("Response status: {}", response.status());
        Ok(response.bytes().await?.to_vec())
    } else {
        tracing::debug!("Reading table from: {}", location);
        Ok(tokio::fs::read(location).await?)
    }
}

pub async fn fetch_table(
    client: &Client,
    name: &str,
    location: &str,
    delimiter: &str,
    timeout_seconds: Option<u64>,
) -> Result<Table> {
    let bytes = fetch_bytes(client, location, timeout_seconds).await?;
    let table = Table::parse(name, &bytes, delimiter)?;
    tracing::info!("📥 Loaded {} table: {} rows from {}", name, table.len(), location);
    Ok(table)
}
