//! Fetch the published source files. A thin wrapper: fixed URLs, no
//! retry machinery.

use crate::error::{ReconError, Result};
use crate::tables;
use std::path::Path;
use tracing::info;

pub const BASE_URL: &str = "https://www.irs.gov/pub/irs-soi/";

pub fn source_url(file_name: &str) -> String {
    format!("{}{}", BASE_URL, file_name)
}

/// Download every registry source file into `dest`, overwriting any
/// existing copy.
pub async fn fetch_all(dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let client = reqwest::Client::new();
    for table in tables::registry() {
        let url = source_url(table.src);
        info!("Downloading {}", url);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReconError::Download(format!("GET {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(ReconError::Download(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReconError::Download(format!("Reading {} failed: {}", url, e)))?;
        let path = dest.join(table.src);
        std::fs::write(&path, &bytes)?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_cleanly() {
        assert_eq!(
            source_url("17in11si.xls"),
            "https://www.irs.gov/pub/irs-soi/17in11si.xls"
        );
    }
}
