//! Artifact commands.

use anyhow::{Context, Result};
use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{ApiClient, encode_path};

#[derive(Debug, Deserialize)]
struct ArtifactMap {
    artifacts: BTreeMap<String, String>,
}

pub async fn list(client: &ApiClient, id: &str) -> Result<()> {
    let request = client.request(
        Method::GET,
        &format!("jobs/{}/artifacts", urlencoding::encode(id)),
    )?;
    let ArtifactMap { artifacts } = client.json(request).await?;

    for (path, content) in &artifacts {
        println!("{:>10}  {path}", content.len());
    }
    Ok(())
}

pub async fn download(
    client: &ApiClient,
    id: &str,
    path: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let request = client.request(
        Method::GET,
        &format!(
            "jobs/{}/artifacts/{}",
            urlencoding::encode(id),
            encode_path(path)
        ),
    )?;
    let data = client.bytes(request).await?;

    let output = output.unwrap_or_else(|| default_file_name(path));
    write(&output, &data).await
}

pub async fn bundle(client: &ApiClient, id: &str, output: Option<PathBuf>) -> Result<()> {
    let request = client.request(
        Method::GET,
        &format!("jobs/{}/artifacts-zip", urlencoding::encode(id)),
    )?;
    let data = client.bytes(request).await?;

    let output = output.unwrap_or_else(|| PathBuf::from(format!("{id}-artifacts.zip")));
    write(&output, &data).await
}

/// Last segment of an artifact path.
fn default_file_name(path: &str) -> PathBuf {
    let name = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("artifact");
    PathBuf::from(name)
}

async fn write(output: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(output, data)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}
