use std::{io, path::Path};

use futures::TryStreamExt as _;
use reqwest::header;
use tokio::io::AsyncWriteExt as _;
use tokio_util::io::StreamReader;
use tracing::{debug, error, info};

use super::{GithubClient, segment};
use crate::{
    error::{Error, Result},
    workflow::Artifact,
};

/// The name prefix of the temporary files downloads are written to before they are complete.
pub const PARTIAL_PREFIX: &str = ".download-";

/// Downloads the zip of an artifact from GitHub to `destination`, creating parent directories as needed.
///
/// This takes two legs: an API call answered with a redirect to the download link, then an unauthenticated fetch of that link. Only the first leg counts towards the rate limit. The zip is written to a temporary file beside `destination` and only moved into place once complete.
///
/// # Errors
///
/// Returns a not-found error if no download link is given, or an upstream error if the download fails.
pub async fn download_artifact(
    client: &GithubClient,
    artifact: &Artifact,
    destination: &Path,
) -> Result<()> {
    let url = format!(
        "/repos/{}/{}/actions/artifacts/{}/zip",
        segment(&artifact.repo.owner),
        segment(&artifact.repo.name),
        segment(&artifact.id),
    );
    debug!("requesting download link of {artifact} from {url}…");

    let redirect = client.send(client.get(&url)).await.map_err(|err| {
        error!("failed to request download link of {artifact}: {err}");
        Error::upstream(format!("failed to reach {url}"))
    })?;

    let status = redirect.status();
    let location = redirect
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let Some(location) = location else {
        let body = redirect.text().await.unwrap_or_default();
        error!(
            "failed to get download link of {artifact}: {} {body}",
            status.as_u16()
        );
        return Err(Error::not_found("No such artifact"));
    };

    info!("downloading {artifact} to {destination:?}…");
    match fetch_to(client, &location, destination).await {
        Ok(written) => {
            info!("downloaded {written} bytes of {artifact} to {destination:?}");
            Ok(())
        }
        Err(err) => {
            error!("failed to download {artifact}: {err}");
            Err(Error::upstream(format!("failed to download {artifact}")))
        }
    }
}

async fn fetch_to(client: &GithubClient, location: &str, destination: &Path) -> io::Result<u64> {
    let parent = destination
        .parent()
        .ok_or_else(|| io::Error::other(format!("{destination:?} has no parent directory")))?;
    tokio::fs::create_dir_all(parent).await?;

    let response = client
        .download_client()
        .get(location)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(io::Error::other)?;

    // Dropping the temporary file before it is persisted deletes it
    let partial = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(".part")
        .tempfile_in(parent)?;
    let mut file = tokio::fs::File::from_std(partial.as_file().try_clone()?);

    let mut body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
    let written = tokio::io::copy(&mut body, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    partial.persist(destination).map_err(|err| err.error)?;
    Ok(written)
}
