//! Downloads raw source files.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

use crate::error::RetrievalError;

async fn get(client: &Client, url: &str) -> Result<Response, RetrievalError> {
    debug!("GET {}", url);
    client
        .get(url)
        .send()
        .await
        .map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })
}

fn ensure_success(url: &str, response: &Response) -> Result<(), RetrievalError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(RetrievalError::Status {
            url: url.to_string(),
            status: response.status(),
        })
    }
}

/// Downloads `url` into `dir`, keeping the remote file name.
pub async fn download_to_dir(
    client: &Client,
    url: &str,
    dir: &Path,
    progress_bar: ProgressBar,
) -> Result<PathBuf, RetrievalError> {
    let file_name = url.rsplit('/').next().unwrap_or("download");
    let file_path = dir.join(file_name);

    let response = get(client, url).await?;
    ensure_success(url, &response)?;
    stream_to_file(url, response, &file_path, progress_bar).await?;

    Ok(file_path)
}

/// Like [`download_to_dir`], but a 404 yields `None`.
pub async fn download_optional(
    client: &Client,
    url: &str,
    dir: &Path,
    progress_bar: ProgressBar,
) -> Result<Option<PathBuf>, RetrievalError> {
    let file_name = url.rsplit('/').next().unwrap_or("download");
    let file_path = dir.join(file_name);

    let response = get(client, url).await?;
    if response.status() == StatusCode::NOT_FOUND {
        progress_bar.finish_and_clear();
        return Ok(None);
    }
    ensure_success(url, &response)?;
    stream_to_file(url, response, &file_path, progress_bar).await?;

    Ok(Some(file_path))
}

/// Fetches a small text resource; a 404 yields `None`.
pub async fn fetch_text_optional(client: &Client, url: &str) -> Result<Option<String>, RetrievalError> {
    let response = get(client, url).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    ensure_success(url, &response)?;

    let text = response.text().await.map_err(|source| RetrievalError::Request {
        url: url.to_string(),
        source,
    })?;

    Ok(Some(text))
}

/// Streams the body to disk, turning the spinner into a byte progress bar when
/// the length is known.
async fn stream_to_file(
    url: &str,
    response: Response,
    file_path: &Path,
    progress_bar: ProgressBar,
) -> Result<(), RetrievalError> {
    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        progress_bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
    }

    let mut file = File::create(file_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| RetrievalError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }
    file.flush()?;

    progress_bar.finish_and_clear();
    debug!("Saved {} bytes to {}", downloaded, file_path.display());

    Ok(())
}

/// Reads a gzip-compressed text file.
pub fn gunzip_to_string(path: &Path) -> Result<String, RetrievalError> {
    let mut decoder = GzDecoder::new(File::open(path)?);
    let mut text = String::new();
    decoder.read_to_string(&mut text)?;

    Ok(text)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use flate2::{write::GzEncoder, Compression};
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[tokio::test]
    async fn should_download_with_remote_file_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/netcdf/IBTrACS.last3years.v04r01.nc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"CDF\x01".to_vec()))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let url = format!("{}/netcdf/IBTrACS.last3years.v04r01.nc", server.uri());

        let file_path = download_to_dir(&Client::new(), &url, dir.path(), ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(file_path, dir.path().join("IBTrACS.last3years.v04r01.nc"));
        assert_eq!(std::fs::read(&file_path).unwrap(), b"CDF\x01");
    }

    #[tokio::test]
    async fn should_treat_not_found_as_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let url = format!("{}/atcf/archive/1850/", server.uri());

        let text = fetch_text_optional(&Client::new(), &url).await.unwrap();
        let file = download_optional(&Client::new(), &url, dir.path(), ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(text, None);
        assert_eq!(file, None);
    }

    #[tokio::test]
    async fn should_fail_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let dir = TempDir::new().unwrap();
        let url = format!("{}/file.xml", server.uri());

        let result = download_to_dir(&Client::new(), &url, dir.path(), ProgressBar::hidden()).await;

        assert!(matches!(
            result,
            Err(RetrievalError::Status { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[test]
    fn should_gunzip_adeck() {
        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("aal102023.dat.gz");
        let mut encoder = GzEncoder::new(File::create(&file_path).unwrap(), Compression::default());
        encoder.write_all(b"AL, 10, 2023082800\n").unwrap();
        encoder.finish().unwrap();

        let text = gunzip_to_string(&file_path).unwrap();

        assert_eq!(text, "AL, 10, 2023082800\n");
    }
}
