//! Persistence client: posts a finished design to a remote service.

use std::time::Duration;

use bevy::prelude::*;
use reqwest::multipart::Form;
use reqwest::multipart::Part;
use thiserror::Error;

use crate::export::DesignPayload;
use crate::export::ExportedImage;

/// Default request timeout
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how designs are submitted
#[derive(Resource, Reflect, Debug, Clone)]
#[reflect(Resource)]
pub struct SubmitConfig {
    pub endpoint: String,
    /// Bearer token; submission fails fast without one
    pub token:    Option<String>,
    pub timeout:  Duration,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token:    None,
            timeout:  SUBMIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no credential configured for design submission")]
    MissingCredential,
    #[error("server rejected the design with HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to encode design metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("failed to create runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Sends the payload and image as a multipart POST. Blocks until the request completes.
pub fn submit_design(
    config: &SubmitConfig,
    payload: &DesignPayload,
    image: &ExportedImage,
) -> Result<(), SubmitError> {
    let token = config
        .token
        .as_deref()
        .filter(|token| !token.trim().is_empty())
        .ok_or(SubmitError::MissingCredential)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(submit_design_async(config, token, payload, image))
}

async fn submit_design_async(
    config: &SubmitConfig,
    token: &str,
    payload: &DesignPayload,
    image: &ExportedImage,
) -> Result<(), SubmitError> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;

    let image_part = Part::bytes(image.bytes.clone())
        .file_name(format!("design.{}", image.format.extension()))
        .mime_str(image.format.mime_type())?;
    let form = Form::new()
        .text("label", payload.label.clone())
        .text("color", payload.color.key())
        .text("style", payload.style.key())
        .text("metadata", serde_json::to_string(payload)?)
        .part("image", image_part);

    let response = client
        .post(&config.endpoint)
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?;

    if !response.status().is_success() {
        warn!("Design submission failed: HTTP {}", response.status());
        return Err(SubmitError::Status(response.status().as_u16()));
    }

    info!("Design submitted to {}", config.endpoint);
    Ok(())
}
