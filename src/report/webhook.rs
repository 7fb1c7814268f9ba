//! HTTP delivery of progress reports.
//!
//! Direct mode posts a Discord embed to a webhook URL. Relay mode posts a
//! plain form to a bot service that forwards it to the configured recipient.
//! Either can attach a half-size screenshot taken from the frame source.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use super::{ReportPayload, Reporter};
use crate::automation::config::{ReportMode, WebhookSettings};
use crate::capture::FrameSource;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const EMBED_COLOR: u32 = 5793522;

/// Sends reports over HTTP according to [`WebhookSettings`].
pub struct WebhookReporter {
    settings: WebhookSettings,
    frames: Option<Arc<dyn FrameSource>>,
    client: Client,
}

impl WebhookReporter {
    pub fn new(settings: WebhookSettings, frames: Option<Arc<dyn FrameSource>>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("forge-companion")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            settings,
            frames,
            client,
        })
    }

    /// Captures and encodes the screenshot attachment, if enabled.
    ///
    /// A capture failure drops the attachment but not the report.
    fn screenshot_png(&self) -> Option<Vec<u8>> {
        if !self.settings.send_screenshot {
            return None;
        }
        let frames = self.frames.as_ref()?;
        match frames.capture(None).and_then(encode_half_size_png) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                crate::log(&format!("Report: screenshot skipped: {}", e));
                None
            }
        }
    }

    fn send_direct(&self, payload: &ReportPayload) -> Result<()> {
        let screenshot = self.screenshot_png();
        let file_name = screenshot_name(payload.cycle);
        let embed = build_embed(
            payload,
            Local::now().timestamp(),
            screenshot.as_ref().map(|_| file_name.as_str()),
        );
        let body = json!({ "embeds": [embed] });

        let mut form = Form::new().text("payload_json", body.to_string());
        if let Some(bytes) = screenshot {
            form = form.part("file", png_part(bytes, &file_name)?);
        }

        let response = self
            .client
            .post(&self.settings.webhook_url)
            .multipart(form)
            .send()
            .context("Webhook request failed")?;

        let status = response.status().as_u16();
        if status != 200 && status != 204 {
            return Err(anyhow!("Webhook rejected report: HTTP {}", status));
        }
        Ok(())
    }

    fn send_relay(&self, payload: &ReportPayload) -> Result<()> {
        if self.settings.relay_url.trim().is_empty() {
            return Err(anyhow!("relay_url is not configured"));
        }

        let mut form = Form::new()
            .text("discord_id", self.settings.discord_id.clone())
            .text("cycle", payload.cycle.to_string())
            .text("timestamp", Local::now().to_rfc3339());
        if let Some(stats) = &payload.stats {
            form = form.text("stats", serde_json::to_string(stats)?);
        }
        if let Some(bytes) = self.screenshot_png() {
            form = form.part("image", png_part(bytes, &screenshot_name(payload.cycle))?);
        }

        let response = self
            .client
            .post(&self.settings.relay_url)
            .multipart(form)
            .send()
            .context("Relay request failed")?;

        if response.status().as_u16() != 200 {
            return Err(anyhow!("Relay rejected report: HTTP {}", response.status()));
        }
        Ok(())
    }
}

impl Reporter for WebhookReporter {
    fn deliver(&self, payload: &ReportPayload) -> Result<()> {
        match self.settings.mode {
            ReportMode::Direct => self.send_direct(payload)?,
            ReportMode::Relay => self.send_relay(payload)?,
        }
        crate::log(&format!("Report: cycle {} update sent", payload.cycle));
        Ok(())
    }
}

fn screenshot_name(cycle: u32) -> String {
    format!("progress_cycle_{}.png", cycle)
}

fn png_part(bytes: Vec<u8>, file_name: &str) -> Result<Part> {
    Ok(Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str("image/png")?)
}

/// Downscales to half size (nearest neighbor) and encodes as PNG.
fn encode_half_size_png(img: image::RgbaImage) -> Result<Vec<u8>> {
    let (w, h) = img.dimensions();
    let img = if w >= 2 && h >= 2 {
        image::imageops::resize(&img, w / 2, h / 2, FilterType::Nearest)
    } else {
        img
    };
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode screenshot")?;
    Ok(bytes)
}

/// Builds the Discord embed for a report.
///
/// `timestamp` is a unix time rendered as a relative Discord timestamp;
/// `attachment` names the uploaded screenshot, if any.
pub fn build_embed(payload: &ReportPayload, timestamp: i64, attachment: Option<&str>) -> Value {
    let mut fields = vec![
        json!({ "name": "Cycle", "value": format!("#{}", payload.cycle), "inline": true }),
        json!({ "name": "Time", "value": format!("<t:{}:R>", timestamp), "inline": true }),
    ];

    if let Some(stats) = &payload.stats {
        if !stats.rare_ores.is_empty() {
            let lines: Vec<String> = stats
                .rare_ores
                .iter()
                .map(|(name, count)| format!("- {}: {}", name, count))
                .collect();
            fields.push(json!({
                "name": "Legendary/Mythic Ores",
                "value": lines.join("\n"),
                "inline": false,
            }));
        }
        if let Some(level) = stats.level.filter(|l| *l > 0) {
            fields.push(json!({ "name": "Level", "value": level.to_string(), "inline": true }));
        }
        if let Some(money) = stats.money.filter(|m| *m > 0) {
            fields.push(json!({ "name": "Money", "value": format!("${}", money), "inline": true }));
        }
    }

    let mut embed = json!({
        "title": "Macro Progress Update",
        "color": EMBED_COLOR,
        "fields": fields,
        "footer": { "text": "Forge Companion" },
    });
    if let Some(name) = attachment {
        embed["image"] = json!({ "url": format!("attachment://{}", name) });
    }
    embed
}
