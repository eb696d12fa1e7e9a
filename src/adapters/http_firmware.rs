//! HTTP firmware image source.
//!
//! Implements [`FirmwareSource`] against a plain HTTP(S) object server.
//! The remote version comes from a configurable response header
//! (`X-Object-Meta-Version` by default) and is only trusted when the
//! server labels the object `application/octet-stream`; anything else
//! (an error page, a redirect to a login portal) reads as "no image".
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::http::client::EspHttpConnection`.
//! - **all other targets**: an in-memory object with injectable faults.

use log::{info, warn};

#[cfg(target_os = "espidf")]
use super::utils::truncated;
use crate::app::ports::FirmwareSource;
use crate::error::UpdateError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::{
    Method,
    client::{Configuration, EspHttpConnection},
};

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Version header value, if the response is a firmware image.
pub fn version_from_headers(
    content_type: Option<&str>,
    version: Option<&str>,
) -> Option<heapless::String<32>> {
    if content_type.map(str::trim) != Some(OCTET_STREAM) {
        warn!("Firmware: unexpected content type {:?}", content_type);
        return None;
    }
    let version = version.map(str::trim).filter(|v| !v.is_empty())?;
    heapless::String::try_from(version).ok()
}

pub fn parse_content_length(header: Option<&str>) -> Result<usize, UpdateError> {
    match header.and_then(|v| v.trim().parse::<usize>().ok()) {
        Some(len) if len > 0 => Ok(len),
        _ => Err(UpdateError::InvalidContentLength),
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF HTTP client
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct HttpFirmwareSource {
    url: heapless::String<128>,
    version_header: heapless::String<32>,
    conn: Option<EspHttpConnection>,
}

#[cfg(target_os = "espidf")]
impl HttpFirmwareSource {
    pub fn new(url: &str, version_header: &str) -> Self {
        Self {
            url: truncated(url),
            version_header: truncated(version_header),
            conn: None,
        }
    }

    fn get(&self) -> Result<EspHttpConnection, UpdateError> {
        let unavailable = |e| {
            warn!("Firmware: request to {} failed ({})", self.url, e);
            UpdateError::SourceUnavailable
        };
        let mut conn = EspHttpConnection::new(&Configuration {
            buffer_size: Some(1024),
            ..Default::default()
        })
        .map_err(unavailable)?;
        conn.initiate_request(Method::Get, &self.url, &[]).map_err(unavailable)?;
        conn.initiate_response().map_err(unavailable)?;
        let status = conn.status();
        if status != 200 {
            warn!("Firmware: server answered {}", status);
            return Err(UpdateError::SourceUnavailable);
        }
        Ok(conn)
    }
}

#[cfg(target_os = "espidf")]
impl FirmwareSource for HttpFirmwareSource {
    fn remote_version(&mut self) -> Option<heapless::String<32>> {
        if self.url.is_empty() {
            return None;
        }
        let conn = self.get().ok()?;
        let version = version_from_headers(conn.header("Content-Type"), conn.header(&self.version_header));
        info!("Firmware: remote version {:?}", version);
        version
    }

    fn open_image(&mut self) -> Result<usize, UpdateError> {
        self.conn = None;
        let conn = self.get()?;
        let len = parse_content_length(conn.header("Content-Length"))?;
        self.conn = Some(conn);
        Ok(len)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        let conn = self.conn.as_mut().ok_or(UpdateError::SourceUnavailable)?;
        let n = conn.read(buf).map_err(|e| {
            warn!("Firmware: read failed ({})", e);
            UpdateError::SourceUnavailable
        })?;
        if n == 0 {
            self.conn = None;
        }
        Ok(n)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation server
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
pub struct HttpFirmwareSource {
    version: Option<String>,
    content_type: String,
    image: Vec<u8>,
    /// Overrides the announced length (to simulate a truncated body).
    announced_len: Option<usize>,
    reachable: bool,
    pos: usize,
}

#[cfg(not(target_os = "espidf"))]
impl HttpFirmwareSource {
    /// An object server holding no image.
    pub fn empty() -> Self {
        Self {
            version: None,
            content_type: OCTET_STREAM.into(),
            image: Vec::new(),
            announced_len: None,
            reachable: true,
            pos: 0,
        }
    }

    pub fn with_image(version: &str, image: Vec<u8>) -> Self {
        Self {
            version: Some(version.into()),
            image,
            ..Self::empty()
        }
    }

    pub fn set_content_type(&mut self, content_type: &str) {
        self.content_type = content_type.into();
    }

    pub fn announce_len(&mut self, len: usize) {
        self.announced_len = Some(len);
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }
}

#[cfg(not(target_os = "espidf"))]
impl FirmwareSource for HttpFirmwareSource {
    fn remote_version(&mut self) -> Option<heapless::String<32>> {
        if !self.reachable {
            return None;
        }
        version_from_headers(Some(&self.content_type), self.version.as_deref())
    }

    fn open_image(&mut self) -> Result<usize, UpdateError> {
        if !self.reachable {
            return Err(UpdateError::SourceUnavailable);
        }
        self.pos = 0;
        let len = self.announced_len.unwrap_or(self.image.len());
        if len == 0 {
            return Err(UpdateError::InvalidContentLength);
        }
        info!("Firmware(sim): serving {} bytes", len);
        Ok(len)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        let n = buf.len().min(self.image.len() - self.pos);
        buf[..n].copy_from_slice(&self.image[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
