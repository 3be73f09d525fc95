// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Upload ceiling per request (200 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 200 * 1024 * 1024;

/// Engine and front-end settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the ephemeral artifact namespace. `None` means a `blattwerk`
    /// directory under the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    /// Maximum total size of all inputs in one request.
    pub max_input_bytes: u64,
    /// Deadline for asynchronous dispatch.
    pub request_timeout_secs: u64,
    /// Page size used when laying images out as PDF pages.
    pub paper_size: crate::PaperSize,
    /// Resolution used when rasterising PDF pages.
    pub raster_dpi: u32,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            request_timeout_secs: 120,
            paper_size: crate::PaperSize::A4,
            raster_dpi: 72,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. A missing file yields the defaults;
    /// a present but malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// The effective scratch root.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("blattwerk"))
    }
}
