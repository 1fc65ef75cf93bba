//! Daemon status report.
//!
//! Read-only daemon-wide counters printed before the first pass and after
//! each pass. Nothing in the retention engine depends on these values.

use crate::runtime::Runtime;
use dw_common::{ContainerRecord, ImageRecord};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Daemon-wide version info and inventory totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub server_version: String,
    pub api_version: String,
    pub min_api_version: String,
    pub go_version: String,

    pub containers: u64,
    pub containers_running: u64,
    pub containers_paused: u64,
    pub containers_stopped: u64,

    pub images: u64,

    /// Total size of image layers in bytes, when known.
    #[serde(default)]
    pub layers_size: Option<u64>,
}

/// Render the status report as multi-line text.
pub fn render_status_report(status: &DaemonStatus) -> String {
    let size = status
        .layers_size
        .map(format_size)
        .unwrap_or_else(|| "unknown".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "Docker status report:");
    let _ = writeln!(out);
    let _ = writeln!(out, "    Docker version: {}", status.server_version);
    let _ = writeln!(out, "    Docker API version: {}", status.api_version);
    let _ = writeln!(out, "    Docker min API version: {}", status.min_api_version);
    let _ = writeln!(out, "    GO version: {}", status.go_version);
    let _ = writeln!(out);
    let _ = writeln!(out, "    Total containers: {}", status.containers);
    let _ = writeln!(out, "    Running containers: {}", status.containers_running);
    let _ = writeln!(out, "    Paused containers: {}", status.containers_paused);
    let _ = writeln!(out, "    Stopped containers: {}", status.containers_stopped);
    let _ = writeln!(out);
    let _ = writeln!(out, "    Total images: {}", status.images);
    let _ = writeln!(out);
    let _ = write!(out, "    Total size: {}", size);
    out
}

/// Query the runtime and render a report.
pub fn fetch_status_report(runtime: &dyn Runtime) -> Result<String, crate::runtime::RuntimeError> {
    runtime.status().map(|status| render_status_report(&status))
}

const SIZE_UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Human-readable size in decimal SI units with four significant digits,
/// e.g. `"1.5kB"`, `"734.2MB"`.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    let rendered = format!("{:.4}", value);
    let significant = significant_digits(&rendered, 4);
    format!("{}{}", significant, SIZE_UNITS[unit])
}

fn significant_digits(rendered: &str, digits: usize) -> String {
    let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered, ""));
    let int_digits = int_part.trim_start_matches('0').len().max(1);
    let keep_frac = digits.saturating_sub(int_digits);
    let mut out = int_part.to_string();
    let frac: String = frac_part.chars().take(keep_frac).collect();
    let frac = frac.trim_end_matches('0');
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Audit block for one container removal.
pub fn describe_container(sequence: usize, container: &ContainerRecord) -> String {
    let mut out = format!("Container #{}\n", sequence);
    let _ = writeln!(out, "  id: {}", container.id);
    if let Some(size) = container.size_rw {
        let _ = writeln!(out, "  size: {}", format_size(size));
    }
    let _ = writeln!(out, "  names:");
    for name in &container.names {
        let _ = writeln!(out, "    - {}", name);
    }
    out
}

/// Audit block for one image removal.
pub fn describe_image(sequence: usize, image: &ImageRecord) -> String {
    let mut out = format!("Image #{}\n", sequence);
    let _ = writeln!(out, "  id: {}", image.id);
    let _ = writeln!(out, "  size: {}", format_size(image.size));
    let _ = writeln!(out, "  tags:");
    for tag in image.tags() {
        let _ = writeln!(out, "    - {}", tag);
    }
    out
}
