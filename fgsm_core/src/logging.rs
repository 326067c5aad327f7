//! JSON line-delimited run logs.
//!
//! `attack.jsonl` receives one entry per attack, `regions.jsonl` one entry per
//! composited region. Both are appended to, never truncated.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::attack::AttackSummary;
use crate::region::Region;
use crate::tensor::TensorStatistics;

pub const ATTACK_LOG: &str = "attack.jsonl";
pub const REGION_LOG: &str = "regions.jsonl";

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[derive(Debug, Serialize)]
pub struct AttackLogEntry {
    pub timestamp_ms: u128,
    #[serde(flatten)]
    pub summary: AttackSummary,
    pub original_prediction: usize,
    pub perturbed_prediction: usize,
    pub gradient: TensorStatistics,
}

pub fn log_attack<P: AsRef<Path>>(
    log_dir: P,
    summary: &AttackSummary,
    original_prediction: usize,
    perturbed_prediction: usize,
    gradient: &TensorStatistics,
) -> io::Result<()> {
    fs::create_dir_all(log_dir.as_ref())?;
    let entry = AttackLogEntry {
        timestamp_ms: timestamp_ms(),
        summary: *summary,
        original_prediction,
        perturbed_prediction,
        gradient: *gradient,
    };
    append_json_line(log_dir.as_ref().join(ATTACK_LOG), &entry)
}

#[derive(Debug, Serialize)]
pub struct RegionLogEntry {
    pub timestamp_ms: u128,
    pub region: Region,
    pub mean_rgb: [f32; 3],
    pub changed_pixels: usize,
}

pub fn log_region<P: AsRef<Path>>(
    log_dir: P,
    region: Region,
    stats: &TensorStatistics,
    changed_pixels: usize,
) -> io::Result<()> {
    fs::create_dir_all(log_dir.as_ref())?;
    let entry = RegionLogEntry {
        timestamp_ms: timestamp_ms(),
        region,
        mean_rgb: stats.mean_rgb,
        changed_pixels,
    };
    append_json_line(log_dir.as_ref().join(REGION_LOG), &entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_log_appends_lines() {
        let dir = std::env::temp_dir().join(format!("selective-fgsm-log-{}", std::process::id()));
        let stats = TensorStatistics {
            mean: 0.5,
            mean_rgb: [0.4, 0.5, 0.6],
            min: 0.0,
            max: 1.0,
        };

        log_region(&dir, Region::TopLeft, &stats, 12).unwrap();
        log_region(&dir, Region::Border, &stats, 3).unwrap();

        let contents = fs::read_to_string(dir.join(REGION_LOG)).unwrap();
        fs::remove_dir_all(&dir).ok();

        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["region"], "top_left");
        assert_eq!(lines[0]["changed_pixels"], 12);
        assert_eq!(lines[1]["region"], "border");
    }
}
