//! Candidate loading from JSON files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::{AccessCandidate, Result};

/// Load a batch of access candidates from a JSON array file.
pub fn load_candidates(path: impl AsRef<Path>) -> Result<Vec<AccessCandidate>> {
    let path = path.as_ref();
    info!("loading access candidates from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let candidates: Vec<AccessCandidate> = serde_json::from_reader(reader)?;

    info!("loaded {} access candidates", candidates.len());
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_a_candidate_batch() {
        let json = r#"[{
            "satellite_id": "SAT-1",
            "rsrp_dbm": -90.0,
            "elevation_deg": 45.0,
            "range_km": 800.0,
            "path_loss_db": 160.0,
            "available_capacity_mbps": 500.0,
            "total_capacity_mbps": 1000.0,
            "required_bandwidth_mbps": 50.0,
            "predicted_latency_ms": 50.0,
            "predicted_throughput_mbps": 200.0,
            "predicted_packet_loss_rate": 0.001,
            "predicted_availability_s": 300.0,
            "setup_time_ms": 200.0,
            "signaling_overhead_kb": 4.0,
            "power_consumption_mw": 700.0,
            "interference_level_dbm": -95.0,
            "current_load": 0.3,
            "historical_load": 0.3
        }]"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let candidates = load_candidates(file.path()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].satellite_id, "SAT-1");
    }
}
