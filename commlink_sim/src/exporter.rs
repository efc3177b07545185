//! JSON exporter for quality frames.
//!
//! One frame per compute tick: every quality packet sent on that tick plus
//! agent positions, for offline plotting.

use commlink_core::Packet;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A single frame of simulation data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityFrame {
    /// Simulation time in seconds
    pub time_sec: f64,
    
    /// Heartbeat sent on this step
    pub heartbeat: bool,
    
    /// Quality packets sent on this step
    pub links: Vec<LinkRecord>,
    
    /// Entity positions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<EntityPosition>,
}

/// One decoded quality packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from: u64,
    pub to: u64,
    pub quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPosition {
    pub id: u64,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EntityPosition {
    pub fn new(id: u64, label: &str, pos: Vector3<f64>) -> Self {
        Self {
            id,
            label: label.to_string(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
        }
    }
}

impl QualityFrame {
    /// Frame built from the packets captured during one step.
    pub fn from_packets(time_sec: f64, packets: &[Packet]) -> Self {
        let mut frame = Self {
            time_sec,
            ..Default::default()
        };
        for packet in packets {
            match *packet {
                Packet::Heartbeat => frame.heartbeat = true,
                Packet::Quality { from, to, quality } => frame.links.push(LinkRecord { from, to, quality }),
            }
        }
        frame
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    pub scenario: String,
    pub seed: u64,
    pub algorithm: String,
    pub duration_sec: f64,
    pub frames: Vec<QualityFrame>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    pub fn new(scenario: &str, seed: u64, algorithm: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            algorithm: algorithm.to_string(),
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }
    
    pub fn add_frame(&mut self, frame: QualityFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }
    
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }
    
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
