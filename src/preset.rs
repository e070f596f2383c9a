//! JSON presets
//!
//! A preset carries any subset of the three engine configurations plus the
//! ring cells and the held notes. Missing sections leave the running engine
//! alone; missing fields inside a section take their defaults.
//!
//! ```json
//! {
//!   "tempo": 100,
//!   "euclidean": { "pulses": 5, "steps": 16 },
//!   "ring": { "ring_count": 3, "scale": "dorian", "active": [[0], [1], [0, 2]] },
//!   "arpeggiator": { "pattern_mode": "drunk", "chaos": 0.3, "held": [60, 63, 67] }
//! }
//! ```

use crate::rack::{Rack, Target};
use anyhow::{bail, Context, Result};
use pulsar_core::config::{ArpeggiatorConfig, EuclideanConfig, RingConfig};
use pulsar_core::engine::{ArpeggiatorEngine, EuclideanEngine, RingSequencerEngine};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingPreset {
    #[serde(flatten)]
    pub config: RingConfig,
    /// Active step indices, one list per ring
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpPreset {
    #[serde(flatten)]
    pub config: ArpeggiatorConfig,
    /// Notes to hold, replacing whatever is held now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    /// Applied to every engine after the sections below
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub euclidean: Option<EuclideanConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ring: Option<RingPreset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arpeggiator: Option<ArpPreset>,
}

impl Preset {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid preset JSON")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize preset")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read preset {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in preset {}", path.display()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)
            .with_context(|| format!("failed to write preset {}", path.display()))
    }

    /// Snapshot of everything the rack is playing
    pub fn capture(rack: &Rack) -> Self {
        let ring = rack.ring.inspect(|e| RingPreset {
            config: e.config(),
            active: e
                .rings()
                .iter()
                .map(|r| {
                    r.cells()
                        .iter()
                        .enumerate()
                        .filter(|&(_, &on)| on)
                        .map(|(i, _)| i)
                        .collect()
                })
                .collect(),
        });
        Self {
            tempo: None,
            euclidean: Some(rack.euclid.inspect(|e| e.config())),
            ring: Some(ring),
            arpeggiator: Some(ArpPreset {
                config: rack.arp.inspect(|e| e.config()),
                held: Some(rack.held.snapshot()),
            }),
        }
    }

    /// Check every section against throwaway engines so that `apply` either
    /// applies everything or nothing
    pub fn validate(&self) -> Result<()> {
        if let Some(bpm) = self.tempo {
            pulsar_core::types::tick_period(bpm, 1).context("tempo")?;
        }
        if let Some(cfg) = &self.euclidean {
            EuclideanEngine::new(cfg.clone()).context("euclidean")?;
        }
        if let Some(ring) = &self.ring {
            let mut engine = RingSequencerEngine::new(ring.config.clone()).context("ring")?;
            for (r, steps) in ring.active.iter().enumerate() {
                for &step in steps {
                    engine.set_cell(r, step, true).context("ring.active")?;
                }
            }
        }
        if let Some(arp) = &self.arpeggiator {
            ArpeggiatorEngine::new(arp.config.clone()).context("arpeggiator")?;
            if let Some(bad) = arp.held.iter().flatten().find(|&&n| n > 127) {
                bail!("arpeggiator.held: note {} is outside 0-127", bad);
            }
        }
        Ok(())
    }

    /// Apply to a live rack. Running engines keep running. Returns one line
    /// per section applied.
    pub fn apply(&self, rack: &mut Rack) -> Result<Vec<String>> {
        self.validate()?;
        let mut applied = Vec::new();

        if let Some(cfg) = &self.euclidean {
            rack.euclid
                .update(|e| Ok(e.apply_config(cfg.clone())?))?;
            applied.push(format!("euclid {}/{} +{}", cfg.pulses, cfg.steps, cfg.offset));
        }

        if let Some(ring) = &self.ring {
            rack.ring.set_ring_count(ring.config.ring_count)?;
            rack.ring.update(|e| {
                e.apply_config(ring.config.clone())?;
                if !ring.active.is_empty() {
                    e.clear();
                    for (r, steps) in ring.active.iter().enumerate() {
                        for &step in steps {
                            e.set_cell(r, step, true)?;
                        }
                    }
                }
                Ok(())
            })?;
            applied.push(format!(
                "ring x{} {} {}",
                ring.config.ring_count,
                ring.config.scale.name(),
                ring.config.traversal.name()
            ));
        }

        if let Some(arp) = &self.arpeggiator {
            rack.arp
                .update(|e| Ok(e.apply_config(arp.config.clone())?))?;
            if let Some(notes) = &arp.held {
                rack.held.clear();
                for &n in notes {
                    rack.held.note_on(n)?;
                }
            }
            applied.push(format!("arp {}", arp.config.pattern_mode.name()));
        }

        if let Some(bpm) = self.tempo {
            rack.set_tempo(Target::All, bpm)?;
            applied.push(format!("tempo {:.1}", bpm));
        }

        Ok(applied)
    }
}
