// ============================================================================
// Stroke recordings (.hst): bincode, magic-tagged
// ============================================================================
//
// A recording holds the brush parameters and the dab sequence of one stroke
// so it can be replayed headlessly on other images.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HealError, HealResult};
use crate::ops::heal::{Dab, HealParams};

const STROKE_MAGIC: &str = "HST1";

/// Upper bound on dabs per recording. Prevents memory exhaustion from
/// crafted files.
pub const MAX_DABS: usize = 1_000_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    pub magic: String,
    pub params: HealParams,
    /// `None` marks a skipped slot; kept so replays line up with the source.
    pub dabs: Vec<Option<Dab>>,
}

impl StrokeRecord {
    pub fn new(params: HealParams, dabs: Vec<Option<Dab>>) -> Self {
        Self {
            magic: STROKE_MAGIC.to_string(),
            params,
            dabs,
        }
    }

    /// Number of real (non-skipped) dabs.
    pub fn dab_count(&self) -> usize {
        self.dabs.iter().flatten().count()
    }
}

pub fn save_stroke(record: &StrokeRecord, path: &Path) -> HealResult<()> {
    if record.dabs.len() > MAX_DABS {
        return Err(HealError::StrokeFile(format!(
            "{} dabs exceeds maximum {}",
            record.dabs.len(),
            MAX_DABS
        )));
    }
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, record)?;
    Ok(())
}

pub fn load_stroke(path: &Path) -> HealResult<StrokeRecord> {
    let raw = std::fs::read(path)?;
    decode_stroke(&raw)
}

/// Decode a recording from memory, validating magic and size.
pub fn decode_stroke(raw: &[u8]) -> HealResult<StrokeRecord> {
    if raw.len() < 12 {
        return Err(HealError::StrokeFile("file too small".into()));
    }
    // bincode writes a String as an 8-byte length then the bytes, so the
    // 4-char magic sits at 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != STROKE_MAGIC {
        return Err(HealError::StrokeFile(format!("unknown magic '{}'", magic)));
    }

    let record: StrokeRecord = bincode::deserialize(raw)?;
    if record.dabs.len() > MAX_DABS {
        return Err(HealError::StrokeFile(format!(
            "{} dabs exceeds maximum {}",
            record.dabs.len(),
            MAX_DABS
        )));
    }
    Ok(record)
}
