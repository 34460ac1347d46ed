use serde::{Deserialize, Serialize};

/// One perturbation applied to the nominal stream offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetProbe {
    /// Signed distance from the nominal offset.
    pub delta: i64,
    /// Why this distance is worth trying.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rationale: String,
}

impl OffsetProbe {
    pub fn new(delta: i64, rationale: impl Into<String>) -> Self {
        Self { delta, rationale: rationale.into() }
    }

    /// Absolute offset for this probe, or `None` when it falls before the
    /// start of the buffer.
    pub fn apply(&self, nominal: usize) -> Option<usize> {
        let nominal = i64::try_from(nominal).ok()?;
        let offset = nominal.checked_add(self.delta)?;
        usize::try_from(offset).ok()
    }
}

/// Ordered list of offsets tried when looking for a raw stream.
///
/// Order matters: the locator returns the first probe that decodes, so the
/// most likely offsets come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProbePlan {
    pub probes: Vec<OffsetProbe>,
}

impl Default for ProbePlan {
    fn default() -> Self {
        Self {
            probes: vec![
                OffsetProbe::new(0, "nominal offset"),
                OffsetProbe::new(-1, "framing counted one byte too many"),
                OffsetProbe::new(1, "framing counted one byte too few"),
                OffsetProbe::new(-13, "13-byte .lzma header counted twice"),
                OffsetProbe::new(13, "13-byte .lzma header left in front of the stream"),
            ],
        }
    }
}

impl ProbePlan {
    pub fn new(probes: Vec<OffsetProbe>) -> Self {
        Self { probes }
    }

    /// Build a plan from bare deltas, keeping their order.
    pub fn from_deltas(deltas: &[i64]) -> Self {
        Self { probes: deltas.iter().map(|d| OffsetProbe::new(*d, "")).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Distinct in-range offsets in probe order.
    ///
    /// Offsets before the buffer start or at/after `buffer_len` are dropped, as
    /// are repeats of an offset already produced.
    pub fn candidates(&self, nominal: usize, buffer_len: usize) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            if let Some(offset) = probe.apply(nominal) {
                if offset < buffer_len && !out.contains(&offset) {
                    out.push(offset);
                }
            }
        }
        out
    }
}
