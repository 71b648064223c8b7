//! Deterministic variant assignment for surface experiments.
//!
//! Buckets a session id into 100 slots with a stable hash, so a visitor
//! lands in the same variant on every evaluation without any server-side
//! coordination. Assignments are made sticky for the page view through
//! the session store, which keeps the variant fixed even when the rollout
//! percentage changes mid-session.

use std::hash::{Hash, Hasher};

use tracing::warn;

use crate::storage::KeyValueStore;

/// Experiment name for the exit-intent offer rollout.
pub const EXIT_OFFER_EXPERIMENT: &str = "exitOffer";

/// Which arm of an experiment a session falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Baseline experience.
    Control,
    /// The experimental offer experience.
    Offer,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Control => "control",
            Variant::Offer => "offer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "control" => Some(Variant::Control),
            "offer" => Some(Variant::Offer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns sessions to experiment variants.
pub struct VariantAssigner {
    session: Box<dyn KeyValueStore>,
    rollout_pct: u8,
}

impl VariantAssigner {
    pub fn new(session: Box<dyn KeyValueStore>, rollout_pct: u8) -> Self {
        Self {
            session,
            rollout_pct: rollout_pct.min(100),
        }
    }

    /// Resolve the variant for an experiment, assigning one if the
    /// session has none yet. The first resolution is persisted so later
    /// calls within the page view agree even if the rollout moves.
    pub fn assign(&mut self, experiment: &str, session_id: &str) -> Variant {
        let key = Self::storage_key(experiment);
        match self.session.get(&key) {
            Ok(Some(raw)) => {
                if let Some(variant) = Variant::parse(&raw) {
                    return variant;
                }
                warn!(experiment, value = %raw, "unrecognized stored variant, reassigning");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(experiment, error = %err, "variant lookup failed, assigning fresh");
            }
        }

        let variant = self.compute(experiment, session_id);
        if let Err(err) = self.session.set(&key, variant.as_str()) {
            warn!(experiment, error = %err, "failed to persist variant assignment");
        }
        variant
    }

    /// The stored assignment, if one was already made this session.
    pub fn assigned(&self, experiment: &str) -> Option<Variant> {
        let key = Self::storage_key(experiment);
        match self.session.get(&key) {
            Ok(Some(raw)) => Variant::parse(&raw),
            _ => None,
        }
    }

    fn compute(&self, experiment: &str, session_id: &str) -> Variant {
        if Self::bucket(session_id, experiment) < u32::from(self.rollout_pct) {
            Variant::Offer
        } else {
            Variant::Control
        }
    }

    /// Deterministic bucket in 0..100 from the session and experiment ids.
    fn bucket(session_id: &str, experiment: &str) -> u32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        session_id.hash(&mut hasher);
        experiment.hash(&mut hasher);
        (hasher.finish() as u32) % 100
    }

    fn storage_key(experiment: &str) -> String {
        format!("variant.{experiment}")
    }
}

impl std::fmt::Debug for VariantAssigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantAssigner")
            .field("rollout_pct", &self.rollout_pct)
            .finish_non_exhaustive()
    }
}
