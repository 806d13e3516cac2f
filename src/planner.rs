//! Conversion planning
//!
//! Turns a requested `(source, target)` pair into a sequence of executor
//! hops, runs them in order and cleans up whatever the intermediate hops
//! produced.

use crate::artifact::{Artifact, ConversionKey, ConversionResult};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::registry::{ConversionStrategy, Registry, Route};
use crate::storage::ArtifactStore;
use crate::tools::Toolchain;
use std::sync::Arc;
use std::time::Instant;

/// One executor step of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub key: ConversionKey,
    pub strategy: ConversionStrategy,
}

/// Sequences executors for a conversion request
#[derive(Debug, Clone)]
pub struct Planner {
    registry: &'static Registry,
    executor: Executor,
    store: Arc<dyn ArtifactStore>,
}

impl Planner {
    pub fn new(store: Arc<dyn ArtifactStore>, tools: Toolchain) -> Self {
        Self::with_registry(Registry::builtin(), store, tools)
    }

    pub fn with_registry(
        registry: &'static Registry,
        store: Arc<dyn ArtifactStore>,
        tools: Toolchain,
    ) -> Self {
        Self {
            registry,
            executor: Executor::new(store.clone(), tools),
            store,
        }
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// Resolve a key into executor hops. Fails with `UnsupportedConversion`
    /// without touching any file.
    pub fn plan(&self, key: &ConversionKey) -> Result<Vec<Hop>> {
        match self.registry.resolve(key)? {
            Route::Direct(strategy) => Ok(vec![Hop {
                key: key.clone(),
                strategy,
            }]),
            Route::Via(via) => {
                let legs = [
                    ConversionKey::new(&key.source, via)?,
                    ConversionKey::new(via, &key.target)?,
                ];
                legs.into_iter()
                    .map(|leg| match self.registry.resolve(&leg)? {
                        Route::Direct(strategy) => Ok(Hop { key: leg, strategy }),
                        Route::Via(_) => {
                            tracing::error!(pair = %key, leg = %leg, "Chained route has a chained leg");
                            Err(Error::UnsupportedConversion {
                                source_ext: key.source.clone(),
                                target_ext: key.target.clone(),
                            })
                        }
                    })
                    .collect()
            }
        }
    }

    /// Convert `source` into `target_ext`.
    ///
    /// The result lives at `converted/{source id}.{target}`. Failures keep
    /// their kind and carry the pair of the hop that failed.
    pub async fn convert(&self, source: &Artifact, target_ext: &str) -> Result<ConversionResult> {
        let start = Instant::now();
        let key = ConversionKey::new(&source.extension, target_ext)?;
        let hops = self.plan(&key)?;
        source.ensure_exists()?;

        let mut current = source.clone();
        let mut intermediates = Vec::new();

        for (index, hop) in hops.iter().enumerate() {
            match self
                .executor
                .execute(hop.strategy, &current, &hop.key.target)
                .await
            {
                Ok(output) => {
                    if index + 1 < hops.len() {
                        intermediates.push(output.clone());
                    }
                    current = output;
                }
                Err(e) => {
                    tracing::warn!(
                        pair = %key,
                        hop = %hop.key,
                        strategy = %hop.strategy,
                        error = %e,
                        "Conversion failed"
                    );
                    self.cleanup(&intermediates);
                    return Err(e.in_pair(&hop.key));
                }
            }
        }

        self.cleanup(&intermediates);

        tracing::info!(
            pair = %key,
            hops = hops.len(),
            size = current.size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converted artifact"
        );
        Ok(ConversionResult::new(current))
    }

    fn cleanup(&self, intermediates: &[Artifact]) {
        for artifact in intermediates {
            if let Err(e) = self.store.delete(artifact) {
                tracing::warn!(path = %artifact.path.display(), error = %e, "Failed to remove intermediate");
            }
        }
    }
}
