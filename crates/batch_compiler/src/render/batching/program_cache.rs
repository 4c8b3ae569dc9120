//! Compiled program cache keyed by feature signature
//!
//! Populated lazily during classification and never invalidated mid-compile,
//! so recompiling an unchanged scene asks the generator for nothing.

use std::collections::HashMap;

use crate::backend::{CompiledProgram, ProgramError, ProgramGenerator};

use super::signature::FeatureSignature;

/// Signature to program map
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<FeatureSignature, CompiledProgram>,
    generated: usize,
}

impl ProgramCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached program for `signature`, generating it on a miss
    pub fn get_or_generate(
        &mut self,
        signature: &FeatureSignature,
        generator: &mut dyn ProgramGenerator,
    ) -> Result<&CompiledProgram, ProgramError> {
        if !self.programs.contains_key(signature) {
            let program = generator.generate(signature)?;
            log::debug!("Generated program {:?} for {:?}", program.handle, signature);
            self.generated += 1;
            self.programs.insert(signature.clone(), program);
        }

        self.programs
            .get(signature)
            .ok_or_else(|| ProgramError::Generation("program missing after insert".to_string()))
    }

    /// Programs generated over the cache's lifetime
    pub fn generated(&self) -> usize {
        self.generated
    }

    /// Number of cached programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Drop every cached program
    pub fn clear(&mut self) {
        self.programs.clear();
    }
}
