use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::mixer::CorpusMixer;
use crate::data::processor::SentenceProcessor;
use crate::domain::example::ProcessedExample;
use crate::error::Result;

/// A corpus mixer feeding a sentence processor: each call pulls one
/// chunk and turns it into one masked example.
#[derive(Clone)]
pub struct ProcessedDataset {
    mixer:     CorpusMixer,
    processor: SentenceProcessor,
}

impl ProcessedDataset {
    pub fn new(mixer: CorpusMixer, processor: SentenceProcessor) -> Self {
        Self { mixer, processor }
    }

    pub fn get_example(&mut self) -> Result<ProcessedExample> {
        let chunk = self.mixer.get_example()?;
        self.processor.process(&chunk)
    }

    /// Re-seed both RNGs from one seed. Two independent sub-seeds are
    /// drawn so the mixer and the processor do not replay the same
    /// random stream.
    pub fn reseed(&mut self, seed: u64) {
        let mut root = StdRng::seed_from_u64(seed);
        self.mixer.reseed(root.gen());
        self.processor.reseed(root.gen());
    }
}
