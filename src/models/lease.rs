// Scoped model acquisition
//
// A ModelLease owns the tokenizer/model pair for exactly one request. The
// pair is released either explicitly through `release` (errors reported to
// the caller) or by Drop on any other exit path (errors logged).

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, error};

use super::catalog::ModelDescriptor;
use super::codec::TextCodec;
use super::seq2seq::Seq2SeqModel;
use crate::errors::RewriteError;

/// Hook run after a model's memory has been dropped
pub trait MemoryReclaimer: Send + Sync {
    fn reclaim(&self, descriptor: &ModelDescriptor) -> Result<()>;
}

/// Reports process memory after a release. ONNX Runtime returns CPU and
/// CUDA arena memory when its sessions drop, so nothing else is required.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemoryReclaimer;

impl MemoryReclaimer for SystemMemoryReclaimer {
    fn reclaim(&self, descriptor: &ModelDescriptor) -> Result<()> {
        let mut system = sysinfo::System::new();
        system.refresh_memory();
        debug!(
            model = %descriptor.name,
            device = descriptor.device.name(),
            accelerator = descriptor.device.is_accelerator(),
            used_memory_mb = system.used_memory() / (1024 * 1024),
            "Model memory reclaimed"
        );
        Ok(())
    }
}

struct LoadedParts {
    codec: Box<dyn TextCodec>,
    model: Box<dyn Seq2SeqModel>,
}

/// Exclusive, request-scoped ownership of a loaded model
pub struct ModelLease {
    descriptor: ModelDescriptor,
    parts: Option<LoadedParts>,
    reclaimer: Arc<dyn MemoryReclaimer>,
}

impl ModelLease {
    pub fn new(
        descriptor: ModelDescriptor,
        codec: Box<dyn TextCodec>,
        model: Box<dyn Seq2SeqModel>,
        reclaimer: Arc<dyn MemoryReclaimer>,
    ) -> Self {
        debug!(model = %descriptor.name, "Model lease acquired");
        Self {
            descriptor,
            parts: Some(LoadedParts { codec, model }),
            reclaimer,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Borrow the codec and the model together
    pub fn parts_mut(&mut self) -> Result<(&dyn TextCodec, &mut dyn Seq2SeqModel)> {
        match &mut self.parts {
            Some(parts) => Ok((parts.codec.as_ref(), parts.model.as_mut())),
            None => bail!("model {} was already released", self.descriptor.name),
        }
    }

    /// Drop the model and reclaim its memory, reporting failures
    pub fn release(mut self) -> Result<(), RewriteError> {
        self.release_inner().map_err(RewriteError::Cleanup)
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(parts) = self.parts.take() else {
            return Ok(());
        };
        drop(parts);
        debug!(model = %self.descriptor.name, "Model lease released");
        self.reclaimer.reclaim(&self.descriptor)
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            error!(model = %self.descriptor.name, error = %e, "Failed to release model");
        }
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("model", &self.descriptor.name)
            .field("released", &self.parts.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendDevice, Precision};
    use crate::models::seq2seq::{EncoderOutput, SpecialTokens};
    use ndarray::Array2;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullCodec;

    impl TextCodec for NullCodec {
        fn encode(&self, _text: &str) -> Result<Vec<u32>> {
            Ok(vec![])
        }
        fn decode(&self, _ids: &[u32]) -> Result<String> {
            Ok(String::new())
        }
        fn token_to_id(&self, _token: &str) -> Option<u32> {
            None
        }
        fn unk_token_id(&self) -> Option<u32> {
            None
        }
    }

    struct NullModel;

    impl Seq2SeqModel for NullModel {
        fn name(&self) -> &str {
            "null"
        }
        fn special_tokens(&self) -> SpecialTokens {
            SpecialTokens {
                decoder_start: 0,
                eos: 1,
                forced_bos: None,
            }
        }
        fn encode(&mut self, _input_ids: &[u32]) -> Result<EncoderOutput> {
            bail!("not used")
        }
        fn next_token_logits(&mut self, _e: &EncoderOutput, _p: &[&[u32]]) -> Result<Array2<f32>> {
            bail!("not used")
        }
    }

    #[derive(Default)]
    struct CountingReclaimer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MemoryReclaimer for CountingReclaimer {
        fn reclaim(&self, _descriptor: &ModelDescriptor) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("reclaim failed");
            }
            Ok(())
        }
    }

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::at(
            "null",
            PathBuf::from("/tmp/null"),
            Precision::Fp32,
            BackendDevice::Cpu,
            false,
        )
    }

    fn lease(reclaimer: Arc<CountingReclaimer>) -> ModelLease {
        ModelLease::new(descriptor(), Box::new(NullCodec), Box::new(NullModel), reclaimer)
    }

    #[test]
    fn test_explicit_release_runs_once() {
        let reclaimer = Arc::new(CountingReclaimer::default());
        lease(reclaimer.clone()).release().unwrap();
        assert_eq!(reclaimer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let reclaimer = Arc::new(CountingReclaimer::default());
        {
            let mut lease = lease(reclaimer.clone());
            assert!(lease.parts_mut().is_ok());
        }
        assert_eq!(reclaimer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_failure_is_cleanup_error() {
        let reclaimer = Arc::new(CountingReclaimer {
            fail: true,
            ..Default::default()
        });
        let err = lease(reclaimer.clone()).release().unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Cleanup);
        assert_eq!(reclaimer.calls.load(Ordering::SeqCst), 1);
    }
}
