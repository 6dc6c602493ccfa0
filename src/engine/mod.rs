//! Inpainting engine: the model trait, the ONNX LaMa backend and the pool of
//! model handles shared by every request.
//!
//! Model handles are created once at startup and never replaced. Inference
//! goes through [`InpaintEngine::infer`], which leases a handle for the
//! duration of one call. With a pool of one handle this is a single-slot
//! admission gate: at most one inference is in flight.

mod lama;
mod tensor;
pub mod types;

pub use lama::LamaOnnx;
pub use tensor::TensorCodec;
pub use types::{InpaintModel, OutputRange};

use crate::canvas::{Canvas, Mask};
use crate::config::EngineConfig;
use crate::error::InpaintError;
use anyhow::{Context, Result};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// Create the default inpainting model (LaMa on ONNX Runtime)
pub fn create_default_model(config: &EngineConfig) -> Result<Box<dyn InpaintModel>> {
    let model = LamaOnnx::new(config)?;
    Ok(Box::new(model))
}

/// Pool of interchangeable model handles.
pub struct InpaintEngine {
    idle: Mutex<Vec<Box<dyn InpaintModel>>>,
    returned: Condvar,
    size: usize,
    name: &'static str,
}

/// Exclusive use of one model handle. Returned to the pool on drop.
pub struct EngineLease<'a> {
    engine: &'a InpaintEngine,
    model: Option<Box<dyn InpaintModel>>,
}

impl InpaintEngine {
    /// Build an engine from already loaded handles.
    pub fn new(models: Vec<Box<dyn InpaintModel>>) -> Result<Self> {
        let name = models
            .first()
            .map(|m| m.name())
            .context("engine needs at least one model handle")?;

        Ok(Self {
            size: models.len(),
            idle: Mutex::new(models),
            returned: Condvar::new(),
            name,
        })
    }

    /// Load `config.pool_size` handles of the default model.
    pub fn load(config: &EngineConfig) -> Result<Self> {
        let size = config.pool_size.max(1);
        let mut models = Vec::with_capacity(size);
        for slot in 0..size {
            tracing::info!("Loading model handle {}/{}", slot + 1, size);
            models.push(create_default_model(config)?);
        }
        Self::new(models)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pool_size(&self) -> usize {
        self.size
    }

    /// Handles currently not leased.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Block until a handle is free and lease it.
    pub fn acquire(&self) -> Result<EngineLease<'_>, InpaintError> {
        let poisoned = |_| InpaintError::inference("model pool lock poisoned");

        let mut idle = self.idle.lock().map_err(poisoned)?;
        loop {
            if let Some(model) = idle.pop() {
                return Ok(EngineLease {
                    engine: self,
                    model: Some(model),
                });
            }
            idle = self.returned.wait(idle).map_err(poisoned)?;
        }
    }

    /// Run one inference on a leased handle.
    ///
    /// `image` and `mask` must have identical dimensions. The output may be
    /// padded beyond the input size.
    pub fn infer(&self, image: &Canvas, mask: &Mask) -> Result<Canvas, InpaintError> {
        if image.dimensions() != mask.dimensions() {
            return Err(InpaintError::Dimension(format!(
                "image is {}x{} but mask is {}x{}",
                image.width(),
                image.height(),
                mask.width(),
                mask.height()
            )));
        }

        let mut lease = self.acquire()?;
        lease.infer(image, mask)
    }

    fn release(&self, model: Box<dyn InpaintModel>) {
        // A poisoned pool stays poisoned; later acquisitions report it.
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(model);
            self.returned.notify_one();
        }
    }
}

impl EngineLease<'_> {
    pub fn infer(&mut self, image: &Canvas, mask: &Mask) -> Result<Canvas, InpaintError> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| InpaintError::inference("lease already released"))?;

        let start = Instant::now();
        let output = model.infer(image, mask).map_err(InpaintError::inference)?;

        tracing::debug!(
            "{} inference {}x{} -> {}x{} in {:.1}ms",
            model.name(),
            image.width(),
            image.height(),
            output.width(),
            output.height(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output)
    }
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        if let Some(model) = self.model.take() {
            self.engine.release(model);
        }
    }
}
