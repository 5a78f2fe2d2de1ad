//! QR rendering for exit passes.

use crate::error::{CheckoutError, CheckoutResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::svg;
use qrcode::QrCode;

/// Renders a payload as a scannable image, returned as a data URL
pub trait QrRenderer: Send + Sync {
    fn render(&self, payload: &str) -> CheckoutResult<String>;
}

/// SVG renderer; output is `data:image/svg+xml;base64,...`
#[derive(Debug, Clone)]
pub struct SvgQrRenderer {
    min_dimension: u32,
}

impl Default for SvgQrRenderer {
    fn default() -> Self {
        Self { min_dimension: 256 }
    }
}

impl SvgQrRenderer {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl QrRenderer for SvgQrRenderer {
    fn render(&self, payload: &str) -> CheckoutResult<String> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|e| CheckoutError::Internal(format!("QR encoding failed: {}", e)))?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
    }
}
