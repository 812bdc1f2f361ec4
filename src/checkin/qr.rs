use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::Serialize;

use super::CheckInError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QrImage {
    pub svg: String,
}

/// Turns a payload string into a scannable image.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, data: &str) -> Result<QrImage, CheckInError>;
}

/// Renders SVG codes at error-correction level H.
pub struct SvgQrEncoder {
    pub min_size: u32,
}

impl SvgQrEncoder {
    pub fn new() -> Self {
        Self { min_size: 256 }
    }
}

impl Default for SvgQrEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrEncoder for SvgQrEncoder {
    fn encode(&self, data: &str) -> Result<QrImage, CheckInError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)
            .map_err(|e| CheckInError::Encoding(e.to_string()))?;

        let svg = code
            .render()
            .min_dimensions(self.min_size, self.min_size)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build();

        Ok(QrImage { svg })
    }
}
