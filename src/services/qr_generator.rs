use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Luma};
use qrcode::render::svg;
use qrcode::QrCode;
use serde::{Deserialize, Serialize};

use crate::models::StudentId;

/// Longest identifier accepted into a token
pub const MAX_STUDENT_ID_LEN: usize = 128;

/// Light border around the symbol, in modules, required by most scanners
const QUIET_ZONE: u32 = 4;

pub const DEFAULT_MODULE_SIZE: u32 = 8;

/// Largest pixel size per module; keeps rendered images a few megabytes at most
pub const MAX_MODULE_SIZE: u32 = 64;

#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    #[error("Invalid student id: {0}")]
    InvalidStudentId(String),

    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Structured token payload. Carries only the durable reference, never
/// personal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "studentId")]
    pub student_id: StudentId,
}

/// A freshly issued token: the text that goes into the symbol and the
/// rendered PNG.
#[derive(Debug, Clone)]
pub struct EncodedToken {
    pub payload: String,
    pub png: Vec<u8>,
}

impl EncodedToken {
    /// PNG as a `data:` URL, the form stored on the student row
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

pub fn validate_student_id(student_id: &StudentId) -> Result<(), EncodingError> {
    let id = student_id.as_str();

    if id.is_empty() {
        return Err(EncodingError::InvalidStudentId("empty identifier".to_string()));
    }
    if id.len() > MAX_STUDENT_ID_LEN {
        return Err(EncodingError::InvalidStudentId(format!(
            "identifier longer than {} bytes",
            MAX_STUDENT_ID_LEN
        )));
    }
    if id.trim() != id {
        return Err(EncodingError::InvalidStudentId(
            "identifier has surrounding whitespace".to_string(),
        ));
    }
    if id.chars().any(char::is_control) {
        return Err(EncodingError::InvalidStudentId(
            "identifier contains control characters".to_string(),
        ));
    }

    Ok(())
}

/// Serializes the structured payload, e.g. `{"studentId":"abc-123"}`
pub fn token_payload(student_id: &StudentId) -> Result<String, EncodingError> {
    validate_student_id(student_id)?;

    let payload = TokenPayload {
        student_id: student_id.clone(),
    };

    Ok(serde_json::to_string(&payload)?)
}

/// Renders student tokens as scannable images
#[derive(Debug, Clone, Copy)]
pub struct TokenEncoder {
    module_size: u32,
}

impl Default for TokenEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_SIZE)
    }
}

impl TokenEncoder {
    pub fn new(module_size: u32) -> Self {
        Self {
            module_size: module_size.clamp(1, MAX_MODULE_SIZE),
        }
    }

    pub fn module_size(&self) -> u32 {
        self.module_size
    }

    /// Builds the payload for `student_id` and renders it as PNG.
    ///
    /// The student must already be stored; this does not look it up.
    pub fn encode(&self, student_id: &StudentId) -> Result<EncodedToken, EncodingError> {
        let payload = token_payload(student_id)?;
        let code = QrCode::new(payload.as_bytes())?;
        let png = self.render_png(&code)?;

        Ok(EncodedToken { payload, png })
    }

    /// Renders the token for `student_id` as an SVG document
    pub fn render_svg(&self, student_id: &StudentId) -> Result<String, EncodingError> {
        let payload = token_payload(student_id)?;
        let code = QrCode::new(payload.as_bytes())?;

        let svg = code
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .quiet_zone(true)
            .build();

        Ok(svg)
    }

    fn render_png(&self, code: &QrCode) -> Result<Vec<u8>, EncodingError> {
        let width = code.width() as u32;
        let img_size = (width + 2 * QUIET_ZONE) * self.module_size;

        let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(img_size, img_size, |x, y| {
            let module_x = (x / self.module_size) as i64 - QUIET_ZONE as i64;
            let module_y = (y / self.module_size) as i64 - QUIET_ZONE as i64;

            let inside = (0..width as i64).contains(&module_x) && (0..width as i64).contains(&module_y);
            if inside && code[(module_x as usize, module_y as usize)] == qrcode::types::Color::Dark {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        });

        let mut png_data = Vec::new();
        image::DynamicImage::ImageLuma8(img).write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )?;

        Ok(png_data)
    }
}
