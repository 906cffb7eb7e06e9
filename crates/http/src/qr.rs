//! Pairing-code rendering.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    qrcode::{QrCode, render::svg, types::QrError},
};

/// Render a pending pairing code as a `data:image/svg+xml;base64,...` URI
/// suitable for an `<img>` tag.
pub fn data_uri(code: &str) -> Result<String, QrError> {
    let qr = QrCode::new(code.as_bytes())?;
    let image = qr.render::<svg::Color>().min_dimensions(256, 256).build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image)
    ))
}
