//! QR Rendering
//!
//! Turns the raw pairing payload into a PNG data URI the console page can
//! drop into an `<img>` tag.

use crate::error::{Result, WacrabError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Generate a QR code as PNG image bytes.
pub fn qr_png(qr_data: &str) -> Result<Vec<u8>> {
    use image::{ImageBuffer, Luma};
    use qrcode::{EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| WacrabError::Gateway(format!("QR generation failed: {e}")))?;

    let module_size: u32 = 10;
    let quiet_zone: u32 = 2;
    let modules = code.width() as u32;
    let img_size = (modules + quiet_zone * 2) * module_size;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let mx = (x / module_size).saturating_sub(quiet_zone);
        let my = (y / module_size).saturating_sub(quiet_zone);

        if x / module_size < quiet_zone
            || y / module_size < quiet_zone
            || mx >= modules
            || my >= modules
        {
            Luma([255u8]) // quiet zone
        } else {
            use qrcode::Color;
            match code[(mx as usize, my as usize)] {
                Color::Dark => Luma([0u8]),
                Color::Light => Luma([255u8]),
            }
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| WacrabError::Gateway(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Render the pairing payload as a `data:image/png;base64,...` URI.
pub fn qr_data_uri(qr_data: &str) -> Result<String> {
    let png = qr_png(qr_data)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_png_magic_bytes() {
        let png = qr_png("2@test-pairing-payload").expect("qr render");
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_qr_data_uri_prefix() {
        let uri = qr_data_uri("2@test-pairing-payload").expect("qr render");
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(uri.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn test_qr_rendering_is_deterministic() {
        let a = qr_data_uri("2@same-payload").expect("qr render");
        let b = qr_data_uri("2@same-payload").expect("qr render");
        assert_eq!(a, b);
    }
}
