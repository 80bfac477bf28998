//! Windows-1252 conversion for clock bodies.
//!
//! The clocks emit AFD files and roster exports in Windows-1252 and expect
//! roster imports in the same charset. Every byte has a mapping, so decoding
//! cannot fail; encoding fails when the text holds a character outside it.

use encoding_rs::WINDOWS_1252;

use crate::DeviceError;

/// Decode a clock body. No BOM sniffing: the clocks never send one.
pub fn decode(bytes: &[u8]) -> String {
    let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// Encode text for upload.
pub fn encode(text: &str) -> Result<Vec<u8>, DeviceError> {
    let (bytes, _, had_unmappable) = WINDOWS_1252.encode(text);
    if had_unmappable {
        let bad: String = text
            .chars()
            .filter(|c| {
                let mut buf = [0u8; 4];
                WINDOWS_1252.encode(c.encode_utf8(&mut buf)).2
            })
            .take(8)
            .collect();
        return Err(DeviceError::Encode(format!(
            "characters not representable in windows-1252: {bad:?}"
        )));
    }
    Ok(bytes.into_owned())
}
