//! Terminal QR rendering for device pairing.

use yamato_core::error::YamatoError;

const BANNER_WIDTH: usize = 50;

/// Render a QR code with Unicode half blocks, two module rows per text line.
pub fn render_qr_terminal(qr_data: &str) -> Result<String, YamatoError> {
    use qrcode::{Color, EcLevel, QrCode};

    let code = QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::M)
        .map_err(|e| YamatoError::Channel(format!("QR generation failed: {e}")))?;

    let width = code.width();
    let colors: Vec<Color> = code.into_colors();
    let is_dark = |row: usize, col: usize| row < width && colors[row * width + col] == Color::Dark;

    let mut out = String::with_capacity((width + 1) * width.div_ceil(2));
    for row in (0..width).step_by(2) {
        for col in 0..width {
            out.push(match (is_dark(row, col), is_dark(row + 1, col)) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

/// Print a pairing QR code to stdout framed by instructions.
pub fn print_qr(qr_data: &str) -> Result<(), YamatoError> {
    let art = render_qr_terminal(qr_data)?;
    let rule = "=".repeat(BANNER_WIDTH);
    println!("\n{rule}");
    println!("📱 SCAN THIS QR CODE WITH WHATSAPP");
    println!("{rule}");
    println!("{art}");
    println!("{rule}");
    println!("Linked devices → Link a device, then point the camera here");
    println!("{rule}\n");
    Ok(())
}
