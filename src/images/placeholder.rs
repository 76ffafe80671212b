/// Locally generated stand-in for images that could not be loaded.
///
/// The placeholder is a light grey panel with a border and a diagonal
/// cross. The layout engine draws the caption ("Image unavailable" plus
/// the failure reason) over it.

use super::{ImageOrigin, ResolvedImage};

pub const WIDTH: u32 = 400;
pub const HEIGHT: u32 = 300;

const FILL: [u8; 3] = [0xEE, 0xEE, 0xEE];
const BORDER: [u8; 3] = [0xBB, 0xBB, 0xBB];
const CROSS: [u8; 3] = [0xD4, 0xD4, 0xD4];
const BORDER_WIDTH: u32 = 3;

/// Caption prefix shared by all placeholders.
pub const CAPTION: &str = "Image unavailable";

/// Build a fresh placeholder carrying `reason` in its caption.
pub fn generate(reason: &str) -> ResolvedImage {
    let mut rgb = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);

    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let on_border = x < BORDER_WIDTH || y < BORDER_WIDTH || x >= WIDTH - BORDER_WIDTH || y >= HEIGHT - BORDER_WIDTH;
            // Both diagonals, scaled to the panel's aspect
            let dx = x * HEIGHT;
            let on_cross = dx.abs_diff(y * WIDTH) <= WIDTH * 2 || dx.abs_diff((HEIGHT - 1 - y) * WIDTH) <= WIDTH * 2;

            let px = if on_border {
                BORDER
            } else if on_cross {
                CROSS
            } else {
                FILL
            };
            rgb.extend_from_slice(&px);
        }
    }

    let reason = reason.trim();
    let caption = if reason.is_empty() { CAPTION.to_string() } else { format!("{} ({})", CAPTION, reason) };

    ResolvedImage { width: WIDTH, height: HEIGHT, rgb, origin: ImageOrigin::Placeholder, caption: Some(caption) }
}
