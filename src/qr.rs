use crate::error::Result;
use qrcode::{Color, QrCode};

/// Modules of blank border around the symbol.
pub const QUIET_ZONE: usize = 2;

/// A QR symbol as a square grid of dark/light modules, quiet zone included.
#[derive(Clone, Debug)]
pub struct QrMatrix {
    size: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encode `data` (typically the asset identifier).
    pub fn encode(data: &str) -> Result<Self> {
        let code = QrCode::new(data.as_bytes())?;
        let inner = code.width();
        let size = inner + 2 * QUIET_ZONE;
        let mut dark = vec![false; size * size];
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color == Color::Dark {
                let (x, y) = (i % inner, i / inner);
                dark[(y + QUIET_ZONE) * size + x + QUIET_ZONE] = true;
            }
        }
        Ok(QrMatrix { size, dark })
    }

    /// Width (and height) in modules.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.size && y < self.size && self.dark[y * self.size + x]
    }

    /// Horizontal runs of dark modules as `(x, y, len)`, for compact drawing.
    pub fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.size {
            let mut x = 0;
            while x < self.size {
                if self.is_dark(x, y) {
                    let start = x;
                    while x < self.size && self.is_dark(x, y) {
                        x += 1;
                    }
                    runs.push((start, y, x - start));
                } else {
                    x += 1;
                }
            }
        }
        runs
    }

    /// Standalone SVG with one unit per module, scaled to `pixels` square.
    pub fn to_svg(&self, pixels: u32) -> String {
        let mut svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{px}" height="{px}" viewBox="0 0 {n} {n}" shape-rendering="crispEdges"><rect width="{n}" height="{n}" fill="#fff"/><path fill="#000" d=""##,
            px = pixels,
            n = self.size
        );
        for (x, y, len) in self.dark_runs() {
            svg.push_str(&format!("M{} {}h{}v1h-{}z", x, y, len, len));
        }
        svg.push_str(r#""/></svg>"#);
        svg
    }
}
