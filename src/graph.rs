use crate::coordinates::Coordinates;
use crate::error::{AppError, Result};
use crate::summary::GroupTotal;
use plotters::coord::Shift;
use plotters::prelude::*;

/// Quantity plotted by [`group_chart_svg`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartMetric {
    /// Number of assets in each group
    Count,

    /// Sum of the cost column
    Cost,

    /// Sum of the net book value column
    NetBookValue,
}

impl ChartMetric {
    fn value(self, group: &GroupTotal) -> f64 {
        match self {
            ChartMetric::Count => group.count as f64,
            ChartMetric::Cost => group.total_cost,
            ChartMetric::NetBookValue => group.total_net_book_value,
        }
    }
}

/// Configuration options for chart generation
///
/// Charts never render text: titles and axis labels are part of the HTML or
/// PDF around them, which keeps rendering independent of system fonts.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,

    /// Quantity each bar represents
    pub metric: ChartMetric,

    /// Maximum number of bars; remaining groups are left out
    pub max_bars: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 280,
            metric: ChartMetric::Count,
            max_bars: 12,
        }
    }
}

const PALETTE: [(u8, u8, u8); 6] = [
    (31, 119, 180),
    (255, 127, 14),
    (44, 160, 44),
    (214, 39, 40),
    (148, 103, 189),
    (140, 86, 75),
];

/// Fill colour of the `i`-th bar, as a CSS `rgb()` value for legends.
pub fn bar_css_color(i: usize) -> String {
    let (r, g, b) = PALETTE[i % PALETTE.len()];
    format!("rgb({},{},{})", r, g, b)
}

fn chart_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Export(format!("chart rendering failed: {}", e))
}

/// Creates a bar chart of grouped totals as an SVG document
///
/// Bars appear in the order of `groups` (already sorted by [`crate::summary::group_by`]),
/// coloured with [`bar_css_color`] so an HTML legend can match them.
///
/// # Arguments
/// * `groups` - Group totals to plot
/// * `options` - Chart size, metric and bar limit
///
/// # Returns
/// * The SVG markup, or an error if the backend fails
pub fn group_chart_svg(groups: &[GroupTotal], options: &GraphOptions) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        draw_bars(&root, groups, options)?;
        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    groups: &[GroupTotal],
    options: &GraphOptions,
) -> Result<()> {
    root.fill(&WHITE).map_err(chart_err)?;

    let bars: Vec<f64> = groups
        .iter()
        .take(options.max_bars)
        .map(|g| options.metric.value(g).max(0.0))
        .collect();
    let (w, h) = (options.width as i32, options.height as i32);
    let margin = 10;
    let baseline = h - margin;

    root.draw(&PathElement::new(
        vec![(margin, baseline), (w - margin, baseline)],
        BLACK.stroke_width(1),
    ))
    .map_err(chart_err)?;

    let max = bars.iter().cloned().fold(0.0_f64, f64::max);
    if bars.is_empty() || max <= 0.0 {
        return Ok(());
    }

    let slot = (w - 2 * margin) / bars.len() as i32;
    let gap = (slot / 5).max(1);
    let usable = (baseline - margin) as f64;

    for (i, value) in bars.iter().enumerate() {
        let x0 = margin + i as i32 * slot + gap;
        let x1 = margin + (i as i32 + 1) * slot - gap;
        let top = baseline - (value / max * usable).round() as i32;
        let (r, g, b) = PALETTE[i % PALETTE.len()];
        root.draw(&Rectangle::new(
            [(x0, top.min(baseline - 1)), (x1.max(x0 + 1), baseline)],
            RGBColor(r, g, b).filled(),
        ))
        .map_err(chart_err)?;
    }
    Ok(())
}

/// Draws a small world frame with a marker at `coords`
///
/// The frame spans longitude −180..180 and latitude −90..90 with a 30° graticule.
fn draw_marker<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, coords: Coordinates) -> Result<()> {
    root.fill(&RGBColor(240, 246, 252)).map_err(chart_err)?;

    let (w, h) = root.dim_in_pixel();
    let (w, h) = (w as i32, h as i32);
    let to_px = |lat: f64, lon: f64| -> (i32, i32) {
        let x = ((lon + 180.0) / 360.0 * (w - 1) as f64).round() as i32;
        let y = ((90.0 - lat) / 180.0 * (h - 1) as f64).round() as i32;
        (x, y)
    };

    let grid = RGBColor(200, 210, 225).stroke_width(1);
    for lon in (-180..=180).step_by(30) {
        let line = vec![to_px(90.0, lon as f64), to_px(-90.0, lon as f64)];
        root.draw(&PathElement::new(line, grid)).map_err(chart_err)?;
    }
    for lat in (-90..=90).step_by(30) {
        let line = vec![to_px(lat as f64, -180.0), to_px(lat as f64, 180.0)];
        root.draw(&PathElement::new(line, grid)).map_err(chart_err)?;
    }

    let equator = RGBColor(150, 165, 190).stroke_width(1);
    root.draw(&PathElement::new(vec![to_px(0.0, -180.0), to_px(0.0, 180.0)], equator))
        .map_err(chart_err)?;

    let point = to_px(coords.lat, coords.lon);
    let radius = (w.min(h) / 20).max(3);
    root.draw(&Circle::new(point, radius, RGBColor(214, 39, 40).filled()))
        .map_err(chart_err)?;
    root.draw(&Circle::new(point, radius + 2, BLACK.stroke_width(1)))
        .map_err(chart_err)?;
    Ok(())
}

/// Location marker as SVG markup, for HTML reports.
pub fn location_marker_svg(coords: Coordinates, width: u32, height: u32) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_marker(&root, coords)?;
        root.present().map_err(chart_err)?;
    }
    Ok(svg)
}

/// Location marker as raw 8-bit RGB pixels (row-major), for PDF embedding.
pub fn location_marker_rgb(coords: Coordinates, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_marker(&root, coords)?;
        root.present().map_err(chart_err)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &str, count: usize) -> GroupTotal {
        GroupTotal {
            key: key.to_string(),
            count,
            total_cost: count as f64 * 100.0,
            total_net_book_value: 0.0,
        }
    }

    #[test]
    fn bar_chart_has_one_rect_per_group() {
        let groups = vec![group("Riyadh", 3), group("Jeddah", 1)];
        let svg = group_chart_svg(&groups, &GraphOptions::default()).unwrap();
        assert!(svg.contains("<svg"));
        // background + two bars
        assert_eq!(svg.matches("<rect").count(), 3);
    }

    #[test]
    fn empty_or_zero_groups_render_baseline_only() {
        let options = GraphOptions {
            metric: ChartMetric::NetBookValue,
            ..GraphOptions::default()
        };
        let svg = group_chart_svg(&[group("A", 2)], &options).unwrap();
        assert_eq!(svg.matches("<rect").count(), 1);
        assert!(group_chart_svg(&[], &options).is_ok());
    }

    #[test]
    fn marker_bitmap_has_expected_size_and_red_centre() {
        let coords = Coordinates { lat: 0.0, lon: 0.0 };
        let (w, h) = (120u32, 60u32);
        let pixels = location_marker_rgb(coords, w, h).unwrap();
        assert_eq!(pixels.len(), (w * h * 3) as usize);

        let (cx, cy) = (((w - 1) as f64 / 2.0).round() as usize, ((h - 1) as f64 / 2.0).round() as usize);
        let at = (cy * w as usize + cx) * 3;
        assert_eq!(&pixels[at..at + 3], &[214, 39, 40]);
    }

    #[test]
    fn marker_svg_contains_circle() {
        let svg = location_marker_svg(Coordinates { lat: 24.7, lon: 46.6 }, 160, 80).unwrap();
        assert!(svg.contains("<circle"));
    }
}
