use crate::columns::{CanonicalField, ColumnMap};
use crate::dataset::Dataset;
use crate::detail::{AssetDetail, DetailGroup};
use crate::error::Result;
use crate::graph::{GraphOptions, bar_css_color, group_chart_svg, location_marker_svg};
use crate::qr::QrMatrix;
use crate::summary::{GroupTotal, Summary, group_by, summarize};
use crate::value::format_amount;
use handlebars::Handlebars;
use serde::Serialize;

const MAP_SIZE: (u32, u32) = (320, 160);
const QR_PIXELS: u32 = 140;

/// Field the report's group chart breaks totals down by.
pub const REPORT_GROUP_FIELD: CanonicalField = CanonicalField::City;

/// Summary figures formatted for display.
#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub count: String,
    pub total_cost: String,
    pub total_accumulated_depreciation: String,
    pub total_residual_value: String,
    pub total_net_book_value: String,
    pub depreciation_ratio: Option<String>,
}

impl From<&Summary> for SummaryView {
    fn from(s: &Summary) -> Self {
        SummaryView {
            count: s.count.to_string(),
            total_cost: format_amount(s.total_cost),
            total_accumulated_depreciation: format_amount(s.total_accumulated_depreciation),
            total_residual_value: format_amount(s.total_residual_value),
            total_net_book_value: format_amount(s.total_net_book_value),
            depreciation_ratio: s.depreciation_ratio.map(|r| format!("{:.1}%", r * 100.0)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub key: String,
    pub count: usize,
    pub total_cost: String,
    pub total_net_book_value: String,
    pub color: String,
}

/// Totals block shared by the table report and the web table page.
#[derive(Debug, Serialize)]
pub struct SummaryBlock {
    pub summary: SummaryView,
    pub groups: Vec<GroupView>,
    pub chart_svg: String,
    pub group_title: String,
    pub group_field: String,
}

impl SummaryBlock {
    /// Summarise `rows` and chart them grouped by `field`.
    ///
    /// The chart and legend are left empty when `field` is unmapped.
    pub fn build(dataset: &Dataset, columns: &ColumnMap, rows: &[usize], field: CanonicalField) -> Result<Self> {
        let summary = summarize(dataset, columns, rows);
        let options = GraphOptions::default();
        let totals: Vec<GroupTotal> = group_by(dataset, columns, rows, field)
            .into_iter()
            .take(options.max_bars)
            .collect();
        let chart_svg = if totals.is_empty() { String::new() } else { group_chart_svg(&totals, &options)? };

        let groups = totals
            .iter()
            .enumerate()
            .map(|(i, g)| GroupView {
                key: g.key.clone(),
                count: g.count,
                total_cost: format_amount(g.total_cost),
                total_net_book_value: format_amount(g.total_net_book_value),
                color: bar_css_color(i),
            })
            .collect();

        Ok(SummaryBlock {
            summary: SummaryView::from(&summary),
            groups,
            chart_svg,
            group_title: format!("{} / {}", field.arabic_label(), field.label()),
            group_field: field.label().to_string(),
        })
    }
}

/// The selected rows as display strings, every dataset column included.
#[derive(Debug, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

impl TableView {
    pub fn build(dataset: &Dataset, rows: &[usize]) -> Self {
        let rows: Vec<Vec<String>> = rows
            .iter()
            .filter_map(|&i| dataset.records.get(i))
            .map(|r| r.values.iter().map(|v| v.to_string()).collect())
            .collect();
        TableView {
            columns: dataset.columns.clone(),
            row_count: rows.len(),
            rows,
        }
    }
}

/// One asset data sheet with its optional inline visuals.
#[derive(Debug, Serialize)]
pub struct AssetView {
    pub asset_id: Option<String>,
    pub title: String,
    pub groups: Vec<DetailGroup>,
    pub coordinates: Option<String>,
    pub map_svg: Option<String>,
    pub qr_svg: Option<String>,
    pub has_visuals: bool,
}

impl AssetView {
    pub fn build(detail: &AssetDetail, include_qr: bool, include_map: bool) -> Result<Self> {
        let map_svg = match (include_map, detail.coordinates) {
            (true, Some(coords)) => Some(location_marker_svg(coords, MAP_SIZE.0, MAP_SIZE.1)?),
            _ => None,
        };
        let qr_svg = match (include_qr, detail.asset_id.as_deref()) {
            (true, Some(id)) => Some(QrMatrix::encode(id)?.to_svg(QR_PIXELS)),
            _ => None,
        };
        Ok(AssetView {
            asset_id: detail.asset_id.clone(),
            title: detail.title.clone(),
            groups: detail.groups.clone(),
            coordinates: detail.coordinates.map(|c| format!("{:.6}, {:.6}", c.lat, c.lon)),
            has_visuals: map_svg.is_some() || qr_svg.is_some(),
            map_svg,
            qr_svg,
        })
    }
}

#[derive(Serialize)]
struct TableReport<'a> {
    title: &'a str,
    source_name: &'a str,
    generated_at: String,
    filter_text: &'a str,
    table: TableView,
    #[serde(flatten)]
    block: SummaryBlock,
}

#[derive(Serialize)]
struct AssetReport<'a> {
    title: &'a str,
    generated_at: String,
    assets: Vec<AssetView>,
}

/// Template registry for every HTML document the crate produces
///
/// Templates are compiled into the binary; values are HTML-escaped by the
/// engine except the pre-rendered SVG fragments.
pub struct Reports {
    registry: Handlebars<'static>,
}

impl Reports {
    /// Compile the bundled templates and partials.
    ///
    /// # Returns
    /// * The registry, or a template error if a template fails to parse
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        registry.register_partial("style", include_str!("templates/style.hbs"))?;
        registry.register_partial("nav", include_str!("templates/nav.hbs"))?;
        registry.register_partial("summary", include_str!("templates/summary.hbs"))?;
        registry.register_partial("asset_sheet", include_str!("templates/asset_sheet.hbs"))?;

        for (name, source) in [
            ("table_report", include_str!("templates/table_report.hbs")),
            ("asset_report", include_str!("templates/asset_report.hbs")),
            ("upload", include_str!("templates/upload.hbs")),
            ("assets", include_str!("templates/assets.hbs")),
            ("asset_page", include_str!("templates/asset_page.hbs")),
            ("columns", include_str!("templates/columns.hbs")),
        ] {
            registry.register_template_string(name, source)?;
        }
        Ok(Reports { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Standalone HTML document of the selected rows with totals and a city chart.
    pub fn table_report(
        &self,
        dataset: &Dataset,
        columns: &ColumnMap,
        rows: &[usize],
        title: &str,
        filter_text: &str,
    ) -> Result<String> {
        let data = TableReport {
            title,
            source_name: &dataset.source_name,
            generated_at: now(),
            filter_text,
            table: TableView::build(dataset, rows),
            block: SummaryBlock::build(dataset, columns, rows, REPORT_GROUP_FIELD)?,
        };
        let html = self.render("table_report", &data)?;
        log::info!("exported {} rows to html ({} bytes)", rows.len(), html.len());
        Ok(html)
    }

    /// Printable HTML document with one data sheet per asset.
    pub fn asset_report(&self, details: &[AssetDetail], include_qr: bool, include_map: bool) -> Result<String> {
        let assets = details
            .iter()
            .map(|d| AssetView::build(d, include_qr, include_map))
            .collect::<Result<Vec<_>>>()?;
        let title = match details {
            [single] => single.title.as_str(),
            _ => "Asset Data Sheets",
        };
        let html = self.render(
            "asset_report",
            &AssetReport {
                title,
                generated_at: now(),
                assets,
            },
        )?;
        log::info!("exported {} asset sheets to html ({} bytes)", details.len(), html.len());
        Ok(html)
    }
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::resolve_columns;
    use crate::detail::build_details;
    use crate::value::CellValue;

    fn register() -> Dataset {
        Dataset::prepare(
            "register.xlsx",
            vec![
                "Unique Asset Number".into(),
                "Asset Description".into(),
                "City".into(),
                "Cost".into(),
                "Accumulated Depreciation".into(),
                "Geographical Coordinates".into(),
            ],
            vec![
                vec![
                    CellValue::text("A-1"),
                    CellValue::text("<script>pump</script>"),
                    CellValue::text("Riyadh"),
                    CellValue::Number(1000.0),
                    CellValue::Number(250.0),
                    CellValue::text("24.7136,46.6753"),
                ],
                vec![
                    CellValue::text("A-2"),
                    CellValue::text("Generator"),
                    CellValue::text("Jeddah"),
                    CellValue::Number(500.0),
                    CellValue::Missing,
                    CellValue::text("not a place"),
                ],
            ],
        )
    }

    #[test]
    fn summary_view_formats_amounts_and_ratio() {
        let ds = register();
        let cols = resolve_columns(&ds.columns);
        let view = SummaryView::from(&summarize(&ds, &cols, &[0, 1]));
        assert_eq!(view.count, "2");
        assert_eq!(view.total_cost, "1,500.00");
        assert_eq!(view.depreciation_ratio.as_deref(), Some("16.7%"));
    }

    #[test]
    fn table_report_escapes_cell_values() {
        let ds = register();
        let cols = resolve_columns(&ds.columns);
        let html = Reports::new().unwrap().table_report(&ds, &cols, &[0, 1], "Register", "").unwrap();
        assert!(html.contains("&lt;script&gt;pump&lt;/script&gt;"));
        assert!(!html.contains("<script>pump"));
        assert!(html.contains("dir=\"rtl\""));
        assert!(html.contains("Riyadh"));
        assert!(html.contains("<svg"));
    }

    #[test]
    fn asset_report_embeds_visuals_only_when_available() {
        let ds = register();
        let cols = resolve_columns(&ds.columns);
        let details = build_details(&ds, &cols, &[0, 1]);

        let first = AssetView::build(&details[0], true, true).unwrap();
        assert!(first.map_svg.is_some());
        assert!(first.qr_svg.is_some());

        let second = AssetView::build(&details[1], false, true).unwrap();
        assert!(second.map_svg.is_none());
        assert!(second.qr_svg.is_none());
        assert!(!second.has_visuals);

        let html = Reports::new().unwrap().asset_report(&details, true, true).unwrap();
        assert_eq!(html.matches("class=\"asset-sheet\"").count(), 2);
    }

    #[test]
    fn empty_asset_report_shows_notice() {
        let html = Reports::new().unwrap().asset_report(&[], true, true).unwrap();
        assert!(html.contains("No matching assets."));
    }
}
