use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::assistant;
use crate::columns::{CanonicalField, ColumnMap, resolve_columns};
use crate::config::Settings;
use crate::dataset::{AssetRecord, Dataset};
use crate::detail::{AssetDetail, build_details};
use crate::downloader::{details_to_xlsx, table_to_csv, table_to_xlsx};
use crate::error::{AppError, Result};
use crate::filter::{Page, RowFilter, distinct_values};
use crate::loader::load_register_bytes;
use crate::pdf::{PdfOptions, assets_to_pdf};
use crate::report::{AssetView, REPORT_GROUP_FIELD, Reports, SummaryBlock};
use crate::session::{SESSION_COOKIE, Session, SessionStore};
use crate::summary::{group_by, summarize};

const XLSX_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Filters with their query parameter names, in form order.
const FILTER_FIELDS: [(&str, CanonicalField); 3] = [
    ("city", CanonicalField::City),
    ("region", CanonicalField::Region),
    ("group", CanonicalField::AccountingGroupDesc),
];

pub struct AppState {
    pub sessions: SessionStore,
    pub reports: Reports,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(AppState {
            sessions: SessionStore::new(Duration::from_secs(settings.session_ttl_secs)),
            reports: Reports::new()?,
            settings,
        })
    }
}

/// Search, filters and paging shared by the table page, exports and APIs.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetQuery {
    pub q: String,
    pub city: String,
    pub region: String,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing)]
    pub ask: Option<String>,
    #[serde(skip_serializing)]
    pub qr: Option<bool>,
    #[serde(skip_serializing)]
    pub map: Option<bool>,
}

impl AssetQuery {
    fn filter(&self) -> RowFilter {
        FILTER_FIELDS
            .iter()
            .fold(RowFilter::search(self.q.clone()), |f, (name, field)| {
                f.with_equals(*field, self.value_of(name))
            })
    }

    fn value_of(&self, name: &str) -> &str {
        match name {
            "city" => &self.city,
            "region" => &self.region,
            "group" => &self.group,
            _ => "",
        }
    }

    /// Query string with the search and filters, plus `page` when given.
    fn to_query_string(&self, page: Option<usize>) -> String {
        let mut parts: Vec<String> = [("q", self.q.as_str())]
            .into_iter()
            .chain(FILTER_FIELDS.iter().map(|(name, _)| (*name, self.value_of(name))))
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        if let Some(page) = page {
            parts.push(format!("page={}", page));
        }
        parts.join("&")
    }

    /// Human-readable description of the active filters.
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.q.trim().is_empty() {
            parts.push(format!("search: {}", self.q.trim()));
        }
        for (name, field) in FILTER_FIELDS {
            let value = self.value_of(name);
            if !value.trim().is_empty() {
                parts.push(format!("{}: {}", field.label(), value.trim()));
            }
        }
        parts.join(", ")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            e if e.is_user_error() => StatusCode::BAD_REQUEST,
            AppError::AssetNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the router with every page, export and API route.
pub fn router(state: Arc<AppState>) -> Router {
    let max_upload = state.settings.max_upload_bytes;

    Router::new()
        .route("/", get(serve_upload))
        .route("/upload", post(handle_upload))
        .route("/assets", get(serve_assets))
        .route("/assets/:id", get(serve_asset))
        .route("/columns", get(serve_columns).post(update_columns))
        .route("/export/table.xlsx", get(export_table_xlsx))
        .route("/export/table.csv", get(export_table_csv))
        .route("/export/table.html", get(export_table_html))
        .route("/export/assets.pdf", get(export_assets_pdf))
        .route("/export/assets.html", get(export_assets_html))
        .route("/export/assets.xlsx", get(export_assets_xlsx))
        .route("/export/asset/:id/:format", get(export_asset))
        .route("/api/summary", get(api_summary))
        .route("/api/assets", get(api_assets))
        .route("/api/ask", post(api_ask))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_upload)),
        )
        .with_state(state)
}

pub async fn run(settings: Settings) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bind = settings.bind.clone();
    let state = Arc::new(AppState::new(settings)?);
    let app = router(state);

    let listener = TcpListener::bind(&bind).await?;
    log::info!("listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn current_session(state: &AppState, jar: &CookieJar) -> Option<Session> {
    jar.get(SESSION_COOKIE).and_then(|c| state.sessions.get(c.value()))
}

fn no_register() -> Response {
    (StatusCode::NOT_FOUND, "no register loaded").into_response()
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Export(format!("worker failed: {}", e)))?
}

fn download(bytes: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    let disposition = format!("attachment; filename*=UTF-8''{}", urlencoding::encode(file_name));
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

fn file_stem(dataset: &Dataset) -> String {
    std::path::Path::new(&dataset.source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "register".to_string())
}

/// Path key of a record: its identifier, or `row-N` when it has none.
fn asset_key(dataset: &Dataset, columns: &ColumnMap, index: usize, record: &AssetRecord) -> String {
    let id = dataset.text(record, columns.get(CanonicalField::AssetUniqueNo));
    if id.is_empty() { format!("row-{}", index + 1) } else { id }
}

fn find_asset(dataset: &Dataset, columns: &ColumnMap, key: &str) -> Result<usize> {
    let by_id = columns
        .get(CanonicalField::AssetUniqueNo)
        .and_then(|col| dataset.find_by_id(col, key));
    let by_row = || {
        key.strip_prefix("row-")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .filter(|i| *i < dataset.len())
    };
    by_id.or_else(by_row).ok_or_else(|| AppError::AssetNotFound(key.to_string()))
}

#[derive(Serialize)]
struct UploadPage {
    error: Option<String>,
    header_row_display: usize,
    source_name: Option<String>,
}

fn upload_page(state: &AppState, error: Option<String>, source_name: Option<String>) -> Result<Html<String>> {
    let page = UploadPage {
        error,
        header_row_display: state.settings.header_row + 1,
        source_name,
    };
    Ok(Html(state.reports.render("upload", &page)?))
}

async fn serve_upload(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Html<String>> {
    let source = current_session(&state, &jar).map(|s| s.dataset.source_name.clone());
    upload_page(&state, None, source)
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Load(e.to_string()))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload.xlsx").to_string();
            let bytes = field.bytes().await.map_err(|e| AppError::Load(e.to_string()))?;
            upload = Some((name, bytes.to_vec()));
        }
    }

    let Some((name, bytes)) = upload else {
        let page = upload_page(&state, Some("No file received".to_string()), None)?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    };

    let header_row = state.settings.header_row;
    let loaded = tokio::task::spawn_blocking(move || load_register_bytes(&name, bytes, header_row))
        .await
        .map_err(|e| AppError::Load(format!("worker failed: {}", e)))?;

    match loaded {
        Ok(dataset) => {
            let columns = resolve_columns(&dataset.columns);
            let existing = jar
                .get(SESSION_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|id| state.sessions.get(id).is_some());
            let session_id = state.sessions.store(existing.as_deref(), dataset, columns);
            let cookie = Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true);
            Ok((jar.add(cookie), Redirect::to("/assets")).into_response())
        }
        Err(e) if e.is_user_error() => {
            log::warn!("upload rejected: {}", e);
            let page = upload_page(&state, Some(e.to_string()), None)?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e),
    }
}

#[derive(Serialize)]
struct OptionView {
    value: String,
    selected: bool,
}

#[derive(Serialize)]
struct FilterView {
    name: &'static str,
    label: String,
    options: Vec<OptionView>,
}

#[derive(Serialize)]
struct HiddenField {
    name: &'static str,
    value: String,
}

#[derive(Serialize)]
struct RowView {
    link: String,
    cells: Vec<String>,
}

#[derive(Serialize)]
struct AssetsPage<'a> {
    source_name: &'a str,
    query: &'a AssetQuery,
    query_string: String,
    filters: Vec<FilterView>,
    hidden_filters: Vec<HiddenField>,
    page: Page,
    columns: &'a [String],
    column_span: usize,
    rows: Vec<RowView>,
    prev_link: Option<String>,
    next_link: Option<String>,
    question: String,
    answer: Option<String>,
    #[serde(flatten)]
    block: SummaryBlock,
}

fn options(values: Vec<String>, current: &str) -> Vec<OptionView> {
    values
        .into_iter()
        .map(|value| OptionView {
            selected: value == current,
            value,
        })
        .collect()
}

async fn serve_assets(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(Redirect::to("/").into_response());
    };
    let (dataset, columns) = (session.dataset.as_ref(), &session.columns);

    let rows = query.filter().apply(dataset, columns);
    let page = Page::new(rows.len(), query.page.unwrap_or(1), state.settings.page_size);

    let row_views = page
        .slice(&rows)
        .iter()
        .filter_map(|&i| dataset.records.get(i).map(|r| (i, r)))
        .map(|(i, record)| RowView {
            link: format!("/assets/{}", urlencoding::encode(&asset_key(dataset, columns, i, record))),
            cells: record.values.iter().map(|v| v.to_string()).collect(),
        })
        .collect();

    let filters = FILTER_FIELDS
        .iter()
        .filter_map(|(name, field)| {
            let column = columns.get(*field)?;
            Some(FilterView {
                name: *name,
                label: format!("{} / {}", field.arabic_label(), field.label()),
                options: options(distinct_values(dataset, column), query.value_of(name)),
            })
        })
        .collect();

    // The assistant form re-submits the active filters so answers cover the shown rows.
    let hidden_filters = FILTER_FIELDS
        .iter()
        .map(|(name, _)| (*name, query.value_of(name)))
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(name, value)| HiddenField {
            name,
            value: value.to_string(),
        })
        .collect();

    let question = query.ask.clone().unwrap_or_default();
    let answer = (!question.trim().is_empty())
        .then(|| assistant::answer(&question, dataset, columns, &rows).text);

    let view = AssetsPage {
        source_name: &dataset.source_name,
        query: &query,
        query_string: query.to_query_string(None),
        filters,
        hidden_filters,
        page,
        columns: &dataset.columns,
        column_span: dataset.columns.len() + 1,
        rows: row_views,
        prev_link: page
            .has_prev()
            .then(|| format!("/assets?{}", query.to_query_string(Some(page.number - 1)))),
        next_link: page
            .has_next()
            .then(|| format!("/assets?{}", query.to_query_string(Some(page.number + 1)))),
        question,
        answer,
        block: SummaryBlock::build(dataset, columns, &rows, REPORT_GROUP_FIELD)?,
    };
    Ok(Html(state.reports.render("assets", &view)?).into_response())
}

#[derive(Serialize)]
struct AssetPage {
    source_name: String,
    asset_path: String,
    asset: AssetView,
}

async fn serve_asset(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(Redirect::to("/").into_response());
    };
    let dataset = session.dataset.as_ref();
    let index = find_asset(dataset, &session.columns, &id)?;
    let detail = AssetDetail::build(dataset, &session.columns, &dataset.records[index]);

    let view = AssetPage {
        source_name: dataset.source_name.clone(),
        asset_path: urlencoding::encode(&id).into_owned(),
        asset: AssetView::build(&detail, state.settings.include_qr, state.settings.include_map)?,
    };
    Ok(Html(state.reports.render("asset_page", &view)?).into_response())
}

#[derive(Serialize)]
struct FieldView {
    label: &'static str,
    arabic_label: &'static str,
    options: Vec<OptionView>,
}

#[derive(Serialize)]
struct ColumnsPage<'a> {
    source_name: &'a str,
    error: Option<String>,
    fields: Vec<FieldView>,
}

fn columns_page(state: &AppState, dataset: &Dataset, columns: &ColumnMap, error: Option<String>) -> Result<Html<String>> {
    let fields = CanonicalField::ALL
        .iter()
        .map(|field| FieldView {
            label: field.label(),
            arabic_label: field.arabic_label(),
            options: options(dataset.columns.clone(), columns.get(*field).unwrap_or("")),
        })
        .collect();
    let view = ColumnsPage {
        source_name: &dataset.source_name,
        error,
        fields,
    };
    Ok(Html(state.reports.render("columns", &view)?))
}

async fn serve_columns(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(Redirect::to("/").into_response());
    };
    Ok(columns_page(&state, &session.dataset, &session.columns, None)?.into_response())
}

async fn update_columns(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Response> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(Redirect::to("/").into_response());
    };
    let Some(session) = state.sessions.get(cookie.value()) else {
        return Ok(Redirect::to("/").into_response());
    };

    let mut columns = session.columns.clone();
    for field in CanonicalField::ALL {
        let choice = form
            .get(field.label())
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty());
        if let Err(e) = columns.set(&session.dataset, field, choice) {
            let page = columns_page(&state, &session.dataset, &session.columns, Some(e.to_string()))?;
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
    }

    state.sessions.set_columns(cookie.value(), columns);
    log::info!("column mapping updated for {}", session.dataset.source_name);
    Ok(Redirect::to("/assets").into_response())
}

#[derive(Clone, Copy)]
enum TableFormat {
    Xlsx,
    Csv,
    Html,
}

async fn export_table(state: Arc<AppState>, jar: CookieJar, query: AssetQuery, format: TableFormat) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(no_register());
    };
    let stem = file_stem(&session.dataset);
    let rows = query.filter().apply(&session.dataset, &session.columns);

    let response = match format {
        TableFormat::Xlsx => {
            let bytes = blocking(move || table_to_xlsx(&session.dataset, &rows)).await?;
            download(bytes, XLSX_TYPE, &format!("{}_assets.xlsx", stem))
        }
        TableFormat::Csv => {
            let csv = table_to_csv(&session.dataset, &rows)?;
            download(csv.into_bytes(), "text/csv; charset=utf-8", &format!("{}_assets.csv", stem))
        }
        TableFormat::Html => {
            let title = format!("{} - Asset register", stem);
            let html = blocking(move || {
                state
                    .reports
                    .table_report(&session.dataset, &session.columns, &rows, &title, &query.describe())
            })
            .await?;
            download(html.into_bytes(), "text/html; charset=utf-8", &format!("{}_assets.html", stem))
        }
    };
    Ok(response)
}

async fn export_table_xlsx(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_table(state, jar, query, TableFormat::Xlsx).await
}

async fn export_table_csv(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_table(state, jar, query, TableFormat::Csv).await
}

async fn export_table_html(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_table(state, jar, query, TableFormat::Html).await
}

#[derive(Clone, Copy)]
enum SheetFormat {
    Pdf,
    Html,
    Xlsx,
}

impl SheetFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pdf" => Some(SheetFormat::Pdf),
            "html" => Some(SheetFormat::Html),
            "xlsx" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }
}

/// Render asset data sheets and wrap them as a download.
async fn sheets_download(
    state: Arc<AppState>,
    details: Vec<AssetDetail>,
    format: SheetFormat,
    query: &AssetQuery,
    stem: &str,
) -> Result<Response> {
    let include_qr = query.qr.unwrap_or(state.settings.include_qr);
    let include_map = query.map.unwrap_or(state.settings.include_map);

    let response = match format {
        SheetFormat::Pdf => {
            let options = PdfOptions {
                include_qr,
                include_map,
                ..PdfOptions::default()
            };
            let bytes = blocking(move || assets_to_pdf(&details, &options)).await?;
            download(bytes, "application/pdf", &format!("{}.pdf", stem))
        }
        SheetFormat::Html => {
            let html = blocking(move || state.reports.asset_report(&details, include_qr, include_map)).await?;
            download(html.into_bytes(), "text/html; charset=utf-8", &format!("{}.html", stem))
        }
        SheetFormat::Xlsx => {
            let bytes = blocking(move || details_to_xlsx(&details)).await?;
            download(bytes, XLSX_TYPE, &format!("{}.xlsx", stem))
        }
    };
    Ok(response)
}

async fn export_assets(state: Arc<AppState>, jar: CookieJar, query: AssetQuery, format: SheetFormat) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(no_register());
    };
    let rows = query.filter().apply(&session.dataset, &session.columns);
    let details = build_details(&session.dataset, &session.columns, &rows);
    let stem = format!("{}_sheets", file_stem(&session.dataset));
    sheets_download(state, details, format, &query, &stem).await
}

async fn export_assets_pdf(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_assets(state, jar, query, SheetFormat::Pdf).await
}

async fn export_assets_html(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_assets(state, jar, query, SheetFormat::Html).await
}

async fn export_assets_xlsx(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    export_assets(state, jar, query, SheetFormat::Xlsx).await
}

async fn export_asset(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path((id, format)): Path<(String, String)>,
    Query(query): Query<AssetQuery>,
) -> Result<Response> {
    let Some(session) = current_session(&state, &jar) else {
        return Ok(no_register());
    };
    let Some(format) = SheetFormat::parse(&format) else {
        return Ok((StatusCode::NOT_FOUND, format!("unknown export format '{}'", format)).into_response());
    };
    let index = find_asset(&session.dataset, &session.columns, &id)?;
    let details = build_details(&session.dataset, &session.columns, &[index]);
    sheets_download(state, details, format, &query, &format!("asset_{}", id)).await
}

async fn api_summary(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return no_register();
    };
    let rows = query.filter().apply(&session.dataset, &session.columns);
    Json(serde_json::json!({
        "source_name": session.dataset.source_name,
        "summary": summarize(&session.dataset, &session.columns, &rows),
        "by_city": group_by(&session.dataset, &session.columns, &rows, CanonicalField::City),
        "columns": session.columns,
    }))
    .into_response()
}

async fn api_assets(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<AssetQuery>,
) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return no_register();
    };
    let dataset = session.dataset.as_ref();
    let rows = query.filter().apply(dataset, &session.columns);
    let page = Page::new(rows.len(), query.page.unwrap_or(1), state.settings.page_size);

    let records: Vec<serde_json::Value> = page
        .slice(&rows)
        .iter()
        .filter_map(|&i| dataset.records.get(i).map(|r| (i, r)))
        .map(|(i, record)| {
            let values: serde_json::Map<String, serde_json::Value> = dataset
                .columns
                .iter()
                .zip(&record.values)
                .map(|(c, v)| (c.clone(), serde_json::to_value(v).unwrap_or_default()))
                .collect();
            serde_json::json!({
                "key": asset_key(dataset, &session.columns, i, record),
                "values": values,
            })
        })
        .collect();

    Json(serde_json::json!({ "page": page, "records": records })).into_response()
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    filter: AssetQuery,
}

async fn api_ask(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<AskRequest>,
) -> Response {
    let Some(session) = current_session(&state, &jar) else {
        return no_register();
    };
    let rows = request.filter.filter().apply(&session.dataset, &session.columns);
    Json(assistant::answer(&request.question, &session.dataset, &session.columns, &rows)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOUNDARYX";

    fn app() -> Router {
        router(Arc::new(AppState::new(Settings::default()).unwrap()))
    }

    fn upload_request(file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );
        Request::post("/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    const REGISTER: &str = "Asset register\nUnique Asset Number,Asset Description,City,Cost\nA-1,Pump,Riyadh,100\nA-2,Desk,Jeddah,50\n";

    async fn session_cookie(app: &Router) -> String {
        let response = app.clone().oneshot(upload_request("r.csv", REGISTER)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn get(uri: &str, cookie: &str) -> Request<Body> {
        Request::get(uri).header(header::COOKIE, cookie).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn pages_without_register_redirect_and_apis_404() {
        let app = app();
        let response = app.clone().oneshot(get("/assets", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let response = app.clone().oneshot(get("/api/summary", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_then_browse_and_summarise() {
        let app = app();
        let cookie = session_cookie(&app).await;
        assert!(cookie.starts_with("asset_session="));

        let page = body_text(app.clone().oneshot(get("/assets?q=pump", &cookie)).await.unwrap()).await;
        assert!(page.contains("Pump"));
        assert!(!page.contains("Desk"));

        let response = app.clone().oneshot(get("/api/summary?city=Jeddah", &cookie)).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["summary"]["count"], 1);
        assert_eq!(json["summary"]["total_cost"], 50.0);

        let response = app.oneshot(get("/assets/A-2", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn assistant_answers_within_active_filters() {
        let app = app();
        let cookie = session_cookie(&app).await;

        let page = body_text(
            app.oneshot(get("/assets?city=Jeddah&ask=how%20many%20assets", &cookie))
                .await
                .unwrap(),
        )
        .await;
        assert!(page.contains(r#"<input type="hidden" name="city" value="Jeddah">"#));
        assert!(!page.contains(r#"name="region" value"#));
        assert!(page.contains("Assets: 1 "));
    }

    #[tokio::test]
    async fn bad_upload_is_a_client_error() {
        let response = app().oneshot(upload_request("notes.txt", "hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("unsupported file extension"));
    }

    #[tokio::test]
    async fn exports_are_attachments() {
        let app = app();
        let cookie = session_cookie(&app).await;

        let response = app.clone().oneshot(get("/export/asset/A-1/pdf", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename*=UTF-8''asset_A-1.pdf"
        );
        assert!(body_text(response).await.starts_with("%PDF"));

        let response = app.clone().oneshot(get("/export/table.csv?city=Riyadh", &cookie)).await.unwrap();
        assert_eq!(body_text(response).await, "Unique Asset Number,Asset Description,City,Cost\nA-1,Pump,Riyadh,100\n");

        let response = app.oneshot(get("/export/asset/Z-9/pdf", &cookie)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn query_string_skips_blank_filters() {
        let query = AssetQuery {
            q: "pump 2".into(),
            city: "الرياض".into(),
            ..AssetQuery::default()
        };
        assert_eq!(
            query.to_query_string(Some(3)),
            "q=pump%202&city=%D8%A7%D9%84%D8%B1%D9%8A%D8%A7%D8%B6&page=3"
        );
        assert_eq!(query.describe(), "search: pump 2, City: الرياض");
    }
}
