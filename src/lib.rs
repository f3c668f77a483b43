/*!
# Asset Register

A browser for fixed-asset registers exported from Excel, built in Rust.

## Overview

A register is uploaded as an `.xlsx`/`.xls` workbook (or CSV) whose first row
holds a title and whose second row holds the column names. Headers are mapped
onto a fixed set of canonical fields through Arabic and English aliases, so
registers from different entities can be searched, filtered, summarised and
exported the same way.

## Architecture

### Data Layer
- **loader**: Reads the first worksheet into a [`dataset::Dataset`]
- **columns**: Canonical fields, alias tables and header resolution
- **value**: Cell values, lenient number parsing and amount formatting
- **coordinates**: `"lat,lon"` parsing for the location marker

### Query Layer
- **filter**: Free-text search, exact filters and pagination
- **summary**: Financial totals and group breakdowns
- **detail**: Labeled field groups for one asset
- **assistant**: Keyword-driven answers to questions about the register

### Export Layer
- **downloader**: CSV and XLSX tables, XLSX data sheets
- **report**: HTML documents rendered with handlebars
- **pdf**: Printable data sheets with location marker and QR code
- **graph**: Bar charts and location markers via plotters
- **qr**: QR symbol of the asset identifier

### Web Layer (feature `web`)
- **session**: Per-browser register storage
- **app**: Routing, upload, pages, downloads and JSON API

## Failure handling

Loading can fail with an [`error::AppError`]. Everything after loading is
lenient: an unmapped field is left out, a non-numeric amount counts as
missing and unparseable coordinates simply produce no marker. An export either
produces a complete document or an error, never a partial file.
*/

pub mod assistant;
pub mod columns;
pub mod config;
pub mod coordinates;
pub mod dataset;
pub mod detail;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod graph;
pub mod loader;
pub mod pdf;
pub mod qr;
pub mod report;
pub mod summary;
pub mod value;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod session;

pub use columns::{CanonicalField, ColumnMap, resolve_columns};
pub use coordinates::{Coordinates, parse_coordinates};
pub use dataset::Dataset;
pub use error::{AppError, Result};
