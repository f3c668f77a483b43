#![cfg(not(tarpaulin_include))]

use asset_register::assistant::answer;
use asset_register::columns::{CanonicalField, ColumnMap, resolve_columns};
use asset_register::dataset::Dataset;
use asset_register::detail::build_details;
use asset_register::downloader::{details_to_xlsx, table_to_csv, table_to_xlsx};
use asset_register::error::{AppError, Result};
use asset_register::filter::RowFilter;
use asset_register::loader::{DEFAULT_HEADER_ROW, load_register};
use asset_register::pdf::{PdfOptions, assets_to_pdf};
use asset_register::report::Reports;
use asset_register::summary::{group_by, summarize};
use asset_register::value::format_amount;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Offline tool for fixed-asset registers
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Zero-based sheet row holding the column names
    #[arg(long, global = true, default_value_t = DEFAULT_HEADER_ROW, env = "ASSET_REGISTER_HEADER_ROW")]
    header_row: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show how the file's headers map onto canonical fields
    Columns { file: PathBuf },

    /// Print matching assets
    List {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print financial totals, optionally grouped by a field
    Summary {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Canonical field to group by, e.g. "City"
        #[arg(long)]
        by: Option<String>,
    },

    /// Export the (filtered) table
    Export {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum)]
        format: TableFormat,
        #[arg(long)]
        out: PathBuf,
    },

    /// Export the data sheet of one asset
    Asset {
        file: PathBuf,
        /// Unique asset number
        #[arg(long)]
        id: String,
        #[arg(long, value_enum, default_value_t = SheetFormat::Pdf)]
        format: SheetFormat,
        #[arg(long)]
        out: PathBuf,
        /// Leave out the QR code
        #[arg(long)]
        no_qr: bool,
        /// Leave out the location marker
        #[arg(long)]
        no_map: bool,
    },

    /// Ask the assistant a question about the register
    Ask { file: PathBuf, question: String },
}

#[derive(Args)]
struct FilterArgs {
    /// Search text over asset number, tag and description
    #[arg(short, long, default_value = "")]
    q: String,

    /// Exact city
    #[arg(long, default_value = "")]
    city: String,
}

impl FilterArgs {
    fn apply(&self, dataset: &Dataset, columns: &ColumnMap) -> Vec<usize> {
        RowFilter::search(self.q.clone())
            .with_equals(CanonicalField::City, self.city.clone())
            .apply(dataset, columns)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum TableFormat {
    Xlsx,
    Csv,
    Html,
}

#[derive(Clone, Copy, ValueEnum)]
enum SheetFormat {
    Pdf,
    Html,
    Xlsx,
}

fn load(file: &Path, header_row: usize) -> Result<(Dataset, ColumnMap)> {
    let dataset = load_register(file, header_row)?;
    let columns = resolve_columns(&dataset.columns);
    Ok((dataset, columns))
}

// The document is complete before anything touches the disk.
fn write_output(out: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(out, bytes)?;
    println!("wrote {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Columns { file } => {
            let (_, columns) = load(&file, cli.header_row)?;
            for (field, column) in columns.iter() {
                println!("{:<26} {}", field.label(), column.unwrap_or("-"));
            }
            println!("{}/{} fields matched", columns.matched_count(), CanonicalField::ALL.len());
        }
        Command::List { file, filter, limit } => {
            let (dataset, columns) = load(&file, cli.header_row)?;
            let rows = filter.apply(&dataset, &columns);
            let shown = [
                CanonicalField::AssetUniqueNo,
                CanonicalField::Description,
                CanonicalField::City,
                CanonicalField::Cost,
            ];
            for record in rows.iter().take(limit).filter_map(|&i| dataset.records.get(i)) {
                let cells: Vec<String> = shown
                    .iter()
                    .map(|f| dataset.text(record, columns.get(*f)))
                    .collect();
                println!("{}", cells.join(" | "));
            }
            println!("{} of {} assets match", rows.len(), dataset.len());
        }
        Command::Summary { file, filter, by } => {
            let (dataset, columns) = load(&file, cli.header_row)?;
            let rows = filter.apply(&dataset, &columns);
            let s = summarize(&dataset, &columns, &rows);
            println!("assets                    {}", s.count);
            println!("cost                      {}", format_amount(s.total_cost));
            println!("accumulated depreciation  {}", format_amount(s.total_accumulated_depreciation));
            println!("residual value            {}", format_amount(s.total_residual_value));
            println!("net book value            {}", format_amount(s.total_net_book_value));
            if let Some(ratio) = s.depreciation_ratio {
                println!("depreciated               {:.1}%", ratio * 100.0);
            }
            if let Some(by) = by {
                let field: CanonicalField = by.parse()?;
                for g in group_by(&dataset, &columns, &rows, field) {
                    println!("{:<30} {:>6} {:>18}", g.key, g.count, format_amount(g.total_cost));
                }
            }
        }
        Command::Export { file, filter, format, out } => {
            let (dataset, columns) = load(&file, cli.header_row)?;
            let rows = filter.apply(&dataset, &columns);
            let bytes = match format {
                TableFormat::Xlsx => table_to_xlsx(&dataset, &rows)?,
                TableFormat::Csv => table_to_csv(&dataset, &rows)?.into_bytes(),
                TableFormat::Html => Reports::new()?
                    .table_report(&dataset, &columns, &rows, &dataset.source_name, &filter.q)?
                    .into_bytes(),
            };
            write_output(&out, &bytes)?;
        }
        Command::Asset { file, id, format, out, no_qr, no_map } => {
            let (dataset, columns) = load(&file, cli.header_row)?;
            let index = columns
                .get(CanonicalField::AssetUniqueNo)
                .and_then(|col| dataset.find_by_id(col, &id))
                .ok_or_else(|| AppError::AssetNotFound(id.clone()))?;
            let details = build_details(&dataset, &columns, &[index]);
            let bytes = match format {
                SheetFormat::Pdf => {
                    let options = PdfOptions {
                        include_qr: !no_qr,
                        include_map: !no_map,
                        ..PdfOptions::default()
                    };
                    assets_to_pdf(&details, &options)?
                }
                SheetFormat::Html => Reports::new()?.asset_report(&details, !no_qr, !no_map)?.into_bytes(),
                SheetFormat::Xlsx => details_to_xlsx(&details)?,
            };
            write_output(&out, &bytes)?;
        }
        Command::Ask { file, question } => {
            let (dataset, columns) = load(&file, cli.header_row)?;
            let rows: Vec<usize> = (0..dataset.len()).collect();
            println!("{}", answer(&question, &dataset, &columns, &rows).text);
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
