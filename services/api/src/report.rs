use crate::infra::parse_format;
use catalog_recon::config::{AppConfig, OutputFormat, SourcesConfig};
use catalog_recon::error::AppError;
use catalog_recon::relation::Relation;
use catalog_recon::telemetry;
use catalog_recon::workflows::catalog::{
    product_category_rows, CatalogSources, DanglingLink, ReconciliationSummary,
};
use clap::Args;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Directory holding the three CSV exports
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Products file name, relative to the data directory
    #[arg(long)]
    pub(crate) products: Option<String>,
    /// Categories file name, relative to the data directory
    #[arg(long)]
    pub(crate) categories: Option<String>,
    /// Product/category link file name, relative to the data directory
    #[arg(long)]
    pub(crate) links: Option<String>,
}

impl SourceArgs {
    fn apply(self, sources: &mut SourcesConfig) {
        if let Some(dir) = self.data_dir {
            sources.data_dir = dir;
        }
        if let Some(file) = self.products {
            sources.products_file = file;
        }
        if let Some(file) = self.categories {
            sources.categories_file = file;
        }
        if let Some(file) = self.links {
            sources.links_file = file;
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct ReconcileArgs {
    #[command(flatten)]
    pub(crate) sources: SourceArgs,
    /// Output format: table, json or csv
    #[arg(long, value_parser = parse_format)]
    pub(crate) format: Option<OutputFormat>,
    /// Print matched and orphan counts after the rows
    #[arg(long)]
    pub(crate) summary: bool,
}

fn load_sources(args: SourceArgs) -> Result<(AppConfig, CatalogSources), AppError> {
    let mut config = AppConfig::load()?;
    args.apply(&mut config.sources);
    telemetry::init(&config.telemetry)?;

    let files = config.sources.files();
    info!(
        products = %files.products.display(),
        categories = %files.categories.display(),
        links = %files.product_categories.display(),
        "loading catalog exports"
    );
    let sources = CatalogSources::load(&files)?;
    Ok((config, sources))
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let (config, sources) = load_sources(args.sources)?;
    let format = args.format.unwrap_or(config.output);

    let output = sources.reconcile()?;
    let dangling = sources.dangling_links()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_relation(&mut out, &output, format)?;
    if args.summary {
        let rows = product_category_rows(&output)?;
        write_summary(&mut out, &ReconciliationSummary::from_rows(&rows))?;
    }
    out.flush()?;

    let stderr = io::stderr();
    write_dangling(&mut stderr.lock(), &dangling)?;
    Ok(())
}

pub(crate) fn run_check(args: SourceArgs) -> Result<(), AppError> {
    let (_, sources) = load_sources(args)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (label, relation) in [
        ("products", &sources.products),
        ("categories", &sources.categories),
        ("product_categories", &sources.product_categories),
    ] {
        write_shape(&mut out, label, relation)?;
    }

    sources.validate()?;
    writeln!(out, "All inputs carry the required columns.")?;
    Ok(())
}

pub(crate) fn write_relation<W: Write>(
    out: &mut W,
    relation: &Relation,
    format: OutputFormat,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => write!(out, "{relation}")?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &relation.to_json_records())?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(&mut *out);
            writer.write_record(relation.schema().names())?;
            for row in relation.rows() {
                writer.write_record(row.iter().map(|value| {
                    if value.is_null() {
                        String::new()
                    } else {
                        value.to_string()
                    }
                }))?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, summary: &ReconciliationSummary) -> io::Result<()> {
    writeln!(
        out,
        "{} rows: {} matched, {} without a category",
        summary.total, summary.matched, summary.orphans
    )
}

fn write_shape<W: Write>(out: &mut W, label: &str, relation: &Relation) -> io::Result<()> {
    let columns: Vec<String> = relation
        .schema()
        .fields()
        .iter()
        .map(|field| format!("{} ({})", field.name, field.data_type))
        .collect();
    writeln!(
        out,
        "{label}: {} rows, columns {}",
        relation.len(),
        columns.join(", ")
    )
}

fn write_dangling<W: Write>(out: &mut W, dangling: &[DanglingLink]) -> io::Result<()> {
    for link in dangling {
        writeln!(
            out,
            "warning: link {} -> {} dropped ({})",
            link.product_id,
            link.category_id,
            link.missing.label()
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sources() -> CatalogSources {
        CatalogSources::from_csv_strings(
            "product_id,product_name\n1,Pen\n2,Mug\n",
            "category_id,category_name\n10,Office\n",
            "product_id,category_id\n1,10\n1,11\n",
        )
        .expect("csv loads")
    }

    fn render(relation: &Relation, format: OutputFormat) -> String {
        let mut buffer = Vec::new();
        write_relation(&mut buffer, relation, format).expect("render succeeds");
        String::from_utf8(buffer).expect("utf8 output")
    }

    #[test]
    fn csv_output_leaves_null_categories_empty() {
        let output = sample_sources().reconcile().expect("reconcile succeeds");
        assert_eq!(
            render(&output, OutputFormat::Csv),
            "product_name,category_name\nPen,Office\nMug,\n"
        );
    }

    #[test]
    fn json_output_uses_null_for_orphans() {
        let output = sample_sources().reconcile().expect("reconcile succeeds");
        let parsed: serde_json::Value =
            serde_json::from_str(&render(&output, OutputFormat::Json)).expect("valid json");
        assert_eq!(
            parsed,
            serde_json::json!([
                { "product_name": "Pen", "category_name": "Office" },
                { "product_name": "Mug", "category_name": null },
            ])
        );
    }

    #[test]
    fn summary_and_dangling_lines() {
        let sources = sample_sources();
        let output = sources.reconcile().expect("reconcile succeeds");
        let rows = product_category_rows(&output).expect("typed rows");

        let mut buffer = Vec::new();
        write_summary(&mut buffer, &ReconciliationSummary::from_rows(&rows)).expect("write");
        write_dangling(&mut buffer, &sources.dangling_links().expect("diagnostic runs"))
            .expect("write");

        assert_eq!(
            String::from_utf8(buffer).expect("utf8 output"),
            "2 rows: 1 matched, 1 without a category\n\
             warning: link 1 -> 11 dropped (unknown category)\n"
        );
    }

    #[test]
    fn shape_lists_inferred_column_types() {
        let sources = sample_sources();
        let mut buffer = Vec::new();
        write_shape(&mut buffer, "products", &sources.products).expect("write");
        assert_eq!(
            String::from_utf8(buffer).expect("utf8 output"),
            "products: 2 rows, columns product_id (int64), product_name (utf8)\n"
        );
    }
}
