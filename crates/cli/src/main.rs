use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use label_engine::{
    import_catalog, marker_names, ColumnMapping, DirAssetStore, DirTemplateStore, EngineConfig,
    LabelEngine, OutputFormat, Record, RenderRequest,
};
use numbering::{IdentifierGenerator, ProductAttributes, ProductClass, SqliteCounterStore};

#[derive(Parser, Debug)]
#[command(name = "bitpass", about = "Render drill-bit passports and labels", version)]
struct Cli {
    /// Engine configuration (JSON). Defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue document numbers from the counter database.
    Issue {
        /// SQLite counter database; created when missing.
        #[arg(long)]
        db: PathBuf,

        /// Product class (crown, reamer, shoe or any other name).
        #[arg(long, default_value = "crown")]
        class: String,

        #[arg(long)]
        matrix: Option<String>,

        /// Drilling depth, e.g. 05-07. Only crowns carry it.
        #[arg(long)]
        depth: Option<String>,

        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Production date (YYYY-MM-DD); today when absent.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Render a batch of records into one xlsx, docx or pdf file.
    Render {
        /// Directory holding `<id>.json` / `<id>.xlsx` templates.
        #[arg(long)]
        templates: PathBuf,

        #[arg(long)]
        template: String,

        /// xlsx, docx or pdf.
        #[arg(long)]
        format: String,

        /// JSON array of records.
        #[arg(long)]
        records: PathBuf,

        #[arg(long)]
        out: PathBuf,

        /// Directory holding named image assets such as the logo.
        #[arg(long, default_value = "assets")]
        assets: PathBuf,

        /// Counter database for records without a document number.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Number every unit from this value instead of the counter.
        #[arg(long)]
        manual_number: Option<String>,
    },

    /// Read a catalog workbook and print its products as JSON.
    ImportCatalog {
        #[arg(long)]
        input: PathBuf,

        /// standard or alfa-legacy.
        #[arg(long, default_value = "standard")]
        mapping: String,
    },

    /// Show a template's geometry and the variables it references.
    Inspect {
        #[arg(long)]
        templates: PathBuf,

        #[arg(long)]
        template: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn generator(db: &Path, config: &EngineConfig) -> Result<IdentifierGenerator<SqliteCounterStore>> {
    let store = SqliteCounterStore::open(db)
        .with_context(|| format!("failed to open counter database {}", db.display()))?;
    let numbering = &config.numbering;
    Ok(IdentifierGenerator::new(store)
        .with_prefix(numbering.prefix.as_str())
        .with_scope(numbering.scope.as_str())
        .with_default_matrix(numbering.default_matrix.as_str()))
}

fn issue(
    config: &EngineConfig,
    db: &Path,
    class: &str,
    matrix: Option<String>,
    depth: Option<String>,
    count: usize,
    date: Option<NaiveDate>,
) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let generator = generator(db, config)?;
    let class = ProductClass::from(class);
    let mut attrs = ProductAttributes::new();
    if let Some(matrix) = matrix {
        attrs = attrs.matrix(matrix);
    }
    if let Some(depth) = depth {
        attrs = attrs.drilling_depth(depth);
    }
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    for number in generator.issue_batch(date, &class, &attrs, count)? {
        println!("{}", number.as_str());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render(
    config: EngineConfig,
    templates: PathBuf,
    template: &str,
    format: &str,
    records: &Path,
    out: &Path,
    assets: PathBuf,
    db: Option<&Path>,
    manual_number: Option<String>,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;

    let json = fs::read_to_string(records)
        .with_context(|| format!("failed to read records {}", records.display()))?;
    let records: Vec<Record> = serde_json::from_str(&json)
        .with_context(|| format!("invalid records file {}", records.display()))?;

    let generator = db.map(|db| generator(db, &config)).transpose()?;
    let template_store = DirTemplateStore::new(templates);
    let asset_store = DirAssetStore::new(assets);

    let mut engine = LabelEngine::new(&template_store, &asset_store, config);
    if let Some(generator) = &generator {
        engine = engine.with_issuer(generator);
    }

    let mut request = RenderRequest::new(template, format, records);
    if let Some(number) = manual_number {
        request = request.with_manual_number(&number);
    }

    let output = engine.render(request)?;
    fs::write(out, &output.bytes).with_context(|| format!("failed to write {}", out.display()))?;

    for number in &output.minted {
        println!("{number}");
    }
    for issue in &output.issues {
        eprintln!("warning: {issue}");
    }
    eprintln!(
        "{} unit(s) on {} page(s) written to {}",
        output.units,
        output.pages,
        out.display()
    );
    Ok(())
}

fn import(input: &Path, mapping: &str) -> Result<()> {
    let mapping = ColumnMapping::by_name(mapping)?;
    let bytes = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let products = import_catalog(&bytes, &mapping)?;
    println!("{}", serde_json::to_string_pretty(&products)?);
    Ok(())
}

fn inspect(config: EngineConfig, templates: PathBuf, template: &str) -> Result<()> {
    let template_store = DirTemplateStore::new(templates);
    // Assets are never touched while loading a template
    let asset_store = DirAssetStore::new("assets");
    let engine = LabelEngine::new(&template_store, &asset_store, config);
    let template = engine.load_template(template)?;

    println!("name: {}", template.name);
    println!("grid: {} rows x {} columns", template.rows, template.cols);
    println!(
        "page: {} x {} units",
        template.page.columns, template.page.rows
    );
    println!("images: {}", template.images.len());

    let markers: BTreeSet<String> = template
        .cells
        .iter()
        .flat_map(|cell| marker_names(&cell.text))
        .collect();
    for marker in markers {
        println!("variable: {marker}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Issue {
            db,
            class,
            matrix,
            depth,
            count,
            date,
        } => issue(&config, &db, &class, matrix, depth, count, date),
        Command::Render {
            templates,
            template,
            format,
            records,
            out,
            assets,
            db,
            manual_number,
        } => render(
            config,
            templates,
            &template,
            &format,
            &records,
            &out,
            assets,
            db.as_deref(),
            manual_number,
        ),
        Command::ImportCatalog { input, mapping } => import(&input, &mapping),
        Command::Inspect {
            templates,
            template,
        } => inspect(config, templates, &template),
    }
}
