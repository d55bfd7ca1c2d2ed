use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use msdmap_rs::legend::{LegendBody, legend_view};
use msdmap_rs::models::{Category, MapFeature, Prop, normalize_place_id};
use msdmap_rs::{CategoryRegistry, MapConfig, Painter, PlaceApi, info, storage};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "msdmap",
    version,
    about = "Resolve category keys, paint expressions, legends and place summaries for a map config"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the fully-qualified key for a property under a category.
    Key(KeyArgs),
    /// Print (or save) the fill-color expression for one or two properties.
    Paint(PaintArgs),
    /// Print legend bins, mute filters and labels.
    Legend(DisplayArgs),
    /// Fetch and print the summary for one place.
    Place(PlaceArgs),
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Property name, base or already qualified (e.g., med_bal)
    #[arg(short, long)]
    prop: String,
    /// Category as DIM=VALUE pairs separated by comma or semicolon (e.g., Y=2022,S=public)
    #[arg(short, long, default_value = "")]
    cat: String,
    /// Map config providing the category registry.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Dimensions registered for the property, when no config is given (e.g., Y,S)
    #[arg(long)]
    dims: Option<String>,
}

#[derive(Args, Debug)]
struct DisplayArgs {
    #[arg(long)]
    config: PathBuf,
    /// One or two base properties separated by comma (e.g., med_bal,pct_bal_grt)
    #[arg(long)]
    props: String,
    /// Category overrides on top of the config's initial category.
    #[arg(short, long, default_value = "")]
    cat: String,
}

#[derive(Args, Debug)]
struct PaintArgs {
    #[command(flatten)]
    display: DisplayArgs,
    /// Save the expression as JSON instead of printing it.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlaceArgs {
    #[arg(long)]
    config: PathBuf,
    /// Place id (e.g., a ZIP code)
    #[arg(long)]
    place: String,
    #[arg(short, long, default_value = "")]
    cat: String,
    /// Data host prefix; defaults to the config's data_prefix, then ".".
    #[arg(long)]
    prefix: Option<String>,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split([',', ';'])
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn parse_cat(s: &str, base: Category) -> Result<Category> {
    let mut cat = base;
    for pair in parse_list(s) {
        let (dim, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid --cat entry {pair:?}, expected DIM=VALUE"))?;
        cat.set(dim.trim(), value.trim());
    }
    Ok(cat)
}

fn load_config(path: &Path) -> Result<MapConfig> {
    MapConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Resolve the displayed props for `args` against the config's property table.
fn display_props(cfg: &MapConfig, args: &DisplayArgs) -> Result<Vec<Prop>> {
    let cat = parse_cat(&args.cat, cfg.initial_state.cat.clone())?;
    let table = cfg.prop_table();
    let bases = parse_list(&args.props);
    if bases.is_empty() || bases.len() > 2 {
        anyhow::bail!("--props takes one or two properties");
    }
    bases
        .iter()
        .map(|b| {
            let key = cfg.cats_for_props.property_key_for(b, &cat);
            table
                .get(&key)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no property {key:?} in config"))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Key(args) => cmd_key(args),
        Command::Paint(args) => cmd_paint(args),
        Command::Legend(args) => cmd_legend(args),
        Command::Place(args) => cmd_place(args).await,
    }
}

fn cmd_key(args: KeyArgs) -> Result<()> {
    let registry = match (&args.config, &args.dims) {
        (Some(path), _) => load_config(path)?.cats_for_props,
        (None, Some(dims)) => {
            let (base, _) = msdmap_rs::split_property_key(&args.prop);
            CategoryRegistry::new().with(base, parse_list(dims))
        }
        (None, None) => CategoryRegistry::new(),
    };
    let cat = parse_cat(&args.cat, Category::new())?;
    println!("{}", registry.property_key_for(&args.prop, &cat));
    Ok(())
}

fn cmd_paint(args: PaintArgs) -> Result<()> {
    let cfg = load_config(&args.display.config)?;
    let props = display_props(&cfg, &args.display)?;
    let painter = Painter::new(cfg.colors.paint.clone());
    let expr = painter
        .paint(&props)
        .ok_or_else(|| anyhow::anyhow!("nothing to paint"))?
        .to_json();
    match args.out.as_ref() {
        Some(path) => {
            storage::save_json(&expr, path)?;
            eprintln!("Wrote fill-color expression to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&expr)?),
    }
    Ok(())
}

fn cmd_legend(args: DisplayArgs) -> Result<()> {
    let cfg = load_config(&args.config)?;
    let props = display_props(&cfg, &args)?;
    let view = legend_view(&props, &cfg.colors.special)
        .ok_or_else(|| anyhow::anyhow!("nothing to show"))?;
    match &view.body {
        LegendBody::Range(range) => {
            println!("{}  [{} .. {}]", range.title, range.labels.0, range.labels.1);
            let key = &props[0].key;
            for bin in &range.bins {
                println!(
                    "bin {} (slot {})  {} .. {}  mute: {}",
                    bin.index,
                    bin.display_slot,
                    bin.bounds.lower,
                    bin.bounds.upper,
                    bin.mute_filter(key).to_json()
                );
            }
        }
        LegendBody::Bivariate(grid) => {
            println!("rows: {}  [{} .. {}]", grid.nick_a, grid.labels_a.0, grid.labels_a.1);
            println!("columns: {}  [{} .. {}]", grid.nick_b, grid.labels_b.0, grid.labels_b.1);
            for row in 0..grid.cells.first().map_or(0, Vec::len) {
                for column in &grid.cells {
                    let cell = &column[row];
                    println!(
                        "cell {},{}  {}  mute: {}",
                        cell.column,
                        cell.row,
                        cell.color,
                        cell.bin.mute_filter(&props[0].key, &props[1].key).to_json()
                    );
                }
            }
        }
    }
    for (label, color) in &view.special {
        println!("special {label}: {color}");
    }
    Ok(())
}

async fn cmd_place(args: PlaceArgs) -> Result<()> {
    let cfg = load_config(&args.config)?;
    let cat = parse_cat(&args.cat, cfg.initial_state.cat.clone())?;
    let prefix = args
        .prefix
        .clone()
        .or_else(|| cfg.data_prefix.clone())
        .unwrap_or_else(|| ".".into());
    let api = PlaceApi::new(cfg.loa.clone(), prefix);
    let place = normalize_place_id(&args.place, cfg.ui.min_place_id_length);
    let feature = MapFeature::new(place.as_str(), cfg.loa.as_str()).with_prop("loa_key", place.as_str());
    let summaries = info::explain(&api, &[feature], &cat, &cfg.info_fields).await;
    let plural = if cfg.place_name_plural.is_empty() {
        "places"
    } else {
        cfg.place_name_plural.as_str()
    };
    for s in summaries {
        print!("{}", s.render_text(plural));
    }
    Ok(())
}
