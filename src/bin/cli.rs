use clap::Parser;
use log::info;
use realmgen::{GenerationParams, generate};
use std::fs;
use std::path::PathBuf;

/// Генератор фэнтезийных карт
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (без него параметры по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Путь для сохранения PNG
    #[arg(short, long, default_value = "map.png")]
    output: PathBuf,

    /// Необязательный JSON с графом, полями, объектами и именами
    #[arg(short, long)]
    metadata: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let params = match &cli.config {
        Some(path) => {
            info!("загрузка конфигурации из {}", path.display());
            GenerationParams::from_toml_file(path)?
        }
        None => GenerationParams::default(),
    };

    info!(
        "генерация карты {}x{}, seed = {}",
        cli.width, cli.height, cli.seed
    );
    let map = generate(cli.seed, cli.width, cli.height, &params)?;

    let output = cli.output.to_str().ok_or("output path is not valid UTF-8")?;
    map.raster.save_as_png(output)?;
    info!("растр сохранён в {}", cli.output.display());

    if let Some(path) = &cli.metadata {
        fs::write(path, serde_json::to_string_pretty(&map.data)?)?;
        info!("метаданные сохранены в {}", path.display());
    }
    Ok(())
}
