use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use apdoom_core::persist::{self, STATE_FILE_NAME};
use apdoom_core::{save_dir_name, ApState, CatalogTables, FlipMode, Game, GameCatalog, StaticCatalog};

#[derive(Debug, Parser)]
#[command(name = "apdoom", version, about = "Offline tools for APDOOM randomizer saves")]
struct Args {
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the save directory name used for a seed and player.
    SaveDir {
        #[arg(long)]
        seed: String,
        #[arg(long)]
        player: String,
    },
    /// Show which levels a seeded flip would mirror.
    Flips {
        /// Save directory name, e.g. AP_12345_414243.
        #[arg(long)]
        seed_dir: String,
        #[arg(long, default_value = "DOOM 1993")]
        game: String,
    },
    /// Load an apstate.json and summarize it.
    Inspect {
        path: PathBuf,
        #[arg(long, default_value = "DOOM 1993")]
        game: String,
        /// Catalog tables (item/location/level name JSON) for level names.
        #[arg(long)]
        tables: Option<PathBuf>,
    },
    /// Find every randomizer save under a directory.
    ListSaves {
        #[arg(default_value = ".")]
        root: PathBuf,
    },
}

fn setup_logging(verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

fn load_tables(path: Option<&Path>) -> Result<CatalogTables, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(CatalogTables::from_json(&fs::read_to_string(path)?)?),
        None => Ok(CatalogTables::default()),
    }
}

fn print_flips(seed_dir: &str, game: Game) {
    let mut state = ApState::new(&game.profile());
    state.apply_flips(FlipMode::Seeded, seed_dir);
    for ((ep, map), level) in state.levels.iter() {
        if level.is_flipped() {
            println!("E{ep}M{map} flipped");
        }
    }
}

fn inspect(path: &Path, game: Game, tables: CatalogTables) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = StaticCatalog::for_game(game, tables);
    let profile = catalog.profile();
    let mut state = ApState::new(profile);
    if !persist::load(&mut state, profile, path)? {
        return Err(format!("{} does not exist", path.display()).into());
    }

    let player = &state.player;
    println!("game: {}", game.title());
    println!("current level: E{}M{}", state.ep, state.map);
    println!(
        "health {} armor {} backpack {}",
        player.health, player.armor_points, player.backpack
    );
    println!("enabled episodes: {:?}", state.config.episodes);
    println!("victory: {}", state.config.victory);
    println!("queued items: {}", state.item_queue.len());
    println!("progressive locations: {}", state.progressive_locations.len());

    for ((ep, map), level) in state.levels.iter() {
        if !(level.unlocked || level.completed || level.check_count() > 0) {
            continue;
        }
        let name = catalog.level_name(ep, map).unwrap_or("");
        println!(
            "E{ep}M{map} {name:<24} unlocked={} completed={} keys={:?} map={} checks={}",
            level.unlocked,
            level.completed,
            level.keys,
            level.has_map,
            level.check_count()
        );
    }
    Ok(())
}

fn list_saves(root: &Path) {
    let mut found = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if entry.file_name() != STATE_FILE_NAME {
            continue;
        }
        let is_seed_dir = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("AP_"));
        if is_seed_dir {
            println!("{}", entry.path().display());
            found += 1;
        }
    }
    log::info!("{found} save(s) under {}", root.display());
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::SaveDir { seed, player } => println!("{}", save_dir_name(&seed, &player)),
        Command::Flips { seed_dir, game } => print_flips(&seed_dir, Game::from_title(&game)?),
        Command::Inspect { path, game, tables } => {
            let game = Game::from_title(&game)?;
            inspect(&path, game, load_tables(tables.as_deref())?)?;
        }
        Command::ListSaves { root } => list_saves(&root),
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = setup_logging(args.verbose) {
        eprintln!("Failed to set up logging: {e}");
    }

    if let Err(err) = run(args.command) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
