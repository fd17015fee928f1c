use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(
    name = "geoindex",
    version,
    about = "Index a photo folder into a JSON catalog and geotag photos from GPX track logs"
)]
struct Cli {
    /// Directory searched recursively for .gpx track logs
    #[arg(long, env = "GEOINDEX_GPXDIR", default_value = "GPX_Output")]
    gpxdir: PathBuf,

    /// Directory searched recursively for photos
    #[arg(long, env = "GEOINDEX_IMGDIR", default_value = "images")]
    imgdir: PathBuf,

    /// Catalog file to read and rewrite
    #[arg(long, env = "GEOINDEX_JSONPATH", default_value = "images.json")]
    jsonpath: PathBuf,

    /// World cities CSV used for offline place names
    #[arg(long, env = "GEOINDEX_CITIES", default_value = "assets/worldcities.csv")]
    cities: PathBuf,

    /// Dry run: report geotag updates without modifying photos
    #[arg(long, env = "GEOINDEX_TEST")]
    test: bool,

    /// Enable debug logging
    #[arg(long, env = "GEOINDEX_DEBUG")]
    debug: bool,

    /// Maximum seconds between photo and track point for a match
    #[arg(long, env = "GEOINDEX_WINDOW", default_value_t = 3600)]
    window: i64,

    /// Recompute date taken, location and size even when already set
    #[arg(long, env = "GEOINDEX_FORCE")]
    force: bool,

    /// Move catalog entries whose file is gone to the pruned list
    #[arg(long, env = "GEOINDEX_PRUNE")]
    prune: bool,

    /// Never call the online reverse geocoder
    #[arg(long, env = "GEOINDEX_OFFLINE")]
    offline: bool,

    /// Reverse geocoding timeout in seconds
    #[arg(long, env = "GEOINDEX_GEOCODE_TIMEOUT", default_value_t = 3)]
    geocode_timeout: u64,
}

fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    let t_total = std::time::Instant::now();

    let options = geoindex_core::IndexOptions {
        gpx_dir: cli.gpxdir,
        image_dir: cli.imgdir,
        catalog_path: cli.jsonpath,
        cities_csv: cli.cities,
        dry_run: cli.test,
        window_secs: cli.window,
        force: cli.force,
        prune: cli.prune,
        offline: cli.offline,
        geocode_timeout_secs: cli.geocode_timeout,
    };

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);

    let summary = geoindex_core::run(&options, &|_stage, current, total, message| {
        pb.set_length(total);
        pb.set_position(current);
        pb.set_message(message.to_string());
    })?;
    pb.finish_and_clear();

    print!("{}", summary);
    println!(
        "\n{} updated, sorted by date taken (most recent first).",
        options.catalog_path.display()
    );
    log::debug!("Finished in {:.2}s", t_total.elapsed().as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["geoindex"]).unwrap();
        assert_eq!(cli.gpxdir, PathBuf::from("GPX_Output"));
        assert_eq!(cli.imgdir, PathBuf::from("images"));
        assert_eq!(cli.jsonpath, PathBuf::from("images.json"));
        assert_eq!(cli.window, 3600);
        assert_eq!(cli.geocode_timeout, 3);
        assert!(!cli.test && !cli.prune && !cli.force);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "geoindex", "--test", "--prune", "--window", "600", "--jsonpath", "out.json",
        ])
        .unwrap();
        assert!(cli.test);
        assert!(cli.prune);
        assert_eq!(cli.window, 600);
        assert_eq!(cli.jsonpath, PathBuf::from("out.json"));
    }

    #[test]
    fn test_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["geoindex", "photos"]).is_err());
    }
}
