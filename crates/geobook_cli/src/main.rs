//! Command-line front end for the geobook core.
//!
//! # Responsibility
//! - Load configuration, open the configured database and route one
//!   subcommand to a core operation.
//! - Print results as JSON lines for scripting.

use clap::{Parser, Subcommand};
use geobook_core::repo::spatial_entity_repo::SqliteSpatialEntityRepository;
use geobook_core::{
    init_logging, open_configured_db, AssetStore, CreateEntityRequest, DistanceQuery,
    GeobookConfig, MediaService, ShapeKind, SpatialEntityService, TieredDistanceSearch,
    UploadRequest,
};
use log::error;
use serde_json::json;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "geobook")]
#[command(about = "Story map storage, search and media tools")]
struct Cli {
    /// JSON config file; built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints core version and health.
    Ping,
    /// Finds locations within a radius of a center point.
    Search {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        #[arg(long)]
        radius_km: f64,
        /// Fail instead of returning unfiltered results.
        #[arg(long)]
        strict: bool,
    },
    /// Uploads a media file for a location.
    Upload {
        #[arg(long)]
        location_id: i64,
        #[arg(long)]
        file: PathBuf,
        /// Defaults to a guess from the file extension.
        #[arg(long)]
        mime: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Writes an asset's content to a file.
    Export {
        #[arg(long)]
        asset_id: i64,
        #[arg(long)]
        out: PathBuf,
    },
    /// Moves blob content into native object storage.
    Migrate {
        #[arg(long)]
        asset_id: i64,
        #[arg(long)]
        mime: Option<String>,
    },
    /// Rotates a stored image clockwise.
    Rotate {
        #[arg(long)]
        asset_id: i64,
        #[arg(long, default_value = "90")]
        degrees: u32,
    },
    /// Creates a spatial entity, generating geometry when none is given.
    EntityCreate {
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: ShapeKind,
        #[arg(long, allow_hyphen_values = true, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lng: Option<f64>,
        #[arg(long)]
        geometry: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match cli.config.as_deref() {
        Some(path) => GeobookConfig::load(path)?,
        None => GeobookConfig::default(),
    };
    init_logging(&config.logging)?;

    if let Command::Ping = cli.command {
        println!(
            "{}",
            json!({ "ping": geobook_core::ping(), "version": geobook_core::core_version() })
        );
        return Ok(());
    }

    let mut conn = open_configured_db(&config.storage)?;
    let media = MediaService::new(AssetStore::default(), &config.media);

    match cli.command {
        Command::Ping => {}
        Command::Search {
            lat,
            lng,
            radius_km,
            strict,
        } => {
            let outcome = TieredDistanceSearch::new()
                .strict(strict || config.search.strict_degraded)
                .search(&conn, &DistanceQuery::new(lat, lng, radius_km))?;
            if let Some(warning) = outcome.warning() {
                eprintln!("warning: {warning}");
            }
            println!(
                "{}",
                json!({
                    "tier": outcome.tier.as_str(),
                    "degraded": outcome.degraded,
                    "locations": outcome.locations,
                })
            );
        }
        Command::Upload {
            location_id,
            file,
            mime,
            description,
        } => {
            let bytes = std::fs::read(&file)?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload");
            let mime_type = mime.unwrap_or_else(|| guess_mime(&file).to_string());
            let receipt = media.upload(
                &mut conn,
                &UploadRequest {
                    location_id,
                    file_name,
                    mime_type: &mime_type,
                    bytes: &bytes,
                    description: description.as_deref(),
                },
            )?;
            println!(
                "{}",
                json!({
                    "asset_id": receipt.asset_id,
                    "outcome": receipt.outcome,
                    "file_path": receipt.file_path,
                    "thumbnail_path": receipt.thumbnail_path,
                })
            );
        }
        Command::Export { asset_id, out } => {
            let content = media.read(&conn, asset_id)?;
            std::fs::write(&out, &content.bytes)?;
            println!(
                "{}",
                json!({
                    "asset_id": asset_id,
                    "source": content.source,
                    "mime_type": content.mime_type,
                    "bytes": content.bytes.len(),
                })
            );
        }
        Command::Migrate { asset_id, mime } => {
            let outcome = media
                .store()
                .migrate(&mut conn, asset_id, mime.as_deref())?;
            println!("{}", json!({ "asset_id": asset_id, "outcome": outcome }));
        }
        Command::Rotate { asset_id, degrees } => {
            let rotated = media.rotate(&mut conn, asset_id, degrees)?;
            println!(
                "{}",
                json!({
                    "asset_id": asset_id,
                    "outcome": rotated.outcome,
                    "width": rotated.width,
                    "height": rotated.height,
                })
            );
        }
        Command::EntityCreate {
            name,
            kind,
            lat,
            lng,
            geometry,
            description,
            color,
        } => {
            let service = SpatialEntityService::new(SqliteSpatialEntityRepository::new(&conn));
            let mut request = CreateEntityRequest::new(name, kind);
            request.center = lat.zip(lng);
            request.geometry_text = geometry;
            request.description = description;
            request.color = color;
            let entity = service.create_entity(&request)?;
            println!("{}", serde_json::to_string(&entity)?);
        }
    }
    Ok(())
}

fn parse_kind(value: &str) -> Result<ShapeKind, String> {
    ShapeKind::parse(value).ok_or_else(|| {
        format!("unknown kind `{value}`; expected point|linestring|polygon|circle|rectangle")
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::{guess_mime, parse_kind, Cli};
    use clap::CommandFactory;
    use geobook_core::ShapeKind;
    use std::path::Path;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn kind_argument_accepts_any_case() {
        assert_eq!(parse_kind("Circle").unwrap(), ShapeKind::Circle);
        assert!(parse_kind("hexagon").is_err());
    }

    #[test]
    fn mime_guess_follows_extension() {
        assert_eq!(guess_mime(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("notes.txt")), "application/octet-stream");
    }
}
