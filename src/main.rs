use std::sync::Arc;

use anyhow::Result;
use nimbus_app::{ApplicationState, Dependencies, OrchestratorSettings, ViewStatus, WeatherOrchestrator};
use nimbus_core::Config;
use nimbus_storage::{FileLastPlaceStore, SqliteFavoritesStore};
use nimbus_weather::{ClientSettings, FixedLocationProvider, WeatherApiClient};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands:
  city <name>    show weather for a place
  gps            show weather at the configured position
  search <text>  search places
  pick <n>       open search result n
  fav            toggle favorite for the current place
  clear          clear the search
  favorites      list favorites
  open <n>       open favorite n
  quit           exit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    nimbus_core::init();

    let (config, _) = Config::load_validated()?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let client = WeatherApiClient::new(ClientSettings::from_config(
        &config.weather_api,
        config.weather.hourly_limit,
    ))?;
    let deps = Dependencies {
        weather: Arc::new(client),
        location: Arc::new(FixedLocationProvider::from_config(&config.location)),
        favorites: Arc::new(SqliteFavoritesStore::open(config.favorites_db_path())?),
        last_place: Arc::new(FileLastPlaceStore::new(config.last_place_path())),
    };

    let orchestrator =
        WeatherOrchestrator::start(deps, OrchestratorSettings::from(&config.weather)).await;
    tracing::info!("Nimbus started");

    println!("Nimbus - weather in your terminal");
    println!("{}", HELP);

    let renderer = tokio::spawn(render(orchestrator.observe_state()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match command {
            "" => {}
            "city" if !arg.is_empty() => orchestrator.fetch_by_name(arg),
            "gps" => orchestrator.fetch_by_current_location(),
            "search" => orchestrator.search_locations(arg),
            "pick" => {
                let state = orchestrator.snapshot();
                match pick(arg, state.search_results.len()) {
                    Some(i) => orchestrator.select_search_result(&state.search_results[i]),
                    None => println!("No such result"),
                }
            }
            "fav" => orchestrator.toggle_favorite(),
            "clear" => orchestrator.clear_search(),
            "favorites" => print_favorites(&orchestrator.snapshot()),
            "open" => {
                let state = orchestrator.snapshot();
                match pick(arg, state.favorites.len()) {
                    Some(i) => orchestrator.fetch_by_name(state.favorites[i].name.clone()),
                    None => println!("No such favorite"),
                }
            }
            "quit" | "exit" => break,
            _ => println!("{}", HELP),
        }
    }

    // Graceful shutdown
    orchestrator.shutdown();
    renderer.abort();
    tracing::info!("Nimbus stopped");

    Ok(())
}

/// 1-based index from user input.
fn pick(arg: &str, len: usize) -> Option<usize> {
    arg.parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}

async fn render(mut rx: tokio::sync::watch::Receiver<ApplicationState>) {
    let mut last = String::new();
    loop {
        let screen = describe(&rx.borrow_and_update());
        if screen != last {
            println!("{}", screen);
            last = screen;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn describe(state: &ApplicationState) -> String {
    let mut out = String::new();

    match state.view() {
        ViewStatus::Loading => out.push_str("Loading..."),
        ViewStatus::Error => {
            out.push_str(&format!("Error: {}", state.error_message.as_deref().unwrap_or("")))
        }
        ViewStatus::Empty => out.push_str("No place selected. Try `city <name>` or `gps`."),
        ViewStatus::Content => {}
    }

    if let Some(place) = &state.current_place {
        let marker = if state.is_current_place_favorite { " *" } else { "" };
        let source = if state.is_current_from_gps { " (your location)" } else { "" };
        out.push_str(&format!(
            "\n{}, {}{}{}: {:.0}° {} (feels {:.0}°, {:.0}°/{:.0}°), humidity {}%, wind {:.0} {}",
            place.name,
            place.country,
            source,
            marker,
            place.temperature,
            place.condition.text,
            place.feels_like,
            place.min_temperature,
            place.max_temperature,
            place.humidity,
            place.wind_speed,
            place.wind_direction,
        ));
        if let Some(aqi) = place.air_quality {
            out.push_str(&format!(", air quality {}", aqi.category().description()));
        }
    }

    if let Some(forecast) = &state.forecast {
        for day in &forecast.daily {
            out.push_str(&format!(
                "\n  {}  {:.0}°/{:.0}°  {}  rain {}%",
                day.date, day.min_temperature, day.max_temperature, day.condition.text, day.chance_of_rain
            ));
        }
    }

    if let Some(gps) = &state.gps_place {
        if !state.is_current_from_gps {
            out.push_str(&format!("\nAt your location: {} {:.0}°", gps.name, gps.temperature));
        }
    }

    if state.is_searching {
        out.push_str(&format!("\nSearching \"{}\"...", state.search_query));
    } else if !state.search_results.is_empty() {
        out.push_str("\nResults:");
        for (i, result) in state.search_results.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, result.label()));
        }
    }

    out
}

fn print_favorites(state: &ApplicationState) {
    if state.favorites.is_empty() {
        println!("No favorites yet");
        return;
    }
    for (i, favorite) in state.favorites.iter().enumerate() {
        println!("  {}. {}, {}", i + 1, favorite.name, favorite.country);
    }
}
