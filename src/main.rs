use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use wxdash_core::{AppError, Config, TemperatureUnit};
use wxdash_weather::{
    CityRecord, Dashboard, OpenWeatherProvider, SqliteWatchlistStore, WeatherBackend, WeatherCard,
};

const HELP: &str = "\
Commands:
  <text>         search for a city (suggestions appear after you stop typing)
  add <n>        add suggestion number n to the watchlist
  rm <n>         remove card number n
  refresh        fetch weather for every city again
  unit c|f       switch the display unit
  list           show the cards
  help           show this help
  quit           exit";

fn render_card(index: usize, card: &WeatherCard) -> String {
    if card.loading {
        return format!("{:>2}. {:<24} ...", index + 1, card.key.to_string());
    }
    format!(
        "{:>2}. {:<24} {:>4}°{}  {:<14} humidity {:>3}%  wind {:>3} km/h  [{}]",
        index + 1,
        card.key.to_string(),
        card.temperature,
        card.unit.symbol(),
        card.condition,
        card.humidity,
        card.wind_speed,
        card.icon,
    )
}

fn print_cards<B: WeatherBackend>(dashboard: &Dashboard<B>) {
    let cards = dashboard.cards();
    if cards.is_empty() {
        println!("No cities added yet. Add a city to see weather information.");
        return;
    }
    for (i, card) in cards.iter().enumerate() {
        println!("{}", render_card(i, card));
    }
}

fn print_suggestions(suggestions: &[CityRecord]) {
    for (i, city) in suggestions.iter().enumerate() {
        println!("  {}) {}", i + 1, city.label());
    }
}

/// Print suggestions and error banners as they change.
fn spawn_renderer<B: WeatherBackend>(dashboard: Dashboard<B>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = dashboard.subscribe();
        let mut last = dashboard.snapshot();
        while changes.changed().await.is_ok() {
            let snapshot = dashboard.snapshot();
            if snapshot.suggestions != last.suggestions && !snapshot.suggestions.is_empty() {
                print_suggestions(&snapshot.suggestions);
            }
            if snapshot.no_results && !last.no_results {
                println!("  No cities found");
            }
            if snapshot.error != last.error {
                if let Some(error) = &snapshot.error {
                    println!("! {}", error);
                }
            }
            last = snapshot;
        }
    })
}

fn pick(list_len: usize, arg: &str) -> Option<usize> {
    let n: usize = arg.trim().parse().ok()?;
    (1..=list_len).contains(&n).then(|| n - 1)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wxdash_core::init()?;

    if let Err(e) = run().await {
        tracing::error!("wxdash stopped: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }

    tracing::info!("wxdash shutting down");
    Ok(())
}

async fn run() -> Result<(), AppError> {
    let (config, _validation) = Config::load_validated()?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let store = SqliteWatchlistStore::open(&config.database_path())?;
    let provider = OpenWeatherProvider::new(&config.weather)?;
    let dashboard = Dashboard::new(provider, Arc::new(store), &config.weather);

    println!("wxdash - Weather Dashboard");
    dashboard.load_missing().await;
    print_cards(&dashboard);
    println!("{}", HELP);

    let search_worker = dashboard.spawn_search_worker();
    let renderer = spawn_renderer(dashboard.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "list" => print_cards(&dashboard),
            "refresh" => {
                dashboard.dismiss_error();
                dashboard.refresh().await;
                print_cards(&dashboard);
            }
            "unit" => {
                let unit = match arg.trim().to_ascii_lowercase().as_str() {
                    "f" => TemperatureUnit::Fahrenheit,
                    "c" => TemperatureUnit::Celsius,
                    _ => {
                        println!("Use 'unit c' or 'unit f'");
                        continue;
                    }
                };
                dashboard.set_unit(unit);
                print_cards(&dashboard);
            }
            "add" => {
                let suggestions = dashboard.snapshot().suggestions;
                match pick(suggestions.len(), arg) {
                    Some(i) => {
                        dashboard.add_city(suggestions[i].clone()).await;
                        print_cards(&dashboard);
                    }
                    None => println!("No suggestion {}", arg.trim()),
                }
            }
            "rm" => {
                let cities = dashboard.cities();
                match pick(cities.len(), arg) {
                    Some(i) => {
                        dashboard.remove_city(&cities[i].key());
                        print_cards(&dashboard);
                    }
                    None => println!("No card {}", arg.trim()),
                }
            }
            _ => dashboard.set_query(line),
        }
    }

    search_worker.abort();
    renderer.abort();
    Ok(())
}
