mod api;
mod app;
mod config;
mod courses;
mod grid;
mod i18n;
mod theme;
mod ui;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::ApiClient;
use app::{App, Focus, Popup};
use config::AppConfig;
use courses::{CellFormatter, Course};
use i18n::Catalog;
use view::CourseListView;

#[derive(Parser, Debug)]
#[command(name = "coursegrid")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "Browse and search the course catalogue of an ecommerce admin API")]
struct Args {
    /// API host, e.g. https://ecommerce.example.com
    #[arg(long)]
    api_url: Option<String>,

    /// JWT sent with every request
    #[arg(long, env = "COURSEGRID_TOKEN")]
    token: Option<String>,

    /// Courses per page (10, 25, 50 or 100)
    #[arg(long)]
    page_size: Option<usize>,

    /// Locale of the message catalog
    #[arg(long)]
    locale: Option<String>,

    /// Show "Last Edited" in UTC
    #[arg(long)]
    utc: bool,

    /// Print one page of courses as JSON and exit
    #[arg(short, long)]
    dump: bool,

    /// Search value for --dump
    #[arg(short, long, requires = "dump")]
    search: Option<String>,

    /// Page to print with --dump, starting at 1
    #[arg(
        short,
        long,
        requires = "dump",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    page: u64,
}

impl Args {
    /// Command line values win over the config file
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(ref url) = self.api_url {
            config.api_base_url = url.clone();
        }
        if let Some(ref token) = self.token {
            config.auth_token = Some(token.clone());
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(ref locale) = self.locale {
            config.locale = locale.clone();
        }
        if self.utc {
            config.display_utc = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.dump);

    let mut config = AppConfig::load()?;
    args.apply_to(&mut config);
    let config = config.sanitized();

    let client = ApiClient::new(
        &config.api_base_url,
        config.auth_token.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let view = CourseListView::new(
        Box::new(Catalog::load(&config.locale)),
        CellFormatter::new(config.display_zone()),
        config.page_size,
    );

    if args.dump {
        return run_dump(view, &client, args.search.as_deref(), args.page).await;
    }

    run_tui(view, client).await
}

/// The TUI owns the terminal, so its log goes to a file in the cache dir
fn init_logging(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
        return;
    }

    let log_file = dirs::cache_dir()
        .map(|d| d.join("coursegrid"))
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("coursegrid.log"))
                .ok()
        });

    match log_file {
        Some(file) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init(),
        None => registry.init(),
    }
}

async fn run_dump(
    mut view: CourseListView,
    client: &ApiClient,
    search: Option<&str>,
    page: u64,
) -> Result<()> {
    view.render()?;
    if let Some(value) = search {
        view.search(value);
    }

    let mut request = view.take_draw().context("course grid queued no draw")?;
    let mut result = client.fetch_page::<Course>(&request).await?;
    view.apply_page(result);

    // Later pages exist only once the first answer told us the total
    if page > 1 {
        if !view.go_to_page((page - 1) as usize) {
            let pages = view.grid().map(|g| g.page_count()).unwrap_or(1);
            anyhow::bail!("page {} out of range (1-{})", page, pages);
        }
        request = view.take_draw().context("course grid queued no draw")?;
        result = client.fetch_page::<Course>(&request).await?;
        view.apply_page(result);
    }

    let grid = view.grid().context("course grid not attached")?;
    let columns: Vec<&str> = grid
        .visible_columns()
        .iter()
        .map(|&i| grid.columns()[i].data.as_str())
        .collect();

    let rows: Vec<serde_json::Value> = grid
        .rows()
        .iter()
        .map(|course| {
            let cells: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .zip(grid.cells(course))
                .map(|(data, cell)| {
                    (
                        data.to_string(),
                        serde_json::json!({ "text": cell.plain(), "html": cell.to_markup() }),
                    )
                })
                .collect();
            serde_json::json!({
                "id": course.id,
                "url": client.url(&course.page_path()),
                "cells": cells,
            })
        })
        .collect();

    let output = serde_json::json!({
        "draw": grid.state().draw,
        "page": grid.current_page() + 1,
        "pages": grid.page_count(),
        "recordsTotal": grid.records_total(),
        "recordsFiltered": grid.records_filtered(),
        "info": grid.info_text(),
        "data": rows,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_tui(view: CourseListView, client: ApiClient) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app state; the first draw goes out right away
    let result = match App::new(view, client) {
        Ok(mut app) => run_app(&mut terminal, &mut app).await,
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None && app.focus == Focus::Table => {
                            return Ok(())
                        }
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key) {
                                app.set_status(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        app.tick();
        // Let spawned fetches make progress between frames
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_page_starts_at_one() {
        let args = Args::try_parse_from(["coursegrid", "--dump"]).unwrap();
        assert_eq!(args.page, 1);

        let args = Args::try_parse_from(["coursegrid", "--dump", "--page", "3"]).unwrap();
        assert_eq!(args.page, 3);

        assert!(Args::try_parse_from(["coursegrid", "--dump", "--page", "0"]).is_err());
    }

    #[test]
    fn test_page_requires_dump() {
        assert!(Args::try_parse_from(["coursegrid", "--page", "2"]).is_err());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::try_parse_from([
            "coursegrid",
            "--api-url",
            "https://ecommerce.example.com",
            "--page-size",
            "25",
            "--utc",
        ])
        .unwrap();
        let mut config = AppConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.api_base_url, "https://ecommerce.example.com");
        assert_eq!(config.page_size, 25);
        assert!(config.display_utc);
        assert_eq!(config.locale, "en");
    }
}
