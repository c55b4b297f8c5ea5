use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError};
use crate::courses::Course;
use crate::grid::filter::FilterKey;
use crate::grid::protocol::Page;
use crate::grid::Applied;
use crate::view::CourseListView;

/// Seconds a status message stays on the info line
const STATUS_SECONDS: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Table,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    Help,
}

/// Answer to one draw, sent back from the fetch task
struct DrawResult {
    draw: u64,
    result: Result<Page<Course>, ApiError>,
}

pub struct App {
    pub view: CourseListView,
    pub focus: Focus,
    pub popup: Popup,
    pub selected_row: usize,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    client: ApiClient,
    tx: mpsc::UnboundedSender<DrawResult>,
    rx: mpsc::UnboundedReceiver<DrawResult>,
}

impl App {
    /// Render the course list and start fetching its first page
    pub fn new(mut view: CourseListView, client: ApiClient) -> Result<Self> {
        view.render()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut app = Self {
            view,
            focus: Focus::Table,
            popup: Popup::None,
            selected_row: 0,
            status_message: None,
            status_message_time: None,
            client,
            tx,
            rx,
        };
        app.dispatch();
        Ok(app)
    }

    /// Set a status message (auto-clears after a few seconds)
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    pub fn rows(&self) -> &[Course] {
        self.view.grid().map(|g| g.rows()).unwrap_or(&[])
    }

    pub fn selected_course(&self) -> Option<&Course> {
        self.rows().get(self.selected_row)
    }

    /// Send the draw the view has queued, if any
    fn dispatch(&mut self) {
        let Some(request) = self.view.take_draw() else {
            return;
        };

        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_page::<Course>(&request).await;
            // Receiver is gone only when the app is shutting down
            let _ = tx.send(DrawResult {
                draw: request.draw,
                result,
            });
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if self.popup == Popup::Help {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::Enter | KeyCode::Char('q')
            ) {
                self.popup = Popup::None;
            }
            return Ok(());
        }

        match self.focus {
            Focus::Filter => self.handle_filter_key(key),
            Focus::Table => self.handle_table_key(key)?,
        }

        self.dispatch();
        Ok(())
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        let filter_key = match key.code {
            KeyCode::Esc => {
                self.focus = Focus::Table;
                return;
            }
            KeyCode::Enter => {
                self.focus = Focus::Table;
                FilterKey::Enter
            }
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => return,
            KeyCode::Char(c) => FilterKey::Char(c),
            KeyCode::Backspace => FilterKey::Backspace,
            KeyCode::Delete => FilterKey::Delete,
            KeyCode::Left => FilterKey::Left,
            KeyCode::Right => FilterKey::Right,
            KeyCode::Home => FilterKey::Home,
            KeyCode::End => FilterKey::End,
            _ => return,
        };

        if self.view.filter_key(filter_key) {
            self.selected_row = 0;
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent) -> Result<()> {
        let paged = match key.code {
            KeyCode::Char('/') => {
                self.focus = Focus::Filter;
                false
            }

            // Paging
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => self.view.next_page(),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => self.view.previous_page(),
            KeyCode::Char('g') | KeyCode::Home => self.view.first_page(),
            KeyCode::Char('G') | KeyCode::End => self.view.last_page(),
            KeyCode::Char('l') => self.view.cycle_length(),

            // Sorting by visible column 1..3
            KeyCode::Char(c @ '1'..='3') => {
                let n = c as usize - '1' as usize;
                if !self.view.sort_by_visible(n) {
                    self.set_status("Column cannot be sorted");
                }
                false
            }

            // Row selection
            KeyCode::Char('j') | KeyCode::Down => {
                let count = self.rows().len();
                if count > 0 {
                    self.selected_row = (self.selected_row + 1) % count;
                }
                false
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let count = self.rows().len();
                if count > 0 {
                    self.selected_row = self.selected_row.checked_sub(1).unwrap_or(count - 1);
                }
                false
            }

            KeyCode::Char('o') | KeyCode::Enter => {
                self.open_selected()?;
                false
            }

            KeyCode::Char('R') => {
                self.view.reload();
                self.set_status("Reloading...");
                false
            }

            KeyCode::Char('?') | KeyCode::Char('h') => {
                self.popup = Popup::Help;
                false
            }

            _ => false,
        };

        if paged {
            self.selected_row = 0;
        }
        Ok(())
    }

    /// Absolute URL of the selected course's page
    pub fn selected_course_url(&self) -> Option<String> {
        self.selected_course()
            .map(|course| self.client.url(&course.page_path()))
    }

    /// Open the selected course's page with the system opener
    fn open_selected(&mut self) -> Result<()> {
        let Some(url) = self.selected_course_url() else {
            return Ok(());
        };

        let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
        match spawn_opener(opener, &url) {
            Ok(_) => self.set_status(format!("Opened {}", url)),
            Err(e) => {
                tracing::warn!("Could not run {}: {}", opener, e);
                self.set_status(format!("Course page: {}", url));
            }
        }
        Ok(())
    }

    /// Apply finished draws and expire the status message
    pub fn tick(&mut self) {
        while let Ok(DrawResult { draw, result }) = self.rx.try_recv() {
            match result {
                Ok(page) => {
                    if self.view.apply_page(page) == Applied::Shown {
                        let count = self.rows().len();
                        if self.selected_row >= count {
                            self.selected_row = count.saturating_sub(1);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Draw {} failed: {}", draw, e);
                    if self.view.fail_draw(draw, e.to_string()) == Applied::Shown {
                        self.set_status(format!("Error: {}", e));
                    }
                }
            }
        }

        if let Some(time) = self.status_message_time {
            if time.elapsed().as_secs() >= STATUS_SECONDS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }
}

/// Run `program url` detached; the returned task reaps it
fn spawn_opener(program: &str, url: &str) -> std::io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = tokio::process::Command::new(program)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let program = program.to_string();
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                if !status.success() {
                    tracing::warn!("{} exited with {}", program, status);
                }
                Some(status)
            }
            Err(e) => {
                tracing::warn!("Could not wait for {}: {}", program, e);
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courses::CellFormatter;
    use crate::i18n::Catalog;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn rows(n: usize) -> serde_json::Value {
        json!((0..n)
            .map(|i| json!({
                "id": format!("course-v1:edX+C{i}+2021"),
                "name": format!("Course {i}"),
                "type": "verified",
                "last_edited": "2021-03-05T14:30:00"
            }))
            .collect::<Vec<_>>())
    }

    fn app_for(server: &MockServer) -> App {
        let view = CourseListView::new(Box::new(Catalog::source("en")), CellFormatter::default(), 10);
        let client = ApiClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        App::new(view, client).unwrap()
    }

    async fn settle(app: &mut App) {
        for _ in 0..50 {
            app.tick();
            if !app.view.grid().map(|g| g.is_processing()).unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[tokio::test]
    async fn test_first_page_is_loaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/courses/"))
            .and(query_param("draw", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draw": 1,
                "recordsTotal": 12,
                "recordsFiltered": 12,
                "data": rows(10)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app_for(&server);
        settle(&mut app).await;

        assert_eq!(app.rows().len(), 10);
        assert_eq!(
            app.view.grid().unwrap().info_text(),
            "Displaying 1 to 10 of 12 courses"
        );
        assert_eq!(
            app.selected_course_url().unwrap(),
            format!("{}/courses/course-v1:edX+C0+2021/", server.uri())
        );
    }

    #[tokio::test]
    async fn test_failed_draw_sets_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut app = app_for(&server);
        settle(&mut app).await;

        assert!(app.rows().is_empty());
        assert_eq!(
            app.view.grid().unwrap().last_error(),
            Some("server returned HTTP 500")
        );
        assert_eq!(
            app.status_message.as_deref(),
            Some("Error: server returned HTTP 500")
        );
    }

    #[tokio::test]
    async fn test_typing_in_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search[value]", ""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draw": 1, "recordsTotal": 3, "recordsFiltered": 3, "data": rows(3)
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("search[value]", "cou"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "draw": 2, "recordsTotal": 3, "recordsFiltered": 1, "data": rows(1)
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut app = app_for(&server);
        settle(&mut app).await;

        app.handle_key(key(KeyCode::Char('/'))).unwrap();
        assert_eq!(app.focus, Focus::Filter);
        for c in "cou".chars() {
            app.handle_key(key(KeyCode::Char(c))).unwrap();
        }
        settle(&mut app).await;

        assert_eq!(app.rows().len(), 1);
        assert_eq!(app.view.grid().unwrap().filter().value(), "cou");
        assert_eq!(
            app.view.grid().unwrap().info_text(),
            "Displaying 1 to 1 of 1 courses (filtered from 3 total courses)"
        );

        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.focus, Focus::Table);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_opener_is_reaped() {
        let task = spawn_opener("true", "http://localhost/courses/7/").unwrap();
        let status = task.await.unwrap();
        assert!(status.map(|s| s.success()).unwrap_or(false));

        assert!(spawn_opener("coursegrid-no-such-opener", "x").is_err());
    }

    #[tokio::test]
    async fn test_help_popup() {
        let server = MockServer::start().await;
        let mut app = app_for(&server);

        app.handle_key(key(KeyCode::Char('?'))).unwrap();
        assert_eq!(app.popup, Popup::Help);
        app.handle_key(key(KeyCode::Esc)).unwrap();
        assert_eq!(app.popup, Popup::None);
    }
}
