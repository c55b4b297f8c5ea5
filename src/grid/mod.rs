//! Server-side data grid
//!
//! The grid owns paging, ordering and search state, turns every change into
//! a numbered draw request, and keeps the rows of the latest answered draw.
//! Fetching is done by the caller; the grid only decides what to ask for
//! and which answers to keep.

pub mod filter;
pub mod protocol;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::i18n::fill;
use filter::{FilterInput, FilterKey, FilterPolicy};
use protocol::{DrawRequest, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Order {
    pub column: usize,
    pub dir: SortDirection,
}

/// What a cell shows once formatted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    /// Link to another page, with an optional second line under it
    Link {
        href: String,
        text: String,
        secondary: Option<String>,
    },
}

impl Cell {
    /// Text shown in the terminal
    pub fn plain(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Link { text, .. } => text.clone(),
        }
    }

    /// HTML as the admin page renders the cell
    pub fn to_markup(&self) -> String {
        match self {
            Cell::Text(text) => escape_html(text),
            Cell::Link {
                href,
                text,
                secondary,
            } => {
                let mut out = format!(
                    r#"<a href="{}" class="course-name">{}</a>"#,
                    escape_html(href),
                    escape_html(text)
                );
                if let Some(secondary) = secondary {
                    out.push_str(&format!(
                        r#"<div class="course-id">{}</div>"#,
                        escape_html(secondary)
                    ));
                }
                out
            }
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Rows the grid can show: it must be able to hand out a column's raw value
pub trait GridRow {
    fn field(&self, data: &str) -> Option<String>;
}

type CellRenderer<R> = Arc<dyn Fn(&str, &R) -> Cell + Send + Sync>;

/// One column of the grid
pub struct ColumnDef<R> {
    pub title: Option<String>,
    /// Row field shown in the column
    pub data: String,
    /// Field name the server sorts on, when it differs from `data`
    pub name: Option<String>,
    pub searchable: bool,
    pub orderable: bool,
    pub visible: bool,
    render: Option<CellRenderer<R>>,
}

impl<R> Clone for ColumnDef<R> {
    fn clone(&self) -> Self {
        Self {
            title: self.title.clone(),
            data: self.data.clone(),
            name: self.name.clone(),
            searchable: self.searchable,
            orderable: self.orderable,
            visible: self.visible,
            render: self.render.clone(),
        }
    }
}

impl<R> fmt::Debug for ColumnDef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("title", &self.title)
            .field("data", &self.data)
            .field("name", &self.name)
            .field("searchable", &self.searchable)
            .field("orderable", &self.orderable)
            .field("visible", &self.visible)
            .field("render", &self.render.is_some())
            .finish()
    }
}

impl<R> ColumnDef<R> {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            title: None,
            data: data.into(),
            name: None,
            searchable: true,
            orderable: true,
            visible: true,
            render: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn orderable(mut self, orderable: bool) -> Self {
        self.orderable = orderable;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Format cells with `render(raw_value, row)` instead of the raw value
    pub fn render(mut self, render: impl Fn(&str, &R) -> Cell + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn has_renderer(&self) -> bool {
        self.render.is_some()
    }

    pub fn cell(&self, raw: &str, row: &R) -> Cell {
        match &self.render {
            Some(render) => render(raw, row),
            None => Cell::Text(raw.to_string()),
        }
    }
}

/// Translated strings the grid shows around the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub next: String,
    pub previous: String,
    /// Uses `_START_`, `_END_` and `_TOTAL_`
    pub info: String,
    pub info_empty: String,
    /// Uses `_MAX_`
    pub info_filtered: String,
    /// Uses `_MENU_`
    pub length_menu: String,
    pub search: String,
    pub processing: String,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            next: "Next".to_string(),
            previous: "Previous".to_string(),
            info: "Showing _START_ to _END_ of _TOTAL_ entries".to_string(),
            info_empty: "Showing 0 to 0 of 0 entries".to_string(),
            info_filtered: "(filtered from _MAX_ total entries)".to_string(),
            length_menu: "Show _MENU_ entries".to_string(),
            search: "Search:".to_string(),
            processing: "Processing...".to_string(),
        }
    }
}

pub struct GridOptions<R> {
    pub server_side: bool,
    /// Endpoint path rows are fetched from
    pub ajax: String,
    pub auto_width: bool,
    pub length_menu: Vec<usize>,
    pub info: bool,
    pub paging: bool,
    pub order: Order,
    pub language: Language,
    pub columns: Vec<ColumnDef<R>>,
}

impl<R> Default for GridOptions<R> {
    fn default() -> Self {
        Self {
            server_side: false,
            ajax: String::new(),
            auto_width: true,
            length_menu: vec![10, 25, 50, 100],
            info: true,
            paging: true,
            order: Order::default(),
            language: Language::default(),
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid needs at least one column")]
    NoColumns,
    #[error("page length menu is empty")]
    EmptyLengthMenu,
    #[error("page length must be positive")]
    ZeroLength,
    #[error("order column {0} does not exist")]
    OrderOutOfRange(usize),
    #[error("server-side grid needs an endpoint")]
    MissingEndpoint,
}

/// Paging, ordering and search sent with each draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridState {
    pub draw: u64,
    pub start: usize,
    pub length: usize,
    pub search: String,
    pub order: Order,
}

/// Outcome of handing a page to the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Shown,
    /// Answer to an older draw; dropped
    Stale,
}

pub struct Grid<R> {
    options: GridOptions<R>,
    state: GridState,
    /// State of the draw whose rows are shown, once one succeeded
    shown: Option<GridState>,
    rows: Vec<R>,
    records_total: u64,
    records_filtered: u64,
    filter: FilterInput,
    filter_policy: FilterPolicy,
    processing: bool,
    last_error: Option<String>,
}

impl<R: GridRow> Grid<R> {
    pub fn new(options: GridOptions<R>) -> Result<Self, GridError> {
        if options.columns.is_empty() {
            return Err(GridError::NoColumns);
        }
        let length = *options.length_menu.first().ok_or(GridError::EmptyLengthMenu)?;
        if options.length_menu.contains(&0) {
            return Err(GridError::ZeroLength);
        }
        if options.order.column >= options.columns.len() {
            return Err(GridError::OrderOutOfRange(options.order.column));
        }
        if options.server_side && options.ajax.is_empty() {
            return Err(GridError::MissingEndpoint);
        }

        let state = GridState {
            draw: 0,
            start: 0,
            length,
            search: String::new(),
            order: options.order,
        };
        let filter = FilterInput::new(options.language.search.clone());

        tracing::debug!(
            "Grid created for {} with {} columns",
            options.ajax,
            options.columns.len()
        );

        Ok(Self {
            options,
            shown: None,
            state,
            rows: Vec::new(),
            records_total: 0,
            records_filtered: 0,
            filter,
            filter_policy: FilterPolicy::default(),
            processing: false,
            last_error: None,
        })
    }

    pub fn options(&self) -> &GridOptions<R> {
        &self.options
    }

    pub fn columns(&self) -> &[ColumnDef<R>] {
        &self.options.columns
    }

    pub fn language(&self) -> &Language {
        &self.options.language
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn records_total(&self) -> u64 {
        self.records_total
    }

    pub fn records_filtered(&self) -> u64 {
        self.records_filtered
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn filter(&self) -> &FilterInput {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterInput {
        &mut self.filter
    }

    pub fn set_filter_policy(&mut self, policy: FilterPolicy) {
        self.filter_policy = policy;
    }

    /// Start a new draw with the current state
    pub fn draw(&mut self) -> DrawRequest {
        self.state.draw += 1;
        self.processing = true;
        let params = protocol::encode(&self.state, &self.options.columns);
        tracing::debug!(
            "Draw {}: start={} length={} search={:?} order={}:{}",
            self.state.draw,
            self.state.start,
            self.state.length,
            self.state.search,
            self.state.order.column,
            self.state.order.dir.as_str()
        );
        DrawRequest {
            draw: self.state.draw,
            path: self.options.ajax.clone(),
            params,
        }
    }

    /// Set the global search value; takes effect on the next draw
    pub fn search(&mut self, value: impl Into<String>) -> &mut Self {
        self.state.search = value.into();
        self.state.start = 0;
        self
    }

    /// Feed a key to the filter input and draw if the filter policy says so
    pub fn filter_key(&mut self, key: FilterKey) -> Option<DrawRequest> {
        let changed = self.filter.apply(key);
        let value = self
            .filter_policy
            .on_keyup(self.filter.value(), key, changed)?;
        Some(self.search(value).draw())
    }

    /// Keep the rows of `page` if it answers the latest draw
    pub fn apply(&mut self, page: Page<R>) -> Applied {
        if page.draw != self.state.draw {
            tracing::debug!(
                "Dropping stale draw {} (latest is {})",
                page.draw,
                self.state.draw
            );
            return Applied::Stale;
        }

        self.processing = false;
        if let Some(error) = page.error {
            tracing::warn!("Server reported an error for draw {}: {}", page.draw, error);
            self.last_error = Some(error);
            self.restore_shown();
            return Applied::Shown;
        }

        self.last_error = None;
        self.shown = Some(self.state.clone());
        self.records_total = page.records_total;
        self.records_filtered = page.records_filtered;
        self.rows = page.data;
        Applied::Shown
    }

    /// Record that draw `draw` failed. Rows of the last good draw stay.
    pub fn fail(&mut self, draw: u64, error: impl Into<String>) -> Applied {
        if draw != self.state.draw {
            return Applied::Stale;
        }
        self.processing = false;
        self.last_error = Some(error.into());
        self.restore_shown();
        Applied::Shown
    }

    /// Go back to the paging, search and order of the rows on screen.
    /// The draw counter keeps counting.
    fn restore_shown(&mut self) {
        if let Some(shown) = &self.shown {
            self.state = GridState {
                draw: self.state.draw,
                ..shown.clone()
            };
        }
    }

    /// Zero-based index of the current page
    pub fn current_page(&self) -> usize {
        self.state.start / self.state.length
    }

    pub fn page_count(&self) -> usize {
        let length = self.state.length as u64;
        self.records_filtered.div_ceil(length).max(1) as usize
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page() + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.current_page().checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    pub fn first_page(&mut self) -> bool {
        self.go_to_page(0)
    }

    pub fn last_page(&mut self) -> bool {
        self.go_to_page(self.page_count() - 1)
    }

    /// Move to `page` if it exists. Returns true when the page changed.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.options.paging || page >= self.page_count() || page == self.current_page() {
            return false;
        }
        self.state.start = page * self.state.length;
        true
    }

    /// Switch to the next page length in the menu, back to the first page
    pub fn cycle_length(&mut self) -> usize {
        let menu = &self.options.length_menu;
        let next = menu
            .iter()
            .position(|&l| l == self.state.length)
            .map(|i| menu[(i + 1) % menu.len()])
            .unwrap_or(menu[0]);
        self.set_length(next);
        next
    }

    pub fn set_length(&mut self, length: usize) -> bool {
        if length == 0 || length == self.state.length {
            return false;
        }
        self.state.length = length;
        self.state.start = 0;
        true
    }

    /// Sort by `column`: a new column starts ascending, the same one flips.
    /// Returns false for columns that cannot be ordered.
    pub fn sort_by(&mut self, column: usize) -> bool {
        match self.options.columns.get(column) {
            Some(col) if col.orderable => {}
            _ => return false,
        }
        self.state.order = if self.state.order.column == column {
            Order {
                column,
                dir: self.state.order.dir.toggled(),
            }
        } else {
            Order {
                column,
                dir: SortDirection::Asc,
            }
        };
        true
    }

    /// Indices of the columns that are shown
    pub fn visible_columns(&self) -> Vec<usize> {
        self.options
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visible)
            .map(|(i, _)| i)
            .collect()
    }

    /// Formatted cells of `row` for the visible columns
    pub fn cells(&self, row: &R) -> Vec<Cell> {
        self.options
            .columns
            .iter()
            .filter(|c| c.visible)
            .map(|c| {
                let raw = row.field(&c.data).unwrap_or_default();
                c.cell(&raw, row)
            })
            .collect()
    }

    /// Summary line under the table
    pub fn info_text(&self) -> String {
        if !self.options.info {
            return String::new();
        }
        let lang = &self.options.language;
        let shown = self.rows.len();

        let mut text = if shown == 0 || self.records_filtered == 0 {
            lang.info_empty.clone()
        } else {
            let start = format_number((self.state.start + 1) as u64);
            let end = format_number((self.state.start + shown) as u64);
            let total = format_number(self.records_filtered);
            fill(
                &lang.info,
                &[
                    ("_START_", start.as_str()),
                    ("_END_", end.as_str()),
                    ("_TOTAL_", total.as_str()),
                ],
            )
        };

        if self.records_filtered != self.records_total {
            text.push(' ');
            let max = format_number(self.records_total);
            text.push_str(&fill(&lang.info_filtered, &[("_MAX_", max.as_str())]));
        }
        text
    }

    /// Page length selector text, with the current length in brackets
    pub fn length_menu_text(&self) -> String {
        let menu = format!("[{}]", self.state.length);
        fill(&self.options.language.length_menu, &[("_MENU_", menu.as_str())])
    }
}

/// Group digits in thousands with `,`
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
