//! Course list view
//!
//! Injects the page skeleton into its container and sets up the course grid
//! in the skeleton's grid slot. The grid is created once per container;
//! rendering again keeps the existing grid and its paging/search state.

use thiserror::Error;

use crate::courses::{course_columns, CellFormatter, Course, COURSES_ENDPOINT};
use crate::grid::filter::{FilterKey, FilterPolicy, InputStyle};
use crate::grid::protocol::{DrawRequest, Page};
use crate::grid::{Applied, Grid, GridError, GridOptions, Language, Order, SortDirection};
use crate::i18n::Localizer;

/// Page sizes offered in the length menu
pub const PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];

/// Name of the slot the grid binds to
pub const GRID_SLOT: &str = "courseTable";

/// Characters needed before typing in the filter searches
const MIN_SEARCH_CHARS: usize = 3;

/// Static skeleton of the course list page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Untranslated page heading
    pub heading: &'static str,
    pub grid_slot: &'static str,
}

pub const COURSE_LIST_TEMPLATE: Template = Template {
    heading: "Courses",
    grid_slot: GRID_SLOT,
};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("a grid is already attached to {0}")]
    AlreadyAttached(&'static str),
    #[error("no template injected")]
    NoTemplate,
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Screen region a view renders into
#[derive(Default)]
pub struct Container {
    template: Option<Template>,
    grid: Option<Grid<Course>>,
}

impl Container {
    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// Replace the container content with `template`. A grid attached to the
    /// same slot survives; one bound to a slot the new template lacks is dropped.
    pub fn inject(&mut self, template: Template) {
        let same_slot = self
            .template
            .map(|t| t.grid_slot == template.grid_slot)
            .unwrap_or(false);
        if !same_slot && self.grid.take().is_some() {
            tracing::debug!("Dropping grid bound to a replaced slot");
        }
        self.template = Some(template);
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    pub fn attach_grid(&mut self, grid: Grid<Course>) -> Result<&mut Grid<Course>, ViewError> {
        let template = self.template.ok_or(ViewError::NoTemplate)?;
        if self.grid.is_some() {
            return Err(ViewError::AlreadyAttached(template.grid_slot));
        }
        Ok(self.grid.insert(grid))
    }

    pub fn grid(&self) -> Option<&Grid<Course>> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut Grid<Course>> {
        self.grid.as_mut()
    }
}

pub struct CourseListView {
    el: Container,
    l10n: Box<dyn Localizer + Send>,
    formatter: CellFormatter,
    page_size: usize,
    pending_draw: Option<DrawRequest>,
}

impl CourseListView {
    pub fn new(l10n: Box<dyn Localizer + Send>, formatter: CellFormatter, page_size: usize) -> Self {
        Self {
            el: Container::default(),
            l10n,
            formatter,
            page_size,
            pending_draw: None,
        }
    }

    pub fn container(&self) -> &Container {
        &self.el
    }

    pub fn grid(&self) -> Option<&Grid<Course>> {
        self.el.grid()
    }

    pub fn translate(&self, key: &str) -> String {
        self.l10n.translate(key)
    }

    /// Inject the template and set up the course grid
    pub fn render(&mut self) -> Result<&mut Self, ViewError> {
        self.el.inject(COURSE_LIST_TEMPLATE);
        self.render_course_table()?;
        Ok(self)
    }

    /// Create the course grid unless one is already attached
    pub fn render_course_table(&mut self) -> Result<(), ViewError> {
        if self.el.has_grid() {
            tracing::debug!("Course grid already attached to {}", GRID_SLOT);
            return Ok(());
        }

        let filter_placeholder = self.l10n.translate("Search...");
        let options = self.grid_options();
        let page_size = self.page_size;

        let grid = self.el.attach_grid(Grid::new(options)?)?;
        grid.set_length(page_size);
        let first_draw = grid.draw();

        // The grid generates its own filter box; relabel and restyle it
        let filter = grid.filter_mut();
        filter.set_placeholder(filter_placeholder.clone());
        filter.set_label(filter_placeholder);
        filter.set_style(InputStyle::Themed);
        grid.set_filter_policy(FilterPolicy::MinChars(MIN_SEARCH_CHARS));

        tracing::info!("Course grid attached to {}", GRID_SLOT);
        self.pending_draw = Some(first_draw);
        Ok(())
    }

    fn grid_options(&self) -> GridOptions<Course> {
        let t = |key: &str| self.l10n.translate(key);
        GridOptions {
            server_side: true,
            ajax: COURSES_ENDPOINT.to_string(),
            auto_width: false,
            length_menu: PAGE_SIZES.to_vec(),
            info: true,
            paging: true,
            order: Order {
                column: 0,
                dir: SortDirection::Asc,
            },
            language: Language {
                next: t("Next"),
                previous: t("Previous"),
                // _START_, _END_ and _TOTAL_ are placeholders
                info: t("Displaying _START_ to _END_ of _TOTAL_ courses"),
                info_empty: t("No courses to display"),
                // _MAX_ is a placeholder
                info_filtered: t("(filtered from _MAX_ total courses)"),
                // _MENU_ is a placeholder
                length_menu: t("Display _MENU_ courses"),
                search: String::new(),
                processing: t("Loading courses..."),
            },
            columns: course_columns(self.l10n.as_ref(), self.formatter),
        }
    }

    /// Draw request waiting to be sent, if any
    pub fn take_draw(&mut self) -> Option<DrawRequest> {
        self.pending_draw.take()
    }

    /// Run `change` on the grid and queue a draw when it reports a change
    fn redraw_if(&mut self, change: impl FnOnce(&mut Grid<Course>) -> bool) -> bool {
        let Some(grid) = self.el.grid_mut() else {
            return false;
        };
        if change(grid) {
            self.pending_draw = Some(grid.draw());
            true
        } else {
            false
        }
    }

    pub fn filter_key(&mut self, key: FilterKey) -> bool {
        let Some(grid) = self.el.grid_mut() else {
            return false;
        };
        match grid.filter_key(key) {
            Some(request) => {
                self.pending_draw = Some(request);
                true
            }
            None => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        self.redraw_if(|g| g.next_page())
    }

    pub fn previous_page(&mut self) -> bool {
        self.redraw_if(|g| g.previous_page())
    }

    pub fn first_page(&mut self) -> bool {
        self.redraw_if(|g| g.first_page())
    }

    pub fn last_page(&mut self) -> bool {
        self.redraw_if(|g| g.last_page())
    }

    pub fn cycle_length(&mut self) -> bool {
        self.redraw_if(|g| {
            g.cycle_length();
            true
        })
    }

    /// Sort by the n-th visible column
    pub fn sort_by_visible(&mut self, n: usize) -> bool {
        self.redraw_if(|g| match g.visible_columns().get(n) {
            Some(&column) => g.sort_by(column),
            None => false,
        })
    }

    /// Search for `value` from the first page, bypassing the filter box
    pub fn search(&mut self, value: &str) -> bool {
        self.redraw_if(|g| {
            g.search(value);
            true
        })
    }

    /// Jump to a zero-based page; only pages of the last answered draw exist
    pub fn go_to_page(&mut self, page: usize) -> bool {
        self.redraw_if(|g| g.go_to_page(page))
    }

    pub fn reload(&mut self) -> bool {
        self.redraw_if(|_| true)
    }

    pub fn apply_page(&mut self, page: Page<Course>) -> Applied {
        match self.el.grid_mut() {
            Some(grid) => grid.apply(page),
            None => Applied::Stale,
        }
    }

    pub fn fail_draw(&mut self, draw: u64, error: impl Into<String>) -> Applied {
        match self.el.grid_mut() {
            Some(grid) => grid.fail(draw, error),
            None => Applied::Stale,
        }
    }
}
