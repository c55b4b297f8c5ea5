use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Cell as TableCell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{App, Focus, Popup};
use crate::courses::Course;
use crate::grid::filter::InputStyle;
use crate::grid::{Cell, Grid, SortDirection};
use crate::theme::Theme;

// Load theme colors once at startup
static THEME: OnceLock<Theme> = OnceLock::new();

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::load)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Length(3), // Filter input
            Constraint::Min(4),    // Course table
            Constraint::Length(1), // Summary + pager
            Constraint::Length(1), // Key hints
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);

    if let Some(grid) = app.view.grid() {
        draw_filter(f, app, grid, chunks[1]);
        draw_table(f, app, grid, chunks[2]);
        draw_summary(f, grid, chunks[3]);
    }
    draw_footer(f, app, chunks[4]);

    if app.popup == Popup::Help {
        draw_help_popup(f);
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let heading = app
        .view
        .container()
        .template()
        .map(|t| app.view.translate(t.heading))
        .unwrap_or_default();

    // Priority: status message > grid error > processing > heading
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status.as_str(), Style::default().fg(warning())))
    } else if let Some(error) = app.view.grid().and_then(|g| g.last_error()) {
        Line::from(vec![
            Span::styled("✗ ", Style::default().fg(danger())),
            Span::styled(error, Style::default().fg(danger())),
            Span::styled("  (R to retry)", Style::default().fg(text_dim())),
        ])
    } else if let Some(grid) = app.view.grid().filter(|g| g.is_processing()) {
        Line::from(Span::styled(
            grid.language().processing.as_str(),
            Style::default().fg(text_dim()),
        ))
    } else {
        Line::from(Span::styled(
            heading,
            Style::default().fg(accent()).add_modifier(Modifier::BOLD),
        ))
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_filter(f: &mut Frame, app: &App, grid: &Grid<Course>, area: Rect) {
    let input = grid.filter();
    let is_active = app.focus == Focus::Filter;
    let border_color = if is_active { accent() } else { inactive() };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    if input.style() == InputStyle::Themed {
        block = block.border_type(BorderType::Rounded);
    }
    if let Some(label) = input.label() {
        block = block.title(Span::styled(
            format!(" {} ", label),
            Style::default().fg(border_color),
        ));
    }

    let content = if input.value().is_empty() {
        Line::from(Span::styled(
            input.placeholder().unwrap_or_default(),
            Style::default().fg(text_dim()).add_modifier(Modifier::ITALIC),
        ))
    } else {
        Line::from(Span::styled(input.value(), Style::default().fg(text())))
    };

    f.render_widget(Paragraph::new(content).block(block), area);

    if is_active {
        let x = area.x + 1 + input.cursor_width() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_table(f: &mut Frame, app: &App, grid: &Grid<Course>, area: Rect) {
    let is_active = app.focus == Focus::Table;
    let border_color = if is_active { accent() } else { inactive() };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let visible = grid.visible_columns();
    let order = grid.state().order;

    let header_cells: Vec<TableCell> = visible
        .iter()
        .map(|&i| {
            let col = &grid.columns()[i];
            let mut title = col.title.clone().unwrap_or_default();
            if order.column == i {
                title.push_str(match order.dir {
                    SortDirection::Asc => " ▲",
                    SortDirection::Desc => " ▼",
                });
            }
            TableCell::from(Span::styled(
                title,
                Style::default().fg(header()).add_modifier(Modifier::BOLD),
            ))
        })
        .collect();

    let rows: Vec<Row> = if grid.rows().is_empty() {
        let message = if grid.is_processing() {
            grid.language().processing.clone()
        } else {
            grid.language().info_empty.clone()
        };
        vec![Row::new(vec![TableCell::from(Span::styled(
            format!("  {}", message),
            Style::default().fg(text_dim()),
        ))])]
    } else {
        grid.rows()
            .iter()
            .enumerate()
            .map(|(i, course)| {
                let cells: Vec<TableCell> = grid.cells(course).iter().map(cell_widget).collect();
                let style = if i == app.selected_row && is_active {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };
                Row::new(cells).height(2).style(style)
            })
            .collect()
    };

    let widths = column_widths(visible.len(), grid.options().auto_width);

    let table = Table::new(rows, widths)
        .header(Row::new(header_cells).bottom_margin(1))
        .block(block);

    f.render_widget(table, area);
}

/// Name column gets half the width unless the grid sizes columns itself
fn column_widths(count: usize, auto_width: bool) -> Vec<Constraint> {
    if auto_width || count <= 1 {
        return vec![Constraint::Fill(1); count];
    }
    let rest = 50 / (count as u16 - 1);
    std::iter::once(Constraint::Percentage(50))
        .chain(std::iter::repeat(Constraint::Percentage(rest)).take(count - 1))
        .collect()
}

fn cell_widget(cell: &Cell) -> TableCell<'static> {
    match cell {
        Cell::Text(value) => TableCell::from(Span::styled(value.clone(), Style::default().fg(text()))),
        Cell::Link {
            text: label,
            secondary,
            ..
        } => {
            let mut lines = vec![Line::from(Span::styled(
                label.clone(),
                Style::default().fg(accent()).add_modifier(Modifier::UNDERLINED),
            ))];
            if let Some(secondary) = secondary {
                lines.push(Line::from(Span::styled(
                    secondary.clone(),
                    Style::default().fg(text_dim()),
                )));
            }
            TableCell::from(Text::from(lines))
        }
    }
}

fn draw_summary(f: &mut Frame, grid: &Grid<Course>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(20),
            Constraint::Percentage(30),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(grid.info_text(), Style::default().fg(text_dim()))),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(Span::styled(grid.length_menu_text(), Style::default().fg(text_dim())))
            .alignment(Alignment::Center),
        chunks[1],
    );

    let lang = grid.language();
    let page = grid.current_page();
    let pages = grid.page_count();
    let enabled = |on: bool| {
        if on {
            Style::default().fg(accent())
        } else {
            Style::default().fg(inactive())
        }
    };
    let pager = Line::from(vec![
        Span::styled(format!("‹ {}", lang.previous), enabled(page > 0)),
        Span::styled(format!("  {}/{}  ", page + 1, pages), Style::default().fg(text())),
        Span::styled(format!("{} ›", lang.next), enabled(page + 1 < pages)),
    ]);
    f.render_widget(Paragraph::new(pager).alignment(Alignment::Right), chunks[2]);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints: &[(&str, &str)] = match app.focus {
        Focus::Filter => &[("Enter", "search"), ("Esc", "back")],
        Focus::Table => &[
            ("/", "search"),
            ("n/p", "page"),
            ("l", "page size"),
            ("1-3", "sort"),
            ("o", "open"),
            ("?", "help"),
            ("q", "quit"),
        ],
    };

    let mut spans = Vec::new();
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(inactive())));
        }
        spans.push(Span::styled(*key, Style::default().fg(accent())));
        spans.push(Span::styled(format!(" {}", action), Style::default().fg(text_dim())));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).alignment(Alignment::Center), area);
}

fn draw_help_popup(f: &mut Frame) {
    let popup_area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(
            title,
            Style::default().fg(header()).add_modifier(Modifier::BOLD),
        ))
    };
    let entry = |key: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<10}", key), Style::default().fg(accent())),
            Span::raw(what),
        ])
    };

    let help_text = vec![
        section("═══ Search ═══"),
        entry("/", "Focus the search box"),
        Line::from(Span::styled(
            "            Searches from 3 characters, on Enter, or when cleared",
            Style::default().fg(text_dim()),
        )),
        entry("Esc", "Leave the search box"),
        Line::from(""),
        section("═══ Pages ═══"),
        entry("n/→", "Next page"),
        entry("p/←", "Previous page"),
        entry("g/G", "First/last page"),
        entry("l", "Cycle page size (10, 25, 50, 100)"),
        Line::from(""),
        section("═══ Courses ═══"),
        entry("↑/↓ j/k", "Move selection"),
        entry("1-3", "Sort by column (again to reverse)"),
        entry("o/Enter", "Open the course page"),
        entry("R", "Reload the current page"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" coursegrid Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
