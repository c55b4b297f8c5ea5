//! Course rows and how their cells are formatted

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::grid::{Cell, ColumnDef, GridRow};
use crate::i18n::Localizer;

/// Endpoint the course grid reads from
pub const COURSES_ENDPOINT: &str = "/api/v2/courses/?format=datatables";

/// Display format of the "Last Edited" column, e.g. `March 05, 2021, 2:30 PM`
const LAST_EDITED_FORMAT: &str = "%B %d, %Y, %-I:%M %p";

/// One row of the course list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub course_type: String,
    #[serde(default)]
    pub last_edited: Option<String>,
}

impl Course {
    /// Path of the page where the course is edited
    pub fn page_path(&self) -> String {
        course_path(&self.id)
    }
}

impl GridRow for Course {
    fn field(&self, data: &str) -> Option<String> {
        match data {
            "id" => Some(self.id.clone()),
            "name" => Some(self.name.clone()),
            "type" => Some(self.course_type.clone()),
            "last_edited" => self.last_edited.clone(),
            _ => None,
        }
    }
}

pub fn course_path(id: &str) -> String {
    format!("/courses/{}/", id)
}

/// Columns of the course grid, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseColumn {
    Name,
    Type,
    LastEdited,
    Id,
}

impl CourseColumn {
    pub const ALL: [CourseColumn; 4] = [
        CourseColumn::Name,
        CourseColumn::Type,
        CourseColumn::LastEdited,
        CourseColumn::Id,
    ];

    /// Row field the column reads
    pub fn data(&self) -> &'static str {
        match self {
            CourseColumn::Name => "name",
            CourseColumn::Type => "type",
            CourseColumn::LastEdited => "last_edited",
            CourseColumn::Id => "id",
        }
    }
}

/// Zone timestamps with an offset are shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Utc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CellFormatter {
    pub zone: DisplayZone,
}

impl CellFormatter {
    pub fn new(zone: DisplayZone) -> Self {
        Self { zone }
    }

    /// Format the cell of `column` for `row`, given the column's raw value
    pub fn format_cell(&self, column: CourseColumn, raw: &str, row: &Course) -> Cell {
        match column {
            CourseColumn::Name => Cell::Link {
                href: row.page_path(),
                text: row.name.clone(),
                secondary: Some(row.id.clone()),
            },
            CourseColumn::Type => Cell::Text(capitalize(&row.course_type)),
            CourseColumn::LastEdited => {
                let raw = row.last_edited.as_deref().unwrap_or(raw);
                match format_timestamp(raw, self.zone) {
                    Some(text) => Cell::Text(text),
                    None => {
                        if !raw.is_empty() {
                            tracing::debug!("Unparseable timestamp {:?} for course {}", raw, row.id);
                        }
                        Cell::Text(raw.to_string())
                    }
                }
            }
            CourseColumn::Id => Cell::Text(raw.to_string()),
        }
    }
}

/// Column definitions for the course grid
pub fn course_columns(l10n: &dyn Localizer, formatter: CellFormatter) -> Vec<ColumnDef<Course>> {
    let render = move |column: CourseColumn| {
        move |raw: &str, row: &Course| formatter.format_cell(column, raw, row)
    };

    vec![
        ColumnDef::new(CourseColumn::Name.data())
            .title(l10n.translate("Course"))
            .render(render(CourseColumn::Name)),
        ColumnDef::new(CourseColumn::Type.data())
            .title(l10n.translate("Course Type"))
            .render(render(CourseColumn::Type))
            .searchable(false)
            .orderable(false),
        ColumnDef::new(CourseColumn::LastEdited.data())
            .title(l10n.translate("Last Edited"))
            .name("modified")
            .render(render(CourseColumn::LastEdited)),
        ColumnDef::new(CourseColumn::Id.data())
            .visible(false)
            .searchable(true),
    ]
}

/// Upper-case the first character, leave the rest alone
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a timestamp as `Month DD, YYYY, h:mm AM/PM`.
///
/// Timestamps carrying an offset are converted to `zone`; ones without are
/// shown as written. Returns `None` when `raw` is not a timestamp.
pub fn format_timestamp(raw: &str, zone: DisplayZone) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let text = match zone {
            DisplayZone::Local => dt.with_timezone(&Local).format(LAST_EDITED_FORMAT).to_string(),
            DisplayZone::Utc => dt.with_timezone(&Utc).format(LAST_EDITED_FORMAT).to_string(),
        };
        return Some(text);
    }

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(naive.format(LAST_EDITED_FORMAT).to_string())
}

/// Course ids are strings, but some deployments number them
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;

    fn course(id: &str, name: &str) -> Course {
        Course {
            id: id.to_string(),
            name: name.to_string(),
            course_type: "verified".to_string(),
            last_edited: Some("2021-03-05T14:30:00".to_string()),
        }
    }

    #[test]
    fn test_name_cell_links_to_course_page() {
        let row = course("7", "Intro to Testing");
        let cell = CellFormatter::default().format_cell(CourseColumn::Name, "Intro to Testing", &row);

        assert_eq!(
            cell,
            Cell::Link {
                href: "/courses/7/".to_string(),
                text: "Intro to Testing".to_string(),
                secondary: Some("7".to_string()),
            }
        );
        assert_eq!(
            cell.to_markup(),
            r#"<a href="/courses/7/" class="course-name">Intro to Testing</a><div class="course-id">7</div>"#
        );
    }

    #[test]
    fn test_type_cell_is_capitalized() {
        let row = course("7", "Intro to Testing");
        let cell = CellFormatter::default().format_cell(CourseColumn::Type, "verified", &row);
        assert_eq!(cell, Cell::Text("Verified".to_string()));
    }

    #[test]
    fn test_last_edited_cell() {
        let row = course("7", "Intro to Testing");
        let cell = CellFormatter::default().format_cell(
            CourseColumn::LastEdited,
            "2021-03-05T14:30:00",
            &row,
        );
        assert_eq!(cell, Cell::Text("March 05, 2021, 2:30 PM".to_string()));
    }

    #[test]
    fn test_unparseable_timestamp_is_shown_raw() {
        let mut row = course("7", "Intro to Testing");
        row.last_edited = Some("yesterday".to_string());
        let cell = CellFormatter::default().format_cell(CourseColumn::LastEdited, "yesterday", &row);
        assert_eq!(cell, Cell::Text("yesterday".to_string()));

        row.last_edited = None;
        let cell = CellFormatter::default().format_cell(CourseColumn::LastEdited, "", &row);
        assert_eq!(cell, Cell::Text(String::new()));
    }

    #[test]
    fn test_format_timestamp_variants() {
        let utc = DisplayZone::Utc;
        assert_eq!(
            format_timestamp("2021-03-05T14:30:00", utc).as_deref(),
            Some("March 05, 2021, 2:30 PM")
        );
        assert_eq!(
            format_timestamp("2021-03-05T14:30:00.123456Z", utc).as_deref(),
            Some("March 05, 2021, 2:30 PM")
        );
        assert_eq!(
            format_timestamp("2021-03-05T16:30:00+02:00", utc).as_deref(),
            Some("March 05, 2021, 2:30 PM")
        );
        assert_eq!(
            format_timestamp("2021-12-24 00:05", utc).as_deref(),
            Some("December 24, 2021, 12:05 AM")
        );
        assert_eq!(
            format_timestamp("2021-07-01", utc).as_deref(),
            Some("July 01, 2021, 12:00 AM")
        );
        assert_eq!(format_timestamp("", utc), None);
        assert_eq!(format_timestamp("not a date", utc), None);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("professional"), "Professional");
        assert_eq!(capitalize("credit course"), "Credit course");
        assert_eq!(capitalize("éclair"), "Éclair");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_course_columns_layout() {
        let columns = course_columns(&Catalog::source("en"), CellFormatter::default());
        assert_eq!(columns.len(), 4);

        let data: Vec<&str> = columns.iter().map(|c| c.data.as_str()).collect();
        assert_eq!(data, vec!["name", "type", "last_edited", "id"]);

        assert_eq!(columns[0].title.as_deref(), Some("Course"));
        assert!(columns[0].has_renderer());

        assert_eq!(columns[1].title.as_deref(), Some("Course Type"));
        assert!(!columns[1].searchable);
        assert!(!columns[1].orderable);

        assert_eq!(columns[2].title.as_deref(), Some("Last Edited"));
        assert_eq!(columns[2].name.as_deref(), Some("modified"));
        assert!(columns[2].orderable);

        assert_eq!(columns[3].title, None);
        assert!(!columns[3].visible);
        assert!(columns[3].searchable);
        assert!(!columns[3].has_renderer());
    }

    #[test]
    fn test_course_deserializes_numeric_id() {
        let json = r#"{"id": 7, "name": "Intro to Testing", "type": "audit", "last_edited": null}"#;
        let row: Course = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, "7");
        assert_eq!(row.course_type, "audit");
        assert_eq!(row.last_edited, None);
        assert_eq!(row.field("type").as_deref(), Some("audit"));
        assert_eq!(row.field("last_edited"), None);
        assert_eq!(row.field("unknown"), None);
    }
}
