//! DataTables server-side wire format
//!
//! Requests carry paging, ordering and search state as flat query
//! parameters (`start`, `length`, `order[0][column]`, `columns[i][data]`,
//! ...). The server echoes `draw` back so out-of-order responses can be
//! told apart.

use serde::{Deserialize, Deserializer};

use super::{ColumnDef, GridState};

/// One page of rows as returned by the endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<R> {
    #[serde(deserialize_with = "draw_number")]
    pub draw: u64,
    pub records_total: u64,
    pub records_filtered: u64,
    #[serde(default = "Vec::new")]
    pub data: Vec<R>,
    /// Set by the server when it could not answer the draw
    #[serde(default)]
    pub error: Option<String>,
}

/// A request for one draw of the grid
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRequest {
    pub draw: u64,
    /// Endpoint path, possibly with its own fixed query (`?format=datatables`)
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl DrawRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Encode the grid state as DataTables server-side parameters
pub fn encode<R>(state: &GridState, columns: &[ColumnDef<R>]) -> Vec<(String, String)> {
    let mut params = vec![
        ("draw".to_string(), state.draw.to_string()),
        ("start".to_string(), state.start.to_string()),
        ("length".to_string(), state.length.to_string()),
        ("search[value]".to_string(), state.search.clone()),
        ("search[regex]".to_string(), "false".to_string()),
        ("order[0][column]".to_string(), state.order.column.to_string()),
        ("order[0][dir]".to_string(), state.order.dir.as_str().to_string()),
    ];

    for (i, col) in columns.iter().enumerate() {
        params.push((format!("columns[{i}][data]"), col.data.clone()));
        params.push((
            format!("columns[{i}][name]"),
            col.name.clone().unwrap_or_default(),
        ));
        params.push((format!("columns[{i}][searchable]"), col.searchable.to_string()));
        params.push((format!("columns[{i}][orderable]"), col.orderable.to_string()));
        params.push((format!("columns[{i}][search][value]"), String::new()));
        params.push((format!("columns[{i}][search][regex]"), "false".to_string()));
    }

    params
}

/// Servers differ on whether `draw` comes back as a number or a string
fn draw_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Draw {
        Number(u64),
        Text(String),
    }

    match Draw::deserialize(deserializer)? {
        Draw::Number(n) => Ok(n),
        Draw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Order, SortDirection};

    #[derive(Debug, Deserialize)]
    struct Row {
        id: String,
    }

    fn columns() -> Vec<ColumnDef<Row>> {
        vec![
            ColumnDef::new("name").title("Course"),
            ColumnDef::new("type").title("Course Type").searchable(false).orderable(false),
            ColumnDef::new("last_edited").name("modified"),
            ColumnDef::new("id").visible(false),
        ]
    }

    #[test]
    fn test_encode_state() {
        let state = GridState {
            draw: 3,
            start: 20,
            length: 10,
            search: "intro".to_string(),
            order: Order {
                column: 2,
                dir: SortDirection::Desc,
            },
        };
        let params = encode(&state, &columns());
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("draw"), Some("3"));
        assert_eq!(get("start"), Some("20"));
        assert_eq!(get("length"), Some("10"));
        assert_eq!(get("search[value]"), Some("intro"));
        assert_eq!(get("order[0][column]"), Some("2"));
        assert_eq!(get("order[0][dir]"), Some("desc"));
        assert_eq!(get("columns[0][data]"), Some("name"));
        assert_eq!(get("columns[0][name]"), Some(""));
        assert_eq!(get("columns[1][searchable]"), Some("false"));
        assert_eq!(get("columns[1][orderable]"), Some("false"));
        assert_eq!(get("columns[2][name]"), Some("modified"));
        assert_eq!(get("columns[3][data]"), Some("id"));
        assert_eq!(get("columns[3][searchable]"), Some("true"));
    }

    #[test]
    fn test_decode_page() {
        let json = r#"{
            "draw": 2,
            "recordsTotal": 120,
            "recordsFiltered": 57,
            "data": [{"id": "course-v1:edX+DemoX+Demo"}]
        }"#;
        let page: Page<Row> = serde_json::from_str(json).unwrap();
        assert_eq!(page.draw, 2);
        assert_eq!(page.records_total, 120);
        assert_eq!(page.records_filtered, 57);
        assert_eq!(page.data[0].id, "course-v1:edX+DemoX+Demo");
        assert!(page.error.is_none());
    }

    #[test]
    fn test_decode_string_draw_and_error() {
        let json = r#"{"draw": "5", "recordsTotal": 0, "recordsFiltered": 0, "error": "boom"}"#;
        let page: Page<Row> = serde_json::from_str(json).unwrap();
        assert_eq!(page.draw, 5);
        assert!(page.data.is_empty());
        assert_eq!(page.error.as_deref(), Some("boom"));
    }
}
