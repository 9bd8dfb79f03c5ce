//! View models for dashboard templates.
//! These are the typed structs that templates render; no warehouse access here.

use common::error::ShapeError;
use common::table::{Cell, ColumnKind, ResultTable};
use serde::Serialize;

/// One KPI card.
pub struct Kpi {
    pub label: &'static str,
    pub value: String,
}

impl Kpi {
    pub fn new(label: &'static str, value: String) -> Self {
        Self { label, value }
    }
}

const MISSING: &str = "n/a";

/// `$1.23B`
pub fn usd_billions(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |v| format!("${:.2}B", v / 1e9))
}

/// `1.23M Txns`
pub fn txns_millions(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |v| format!("{:.2}M Txns", v / 1e6))
}

/// `12.34K Addresses`
pub fn addresses_thousands(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |v| format!("{:.2}K Addresses", v / 1e3))
}

/// `$1.23K`
pub fn usd_thousands(v: Option<f64>) -> String {
    v.map_or_else(|| MISSING.to_string(), |v| format!("${:.2}K", v / 1e3))
}

/// Fixed decimals with comma thousands separators, e.g. `1,234,567.8`.
pub fn grouped(v: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, v.abs());
    let (int, frac) = fixed.split_once('.').map_or((fixed.as_str(), None), |(i, f)| (i, Some(f)));

    let mut out = String::with_capacity(fixed.len() + int.len() / 3 + 1);
    if v < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn grouped_or_missing(v: Option<f64>, decimals: usize, prefix: &str, suffix: &str) -> String {
    v.map_or_else(
        || MISSING.to_string(),
        |v| format!("{prefix}{}{suffix}", grouped(v, decimals)),
    )
}

/// A table ready for HTML: headers plus pre-formatted cells.
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_table(table: &ResultTable) -> Self {
        let headers = table.columns().iter().map(|c| c.name.clone()).collect();
        let rows = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(table.columns())
                    .map(|(cell, column)| format_cell(cell, column.kind))
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }
}

fn format_cell(cell: &Cell, kind: ColumnKind) -> String {
    match (cell, kind) {
        (Cell::Number(v), ColumnKind::Number) if v.fract() == 0.0 => grouped(*v, 0),
        (Cell::Number(v), _) => grouped(*v, 1),
        _ => cell.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    Bar,
    Line,
    Scatter,
    Pie,
}

/// One trace. For pies, `x` holds slice labels and `y` slice values.
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub x: Vec<String>,
    pub y: Vec<Option<f64>>,
    /// Plot against the right-hand axis.
    pub secondary: bool,
}

impl Series {
    pub fn from_columns(
        table: &ResultTable,
        kind: SeriesKind,
        x: &str,
        y: &str,
    ) -> Result<Self, ShapeError> {
        Ok(Self {
            name: y.to_string(),
            kind,
            x: table.texts(x)?,
            y: table.numbers(y)?,
            secondary: false,
        })
    }

    pub fn on_secondary_axis(mut self) -> Self {
        self.secondary = true;
        self
    }

    /// One series per distinct value of `group`, in order of first appearance.
    pub fn grouped_by(
        table: &ResultTable,
        kind: SeriesKind,
        group: &str,
        x: &str,
        y: &str,
    ) -> Result<Vec<Self>, ShapeError> {
        let groups = table.texts(group)?;
        let xs = table.texts(x)?;
        let ys = table.numbers(y)?;
        let mut out: Vec<Self> = Vec::new();
        for ((g, x), y) in groups.into_iter().zip(xs).zip(ys) {
            let series = if let Some(i) = out.iter().position(|s| s.name == g) {
                &mut out[i]
            } else {
                out.push(Self {
                    name: g,
                    kind,
                    x: Vec::new(),
                    y: Vec::new(),
                    secondary: false,
                });
                let last = out.len() - 1;
                &mut out[last]
            };
            series.x.push(x);
            series.y.push(y);
        }
        Ok(out)
    }
}

/// Chart description rendered client-side; the server does no drawing.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    pub x_title: Option<String>,
    pub y_title: Option<String>,
    pub y2_title: Option<String>,
    /// Stack bars, or for pies the donut hole ratio is applied.
    pub stacked: bool,
    pub horizontal: bool,
    pub series: Vec<Series>,
}

impl ChartSpec {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            x_title: None,
            y_title: None,
            y2_title: None,
            stacked: false,
            horizontal: false,
            series: Vec::new(),
        }
    }

    pub fn axes(mut self, x: &str, y: &str) -> Self {
        self.x_title = Some(x.to_string());
        self.y_title = Some(y.to_string());
        self
    }

    pub fn secondary_axis(mut self, title: &str) -> Self {
        self.y2_title = Some(title.to_string());
        self
    }

    pub fn stacked(mut self) -> Self {
        self.stacked = true;
        self
    }

    pub fn horizontal(mut self) -> Self {
        self.horizontal = true;
        self
    }

    pub fn with(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_all(mut self, series: Vec<Series>) -> Self {
        self.series.extend(series);
        self
    }

    /// JSON for a `data-spec` attribute. Serialization of these plain structs cannot fail.
    pub fn json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::table::Column;

    #[test]
    fn test_kpi_formatting() {
        assert_eq!(usd_billions(Some(1_234_000_000.0)), "$1.23B");
        assert_eq!(txns_millions(Some(2_500_000.0)), "2.50M Txns");
        assert_eq!(addresses_thousands(Some(45_678.0)), "45.68K Addresses");
        assert_eq!(usd_thousands(Some(1_500.0)), "$1.50K");
        assert_eq!(usd_billions(None), "n/a");
    }

    #[test]
    fn test_grouped() {
        assert_eq!(grouped(1_234_567.0, 0), "1,234,567");
        assert_eq!(grouped(1_234.56, 1), "1,234.6");
        assert_eq!(grouped(999.0, 0), "999");
        assert_eq!(grouped(-12_345.0, 0), "-12,345");
        assert_eq!(grouped(-0.01, 0), "0");
        assert_eq!(grouped_or_missing(Some(42.0), 0, "", " Txns"), "42 Txns");
    }

    #[test]
    fn test_table_view_formats_numbers() {
        let t = ResultTable::new(
            vec![Column::text("Route"), Column::number("Volume")],
            vec![vec!["a➡b".into(), 12_345.0.into()], vec!["c➡d".into(), 2.34.into()]],
        );
        let view = TableView::from_table(&t);
        assert_eq!(view.headers, vec!["Route", "Volume"]);
        assert_eq!(view.rows[0], vec!["a➡b", "12,345"]);
        assert_eq!(view.rows[1][1], "2.3");
    }

    #[test]
    fn test_grouped_series_preserve_first_appearance() {
        let t = ResultTable::new(
            vec![Column::text("Date"), Column::text("Chain"), Column::number("Bridges")],
            vec![
                vec!["2024-01".into(), "ethereum".into(), 3.0.into()],
                vec!["2024-01".into(), "base".into(), 1.0.into()],
                vec!["2024-02".into(), "ethereum".into(), 4.0.into()],
            ],
        );
        let series = Series::grouped_by(&t, SeriesKind::Bar, "Chain", "Date", "Bridges").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "ethereum");
        assert_eq!(series[0].y, vec![Some(3.0), Some(4.0)]);
        assert_eq!(series[1].x, vec!["2024-01"]);
    }

    #[test]
    fn test_chart_json_shape() {
        let spec = ChartSpec::new("bridges", "Number of Bridges Over Time")
            .axes("Date", "Bridges")
            .with(Series {
                name: "Bridges".to_string(),
                kind: SeriesKind::Bar,
                x: vec!["2024-01-01".to_string()],
                y: vec![None],
                secondary: false,
            });
        let v: serde_json::Value = serde_json::from_str(&spec.json()).unwrap();
        assert_eq!(v["series"][0]["kind"], "bar");
        assert!(v["series"][0]["y"][0].is_null());
        assert_eq!(v["title"], "Number of Bridges Over Time");
    }
}
