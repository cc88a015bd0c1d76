//! Structural queries over fetched pages.
//!
//! The site renders listings as deeply nested table soup; this module is the
//! only place that knows the shapes. Everything returns plain data so the
//! scheduler crates never touch the parser.

use scraper::{ElementRef, Html, Selector};

/// One row of the schedule-browse listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleRow {
    /// Course-name column, non-breaking spaces normalized, e.g. `CAS CS585 A1`.
    pub label: String,
    /// Value of the row's select control when the section is open for
    /// registration; `None` when the control is absent (closed/blocked).
    pub select_value: Option<String>,
}

/// A parsed page.
pub struct Document {
    html: Html,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().replace('\u{a0}', " ").trim().to_string()
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn title(&self) -> Option<String> {
        let sel = selector("title");
        self.html.select(&sel).next().map(text_of)
    }

    /// Rows of the first form's schedule table. Rows with fewer than 11
    /// columns or an empty first cell are headers/spacers and are skipped.
    pub fn schedule_rows(&self) -> Vec<ScheduleRow> {
        let row_sel = selector("form table tr");
        let cell_sel = selector("td");
        let select_sel = selector("input[name='SelectIt']");

        let mut rows = Vec::new();
        for row in self.html.select(&row_sel) {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            // Fewer than 11 columns is a header; an empty first cell is a spacer.
            if cells.len() < 11 || cells[0].inner_html().trim().is_empty() {
                continue;
            }
            let select_value = cells[0]
                .select(&select_sel)
                .next()
                .and_then(|input| input.value().attr("value"))
                .map(str::to_string);
            rows.push(ScheduleRow {
                label: text_of(cells[2]),
                select_value,
            });
        }
        rows
    }

    /// `src` of the status icon on the add-classes confirmation page.
    pub fn confirmation_icon(&self) -> Option<String> {
        let row_sel = selector("tr[align='center'][valign='top']");
        let img_sel = selector("img");
        self.html
            .select(&row_sel)
            .next()
            .and_then(|row| row.select(&img_sel).next())
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string)
    }

    /// Reason text rendered next to a failed confirmation icon.
    pub fn confirmation_reason(&self) -> Option<String> {
        let row_sel = selector("tr[align='center'][valign='top']");
        let cell_sel = selector("td");
        let font_sel = selector("font");
        let row = self.html.select(&row_sel).next()?;
        let last_cell = row.select(&cell_sel).last()?;
        let font = last_cell.select(&font_sel).next()?;
        let reason = text_of(font);
        if reason.is_empty() { None } else { Some(reason) }
    }

    /// Whether any element matches the CSS selector.
    pub fn has(&self, css: &str) -> bool {
        Selector::parse(css)
            .ok()
            .map(|sel| self.html.select(&sel).next().is_some())
            .unwrap_or(false)
    }

    /// Text of the first element matching the CSS selector.
    pub fn text(&self, css: &str) -> Option<String> {
        let sel = Selector::parse(css).ok()?;
        self.html.select(&sel).next().map(text_of)
    }
}
