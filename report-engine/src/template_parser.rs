//! FILENAME: report-engine/src/template_parser.rs
//! PURPOSE: Turns a spreadsheet document into a band-tagged report template.
//! CONTEXT: Template authors mark rows with band tags (`[header]`, `[detail]`,
//! `[head_grp]['region']`, ...) in the rightmost tagged column. A tag holds for
//! following rows until the next tag, so bands can span several rows. Title
//! tags (`[var]`, `[style_lib]`, ...) carry template metadata and never reach
//! the sheet. A document without any tag is one big header band.
//!
//! PIPELINE:
//! 1. Normalize Index/Span/Merge attributes into a rectangular grid
//! 2. Locate the tag column and assign a tag to every row
//! 3. Run title-row handlers, convert content rows into cells
//! 4. Compute band extents, fill an empty detail row, add page bands

use crate::cache::TemplateCache;
use crate::error::TemplateError;
use crate::logging::{CACHE, TEMPLATE};
use crate::model::{Band, BandKind, Group, Report, ReportCell};
use crate::options::GeneratorOptions;
use crate::summation::init_sum_cells;
use crate::{log_debug, log_fatal, log_info, log_warn};
use engine::{index_to_col, CellStyle, CellValue};
use once_cell::sync::Lazy;
use persistence::{load_document, HeaderFooter, SpreadsheetDocument, Worksheet};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

static BAND_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[(header|footer|detail|head_grp|foot_grp|upper|under|description|var|generator|data_source|query|style_lib)\]\s*(?:\['([^']*)'\])?$",
    )
    .expect("band tag pattern is valid")
});

/// Points per inch, for page header/footer margins.
const POINTS_PER_INCH: f64 = 72.0;

// ============================================================================
// ROW TAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    Description,
    Var,
    Generator,
    DataSource,
    Query,
    StyleLib,
}

/// The tag a template row belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowTag {
    Band {
        kind: BandKind,
        field: Option<String>,
    },
    Title(TitleKind),
}

impl RowTag {
    /// Classifies a cell text such as `[detail]` or `[head_grp]['region']`.
    pub fn parse(text: &str) -> Option<RowTag> {
        let caps = BAND_TAG.captures(text.trim())?;
        let name = caps.get(1)?.as_str();
        let field = caps.get(2).map(|m| m.as_str().to_string());
        let title = match name {
            "description" => Some(TitleKind::Description),
            "var" => Some(TitleKind::Var),
            "generator" => Some(TitleKind::Generator),
            "data_source" => Some(TitleKind::DataSource),
            "query" => Some(TitleKind::Query),
            "style_lib" => Some(TitleKind::StyleLib),
            _ => None,
        };
        match title {
            Some(kind) => Some(RowTag::Title(kind)),
            None => BandKind::from_tag(name).map(|kind| RowTag::Band {
                kind,
                // Only group bands are parameterized.
                field: field.filter(|_| kind.is_group()),
            }),
        }
    }
}

// ============================================================================
// NORMALIZED GRID
// ============================================================================

#[derive(Debug, Clone, Default)]
struct GridColumn {
    width: Option<f64>,
    style_id: Option<String>,
    hidden: bool,
}

#[derive(Debug, Clone, Default)]
struct GridCell {
    text: String,
    style_id: Option<String>,
    merge_across: usize,
    merge_down: usize,
    /// Absorbed by a merge to the left or above.
    covered: bool,
}

#[derive(Debug, Clone, Default)]
struct GridRow {
    height: Option<f64>,
    style_id: Option<String>,
    hidden: bool,
    cells: Vec<GridCell>,
}

#[derive(Debug, Default)]
struct Grid {
    columns: Vec<GridColumn>,
    rows: Vec<GridRow>,
    width: usize,
}

/// Position of an optional 1-based index, never moving backwards.
fn position(index: Option<usize>, next: usize) -> usize {
    index.map(|i| i.saturating_sub(1)).unwrap_or(next).max(next)
}

fn normalize(sheet: &Worksheet) -> Grid {
    let mut columns: Vec<GridColumn> = Vec::new();
    for col in &sheet.columns {
        let start = position(col.index, columns.len());
        columns.resize(start, GridColumn::default());
        let desc = GridColumn {
            width: col.width,
            style_id: col.style_id.clone(),
            hidden: col.hidden,
        };
        columns.extend(std::iter::repeat(desc).take(col.span + 1));
    }

    let mut rows: Vec<GridRow> = Vec::new();
    for row in &sheet.rows {
        let start = position(row.index, rows.len());
        rows.resize(start, GridRow::default());

        let mut cells: Vec<GridCell> = Vec::new();
        for cell in &row.cells {
            let at = position(cell.index, cells.len());
            cells.resize(at, GridCell::default());
            cells.push(GridCell {
                text: cell.value.display(),
                style_id: cell.style_id.clone(),
                merge_across: cell.merge_across,
                merge_down: cell.merge_down,
                covered: false,
            });
            for _ in 0..cell.merge_across {
                cells.push(GridCell {
                    covered: true,
                    ..GridCell::default()
                });
            }
        }

        let grid_row = GridRow {
            height: row.height,
            style_id: row.style_id.clone(),
            hidden: row.hidden,
            cells,
        };
        rows.extend(std::iter::repeat(grid_row).take(row.span + 1));
    }

    let mut covered: HashSet<(usize, usize)> = HashSet::new();
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if cell.covered || cell.merge_down == 0 {
                continue;
            }
            for dr in 1..=cell.merge_down {
                for dc in 0..=cell.merge_across {
                    covered.insert((r + dr, c + dc));
                }
            }
        }
    }

    let width = rows
        .iter()
        .map(|r| r.cells.len())
        .chain(std::iter::once(columns.len()))
        .max()
        .unwrap_or(0);
    columns.resize(width, GridColumn::default());
    for (r, row) in rows.iter_mut().enumerate() {
        row.cells.resize(width, GridCell::default());
        for (c, cell) in row.cells.iter_mut().enumerate() {
            if covered.contains(&(r, c)) {
                cell.covered = true;
            }
        }
    }

    Grid {
        columns,
        rows,
        width,
    }
}

/// The rightmost column holding a band or title tag.
fn find_tag_column(grid: &Grid) -> Option<usize> {
    grid.rows
        .iter()
        .flat_map(|row| {
            row.cells
                .iter()
                .enumerate()
                .filter(|(_, cell)| !cell.covered && RowTag::parse(&cell.text).is_some())
                .map(|(c, _)| c)
        })
        .max()
}

/// Every row's tag; rows without a tag cell inherit the previous row's tag.
fn assign_row_tags(grid: &Grid, tag_col: usize) -> Vec<Option<RowTag>> {
    grid.rows
        .iter()
        .scan(None::<RowTag>, |current, row| {
            if let Some(tag) = row.cells.get(tag_col).and_then(|c| RowTag::parse(&c.text)) {
                *current = Some(tag);
            }
            Some(current.clone())
        })
        .collect()
}

// ============================================================================
// BAND EXTENTS
// ============================================================================

type BandKey = (BandKind, Option<String>);

#[derive(Debug, Default)]
struct BandExtents {
    order: Vec<BandKey>,
    bands: HashMap<BandKey, Band>,
    last: Option<BandKey>,
}

impl BandExtents {
    /// Adds sheet row `sheet_row` to the band. A band may not resume after
    /// another band started.
    fn add(
        &mut self,
        key: BandKey,
        sheet_row: usize,
        width: usize,
        source_row: usize,
    ) -> Result<(), TemplateError> {
        let continues = self.last.as_ref() == Some(&key);
        match self.bands.get_mut(&key) {
            Some(band) if continues => band.row_size += 1,
            Some(_) => {
                return Err(TemplateError::DuplicateBand {
                    band: band_label(&key),
                    row: source_row + 1,
                })
            }
            None => {
                self.bands.insert(key.clone(), Band::new(sheet_row, 0, 1, width));
                self.order.push(key.clone());
            }
        }
        self.last = Some(key);
        Ok(())
    }

    /// Breaks contiguity, e.g. at a title row.
    fn interrupt(&mut self) {
        self.last = None;
    }

    fn apply(self, report: &mut Report) {
        for key in &self.order {
            let band = self.bands[key];
            let (kind, field) = key;
            match (kind, field) {
                (BandKind::Header, _) => report.header = Some(band),
                (BandKind::Footer, _) => report.footer = Some(band),
                (BandKind::Detail, _) => report.detail = Some(band),
                (BandKind::Upper, _) => report.upper = Some(band),
                (BandKind::Under, _) => report.under = Some(band),
                (BandKind::GroupHeader | BandKind::GroupFooter, field) => {
                    let field = field.clone().unwrap_or_default();
                    let index = match report.groups.iter().position(|g| g.field == field) {
                        Some(i) => i,
                        None => {
                            report.groups.push(Group::new(&field));
                            report.groups.len() - 1
                        }
                    };
                    if *kind == BandKind::GroupHeader {
                        report.groups[index].header = Some(band);
                    } else {
                        report.groups[index].footer = Some(band);
                    }
                }
            }
        }
        nest_groups(&mut report.groups);
    }
}

/// Orders groups outermost first. Headers nest outermost first and footers
/// innermost first, so a group's depth is its footer's rank from the bottom,
/// or its header's rank from the top when it has no footer. Ties keep
/// template order.
fn nest_groups(groups: &mut [Group]) {
    let headers: Vec<usize> = groups.iter().filter_map(|g| g.header).map(|b| b.row).collect();
    let footers: Vec<usize> = groups.iter().filter_map(|g| g.footer).map(|b| b.row).collect();
    groups.sort_by_key(|g| match (g.footer, g.header) {
        (Some(footer), _) => footers.iter().filter(|&&r| r > footer.row).count(),
        (None, Some(header)) => headers.iter().filter(|&&r| r < header.row).count(),
        (None, None) => 0,
    });
}

fn band_label(key: &BandKey) -> String {
    match &key.1 {
        Some(field) => format!("{}]['{}'", key.0, field),
        None => key.0.to_string(),
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Builds report templates from spreadsheet documents.
#[derive(Debug, Clone, Default)]
pub struct TemplateParser {
    options: GeneratorOptions,
    fields: Option<Vec<String>>,
}

impl TemplateParser {
    pub fn new() -> Self {
        TemplateParser::default()
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Query fields used to fill an empty detail row with `['field']` tags.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Parses a template, logging and returning None on a structural error.
    pub fn parse(&self, doc: &SpreadsheetDocument, template_name: Option<&str>) -> Option<Report> {
        match self.try_parse(doc, template_name) {
            Ok(report) => Some(report),
            Err(e) => {
                log_fatal!(TEMPLATE, "template parse failed: {}", e);
                None
            }
        }
    }

    /// Loads and parses a template file, going through the template cache
    /// when one is configured.
    pub fn parse_file(&self, path: &Path) -> Option<Report> {
        match self.try_parse_file(path) {
            Ok(report) => Some(report),
            Err(e) => {
                log_fatal!(TEMPLATE, "template {} failed: {}", path.display(), e);
                None
            }
        }
    }

    pub fn try_parse_file(&self, path: &Path) -> Result<Report, TemplateError> {
        // A field-bound parse depends on the query, so it is not cached.
        let cache = match (&self.options.cache_dir, &self.fields) {
            (Some(dir), None) => Some(TemplateCache::new(dir)),
            _ => None,
        };

        if let Some(cache) = &cache {
            match cache.load(path) {
                Ok(Some(report)) => return Ok(report),
                Ok(None) => {}
                Err(e) => log_warn!(CACHE, "cache for {} unusable: {}", path.display(), e),
            }
        }

        let doc = load_document(path)?;
        let name = path.file_stem().and_then(|s| s.to_str());
        let report = self.try_parse(&doc, name)?;

        if let Some(cache) = &cache {
            if let Err(e) = cache.store(path, &report) {
                log_warn!(CACHE, "could not cache {}: {}", path.display(), e);
            }
        }
        Ok(report)
    }

    pub fn try_parse(
        &self,
        doc: &SpreadsheetDocument,
        template_name: Option<&str>,
    ) -> Result<Report, TemplateError> {
        let sheet = template_name
            .and_then(|name| doc.worksheet(name))
            .or_else(|| doc.worksheets.first())
            .ok_or(TemplateError::NoWorksheet)?;
        let name = template_name.unwrap_or(sheet.name.as_str());

        let grid = normalize(sheet);
        let (content_width, tags) = match find_tag_column(&grid) {
            Some(tag_col) => (tag_col, assign_row_tags(&grid, tag_col)),
            None => {
                log_info!(TEMPLATE, "{}: no band tags, whole sheet is the header", name);
                let header = Some(RowTag::Band {
                    kind: BandKind::Header,
                    field: None,
                });
                (grid.width, vec![header; grid.rows.len()])
            }
        };

        let mut report = Report::new(name);
        report.page_setup = sheet.page_setup.clone();

        let col_widths: Vec<f64> = grid
            .columns
            .iter()
            .take(content_width)
            .map(|c| c.width.unwrap_or(self.options.default_col_width))
            .collect();
        let row_heights: Vec<f64> = grid
            .rows
            .iter()
            .map(|r| r.height.unwrap_or(self.options.default_row_height))
            .collect();

        let mut extents = BandExtents::default();
        let mut top = 0.0;
        for (r, (row, tag)) in grid.rows.iter().zip(tags).enumerate() {
            match tag {
                None => log_debug!(TEMPLATE, "row {} precedes the first band tag, skipped", r + 1),
                Some(RowTag::Title(kind)) => {
                    extents.interrupt();
                    self.parse_title_row(kind, &grid, r, content_width, doc, &mut report);
                }
                Some(RowTag::Band { kind, field }) => {
                    if kind.is_group() && field.is_none() {
                        return Err(TemplateError::MissingGroupField {
                            band: kind.tag().to_string(),
                            row: r + 1,
                        });
                    }
                    extents.add((kind, field), report.sheet.len(), content_width, r)?;
                    let cells = self.build_row(&grid, r, content_width, &col_widths, &row_heights, top, doc);
                    report.sheet.push(cells);
                    top += row_heights[r];
                }
            }
        }
        extents.apply(&mut report);

        self.fill_detail(&mut report, content_width);
        self.add_page_bands(&mut report, &col_widths, top);
        init_sum_cells(&mut report.sheet);

        log_debug!(
            TEMPLATE,
            "{}: {} rows x {} cols, {} groups",
            report.name,
            report.row_count(),
            content_width,
            report.groups.len()
        );
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_row(
        &self,
        grid: &Grid,
        r: usize,
        width: usize,
        col_widths: &[f64],
        row_heights: &[f64],
        top: f64,
        doc: &SpreadsheetDocument,
    ) -> Vec<Option<ReportCell>> {
        let row = &grid.rows[r];
        (0..width)
            .map(|c| {
                let gc = &row.cells[c];
                if gc.covered {
                    return None;
                }
                let text = Some(gc.text.as_str()).filter(|t| !t.is_empty());
                let mut cell = ReportCell::new(text);
                cell.set_merge(gc.merge_down + 1, (gc.merge_across + 1).min(width - c));
                cell.left = col_widths[..c].iter().sum();
                cell.top = top;
                cell.width = col_widths[c..c + cell.merge_col].iter().sum();
                cell.height = row_heights
                    .iter()
                    .skip(r)
                    .take(cell.merge_row)
                    .sum();
                cell.set_style(&resolve_style(
                    doc,
                    [
                        gc.style_id.as_deref(),
                        row.style_id.as_deref(),
                        grid.columns[c].style_id.as_deref(),
                    ],
                ));
                cell.visible = !row.hidden && !grid.columns[c].hidden;
                Some(cell)
            })
            .collect()
    }

    fn parse_title_row(
        &self,
        kind: TitleKind,
        grid: &Grid,
        r: usize,
        width: usize,
        doc: &SpreadsheetDocument,
        report: &mut Report,
    ) {
        let row = &grid.rows[r];
        let cells = &row.cells[..width];
        let first_text = || {
            cells
                .iter()
                .map(|c| c.text.trim())
                .find(|t| !t.is_empty())
                .map(str::to_string)
        };

        match kind {
            TitleKind::Description => report.description = first_text(),
            TitleKind::Generator => report.generator = first_text(),
            TitleKind::DataSource => report.data_source = first_text(),
            TitleKind::Query => report.query = first_text(),
            TitleKind::Var => {
                let name = cells.first().map(|c| c.text.trim()).unwrap_or("");
                if name.is_empty() {
                    log_warn!(TEMPLATE, "row {}: [var] without a name", r + 1);
                    return;
                }
                let value = cells.get(1).map(|c| c.text.as_str()).unwrap_or("");
                report.variables.set(name, variable_value(value));
            }
            TitleKind::StyleLib => {
                for (c, cell) in cells.iter().enumerate() {
                    let style_name = cell.text.trim();
                    if cell.covered || style_name.is_empty() {
                        continue;
                    }
                    let style = resolve_style(
                        doc,
                        [
                            cell.style_id.as_deref(),
                            row.style_id.as_deref(),
                            grid.columns[c].style_id.as_deref(),
                        ],
                    );
                    report.style_lib.insert(style_name.to_string(), style);
                }
            }
        }
    }

    /// Fills a one-row, all-empty detail band with one field tag per column.
    fn fill_detail(&self, report: &mut Report, width: usize) {
        let Some(detail) = report.detail else {
            return;
        };
        if detail.row_size != 1 {
            return;
        }
        let Some(row) = report.sheet.get_mut(detail.row) else {
            return;
        };
        if row.iter().flatten().any(|cell| cell.value.is_some()) {
            return;
        }

        for (c, slot) in row.iter_mut().enumerate().take(width) {
            let Some(cell) = slot.as_mut() else {
                continue;
            };
            let field = match &self.fields {
                Some(fields) => fields.get(c).cloned(),
                None => Some(index_to_col(c)),
            };
            cell.value = field.map(|f| format!("['{}']", f));
        }
        report.auto_detail = self.fields.is_none();
        log_debug!(TEMPLATE, "{}: detail row filled with field tags", report.name);
    }

    /// Adds upper/under bands for page header/footer text the sheet does not define.
    fn add_page_bands(&self, report: &mut Report, col_widths: &[f64], top: f64) {
        let mut top = top;
        if report.upper.is_none() {
            if let Some(header) = report.page_setup.header.clone() {
                report.upper = self.append_page_row(report, &header, col_widths, &mut top);
            }
        }
        if report.under.is_none() {
            if let Some(footer) = report.page_setup.footer.clone() {
                report.under = self.append_page_row(report, &footer, col_widths, &mut top);
            }
        }
    }

    fn append_page_row(
        &self,
        report: &mut Report,
        text: &HeaderFooter,
        col_widths: &[f64],
        top: &mut f64,
    ) -> Option<Band> {
        if text.text.trim().is_empty() {
            return None;
        }
        let width = col_widths.len().max(1);
        let mut cell = ReportCell::new(Some(&text.text)).with_merge(1, width);
        cell.top = *top;
        cell.width = if col_widths.is_empty() {
            self.options.default_col_width
        } else {
            col_widths.iter().sum()
        };
        cell.height = text
            .margin
            .map(|m| m * POINTS_PER_INCH)
            .unwrap_or(self.options.default_row_height);
        *top += cell.height;

        let row = report.sheet.len();
        let mut cells = vec![None; width];
        cells[0] = Some(cell);
        report.sheet.push(cells);
        report.ensure_size(row + 1, width);
        Some(Band::new(row, 0, 1, width))
    }
}

/// Cell style, else row style, else column style, each over the Default style.
fn resolve_style(doc: &SpreadsheetDocument, ids: [Option<&str>; 3]) -> CellStyle {
    let base = doc.default_style().unwrap_or_default();
    match ids.into_iter().flatten().find_map(|id| doc.style(id)) {
        Some(style) => base.overlay(&style),
        None => base,
    }
}

fn variable_value(text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) => CellValue::Number(n),
        Err(_) => CellValue::Text(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::{DocCell, DocColumn, DocRow, DocStyle};

    fn row(cells: &[&str]) -> DocRow {
        DocRow {
            cells: cells.iter().map(|t| DocCell::text(t)).collect(),
            ..DocRow::default()
        }
    }

    fn doc(rows: Vec<DocRow>) -> SpreadsheetDocument {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.rows = rows;
        SpreadsheetDocument {
            styles: Vec::new(),
            worksheets: vec![sheet],
        }
    }

    #[test]
    fn row_tags_are_classified() {
        assert_eq!(
            RowTag::parse("[head_grp]['region']"),
            Some(RowTag::Band {
                kind: BandKind::GroupHeader,
                field: Some("region".into())
            })
        );
        assert_eq!(
            RowTag::parse(" [detail] "),
            Some(RowTag::Band {
                kind: BandKind::Detail,
                field: None
            })
        );
        assert_eq!(RowTag::parse("[var]"), Some(RowTag::Title(TitleKind::Var)));
        assert_eq!(RowTag::parse("[details]"), None);
        assert_eq!(RowTag::parse("x [header]"), None);
    }

    #[test]
    fn spans_and_merges_normalize_to_a_rectangle() {
        let mut sheet = Worksheet::new("S");
        sheet.columns = vec![DocColumn {
            index: Some(2),
            span: 1,
            width: Some(30.0),
            ..DocColumn::default()
        }];
        sheet.rows = vec![
            DocRow {
                span: 1,
                cells: vec![DocCell {
                    merge_across: 1,
                    merge_down: 2,
                    ..DocCell::text("m")
                }],
                ..DocRow::default()
            },
            DocRow {
                index: Some(4),
                cells: vec![DocCell {
                    index: Some(4),
                    ..DocCell::text("z")
                }],
                ..DocRow::default()
            },
        ];
        let grid = normalize(&sheet);
        assert_eq!(grid.rows.len(), 4);
        assert_eq!(grid.width, 4);
        assert!(grid.rows.iter().all(|r| r.cells.len() == 4));
        assert_eq!(grid.columns[1].width, Some(30.0));
        assert_eq!(grid.columns[2].width, Some(30.0));
        // repeated row carries the same merge, its cover overlaps the first one
        assert!(grid.rows[0].cells[1].covered);
        assert!(grid.rows[1].cells[0].covered);
        assert!(grid.rows[2].cells[1].covered);
        assert!(grid.rows[3].cells[0].covered);
        assert_eq!(grid.rows[3].cells[3].text, "z");
    }

    #[test]
    fn untagged_document_is_one_header() {
        let report = TemplateParser::new()
            .try_parse(&doc(vec![row(&["a"]), row(&["b", "c"])]), None)
            .unwrap();
        assert_eq!(report.header, Some(Band::new(0, 0, 2, 2)));
        assert!(report.detail.is_none());
        assert_eq!(report.name, "Sheet1");
    }

    #[test]
    fn title_rows_fill_metadata() {
        let mut rows = vec![
            row(&["Monthly sales", "", "[description]"]),
            row(&["rate", "0.2", "[var]"]),
            row(&["currency", "EUR", "[var]"]),
            row(&["xml", "", "[generator]"]),
            row(&["sales_db", "", "[data_source]"]),
            row(&["SELECT 1", "", "[query]"]),
            row(&["hot", "", "[style_lib]"]),
            row(&["Title", "", "[header]"]),
        ];
        rows[6].cells[0].style_id = Some("s1".into());
        let mut d = doc(rows);
        d.styles.push(DocStyle {
            id: "s1".into(),
            style: CellStyle::new().with_bold(true),
            ..DocStyle::default()
        });

        let report = TemplateParser::new().try_parse(&d, Some("sales")).unwrap();
        assert_eq!(report.name, "sales");
        assert_eq!(report.description.as_deref(), Some("Monthly sales"));
        assert_eq!(report.variables.get("rate"), Some(&CellValue::Number(0.2)));
        assert_eq!(report.variables.get("currency"), Some(&CellValue::Text("EUR".into())));
        assert_eq!(report.generator.as_deref(), Some("xml"));
        assert_eq!(report.data_source.as_deref(), Some("sales_db"));
        assert_eq!(report.query.as_deref(), Some("SELECT 1"));
        assert!(report.style_lib["hot"].font.as_ref().unwrap().bold);
        assert_eq!(report.row_count(), 1);
        assert_eq!(report.header, Some(Band::new(0, 0, 1, 2)));
    }

    #[test]
    fn resumed_band_is_a_structural_error() {
        let d = doc(vec![
            row(&["h", "[header]"]),
            row(&["", "[detail]"]),
            row(&["h2", "[header]"]),
        ]);
        let parser = TemplateParser::new();
        assert!(matches!(
            parser.try_parse(&d, None),
            Err(TemplateError::DuplicateBand { row: 3, .. })
        ));
        assert!(parser.parse(&d, None).is_none());
    }

    #[test]
    fn group_band_needs_a_field() {
        let d = doc(vec![row(&["g", "[head_grp]"])]);
        assert!(matches!(
            TemplateParser::new().try_parse(&d, None),
            Err(TemplateError::MissingGroupField { row: 1, .. })
        ));
    }

    #[test]
    fn rows_before_first_tag_are_skipped() {
        let d = doc(vec![row(&["notes", ""]), row(&["h", "[header]"])]);
        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        assert_eq!(report.row_count(), 1);
        assert_eq!(report.cell(0, 0).unwrap().text(), "h");
    }

    #[test]
    fn styles_resolve_cell_then_row_then_column() {
        let mut d = doc(vec![row(&["a", "b", "c", "[header]"])]);
        for (id, fmt) in [("Default", "General"), ("cs", "0.0"), ("rs", "0.00"), ("ks", "0.000")] {
            d.styles.push(DocStyle {
                id: id.into(),
                style: CellStyle::new().with_number_format(fmt),
                ..DocStyle::default()
            });
        }
        let sheet = &mut d.worksheets[0];
        sheet.columns = vec![DocColumn {
            span: 3,
            style_id: Some("ks".into()),
            ..DocColumn::default()
        }];
        sheet.rows[0].cells[0].style_id = Some("cs".into());
        sheet.rows[0].style_id = Some("rs".into());
        sheet.columns.push(DocColumn::default());

        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        assert_eq!(report.cell(0, 0).unwrap().num_format.as_deref(), Some("0.0"));
        assert_eq!(report.cell(0, 1).unwrap().num_format.as_deref(), Some("0.00"));

        d.worksheets[0].rows[0].style_id = None;
        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        assert_eq!(report.cell(0, 1).unwrap().num_format.as_deref(), Some("0.000"));

        d.worksheets[0].columns.clear();
        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        assert_eq!(report.cell(0, 2).unwrap().num_format.as_deref(), Some("General"));
    }

    #[test]
    fn page_header_becomes_upper_band() {
        let mut d = doc(vec![row(&["a", "b", "[header]"])]);
        d.worksheets[0].page_setup.header = Some(HeaderFooter {
            text: "Confidential".into(),
            margin: Some(0.5),
        });
        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        let upper = report.upper.unwrap();
        assert_eq!(upper, Band::new(1, 0, 1, 2));
        let cell = report.cell(1, 0).unwrap();
        assert_eq!(cell.text(), "Confidential");
        assert_eq!(cell.merge_col, 2);
        assert_eq!(cell.height, 36.0);
        assert!(report.sheet[1][1].is_none());
        assert!(report.under.is_none());
    }

    #[test]
    fn geometry_uses_defaults_and_merges() {
        let mut d = doc(vec![DocRow {
            height: Some(20.0),
            cells: vec![
                DocCell {
                    merge_across: 1,
                    ..DocCell::text("wide")
                },
                DocCell::text("x"),
                DocCell::text("[header]"),
            ],
            ..DocRow::default()
        }]);
        d.worksheets[0].columns = vec![DocColumn {
            width: Some(10.0),
            ..DocColumn::default()
        }];
        let report = TemplateParser::new().try_parse(&d, None).unwrap();
        let wide = report.cell(0, 0).unwrap();
        assert_eq!(wide.merge_across(), 1);
        assert_eq!(wide.width, 58.0);
        assert_eq!(wide.height, 20.0);
        assert!(report.sheet[0][1].is_none());
        assert_eq!(report.cell(0, 2).unwrap().left, 58.0);
    }
}
