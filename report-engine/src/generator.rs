//! FILENAME: report-engine/src/generator.rs
//! PURPOSE: Fills a report template from a query table.
//! CONTEXT: Generation walks the records once, emitting bands into a growing
//! output sheet:
//!
//!   upper, header, { group footers, group headers, detail }*, open group
//!   footers, footer, under
//!
//! Group breaks follow nested control-break rules: when group `i` breaks, the
//! footers of groups `i..` close innermost first, then their headers reopen.
//! A group footer is evaluated against the last record of its own group.
//!
//! The template is copied before generation; accumulators live in that copy,
//! so a template can be generated any number of times.

use crate::cell_expr::{CellContext, CellEvaluator};
use crate::error::GenerateError;
use crate::logging::{REPORT, SUM};
use crate::model::{Band, BandKind, Group, Report, ReportCell};
use crate::options::GeneratorOptions;
use crate::query::QueryTable;
use crate::summation::{clear_sum, init_sum_cells, sum_iterate, FormulaCache};
use crate::{log_debug, log_enter, log_exit, log_fatal, log_warn};
use engine::{col_to_index, CellStyle, FunctionRegistry, Namespace, Record};
use std::collections::{BTreeMap, HashSet};

/// Index of the outermost group whose key changed between `prev` and `curr`.
///
/// `prev[i]` is the last record seen by group `i`; a group that has not seen a
/// record yet always breaks.
pub fn detect_break(groups: &[Group], prev: &[Option<Record>], curr: &Record) -> Option<usize> {
    groups.iter().enumerate().position(|(i, group)| {
        match prev.get(i).and_then(Option::as_ref) {
            None => true,
            Some(old) => old.get(&group.field) != curr.get(&group.field),
        }
    })
}

/// Generates reports. Host functions registered here are reachable from
/// `[@..@]` tags and every other expression.
#[derive(Debug, Default)]
pub struct ReportGenerator {
    options: GeneratorOptions,
    functions: FunctionRegistry,
}

impl ReportGenerator {
    pub fn new() -> Self {
        ReportGenerator::default()
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generates a report, logging and returning None if generation failed.
    /// No partial report is ever returned.
    pub fn generate(
        &self,
        template: &Report,
        table: &QueryTable,
        namespace: Option<&Namespace>,
        coord_fill: Option<&BTreeMap<(usize, usize), String>>,
    ) -> Option<Report> {
        match self.try_generate(template, table, namespace, coord_fill) {
            Ok(report) => Some(report),
            Err(e) => {
                log_fatal!(REPORT, "report '{}' not generated: {}", template.name, e);
                None
            }
        }
    }

    pub fn try_generate(
        &self,
        template: &Report,
        table: &QueryTable,
        namespace: Option<&Namespace>,
        coord_fill: Option<&BTreeMap<(usize, usize), String>>,
    ) -> Result<Report, GenerateError> {
        self.generate_at_depth(template, table, namespace, coord_fill, 0)
    }

    fn generate_at_depth(
        &self,
        template: &Report,
        table: &QueryTable,
        namespace: Option<&Namespace>,
        coord_fill: Option<&BTreeMap<(usize, usize), String>>,
        depth: usize,
    ) -> Result<Report, GenerateError> {
        log_enter!(
            REPORT,
            "generate",
            "'{}' records={} depth={}",
            template.name,
            table.len(),
            depth
        );
        let report = Run::new(self, template, table, namespace, coord_fill, depth)?.execute()?;
        log_exit!(REPORT, "generate", "'{}' rows={}", report.name, report.row_count());
        Ok(report)
    }
}

// ============================================================================
// GENERATION RUN
// ============================================================================

/// State of one generation.
struct Run<'a> {
    generator: &'a ReportGenerator,
    table: &'a QueryTable,
    /// Working copy of the template; owns the accumulators.
    template: Report,
    output: Report,
    variables: Namespace,
    coord_fill: BTreeMap<(usize, usize), String>,
    cells: CellEvaluator,
    formulas: FormulaCache,
    /// Output positions absorbed by a merge.
    covered: HashSet<(usize, usize)>,
    /// Next output row.
    cur_row: usize,
    /// Running vertical position of the next output row.
    cur_top: f64,
    depth: usize,
}

impl<'a> Run<'a> {
    fn new(
        generator: &'a ReportGenerator,
        template: &Report,
        table: &'a QueryTable,
        namespace: Option<&Namespace>,
        coord_fill: Option<&BTreeMap<(usize, usize), String>>,
        depth: usize,
    ) -> Result<Self, GenerateError> {
        if !table.fields.is_empty() {
            if let Some(group) = template
                .groups
                .iter()
                .find(|g| table.field_index(&g.field).is_none())
            {
                return Err(GenerateError::UnknownField(group.field.clone()));
            }
        }

        let mut working = template.clone();
        for group in &mut working.groups {
            group.old_rec = None;
        }
        if working.auto_detail {
            bind_auto_detail(&mut working, &table.fields);
        }
        init_sum_cells(&mut working.sheet);

        let mut variables = Namespace::new();
        if let Some(namespace) = namespace {
            variables.extend(namespace);
        }
        variables.extend(&template.variables);
        variables.extend(&table.variables);

        let mut fill = table.coord_fill.clone();
        if let Some(coord_fill) = coord_fill {
            fill.extend(coord_fill.iter().map(|(k, v)| (*k, v.clone())));
        }

        let output = Report {
            name: template.name.clone(),
            description: template.description.clone(),
            generator: template.generator.clone(),
            data_source: template.data_source.clone(),
            query: template.query.clone(),
            variables: variables.clone(),
            style_lib: template.style_lib.clone(),
            groups: template.groups.iter().map(|g| Group::new(&g.field)).collect(),
            ..Report::default()
        };

        Ok(Run {
            generator,
            table,
            template: working,
            output,
            variables,
            coord_fill: fill,
            cells: CellEvaluator::new(generator.options.keep_unknown_tags),
            formulas: FormulaCache::new(),
            covered: HashSet::new(),
            cur_row: 0,
            cur_top: 0.0,
            depth,
        })
    }

    fn execute(mut self) -> Result<Report, GenerateError> {
        let first = self.table.record(0);

        if let Some(band) = self.template.upper {
            self.emit(BandKind::Upper, None, band, first.as_ref())?;
        }
        if let Some(band) = self.template.header {
            self.emit(BandKind::Header, None, band, first.as_ref())?;
        }
        let rows = self.template.row_count();
        clear_sum(&mut self.template.sheet, 0, rows);

        let group_count = self.template.groups.len();
        let mut open: Vec<Option<Record>> = vec![None; group_count];

        for index in 0..self.table.len() {
            let Some(record) = self.table.record(index) else {
                break;
            };

            if let Some(brk) = detect_break(&self.template.groups, &open, &record) {
                for g in (brk..group_count).rev() {
                    if let Some(old) = open[g].take() {
                        self.emit_group_footer(g, &old)?;
                    }
                }
                for g in brk..group_count {
                    self.emit_group_header(g, &record)?;
                }
            }
            // Every group now holds the current record as its last one.
            for slot in open.iter_mut() {
                *slot = Some(record.clone());
            }

            if let Some(band) = self.template.detail {
                self.emit(BandKind::Detail, None, band, Some(&record))?;
            }
            sum_iterate(
                &mut self.template.sheet,
                &record,
                &self.variables,
                &self.generator.functions,
                &mut self.formulas,
            );
        }

        for g in (0..group_count).rev() {
            if let Some(old) = open[g].take() {
                self.emit_group_footer(g, &old)?;
                self.output.groups[g].old_rec = Some(old);
            }
        }

        let last = self.table.len().checked_sub(1).and_then(|i| self.table.record(i));
        if let Some(band) = self.template.footer {
            self.emit(BandKind::Footer, None, band, last.as_ref())?;
        }
        if let Some(band) = self.template.under {
            self.emit(BandKind::Under, None, band, last.as_ref())?;
        }

        self.output.page_setup = self.template.page_setup.clone();
        let width = self.output.col_count();
        self.output.ensure_size(self.cur_row, width);
        Ok(self.output)
    }

    fn emit_group_header(&mut self, g: usize, record: &Record) -> Result<(), GenerateError> {
        let group = &self.template.groups[g];
        let (header, footer) = (group.header, group.footer);
        if let Some(band) = header {
            self.emit(BandKind::GroupHeader, Some(g), band, Some(record))?;
        }
        if let Some(band) = footer {
            clear_sum(&mut self.template.sheet, band.row, band.end_row());
        }
        Ok(())
    }

    fn emit_group_footer(&mut self, g: usize, old: &Record) -> Result<(), GenerateError> {
        let Some(band) = self.template.groups[g].footer else {
            return Ok(());
        };
        self.emit(BandKind::GroupFooter, Some(g), band, Some(old))?;
        clear_sum(&mut self.template.sheet, band.row, band.end_row());
        log_debug!(SUM, "group '{}' footer sums cleared", self.template.groups[g].field);
        Ok(())
    }

    /// Emits one band, logging a failure at the band boundary.
    fn emit(
        &mut self,
        kind: BandKind,
        group: Option<usize>,
        band: Band,
        record: Option<&Record>,
    ) -> Result<(), GenerateError> {
        let start = self.cur_row;
        let result = self.emit_rows(band, record);
        let label = match group {
            Some(g) => format!("{}['{}']", kind, self.template.groups[g].field),
            None => kind.to_string(),
        };
        if let Err(e) = result {
            log_fatal!(REPORT, "band [{}] failed at output row {}: {}", label, start + 1, e);
            return Err(GenerateError::in_band(label, e));
        }

        let emitted = self.cur_row - start;
        let slot = match (kind, group) {
            (BandKind::Header, _) => &mut self.output.header,
            (BandKind::Footer, _) => &mut self.output.footer,
            (BandKind::Detail, _) => &mut self.output.detail,
            (BandKind::Upper, _) => &mut self.output.upper,
            (BandKind::Under, _) => &mut self.output.under,
            (BandKind::GroupHeader, Some(g)) => &mut self.output.groups[g].header,
            (BandKind::GroupFooter, Some(g)) => &mut self.output.groups[g].footer,
            (_, None) => return Ok(()),
        };
        record_extent(slot, start, emitted, band.col, band.col_size);
        Ok(())
    }

    fn emit_rows(&mut self, band: Band, record: Option<&Record>) -> Result<(), GenerateError> {
        let mut current_style: Option<CellStyle> = None;

        for trow in band.rows() {
            let template_row = self
                .template
                .sheet
                .get(trow)
                .ok_or(GenerateError::OutOfRange { row: trow, col: 0 })?
                .clone();
            let out_row = self.cur_row;
            self.output.ensure_size(out_row + 1, band.col + band.col_size);

            let mut pending = Vec::new();
            for tcol in band.col..band.col + band.col_size {
                let slot = template_row
                    .get(tcol)
                    .ok_or(GenerateError::OutOfRange { row: trow, col: tcol })?;
                let Some(tcell) = slot else {
                    continue;
                };
                let cell = self.gen_cell(tcell, record, out_row, tcol, &mut current_style, &mut pending);
                self.place(cell, out_row, tcol);
            }

            self.cur_top += row_height(&template_row, self.generator.options.default_row_height);
            self.cur_row += 1;

            for name in pending {
                self.splice_subreport(&name, record)?;
            }
        }
        Ok(())
    }

    /// Builds the output cell for template cell `tcell` at output (row, col).
    fn gen_cell(
        &mut self,
        tcell: &ReportCell,
        record: Option<&Record>,
        row: usize,
        col: usize,
        current_style: &mut Option<CellStyle>,
        pending: &mut Vec<String>,
    ) -> ReportCell {
        let mut cell = tcell.clone();
        cell.sum = None;
        cell.top = self.cur_top;

        if let Some(literal) = self.coord_fill.get(&(row, col)) {
            cell.value = Some(literal.clone());
        } else if let Some(raw) = tcell.value.as_deref() {
            let ctx = CellContext {
                record,
                variables: &self.variables,
                functions: &self.generator.functions,
                style_lib: &self.template.style_lib,
                row,
                col,
            };
            let out = self.cells.evaluate(raw, tcell.sum.as_deref(), &ctx);
            if out.style.is_some() {
                *current_style = out.style;
            }
            pending.extend(out.subreports);
            cell.value = Some(out.text);
        }

        if let Some(style) = current_style.as_ref() {
            cell.apply_style(style);
        }
        cell
    }

    /// Writes a visible cell and marks the positions its merge absorbs.
    fn place(&mut self, cell: ReportCell, row: usize, col: usize) {
        if !cell.visible || self.covered.contains(&(row, col)) {
            return;
        }
        for dr in 0..cell.merge_row {
            for dc in 0..cell.merge_col {
                if dr == 0 && dc == 0 {
                    continue;
                }
                self.covered.insert((row + dr, col + dc));
                if dr == 0 {
                    if let Some(slot) = self.output.sheet[row].get_mut(col + dc) {
                        *slot = None;
                    }
                }
            }
        }
        self.output.sheet[row][col] = Some(cell);
    }

    /// Generates sub-report `name` and appends its rows after the current row.
    fn splice_subreport(&mut self, name: &str, record: Option<&Record>) -> Result<(), GenerateError> {
        let Some(sub) = self.table.sub.get(name) else {
            log_warn!(REPORT, "no data for sub-report '{}'", name);
            return Ok(());
        };
        let max_depth = self.generator.options.max_subreport_depth;
        if self.depth + 1 > max_depth {
            return Err(GenerateError::SubReport {
                name: name.to_string(),
                reason: format!("nested deeper than {}", max_depth),
            });
        }

        let mut namespace = self.variables.clone();
        if let Some(record) = record {
            for (field, value) in record.iter() {
                namespace.set(format!("parent.{}", field), value.clone());
            }
        }
        let generated = self
            .generator
            .generate_at_depth(&sub.report, &sub.table, Some(&namespace), None, self.depth + 1)
            .map_err(|e| GenerateError::SubReport {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        for sub_row in generated.sheet {
            let out_row = self.cur_row;
            self.output.ensure_size(out_row + 1, sub_row.len());
            let height = row_height(&sub_row, self.generator.options.default_row_height);
            for (col, slot) in sub_row.into_iter().enumerate() {
                if let Some(mut cell) = slot {
                    cell.top = self.cur_top;
                    self.place(cell, out_row, col);
                }
            }
            self.cur_top += height;
            self.cur_row += 1;
        }
        Ok(())
    }
}

/// Height of a row: the tallest cell that does not span rows.
fn row_height(row: &[Option<ReportCell>], default: f64) -> f64 {
    let height = row
        .iter()
        .flatten()
        .filter(|c| c.merge_row == 1)
        .map(|c| c.height)
        .fold(0.0, f64::max);
    if height > 0.0 {
        height
    } else {
        default
    }
}

/// Grows a band's output extent to cover rows `start..start + rows`.
fn record_extent(slot: &mut Option<Band>, start: usize, rows: usize, col: usize, col_size: usize) {
    match slot {
        Some(band) => band.row_size = (start + rows).max(band.end_row()) - band.row,
        None => *slot = Some(Band::new(start, col, rows, col_size)),
    }
}

/// Rebinds `['A']`, `['B']`, ... in the detail band to the query fields in order.
fn bind_auto_detail(template: &mut Report, fields: &[String]) {
    let Some(detail) = template.detail else {
        return;
    };
    for row in detail.rows() {
        let Some(cells) = template.sheet.get_mut(row) else {
            continue;
        };
        for cell in cells.iter_mut().flatten() {
            let letter = cell
                .value
                .as_deref()
                .and_then(|v| v.strip_prefix("['"))
                .and_then(|v| v.strip_suffix("']"))
                .and_then(col_to_index);
            if let Some(index) = letter {
                cell.value = fields.get(index).map(|f| format!("['{}']", f));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summation::accumulators_for;
    use engine::CellValue;

    fn rec(g: f64, v: f64, ordinal: usize) -> Record {
        Record::from_row(
            &["g".to_string(), "v".to_string()],
            &[CellValue::Number(g), CellValue::Number(v)],
            ordinal,
        )
    }

    fn one_row(values: &[&str]) -> Vec<Option<ReportCell>> {
        values.iter().map(|v| Some(ReportCell::new(Some(v)))).collect()
    }

    #[test]
    fn break_detection_is_outermost_first() {
        let groups = vec![Group::new("g"), Group::new("v")];
        let curr = rec(1.0, 2.0, 0);
        assert_eq!(detect_break(&groups, &[None, None], &curr), Some(0));

        let same = [Some(rec(1.0, 2.0, 0)), Some(rec(1.0, 2.0, 0))];
        assert_eq!(detect_break(&groups, &same, &rec(1.0, 2.0, 1)), None);
        assert_eq!(detect_break(&groups, &same, &rec(1.0, 3.0, 1)), Some(1));
        assert_eq!(detect_break(&groups, &same, &rec(2.0, 2.0, 1)), Some(0));
        assert_eq!(detect_break(&[], &[], &curr), None);
    }

    #[test]
    fn extents_grow_over_repeated_emissions() {
        let mut slot = None;
        record_extent(&mut slot, 3, 1, 0, 2);
        record_extent(&mut slot, 6, 1, 0, 2);
        assert_eq!(slot, Some(Band::new(3, 0, 4, 2)));
    }

    #[test]
    fn auto_detail_binds_letters_to_fields() {
        let mut template = Report::new("t");
        template.sheet = vec![one_row(&["['A']", "['B']", "['C']"])];
        template.detail = Some(Band::new(0, 0, 1, 3));
        bind_auto_detail(&mut template, &["x".to_string(), "y".to_string()]);
        assert_eq!(template.row_texts(0), vec!["['x']", "['y']", ""]);
        assert!(template.cell(0, 2).unwrap().value.is_none());
    }

    #[test]
    fn group_footer_sums_read_zero_right_after_emission() {
        let mut template = Report::new("t");
        template.sheet = vec![
            one_row(&["['v']"]),
            one_row(&["[^SUM({v})^]"]),
        ];
        template.detail = Some(Band::new(0, 0, 1, 1));
        let mut group = Group::new("g");
        group.footer = Some(Band::new(1, 0, 1, 1));
        template.groups.push(group);

        let table = QueryTable::new(
            &["g", "v"],
            vec![
                vec![1.0.into(), 10.0.into()],
                vec![1.0.into(), 20.0.into()],
            ],
        );
        let generator = ReportGenerator::new();
        let mut run = Run::new(&generator, &template, &table, None, None, 0).unwrap();

        for index in 0..2 {
            let record = table.record(index).unwrap();
            sum_iterate(
                &mut run.template.sheet,
                &record,
                &run.variables,
                &generator.functions,
                &mut run.formulas,
            );
        }
        let footer_sum = |run: &Run<'_>| {
            run.template.cell(1, 0).unwrap().sum.as_ref().unwrap()[0].value
        };
        assert_eq!(footer_sum(&run), 30.0);

        run.emit_group_footer(0, &table.record(1).unwrap()).unwrap();
        assert_eq!(run.output.row_texts(0), vec!["30"]);
        assert_eq!(footer_sum(&run), 0.0);
    }

    #[test]
    fn working_copy_keeps_template_untouched() {
        let mut template = Report::new("t");
        template.sheet = vec![one_row(&["[^SUM({v})^]"])];
        template.footer = Some(Band::new(0, 0, 1, 1));
        template.sheet[0][0].as_mut().unwrap().sum = Some(accumulators_for("[^SUM({v})^]"));
        let before = template.clone();

        let table = QueryTable::new(&["g", "v"], vec![vec![1.0.into(), 4.0.into()]]);
        let report = ReportGenerator::new()
            .generate(&template, &table, None, None)
            .unwrap();
        assert_eq!(report.row_texts(0), vec!["4"]);
        assert_eq!(template, before);
    }
}
