//! FILENAME: report-engine/tests/test_generate.rs
//! PURPOSE: Tests for filling templates from query tables.

mod common;

use common::{first_column, grouped_table, grouped_template, text_table, texts, TemplateBuilder};
use engine::{CellStyle, CellValue, EvalResult, Namespace};
use persistence::{DocCell, DocColumn, DocRow};
use report_engine::{
    create_empty_query_table, Band, GenerateError, GeneratorOptions, QueryTable, ReportGenerator,
    SubReport, TemplateParser,
};
use std::collections::BTreeMap;

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

// ============================================================================
// GROUP BREAKS
// ============================================================================

#[test]
fn test_group_break_order_and_totals() {
    let report = ReportGenerator::new()
        .generate(&grouped_template(), &grouped_table(), None, None)
        .unwrap();

    assert_eq!(
        texts(&report),
        vec![
            row(&["Title", ""]),
            row(&["1", ""]),
            row(&["1", "10"]),
            row(&["1", "20"]),
            row(&["1", "30"]),
            row(&["2", ""]),
            row(&["2", "5"]),
            row(&["2", "5"]),
            row(&["Total 45", ""]),
        ]
    );
}

#[test]
fn test_output_band_extents() {
    let report = ReportGenerator::new()
        .generate(&grouped_template(), &grouped_table(), None, None)
        .unwrap();

    assert_eq!(report.header, Some(Band::new(0, 0, 1, 2)));
    assert_eq!(report.detail, Some(Band::new(2, 0, 5, 2)));
    assert_eq!(report.footer, Some(Band::new(8, 0, 1, 2)));
    assert_eq!(report.groups[0].header, Some(Band::new(1, 0, 5, 2)));
    assert_eq!(report.groups[0].footer, Some(Band::new(4, 0, 4, 2)));
    for (_, band) in report.bands() {
        assert!(band.end_row() <= report.row_count());
    }
}

#[test]
fn test_last_group_record_is_kept() {
    let report = ReportGenerator::new()
        .generate(&grouped_template(), &grouped_table(), None, None)
        .unwrap();

    let last = report.groups[0].old_rec.as_ref().unwrap();
    assert_eq!(last.get("v"), Some(&CellValue::Number(5.0)));
}

#[test]
fn test_nested_groups_close_innermost_first() {
    let template = TemplateBuilder::new("nested", 1)
        .row(&["R ['region']"], "[head_grp]['region']")
        .row(&["C ['city']"], "[head_grp]['city']")
        .row(&["['amount']"], "[detail]")
        .row(&["c [^SUM({amount})^]"], "[foot_grp]['city']")
        .row(&["r [^SUM({amount})^]"], "[foot_grp]['region']")
        .parse();
    let table = QueryTable::new(
        &["region", "city", "amount"],
        vec![
            vec!["north".into(), "oslo".into(), 1.0.into()],
            vec!["north".into(), "bergen".into(), 2.0.into()],
            vec!["south".into(), "rome".into(), 4.0.into()],
        ],
    );

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(
        first_column(&report),
        vec![
            "R north", "C oslo", "1", "c 1", "C bergen", "2", "c 2", "r 3", "R south", "C rome",
            "4", "c 4", "r 4",
        ]
    );
}

#[test]
fn test_footer_only_groups_nest_outermost_first() {
    let template = TemplateBuilder::new("footers", 1)
        .row(&["['amount']"], "[detail]")
        .row(&["c [^SUM({amount})^]"], "[foot_grp]['city']")
        .row(&["r [^SUM({amount})^]"], "[foot_grp]['region']")
        .parse();
    let fields: Vec<&str> = template.groups.iter().map(|g| g.field.as_str()).collect();
    assert_eq!(fields, vec!["region", "city"]);

    let table = QueryTable::new(
        &["region", "city", "amount"],
        vec![
            vec!["north".into(), "oslo".into(), 1.0.into()],
            vec!["north".into(), "bergen".into(), 2.0.into()],
            vec!["south".into(), "rome".into(), 4.0.into()],
        ],
    );
    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(
        first_column(&report),
        vec!["1", "c 1", "2", "c 2", "r 3", "4", "c 4", "r 4"]
    );
}

#[test]
fn test_outer_footer_with_inner_header_group() {
    let template = TemplateBuilder::new("mixed", 1)
        .row(&["C ['city']"], "[head_grp]['city']")
        .row(&["['amount']"], "[detail]")
        .row(&["c [^SUM({amount})^]"], "[foot_grp]['city']")
        .row(&["r [^SUM({amount})^]"], "[foot_grp]['region']")
        .parse();
    let fields: Vec<&str> = template.groups.iter().map(|g| g.field.as_str()).collect();
    assert_eq!(fields, vec!["region", "city"]);
}

#[test]
fn test_unknown_group_field_is_an_error() {
    let err = ReportGenerator::new()
        .try_generate(
            &grouped_template(),
            &text_table(&["x", "v"], &[&["1", "2"]]),
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, GenerateError::UnknownField(ref f) if f == "g"));
}

// ============================================================================
// SUMMATION
// ============================================================================

#[test]
fn test_template_can_be_generated_repeatedly() {
    let template = grouped_template();
    let generator = ReportGenerator::new();

    let first = generator.generate(&template, &grouped_table(), None, None).unwrap();
    let second = generator.generate(&template, &grouped_table(), None, None).unwrap();
    assert_eq!(texts(&first), texts(&second));
    assert_eq!(first.row_texts(8), row(&["Total 45", ""]));
}

#[test]
fn test_avg_and_record_number() {
    let template = TemplateBuilder::new("stats", 2)
        .row(&["[^N^]", "['v']"], "[detail]")
        .row(&["[^AVG({v})^]", "[^SUM({v} * 2)^]"], "[footer]")
        .parse();
    let table = QueryTable::new(
        &["v"],
        vec![vec![2.0.into()], vec![4.0.into()], vec![9.0.into()]],
    );

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(first_column(&report), vec!["1", "2", "3", "5"]);
    assert_eq!(report.row_texts(3), row(&["5", "30"]));
}

// ============================================================================
// EMPTY INPUT
// ============================================================================

#[test]
fn test_empty_table_keeps_fixed_bands() {
    let template = TemplateBuilder::new("empty", 1)
        .row(&["top"], "[upper]")
        .row(&["Header"], "[header]")
        .row(&["['a']"], "[detail]")
        .row(&["Total [^SUM({a})^]"], "[footer]")
        .row(&["bottom"], "[under]")
        .parse();

    let report = ReportGenerator::new()
        .generate(&template, &create_empty_query_table(), None, None)
        .unwrap();
    assert_eq!(first_column(&report), vec!["top", "Header", "Total 0", "bottom"]);
    assert!(report.detail.is_none());
}

// ============================================================================
// DETAIL BINDING
// ============================================================================

#[test]
fn test_field_bound_detail() {
    let doc = TemplateBuilder::new("auto", 3).row(&[], "[detail]").document();
    let template = TemplateParser::new()
        .with_fields(&["a", "b", "c"])
        .parse(&doc, None)
        .unwrap();
    let table = text_table(&["a", "b", "c"], &[&["1", "2", "3"], &["4", "5", "6"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(texts(&report), vec![row(&["1", "2", "3"]), row(&["4", "5", "6"])]);
}

#[test]
fn test_positional_detail_binds_to_query_fields() {
    let template = TemplateBuilder::new("auto", 3).row(&[], "[detail]").parse();
    let table = text_table(&["name", "city"], &[&["ann", "oslo"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(report.row_texts(0), row(&["ann", "oslo", ""]));
}

// ============================================================================
// VARIABLES AND OVERRIDES
// ============================================================================

#[test]
fn test_variable_sources_in_priority_order() {
    let template = TemplateBuilder::new("vars", 3)
        .row(&["a", "1"], "[var]")
        .row(&["b", "1"], "[var]")
        .row(&["[&a&]", "[&b&]", "[&c&]"], "[header]")
        .parse();
    let table = create_empty_query_table().with_variable("b", "table");
    let namespace: Namespace = [("a", "ns"), ("c", "ns")].into_iter().collect();

    let report = ReportGenerator::new()
        .generate(&template, &table, Some(&namespace), None)
        .unwrap();
    assert_eq!(report.row_texts(0), row(&["1", "table", "ns"]));
}

#[test]
fn test_coord_fill_overrides_cell() {
    let template = TemplateBuilder::new("fill", 2)
        .row(&["['a']", "['b']"], "[detail]")
        .parse();
    let table = text_table(&["a", "b"], &[&["x", "y"]]).with_coord_fill(0, 0, "table");

    let generator = ReportGenerator::new();
    let report = generator.generate(&template, &table, None, None).unwrap();
    assert_eq!(report.row_texts(0), row(&["table", "y"]));

    let mut fill = BTreeMap::new();
    fill.insert((0, 1), "param".to_string());
    fill.insert((0, 0), "param".to_string());
    let report = generator.generate(&template, &table, None, Some(&fill)).unwrap();
    assert_eq!(report.row_texts(0), row(&["param", "param"]));
}

#[test]
fn test_host_function_in_expression() {
    let template = TemplateBuilder::new("fn", 1)
        .row(&["[@DOUBLE(record['v'])@] [#v + 1#]"], "[detail]")
        .parse();
    let table = QueryTable::new(&["v"], vec![vec![4.0.into()]]);

    let mut generator = ReportGenerator::new();
    generator.functions_mut().register("DOUBLE", |args: &[EvalResult]| {
        let n = args.first().and_then(EvalResult::as_number).unwrap_or(0.0);
        EvalResult::Number(n * 2.0)
    });
    let report = generator.generate(&template, &table, None, None).unwrap();
    assert_eq!(report.row_texts(0), row(&["8 5"]));
}

#[test]
fn test_failing_expression_leaves_cell_empty() {
    let template = TemplateBuilder::new("mid", 2)
        .row(&["[#MID('abc', s, 1)#]", "['s']"], "[detail]")
        .parse();
    let table = text_table(&["s"], &[&["NaN"], &["2"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(report.row_texts(0), row(&["", "NaN"]));
    assert_eq!(report.row_texts(1), row(&["b", "2"]));
}

// ============================================================================
// MERGES
// ============================================================================

#[test]
fn test_merged_detail_cell_keeps_neighbours_empty() {
    let wide = DocCell {
        merge_across: 2,
        ..DocCell::text("['a']")
    };
    let tag = DocCell {
        index: Some(4),
        ..DocCell::text("[detail]")
    };
    let template = TemplateBuilder::new("merge", 3)
        .raw_row(DocRow {
            cells: vec![wide, tag],
            ..DocRow::default()
        })
        .parse();
    let table = text_table(&["a"], &[&["one"], &["two"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    for r in 0..2 {
        let cell = report.cell(r, 0).unwrap();
        assert_eq!(cell.merge_col, 3);
        assert_eq!(cell.merge_across(), 2);
        assert!(report.sheet[r][1].is_none());
        assert!(report.sheet[r][2].is_none());
    }
    assert_eq!(report.cell(1, 0).unwrap().text(), "two");
}

#[test]
fn test_merge_down_absorbs_rows_below() {
    let tall = DocCell {
        merge_down: 1,
        ..DocCell::text("['a']")
    };
    let template = TemplateBuilder::new("tall", 2)
        .raw_row(DocRow {
            cells: vec![tall, DocCell::text("['b']"), DocCell::text("[detail]")],
            ..DocRow::default()
        })
        .row(&["", "lower"], "")
        .parse();
    assert!(template.sheet[1][0].is_none());
    let table = text_table(&["a", "b"], &[&["one", "1"], &["two", "2"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(report.row_count(), 4);
    for (top, value) in [(0, "one"), (2, "two")] {
        let cell = report.cell(top, 0).unwrap();
        assert_eq!(cell.text(), value);
        assert_eq!(cell.merge_row, 2);
        assert!(report.sheet[top + 1][0].is_none());
        assert_eq!(report.cell(top + 1, 1).unwrap().text(), "lower");
    }
}

// ============================================================================
// STYLES
// ============================================================================

#[test]
fn test_style_directive_applies_to_rest_of_band() {
    let mut template = TemplateBuilder::new("styled", 2)
        .row(&["[*bold*]x", "y"], "[detail]")
        .parse();
    template
        .style_lib
        .insert("bold".to_string(), CellStyle::new().with_bold(true));
    let table = text_table(&["a"], &[&["1"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert_eq!(report.row_texts(0), row(&["x", "y"]));
    for c in 0..2 {
        let font = report.cell(0, c).unwrap().font.clone().unwrap();
        assert!(font.bold);
    }
}

#[test]
fn test_hidden_cell_is_evaluated_but_not_written() {
    let mut doc = TemplateBuilder::new("hidden", 3)
        .row(&["['a']", "[*bold*]", "['b']"], "[detail]")
        .document();
    doc.worksheets[0].columns = vec![DocColumn {
        index: Some(2),
        hidden: true,
        ..DocColumn::default()
    }];
    let mut template = TemplateParser::new().parse(&doc, None).unwrap();
    template
        .style_lib
        .insert("bold".to_string(), CellStyle::new().with_bold(true));
    assert!(!template.cell(0, 1).unwrap().visible);
    let table = text_table(&["a", "b"], &[&["x", "y"]]);

    let report = ReportGenerator::new()
        .generate(&template, &table, None, None)
        .unwrap();
    assert!(report.sheet[0][1].is_none());
    let after = report.cell(0, 2).unwrap();
    assert_eq!(after.text(), "y");
    assert!(after.font.as_ref().unwrap().bold);
    // Cells before the directive keep their own style.
    assert!(!report.cell(0, 0).unwrap().font.as_ref().map_or(false, |f| f.bold));
}

// ============================================================================
// SUB-REPORTS
// ============================================================================

fn lines_subreport() -> SubReport {
    let template = TemplateBuilder::new("lines", 1)
        .row(&["[&parent.id&]-['item']"], "[detail]")
        .parse();
    SubReport::new(template, text_table(&["item"], &[&["a"], &["b"]]))
}

fn orders_template() -> report_engine::Report {
    TemplateBuilder::new("orders", 2)
        .row(&["Orders"], "[header]")
        .row(&["['id']", "[$lines$]"], "[detail]")
        .parse()
}

#[test]
fn test_subreport_rows_follow_their_row() {
    let table = text_table(&["id"], &[&["1"], &["2"]]).with_sub("lines", lines_subreport());

    let report = ReportGenerator::new()
        .generate(&orders_template(), &table, None, None)
        .unwrap();
    assert_eq!(
        texts(&report),
        vec![
            row(&["Orders", ""]),
            row(&["1", ""]),
            row(&["1-a", ""]),
            row(&["1-b", ""]),
            row(&["2", ""]),
            row(&["2-a", ""]),
            row(&["2-b", ""]),
        ]
    );
}

#[test]
fn test_subreport_without_data_is_skipped() {
    let table = text_table(&["id"], &[&["1"]]);

    let report = ReportGenerator::new()
        .generate(&orders_template(), &table, None, None)
        .unwrap();
    assert_eq!(report.row_count(), 2);
}

#[test]
fn test_subreport_depth_is_limited() {
    let table = text_table(&["id"], &[&["1"]]).with_sub("lines", lines_subreport());
    let options = GeneratorOptions {
        max_subreport_depth: 0,
        ..GeneratorOptions::default()
    };

    let generator = ReportGenerator::new().with_options(options);
    let err = generator
        .try_generate(&orders_template(), &table, None, None)
        .unwrap_err();
    match err {
        GenerateError::Band { band, source } => {
            assert_eq!(band, "detail");
            assert!(matches!(*source, GenerateError::SubReport { ref name, .. } if name == "lines"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(generator.generate(&orders_template(), &table, None, None).is_none());
}
