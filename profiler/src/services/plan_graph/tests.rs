//! Plan graph tests driven by operator-stats fixtures
//!
//! Fixtures live in `tests/fixtures/operator_stats/` and mimic both JSON
//! exports of `GET_QUERY_OPERATOR_STATS` and SQL API result rows.

#[cfg(test)]
mod tests {
    use crate::services::plan_graph::*;
    use crate::services::record_source::file_source::rows_from_document;
    use std::fs;
    use std::path::PathBuf;

    fn get_fixture_path(filename: &str) -> PathBuf {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("tests/fixtures/operator_stats");
        path.push(filename);
        path
    }

    fn load_rows(filename: &str) -> Vec<RawRow> {
        let path = get_fixture_path(filename);
        let text = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", path.display(), e));
        let document = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("Fixture {} is not JSON: {}", path.display(), e));
        rows_from_document(document).unwrap()
    }

    fn render(filename: &str, options: BuildOptions) -> GraphResult<RenderedPlan> {
        render_rows(&load_rows(filename), options, &GraphStyle::default())
    }

    /// `  n1 [` and `  i1 [ label=...` lines
    fn node_declarations(dot: &str) -> usize {
        dot.lines()
            .filter(|line| !line.contains("->"))
            .map(str::trim_start)
            .filter(|line| {
                (line.starts_with('n') || line.starts_with('i')) && line.contains(" [")
            })
            .count()
    }

    fn edge_lines(dot: &str) -> Vec<&str> {
        dot.lines().filter(|line| line.contains("->")).collect()
    }

    /// Rows of the box for `n<id>`, title included
    fn box_rows(dot: &str, node_id: i64) -> Vec<String> {
        let header = format!("  n{} [", node_id);
        dot.lines()
            .skip_while(|line| *line != header)
            .take_while(|line| *line != "  ]")
            .filter(|line| line.trim_start().starts_with("<tr>"))
            .map(|line| line.trim().to_string())
            .collect()
    }

    fn record(node_id: i64) -> OperatorStatsRecord {
        OperatorStatsRecord::new(node_id, format!("Op{}", node_id))
    }

    // ========================================================================
    // Graph Shape
    // ========================================================================

    mod graph_shape_tests {
        use super::*;

        #[test]
        fn test_one_declaration_per_record_plus_row_counts() {
            let rows = load_rows("orders_by_customer.json");
            let records = RowParser::parse_rows(&rows).unwrap();
            let with_rows = records.iter().filter(|r| r.input_rows().is_some()).count();

            let rendered =
                render_records(&records, BuildOptions::default(), &GraphStyle::default()).unwrap();
            assert_eq!(node_declarations(&rendered.dot), records.len() + with_rows);
            assert_eq!(rendered.summary.operator_nodes, 7);
            assert_eq!(rendered.summary.row_count_nodes, 7);
        }

        #[test]
        fn test_edges_of_orders_plan() {
            let rendered = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let edges = edge_lines(&rendered.dot);

            // 7 row-count edges, 6 parent edges, 1 join edge
            assert_eq!(edges.len(), 14);
            assert!(rendered.warnings.is_empty());
            assert!(edges.contains(&"  n5 -> n2 [ dir=\"forward\" style=\"dashed\" ];"));
            assert!(edges.contains(&"  i2 -> n5;"));
            assert!(edges.contains(&"  n4 -> i4;"));
        }

        #[test]
        fn test_edge_order_follows_records() {
            let rendered = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let edges = edge_lines(&rendered.dot);
            assert_eq!(edges[0], "  n0 -> i0;");
            assert_eq!(edges[1], "  n1 -> i1;");
            assert_eq!(edges[2], "  i0 -> n1;");
        }

        #[test]
        fn test_two_record_plan() {
            let records = vec![
                record(1).with_io_stats(IoStatistics {
                    input_rows: Some(100),
                    ..Default::default()
                }),
                record(2).with_parent(1),
            ];
            let rendered =
                render_records(&records, BuildOptions::default(), &GraphStyle::default()).unwrap();

            assert_eq!(node_declarations(&rendered.dot), 3);
            assert!(rendered.dot.contains("  i1 [ label=\"100\""));
            assert_eq!(edge_lines(&rendered.dot), vec!["  n1 -> i1;", "  i1 -> n2;"]);
        }

        #[test]
        fn test_join_edge_independent_of_tree_edges() {
            let records = vec![
                record(7).with_io_stats(IoStatistics {
                    input_rows: Some(10),
                    ..Default::default()
                }),
                record(3).with_parent(7).with_attributes(OperatorAttributes {
                    join_id: Some(7),
                    ..Default::default()
                }),
            ];
            let rendered =
                render_records(&records, BuildOptions::default(), &GraphStyle::default()).unwrap();

            let dashed: Vec<_> = edge_lines(&rendered.dot)
                .into_iter()
                .filter(|line| line.contains("dashed"))
                .collect();
            assert_eq!(dashed, vec!["  n3 -> n7 [ dir=\"forward\" style=\"dashed\" ];"]);
            assert!(rendered.dot.contains("  i7 -> n3;"));
        }

        #[test]
        fn test_empty_input_is_complete_graph() {
            let rendered = render("empty.json", BuildOptions::default()).unwrap();
            assert_eq!(node_declarations(&rendered.dot), 0);
            assert!(edge_lines(&rendered.dot).is_empty());
            assert!(rendered.dot.starts_with("digraph G {\n"));
            assert!(rendered.dot.contains("rankdir=\"TB\""));
            assert!(rendered.dot.contains("dir=\"back\""));
            assert!(rendered.dot.ends_with("}\n"));
        }

        #[test]
        fn test_output_is_deterministic() {
            let first = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let second = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            assert_eq!(first.dot, second.dot);
        }
    }

    // ========================================================================
    // Label Rendering
    // ========================================================================

    mod label_tests {
        use super::*;

        #[test]
        fn test_bare_record_has_single_label_line() {
            let rendered =
                render_records(&[record(9)], BuildOptions::default(), &GraphStyle::default())
                    .unwrap();
            assert_eq!(box_rows(&rendered.dot, 9).len(), 1);
        }

        #[test]
        fn test_table_scan_box() {
            let rendered = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let rows = box_rows(&rendered.dot, 4);
            let text = rows.join("\n");

            assert_eq!(rows.len(), 8);
            assert!(text.contains("<b>TableScan</b>"));
            assert!(text.contains("table_name: SALES.PUBLIC.ORDERS"));
            assert!(text.contains("overall_percentage: 60.0%"));
            assert!(text.contains("remote_disk_io: 30%"));
            assert!(text.contains("bytes_scanned: 1,234,567"));
            assert!(text.contains("percentage_scanned_from_cache: 25.00%"));
            assert!(text.contains("partitions_scanned: 12"));
            assert!(text.contains("partitions_total: 3400"));
        }

        #[test]
        fn test_zero_overall_percentage_suppressed() {
            let rendered = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let result_box = box_rows(&rendered.dot, 0).join("\n");
            assert!(!result_box.contains("overall_percentage"));
            assert!(result_box.contains("bytes_written_to_result: 96"));

            let filter_box = box_rows(&rendered.dot, 3);
            assert_eq!(filter_box.len(), 1);
        }

        #[test]
        fn test_small_percentage_rounds_to_one_decimal() {
            let rendered = render("orders_by_customer.json", BuildOptions::default()).unwrap();
            let join_filter = box_rows(&rendered.dot, 5).join("\n");
            assert!(join_filter.contains("overall_percentage: 0.1%"));
        }

        #[test]
        fn test_filter_condition_option() {
            let options = BuildOptions { show_filter_condition: true, ..Default::default() };
            let rendered = render("orders_by_customer.json", options).unwrap();
            let filter_box = box_rows(&rendered.dot, 3).join("\n");
            assert!(filter_box.contains("filter_condition: O_TOTALPRICE &gt; 1000"));
        }

        #[test]
        fn test_sql_api_text_cells() {
            let rendered = render("sql_api_text_cells.json", BuildOptions::default()).unwrap();
            let scan = box_rows(&rendered.dot, 1).join("\n");

            assert!(scan.contains("table_name: DB.S.&quot;Mixed&amp;Case&quot;"));
            assert!(scan.contains("bytes_scanned: 4,096"));
            assert_eq!(
                edge_lines(&rendered.dot),
                vec!["  n0 -> i0;", "  n1 -> i1;", "  i0 -> n1;"]
            );
        }
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    mod error_tests {
        use super::*;

        #[test]
        fn test_missing_parent_row_count_is_dropped_with_warning() {
            let rendered = render("missing_parent_rows.json", BuildOptions::default()).unwrap();

            assert_eq!(rendered.warnings.len(), 1);
            let warning = rendered.warnings[0];
            assert_eq!(warning.declared_by, 1);
            assert_eq!(warning.from, NodeRef::RowCount(0));
            assert_eq!(warning.to, NodeRef::Operator(1));
            assert!(!rendered.dot.contains("i0 -> n1"));
            assert_eq!(rendered.summary.dropped_edges, 1);
            assert_eq!(edge_lines(&rendered.dot).len(), 3);
        }

        #[test]
        fn test_missing_parent_row_count_fails_in_strict_mode() {
            let options = BuildOptions { strict: true, ..Default::default() };
            let err = render("missing_parent_rows.json", options).unwrap_err();
            assert!(matches!(err, PlanGraphError::DanglingReference(_)));
            assert_eq!(err.node_id(), Some(1));
        }

        #[test]
        fn test_unknown_join_target() {
            let records = vec![record(1).with_attributes(OperatorAttributes {
                join_id: Some(42),
                ..Default::default()
            })];
            let rendered =
                render_records(&records, BuildOptions::default(), &GraphStyle::default()).unwrap();
            assert!(edge_lines(&rendered.dot).is_empty());
            assert_eq!(rendered.warnings[0].kind, EdgeKind::JoinReference);
        }

        #[test]
        fn test_malformed_attributes_abort_build() {
            let err = render("malformed_attributes.json", BuildOptions::default()).unwrap_err();
            assert!(matches!(
                err,
                PlanGraphError::MalformedRecord { node_id: 1, section: "attributes", .. }
            ));
        }
    }
}
