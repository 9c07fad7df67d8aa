use margin_difflens::diff::LineState;
use margin_difflens::parser::parse_unified_diff;
use std::path::PathBuf;

#[test]
fn parse_patch_without_git_header() {
    let diff = "\
--- /dev/null
+++ b/demos/new_file.rs
@@ -0,0 +1,3 @@
+fn main() {
+    println!(\"hello\");
+}
";
    let files = parse_unified_diff(diff).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].new_path, PathBuf::from("demos/new_file.rs"));
    let lines: Vec<i64> = files[0].chunks[0].changed_lines().map(|(l, _)| l).collect();
    assert_eq!(lines, vec![0, 1, 2]);
}

#[test]
fn fixture_maps_to_current_document_lines() {
    let diff = include_str!("fixtures/recent.diff");
    let files = parse_unified_diff(diff).unwrap();
    let file = &files[0];
    assert_eq!(file.new_path, PathBuf::from("src/annotate.rs"));

    let mapped: Vec<(i64, LineState)> = file
        .chunks
        .iter()
        .flat_map(|chunk| chunk.changed_lines())
        .filter_map(|(line, diff_line)| diff_line.state().map(|state| (line, state)))
        .collect();

    // Chunk 2: the four removed lines collapse into one changed line
    assert_eq!(
        mapped,
        vec![
            (5, LineState::Changed),
            (6, LineState::Added),
            (23, LineState::Changed),
        ]
    );
}
