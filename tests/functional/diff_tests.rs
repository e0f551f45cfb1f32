//! Functional tests for `rowdiff diff` on flat files

use crate::common::{sample_data, CliTestRunner};

#[test]
fn test_identical_files_have_no_diff() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_csv("a.csv", &sample_data::simple_csv_data())
        .unwrap();
    fixture
        .create_csv("b.csv", &sample_data::simple_csv_data())
        .unwrap();

    let output = runner.expect_success(&["diff", &fixture.arg("a.csv"), &fixture.arg("b.csv")]);
    assert!(!output.has_diffs());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_changed_value_full_output() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_csv("a.csv", &sample_data::simple_csv_data())
        .unwrap();
    fixture
        .create_csv("b.csv", &sample_data::updated_csv_data())
        .unwrap();
    let (a, b) = (fixture.arg("a.csv"), fixture.arg("b.csv"));

    let output = runner.expect_success(&["diff", &a, &b, "-U", "1"]);
    assert!(output.has_diffs());
    assert_eq!(
        output.stdout,
        format!(
            "rowdiff diff {a} {b}\n--- {a}\n+++ {b}\n@@ -1,2 +1,2 @@\n-1\tApple\t1.5\n+1\tApple\t1.6\n 2\tBanana\t0.75\n",
            a = a,
            b = b
        )
    );
}

#[test]
fn test_difference_in_middle_spans_context() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let left = sample_data::numbered_rows(10);
    let right = left.replace("5,item5\n", "5,changed\n");
    fixture.create_file("left.csv", &left).unwrap();
    fixture.create_file("right.csv", &right).unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("left.csv"),
        &fixture.arg("right.csv"),
        "--context",
        "2",
    ]);
    assert!(output.stdout.contains(
        "@@ -4,5 +4,5 @@\n 3\titem3\n 4\titem4\n-5\titem5\n+5\tchanged\n 6\titem6\n 7\titem7\n"
    ));
    assert_eq!(output.stdout.matches("@@ -").count(), 1);
}

#[test]
fn test_distant_differences_make_separate_hunks() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let left = sample_data::numbered_rows(100);
    let right = left
        .replace("10,item10\n", "10,x\n")
        .replace("90,item90\n", "90,y\n");
    fixture.create_file("left.csv", &left).unwrap();
    fixture.create_file("right.csv", &right).unwrap();

    let output = runner.expect_success(&["diff", &fixture.arg("left.csv"), &fixture.arg("right.csv")]);
    assert!(output.stdout.contains("@@ -8,7 +8,7 @@\n"));
    assert!(output.stdout.contains("@@ -88,7 +88,7 @@\n"));
    // Title and file header are printed once.
    assert_eq!(output.stdout.matches("rowdiff diff ").count(), 1);
    assert_eq!(output.stdout.matches("--- ").count(), 1);
}

#[test]
fn test_json_row_format() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_csv("a.csv", &sample_data::simple_csv_data())
        .unwrap();
    fixture
        .create_csv("b.csv", &sample_data::updated_csv_data())
        .unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("a.csv"),
        &fixture.arg("b.csv"),
        "--format",
        "json",
        "-U",
        "0",
    ]);
    assert!(output
        .stdout
        .contains("-{\"id\":\"1\",\"name\":\"Apple\",\"price\":\"1.5\"}\n"));
    assert!(output
        .stdout
        .contains("+{\"id\":\"1\",\"name\":\"Apple\",\"price\":\"1.6\"}\n"));
}

#[test]
fn test_color_output() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_csv("a.csv", &sample_data::simple_csv_data())
        .unwrap();
    fixture
        .create_csv("b.csv", &sample_data::updated_csv_data())
        .unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("a.csv"),
        &fixture.arg("b.csv"),
        "--color",
    ]);
    assert!(output.stdout.contains("\x1b[31m-1\tApple\t1.5\x1b[0m\n"));
    assert!(output.stdout.contains("\x1b[32m+1\tApple\t1.6\x1b[0m\n"));
    assert!(output.stdout.contains("\x1b[36m@@ -1,3 +1,3 @@\x1b[0m\n"));
}

#[test]
fn test_max_hunk_rows_splits_output() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let left = sample_data::numbered_rows(6);
    let right: String = left.replace("item", "other");
    fixture.create_file("left.csv", &left).unwrap();
    fixture.create_file("right.csv", &right).unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("left.csv"),
        &fixture.arg("right.csv"),
        "--max-hunk-rows",
        "2",
    ]);
    assert_eq!(output.stdout.matches("@@ -").count(), 3);
    for i in 0..6 {
        assert_eq!(output.stdout.matches(&format!("-{}\titem{}\n", i, i)).count(), 1);
    }
}

#[test]
fn test_overview_comes_first() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_file("a.csv", &sample_data::numbered_rows(3))
        .unwrap();
    fixture
        .create_file("b.csv", &sample_data::numbered_rows(4))
        .unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("a.csv"),
        &fixture.arg("b.csv"),
        "--overview",
    ]);
    let overview = output.stdout.find("rowdiff overview").unwrap();
    let rows = output.stdout.find("rowdiff diff").unwrap();
    assert!(overview < rows);
    assert!(output.stdout.contains("-rows: 3\n+rows: 4\n"));
    assert!(output.stdout.contains("+3\titem3\n"));
}

#[test]
fn test_missing_file_compares_against_nothing() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_file("a.csv", &sample_data::numbered_rows(2))
        .unwrap();

    let output = runner.expect_success(&["diff", &fixture.arg("a.csv"), &fixture.arg("gone.csv")]);
    assert!(output.has_diffs());
    assert!(output.stdout.contains("@@ -1,2 +0,0 @@\n-0\titem0\n-1\titem1\n"));
}

#[test]
fn test_unsupported_source_is_error() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture.create_file("notes.txt", "hello\n").unwrap();

    let err = runner.expect_failure(&["diff", &fixture.arg("notes.txt"), &fixture.arg("notes.txt")]);
    assert!(err.to_string().contains("Unsupported source format"));
}

#[test]
fn test_sequential_and_unbounded_concurrency_agree() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    let left = sample_data::numbered_rows(50);
    let right = left.replace("25,item25\n", "25,x\n");
    fixture.create_file("left.csv", &left).unwrap();
    fixture.create_file("right.csv", &right).unwrap();
    let (l, r) = (fixture.arg("left.csv"), fixture.arg("right.csv"));

    let sequential = runner.expect_success(&["diff", &l, &r, "--concurrency", "0", "--overview"]);
    let unbounded = runner.expect_success(&["diff", &l, &r, "--concurrency", "-1", "--overview"]);
    assert_eq!(sequential.stdout, unbounded.stdout);
}
