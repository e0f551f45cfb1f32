//! Functional tests for diffs between DuckDB databases

use crate::common::{sample_data, CliTestRunner};

const LEFT_SQL: &str = "
    CREATE TABLE zoo (id INTEGER, animal VARCHAR);
    CREATE TABLE actor (id INTEGER, name VARCHAR);
    CREATE TABLE film (id INTEGER, title VARCHAR);
    INSERT INTO zoo VALUES (1, 'lion'), (2, 'tiger');
    INSERT INTO actor VALUES (1, 'PENELOPE'), (2, 'NICK'), (3, 'ED');
    INSERT INTO film VALUES (1, 'ACADEMY DINOSAUR');
";

const RIGHT_SQL: &str = "
    CREATE TABLE zoo (id INTEGER, animal VARCHAR);
    CREATE TABLE actor (id INTEGER, name VARCHAR);
    CREATE TABLE film (id INTEGER, title VARCHAR);
    CREATE TABLE payment (id INTEGER, amount INTEGER);
    INSERT INTO zoo VALUES (1, 'lion'), (2, 'bear');
    INSERT INTO actor VALUES (1, 'PENELOPE'), (2, 'NICK'), (3, 'JENNIFER');
    INSERT INTO film VALUES (1, 'ACADEMY DINOSAUR');
    INSERT INTO payment VALUES (1, 5);
";

fn setup(runner: &CliTestRunner) -> (String, String) {
    let fixture = runner.fixture();
    fixture.create_duckdb("left.duckdb", LEFT_SQL).unwrap();
    fixture.create_duckdb("right.duckdb", RIGHT_SQL).unwrap();
    (fixture.arg("left.duckdb"), fixture.arg("right.duckdb"))
}

#[test]
fn test_whole_database_diff_in_lexical_order() {
    let runner = CliTestRunner::new().unwrap();
    let (left, right) = setup(&runner);

    let output = runner.expect_success(&["diff", &left, &right, "--concurrency", "-1"]);
    assert!(output.has_diffs());

    let actor = output
        .stdout
        .find(&format!("rowdiff diff {}#actor", left))
        .unwrap();
    let payment = output
        .stdout
        .find(&format!("rowdiff diff {}#payment", left))
        .unwrap();
    let zoo = output
        .stdout
        .find(&format!("rowdiff diff {}#zoo", left))
        .unwrap();
    assert!(actor < payment && payment < zoo);

    // Unchanged tables print nothing.
    assert!(!output.stdout.contains("#film"));

    assert!(output.stdout.contains("-3\tED\n+3\tJENNIFER\n"));
    assert!(output.stdout.contains("-2\ttiger\n+2\tbear\n"));
    // The table only on the right compares against nothing.
    assert!(output.stdout.contains("@@ -0,0 +1 @@\n+1\t5\n"));
}

#[test]
fn test_output_is_stable_across_concurrency() {
    let runner = CliTestRunner::new().unwrap();
    let (left, right) = setup(&runner);

    let reference = runner.expect_success(&["diff", &left, &right, "--concurrency", "0"]);
    for concurrency in ["1", "2", "-1"] {
        let output = runner.expect_success(&["diff", &left, &right, "--concurrency", concurrency]);
        assert_eq!(output.stdout, reference.stdout, "concurrency {}", concurrency);
    }
}

#[test]
fn test_single_table_diff() {
    let runner = CliTestRunner::new().unwrap();
    let (left, right) = setup(&runner);

    let output = runner.expect_success(&[
        "diff",
        &format!("{}#zoo", left),
        &format!("{}#zoo", right),
    ]);
    assert_eq!(output.stdout.matches("rowdiff diff ").count(), 1);
    assert!(output.stdout.contains("+2\tbear\n"));
}

#[test]
fn test_missing_table_on_both_sides_is_empty() {
    let runner = CliTestRunner::new().unwrap();
    let (left, right) = setup(&runner);

    let output = runner.expect_success(&[
        "diff",
        &format!("{}#nothing", left),
        &format!("{}#nothing", right),
    ]);
    assert!(!output.has_diffs());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_table_against_csv() {
    let runner = CliTestRunner::new().unwrap();
    let (left, _) = setup(&runner);
    runner
        .fixture()
        .create_file("zoo.csv", "id,animal\n1,lion\n2,tiger\n")
        .unwrap();

    let output = runner.expect_success(&[
        "diff",
        &format!("{}#zoo", left),
        &runner.fixture().arg("zoo.csv"),
    ]);
    assert!(!output.has_diffs());
}

#[test]
fn test_database_against_single_relation_is_error() {
    let runner = CliTestRunner::new().unwrap();
    let (left, right) = setup(&runner);

    let err = runner.expect_failure(&["diff", &left, &format!("{}#zoo", right)]);
    assert!(err.to_string().contains("whole database"));
}

#[test]
fn test_overview_lists_tables() {
    let runner = CliTestRunner::new().unwrap();
    let fixture = runner.fixture();
    fixture
        .create_duckdb("a.duckdb", sample_data::SHOP_SQL)
        .unwrap();
    fixture
        .create_duckdb(
            "b.duckdb",
            &format!("{}\nCREATE TABLE refunds (id INTEGER);", sample_data::SHOP_SQL),
        )
        .unwrap();

    let output = runner.expect_success(&[
        "diff",
        &fixture.arg("a.duckdb"),
        &fixture.arg("b.duckdb"),
        "--overview",
    ]);
    assert!(output.stdout.starts_with("rowdiff overview "));
    assert!(output.stdout.contains("+[refunds]\n+columns: id INTEGER\n+rows: 0\n"));
    // The new table is empty, so no row diff follows.
    assert!(!output.stdout.contains("rowdiff diff "));
}
