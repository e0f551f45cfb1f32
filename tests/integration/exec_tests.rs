//! Integration tests for ordered, bounded task execution

use crate::common::{sample_data, TestFixture};
use rowdiff::diff::{table_diff_task, DiffContext};
use rowdiff::doc::{Doc, HunkDoc, Title, UnifiedDoc};
use rowdiff::source::SourceRef;
use rowdiff::{execute, CancelToken, DiffConfig, DiffTask, RowdiffError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn text_task(text: &'static str) -> DiffTask {
    let doc = Arc::new(UnifiedDoc::new(None));
    let populate_doc = doc.clone();
    DiffTask::new(doc, move |_| {
        populate_doc.write(text.as_bytes());
        populate_doc.seal(None);
        Ok(())
    })
}

#[test]
fn test_order_is_caller_order_not_completion_order() {
    let sealed_order = Arc::new(Mutex::new(Vec::new()));

    let d0 = Arc::new(UnifiedDoc::new(None));
    let d0_populate = d0.clone();
    let d0_order = sealed_order.clone();
    let d1 = Arc::new(UnifiedDoc::new(None));
    let d1_populate = d1.clone();
    let d1_order = sealed_order.clone();

    let tasks = vec![
        DiffTask::new(d0, move |_| {
            // D0 finishes populating long after D1.
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(80));
                d0_populate.write(b"D0\n");
                d0_order.lock().unwrap().push(0);
                d0_populate.seal(None);
            });
            Ok(())
        }),
        DiffTask::new(d1, move |_| {
            d1_populate.write(b"D1\n");
            d1_order.lock().unwrap().push(1);
            d1_populate.seal(None);
            Ok(())
        }),
        text_task("D2\n"),
    ];

    let mut out = Vec::new();
    let outcome = execute(&CancelToken::new(), &mut out, 1, tasks);
    assert!(outcome.error.is_none());
    assert_eq!(*sealed_order.lock().unwrap(), vec![1, 0]);
    assert_eq!(String::from_utf8(out).unwrap(), "D0\nD1\nD2\n");
}

#[test]
fn test_order_holds_with_unbounded_concurrency() {
    let tasks: Vec<DiffTask> = (0..8u64)
        .map(|i| {
            let doc = Arc::new(UnifiedDoc::new(None));
            let populate_doc = doc.clone();
            DiffTask::new(doc, move |_| {
                // Later tasks finish first.
                thread::sleep(Duration::from_millis(5 * (8 - i)));
                populate_doc.write(format!("task {}\n", i).as_bytes());
                populate_doc.seal(None);
                Ok(())
            })
        })
        .collect();

    let mut out = Vec::new();
    execute(&CancelToken::new(), &mut out, -1, tasks)
        .into_result()
        .unwrap();

    let expected: String = (0..8).map(|i| format!("task {}\n", i)).collect();
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_concurrency_bounds_running_tasks() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<DiffTask> = (0..6)
        .map(|_| {
            let doc = Arc::new(UnifiedDoc::new(None));
            let populate_doc = doc.clone();
            let running = running.clone();
            let peak = peak.clone();
            DiffTask::new(doc, move |_| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                populate_doc.seal(None);
                Ok(())
            })
        })
        .collect();

    let mut out = Vec::new();
    execute(&CancelToken::new(), &mut out, 2, tasks)
        .into_result()
        .unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[test]
fn test_no_hunks_means_no_diffs() {
    let tasks: Vec<DiffTask> = (0..3)
        .map(|i| {
            let doc = Arc::new(HunkDoc::new(
                Some(Title::new(format!("table {}", i))),
                "--- a\n+++ b\n",
            ));
            let populate_doc = doc.clone();
            DiffTask::new(doc, move |_| {
                populate_doc.seal(None);
                Ok(())
            })
        })
        .collect();

    let mut out = Vec::new();
    let outcome = execute(&CancelToken::new(), &mut out, 0, tasks);
    assert!(!outcome.has_diffs);
    assert!(outcome.error.is_none());
    assert!(out.is_empty());
}

#[test]
fn test_cancellation_returns_cause_and_tasks_exit() {
    let exited = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<DiffTask> = (0..4)
        .map(|_| {
            let doc = Arc::new(HunkDoc::new(None, ""));
            let populate_doc = doc.clone();
            let exited = exited.clone();
            DiffTask::new(doc, move |cancel: &CancelToken| {
                let hunk = populate_doc.new_hunk(0);
                hunk.write(b"-a\n");
                // Block like a producer waiting on rows.
                let _ = cancel.done().recv();
                hunk.seal(Vec::new(), cancel.err());
                populate_doc.seal(cancel.err());
                exited.fetch_add(1, Ordering::SeqCst);
                cancel.check()
            })
        })
        .collect();

    let cancel = CancelToken::new();
    cancel
        .cancel_after(Duration::from_millis(40))
        .unwrap();

    let started = Instant::now();
    let mut out = Vec::new();
    let outcome = execute(&cancel, &mut out, -1, tasks);

    let err = outcome.error.unwrap();
    assert!(err.is_stopped());
    assert!(matches!(err.root(), RowdiffError::DeadlineExceeded));
    assert_eq!(exited.load(Ordering::SeqCst), 4);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_first_failure_cancels_others() {
    let failing = Arc::new(UnifiedDoc::new(None));
    let failing_doc = failing.clone();
    let waiting = Arc::new(UnifiedDoc::new(None));
    let waiting_doc = waiting.clone();
    let observed = Arc::new(Mutex::new(None));
    let observed_by_task = observed.clone();

    let tasks = vec![
        DiffTask::new(waiting, move |cancel: &CancelToken| {
            let _ = cancel.done().recv();
            *observed_by_task.lock().unwrap() = cancel.err().map(|e| e.to_string());
            waiting_doc.seal(cancel.err());
            cancel.check()
        }),
        DiffTask::new(failing, move |_| {
            failing_doc.seal(None);
            Err(RowdiffError::data_processing("disk on fire"))
        }),
    ];

    let mut out = Vec::new();
    let outcome = execute(&CancelToken::new(), &mut out, -1, tasks);
    assert_eq!(
        outcome.error.unwrap().to_string(),
        "Data processing error: disk on fire"
    );
    assert_eq!(
        observed.lock().unwrap().as_deref(),
        Some("Data processing error: disk on fire")
    );
}

#[test]
fn test_docs_are_closed_after_execute() {
    let doc = Arc::new(UnifiedDoc::new(None));
    let populate_doc = doc.clone();
    let task = DiffTask::new(doc.clone(), move |_| {
        populate_doc.write(b"content\n");
        populate_doc.seal(None);
        Ok(())
    });

    let mut out = Vec::new();
    execute(&CancelToken::new(), &mut out, 1, vec![task]);
    assert_eq!(out, b"content\n");
    // Closed docs release their content.
    assert!(doc.read_all(&CancelToken::new()).unwrap().is_empty());
}

#[test]
fn test_copied_doc_is_released_while_later_task_runs() {
    let d0 = Arc::new(HunkDoc::new(None, "hdr\n"));
    let d0_populate = d0.clone();
    let d0_watch = d0.clone();
    let d1 = Arc::new(UnifiedDoc::new(None));
    let d1_populate = d1.clone();
    let retained = Arc::new(Mutex::new(None));
    let retained_seen = retained.clone();

    let tasks = vec![
        DiffTask::new(d0, move |_| {
            let hunk = d0_populate.new_hunk(0);
            hunk.write(b"big body\n");
            hunk.seal(b"@@ -1 +1 @@\n".to_vec(), None);
            d0_populate.seal(None);
            Ok(())
        }),
        DiffTask::new(d1, move |_| {
            // Keep running until the first doc has been copied and dropped.
            let deadline = Instant::now() + Duration::from_secs(5);
            while d0_watch.hunk_count() > 0 && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            *retained_seen.lock().unwrap() = Some(d0_watch.hunk_count());
            d1_populate.write(b"tail\n");
            d1_populate.seal(None);
            Ok(())
        }),
    ];

    let mut out = Vec::new();
    execute(&CancelToken::new(), &mut out, -1, tasks)
        .into_result()
        .unwrap();
    assert_eq!(*retained.lock().unwrap(), Some(0));
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "hdr\n@@ -1 +1 @@\nbig body\ntail\n"
    );
}

#[test]
fn test_deadline_stops_real_table_diffs() {
    let fixture = TestFixture::new().unwrap();
    let rows = 200_000;
    fixture
        .create_file("left.csv", &sample_data::numbered_rows(rows))
        .unwrap();
    let mut right = String::from("id,name\n");
    for i in 0..rows {
        if i % 10 == 0 {
            right.push_str(&format!("{},changed{}\n", i, i));
        } else {
            right.push_str(&format!("{},item{}\n", i, i));
        }
    }
    fixture.create_file("right.csv", &right).unwrap();

    let config = DiffConfig {
        context: 1,
        channel_capacity: 4,
        ..Default::default()
    };
    let ctx = Arc::new(DiffContext::new(&config));
    let left = SourceRef::parse(&fixture.arg("left.csv")).unwrap();
    let right = SourceRef::parse(&fixture.arg("right.csv")).unwrap();

    // Every task has returned, and with it joined its producers and pairer.
    let finished = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<DiffTask> = (0..3)
        .map(|_| {
            let finished = finished.clone();
            table_diff_task(ctx.clone(), left.clone(), right.clone()).on_complete(move || {
                finished.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    let docs: Vec<Arc<dyn Doc>> = tasks.iter().map(|task| task.doc().clone()).collect();

    let cancel = CancelToken::new();
    cancel.cancel_after(Duration::from_millis(20)).unwrap();

    let started = Instant::now();
    let mut out = Vec::new();
    let outcome = execute(&cancel, &mut out, -1, tasks);

    let err = outcome.error.unwrap();
    assert!(err.is_stopped());
    assert!(matches!(err.root(), RowdiffError::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert!(docs.iter().all(|doc| doc.is_sealed()));
    assert!(!String::from_utf8_lossy(&out).contains(&format!("changed{}", rows - 10)));
}
