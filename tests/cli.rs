use avldb::cli::run;
use avldb::DbError;
use std::fs;
use std::path::Path;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn run_ok(list: &[&str]) -> String {
    let mut out = Vec::new();
    run(&args(list), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn p(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn write_then_query_then_edit() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("people.avl");
    let data = dir.path().join("in.txt");
    let more = dir.path().join("more.txt");
    fs::write(&data, "10 abc xy 1 2\n20 de z 3 4\n5 fg w 5 6\n").unwrap();
    fs::write(&more, "# 10\n30 hij k 7 8\n").unwrap();

    let out = run_ok(&[p(&tree), "write", p(&data), "2", "5", "2", "print"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Tree Data:");
    assert!(lines[1].contains("key:5, strings:fg w, ints:5 6, height:0, left:-, right:-"), "{}", lines[1]);
    assert!(lines[2].contains("key:10, strings:abc xy, ints:1 2, height:1, left:5, right:20"), "{}", lines[2]);
    assert!(lines[3].contains("key:20,"));
    assert_eq!(lines[4], "Free: ");
    assert_eq!(lines[5], "Finished");

    assert_eq!(run_ok(&[p(&tree), "findI", "20"]), "20: [3, 4]\nFinished\n");
    assert_eq!(run_ok(&[p(&tree), "findS", "20"]), "20: [\"de\", \"z\"]\nFinished\n");
    assert_eq!(run_ok(&[p(&tree), "findS", "99"]), "99: not found\nFinished\n");

    let out = run_ok(&[p(&tree), "edit", p(&more)]);
    assert_eq!(out, "Finished\n");
    let out = run_ok(&[p(&tree), "print"]);
    let keys: Vec<&str> = out.lines().filter(|l| l.contains("key:")).collect();
    assert_eq!(keys.len(), 3);
    assert!(keys[1].contains("key:20,"));
    assert!(keys[2].contains("key:30,"));

    assert_eq!(run_ok(&[p(&tree), "verify"]), "nodes: 3, height: 1, free slots: 0\nFinished\n");
}

#[test]
fn free_lists_released_slots() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("free.avl");
    let data = dir.path().join("in.txt");
    fs::write(&data, "1 a 1\n2 b 2\n3 c 3\n# 1\n").unwrap();
    run_ok(&[p(&tree), "write", p(&data), "1", "2", "1"]);

    // a 28-byte header, so key 1 went into the slot at 28
    assert_eq!(run_ok(&[p(&tree), "free"]), "Free: 28\nFinished\n");
}

#[test]
fn reports_usage_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("nope.avl");
    let mut out = Vec::new();

    assert!(matches!(run(&args(&[p(&tree), "print"]), &mut out), Err(DbError::NotFound(_))));
    assert!(matches!(run(&args(&[p(&tree), "bogus"]), &mut out), Err(DbError::ParseError(_))));
    assert!(matches!(run(&args(&[p(&tree), "findI", "ten"]), &mut out), Err(DbError::ParseError(_))));
    assert!(matches!(run(&args(&[p(&tree)]), &mut out), Err(DbError::ParseError(_))));
    assert!(matches!(
        run(&args(&[p(&tree), "write", "missing.txt", "1", "4", "0"]), &mut out),
        Err(DbError::NotFound(_))
    ));
    assert!(out.is_empty());
}

#[test]
fn failed_write_leaves_no_tree_behind() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("retry.avl");
    let data = dir.path().join("later.txt");
    let mut out = Vec::new();

    let first = run(&args(&[p(&tree), "write", p(&data), "1", "4", "0"]), &mut out);
    assert!(matches!(first, Err(DbError::NotFound(_))));
    assert!(!tree.exists());

    fs::write(&data, "1 a\n2 b\n").unwrap();
    assert_eq!(run_ok(&[p(&tree), "write", p(&data), "1", "4", "0"]), "Finished\n");
    assert_eq!(run_ok(&[p(&tree), "verify"]), "nodes: 2, height: 1, free slots: 0\nFinished\n");
}

#[test]
fn write_rejects_absurd_field_counts() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("huge.avl");
    let data = dir.path().join("in.txt");
    fs::write(&data, "1 a\n").unwrap();
    let mut out = Vec::new();

    for count in ["18446744073709551615", "4294967295", "4097", "-1"] {
        let result = run(&args(&[p(&tree), "write", p(&data), count, "4", "0"]), &mut out);
        assert!(matches!(result, Err(DbError::ParseError(_))), "count {}", count);
    }
    assert!(!tree.exists());
}
