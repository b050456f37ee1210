use avldb::loader::{load, LoadSummary};
use avldb::{AvlTree, DbError, Record};
use std::io::Cursor;

fn setup_tree(dir: &tempfile::TempDir) -> AvlTree {
    AvlTree::create(dir.path().join("load.avl"), &[6, 6], 1).unwrap()
}

#[test]
fn applies_inserts_and_removals_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut tree = setup_tree(&dir);
    let data = "\
10 alice smith 30
20 bob jones 41

5 carol white 27
# 10
20 dup dup 0
#99
7 dave brown -3
";
    let summary = load(&mut tree, Cursor::new(data)).unwrap();
    assert_eq!(
        summary,
        LoadSummary { inserted: 4, duplicates: 1, removed: 1, missing: 1 }
    );

    let keys: Vec<i32> = tree.traverse().map(|e| e.unwrap().key).collect();
    assert_eq!(keys, vec![5, 7, 20]);
    assert_eq!(
        tree.find(20).unwrap(),
        Some(Record::new(vec!["bob".into(), "jones".into()], vec![41]))
    );
    assert_eq!(tree.find(10).unwrap(), None);
    // removing 10 freed a slot and inserting 7 took it back
    assert_eq!(tree.verify().unwrap().free_slots, 0);
}

#[test]
fn stops_at_first_bad_line_with_its_number() {
    let dir = tempfile::tempdir().unwrap();
    let mut tree = setup_tree(&dir);
    let data = "1 a b 1\n2 a b\n3 a b 3\n";
    match load(&mut tree, Cursor::new(data)) {
        Err(DbError::ParseError(msg)) => assert!(msg.starts_with("line 2:"), "{}", msg),
        other => panic!("expected parse error, got {:?}", other),
    }
    // the line before the bad one was applied, the one after was not
    assert!(tree.find(1).unwrap().is_some());
    assert!(tree.find(3).unwrap().is_none());
}

#[test]
fn over_long_strings_are_rejected_not_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let mut tree = setup_tree(&dir);
    let data = "1 short ok 1\n2 waytoolong ok 2\n";
    match load(&mut tree, Cursor::new(data)) {
        Err(DbError::SchemaMismatch(msg)) => assert!(msg.starts_with("line 2:"), "{}", msg),
        other => panic!("expected schema mismatch, got {:?}", other),
    }
    assert!(tree.find(2).unwrap().is_none());
}
