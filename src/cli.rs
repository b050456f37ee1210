use std::fs::File;
use std::io::{BufReader, Write};
use std::str::FromStr;
use log::{debug, info};

use crate::error::{DbError, DbResult};
use crate::loader;
use crate::report::{format_entry, format_free_list};
use crate::tree::AvlTree;

pub const USAGE: &str = "usage: avldb <tree-file> <command>
commands:
  print                                              list every node in key order
  findI <key>                                        int fields stored under key
  findS <key>                                        string fields stored under key
  write <data-file> <strings> <max-len> <ints> [print] create a tree and load data
  edit <data-file> [print]                           load data into an existing tree
  free                                               list free node slots
  verify                                             check the tree's invariants";

fn arg<'a>(args: &'a [String], idx: usize, what: &str) -> DbResult<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| DbError::ParseError(format!("missing {}\n{}", what, USAGE)))
}

fn number<T: FromStr>(args: &[String], idx: usize, what: &str) -> DbResult<T> {
    let raw = arg(args, idx, what)?;
    raw.parse()
        .map_err(|_| DbError::ParseError(format!("{} must be a number, got '{}'", what, raw)))
}

fn wants_print(args: &[String], idx: usize) -> DbResult<bool> {
    match args.get(idx).map(String::as_str) {
        None => Ok(false),
        Some("print") => Ok(true),
        Some(other) => Err(DbError::ParseError(format!("unexpected argument '{}'", other))),
    }
}

fn print_tree(tree: &mut AvlTree, out: &mut impl Write) -> DbResult<()> {
    writeln!(out, "Tree Data:")?;
    for entry in tree.traverse() {
        writeln!(out, "{}", format_entry(&entry?))?;
    }
    print_free(tree, out)
}

fn print_free(tree: &mut AvlTree, out: &mut impl Write) -> DbResult<()> {
    let free = tree.free_list().collect::<DbResult<Vec<u64>>>()?;
    writeln!(out, "Free: {}", format_free_list(&free))?;
    Ok(())
}

/// Upper bound on string fields accepted from the command line.
const MAX_STRING_FIELDS: u32 = 4096;

fn open_data(data: &str) -> DbResult<BufReader<File>> {
    let file = File::open(data).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DbError::NotFound(data.into()),
        _ => e.into(),
    })?;
    Ok(BufReader::new(file))
}

fn load_data(tree: &mut AvlTree, reader: BufReader<File>) -> DbResult<()> {
    let summary = loader::load(tree, reader)?;
    debug!("{:?}", summary);
    Ok(())
}

/// Run one command. `args` excludes the program name.
pub fn run(args: &[String], out: &mut impl Write) -> DbResult<()> {
    let path = arg(args, 0, "tree file")?;
    let command = arg(args, 1, "command")?;
    info!("avldb {} {}", path, command);

    match command {
        "print" => {
            let mut tree = AvlTree::open(path)?;
            print_tree(&mut tree, out)?;
            tree.close()?;
        }
        "findI" | "findS" => {
            let key: i32 = number(args, 2, "key")?;
            let mut tree = AvlTree::open(path)?;
            match tree.find(key)? {
                Some(record) if command == "findI" => writeln!(out, "{}: {:?}", key, record.ints)?,
                Some(record) => writeln!(out, "{}: {:?}", key, record.strings)?,
                None => writeln!(out, "{}: not found", key)?,
            }
            tree.close()?;
        }
        "write" => {
            let data = arg(args, 2, "data file")?;
            let strings: u32 = number(args, 3, "number of string fields")?;
            let max_len: u32 = number(args, 4, "string length")?;
            let ints: u32 = number(args, 5, "number of int fields")?;
            let print = wants_print(args, 6)?;
            if strings > MAX_STRING_FIELDS {
                return Err(DbError::ParseError(format!(
                    "number of string fields must be at most {}, got {}",
                    MAX_STRING_FIELDS, strings
                )));
            }

            // a missing data file must not leave an empty tree behind
            let reader = open_data(data)?;
            let mut tree = AvlTree::create(path, &vec![max_len; strings as usize], ints)?;
            load_data(&mut tree, reader)?;
            if print {
                print_tree(&mut tree, out)?;
            }
            tree.close()?;
        }
        "edit" => {
            let data = arg(args, 2, "data file")?;
            let print = wants_print(args, 3)?;

            let reader = open_data(data)?;
            let mut tree = AvlTree::open(path)?;
            load_data(&mut tree, reader)?;
            if print {
                print_tree(&mut tree, out)?;
            }
            tree.close()?;
        }
        "free" => {
            let mut tree = AvlTree::open(path)?;
            print_free(&mut tree, out)?;
            tree.close()?;
        }
        "verify" => {
            let mut tree = AvlTree::open(path)?;
            let stats = tree.verify()?;
            writeln!(
                out,
                "nodes: {}, height: {}, free slots: {}",
                stats.nodes, stats.height, stats.free_slots
            )?;
            tree.close()?;
        }
        other => {
            return Err(DbError::ParseError(format!("unknown command '{}'\n{}", other, USAGE)));
        }
    }

    writeln!(out, "Finished")?;
    Ok(())
}
