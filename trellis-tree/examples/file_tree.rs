//! Mirror a directory as a tree of rows and print what a list view would
//! show after a few open/close operations.
//!
//! ```text
//! RUST_LOG=trace cargo run -p trellis-tree --example file_tree -- ./src
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use env_logger::{Builder, Env};
use trellis_tree::{ChangeLog, DataExtractor, TreeAdapter};

const MAX_DEPTH: usize = 3;

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    path: PathBuf,
    depth: usize,
}

struct Directory;

impl DataExtractor<Entry> for Directory {
    type Key = PathBuf;

    fn identity_key(&self, item: &Entry) -> Self::Key {
        item.path.clone()
    }

    fn children(&self, item: &Entry) -> Vec<Entry> {
        if item.depth >= MAX_DEPTH || !item.path.is_dir() {
            return Vec::new();
        }
        let Ok(read) = fs::read_dir(&item.path) else {
            log::warn!("skipping unreadable {}", item.path.display());
            return Vec::new();
        };
        let mut paths: Vec<_> =
            read.filter_map(|entry| entry.ok().map(|e| e.path())).collect();
        paths.sort();
        paths
            .into_iter()
            .map(|path| Entry {
                path,
                depth: item.depth + 1,
            })
            .collect()
    }
}

type FileTree = TreeAdapter<Entry, Directory, String>;

fn label(entry: &Entry) -> String {
    let name = entry
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.path.display().to_string());
    let marker = if entry.path.is_dir() { "/" } else { "" };
    format!("{}{name}{marker}", "  ".repeat(entry.depth))
}

fn print_rows(title: &str, tree: &mut FileTree) {
    println!("-- {title} ({} rows)", tree.item_count());
    for row in 0..tree.item_count() {
        if let Some(label) = tree.view_model_at(row) {
            println!("{label}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", root.display()))?;

    let log = ChangeLog::new();
    let mut tree =
        FileTree::with_factory(Directory, label).with_observer(log.clone());
    let top = Entry {
        path: root,
        depth: 0,
    };
    tree.set_items(vec![top.clone()])?;

    let _ = tree.open(&top, true);
    print_rows("root opened", &mut tree);

    // Reveal the deepest node built below the root.
    let deepest = tree
        .pre_order()
        .max_by_key(|id| tree.node(*id).map_or(0, |node| node.depth()));
    if let (Some(root_id), Some(target)) =
        (tree.top_level_nodes().first().copied(), deepest)
    {
        if root_id != target {
            let all_open = tree.open_to_child(root_id, target, true)?;
            log::info!("path to deepest entry fully open: {all_open}");
            print_rows("deepest entry revealed", &mut tree);
        }
    }

    let _ = tree.close(&top, true);
    print_rows("root closed", &mut tree);

    for change in log.take() {
        log::info!("{change:?}");
    }
    Ok(())
}
