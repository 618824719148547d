//! Directory tree rendering.

use crate::domain::StructureSummary;
use std::collections::BTreeMap;

#[derive(Default)]
struct DirNode<'a> {
    dirs: BTreeMap<&'a str, DirNode<'a>>,
    files: Vec<&'a str>,
    total_files: usize,
}

fn build(summary: &StructureSummary) -> DirNode<'_> {
    let mut root = DirNode::default();
    for file in &summary.files {
        root.total_files += 1;
        let mut node = &mut root;
        let mut parts = file.path.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                node.files.push(part);
            } else {
                node = node.dirs.entry(part).or_default();
                node.total_files += 1;
            }
        }
    }
    root
}

/// Render the summary as an indented tree, directories before files.
///
/// With `max_depth`, directories at that depth are collapsed into a single
/// line carrying their file count. Top-level entries are depth 1.
pub fn render_tree(summary: &StructureSummary, max_depth: Option<usize>) -> String {
    let root = build(summary);
    let mut lines = vec![format!("{}/", summary.root_name)];
    walk(&root, "", 1, max_depth, &mut lines);
    lines.join("\n")
}

fn walk(
    node: &DirNode<'_>,
    prefix: &str,
    depth: usize,
    max_depth: Option<usize>,
    lines: &mut Vec<String>,
) {
    let mut files = node.files.clone();
    files.sort_unstable();

    let total = node.dirs.len() + files.len();
    let mut idx = 0;
    for (name, child) in &node.dirs {
        idx += 1;
        let is_last = idx == total;
        let connector = if is_last { "└── " } else { "├── " };

        if max_depth.is_some_and(|limit| depth >= limit) {
            lines.push(format!("{prefix}{connector}{name}/ ({})", file_count(child.total_files)));
        } else {
            lines.push(format!("{prefix}{connector}{name}/"));
            let extension = if is_last { "    " } else { "│   " };
            walk(child, &format!("{prefix}{extension}"), depth + 1, max_depth, lines);
        }
    }
    for name in files {
        idx += 1;
        let connector = if idx == total { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{name}"));
    }
}

fn file_count(n: usize) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{n} files")
    }
}

/// Render the tree so it fits in `budget` characters.
///
/// Depth is reduced one level at a time until the text fits; if even the
/// top level is too long, trailing lines are replaced by a
/// `... N more entries` marker. The result depends only on the summary and
/// the budget.
pub fn render_tree_within(summary: &StructureSummary, budget: usize) -> String {
    let full = render_tree(summary, None);
    if char_len(&full) <= budget {
        return full;
    }

    let deepest_dir = summary.files.iter().map(|f| f.path.matches('/').count()).max().unwrap_or(0);
    for depth in (1..=deepest_dir).rev() {
        let tree = render_tree(summary, Some(depth));
        if char_len(&tree) <= budget {
            return tree;
        }
    }

    cut_lines(&render_tree(summary, Some(1)), budget)
}

fn cut_lines(text: &str, budget: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::new();
    let mut used = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let remaining_after = lines.len() - idx - 1;
        let marker_len =
            if remaining_after > 0 { char_len(&more_marker(remaining_after)) + 1 } else { 0 };
        let cost = char_len(line) + usize::from(!kept.is_empty());
        if !kept.is_empty() && used + cost + marker_len > budget {
            break;
        }
        kept.push(line);
        used += cost;
    }

    let omitted = lines.len() - kept.len();
    let mut out = kept.join("\n");
    if omitted > 0 {
        out.push('\n');
        out.push_str(&more_marker(omitted));
    }
    out
}

fn more_marker(n: usize) -> String {
    format!("... {n} more entries")
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
