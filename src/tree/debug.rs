use std::fmt::{Debug, Formatter, Result};

use colored::Colorize;

use super::{Link, Tree};

/// The key range of each ancestor edge above the node being drawn.
type Edges = Vec<(Vec<u8>, Vec<u8>)>;

impl Debug for Tree {
    /// Draws the tree sideways, left subtree on top. Keys of pruned nodes are
    /// drawn in blue.
    fn fmt(&self, f: &mut Formatter) -> Result {
        let mut edges = vec![];
        draw_tree(f, self, &mut edges, false)?;
        writeln!(f)
    }
}

fn draw_tree(f: &mut Formatter, tree: &Tree, edges: &mut Edges, left: bool) -> Result {
    if let Some(link) = tree.link(true) {
        edges.push((link.key().to_vec(), tree.key().to_vec()));
        draw_link(f, link, edges, true)?;
        edges.pop();
    }

    draw_line(f, tree.key(), edges, left)?;
    writeln!(f, "{}", hex::encode(tree.key()).on_bright_black())?;

    if let Some(link) = tree.link(false) {
        edges.push((tree.key().to_vec(), link.key().to_vec()));
        draw_link(f, link, edges, false)?;
        edges.pop();
    }

    Ok(())
}

fn draw_link(f: &mut Formatter, link: &Link, edges: &mut Edges, left: bool) -> Result {
    match link.tree() {
        Some(tree) => draw_tree(f, tree, edges, left),
        None => {
            draw_line(f, link.key(), edges, left)?;
            writeln!(f, "{}", hex::encode(link.key()).blue())
        }
    }
}

/// Writes the ancestors' vertical lines and the branch leading to `key`.
fn draw_line(f: &mut Formatter, key: &[u8], edges: &Edges, left: bool) -> Result {
    let depth = edges.len();
    if depth == 0 {
        return Ok(());
    }

    for (low, high) in edges.iter().take(depth - 1) {
        let between = key > low.as_slice() && key < high.as_slice();
        write!(f, "{}", if between { " │  " } else { "    " }.dimmed())?;
    }

    write!(f, "{}", if left { " ┌-" } else { " └-" }.dimmed())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn draws_every_key() {
        colored::control::set_override(false);

        let tree = Tree::new(vec![0x05], vec![])
            .attach(true, Some(Tree::new(vec![0x03], vec![])))
            .expect("attach failed")
            .attach(
                false,
                Some(Tree::from_fields(vec![0x07], vec![], [0; 32], None, None)),
            )
            .expect("attach failed");

        let drawn = format!("{:?}", tree);
        let lines: Vec<_> = drawn.trim_end().lines().collect();
        assert_eq!(lines, vec![" ┌-03", "05", " └-07"]);
    }
}
