//! Text rendering of the concept tree

use conceptmap_core::domain::{GraphStore, HiddenCategories, Hierarchy, MasteryStatus, TreeItem};

/// Visual style for tree characters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeStyle {
    /// ASCII characters only (works everywhere)
    Ascii,
    /// Unicode box-drawing characters
    #[default]
    Unicode,
}

impl TreeStyle {
    /// (branch, continuation) pieces for one depth level
    fn glyphs(&self, is_last: bool) -> (&'static str, &'static str) {
        match (self, is_last) {
            (Self::Ascii, true) => ("`-- ", "    "),
            (Self::Ascii, false) => ("+-- ", "|   "),
            (Self::Unicode, true) => ("└── ", "    "),
            (Self::Unicode, false) => ("├── ", "│   "),
        }
    }

    fn folder_marker(&self, open: bool) -> &'static str {
        match (self, open) {
            (Self::Ascii, true) => "-",
            (Self::Ascii, false) => "+",
            (Self::Unicode, true) => "▾",
            (Self::Unicode, false) => "▸",
        }
    }
}

/// Status icons for mastery states
pub struct StatusIcon;

impl StatusIcon {
    pub fn for_status(status: MasteryStatus, style: TreeStyle) -> &'static str {
        match style {
            TreeStyle::Ascii => match status {
                MasteryStatus::Known => "[K]",
                MasteryStatus::Fuzzy => "[F]",
                MasteryStatus::Unknown => "[U]",
                MasteryStatus::New => "[N]",
            },
            TreeStyle::Unicode => match status {
                MasteryStatus::Known => "●",
                MasteryStatus::Fuzzy => "◐",
                MasteryStatus::Unknown => "○",
                MasteryStatus::New => "✦",
            },
        }
    }
}

/// Options for rendering the tree
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub style: TreeStyle,
    /// Ignore folder open state and show everything
    pub expand_all: bool,
    /// Append node ids to leaves
    pub show_ids: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::Unicode,
            expand_all: false,
            show_ids: true,
        }
    }
}

/// Renders a hierarchy, skipping hidden categories and collapsing closed folders
pub struct TreeRenderer<'a> {
    store: &'a GraphStore,
    hidden: &'a HiddenCategories,
    options: RenderOptions,
}

impl<'a> TreeRenderer<'a> {
    pub fn new(store: &'a GraphStore, hidden: &'a HiddenCategories) -> Self {
        Self {
            store,
            hidden,
            options: RenderOptions::default(),
        }
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn render(&self, hierarchy: &Hierarchy) -> String {
        let mut output = String::new();
        for root in hierarchy.roots() {
            self.render_item(root, &mut output, "", true, 0);
        }
        output
    }

    fn render_item(
        &self,
        item: &TreeItem,
        output: &mut String,
        prefix: &str,
        is_last: bool,
        depth: usize,
    ) {
        let (branch, continuation) = self.options.style.glyphs(is_last);
        if depth > 0 {
            output.push_str(prefix);
            output.push_str(branch);
        }

        match item {
            TreeItem::Leaf(leaf) => {
                let status = self
                    .store
                    .node(&leaf.node_id)
                    .map(|n| n.status)
                    .unwrap_or_default();
                output.push_str(StatusIcon::for_status(status, self.options.style));
                output.push(' ');
                output.push_str(&leaf.name);
                if self.options.show_ids {
                    output.push_str(&format!(" [{}]", leaf.node_id));
                }
                output.push('\n');
            }
            TreeItem::Folder(folder) => {
                let open = folder.is_open || self.options.expand_all;
                output.push_str(&format!(
                    "{} {} ({})\n",
                    self.options.style.folder_marker(open),
                    folder.name,
                    self.visible_leaves(item)
                ));
                if !open {
                    return;
                }

                let visible: Vec<_> = folder
                    .children
                    .iter()
                    .filter(|child| self.is_visible(child))
                    .collect();
                let child_prefix = if depth > 0 {
                    format!("{}{}", prefix, continuation)
                } else {
                    String::new()
                };
                let count = visible.len();
                for (i, child) in visible.into_iter().enumerate() {
                    self.render_item(child, output, &child_prefix, i + 1 == count, depth + 1);
                }
            }
        }
    }

    fn is_visible(&self, item: &TreeItem) -> bool {
        match item {
            TreeItem::Folder(folder) => folder
                .category()
                .is_none_or(|category| !self.hidden.contains(category)),
            TreeItem::Leaf(leaf) => self
                .store
                .node(&leaf.node_id)
                .is_none_or(|node| !self.hidden.contains(&node.category)),
        }
    }

    fn visible_leaves(&self, item: &TreeItem) -> usize {
        match item {
            TreeItem::Leaf(_) => 1,
            TreeItem::Folder(folder) => folder
                .children
                .iter()
                .filter(|child| self.is_visible(child))
                .map(|child| self.visible_leaves(child))
                .sum(),
        }
    }
}
