/// Glyph set used to draw row prefixes.
#[derive(Clone, Copy)]
pub struct TreeGlyphs<'a> {
    /// One nesting level of indentation.
    pub indent: &'a str,
    pub expanded: &'a str,
    pub collapsed: &'a str,
    pub leaf: &'a str,
    /// Expander shown while a lazy load is in flight.
    pub loading: &'a str,
    /// Marker on a row taking the drop as its first child.
    pub drop_inside: &'a str,
    /// Marker on a row taking the drop after its subtree.
    pub drop_after: &'a str,
}

impl TreeGlyphs<'static> {
    pub const fn unicode() -> Self {
        Self {
            indent: "  ",
            expanded: "▼",
            collapsed: "▶",
            leaf: "•",
            loading: "◌",
            drop_inside: " ◂▸",
            drop_after: " ◂▾",
        }
    }

    pub const fn ascii() -> Self {
        Self {
            indent: "  ",
            expanded: "v",
            collapsed: ">",
            leaf: "*",
            loading: "o",
            drop_inside: " <+",
            drop_after: " <v",
        }
    }
}

impl Default for TreeGlyphs<'static> {
    fn default() -> Self {
        Self::unicode()
    }
}
