/// Emitted target source as a rose tree: leaves are lines, subchunks render
/// one indent level deeper. Emitters build the tree; nothing is concatenated
/// until `assemble`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chunk {
    items: Vec<ChunkItem>,
}

#[derive(Clone, Debug, PartialEq)]
enum ChunkItem {
    Line(String),
    Sub(Chunk),
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.items.push(ChunkItem::Line(text.into()));
    }

    pub fn push_sub(&mut self, sub: Chunk) {
        self.items.push(ChunkItem::Sub(sub));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn assemble(&self, indent: &str) -> String {
        let mut lines = Vec::new();
        self.render(indent, 0, &mut lines);
        lines.join("\n")
    }

    fn render(&self, indent: &str, depth: usize, lines: &mut Vec<String>) {
        for item in &self.items {
            match item {
                ChunkItem::Line(text) => lines.push(format!("{}{}", indent.repeat(depth), text)),
                ChunkItem::Sub(sub) => sub.render(indent, depth + 1, lines),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_chunks_indent_one_level_per_depth() {
        let mut body = Chunk::new();
        body.line("x = 1");
        let mut inner = Chunk::new();
        inner.line("break");
        body.push_sub(inner);
        let mut top = Chunk::new();
        top.line("while true do");
        top.push_sub(body);
        top.line("end");
        assert_eq!(
            top.assemble("  "),
            "while true do\n  x = 1\n    break\nend"
        );
    }

    #[test]
    fn assembly_is_a_function_of_tree_and_indent() {
        let mut chunk = Chunk::new();
        chunk.line("return 1");
        assert_eq!(chunk.assemble("\t"), "return 1");
        let mut sub = Chunk::new();
        sub.line("return 1");
        let mut outer = Chunk::new();
        outer.line("do");
        outer.push_sub(sub);
        outer.line("end");
        assert_eq!(outer.assemble("\t"), "do\n\treturn 1\nend");
        assert_eq!(outer.assemble("\t"), outer.assemble("\t"));
    }
}
