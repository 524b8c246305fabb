// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_list_markdown(items: usize, depth: usize) -> String {
    let mut content = String::from("# Outline\n\n");
    for i in 0..items {
        for level in 0..depth {
            let indent = "  ".repeat(level);
            content.push_str(&format!("{indent}- item {i} level {level} with **some** text\n"));
        }
    }
    content
}

#[allow(dead_code)]
pub fn generate_mixed_markdown(sections: usize) -> String {
    let base = "## Section\n\nParagraph with *some* content.\n\n1. First\n2. Second\n   - Nested\n\n> quoted text\n\n```rust\nfn example() {}\n```\n\n";
    base.repeat(sections)
}
