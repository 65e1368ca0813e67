//! HTML to Word document conversion.
//!
//! The markup is streamed through `lol_html` once to collect a flat list of paragraphs with
//! inline formatting, which is then packaged with `docx-rs`. Layout fidelity is best effort:
//! headings, paragraphs, lists, quotes, preformatted blocks, table cells and basic inline marks
//! survive; CSS does not.

use std::{cell::RefCell, io::Cursor, rc::Rc};

use docx_rs::{BreakType, Docx, Paragraph, Run, RunFonts, Style, StyleType};
use lol_html::{RewriteStrSettings, doc_text, element, html_content::Element, rewrite_str};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("failed to read HTML: {message}")]
    Parse { message: String },
    #[error("failed to package document: {message}")]
    Package { message: String },
}

const SKIPPED_TAGS: &str = "script, style, template, noscript, title";
const BLOCK_TAGS: &str = "p, div, section, article, header, footer, main, nav, aside, figure, \
                          figcaption, address, details, summary, table, tr, dl, dt, dd";
const HEADING_TAGS: &str = "h1, h2, h3, h4, h5, h6";
const MARK_TAGS: &str = "strong, b, em, i, u, ins, s, del, strike, code, kbd, samp";
const CELL_TAGS: &str = "td, th";

const MONOSPACE_FONT: &str = "Courier New";
/// Left indent per list or quote level, in twentieths of a point.
const INDENT_STEP: i32 = 360;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inline {
    Text { text: String, marks: Marks },
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockStyle {
    Normal,
    Heading(u8),
    Quote,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Block {
    pub style: BlockStyle,
    pub indent: usize,
    pub inlines: Vec<Inline>,
}

impl Block {
    #[cfg(test)]
    fn text(&self) -> String {
        self.inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text { text, .. } => text.as_str(),
                Inline::Break => "\n",
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MarkDepths {
    bold: u32,
    italic: u32,
    underline: u32,
    strike: u32,
    code: u32,
}

impl MarkDepths {
    fn current(&self) -> Marks {
        Marks {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
            strike: self.strike > 0,
            code: self.code > 0,
        }
    }

    fn counter(&mut self, tag: &str) -> Option<&mut u32> {
        match tag {
            "strong" | "b" => Some(&mut self.bold),
            "em" | "i" => Some(&mut self.italic),
            "u" | "ins" => Some(&mut self.underline),
            "s" | "del" | "strike" => Some(&mut self.strike),
            "code" | "kbd" | "samp" => Some(&mut self.code),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct ListFrame {
    ordered: bool,
    next: u32,
}

#[derive(Debug, Default)]
struct Collector {
    blocks: Vec<Block>,
    inlines: Vec<Inline>,
    pending_text: String,
    prefix: Option<String>,
    heading: Option<u8>,
    quote_depth: usize,
    pre_depth: usize,
    skip_depth: usize,
    marks: MarkDepths,
    lists: Vec<ListFrame>,
    /// Cells seen so far in each open table row, innermost last.
    row_cells: Vec<usize>,
}

impl Collector {
    fn current_style(&self) -> BlockStyle {
        if let Some(level) = self.heading {
            BlockStyle::Heading(level)
        } else if self.pre_depth > 0 {
            BlockStyle::Code
        } else if self.quote_depth > 0 {
            BlockStyle::Quote
        } else {
            BlockStyle::Normal
        }
    }

    fn has_content(&self) -> bool {
        self.inlines.iter().any(|inline| match inline {
            Inline::Text { text, .. } => !text.trim().is_empty(),
            Inline::Break => false,
        })
    }

    fn flush(&mut self) {
        if !self.has_content() {
            self.inlines.clear();
            return;
        }

        let mut inlines = std::mem::take(&mut self.inlines);
        while matches!(inlines.last(), Some(Inline::Break)) {
            inlines.pop();
        }
        if self.pre_depth == 0
            && let Some(Inline::Text { text, .. }) = inlines.last_mut()
        {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
        }

        self.blocks.push(Block {
            style: self.current_style(),
            indent: self.lists.len() + self.quote_depth,
            inlines,
        });
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let marks = self.marks.current();

        if let Some(prefix) = self.prefix.take() {
            self.inlines.push(Inline::Text {
                text: prefix,
                marks: Marks::default(),
            });
        }

        if let Some(Inline::Text {
            text: last,
            marks: last_marks,
        }) = self.inlines.last_mut()
            && *last_marks == marks
        {
            last.push_str(text);
            return;
        }
        self.inlines.push(Inline::Text {
            text: text.to_string(),
            marks,
        });
    }

    fn ends_with_space(&self) -> bool {
        match self.inlines.last() {
            Some(Inline::Text { text, .. }) => text.ends_with(' ') || text.ends_with('\t'),
            Some(Inline::Break) | None => true,
        }
    }

    fn take_text(&mut self) {
        let raw = std::mem::take(&mut self.pending_text);
        if self.skip_depth > 0 || raw.is_empty() {
            return;
        }
        let decoded = html_escape::decode_html_entities(&raw);

        if self.pre_depth > 0 {
            let mut lines = decoded.split('\n').peekable();
            while let Some(line) = lines.next() {
                self.push_text(line);
                if lines.peek().is_some() {
                    self.inlines.push(Inline::Break);
                }
            }
            return;
        }

        let mut collapsed = String::with_capacity(decoded.len());
        let mut in_space = self.ends_with_space();
        for ch in decoded.chars() {
            if ch.is_whitespace() {
                if !in_space {
                    collapsed.push(' ');
                    in_space = true;
                }
            } else {
                collapsed.push(ch);
                in_space = false;
            }
        }
        self.push_text(&collapsed);
    }

    fn start_cell(&mut self) {
        let Some(seen) = self.row_cells.last_mut() else {
            if self.has_content() {
                self.push_cell_separator();
            }
            return;
        };
        let first = *seen == 0;
        *seen += 1;
        if !first {
            self.push_cell_separator();
        }
    }

    fn push_cell_separator(&mut self) {
        if let Some(Inline::Text { text, .. }) = self.inlines.last_mut() {
            let trimmed = text.trim_end_matches(' ').len();
            text.truncate(trimmed);
        }
        self.push_text("\t");
    }

    fn start_list_item(&mut self) {
        self.flush();
        let prefix = match self.lists.last_mut() {
            Some(ListFrame {
                ordered: true,
                next,
            }) => {
                let label = format!("{next}. ");
                *next = next.saturating_add(1);
                label
            }
            Some(ListFrame { ordered: false, .. }) | None => "\u{2022} ".to_string(),
        };
        self.prefix = Some(prefix);
    }

    fn finish(mut self) -> Vec<Block> {
        self.take_text();
        self.flush();
        self.blocks
    }
}

type Shared = Rc<RefCell<Collector>>;

fn on_end_tag(el: &mut Element<'_, '_>, state: &Shared, action: impl FnOnce(&mut Collector) + 'static) {
    if let Some(handlers) = el.end_tag_handlers() {
        let state = Rc::clone(state);
        handlers.push(Box::new(move |_end| {
            action(&mut state.borrow_mut());
            Ok(())
        }));
    }
}

/// Walk the HTML and collect the paragraphs that end up in the document.
pub(crate) fn collect_blocks(html: &str) -> Result<Vec<Block>, DocxError> {
    let state: Shared = Rc::new(RefCell::new(Collector::default()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(SKIPPED_TAGS, {
                    let state = Rc::clone(&state);
                    move |el| {
                        state.borrow_mut().skip_depth += 1;
                        on_end_tag(el, &state, |c| c.skip_depth = c.skip_depth.saturating_sub(1));
                        Ok(())
                    }
                }),
                element!(BLOCK_TAGS, {
                    let state = Rc::clone(&state);
                    move |el| {
                        state.borrow_mut().flush();
                        on_end_tag(el, &state, Collector::flush);
                        Ok(())
                    }
                }),
                element!(HEADING_TAGS, {
                    let state = Rc::clone(&state);
                    move |el| {
                        let level = el
                            .tag_name()
                            .trim_start_matches('h')
                            .parse::<u8>()
                            .unwrap_or(1);
                        {
                            let mut collector = state.borrow_mut();
                            collector.flush();
                            collector.heading = Some(level);
                        }
                        on_end_tag(el, &state, |c| {
                            c.flush();
                            c.heading = None;
                        });
                        Ok(())
                    }
                }),
                element!("blockquote", {
                    let state = Rc::clone(&state);
                    move |el| {
                        {
                            let mut collector = state.borrow_mut();
                            collector.flush();
                            collector.quote_depth += 1;
                        }
                        on_end_tag(el, &state, |c| {
                            c.flush();
                            c.quote_depth = c.quote_depth.saturating_sub(1);
                        });
                        Ok(())
                    }
                }),
                element!("pre", {
                    let state = Rc::clone(&state);
                    move |el| {
                        {
                            let mut collector = state.borrow_mut();
                            collector.flush();
                            collector.pre_depth += 1;
                        }
                        on_end_tag(el, &state, |c| {
                            c.flush();
                            c.pre_depth = c.pre_depth.saturating_sub(1);
                        });
                        Ok(())
                    }
                }),
                element!("ul, ol", {
                    let state = Rc::clone(&state);
                    move |el| {
                        let ordered = el.tag_name() == "ol";
                        let start = el
                            .get_attribute("start")
                            .and_then(|value| value.trim().parse::<u32>().ok())
                            .unwrap_or(1);
                        {
                            let mut collector = state.borrow_mut();
                            collector.flush();
                            collector.lists.push(ListFrame {
                                ordered,
                                next: start,
                            });
                        }
                        on_end_tag(el, &state, |c| {
                            c.flush();
                            c.lists.pop();
                            c.prefix = None;
                        });
                        Ok(())
                    }
                }),
                element!("li", {
                    let state = Rc::clone(&state);
                    move |el| {
                        state.borrow_mut().start_list_item();
                        on_end_tag(el, &state, Collector::flush);
                        Ok(())
                    }
                }),
                element!(MARK_TAGS, {
                    let state = Rc::clone(&state);
                    move |el| {
                        let tag = el.tag_name();
                        if let Some(depth) = state.borrow_mut().marks.counter(&tag) {
                            *depth += 1;
                        }
                        on_end_tag(el, &state, move |c| {
                            if let Some(depth) = c.marks.counter(&tag) {
                                *depth = depth.saturating_sub(1);
                            }
                        });
                        Ok(())
                    }
                }),
                element!("tr", {
                    let state = Rc::clone(&state);
                    move |el| {
                        state.borrow_mut().row_cells.push(0);
                        on_end_tag(el, &state, |c| {
                            c.row_cells.pop();
                        });
                        Ok(())
                    }
                }),
                element!(CELL_TAGS, {
                    let state = Rc::clone(&state);
                    move |_el| {
                        state.borrow_mut().start_cell();
                        Ok(())
                    }
                }),
                element!("br", {
                    let state = Rc::clone(&state);
                    move |_el| {
                        state.borrow_mut().inlines.push(Inline::Break);
                        Ok(())
                    }
                }),
                element!("hr", {
                    let state = Rc::clone(&state);
                    move |_el| {
                        state.borrow_mut().flush();
                        Ok(())
                    }
                }),
                element!("img", {
                    let state = Rc::clone(&state);
                    move |el| {
                        if let Some(alt) = el.get_attribute("alt") {
                            let alt = alt.trim();
                            if !alt.is_empty() {
                                state.borrow_mut().push_text(alt);
                            }
                        }
                        Ok(())
                    }
                }),
            ],
            document_content_handlers: vec![doc_text!({
                let state = Rc::clone(&state);
                move |chunk| {
                    let mut collector = state.borrow_mut();
                    collector.pending_text.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        collector.take_text();
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| DocxError::Parse {
        message: err.to_string(),
    })?;

    let collector = Rc::try_unwrap(state)
        .map(RefCell::into_inner)
        .unwrap_or_else(|rc| rc.replace(Collector::default()));
    Ok(collector.finish())
}

/// Convert an HTML document or fragment into the bytes of a `.docx` file.
pub fn html_to_docx(html: &str) -> Result<Vec<u8>, DocxError> {
    let blocks = collect_blocks(html)?;

    let mut docx = with_styles(Docx::new());
    for block in &blocks {
        docx = docx.add_paragraph(paragraph(block));
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|err| DocxError::Package {
            message: err.to_string(),
        })?;
    Ok(buffer.into_inner())
}

fn with_styles(mut docx: Docx) -> Docx {
    // Sizes are in half-points.
    const HEADING_SIZES: [usize; 6] = [40, 32, 28, 26, 24, 22];
    for (index, size) in HEADING_SIZES.iter().enumerate() {
        let level = index + 1;
        docx = docx.add_style(
            Style::new(format!("Heading{level}"), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .size(*size)
                .bold(),
        );
    }
    docx.add_style(
        Style::new("Quote", StyleType::Paragraph)
            .name("Quote")
            .italic(),
    )
    .add_style(Style::new("SourceCode", StyleType::Paragraph).name("Source Code"))
}

fn paragraph(block: &Block) -> Paragraph {
    let mut paragraph = Paragraph::new();
    match block.style {
        BlockStyle::Heading(level) => paragraph = paragraph.style(&format!("Heading{level}")),
        BlockStyle::Quote => paragraph = paragraph.style("Quote"),
        BlockStyle::Code => paragraph = paragraph.style("SourceCode"),
        BlockStyle::Normal => {}
    }
    if block.indent > 0 {
        let indent = i32::try_from(block.indent).unwrap_or(i32::MAX / INDENT_STEP) * INDENT_STEP;
        paragraph = paragraph.indent(Some(indent), None, None, None);
    }

    let monospace = block.style == BlockStyle::Code;
    for inline in &block.inlines {
        let run = match inline {
            Inline::Text { text, marks } => styled_run(text, *marks, monospace),
            Inline::Break => Run::new().add_break(BreakType::TextWrapping),
        };
        paragraph = paragraph.add_run(run);
    }
    paragraph
}

fn styled_run(text: &str, marks: Marks, monospace: bool) -> Run {
    let mut run = Run::new().add_text(text);
    if marks.bold {
        run = run.bold();
    }
    if marks.italic {
        run = run.italic();
    }
    if marks.underline {
        run = run.underline("single");
    }
    if marks.strike {
        run = run.strike();
    }
    if marks.code || monospace {
        run = run.fonts(
            RunFonts::new()
                .ascii(MONOSPACE_FONT)
                .hi_ansi(MONOSPACE_FONT)
                .cs(MONOSPACE_FONT),
        );
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(blocks: &[Block]) -> Vec<String> {
        blocks.iter().map(Block::text).collect()
    }

    #[test]
    fn produces_a_zip_container() {
        let bytes = html_to_docx("<h1>Hello</h1><p>World</p>").expect("docx builds");
        assert!(bytes.starts_with(b"PK"), "docx must be a zip archive");
        assert!(bytes.len() > 100);
    }

    #[test]
    fn empty_markup_still_packages() {
        let bytes = html_to_docx("<div></div>").expect("docx builds");
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn headings_and_paragraphs_become_blocks() {
        let blocks =
            collect_blocks("<h1>Title</h1>\n<p>First   line\n continues</p><h3>Sub</h3>")
                .expect("html parses");

        assert_eq!(texts(&blocks), vec!["Title", "First line continues", "Sub"]);
        assert_eq!(blocks[0].style, BlockStyle::Heading(1));
        assert_eq!(blocks[1].style, BlockStyle::Normal);
        assert_eq!(blocks[2].style, BlockStyle::Heading(3));
    }

    #[test]
    fn lists_get_bullets_and_numbers() {
        let blocks = collect_blocks(
            "<ul><li>apple</li><li>pear</li></ul><ol start=\"3\"><li>three</li><li>four</li></ol>",
        )
        .expect("html parses");

        assert_eq!(
            texts(&blocks),
            vec!["\u{2022} apple", "\u{2022} pear", "3. three", "4. four"]
        );
        assert!(blocks.iter().all(|block| block.indent == 1));
    }

    #[test]
    fn inline_marks_are_tracked() {
        let blocks =
            collect_blocks("<p>plain <strong>bold <em>both</em></strong> <code>x()</code></p>")
                .expect("html parses");

        let runs: Vec<(String, Marks)> = blocks[0]
            .inlines
            .iter()
            .filter_map(|inline| match inline {
                Inline::Text { text, marks } => Some((text.clone(), *marks)),
                Inline::Break => None,
            })
            .collect();

        assert_eq!(runs[0].0, "plain ");
        assert!(runs[1].1.bold && !runs[1].1.italic);
        assert!(runs[2].1.bold && runs[2].1.italic);
        assert!(runs.last().is_some_and(|(text, marks)| text == "x()" && marks.code));
    }

    #[test]
    fn scripts_are_skipped_and_entities_decoded() {
        let blocks = collect_blocks(
            "<style>p { color: red; }</style><p>Fish &amp; chips &lt;3</p><script>alert(1)</script>",
        )
        .expect("html parses");

        assert_eq!(texts(&blocks), vec!["Fish & chips <3"]);
    }

    #[test]
    fn preformatted_text_keeps_line_breaks() {
        let blocks = collect_blocks("<pre><code>fn main() {\n    run();\n}\n</code></pre>")
            .expect("html parses");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].style, BlockStyle::Code);
        assert_eq!(blocks[0].text(), "fn main() {\n    run();\n}");
    }

    #[test]
    fn quotes_and_cells_are_flattened() {
        let blocks = collect_blocks(
            "<blockquote><p>quoted</p></blockquote>\
             <table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>2</td></tr></table>",
        )
        .expect("html parses");

        assert_eq!(texts(&blocks), vec!["quoted", "a\tb", "1\t2"]);
        assert_eq!(blocks[0].style, BlockStyle::Quote);
    }

    #[test]
    fn empty_cells_keep_their_column() {
        let blocks = collect_blocks(
            "<table>\n  <tr>\n    <td></td>\n    <td>x</td>\n  </tr>\n  \
             <tr><td>1</td><td></td><td>3</td></tr>\n</table>",
        )
        .expect("html parses");

        assert_eq!(texts(&blocks), vec!["\tx", "1\t\t3"]);
    }

    #[test]
    fn bare_text_fragments_are_kept() {
        let blocks = collect_blocks("just text").expect("html parses");
        assert_eq!(texts(&blocks), vec!["just text"]);
    }
}
