use textwrap::{wrap, Options as WrapOptions, WordSeparator, WordSplitter};

/// Wraps logical lines to a fixed column count without splitting words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrapper {
    width: usize,
}

impl Wrapper {
    /// A width of `0` turns wrapping off.
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Yields wrapped lines lazily, one logical line at a time.
    ///
    /// `indent` prefixes every produced line, continuations included. An
    /// over-long word is left whole on its own line.
    pub fn wrap<'a>(&self, text: &'a str, indent: &'a str) -> impl Iterator<Item = String> + 'a {
        let width = self.width;
        text.lines().flat_map(move |line| wrap_line(line, indent, width))
    }
}

fn wrap_line(line: &str, indent: &str, width: usize) -> Vec<String> {
    let line = line.trim_end();
    if line.is_empty() {
        return vec![indent.trim_end().to_string()];
    }
    if width == 0 {
        return vec![format!("{indent}{line}")];
    }

    let wrap_width = width.max(indent.chars().count() + 1);
    let options = WrapOptions::new(wrap_width)
        .break_words(false)
        .word_separator(WordSeparator::AsciiSpace)
        .word_splitter(WordSplitter::NoHyphenation)
        .initial_indent(indent)
        .subsequent_indent(indent);
    wrap(line, options)
        .into_iter()
        .map(|cow| cow.into_owned())
        .collect()
}
