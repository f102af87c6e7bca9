use colored::*;
use kbchat_core::types::{Role, Turn};
use pulldown_cmark::{CodeBlockKind, Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};

/// Title shown once at the start of a session
pub fn print_banner() {
    println!("{}", "💬 Knowledge Base Self-Service".cyan().bold());
    println!("Ask anything about the company's processes. Answers come from the FAQ knowledge base.");
    println!();
}

/// Print one transcript turn with its speaker label
pub fn print_turn(turn: &Turn) {
    match turn.role() {
        Role::User => println!("{}: {}", "You".green().bold(), turn.content()),
        Role::Assistant => {
            let rendered = render_markdown(turn.content());
            println!("{}: {}", "Assistant".blue().bold(), rendered.trim_end());
        }
    }
}

/// Print a sequence of turns separated by blank lines
pub fn print_transcript(turns: &[Turn]) {
    for turn in turns {
        print_turn(turn);
        println!();
    }
}

/// Show usage instructions when no prompt or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "kbchat \"your question\"".green().bold());
    println!("    Ask a single question");
    println!();
    println!("  {}", "kbchat -i".green().bold());
    println!("    Start an interactive chat session");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --config <PATH>           Config file (default ~/.config/kbchat/config.toml)");
    println!("  --knowledge-base-id <ID>  Knowledge base to query");
    println!("  --save-transcript <PATH>  Write the conversation as JSON on exit");
    println!("  --show-config             Print the resolved configuration");
    println!("  --help                    Show this help message");
    println!();
}

/// Commands understood by the interactive loop
pub fn print_interactive_help() {
    println!(
        "Type your question and press Enter. {} starts over, {} leaves.",
        "/reset".cyan(),
        "/exit".cyan()
    );
    println!();
}

/// Render markdown for the terminal, highlighting fenced code blocks
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_TABLES);

    let mut renderer = TerminalRenderer::default();
    for event in MdParser::new_ext(markdown, options) {
        renderer.handle(event);
    }
    renderer.output
}

#[derive(Default)]
struct TerminalRenderer {
    output: String,
    strong: bool,
    emphasis: bool,
    /// One entry per open list; `Some(n)` is the next number of an ordered list
    lists: Vec<Option<u64>>,
    code_block: Option<(String, String)>,
    /// Rows collected until the table ends; cells hold plain text
    table: Option<Vec<Vec<String>>>,
}

impl TerminalRenderer {
    fn handle(&mut self, event: MdEvent<'_>) {
        match event {
            MdEvent::Start(Tag::Table(_)) => {
                self.block_break();
                self.table = Some(Vec::new());
            }
            MdEvent::End(Tag::Table(_)) => {
                if let Some(rows) = self.table.take() {
                    self.output.push_str(&render_table(&rows));
                }
            }
            MdEvent::Start(Tag::TableHead) | MdEvent::Start(Tag::TableRow) => {
                if let Some(rows) = self.table.as_mut() {
                    rows.push(Vec::new());
                }
            }
            MdEvent::Start(Tag::TableCell) => {
                if let Some(row) = self.table.as_mut().and_then(|rows| rows.last_mut()) {
                    row.push(String::new());
                }
            }
            MdEvent::Text(text) | MdEvent::Code(text) if self.table.is_some() => {
                if let Some(cell) = self
                    .table
                    .as_mut()
                    .and_then(|rows| rows.last_mut())
                    .and_then(|row| row.last_mut())
                {
                    cell.push_str(&text);
                }
            }
            MdEvent::Start(Tag::Heading(level, ..)) => {
                self.block_break();
                let marker = match level {
                    HeadingLevel::H1 => "#",
                    HeadingLevel::H2 => "##",
                    _ => "",
                };
                if !marker.is_empty() {
                    self.output.push_str(&format!("{} ", marker.bright_cyan().bold()));
                }
                self.strong = true;
            }
            MdEvent::End(Tag::Heading(..)) => {
                self.strong = false;
                self.output.push('\n');
            }
            MdEvent::Start(Tag::Paragraph) => {
                if self.lists.is_empty() {
                    self.block_break();
                }
            }
            MdEvent::End(Tag::Paragraph) => {
                if self.lists.is_empty() {
                    self.output.push('\n');
                }
            }
            MdEvent::Start(Tag::List(start)) => {
                if self.lists.is_empty() {
                    self.block_break();
                }
                self.lists.push(start);
            }
            MdEvent::End(Tag::List(_)) => {
                self.lists.pop();
            }
            MdEvent::Start(Tag::Item) => {
                let depth = self.lists.len().saturating_sub(1);
                self.output.push_str(&"  ".repeat(depth));
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let label = format!("{}.", n);
                        *n += 1;
                        label.yellow()
                    }
                    _ => "•".yellow(),
                };
                self.output.push_str(&format!("{} ", bullet));
            }
            MdEvent::End(Tag::Item) => {
                if !self.output.ends_with('\n') {
                    self.output.push('\n');
                }
            }
            MdEvent::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.block_break();
                self.code_block = Some((lang, String::new()));
            }
            MdEvent::End(Tag::CodeBlock(_)) => {
                if let Some((lang, code)) = self.code_block.take() {
                    self.output.push_str(&highlight_code(&lang, &code));
                }
            }
            MdEvent::Start(Tag::Strong) => self.strong = true,
            MdEvent::End(Tag::Strong) => self.strong = false,
            MdEvent::Start(Tag::Emphasis) => self.emphasis = true,
            MdEvent::End(Tag::Emphasis) => self.emphasis = false,
            MdEvent::Code(code) => {
                self.output
                    .push_str(&format!("`{}`", code.on_bright_black().white()));
            }
            MdEvent::Text(text) => {
                if let Some((_, code)) = self.code_block.as_mut() {
                    code.push_str(&text);
                } else {
                    let styled = match (self.strong, self.emphasis) {
                        (true, true) => text.bold().italic().to_string(),
                        (true, false) => text.bold().to_string(),
                        (false, true) => text.italic().to_string(),
                        (false, false) => text.to_string(),
                    };
                    self.output.push_str(&styled);
                }
            }
            MdEvent::TaskListMarker(done) => {
                self.output.push_str(if done { "[x] " } else { "[ ] " });
            }
            MdEvent::SoftBreak => self.output.push(' '),
            MdEvent::HardBreak => self.output.push('\n'),
            MdEvent::Rule => {
                self.block_break();
                self.output.push_str(&"─".repeat(40).dimmed().to_string());
                self.output.push('\n');
            }
            MdEvent::Html(html) => self.output.push_str(&html),
            _ => {}
        }
    }

    /// Separates a new block from the previous one by a blank line
    fn block_break(&mut self) {
        if self.output.is_empty() || self.output.ends_with("\n\n") {
            return;
        }
        if self.output.ends_with('\n') {
            self.output.push('\n');
        } else {
            self.output.push_str("\n\n");
        }
    }
}

/// Lays out rows in padded columns; the first row is the header
fn render_table(rows: &[Vec<String>]) -> String {
    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; col_count];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(j, cell)| {
                let padded = format!("{:<width$}", cell, width = widths[j]);
                if i == 0 {
                    padded.bold().to_string()
                } else {
                    padded
                }
            })
            .collect();
        out.push_str(cells.join(" ").trim_end());
        out.push('\n');

        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            out.push_str(&rule.join(" ").dimmed().to_string());
            out.push('\n');
        }
    }
    out
}

fn highlight_code(lang: &str, code: &str) -> String {
    let syntax_set = SyntaxSet::load_defaults_newlines();
    let theme_set = ThemeSet::load_defaults();
    let Some(theme) = theme_set
        .themes
        .get("base16-ocean.dark")
        .or_else(|| theme_set.themes.values().next())
    else {
        return code.to_string();
    };

    let syntax = syntax_set
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| syntax_set.find_syntax_plain_text());
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut out = String::new();
    if !lang.is_empty() {
        out.push_str(&format!("{}:\n", lang.cyan()));
    }
    out.push_str(&"─".repeat(40).dimmed().to_string());
    out.push('\n');
    for line in LinesWithEndings::from(code) {
        match highlighter.highlight_line(line, &syntax_set) {
            Ok(ranges) => out.push_str(&as_24_bit_terminal_escaped(&ranges, false)),
            Err(_) => out.push_str(line),
        }
    }
    out.push_str("\x1b[0m");
    out.push_str(&"─".repeat(40).dimmed().to_string());
    out.push('\n');
    out
}
