//! Markdown rendering using pulldown-cmark.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::text::{LineBuilder, StyledLine, StyledSpan};

/// Render markdown content to styled lines.
/// Supports: bold, italic, code spans, code blocks, headers, lists,
/// blockquotes, and horizontal rules.
#[allow(clippy::too_many_lines)]
pub fn render_markdown(content: &str, width: usize) -> Vec<StyledLine> {
    let parser = Parser::new_ext(content, Options::empty());
    let mut result = Vec::new();
    let mut current_line = LineBuilder::new();
    let mut in_bold = false;
    let mut in_italic = false;
    let mut in_code_block = false;
    let mut code_block_buffer = String::new();
    let mut list_depth: usize = 0;
    let mut list_prefix: Option<String> = None;
    let mut current_line_is_prefix_only = false;
    let mut ordered_list_counters: Vec<usize> = Vec::new();
    let mut in_blockquote = false;

    for event in parser {
        match event {
            Event::Start(tag) => match tag {
                Tag::Strong => in_bold = true,
                Tag::Emphasis => in_italic = true,
                Tag::CodeBlock(_) => {
                    in_code_block = true;
                    code_block_buffer.clear();
                }
                Tag::Heading { level, .. } => {
                    let line = current_line.build();
                    if !line.is_empty() {
                        result.push(line);
                    }
                    let prefix = match level {
                        HeadingLevel::H1 => "# ",
                        HeadingLevel::H2 => "## ",
                        HeadingLevel::H3 => "### ",
                        _ => "#### ",
                    };
                    current_line = LineBuilder::new().bold(prefix);
                    in_bold = true;
                }
                Tag::List(start_num) => {
                    list_depth += 1;
                    if let Some(n) = start_num {
                        #[allow(clippy::cast_possible_truncation)]
                        ordered_list_counters.push(n as usize);
                    } else {
                        ordered_list_counters.push(0); // 0 = unordered
                    }
                }
                Tag::Item => {
                    if !current_line_is_prefix_only {
                        let line = current_line.build();
                        if !line.is_empty() {
                            result.push(line);
                        }
                    }
                    let indent = "  ".repeat(list_depth.saturating_sub(1));
                    let prefix = if let Some(counter) = ordered_list_counters.last_mut() {
                        if *counter > 0 {
                            let num = *counter;
                            *counter += 1;
                            format!("{indent}{num}. ")
                        } else {
                            format!("{indent}- ")
                        }
                    } else {
                        format!("{indent}- ")
                    };
                    list_prefix = Some(prefix.clone());
                    current_line = LineBuilder::new().raw(prefix);
                    current_line_is_prefix_only = true;
                }
                Tag::BlockQuote(_) => {
                    in_blockquote = true;
                }
                Tag::Paragraph => {
                    if !current_line_is_prefix_only {
                        let line = current_line.build();
                        if !line.is_empty() {
                            result.push(line);
                        }
                    }
                    if let Some(prefix) = list_prefix.as_ref() {
                        current_line = LineBuilder::new().raw(prefix.clone());
                        current_line_is_prefix_only = true;
                    } else {
                        current_line = LineBuilder::new();
                        current_line_is_prefix_only = false;
                    }
                }
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Strong => in_bold = false,
                TagEnd::Emphasis => in_italic = false,
                TagEnd::CodeBlock => {
                    in_code_block = false;
                    for line in code_block_buffer.lines() {
                        result.push(LineBuilder::new().raw("  ").dim(line).build());
                    }
                    result.push(StyledLine::empty());
                }
                TagEnd::Heading { .. } => {
                    in_bold = false;
                    let line = current_line.build();
                    result.push(line);
                    current_line = LineBuilder::new();
                    if list_depth == 0 {
                        result.push(StyledLine::empty());
                    }
                }
                TagEnd::List(_) => {
                    list_depth = list_depth.saturating_sub(1);
                    ordered_list_counters.pop();
                    if list_depth == 0 {
                        result.push(StyledLine::empty());
                    }
                }
                TagEnd::BlockQuote(_) => {
                    in_blockquote = false;
                    result.push(StyledLine::empty());
                }
                TagEnd::Item => {
                    if !current_line_is_prefix_only {
                        let line = current_line.build();
                        if !line.is_empty() {
                            result.push(line);
                        }
                    }
                    list_prefix = None;
                    current_line_is_prefix_only = false;
                    current_line = LineBuilder::new();
                }
                TagEnd::Paragraph => {
                    if !current_line_is_prefix_only {
                        let line = current_line.build();
                        if !line.is_empty() {
                            result.push(line);
                        }
                    }
                    current_line = LineBuilder::new();
                    current_line_is_prefix_only = false;
                    if list_depth == 0 {
                        result.push(StyledLine::empty());
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if in_code_block {
                    code_block_buffer.push_str(&text);
                } else {
                    let content = text.to_string();
                    for (i, part) in content.split('\n').enumerate() {
                        if i > 0 {
                            if !current_line_is_prefix_only {
                                result.push(current_line.build());
                            }
                            if in_blockquote {
                                current_line = LineBuilder::new().styled(StyledSpan::dim("> "));
                            } else {
                                current_line = LineBuilder::new();
                            }
                            current_line_is_prefix_only = false;
                        }
                        if !part.is_empty() {
                            if list_prefix.is_some()
                                && current_line_is_prefix_only
                                && part.trim().is_empty()
                            {
                                continue;
                            }
                            if in_blockquote && current_line_is_prefix_only {
                                current_line = LineBuilder::new().styled(StyledSpan::dim("> "));
                            }
                            let span = if in_bold && in_italic {
                                StyledSpan::bold(part).with_italic()
                            } else if in_bold {
                                StyledSpan::bold(part)
                            } else if in_italic || in_blockquote {
                                StyledSpan::italic(part)
                            } else {
                                StyledSpan::raw(part)
                            };
                            current_line = current_line.styled(span);
                            current_line_is_prefix_only = false;
                        }
                    }
                }
            }
            Event::Rule => {
                let line = current_line.build();
                if !line.is_empty() {
                    result.push(line);
                }
                let rule_width = width.min(40);
                result.push(StyledLine::dim("─".repeat(rule_width)));
                result.push(StyledLine::empty());
                current_line = LineBuilder::new();
            }
            Event::Code(code) => {
                let span = StyledSpan::dim(format!("`{code}`"));
                current_line = current_line.styled(span);
                current_line_is_prefix_only = false;
            }
            Event::SoftBreak | Event::HardBreak => {
                if !current_line_is_prefix_only {
                    result.push(current_line.build());
                }
                current_line = LineBuilder::new();
                current_line_is_prefix_only = false;
            }
            _ => {}
        }
    }

    let line = current_line.build();
    if !line.is_empty() {
        result.push(line);
    }

    while result.last().is_some_and(StyledLine::is_empty) {
        result.pop();
    }

    result
}
